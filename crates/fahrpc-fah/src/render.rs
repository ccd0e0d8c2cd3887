//! Page loaders. Both Folding@home pages are assembled by JavaScript after the
//! initial response, so the production loader drives headless Chromium and
//! hands back the DOM once the page shows its data.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use fahrpc_core::ProgressError;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

/// Present once the control page has rendered a work unit or a client state.
pub const CONTROL_READY: &str = r#".progress-text, [class*="state-"]"#;
/// Present once the stats page has rendered the account totals.
pub const STATS_READY: &str = ".user-points";

const READY_POLL: Duration = Duration::from_millis(250);
const CONTENT_TIMEOUT: Duration = Duration::from_secs(2);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("fahrpc/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub url: &'a str,
    /// CSS selector that appears once scripts have filled the page.
    pub ready: &'a str,
    pub timeout: Duration,
}

#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, request: &PageRequest<'_>) -> Result<String, ProgressError>;

    /// Releases whatever the loader holds open. Idempotent.
    async fn close(&self) {}
}

/// Plain GET. Only sees server-rendered markup.
pub struct HttpLoader {
    http: reqwest::Client,
}

impl HttpLoader {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageLoader for HttpLoader {
    async fn load(&self, request: &PageRequest<'_>) -> Result<String, ProgressError> {
        let resp = self
            .http
            .get(request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| ProgressError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProgressError::Status(status.as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| ProgressError::Unreachable(e.to_string()))
    }
}

/// Headless Chromium, launched on first use and kept for later loads. A
/// browser that stops answering is shut down and relaunched on the next load.
pub struct BrowserLoader {
    executable: Option<PathBuf>,
    session: Mutex<Option<Session>>,
}

struct Session {
    browser: Browser,
    events: JoinHandle<()>,
    page: Page,
}

impl BrowserLoader {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            session: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Session, ProgressError> {
        let mut builder = BrowserConfig::builder().no_sandbox();
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(ProgressError::Render)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ProgressError::Render(format!("launching browser: {e}")))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser event");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(ProgressError::Render(format!("opening page: {e}")));
            }
        };
        info!(executable = ?self.executable, "headless browser started");
        Ok(Session {
            browser,
            events,
            page,
        })
    }
}

impl Session {
    async fn render(&self, request: &PageRequest<'_>) -> Result<String, ProgressError> {
        let deadline = Instant::now() + request.timeout;
        match timeout_at(deadline, self.page.goto(request.url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(CdpError::ChromeMessage(msg))) => return Err(ProgressError::Unreachable(msg)),
            Ok(Err(e)) => return Err(ProgressError::Render(e.to_string())),
            Err(_) => {
                return Err(ProgressError::Unreachable(format!(
                    "no page within {} ms",
                    request.timeout.as_millis()
                )))
            }
        }

        // Scripts keep filling the page after the load event.
        if timeout_at(deadline, self.wait_ready(request.ready))
            .await
            .is_err()
        {
            debug!(url = request.url, ready = request.ready, "ready marker never appeared");
        }

        match timeout(CONTENT_TIMEOUT, self.page.content()).await {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(e)) => Err(ProgressError::Render(e.to_string())),
            Err(_) => Err(ProgressError::Render("reading page content timed out".into())),
        }
    }

    async fn wait_ready(&self, selector: &str) {
        while self.page.find_element(selector).await.is_err() {
            sleep(READY_POLL).await;
        }
    }

    async fn shutdown(mut self) {
        match timeout(CLOSE_TIMEOUT, self.browser.close()).await {
            Ok(Ok(_)) => {
                let _ = timeout(CLOSE_TIMEOUT, self.browser.wait()).await;
            }
            Ok(Err(e)) => debug!(error = %e, "browser close failed"),
            Err(_) => debug!("browser close timed out"),
        }
        self.events.abort();
    }
}

#[async_trait]
impl PageLoader for BrowserLoader {
    async fn load(&self, request: &PageRequest<'_>) -> Result<String, ProgressError> {
        let mut slot = self.session.lock().await;
        let session = match slot.take() {
            Some(session) => session,
            None => self.launch().await?,
        };

        let result = session.render(request).await;
        match &result {
            Err(ProgressError::Render(reason)) => {
                warn!(%reason, "browser session dropped");
                session.shutdown().await;
            }
            _ => *slot = Some(session),
        }
        result
    }

    async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.shutdown().await;
            debug!("headless browser closed");
        }
    }
}
