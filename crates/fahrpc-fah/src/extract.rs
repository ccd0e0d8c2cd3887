//! Pulls the progress tuple and the account totals out of rendered page HTML.

use std::sync::LazyLock;

use fahrpc_core::{GlobalStats, ProgressError, ProgressReport, ACTIVE_PLACEHOLDER};
use regex::Regex;

static PROGRESS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="[^"]*\bprogress-text\b[^"]*"[^>]*>([^<]*)<"#).expect("valid regex")
});
static PROJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\b").expect("valid regex"));
static STATE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"class="[^"]*\bstate-run\b"#).expect("valid regex"));
static CLIENT_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="[^"]*\b(?:progress-text|state-[a-z]+)\b"#).expect("valid regex")
});
static POINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div class="user-points">([\d,]+) points earned</div>"#).expect("valid regex")
});
static WUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div class="user-wus">([\d,]+) WUs completed</div>"#).expect("valid regex")
});

const MISSING_PERCENT: &str = "0";

/// Reads the local control page. A page without any client markup is not a
/// Folding@home client and counts as a hard failure.
pub fn parse_control_page(html: &str) -> Result<ProgressReport, ProgressError> {
    if !CLIENT_MARKUP.is_match(html) {
        return Err(ProgressError::MarkupMissing);
    }

    let mut percentages: Vec<String> = PROGRESS_TEXT
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().replace('%', "").trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let mut task_ids: Vec<String> = Vec::new();
    for m in PROJECT_ID.find_iter(html) {
        if !task_ids.iter().any(|id| id == m.as_str()) {
            task_ids.push(m.as_str().to_string());
        }
    }

    let n = percentages.len().max(task_ids.len());
    percentages.resize(n, MISSING_PERCENT.to_string());
    task_ids.resize(n, ACTIVE_PLACEHOLDER.to_string());

    Ok(ProgressReport {
        percentages,
        task_ids,
        running: STATE_RUN.is_match(html),
    })
}

/// `None` unless both totals are on the page.
pub fn parse_stats_page(html: &str) -> Option<GlobalStats> {
    let first = |re: &Regex| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    GlobalStats::from_parts(first(&POINTS), first(&WUS))
}
