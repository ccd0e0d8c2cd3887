//! Folding@home progress from the client's web page and the public stats page.

pub mod client;
pub mod extract;
pub mod render;

pub use client::FahClient;
pub use render::{BrowserLoader, HttpLoader, PageLoader, PageRequest};
