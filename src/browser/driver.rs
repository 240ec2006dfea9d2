//! Browser seam.
//!
//! The session controller talks to the browser only through these traits, so
//! the chromium backend can be swapped for a scripted page in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::BrowserSettings;
use crate::error::ScrapeError;

/// Launches a browser and opens the single page a job works in.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn launch(&self, settings: &BrowserSettings) -> Result<Box<dyn PageDriver>, ScrapeError>;
}

/// One open page.
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError>;

    async fn current_url(&mut self) -> Result<String, ScrapeError>;

    async fn title(&mut self) -> Result<Option<String>, ScrapeError>;

    /// Serialized HTML of the current document.
    async fn content(&mut self) -> Result<String, ScrapeError>;

    /// Whether the first element matching `selector` is visible and enabled.
    async fn is_interactable(&mut self, selector: &str) -> Result<bool, ScrapeError>;

    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError>;

    /// Clear the input matching `selector` and type `value` into it.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), ScrapeError>;

    /// Click the first visible element matching `selector` whose text contains
    /// one of `needles` (case-insensitive). Returns false when none matched.
    async fn click_by_text(&mut self, selector: &str, needles: &[&str]) -> Result<bool, ScrapeError>;

    /// Press Enter inside the element matching `selector`.
    async fn press_enter(&mut self, selector: &str) -> Result<(), ScrapeError>;

    /// Wait up to `timeout` for a navigation to finish. Returns false on timeout.
    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<bool, ScrapeError>;

    /// Close the page and the browser behind it.
    async fn close(&mut self) -> Result<(), ScrapeError>;
}

/// Navigate with a hard timeout.
pub async fn navigate(
    page: &mut dyn PageDriver,
    url: &str,
    timeout: Duration,
) -> Result<(), ScrapeError> {
    match tokio::time::timeout(timeout, page.goto(url)).await {
        Ok(result) => result,
        Err(_) => Err(ScrapeError::NavigationTimeout {
            url: url.to_string(),
            timeout,
        }),
    }
}

/// First selector whose element is interactable.
pub async fn first_interactable<'s>(
    page: &mut dyn PageDriver,
    selectors: &[&'s str],
) -> Result<Option<&'s str>, ScrapeError> {
    for selector in selectors {
        if page.is_interactable(selector).await? {
            return Ok(Some(selector));
        }
    }
    Ok(None)
}
