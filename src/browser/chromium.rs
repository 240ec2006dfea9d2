//! Headless Chrome backend via chromiumoxide.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

use super::driver::{BrowserBackend, PageDriver};
use crate::config::BrowserSettings;
use crate::error::ScrapeError;

/// Launches a local Chrome/Chromium.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumBackend;

impl ChromiumBackend {
    pub fn new() -> Self {
        Self
    }
}

fn driver_error(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Driver(e.to_string())
}

/// Quote a string as a JS literal.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Visibility check that answers `false` for a selector the page rejects.
fn interactable_script(selector: &str) -> String {
    format!(
        r#"(() => {{
            let el;
            try {{
                el = document.querySelector({sel});
            }} catch (_) {{
                return false;
            }}
            if (!el || el.disabled) return false;
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            return rect.width > 0 && rect.height > 0
                && style.visibility !== 'hidden' && style.display !== 'none';
        }})()"#,
        sel = js_string(selector)
    )
}

#[async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn launch(&self, settings: &BrowserSettings) -> Result<Box<dyn PageDriver>, ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .arg(format!("--user-agent={}", settings.user_agent))
            .arg("--disable-blink-features=AutomationControlled");
        if !settings.headless {
            builder = builder.with_head();
        }
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(ScrapeError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler stopped");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(ScrapeError::Launch(format!("could not open page: {e}")));
            }
        };

        Ok(Box::new(ChromiumPage {
            browser,
            page,
            handler,
        }))
    }
}

/// The single tab a job drives.
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumPage {
    async fn eval_bool(&self, script: String) -> Result<bool, ScrapeError> {
        self.page
            .evaluate(script)
            .await
            .map_err(driver_error)?
            .into_value::<bool>()
            .map_err(driver_error)
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        self.page.goto(url).await.map_err(driver_error)?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, ScrapeError> {
        Ok(self.page.url().await.map_err(driver_error)?.unwrap_or_default())
    }

    async fn title(&mut self) -> Result<Option<String>, ScrapeError> {
        self.page.get_title().await.map_err(driver_error)
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        self.page.content().await.map_err(driver_error)
    }

    async fn is_interactable(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        // Errors here come from the connection; bad selectors are false in-page.
        self.eval_bool(interactable_script(selector)).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError> {
        self.page
            .find_element(selector)
            .await
            .map_err(driver_error)?
            .click()
            .await
            .map_err(driver_error)?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), ScrapeError> {
        let clear = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = '';
                el.focus();
                return true;
            }})()"#,
            sel = js_string(selector)
        );
        if !self.eval_bool(clear).await? {
            return Err(ScrapeError::Driver(format!("no element matches {selector}")));
        }
        let element = self.page.find_element(selector).await.map_err(driver_error)?;
        element.click().await.map_err(driver_error)?;
        element.type_str(value).await.map_err(driver_error)?;
        Ok(())
    }

    async fn click_by_text(&mut self, selector: &str, needles: &[&str]) -> Result<bool, ScrapeError> {
        let needles: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();
        let script = format!(
            r#"(() => {{
                const needles = {needles};
                for (const el of document.querySelectorAll({sel})) {{
                    const rect = el.getBoundingClientRect();
                    if (rect.width === 0 || rect.height === 0) continue;
                    const text = (el.innerText || el.value || '').trim().toLowerCase();
                    if (needles.some(n => text.includes(n))) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            needles = serde_json::to_string(&needles).map_err(driver_error)?,
            sel = js_string(selector)
        );
        self.eval_bool(script).await
    }

    async fn press_enter(&mut self, selector: &str) -> Result<(), ScrapeError> {
        self.page
            .find_element(selector)
            .await
            .map_err(driver_error)?
            .press_key("Enter")
            .await
            .map_err(driver_error)?;
        Ok(())
    }

    async fn wait_for_navigation(&mut self, timeout: Duration) -> Result<bool, ScrapeError> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(result) => {
                result.map_err(driver_error)?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        let closed = self.browser.close().await.map_err(driver_error);
        if closed.is_ok() {
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}
