//! One authenticated browser session, shared sequentially by a job.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::driver::{first_interactable, navigate, BrowserBackend, PageDriver};
use super::login::{
    classify_login, is_login_url, FormStrategy, LoginOutcome, LoginSignals,
    ACCOUNT_MENU_SELECTORS, ACCOUNT_MENU_TEXTS, EMAIL_SELECTORS, PASSWORD_SELECTORS,
    SUBMIT_SELECTORS, SUBMIT_TEXTS,
};
use crate::config::{BrowserSettings, Settings, SiteSettings, TimingSettings};
use crate::error::ScrapeError;
use crate::extract::ProfileDocument;
use crate::models::Credentials;
use crate::repository::CredentialProvider;

/// A page captured after navigation.
#[derive(Debug, Clone)]
pub struct CapturedPage {
    /// URL after redirects.
    pub url: String,
    pub html: String,
}

/// Owns the browser for the lifetime of a job.
pub struct SessionController {
    backend: Arc<dyn BrowserBackend>,
    credentials: Arc<dyn CredentialProvider>,
    site: SiteSettings,
    browser: BrowserSettings,
    timing: TimingSettings,
    page: Option<Box<dyn PageDriver>>,
    authenticated: bool,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn BrowserBackend>,
        credentials: Arc<dyn CredentialProvider>,
        settings: &Settings,
    ) -> Self {
        Self {
            backend,
            credentials,
            site: settings.site.clone(),
            browser: settings.browser.clone(),
            timing: settings.timing.clone(),
            page: None,
            authenticated: false,
        }
    }

    pub fn site(&self) -> &SiteSettings {
        &self.site
    }

    pub fn is_initialized(&self) -> bool {
        self.page.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Forget the login, e.g. after being bounced back to the login page.
    pub fn mark_unauthenticated(&mut self) {
        self.authenticated = false;
    }

    fn page(&mut self) -> Result<&mut dyn PageDriver, ScrapeError> {
        match self.page.as_deref_mut() {
            Some(page) => Ok(page),
            None => Err(ScrapeError::NotInitialized),
        }
    }

    /// Launch the browser. No navigation happens yet.
    pub async fn initialize(&mut self) -> Result<(), ScrapeError> {
        if self.page.is_some() {
            return Ok(());
        }
        let started = Instant::now();
        let page = self.backend.launch(&self.browser).await?;
        self.page = Some(page);
        info!(
            headless = self.browser.headless,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "browser launched"
        );
        Ok(())
    }

    /// Log in with `credentials`. A `Failure` outcome is returned as
    /// `ScrapeError::LoginFailed`.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<LoginOutcome, ScrapeError> {
        let entry = self
            .site
            .entry_url()
            .map_err(|e| ScrapeError::LoginFailed(format!("invalid base url: {e}")))?;
        let timeout = self.timing.navigation_timeout();
        navigate(self.page()?, entry.as_str(), timeout).await?;
        tokio::time::sleep(self.timing.settle_delay()).await;

        let strategy = self.surface_login_form().await?;
        debug!(strategy = strategy.as_str(), "login form located");

        let page = self.page()?;
        let email = first_interactable(page, EMAIL_SELECTORS)
            .await?
            .ok_or_else(|| ScrapeError::LoginFailed("email input not found".to_string()))?;
        let password = first_interactable(page, PASSWORD_SELECTORS)
            .await?
            .ok_or_else(|| ScrapeError::LoginFailed("password input not found".to_string()))?;

        page.fill(email, &credentials.identity).await?;
        page.fill(password, &credentials.secret).await?;
        submit_form(page, password).await?;

        let login_settle = self.timing.login_settle();
        let page = self.page()?;
        if !page.wait_for_navigation(login_settle).await? {
            debug!("no navigation after submit; using settled page");
        }

        let url = page.current_url().await?;
        let title = page.title().await?;
        let html = page.content().await?;
        let text = ProfileDocument::parse(&html).text();
        let outcome = classify_login(
            &self.site,
            &LoginSignals {
                url: &url,
                title: title.as_deref(),
                text: &text,
            },
        );

        match &outcome {
            LoginOutcome::Success => info!(url = %url, "login succeeded"),
            LoginOutcome::AssumedSuccess => {
                warn!(url = %url, "login assumed successful: no authenticated-area signal")
            }
            LoginOutcome::Failure(reason) => {
                return Err(ScrapeError::LoginFailed(reason.clone()));
            }
        }

        self.authenticated = true;
        if let Err(e) = self.credentials.mark_used(credentials).await {
            warn!(error = %e, "could not record credential use");
        }
        Ok(outcome)
    }

    /// Try each discovery strategy until a password input is interactable.
    async fn surface_login_form(&mut self) -> Result<FormStrategy, ScrapeError> {
        for strategy in FormStrategy::ORDER {
            if self.try_form_strategy(strategy).await? {
                return Ok(strategy);
            }
            debug!(strategy = strategy.as_str(), "login form not visible");
        }
        Err(ScrapeError::LoginFailed("login form not found".to_string()))
    }

    async fn try_form_strategy(&mut self, strategy: FormStrategy) -> Result<bool, ScrapeError> {
        let settle = self.timing.settle_delay();
        let modal_delay = self.timing.modal_retry_delay();
        let retries = self.timing.modal_retries;
        let timeout = self.timing.navigation_timeout();
        let login_url = self.site.login_url().ok();
        let page = self.page()?;

        match strategy {
            FormStrategy::AlreadyVisible => {}
            FormStrategy::AccountMenu => {
                let clicked = match first_interactable(page, ACCOUNT_MENU_SELECTORS).await? {
                    Some(selector) => {
                        page.click(selector).await?;
                        true
                    }
                    None => page.click_by_text("a, button", ACCOUNT_MENU_TEXTS).await?,
                };
                if !clicked {
                    return Ok(false);
                }
                tokio::time::sleep(modal_delay).await;
            }
            FormStrategy::DirectPath => {
                let Some(login_url) = login_url else {
                    return Ok(false);
                };
                navigate(page, login_url.as_str(), timeout).await?;
                tokio::time::sleep(settle).await;
            }
            FormStrategy::ModalRetry => {
                for _ in 0..retries {
                    tokio::time::sleep(modal_delay).await;
                    if first_interactable(page, PASSWORD_SELECTORS).await?.is_some() {
                        return Ok(true);
                    }
                }
                return Ok(false);
            }
        }
        Ok(first_interactable(page, PASSWORD_SELECTORS).await?.is_some())
    }

    /// Initialize if needed and log in unless already authenticated.
    pub async fn ensure_logged_in(&mut self) -> Result<(), ScrapeError> {
        if self.authenticated {
            return Ok(());
        }
        self.initialize().await?;
        let credentials = self
            .credentials
            .get_active_credentials()
            .await?
            .ok_or(ScrapeError::NoCredentials)?;
        self.login(&credentials).await.map(|_| ())
    }

    /// Navigate to `url`, wait the settle delay and capture the page.
    pub async fn capture(&mut self, url: &str) -> Result<CapturedPage, ScrapeError> {
        let timeout = self.timing.navigation_timeout();
        let settle = self.timing.settle_delay();
        let page = self.page()?;
        navigate(page, url, timeout).await?;
        tokio::time::sleep(settle).await;
        Ok(CapturedPage {
            url: page.current_url().await?,
            html: page.content().await?,
        })
    }

    /// Whether a captured URL is the login page, meaning the session expired.
    pub fn is_login_redirect(&self, url: &str) -> bool {
        is_login_url(&self.site, url)
    }

    /// Release the browser. Safe to call more than once.
    pub async fn teardown(&mut self) {
        self.authenticated = false;
        if let Some(mut page) = self.page.take() {
            match page.close().await {
                Ok(()) => debug!("browser closed"),
                Err(e) => warn!(error = %e, "browser did not close cleanly"),
            }
        }
    }
}

/// Submit via a submit control, then a text scan, then Enter in the password field.
async fn submit_form(page: &mut dyn PageDriver, password_selector: &str) -> Result<(), ScrapeError> {
    if let Some(selector) = first_interactable(page, SUBMIT_SELECTORS).await? {
        return page.click(selector).await;
    }
    if page.click_by_text("button, input[type=\"button\"], a", SUBMIT_TEXTS).await? {
        return Ok(());
    }
    debug!("no submit control found; pressing Enter");
    page.press_enter(password_selector).await
}
