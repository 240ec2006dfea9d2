//! Configuration management for donorscrape using the prefer crate.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default refresh TTL in days for incremental runs.
pub const DEFAULT_REFRESH_TTL_DAYS: u64 = 7;

/// Stable desktop Chrome user agent presented by the browser session.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Resolve user agent from config value.
/// - None => default desktop Chrome user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None | Some("") => DEFAULT_USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}

/// Registry site layout and the phrases used to judge login outcomes.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Site entry point.
    pub base_url: String,
    /// Path of the login page, relative to the base URL.
    pub login_path: String,
    /// Profile page path; `{id}` is replaced by the subject id.
    pub profile_path: String,
    /// Inventory report path; `{id}` is replaced by the subject id.
    pub inventory_path: String,
    /// URL fragments that only appear inside the authenticated area.
    pub authenticated_url_patterns: Vec<String>,
    /// Page text that only appears when logged in.
    pub authenticated_phrases: Vec<String>,
    /// Page text that signals rejected credentials.
    pub failure_phrases: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: "https://registry.example.com/".to_string(),
            login_path: "/login".to_string(),
            profile_path: "/donors/{id}".to_string(),
            inventory_path: "/donors/{id}/inventory".to_string(),
            authenticated_url_patterns: ["/dashboard", "/account", "/my-account", "/portal"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            authenticated_phrases: ["log out", "logout", "sign out", "my account", "welcome back"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            failure_phrases: [
                "invalid email",
                "invalid password",
                "incorrect password",
                "invalid credentials",
                "login failed",
                "authentication failed",
                "account is locked",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl SiteSettings {
    fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)?.join(path)
    }

    pub fn entry_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    pub fn login_url(&self) -> Result<Url, url::ParseError> {
        self.resolve(&self.login_path)
    }

    pub fn profile_url(&self, subject_id: &str) -> Result<Url, url::ParseError> {
        self.resolve(&fill_id(&self.profile_path, subject_id))
    }

    pub fn inventory_url(&self, subject_id: &str) -> Result<Url, url::ParseError> {
        self.resolve(&fill_id(&self.inventory_path, subject_id))
    }
}

/// Characters escaped when an id is spliced into a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn fill_id(template: &str, subject_id: &str) -> String {
    let encoded = utf8_percent_encode(subject_id, PATH_SEGMENT).to_string();
    template.replace("{id}", &encoded)
}

/// Browser launch settings.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    pub executable: Option<PathBuf>,
    /// Disable the Chrome sandbox (needed in most containers).
    pub no_sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1366,
            viewport_height: 900,
            executable: None,
            no_sandbox: false,
        }
    }
}

/// Fixed delays and timeouts around navigation.
#[derive(Debug, Clone)]
pub struct TimingSettings {
    /// Per-navigation timeout in seconds.
    pub navigation_timeout_secs: u64,
    /// Delay after each navigation for client-side rendering, in milliseconds.
    pub settle_delay_ms: u64,
    /// Delay after submitting the login form, in milliseconds.
    pub login_settle_ms: u64,
    /// Delay before re-checking for a login modal, in milliseconds.
    pub modal_retry_delay_ms: u64,
    /// Number of modal re-checks.
    pub modal_retries: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 30,
            settle_delay_ms: 2000,
            login_settle_ms: 5000,
            modal_retry_delay_ms: 1500,
            modal_retries: 2,
        }
    }
}

impl TimingSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }

    pub fn modal_retry_delay(&self) -> Duration {
        Duration::from_millis(self.modal_retry_delay_ms)
    }

    /// All delays zeroed; used by tests and offline runs.
    pub fn immediate() -> Self {
        Self {
            navigation_timeout_secs: 5,
            settle_delay_ms: 0,
            login_settle_ms: 0,
            modal_retry_delay_ms: 0,
            modal_retries: 1,
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Days a successful scrape stays fresh for incremental runs.
    pub refresh_ttl_days: u64,
    pub site: SiteSettings,
    pub browser: BrowserSettings,
    pub timing: TimingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("donorscrape");

        Self {
            data_dir,
            database_filename: "donorscrape.db".to_string(),
            refresh_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            site: SiteSettings::default(),
            browser: BrowserSettings::default(),
            timing: TimingSettings::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_ttl_days as i64)
    }
}

/// `[site]` section of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct SiteConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub login_path: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub inventory_path: Option<String>,
    #[serde(default)]
    pub authenticated_url_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub authenticated_phrases: Option<Vec<String>>,
    #[serde(default)]
    pub failure_phrases: Option<Vec<String>>,
}

/// `[browser]` section of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: Option<bool>,
    /// User agent string; unset uses the default desktop Chrome string.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub viewport_width: Option<u32>,
    #[serde(default)]
    pub viewport_height: Option<u32>,
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default)]
    pub no_sandbox: Option<bool>,
}

/// `[timing]` section of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct TimingConfig {
    #[serde(default)]
    pub navigation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub settle_delay_ms: Option<u64>,
    #[serde(default)]
    pub login_settle_ms: Option<u64>,
    #[serde(default)]
    pub modal_retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub modal_retries: Option<u32>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default)]
    pub target: Option<String>,
    /// Database filename.
    #[serde(default)]
    pub database: Option<String>,
    /// Days a successful scrape stays fresh for incremental runs.
    #[serde(default)]
    pub refresh_ttl_days: Option<u64>,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers donorscrape config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("donorscrape").await {
            Ok(pref_config) => {
                let target: Option<String> = pref_config.get("target").ok();
                let database: Option<String> = pref_config.get("database").ok();
                let refresh_ttl_days: Option<u64> =
                    pref_config.get("refresh_ttl_days").ok();
                let site: SiteConfig = pref_config.get("site").unwrap_or_default();
                let browser: BrowserConfig = pref_config.get("browser").unwrap_or_default();
                let timing: TimingConfig = pref_config.get("timing").unwrap_or_default();

                Config {
                    target,
                    database,
                    refresh_ttl_days,
                    site,
                    browser,
                    timing,
                }
            }
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref target) = self.target {
            let path = shellexpand::tilde(target);
            settings.data_dir = PathBuf::from(path.as_ref());
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ttl) = self.refresh_ttl_days {
            settings.refresh_ttl_days = ttl;
        }

        let site = &mut settings.site;
        if let Some(ref v) = self.site.base_url {
            site.base_url = v.clone();
        }
        if let Some(ref v) = self.site.login_path {
            site.login_path = v.clone();
        }
        if let Some(ref v) = self.site.profile_path {
            site.profile_path = v.clone();
        }
        if let Some(ref v) = self.site.inventory_path {
            site.inventory_path = v.clone();
        }
        if let Some(ref v) = self.site.authenticated_url_patterns {
            site.authenticated_url_patterns = v.clone();
        }
        if let Some(ref v) = self.site.authenticated_phrases {
            site.authenticated_phrases = v.clone();
        }
        if let Some(ref v) = self.site.failure_phrases {
            site.failure_phrases = v.clone();
        }

        let browser = &mut settings.browser;
        if let Some(v) = self.browser.headless {
            browser.headless = v;
        }
        if self.browser.user_agent.is_some() {
            browser.user_agent = resolve_user_agent(self.browser.user_agent.as_deref());
        }
        if let Some(v) = self.browser.viewport_width {
            browser.viewport_width = v;
        }
        if let Some(v) = self.browser.viewport_height {
            browser.viewport_height = v;
        }
        if let Some(ref v) = self.browser.executable {
            browser.executable = Some(PathBuf::from(shellexpand::tilde(v).as_ref()));
        }
        if let Some(v) = self.browser.no_sandbox {
            browser.no_sandbox = v;
        }

        let timing = &mut settings.timing;
        if let Some(v) = self.timing.navigation_timeout_secs {
            timing.navigation_timeout_secs = v;
        }
        if let Some(v) = self.timing.settle_delay_ms {
            timing.settle_delay_ms = v;
        }
        if let Some(v) = self.timing.login_settle_ms {
            timing.login_settle_ms = v;
        }
        if let Some(v) = self.timing.modal_retry_delay_ms {
            timing.modal_retry_delay_ms = v;
        }
        if let Some(v) = self.timing.modal_retries {
            timing.modal_retries = v;
        }
    }
}

/// Load settings from configuration (async version).
pub async fn load_settings() -> Settings {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings
}
