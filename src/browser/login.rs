//! Login form discovery and the tri-state success rule.

use url::Url;

use crate::config::SiteSettings;

/// Email/username inputs, most specific first.
pub const EMAIL_SELECTORS: &[&str] = &[
    r#"input[type="email"]"#,
    r#"input[name="email"]"#,
    r#"input[name="username"]"#,
    r#"input[id*="email" i]"#,
    r#"input[id*="user" i]"#,
    r#"input[placeholder*="email" i]"#,
    r#"input[placeholder*="user" i]"#,
];

pub const PASSWORD_SELECTORS: &[&str] = &[
    r#"input[type="password"]"#,
    r#"input[name="password"]"#,
    r#"input[id*="pass" i]"#,
    r#"input[placeholder*="password" i]"#,
];

pub const SUBMIT_SELECTORS: &[&str] = &[
    r#"button[type="submit"]"#,
    r#"input[type="submit"]"#,
    "form button",
];

/// Button text scanned when no submit selector matches.
pub const SUBMIT_TEXTS: &[&str] = &["log in", "login", "sign in", "submit"];

/// Controls that open the login form or modal.
pub const ACCOUNT_MENU_SELECTORS: &[&str] = &[
    r#"a[href*="login"]"#,
    r#"a[href*="signin"]"#,
    r#"[data-testid*="account"]"#,
    ".account-menu",
    ".login-link",
];

pub const ACCOUNT_MENU_TEXTS: &[&str] = &["log in", "sign in", "my account"];

/// Ordered ways of getting the login form on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStrategy {
    AlreadyVisible,
    AccountMenu,
    DirectPath,
    ModalRetry,
}

impl FormStrategy {
    pub const ORDER: [FormStrategy; 4] = [
        FormStrategy::AlreadyVisible,
        FormStrategy::AccountMenu,
        FormStrategy::DirectPath,
        FormStrategy::ModalRetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormStrategy::AlreadyVisible => "already_visible",
            FormStrategy::AccountMenu => "account_menu",
            FormStrategy::DirectPath => "direct_path",
            FormStrategy::ModalRetry => "modal_retry",
        }
    }
}

/// Result of classifying the page after a login submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A positive authenticated-area signal was seen.
    Success,
    /// Still on the login page, or an explicit failure phrase was shown.
    Failure(String),
    /// The page moved on with no signal either way.
    AssumedSuccess,
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, LoginOutcome::Failure(_))
    }
}

/// What the page looked like after submitting credentials.
#[derive(Debug, Clone, Copy)]
pub struct LoginSignals<'a> {
    pub url: &'a str,
    pub title: Option<&'a str>,
    pub text: &'a str,
}

fn normalized_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(parsed.path().trim_end_matches('/').to_lowercase())
}

/// Whether `url` points at the configured login path.
pub fn is_login_url(site: &SiteSettings, url: &str) -> bool {
    let wanted = site.login_path.trim_end_matches('/').to_lowercase();
    normalized_path(url).is_some_and(|path| !wanted.is_empty() && path == wanted)
}

/// Resolve the ambiguous post-login page.
///
/// Positive signals win over negative ones; with neither, the login is
/// assumed to have worked because the page left the login URL.
pub fn classify_login(site: &SiteSettings, signals: &LoginSignals<'_>) -> LoginOutcome {
    let url = signals.url.to_lowercase();
    let text = signals.text.to_lowercase();
    let title = signals.title.unwrap_or_default().to_lowercase();

    let url_authenticated = site
        .authenticated_url_patterns
        .iter()
        .any(|p| url.contains(&p.to_lowercase()));
    let phrase_authenticated = site.authenticated_phrases.iter().any(|p| {
        let p = p.to_lowercase();
        text.contains(&p) || title.contains(&p)
    });
    if url_authenticated || phrase_authenticated {
        return LoginOutcome::Success;
    }

    if let Some(phrase) = site
        .failure_phrases
        .iter()
        .find(|p| text.contains(&p.to_lowercase()))
    {
        return LoginOutcome::Failure(format!("page reports \"{phrase}\""));
    }
    if is_login_url(site, signals.url) {
        return LoginOutcome::Failure("still on the login page".to_string());
    }
    LoginOutcome::AssumedSuccess
}
