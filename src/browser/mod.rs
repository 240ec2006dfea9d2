//! Browser session: launch, login and page capture.

#[cfg(feature = "browser")]
pub mod chromium;
pub mod driver;
pub mod login;
pub mod session;

#[cfg(feature = "browser")]
pub use chromium::ChromiumBackend;
pub use driver::{BrowserBackend, PageDriver};
pub use login::{classify_login, is_login_url, LoginOutcome, LoginSignals};
pub use session::{CapturedPage, SessionController};
