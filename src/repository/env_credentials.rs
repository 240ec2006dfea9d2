//! Credentials taken from the process environment.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{CredentialProvider, StoreError};
use crate::models::Credentials;

pub const IDENTITY_ENV: &str = "DONORSCRAPE_IDENTITY";
pub const SECRET_ENV: &str = "DONORSCRAPE_SECRET";

/// Reads `DONORSCRAPE_IDENTITY` / `DONORSCRAPE_SECRET` (after `.env` loading).
///
/// The last-used marker is kept in memory only.
#[derive(Debug, Default)]
pub struct EnvCredentialProvider {
    last_used: Mutex<Option<chrono::DateTime<Utc>>>,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both variables are set and non-empty.
    pub fn is_configured() -> bool {
        read_var(IDENTITY_ENV).is_some() && read_var(SECRET_ENV).is_some()
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn get_active_credentials(&self) -> Result<Option<Credentials>, StoreError> {
        let (Some(identity), Some(secret)) = (read_var(IDENTITY_ENV), read_var(SECRET_ENV)) else {
            return Ok(None);
        };
        let mut creds = Credentials::new(identity, secret);
        creds.last_used_at = self.last_used.lock().ok().and_then(|g| *g);
        Ok(Some(creds))
    }

    async fn mark_used(&self, credentials: &Credentials) -> Result<(), StoreError> {
        debug!(identity = %credentials.identity, "credentials used");
        if let Ok(mut last) = self.last_used.lock() {
            *last = Some(Utc::now());
        }
        Ok(())
    }
}
