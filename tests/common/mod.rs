//! Scripted in-process registry site for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use donorscrape::browser::login::{EMAIL_SELECTORS, PASSWORD_SELECTORS, SUBMIT_SELECTORS};
use donorscrape::browser::{BrowserBackend, PageDriver};
use donorscrape::config::{BrowserSettings, Settings, TimingSettings};
use donorscrape::models::{
    JobCounters, JobStatus, ScrapeJob, ScrapeOutcome, ScrapeResult, SubjectListEntry,
    SubjectRecord,
};
use donorscrape::repository::{
    JobStore, MemoryStore, RecordSink, ResultSink, StoreError, SubjectListStore,
};
use donorscrape::ScrapeError;

pub const PROFILE_HTML: &str = include_str!("../fixtures/profile.html");
pub const INVENTORY_HTML: &str = include_str!("../fixtures/inventory.html");
pub const NOT_FOUND_HTML: &str = include_str!("../fixtures/not_found.html");

pub const BASE_URL: &str = "https://registry.example.com";

const HOME_HTML: &str = "<html><body><h1>Featured donors</h1></body></html>";
const LOGIN_HTML: &str = r#"<html><body><form>
<label>Email</label><input type="email" name="email">
<label>Password</label><input type="password" name="password">
<button type="submit">Log in</button>
</form></body></html>"#;
const DASHBOARD_HTML: &str = "<html><body><h1>Dashboard</h1><a href=\"/logout\">Log out</a></body></html>";

/// Settings with zero delays against the fake site.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.site.base_url = format!("{BASE_URL}/");
    settings.timing = TimingSettings::immediate();
    settings
}

/// Shared state of the fake site, inspected by tests.
#[derive(Default)]
pub struct FakeSite {
    pages: Mutex<HashMap<String, String>>,
    expire_next: Mutex<HashSet<String>>,
    stalled: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    launch_fails: AtomicBool,
    after_login_path: Mutex<String>,
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub logins: AtomicUsize,
    pub visits: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        let site = Self::default();
        *site.after_login_path.lock().unwrap() = "/dashboard".to_string();
        site.add_page("/", HOME_HTML);
        site.add_page("/dashboard", DASHBOARD_HTML);
        Arc::new(site)
    }

    pub fn add_page(&self, path: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), html.to_string());
    }

    /// Serve the fixture profile (and optionally inventory) for `id`.
    pub fn add_subject(&self, id: &str, with_inventory: bool) {
        self.add_page(&format!("/donors/{id}"), PROFILE_HTML);
        if with_inventory {
            self.add_page(&format!("/donors/{id}/inventory"), INVENTORY_HTML);
        }
    }

    /// Make login submissions land back on the login form.
    pub fn reject_logins(&self) {
        *self.after_login_path.lock().unwrap() = "/login".to_string();
    }

    /// Bounce the next visit to `path` to the login page.
    pub fn expire_session_at(&self, path: &str) {
        self.expire_next.lock().unwrap().insert(path.to_string());
    }

    /// Never finish loading `path`.
    pub fn stall_at(&self, path: &str) {
        self.stalled.lock().unwrap().insert(path.to_string());
    }

    /// Panic while reading the content of `path`.
    pub fn panic_at(&self, path: &str) {
        self.panicking.lock().unwrap().insert(path.to_string());
    }

    /// Make every browser launch fail.
    pub fn fail_launches(&self) {
        self.launch_fails.store(true, Ordering::SeqCst);
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

pub struct FakeBackend {
    pub site: Arc<FakeSite>,
}

impl FakeBackend {
    pub fn new(site: Arc<FakeSite>) -> Arc<Self> {
        Arc::new(Self { site })
    }
}

#[async_trait]
impl BrowserBackend for FakeBackend {
    async fn launch(&self, _: &BrowserSettings) -> Result<Box<dyn PageDriver>, ScrapeError> {
        self.site.launches.fetch_add(1, Ordering::SeqCst);
        if self.site.launch_fails.load(Ordering::SeqCst) {
            return Err(ScrapeError::Launch("no browser executable found".to_string()));
        }
        Ok(Box::new(FakePage {
            site: self.site.clone(),
            url: "about:blank".to_string(),
        }))
    }
}

struct FakePage {
    site: Arc<FakeSite>,
    url: String,
}

impl FakePage {
    fn path(&self) -> String {
        Url::parse(&self.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }

    fn on_login_form(&self) -> bool {
        self.path() == "/login"
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .map_err(|e| ScrapeError::Driver(e.to_string()))?;
        self.site.visits.lock().unwrap().push(path.clone());
        if self.site.stalled.lock().unwrap().contains(&path) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.site.expire_next.lock().unwrap().remove(&path) {
            self.url = format!("{BASE_URL}/login");
        } else {
            self.url = url.to_string();
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, ScrapeError> {
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> Result<Option<String>, ScrapeError> {
        Ok(None)
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        if self.on_login_form() {
            return Ok(LOGIN_HTML.to_string());
        }
        let path = self.path();
        if self.site.panicking.lock().unwrap().contains(&path) {
            panic!("renderer crashed on {path}");
        }
        let pages = self.site.pages.lock().unwrap();
        Ok(pages
            .get(&self.path())
            .cloned()
            .unwrap_or_else(|| NOT_FOUND_HTML.to_string()))
    }

    async fn is_interactable(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        Ok(self.on_login_form()
            && [EMAIL_SELECTORS[0], PASSWORD_SELECTORS[0], SUBMIT_SELECTORS[0]].contains(&selector))
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError> {
        if self.on_login_form() && selector == SUBMIT_SELECTORS[0] {
            self.site.logins.fetch_add(1, Ordering::SeqCst);
            let path = self.site.after_login_path.lock().unwrap().clone();
            self.url = format!("{BASE_URL}{path}");
        }
        Ok(())
    }

    async fn fill(&mut self, _: &str, _: &str) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn click_by_text(&mut self, _: &str, _: &[&str]) -> Result<bool, ScrapeError> {
        Ok(false)
    }

    async fn press_enter(&mut self, _: &str) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn wait_for_navigation(&mut self, _: Duration) -> Result<bool, ScrapeError> {
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        self.site.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store whose record writes always fail; everything else is in memory.
pub struct ReadOnlyRecords {
    pub inner: Arc<MemoryStore>,
}

impl ReadOnlyRecords {
    pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl RecordSink for ReadOnlyRecords {
    async fn upsert_subject_record(&self, _: &str, _: &SubjectRecord) -> Result<(), StoreError> {
        Err(StoreError::Database("attempt to write a readonly database".to_string()))
    }

    async fn get_subject_record(&self, subject_id: &str) -> Result<Option<SubjectRecord>, StoreError> {
        self.inner.get_subject_record(subject_id).await
    }
}

#[async_trait]
impl ResultSink for ReadOnlyRecords {
    async fn append_result(
        &self,
        job_id: &str,
        subject_id: &str,
        outcome: &ScrapeOutcome,
    ) -> Result<i64, StoreError> {
        self.inner.append_result(job_id, subject_id, outcome).await
    }

    async fn list_results(&self, job_id: &str) -> Result<Vec<ScrapeResult>, StoreError> {
        self.inner.list_results(job_id).await
    }
}

#[async_trait]
impl JobStore for ReadOnlyRecords {
    async fn create_job(&self, subject_ids: &[String], incremental: bool) -> Result<String, StoreError> {
        self.inner.create_job(subject_ids, incremental).await
    }

    async fn update_job_progress(&self, job_id: &str, counters: &JobCounters) -> Result<(), StoreError> {
        self.inner.update_job_progress(job_id, counters).await
    }

    async fn set_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.set_job_status(job_id, status, error).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<ScrapeJob>, StoreError> {
        self.inner.get_job(job_id).await
    }
}

#[async_trait]
impl SubjectListStore for ReadOnlyRecords {
    async fn get_subject_health(&self, subject_id: &str) -> Result<Option<SubjectListEntry>, StoreError> {
        self.inner.get_subject_health(subject_id).await
    }

    async fn update_subject_health(&self, entry: &SubjectListEntry) -> Result<(), StoreError> {
        self.inner.update_subject_health(entry).await
    }

    async fn reactivate_subject(&self, subject_id: &str) -> Result<bool, StoreError> {
        self.inner.reactivate_subject(subject_id).await
    }

    async fn active_subject_ids(&self) -> Result<Vec<String>, StoreError> {
        self.inner.active_subject_ids().await
    }
}
