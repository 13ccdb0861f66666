//! Scripted page and launcher doubles shared by the engine and service tests.

use crate::engine::{Element, PageDriver, SessionLauncher, StepError};
use crate::error::{AutoVpnError, Result};
use crate::site::{Locator, SiteOptions};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::sleep;
use std::time::Duration;

pub(crate) const RESULT_CSV: &str = "\
username,password,expires
7k2xa1,pw-one,2026-12-01
7k2xa2,pw-two,2026-12-01
";

const LANDING: &str = "https://reseller.example/login";
const DASHBOARD: &str = "https://reseller.example/dashboard";

const SITE_TOML: &str = r#"
name = "utunnel"
url = "https://reseller.example/login"
profile_page = "https://reseller.example/add/user"
ready = { css = "form#bulk" }
credit = { css = "input#credit" }
submit = { css = "button#generate" }
failure = { css = "div.alert-danger" }
result = { css = "textarea#profiles" }

[login]
username = { css = "input[name=email]" }
password = { css = "input[name=password]" }
submit = { css = "button[type=submit]" }
error = { css = "div.alert-login" }
success_url = "dashboard"
logged_in_marker = "dashboard"

[[form]]
locator = { css = "input[name=prefix]" }
value = "{prefix}"

[[form]]
locator = { css = "input[name=amount]" }
value = "{num_profiles}"
"#;

pub(crate) fn utunnel_site() -> SiteOptions {
    SiteOptions::from_toml(SITE_TOML).unwrap()
}

pub(crate) fn site_without_login() -> SiteOptions {
    let mut site = utunnel_site();
    site.login = None;
    site
}

fn key(locator: &Locator) -> &str {
    match locator {
        Locator::Css(s) | Locator::Xpath(s) => s,
    }
}

fn shown(text: &str) -> Element {
    Element {
        text: text.to_string(),
        visible: true,
    }
}

#[derive(Default)]
struct FakeState {
    url: String,
    elements: HashMap<String, Element>,
    invalid: HashSet<String>,
    inspections: HashMap<String, u32>,
    fills: HashMap<String, String>,
    clicks: HashMap<String, u32>,
    downloads: HashMap<String, String>,
    fetches: HashMap<String, u32>,
    visited: Vec<String>,
    login_error: Option<String>,
    generation_failure: Option<String>,
    result_delay: u32,
    logged_in: bool,
}

/// In-memory page that behaves like the reseller site described by
/// [`utunnel_site`]: logging in moves to the dashboard, clicking generate
/// fills the result textarea and exposes the same listing behind a
/// download link.
#[derive(Default)]
pub(crate) struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub(crate) fn utunnel() -> Self {
        let page = Self::default();
        {
            let mut s = page.state();
            for sel in [
                "input[name=email]",
                "input[name=password]",
                "button[type=submit]",
                "form#bulk",
                "input[name=prefix]",
                "input[name=amount]",
                "button#generate",
            ] {
                s.elements.insert(sel.to_string(), shown(""));
            }
            s.elements.insert("input#credit".to_string(), shown("1,000"));
            s.elements.insert("textarea#profiles".to_string(), shown(""));
        }
        page
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn remove(&self, selector: &str) {
        self.state().elements.remove(selector);
    }

    pub(crate) fn make_invalid(&self, selector: &str) {
        self.state().invalid.insert(selector.to_string());
    }

    pub(crate) fn set_text(&self, selector: &str, text: &str) {
        self.state().elements.insert(selector.to_string(), shown(text));
    }

    pub(crate) fn reject_login(&self, message: &str) {
        self.state().login_error = Some(message.to_string());
    }

    pub(crate) fn fail_generation(&self, message: &str) {
        self.state().generation_failure = Some(message.to_string());
    }

    /// The result stays empty for this many inspections after generation.
    pub(crate) fn delay_result(&self, inspections: u32) {
        self.state().result_delay = inspections;
    }

    pub(crate) fn already_logged_in(&self) {
        self.state().logged_in = true;
    }

    pub(crate) fn inspections(&self, selector: &str) -> u32 {
        self.state().inspections.get(selector).copied().unwrap_or(0)
    }

    pub(crate) fn clicks(&self, selector: &str) -> u32 {
        self.state().clicks.get(selector).copied().unwrap_or(0)
    }

    pub(crate) fn fetches(&self, selector: &str) -> u32 {
        self.state().fetches.get(selector).copied().unwrap_or(0)
    }

    pub(crate) fn filled(&self, selector: &str) -> Option<String> {
        self.state().fills.get(selector).cloned()
    }

    pub(crate) fn visited(&self) -> Vec<String> {
        self.state().visited.clone()
    }
}

impl PageDriver for FakePage {
    fn navigate(&self, url: &str) -> Result<(), StepError> {
        let mut s = self.state();
        s.visited.push(url.to_string());
        s.url = if url == LANDING && s.logged_in {
            DASHBOARD.to_string()
        } else {
            url.to_string()
        };
        Ok(())
    }

    fn current_url(&self) -> String {
        self.state().url.clone()
    }

    fn inspect(&self, locator: &Locator) -> Result<Option<Element>, StepError> {
        let mut s = self.state();
        let k = key(locator);
        *s.inspections.entry(k.to_string()).or_default() += 1;
        if s.invalid.contains(k) {
            return Err(StepError::structure(format!("invalid selector {}", k)));
        }
        if k == "textarea#profiles" && s.result_delay > 0 {
            s.result_delay -= 1;
            return Ok(Some(shown("")));
        }
        Ok(s.elements.get(k).cloned())
    }

    fn fill(&self, locator: &Locator, value: &str) -> Result<(), StepError> {
        let mut s = self.state();
        let k = key(locator);
        if s.invalid.contains(k) {
            return Err(StepError::structure(format!("invalid selector {}", k)));
        }
        match s.elements.get_mut(k) {
            Some(el) => el.text = value.to_string(),
            None => return Err(StepError::not_ready(format!("{} not present", k))),
        }
        s.fills.insert(k.to_string(), value.to_string());
        Ok(())
    }

    fn click(&self, locator: &Locator) -> Result<(), StepError> {
        let mut s = self.state();
        let k = key(locator).to_string();
        if !s.elements.contains_key(&k) {
            return Err(StepError::not_ready(format!("{} not present", k)));
        }
        *s.clicks.entry(k.clone()).or_default() += 1;

        match k.as_str() {
            "button[type=submit]" => match s.login_error.clone() {
                Some(msg) => {
                    s.elements.insert("div.alert-login".to_string(), shown(&msg));
                }
                None => {
                    s.url = DASHBOARD.to_string();
                    if let Some(user) = s.elements.get_mut("input[name=email]") {
                        user.visible = false;
                    }
                }
            },
            "button#generate" => match s.generation_failure.clone() {
                Some(msg) => {
                    s.elements.insert("div.alert-danger".to_string(), shown(&msg));
                }
                None => {
                    s.elements
                        .insert("textarea#profiles".to_string(), shown(RESULT_CSV));
                    s.elements
                        .insert("a.download-csv".to_string(), shown("Download CSV"));
                    s.downloads
                        .insert("a.download-csv".to_string(), RESULT_CSV.to_string());
                }
            },
            _ => {}
        }
        Ok(())
    }

    fn fetch_link(&self, locator: &Locator) -> Result<Option<String>, StepError> {
        let mut s = self.state();
        let k = key(locator);
        *s.fetches.entry(k.to_string()).or_default() += 1;
        if s.invalid.contains(k) {
            return Err(StepError::structure(format!("invalid selector {}", k)));
        }
        if !s.elements.contains_key(k) {
            return Ok(None);
        }
        Ok(Some(s.downloads.get(k).cloned().unwrap_or_default()))
    }
}

/// Session handed out by [`FakeLauncher`]; counts its own teardown and how
/// many sessions are open at once.
pub(crate) struct FakeSession {
    page: FakePage,
    pace: Duration,
    dropped: Arc<AtomicU32>,
    active: Arc<AtomicU32>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

impl PageDriver for FakeSession {
    fn navigate(&self, url: &str) -> Result<(), StepError> {
        sleep(self.pace);
        self.page.navigate(url)
    }
    fn current_url(&self) -> String {
        self.page.current_url()
    }
    fn inspect(&self, locator: &Locator) -> Result<Option<Element>, StepError> {
        self.page.inspect(locator)
    }
    fn fill(&self, locator: &Locator, value: &str) -> Result<(), StepError> {
        self.page.fill(locator, value)
    }
    fn click(&self, locator: &Locator) -> Result<(), StepError> {
        self.page.click(locator)
    }
    fn fetch_link(&self, locator: &Locator) -> Result<Option<String>, StepError> {
        self.page.fetch_link(locator)
    }
}

pub(crate) struct FakeLauncher {
    setup: fn(&FakePage),
    fail: bool,
    pace: Duration,
    launches: AtomicU32,
    dropped: Arc<AtomicU32>,
    active: Arc<AtomicU32>,
    peak: AtomicU32,
}

impl FakeLauncher {
    pub(crate) fn new() -> Self {
        Self::with_setup(|_| {})
    }

    /// Every launched page is passed through `setup` first.
    pub(crate) fn with_setup(setup: fn(&FakePage)) -> Self {
        Self {
            setup,
            fail: false,
            pace: Duration::ZERO,
            launches: AtomicU32::new(0),
            dropped: Arc::new(AtomicU32::new(0)),
            active: Arc::new(AtomicU32::new(0)),
            peak: AtomicU32::new(0),
        }
    }

    /// Every navigation in a launched session takes `pace`.
    pub(crate) fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn launches(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    pub(crate) fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Most sessions that were ever open at the same time.
    pub(crate) fn peak_sessions(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

impl SessionLauncher for FakeLauncher {
    type Session = FakeSession;

    fn launch(&self) -> Result<FakeSession> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AutoVpnError::Browser("chrome exited during startup".into()));
        }
        let page = FakePage::utunnel();
        (self.setup)(&page);
        let open = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        Ok(FakeSession {
            page,
            pace: self.pace,
            dropped: Arc::clone(&self.dropped),
            active: Arc::clone(&self.active),
        })
    }
}
