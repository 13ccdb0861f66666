//! Profile automation engine.
//!
//! Drives a target site through a small state machine:
//!
//! ```text
//! Idle -> NavigatingLogin -> AwaitingPageLoad -> ExtractingData -> Succeeded
//!                                                               \-> Failed
//! ```
//!
//! Every step that waits on the page runs under a [`RetryPolicy`]. A step
//! reports [`StepError::NotReady`] while the page is still catching up and
//! [`StepError::Rejected`] when waiting longer cannot help; only the former is
//! retried.

use crate::error::{AutoVpnError, RejectReason, Result};
use crate::site::{Locator, LoginForm, ResultMode, SiteOptions};
use rand::Rng;
use std::fmt;
use std::thread::sleep;
use std::time::Duration;

// ── States ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    NavigatingLogin,
    AwaitingPageLoad,
    ExtractingData,
    Succeeded,
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Idle => "idle",
            EngineState::NavigatingLogin => "navigating login",
            EngineState::AwaitingPageLoad => "awaiting page load",
            EngineState::ExtractingData => "extracting data",
            EngineState::Succeeded => "succeeded",
            EngineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────────

/// Bounded retry with doubling backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay: max_delay.max(initial_delay),
        }
    }

    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the `attempt`-th failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500), Duration::from_secs(4))
    }
}

// ── Page abstraction ─────────────────────────────────────────────────────────

/// Outcome of a single page interaction that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The page is not there yet; try again.
    NotReady(String),
    /// Trying again cannot help.
    Rejected(RejectReason),
}

impl StepError {
    pub fn not_ready(detail: impl Into<String>) -> Self {
        StepError::NotReady(detail.into())
    }

    pub fn structure(detail: impl Into<String>) -> Self {
        StepError::Rejected(RejectReason::StructureMismatch(detail.into()))
    }
}

/// What an inspection sees of an element: its text (or value, for form inputs)
/// and whether it is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub text: String,
    pub visible: bool,
}

impl Element {
    /// Rendered and carrying non-blank text.
    pub fn shows_text(&self) -> bool {
        self.visible && !self.text.trim().is_empty()
    }
}

/// The page operations the engine needs. Implemented over a Chrome tab in
/// production and by a scripted double in tests.
///
/// Implementations return `Rejected(StructureMismatch)` for a locator the
/// page cannot evaluate and `NotReady` for a missing element or a failed
/// navigation.
pub trait PageDriver {
    fn navigate(&self, url: &str) -> Result<(), StepError>;
    fn current_url(&self) -> String;
    fn inspect(&self, locator: &Locator) -> Result<Option<Element>, StepError>;
    fn fill(&self, locator: &Locator, value: &str) -> Result<(), StepError>;
    fn click(&self, locator: &Locator) -> Result<(), StepError>;
    /// Body of the file a link points at, fetched within the page's session.
    /// `None` when the link is not present.
    fn fetch_link(&self, locator: &Locator) -> Result<Option<String>, StepError>;
}

/// Hands out a fresh browser session per automation run. The session is
/// torn down when dropped.
pub trait SessionLauncher {
    type Session: PageDriver;

    fn launch(&self) -> Result<Self::Session>;
}

// ── Jobs ─────────────────────────────────────────────────────────────────────

/// Credentials for the target site, submitted per request.
#[derive(Clone)]
pub struct SiteCredentials {
    pub username: String,
    pub password: String,
}

impl SiteCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SiteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub credentials: Option<SiteCredentials>,
    pub num_profiles: u32,
}

// ── Templates ────────────────────────────────────────────────────────────────

const PREFIX_LEAD: &[u8] = b"123456789";
const PREFIX_TAIL: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random 4-character profile prefix: a non-zero digit followed by three
/// lowercase letters or digits.
pub fn generate_prefix() -> String {
    let mut rng = rand::rng();
    let mut prefix = String::with_capacity(4);
    prefix.push(PREFIX_LEAD[rng.random_range(0..PREFIX_LEAD.len())] as char);
    for _ in 0..3 {
        prefix.push(PREFIX_TAIL[rng.random_range(0..PREFIX_TAIL.len())] as char);
    }
    prefix
}

/// Values available to `{placeholder}` form templates.
#[derive(Clone)]
pub struct TemplateVars {
    pub site: String,
    pub num_profiles: u32,
    pub prefix: String,
    pub credentials: Option<SiteCredentials>,
}

impl TemplateVars {
    pub fn for_job(site: &SiteOptions, job: &Job) -> Self {
        Self {
            site: site.name.clone(),
            num_profiles: job.num_profiles,
            prefix: generate_prefix(),
            credentials: job.credentials.clone(),
        }
    }

    fn lookup(&self, name: &str) -> Result<String> {
        let creds = || {
            self.credentials.as_ref().ok_or_else(|| {
                AutoVpnError::Config(format!("placeholder {{{}}} has no value for this job", name))
            })
        };
        match name {
            "site" => Ok(self.site.clone()),
            "num_profiles" => Ok(self.num_profiles.to_string()),
            "prefix" => Ok(self.prefix.clone()),
            "username" => Ok(creds()?.username.clone()),
            "password" => Ok(creds()?.password.clone()),
            other => Err(AutoVpnError::Config(format!(
                "unknown placeholder {{{}}}",
                other
            ))),
        }
    }

    /// Expands `{name}` placeholders. `{{` and `}}` are literal braces.
    pub fn render(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(AutoVpnError::Config(format!(
                                    "unclosed placeholder in '{}'",
                                    template
                                )))
                            }
                        }
                    }
                    out.push_str(&self.lookup(name.trim())?);
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for TemplateVars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateVars")
            .field("site", &self.site)
            .field("num_profiles", &self.num_profiles)
            .field("prefix", &self.prefix)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Pulls the first integer out of a credit display such as `"1,250"` or
/// `"Credit: 40"`.
fn parse_credit(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    let digits: String = cleaned
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct AutomationEngine {
    site: SiteOptions,
    retry: RetryPolicy,
    state: EngineState,
    history: Vec<EngineState>,
}

impl AutomationEngine {
    pub fn new(site: SiteOptions, retry: RetryPolicy) -> Self {
        Self {
            site,
            retry,
            state: EngineState::Idle,
            history: vec![EngineState::Idle],
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Every state entered during the last run, starting with `Idle`.
    pub fn history(&self) -> &[EngineState] {
        &self.history
    }

    /// Runs the site flow on `page` and returns the raw extracted text.
    pub fn run(&mut self, page: &dyn PageDriver, job: &Job) -> Result<String> {
        self.state = EngineState::Idle;
        self.history = vec![EngineState::Idle];

        let outcome = self.drive(page, job);
        match &outcome {
            Ok(text) => {
                self.transition(EngineState::Succeeded);
                log::info!(
                    "[✓] {}: extracted {} line(s)",
                    self.site.name,
                    text.lines().count()
                );
            }
            Err(e) => {
                let failed_in = self.state;
                self.transition(EngineState::Failed);
                log::warn!("[!] {}: failed while {}: {}", self.site.name, failed_in, e);
            }
        }
        outcome
    }

    fn transition(&mut self, next: EngineState) {
        log::debug!("Engine state: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn drive(&mut self, page: &dyn PageDriver, job: &Job) -> Result<String> {
        let site = self.site.clone();

        if site.requires_login() && job.credentials.is_none() {
            return Err(AutoVpnError::InvalidRequest(format!(
                "site '{}' needs login credentials",
                site.name
            )));
        }

        // Render every template before touching the page so a bad site file
        // fails without side effects.
        let vars = TemplateVars::for_job(&site, job);
        let fields = site
            .form
            .iter()
            .map(|f| Ok((f.locator.clone(), vars.render(&f.value)?)))
            .collect::<Result<Vec<_>>>()?;
        log::debug!("Profile prefix for this run: {}", vars.prefix);

        self.transition(EngineState::NavigatingLogin);
        log::info!("[*] Opening {}", site.url);
        self.attempt("open landing page", || page.navigate(&site.url))?;

        if let (Some(login), Some(creds)) = (&site.login, &job.credentials) {
            self.login(page, login, creds)?;
        }

        self.transition(EngineState::AwaitingPageLoad);
        if let Some(url) = &site.profile_page {
            log::info!("[*] Opening profile page");
            self.attempt("open profile page", || page.navigate(url))?;
        }
        self.attempt("wait for profile page", || {
            require_present(page, &site.ready).map(|_| ())
        })?;

        if let Some(credit) = &site.credit {
            let available = self.attempt("read credit", || read_credit(page, credit))?;
            log::info!("[*] Available credit: {}", available);
            if available < u64::from(job.num_profiles) {
                return Err(AutoVpnError::AutomationRejected(
                    RejectReason::InsufficientCredit {
                        available,
                        requested: job.num_profiles,
                    },
                ));
            }
        }

        for (locator, value) in &fields {
            self.attempt("fill form field", || page.fill(locator, value))?;
        }
        if let Some(submit) = &site.submit {
            log::info!("[*] Submitting request for {} profile(s)", job.num_profiles);
            self.attempt("submit form", || page.click(submit))?;
        }

        self.transition(EngineState::ExtractingData);
        self.attempt("extract result", || {
            extract(page, &site.result, site.result_mode, site.failure.as_ref())
        })
    }

    fn login(&self, page: &dyn PageDriver, login: &LoginForm, creds: &SiteCredentials) -> Result<()> {
        if let Some(marker) = &login.logged_in_marker {
            if page.current_url().contains(marker.as_str()) {
                log::info!("[✓] Existing session is still valid, skipping login");
                return Ok(());
            }
        }

        log::info!("[*] Logging in as {}", creds.username);
        self.attempt("wait for login form", || {
            require_visible(page, &login.username).map(|_| ())
        })?;
        self.attempt("fill username", || page.fill(&login.username, &creds.username))?;
        self.attempt("fill password", || page.fill(&login.password, &creds.password))?;
        self.attempt("submit login", || page.click(&login.submit))?;
        self.attempt("confirm login", || confirm_login(page, login))?;
        log::info!("[✓] Logged in");
        Ok(())
    }

    /// Runs `step` until it succeeds, is rejected, or the policy runs out.
    fn attempt<T>(
        &self,
        what: &str,
        mut step: impl FnMut() -> Result<T, StepError>,
    ) -> Result<T> {
        let max = self.retry.max_attempts();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match step() {
                Ok(value) => return Ok(value),
                Err(StepError::Rejected(reason)) => {
                    return Err(AutoVpnError::AutomationRejected(reason));
                }
                Err(StepError::NotReady(detail)) => {
                    if attempts >= max {
                        return Err(AutoVpnError::AutomationTimeout {
                            state: self.state,
                            attempts,
                            detail: format!("{}: {}", what, detail),
                        });
                    }
                    let delay = self.retry.delay_for(attempts);
                    log::debug!(
                        "{} not ready ({}/{}): {}; retrying in {:?}",
                        what,
                        attempts,
                        max,
                        detail,
                        delay
                    );
                    sleep(delay);
                }
            }
        }
    }
}

// ── Steps ────────────────────────────────────────────────────────────────────

fn require_present(page: &dyn PageDriver, locator: &Locator) -> Result<Element, StepError> {
    page.inspect(locator)?
        .ok_or_else(|| StepError::not_ready(format!("{} not present", locator)))
}

fn require_visible(page: &dyn PageDriver, locator: &Locator) -> Result<Element, StepError> {
    let element = require_present(page, locator)?;
    if element.visible {
        Ok(element)
    } else {
        Err(StepError::not_ready(format!("{} not visible", locator)))
    }
}

fn confirm_login(page: &dyn PageDriver, login: &LoginForm) -> Result<(), StepError> {
    if let Some(error) = &login.error {
        if let Some(el) = page.inspect(error)? {
            if el.shows_text() {
                return Err(StepError::Rejected(RejectReason::AuthenticationRejected(
                    el.text.trim().to_string(),
                )));
            }
        }
    }

    match &login.success_url {
        Some(fragment) => {
            let url = page.current_url();
            if url.contains(fragment.as_str()) {
                Ok(())
            } else {
                Err(StepError::not_ready(format!(
                    "url '{}' does not contain '{}' yet",
                    url, fragment
                )))
            }
        }
        None => match page.inspect(&login.username)? {
            Some(el) if el.visible => Err(StepError::not_ready("login form still visible")),
            _ => Ok(()),
        },
    }
}

fn read_credit(page: &dyn PageDriver, locator: &Locator) -> Result<u64, StepError> {
    let element = require_present(page, locator)?;
    let text = element.text.trim();
    if text.is_empty() {
        return Err(StepError::not_ready("credit not shown yet"));
    }
    parse_credit(text)
        .ok_or_else(|| StepError::structure(format!("credit '{}' is not a number", text)))
}

fn extract(
    page: &dyn PageDriver,
    result: &Locator,
    mode: ResultMode,
    failure: Option<&Locator>,
) -> Result<String, StepError> {
    if let Some(failure) = failure {
        if let Some(el) = page.inspect(failure)? {
            if el.shows_text() {
                return Err(StepError::Rejected(RejectReason::OperationFailed(
                    el.text.trim().to_string(),
                )));
            }
        }
    }

    let text = match mode {
        ResultMode::Text => page.inspect(result)?.map(|el| el.text),
        ResultMode::Download => page.fetch_link(result)?,
    };
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(_) => Err(StepError::not_ready(format!("{} is still empty", result))),
        None => Err(StepError::not_ready(format!("{} not present", result))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{site_without_login, utunnel_site, FakePage, RESULT_CSV};

    fn job(n: u32) -> Job {
        Job {
            credentials: Some(SiteCredentials::new("reseller@example.com", "s3cret")),
            num_profiles: n,
        }
    }

    #[test]
    fn full_run_reaches_succeeded() {
        let page = FakePage::utunnel();
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(3));

        let text = engine.run(&page, &job(2)).unwrap();

        assert_eq!(text, RESULT_CSV.trim());
        assert_eq!(engine.state(), EngineState::Succeeded);
        assert_eq!(
            engine.history(),
            &[
                EngineState::Idle,
                EngineState::NavigatingLogin,
                EngineState::AwaitingPageLoad,
                EngineState::ExtractingData,
                EngineState::Succeeded,
            ]
        );
        assert_eq!(
            page.filled("input[name=email]").as_deref(),
            Some("reseller@example.com")
        );
        assert_eq!(page.filled("input[name=amount]").as_deref(), Some("2"));
        let prefix = page.filled("input[name=prefix]").unwrap();
        assert_eq!(prefix.len(), 4);
        assert_eq!(page.clicks("button#generate"), 1);
    }

    #[test]
    fn missing_element_is_retried_exactly_max_attempts() {
        let page = FakePage::utunnel();
        page.remove("form#bulk");
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(4));

        let err = engine.run(&page, &job(1)).unwrap_err();

        match err {
            AutoVpnError::AutomationTimeout {
                state, attempts, ..
            } => {
                assert_eq!(state, EngineState::AwaitingPageLoad);
                assert_eq!(attempts, 4);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(page.inspections("form#bulk"), 4);
        assert_eq!(engine.state(), EngineState::Failed);
    }

    #[test]
    fn invalid_locator_is_rejected_after_one_attempt() {
        let page = FakePage::utunnel();
        page.make_invalid("form#bulk");
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(5));

        let err = engine.run(&page, &job(1)).unwrap_err();

        assert!(matches!(
            err,
            AutoVpnError::AutomationRejected(RejectReason::StructureMismatch(_))
        ));
        assert_eq!(page.inspections("form#bulk"), 1);
    }

    #[test]
    fn visible_login_error_is_not_retried() {
        let page = FakePage::utunnel();
        page.reject_login("Invalid email or password");
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(5));

        let err = engine.run(&page, &job(1)).unwrap_err();

        match err {
            AutoVpnError::AutomationRejected(RejectReason::AuthenticationRejected(msg)) => {
                assert_eq!(msg, "Invalid email or password");
            }
            other => panic!("expected login rejection, got {:?}", other),
        }
        assert_eq!(page.inspections("div.alert-login"), 1);
        assert_eq!(
            engine.history().last().copied(),
            Some(EngineState::Failed)
        );
    }

    #[test]
    fn valid_session_skips_login() {
        let page = FakePage::utunnel();
        page.already_logged_in();
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(2));

        engine.run(&page, &job(1)).unwrap();

        assert!(page.filled("input[name=email]").is_none());
        assert_eq!(page.clicks("button[type=submit]"), 0);
    }

    #[test]
    fn insufficient_credit_is_rejected() {
        let page = FakePage::utunnel();
        page.set_text("input#credit", "3");
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(2));

        let err = engine.run(&page, &job(10)).unwrap_err();

        assert!(matches!(
            err,
            AutoVpnError::AutomationRejected(RejectReason::InsufficientCredit {
                available: 3,
                requested: 10
            })
        ));
        assert_eq!(page.clicks("button#generate"), 0);
    }

    #[test]
    fn non_numeric_credit_is_a_structure_mismatch() {
        let page = FakePage::utunnel();
        page.set_text("input#credit", "n/a");
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(3));

        let err = engine.run(&page, &job(1)).unwrap_err();
        assert!(matches!(
            err,
            AutoVpnError::AutomationRejected(RejectReason::StructureMismatch(_))
        ));
        assert_eq!(page.inspections("input#credit"), 1);
    }

    #[test]
    fn failure_banner_is_operation_failed() {
        let page = FakePage::utunnel();
        page.fail_generation("Error: prefix already exists");
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(3));

        let err = engine.run(&page, &job(1)).unwrap_err();
        assert!(matches!(
            err,
            AutoVpnError::AutomationRejected(RejectReason::OperationFailed(ref m))
                if m == "Error: prefix already exists"
        ));
    }

    #[test]
    fn result_that_appears_late_is_picked_up() {
        let page = FakePage::utunnel();
        page.delay_result(2);
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(3));

        let text = engine.run(&page, &job(1)).unwrap();
        assert!(text.starts_with("username,password"));
        assert_eq!(page.inspections("textarea#profiles"), 3);
    }

    #[test]
    fn download_link_is_fetched_for_the_result() {
        let page = FakePage::utunnel();
        let mut site = utunnel_site();
        site.result = Locator::Css("a.download-csv".into());
        site.result_mode = ResultMode::Download;
        let mut engine = AutomationEngine::new(site, RetryPolicy::immediate(3));

        let text = engine.run(&page, &job(2)).unwrap();
        assert_eq!(text, RESULT_CSV.trim());
        assert_eq!(page.fetches("a.download-csv"), 1);
        assert_eq!(page.inspections("textarea#profiles"), 0);
    }

    #[test]
    fn login_site_without_credentials_is_invalid() {
        let page = FakePage::utunnel();
        let mut engine = AutomationEngine::new(utunnel_site(), RetryPolicy::immediate(1));
        let err = engine
            .run(
                &page,
                &Job {
                    credentials: None,
                    num_profiles: 1,
                },
            )
            .unwrap_err();
        assert!(matches!(err, AutoVpnError::InvalidRequest(_)));
        assert!(page.visited().is_empty());
    }

    #[test]
    fn unknown_placeholder_fails_before_navigation() {
        let mut site = site_without_login();
        site.form[0].value = "{nickname}".into();
        let page = FakePage::utunnel();
        let mut engine = AutomationEngine::new(site, RetryPolicy::immediate(1));

        let err = engine.run(&page, &job(1)).unwrap_err();
        assert!(matches!(err, AutoVpnError::Config(_)));
        assert!(page.visited().is_empty());
    }

    #[test]
    fn templates_render_known_placeholders() {
        let vars = TemplateVars {
            site: "utunnel".into(),
            num_profiles: 25,
            prefix: "7k2x".into(),
            credentials: Some(SiteCredentials::new("bob", "pw")),
        };
        assert_eq!(
            vars.render("{prefix}-{num_profiles}@{site}").unwrap(),
            "7k2x-25@utunnel"
        );
        assert_eq!(vars.render("{{literal}}").unwrap(), "{literal}");
        assert!(vars.render("{prefix").is_err());

        let anonymous = TemplateVars {
            credentials: None,
            ..vars
        };
        assert!(matches!(
            anonymous.render("{username}").unwrap_err(),
            AutoVpnError::Config(_)
        ));
    }

    #[test]
    fn prefix_shape() {
        for _ in 0..50 {
            let prefix = generate_prefix();
            let bytes = prefix.as_bytes();
            assert_eq!(bytes.len(), 4);
            assert!((b'1'..=b'9').contains(&bytes[0]));
            assert!(bytes[1..]
                .iter()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
        }
    }

    #[test]
    fn credit_parsing() {
        assert_eq!(parse_credit("1,250"), Some(1250));
        assert_eq!(parse_credit("Credit: 40 left"), Some(40));
        assert_eq!(parse_credit("none"), None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(0, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(60), Duration::from_millis(500));
    }

    #[test]
    fn credentials_are_redacted_in_debug() {
        let debug = format!("{:?}", job(1));
        assert!(debug.contains("reseller@example.com"));
        assert!(!debug.contains("s3cret"));
    }
}
