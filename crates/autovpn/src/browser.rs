use crate::config::AppConfig;
use crate::engine::{Element, PageDriver, SessionLauncher, StepError};
use crate::error::{AutoVpnError, Result};
use crate::page::SiteTab;
use crate::site::Locator;
use headless_chrome::browser::default_executable;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

/// Executable names tried on `PATH` when no Chrome path is configured.
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Everything needed to start a browser for one automation run.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub user_agent: String,
    pub chrome_path: Option<PathBuf>,
    pub profile_dir: PathBuf,
    pub page_timeout: Duration,
}

impl BrowserOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            chrome_path: config.chrome_path.clone(),
            profile_dir: crate::utils::get_profile_dir(&config.data_dir)?,
            page_timeout: config.page_timeout(),
        })
    }
}

/// Finds a Chrome/Chromium binary: the configured path first, then `PATH`,
/// then the locations `headless_chrome` knows about.
pub fn locate_chrome(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        log::warn!("[!] Configured Chrome path {:?} does not exist", path);
    }
    CHROME_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| default_executable().ok())
}

/// Creates a browser with a dedicated profile directory and a custom user
/// agent.
///
/// A failed launch usually means a corrupt profile, so the profile is wiped
/// and the launch retried once.
pub fn create_browser(options: &BrowserOptions) -> Result<Browser> {
    let user_agent = OsString::from(format!("--user-agent={}", options.user_agent));
    let chrome = locate_chrome(options.chrome_path.as_deref());
    if chrome.is_none() {
        log::warn!("[!] No Chrome binary found; letting headless_chrome decide");
    }

    let mut attempts = 0;
    loop {
        if !options.profile_dir.exists() {
            std::fs::create_dir_all(&options.profile_dir)?;
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .sandbox(false)
            .idle_browser_timeout(options.page_timeout * 4)
            .window_size(Some((1280, 900)))
            .enable_gpu(false)
            .args(vec![
                user_agent.as_os_str(),
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-session-crashed-bubble"),
                OsStr::new("--lang=en-US"),
            ])
            .user_data_dir(Some(options.profile_dir.clone()))
            .path(chrome.clone())
            .build()
            .map_err(|e| AutoVpnError::Browser(e.to_string()))?;

        match Browser::new(launch_options) {
            Ok(browser) => return Ok(browser),
            Err(e) => {
                attempts += 1;
                if attempts >= 2 {
                    return Err(AutoVpnError::Browser(format!(
                        "browser failed even after wipe: {}",
                        e
                    )));
                }
                log::warn!("[!] Browser launch failed. Wiping profile and retrying...");
                crate::utils::wipe_profile_dir(&options.profile_dir)?;
            }
        }
    }
}

fn get_initial_tab(browser: &Browser) -> anyhow::Result<Arc<Tab>> {
    for _ in 0..10 {
        if let Ok(tabs) = browser.get_tabs().lock() {
            if let Some(t) = tabs.first() {
                return Ok(Arc::clone(t));
            }
        }
        sleep(Duration::from_millis(200));
    }
    browser.new_tab()
}

/// One browser plus the tab the automation runs in. Every tab is closed when
/// the session is dropped, on success and failure alike.
pub struct BrowserSession {
    browser: Browser,
    tab: SiteTab,
}

impl BrowserSession {
    pub fn open(options: &BrowserOptions) -> Result<Self> {
        let browser = create_browser(options)?;
        let raw_tab = get_initial_tab(&browser)?;
        raw_tab.set_default_timeout(options.page_timeout);
        log::debug!("Browser session opened");
        Ok(Self {
            browser,
            tab: SiteTab::new(raw_tab),
        })
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Ok(tabs) = self.browser.get_tabs().lock() {
            for tab in tabs.iter() {
                // The browser may already be gone; never hang here.
                let _ = tab.close(true);
            }
        }
        log::debug!("Browser session closed");
    }
}

impl PageDriver for BrowserSession {
    fn navigate(&self, url: &str) -> Result<(), StepError> {
        self.tab.navigate(url)
    }

    fn current_url(&self) -> String {
        self.tab.current_url()
    }

    fn inspect(&self, locator: &Locator) -> Result<Option<Element>, StepError> {
        self.tab.inspect(locator)
    }

    fn fill(&self, locator: &Locator, value: &str) -> Result<(), StepError> {
        self.tab.fill(locator, value)
    }

    fn click(&self, locator: &Locator) -> Result<(), StepError> {
        self.tab.click(locator)
    }

    fn fetch_link(&self, locator: &Locator) -> Result<Option<String>, StepError> {
        self.tab.fetch_link(locator)
    }
}

/// Launches a real Chrome for every run.
pub struct ChromeLauncher {
    options: BrowserOptions,
}

impl ChromeLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

impl SessionLauncher for ChromeLauncher {
    type Session = BrowserSession;

    fn launch(&self) -> Result<BrowserSession> {
        log::info!("[*] Launching browser (headless: {})", self.options.headless);
        BrowserSession::open(&self.options)
    }
}
