use crate::engine::RetryPolicy;
use crate::error::{AutoVpnError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "autovpn.toml";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Retry settings as written in the config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 4_000,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        RetryPolicy::new(
            s.max_attempts,
            Duration::from_millis(s.initial_delay_ms),
            Duration::from_millis(s.max_delay_ms),
        )
    }
}

/// Application settings.
///
/// `database` and `export_dir` follow `data_dir` unless set explicitly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub export_dir: PathBuf,
    pub headless: bool,
    pub user_agent: String,
    pub chrome_path: Option<PathBuf>,
    pub page_timeout_secs: u64,
    pub retry: RetrySettings,
    /// Requests per caller per minute. `0` disables the limiter.
    pub rate_limit_per_minute: u32,
    /// Admin secret used to bootstrap a fresh database. Only read from the
    /// environment.
    pub admin_bootstrap: Option<String>,
}

/// The config file as written: every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    database: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    headless: Option<bool>,
    user_agent: Option<String>,
    chrome_path: Option<PathBuf>,
    page_timeout_secs: Option<u64>,
    retry: Option<RetrySettings>,
    rate_limit_per_minute: Option<u32>,
}

impl AppConfig {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            database: data_dir.join("autovpn.db"),
            export_dir: data_dir.join("exports"),
            data_dir,
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            chrome_path: None,
            page_timeout_secs: 30,
            retry: RetrySettings::default(),
            rate_limit_per_minute: 25,
            admin_bootstrap: None,
        }
    }

    /// Loads settings from `path`, or from `<data dir>/autovpn.toml` when it
    /// exists, then applies `AUTOVPN_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let candidate = crate::utils::get_data_dir()?.join(CONFIG_FILE_NAME);
                if candidate.exists() {
                    Self::from_file(&candidate)?
                } else {
                    Self::from_toml("")?
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| AutoVpnError::Config(format!("{}: {}", path.display(), e)))?;
        log::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parses `content`, falling back to the platform data directory when
    /// the file names none.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| AutoVpnError::Config(e.to_string()))?;
        let data_dir = match file.data_dir.clone() {
            Some(dir) => dir,
            None => crate::utils::get_data_dir()?,
        };
        Ok(Self::with_data_dir(data_dir).merge(file))
    }

    /// Overlays the keys present in `file`. Derived paths were already
    /// resolved against the chosen `data_dir`.
    fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(db) = file.database {
            self.database = db;
        }
        if let Some(dir) = file.export_dir {
            self.export_dir = dir;
        }
        if let Some(headless) = file.headless {
            self.headless = headless;
        }
        if let Some(ua) = file.user_agent {
            self.user_agent = ua;
        }
        if file.chrome_path.is_some() {
            self.chrome_path = file.chrome_path;
        }
        if let Some(secs) = file.page_timeout_secs {
            self.page_timeout_secs = secs;
        }
        if let Some(retry) = file.retry {
            self.retry = retry;
        }
        if let Some(rate) = file.rate_limit_per_minute {
            self.rate_limit_per_minute = rate;
        }
        self
    }

    /// Applies environment overrides through `lookup` so tests need not touch
    /// the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(db) = lookup("AUTOVPN_DATABASE") {
            self.database = PathBuf::from(db);
        }
        if let Some(dir) = lookup("AUTOVPN_EXPORT_DIR") {
            self.export_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("AUTOVPN_CHROME_PATH") {
            self.chrome_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = lookup("AUTOVPN_HEADLESS") {
            self.headless = parse_bool(&flag).ok_or_else(|| {
                AutoVpnError::Config(format!("AUTOVPN_HEADLESS must be true or false, got '{}'", flag))
            })?;
        }
        if let Some(secret) = lookup("AUTOVPN_ADMIN_PASSWORD") {
            if !secret.is_empty() {
                self.admin_bootstrap = Some(secret);
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
