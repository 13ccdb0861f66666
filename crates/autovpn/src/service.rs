//! Request/session façade.
//!
//! Authenticates the caller, applies the per-caller rate limit, runs the
//! automation engine in a fresh browser session and optionally turns the
//! extracted listing into a spreadsheet. The most recent requests, failed
//! ones included, are kept in memory for inspection.

use crate::config::AppConfig;
use crate::convert;
use crate::engine::{AutomationEngine, Job, RetryPolicy, SessionLauncher, SiteCredentials};
use crate::error::{AutoVpnError, Result};
use crate::site::SiteOptions;
use crate::store::CredentialStore;
use crate::utils::file_stem;
use chrono::{DateTime, Utc};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Inclusive bounds on profiles per request.
pub const MIN_PROFILES: u32 = 1;
pub const MAX_PROFILES: u32 = 100;

/// Finished requests kept by [`ProfileService::recent_requests`].
pub const RECENT_REQUESTS: usize = 50;

/// Who is asking.
pub enum Caller {
    Admin(String),
    AppPassword { id: i64, secret: String },
}

impl Caller {
    fn rate_key(&self) -> String {
        match self {
            Caller::Admin(_) => "admin".to_string(),
            Caller::AppPassword { id, .. } => format!("app-password:{}", id),
        }
    }
}

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::Admin(_) => f.write_str("Admin(<redacted>)"),
            Caller::AppPassword { id, .. } => f
                .debug_struct("AppPassword")
                .field("id", id)
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Where the site login for a request comes from.
#[derive(Debug, Clone, Default)]
pub enum SiteLogin {
    /// The site needs no login.
    #[default]
    None,
    /// Credentials typed in by the caller.
    Supplied(SiteCredentials),
    /// A login the admin stored for this site. The caller only knows its id.
    Stored(i64),
}

/// What the caller submits.
#[derive(Debug, Clone)]
pub struct ProfileRequest {
    pub site: SiteOptions,
    pub login: SiteLogin,
    pub num_profiles: u32,
    /// Convert the extracted listing into an `.xlsx` artifact.
    pub export: bool,
}

/// In-memory record of one request. Never persisted.
#[derive(Debug, Clone)]
pub struct AutomationRequest {
    pub id: Uuid,
    pub target_site: String,
    /// Only set for caller-supplied credentials.
    pub credentials: Option<SiteCredentials>,
    pub site_login_id: Option<i64>,
    pub num_profiles: u32,
    pub status: RequestStatus,
    pub result_text: Option<String>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AutomationRequest {
    fn from_request(request: &ProfileRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_site: request.site.name.clone(),
            credentials: match &request.login {
                SiteLogin::Supplied(creds) => Some(creds.clone()),
                _ => None,
            },
            site_login_id: match request.login {
                SiteLogin::Stored(id) => Some(id),
                _ => None,
            },
            num_profiles: request.num_profiles,
            status: RequestStatus::Pending,
            result_text: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    fn finish(&mut self, outcome: std::result::Result<&str, &AutoVpnError>) {
        self.finished_at = Some(Utc::now());
        match outcome {
            Ok(text) => {
                self.status = RequestStatus::Succeeded;
                self.result_text = Some(text.to_string());
            }
            Err(e) => {
                self.status = RequestStatus::Failed;
                self.error = Some(e.user_message());
            }
        }
    }
}

fn export_artifact(record: &AutomationRequest, text: &str) -> Result<ExportedArtifact> {
    Ok(ExportedArtifact {
        request_id: record.id,
        file_name: artifact_file_name(&record.target_site, record.num_profiles, record.submitted_at),
        bytes: convert::convert(text)?,
    })
}

pub struct ExportedArtifact {
    pub request_id: Uuid,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportedArtifact {
    /// Writes the artifact into `dir` and returns the full path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        log::info!("[✓] Saved {}", path.display());
        Ok(path)
    }
}

impl fmt::Debug for ExportedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedArtifact")
            .field("request_id", &self.request_id)
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct Delivery {
    pub request: AutomationRequest,
    pub artifact: Option<ExportedArtifact>,
}

/// `<SITE>_<N>PIECE_<DDMONYYYY_HHMMSS>.xlsx`
pub fn artifact_file_name(site: &str, num_profiles: u32, at: DateTime<Utc>) -> String {
    format!(
        "{}_{}PIECE_{}.xlsx",
        file_stem(site).to_uppercase(),
        num_profiles,
        at.format("%d%b%Y_%H%M%S").to_string().to_uppercase()
    )
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub retry: RetryPolicy,
    /// Requests per caller per minute; `0` disables limiting.
    pub rate_limit_per_minute: u32,
}

impl From<&AppConfig> for ServiceOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            retry: config.retry_policy(),
            rate_limit_per_minute: config.rate_limit_per_minute,
        }
    }
}

pub struct ProfileService<L: SessionLauncher> {
    store: Arc<CredentialStore>,
    launcher: L,
    retry: RetryPolicy,
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    /// Held for the lifetime of a browser session; concurrent requests queue.
    browser_lease: Mutex<()>,
    recent: Mutex<VecDeque<AutomationRequest>>,
}

impl<L: SessionLauncher> ProfileService<L> {
    pub fn new(store: Arc<CredentialStore>, launcher: L, options: ServiceOptions) -> Self {
        let limiter = NonZeroU32::new(options.rate_limit_per_minute)
            .map(|n| RateLimiter::keyed(Quota::per_minute(n)));
        Self {
            store,
            launcher,
            retry: options.retry,
            limiter,
            browser_lease: Mutex::new(()),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_REQUESTS)),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn submit(&self, caller: &Caller, request: ProfileRequest) -> Result<Delivery> {
        self.authenticate(caller)?;
        self.check_rate(caller)?;
        if !(MIN_PROFILES..=MAX_PROFILES).contains(&request.num_profiles) {
            return Err(AutoVpnError::InvalidRequest(format!(
                "number of profiles must be between {} and {}, got {}",
                MIN_PROFILES, MAX_PROFILES, request.num_profiles
            )));
        }
        request.site.validate()?;
        let credentials = self.resolve_login(&request)?;

        let mut record = AutomationRequest::from_request(&request);
        log::info!(
            "[*] Request {} accepted: {} profile(s) on {}",
            record.id,
            record.num_profiles,
            record.target_site
        );

        let outcome = self
            .run_exclusive(&request, credentials, &mut record)
            .and_then(|text| {
                let artifact = if request.export {
                    Some(export_artifact(&record, &text)?)
                } else {
                    None
                };
                Ok((text, artifact))
            });
        record.finish(outcome.as_ref().map(|(text, _)| text.as_str()));
        self.remember(&record);

        match outcome {
            Ok((_, artifact)) => {
                log::info!("[✓] Request {} finished", record.id);
                Ok(Delivery {
                    request: record,
                    artifact,
                })
            }
            Err(e) => {
                log::warn!("[!] Request {} failed: {}", record.id, e);
                Err(e)
            }
        }
    }

    /// Finished requests, oldest first. Requests refused before they start
    /// (authentication, rate limit, validation) are not recorded.
    pub fn recent_requests(&self) -> Vec<AutomationRequest> {
        self.recent().iter().cloned().collect()
    }

    pub fn request(&self, id: Uuid) -> Option<AutomationRequest> {
        self.recent().iter().find(|r| r.id == id).cloned()
    }

    fn recent(&self) -> MutexGuard<'_, VecDeque<AutomationRequest>> {
        self.recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remember(&self, record: &AutomationRequest) {
        let mut recent = self.recent();
        if recent.len() == RECENT_REQUESTS {
            recent.pop_front();
        }
        recent.push_back(record.clone());
    }

    fn resolve_login(&self, request: &ProfileRequest) -> Result<Option<SiteCredentials>> {
        match &request.login {
            SiteLogin::None => Ok(None),
            SiteLogin::Supplied(creds) => Ok(Some(creds.clone())),
            SiteLogin::Stored(id) => {
                let creds = self.store.site_login_credentials(*id, &request.site.name)?;
                log::debug!("Using stored login {} for {}", id, request.site.name);
                Ok(Some(creds))
            }
        }
    }

    fn authenticate(&self, caller: &Caller) -> Result<()> {
        let verified = match caller {
            Caller::Admin(secret) => self.store.verify_admin(secret)?,
            Caller::AppPassword { id, secret } => self.store.verify_app_password(*id, secret)?,
        };
        if verified {
            Ok(())
        } else {
            log::warn!("[!] Rejected request from {:?}", caller);
            Err(AutoVpnError::Unauthorized)
        }
    }

    fn check_rate(&self, caller: &Caller) -> Result<()> {
        match &self.limiter {
            Some(limiter) if limiter.check_key(&caller.rate_key()).is_err() => {
                log::warn!("[!] Rate limit hit for {}", caller.rate_key());
                Err(AutoVpnError::RateLimited)
            }
            _ => Ok(()),
        }
    }

    /// Launches a session and runs the engine while holding the browser
    /// lease. The session is dropped before the lease is released.
    fn run_exclusive(
        &self,
        request: &ProfileRequest,
        credentials: Option<SiteCredentials>,
        record: &mut AutomationRequest,
    ) -> Result<String> {
        let _lease = self
            .browser_lease
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        record.status = RequestStatus::Running;

        let session = self.launcher.launch()?;
        let mut engine = AutomationEngine::new(request.site.clone(), self.retry);
        engine.run(
            &session,
            &Job {
                credentials,
                num_profiles: request.num_profiles,
            },
        )
    }
}
