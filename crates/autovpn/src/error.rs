use crate::engine::EngineState;
use std::fmt;
use thiserror::Error;

/// High-level error category for user-facing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller identity problems - wrong secret, revoked password, setup state.
    Authentication,
    /// The browser run against the target site failed.
    Automation,
    /// The caller or the site handed us data we cannot use.
    Input,
    /// Storage, browser launch, filesystem.
    System,
}

/// Why the target site refused a run. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The site showed a login error for the submitted credentials.
    AuthenticationRejected(String),
    /// A locator did not resolve the way the site options expect.
    StructureMismatch(String),
    /// The account does not have enough credit for the requested profiles.
    InsufficientCredit { available: u64, requested: u32 },
    /// The site reported a failure after the generation form was submitted.
    OperationFailed(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AuthenticationRejected(msg) => {
                write!(f, "site rejected the login: {}", msg)
            }
            RejectReason::StructureMismatch(msg) => {
                write!(f, "page structure does not match site options: {}", msg)
            }
            RejectReason::InsufficientCredit {
                available,
                requested,
            } => write!(
                f,
                "insufficient credit (available: {}, requested: {})",
                available, requested
            ),
            RejectReason::OperationFailed(msg) => write!(f, "operation failed: {}", msg),
        }
    }
}

#[derive(Debug, Error)]
pub enum AutoVpnError {
    #[error("admin credential is already initialized")]
    AlreadyInitialized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("automation timed out while {state} after {attempts} attempts: {detail}")]
    AutomationTimeout {
        state: EngineState,
        attempts: u32,
        detail: String,
    },

    #[error("automation rejected: {0}")]
    AutomationRejected(RejectReason),

    #[error("malformed input at line {line}: {reason}")]
    MalformedInput { line: u64, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt failed: {0}")]
    Prompt(String),
}

pub type Result<T, E = AutoVpnError> = std::result::Result<T, E>;

impl AutoVpnError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AutoVpnError::AlreadyInitialized
            | AutoVpnError::NotFound(_)
            | AutoVpnError::Unauthorized
            | AutoVpnError::RateLimited => ErrorCategory::Authentication,
            AutoVpnError::AutomationTimeout { .. } | AutoVpnError::AutomationRejected(_) => {
                ErrorCategory::Automation
            }
            AutoVpnError::MalformedInput { .. }
            | AutoVpnError::InvalidRequest(_)
            | AutoVpnError::Config(_) => ErrorCategory::Input,
            AutoVpnError::Browser(_)
            | AutoVpnError::Database(_)
            | AutoVpnError::Hashing(_)
            | AutoVpnError::Spreadsheet(_)
            | AutoVpnError::Io(_)
            | AutoVpnError::Prompt(_) => ErrorCategory::System,
        }
    }

    /// Only automation timeouts are worth trying again as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AutoVpnError::AutomationTimeout { .. })
    }

    /// Message safe to show to an end user. Storage and hashing internals are
    /// replaced with a generic line; the full error still goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            AutoVpnError::AlreadyInitialized => "Admin is already set up.".to_string(),
            AutoVpnError::NotFound(what) => format!("{} not found.", capitalize(what)),
            AutoVpnError::Unauthorized => "Invalid password.".to_string(),
            AutoVpnError::AutomationTimeout {
                state, attempts, ..
            } => format!(
                "The site did not respond in time while {} ({} attempts).",
                state, attempts
            ),
            AutoVpnError::AutomationRejected(reason) => {
                format!("Profile generation was rejected: {}.", reason)
            }
            AutoVpnError::MalformedInput { line, reason } => {
                format!("Extracted data is malformed (line {}): {}.", line, reason)
            }
            AutoVpnError::InvalidRequest(msg) => format!("Invalid request: {}.", msg),
            AutoVpnError::RateLimited => {
                "Too many requests. Please wait a minute and try again.".to_string()
            }
            AutoVpnError::Config(msg) => format!("Configuration error: {}.", msg),
            AutoVpnError::Browser(_) => {
                "The browser could not be started or was lost. Check the logs for details."
                    .to_string()
            }
            AutoVpnError::Io(e) => format!("File error: {}.", e),
            AutoVpnError::Prompt(_) => "Input was aborted.".to_string(),
            AutoVpnError::Database(_)
            | AutoVpnError::Hashing(_)
            | AutoVpnError::Spreadsheet(_) => {
                "An internal error occurred. Check the logs for details.".to_string()
            }
        }
    }

    /// Process exit code for the CLI; distinct per error kind, never 0.
    pub fn exit_code(&self) -> u8 {
        match self {
            AutoVpnError::AlreadyInitialized => 2,
            AutoVpnError::NotFound(_) => 3,
            AutoVpnError::Unauthorized => 4,
            AutoVpnError::AutomationTimeout { .. } => 5,
            AutoVpnError::AutomationRejected(_) => 6,
            AutoVpnError::MalformedInput { .. } => 7,
            AutoVpnError::InvalidRequest(_) => 8,
            AutoVpnError::RateLimited => 9,
            AutoVpnError::Config(_) => 10,
            AutoVpnError::Browser(_) => 11,
            AutoVpnError::Database(_)
            | AutoVpnError::Hashing(_)
            | AutoVpnError::Spreadsheet(_)
            | AutoVpnError::Io(_)
            | AutoVpnError::Prompt(_) => 1,
        }
    }
}

impl From<anyhow::Error> for AutoVpnError {
    fn from(err: anyhow::Error) -> Self {
        AutoVpnError::Browser(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AutoVpnError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AutoVpnError::Hashing(err.to_string())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AutoVpnError::Hashing("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into());
        assert!(!err.user_message().contains("argon2"));
        assert_eq!(err.category(), ErrorCategory::System);

        let err = AutoVpnError::Browser("ws://127.0.0.1:9222 closed".into());
        assert!(!err.user_message().contains("127.0.0.1"));
    }

    #[test]
    fn exit_codes_are_nonzero_and_distinct() {
        let errors = [
            AutoVpnError::AlreadyInitialized,
            AutoVpnError::NotFound("app password".into()),
            AutoVpnError::Unauthorized,
            AutoVpnError::AutomationTimeout {
                state: EngineState::AwaitingPageLoad,
                attempts: 3,
                detail: "ready element not present".into(),
            },
            AutoVpnError::AutomationRejected(RejectReason::StructureMismatch("x".into())),
            AutoVpnError::MalformedInput {
                line: 2,
                reason: "expected 3 columns".into(),
            },
        ];
        let codes: HashSet<u8> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(AutoVpnError::AutomationTimeout {
            state: EngineState::ExtractingData,
            attempts: 1,
            detail: String::new(),
        }
        .is_retryable());
        assert!(!AutoVpnError::AutomationRejected(RejectReason::OperationFailed("Error".into()))
            .is_retryable());
        assert!(!AutoVpnError::MalformedInput {
            line: 1,
            reason: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn not_found_message_is_capitalized() {
        let err = AutoVpnError::NotFound("app password 7".into());
        assert_eq!(err.user_message(), "App password 7 not found.");
    }
}
