//! # AutoVPN
//!
//! Manages the admin password and app passwords that gate profile generation,
//! drives a reseller panel through a headless browser to generate VPN
//! profiles, and converts the resulting listings into spreadsheets.

mod args;
mod commands;
mod prompt;

use args::Args;
use autovpn::{init_logger, AutoVpnError, ErrorCategory};
use clap::Parser;
use log::{debug, error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.level.into());

    match commands::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("{:?}", e);
            error!("{}", e.user_message());
            if let Some(hint) = hint(&e) {
                info!("{}", hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Follow-up advice printed under the error line.
fn hint(e: &AutoVpnError) -> Option<&'static str> {
    if e.is_retryable() {
        return Some("The site was slow to respond; running the same command again usually works.");
    }
    match e.category() {
        ErrorCategory::Automation => {
            Some("The site refused the request; check the site file and the account's credit.")
        }
        ErrorCategory::System => Some("Run again with --level debug for the full error."),
        ErrorCategory::Authentication | ErrorCategory::Input => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autovpn::{EngineState, RejectReason};

    #[test]
    fn timeouts_suggest_a_retry() {
        let err = AutoVpnError::AutomationTimeout {
            state: EngineState::AwaitingPageLoad,
            attempts: 5,
            detail: "form#bulk not present".into(),
        };
        assert!(hint(&err).unwrap().contains("again"));
    }

    #[test]
    fn hints_follow_the_error_category() {
        let rejected = AutoVpnError::AutomationRejected(RejectReason::OperationFailed("x".into()));
        assert!(hint(&rejected).unwrap().contains("credit"));
        assert!(hint(&AutoVpnError::Browser("gone".into()))
            .unwrap()
            .contains("--level debug"));
        assert!(hint(&AutoVpnError::Unauthorized).is_none());
        assert!(hint(&AutoVpnError::InvalidRequest("n".into())).is_none());
    }
}
