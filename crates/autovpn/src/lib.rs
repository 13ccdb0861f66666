//! # AutoVPN
//!
//! Automates VPN profile generation on reseller web panels. Callers are
//! authenticated against a local credential store, a headless browser drives
//! the target site through its login and generation forms, and the resulting
//! profile listing is returned as text or converted into a spreadsheet.

pub mod browser;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod logger;
mod page;
pub mod service;
pub mod site;
pub mod store;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used items
pub use browser::{locate_chrome, BrowserOptions, ChromeLauncher};
pub use config::AppConfig;
pub use convert::{convert, convert_with, ConvertOptions};
pub use engine::{AutomationEngine, EngineState, RetryPolicy, SiteCredentials};
pub use error::{AutoVpnError, ErrorCategory, RejectReason, Result};
pub use logger::init_logger;
pub use service::{Caller, Delivery, ProfileRequest, ProfileService, ServiceOptions, SiteLogin};
pub use site::{ResultMode, SiteOptions};
pub use store::{CredentialStore, SiteLoginInfo};
pub use utils::get_data_dir;
