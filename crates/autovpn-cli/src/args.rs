use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "autovpn",
    author,
    version,
    about = "Generate VPN profiles on reseller panels and manage access to them"
)]
pub struct Args {
    /// Logging verbosity.
    #[arg(short, long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub level: LogLevel,

    /// Configuration file (defaults to autovpn.toml in the data directory).
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Credential database, overriding the configured one.
    #[arg(long, value_name = "FILE", global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the admin master password.
    SetupAdmin,
    /// Check a password against the stored admin password.
    VerifyAdmin,
    /// Change the admin master password.
    RotateAdmin,
    /// Issue a new app password (requires the admin password).
    CreatePassword {
        /// Label shown in listings.
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List issued app passwords (requires the admin password).
    ListPasswords,
    /// Revoke an app password (requires the admin password).
    RevokePassword {
        /// Id printed by create-password.
        id: i64,
    },
    /// Store a reseller login for a site (requires the admin password).
    AddLogin {
        /// Site description (TOML) the login belongs to.
        #[arg(short, long, value_name = "FILE")]
        site: PathBuf,

        /// Username on the target site; prompted for when omitted.
        #[arg(short, long)]
        username: Option<String>,

        /// Label shown in listings.
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List stored reseller logins (requires the admin password).
    ListLogins {
        /// Only show logins for this site description.
        #[arg(short, long, value_name = "FILE")]
        site: Option<PathBuf>,
    },
    /// Stop a stored reseller login from being used (requires the admin password).
    DeactivateLogin {
        /// Id printed by add-login.
        id: i64,
    },
    /// Log in to a site and generate profiles.
    Generate {
        /// Site description (TOML).
        #[arg(short, long, value_name = "FILE")]
        site: PathBuf,

        /// Number of profiles to generate.
        #[arg(short = 'n', long)]
        count: u32,

        /// Authenticate with this app password id instead of the admin password.
        #[arg(long, value_name = "ID")]
        password_id: Option<i64>,

        /// Use the reseller login stored under this id.
        #[arg(long, value_name = "ID", conflicts_with = "username")]
        login_id: Option<i64>,

        /// Username on the target site; prompted for when the site needs a
        /// login and no stored login is given.
        #[arg(short, long)]
        username: Option<String>,

        /// Print the extracted text instead of writing a spreadsheet.
        #[arg(long)]
        raw: bool,

        /// Where to write the output (defaults to the export directory).
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Convert a CSV listing into a spreadsheet without touching a browser.
    Convert {
        /// CSV file to read.
        input: PathBuf,

        /// Spreadsheet to write (defaults to the input with an .xlsx extension).
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Field delimiter.
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,
    },
    /// Delete the browser profile (cookies and cached sessions).
    Clean,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
