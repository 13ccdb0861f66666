use colored::Colorize;
use log::{Level, LevelFilter};
use std::io::Write;

/// Modules that log every CDP frame at debug level.
const NOISY_MODULES: &[&str] = &["headless_chrome", "tungstenite", "rustls", "ureq"];

/// Installs the global logger.
///
/// `level` is the baseline chosen on the command line; `RUST_LOG` directives
/// are applied on top so a single module can be turned up without flooding
/// the console with browser transport traffic.
pub fn init_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter(None, level);
    for module in NOISY_MODULES {
        builder.filter(Some(module), level.min(LevelFilter::Warn));
    }
    builder
        .parse_default_env()
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "ERROR".red(),
                Level::Warn => "WARN".yellow(),
                Level::Info => "INFO".green(),
                Level::Debug => "DEBUG".blue(),
                Level::Trace => "TRACE".purple(),
            };
            if record.level() >= Level::Debug {
                let target = record.target().dimmed();
                writeln!(buf, "[{}] {} - {}", level, target, record.args())
            } else {
                writeln!(buf, "[{}] - {}", level, record.args())
            }
        })
        .init();
}
