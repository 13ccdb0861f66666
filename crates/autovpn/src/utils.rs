use crate::error::Result;
use std::env;
use std::path::{Path, PathBuf};

/// Platform-relative path from the home directory to the autovpn data directory.
#[cfg(target_os = "linux")]
const DATA_SUBPATH: &str = ".local/share/autovpn";

#[cfg(target_os = "macos")]
const DATA_SUBPATH: &str = "Library/Application Support/autovpn";

#[cfg(target_os = "windows")]
const DATA_SUBPATH: &str = "AppData/Roaming/autovpn";

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DATA_SUBPATH: &str = ".autovpn";

/// Returns the platform-appropriate data directory. Nothing is created here;
/// the store and browser create what they write into.
///
/// - **Linux:** `~/.local/share/autovpn`
/// - **macOS:** `~/Library/Application Support/autovpn`
/// - **Windows:** `%USERPROFILE%\AppData\Roaming\autovpn`
pub fn get_data_dir() -> Result<PathBuf> {
    let home_dir = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map_err(|_| crate::AutoVpnError::Config("cannot determine home directory".into()))?;
    Ok(PathBuf::from(&home_dir).join(DATA_SUBPATH))
}

/// Directory holding the Chrome profile used by automation runs.
pub fn get_profile_dir(data_dir: &Path) -> Result<PathBuf> {
    let profile = data_dir.join("profile");
    if !profile.exists() {
        std::fs::create_dir_all(&profile)?;
    }
    Ok(profile)
}

/// Completely removes the browser profile (cookies, cached sessions).
pub fn wipe_profile_dir(profile_dir: &Path) -> Result<bool> {
    if profile_dir.exists() {
        std::fs::remove_dir_all(profile_dir)?;
        log::info!("Wiped profile directory: {:?}", profile_dir);
        return Ok(true);
    }
    Ok(false)
}

/// Escapes a string for embedding in a single-quoted JavaScript literal.
pub fn js_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Turns a free-form label into something safe for a file name.
pub fn file_stem(label: &str) -> String {
    let stem: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "AUTOMATION".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_escape_handles_quotes_backslashes_and_newlines() {
        assert_eq!(js_escape(r"a'b\c"), r"a\'b\\c");
        assert_eq!(js_escape("line1\nline2"), "line1\\nline2");
    }

    #[test]
    fn file_stem_replaces_unsafe_characters() {
        assert_eq!(file_stem("u tunnel/pro"), "u_tunnel_pro");
        assert_eq!(file_stem(""), "AUTOMATION");
    }

    #[test]
    fn wipe_profile_dir_reports_whether_anything_was_removed() {
        let dir = tempfile::tempdir().unwrap();
        let profile = get_profile_dir(dir.path()).unwrap();
        std::fs::write(profile.join("Cookies"), b"x").unwrap();

        assert!(wipe_profile_dir(&profile).unwrap());
        assert!(!profile.exists());
        assert!(!wipe_profile_dir(&profile).unwrap());
    }
}
