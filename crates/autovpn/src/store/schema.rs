//! Database schema for the credential store.

use rusqlite::Connection;

/// The admin table holds at most one row: its primary key is pinned to 1, so
/// a second insert fails at the storage layer.
const CREATE_ADMIN_CREDENTIAL: &str = "CREATE TABLE IF NOT EXISTS admin_credential (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    secret_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    rotated_at INTEGER
)";

const CREATE_APP_PASSWORDS: &str = "CREATE TABLE IF NOT EXISTS app_passwords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    secret_hash TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    revoked INTEGER NOT NULL DEFAULT 0,
    revoked_at INTEGER
)";

const CREATE_APP_PASSWORDS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_app_passwords_revoked ON app_passwords(revoked)";

/// Reseller logins the admin keeps per site. The password is replayed into
/// the site's login form, so it is stored as entered.
const CREATE_SITE_LOGINS: &str = "CREATE TABLE IF NOT EXISTS site_logins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    display_name TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
)";

const CREATE_SITE_LOGINS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_site_logins_site ON site_logins(site)";

pub(crate) fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(CREATE_ADMIN_CREDENTIAL, [])?;
    conn.execute(CREATE_APP_PASSWORDS, [])?;
    conn.execute(CREATE_APP_PASSWORDS_INDEX, [])?;
    conn.execute(CREATE_SITE_LOGINS, [])?;
    conn.execute(CREATE_SITE_LOGINS_INDEX, [])?;
    Ok(())
}
