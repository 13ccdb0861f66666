//! Credential store: the admin master secret, revocable app passwords and the
//! reseller logins the admin keeps for each site.
//!
//! All access goes through one SQLite connection behind a mutex, so writes
//! are serialized and the store can be shared between threads. Hashing runs
//! before the lock is taken.

mod schema;
pub mod secret;

use crate::engine::SiteCredentials;
use crate::error::{AutoVpnError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Minimum length accepted for the admin secret.
pub const MIN_ADMIN_SECRET_LEN: usize = 6;

/// Listing view of an app password. Never carries the secret or its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPasswordInfo {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Returned once when an app password is created.
pub struct IssuedAppPassword {
    pub id: i64,
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for IssuedAppPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedAppPassword")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Listing view of a stored site login. The password is not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLoginInfo {
    pub id: i64,
    pub site: String,
    pub username: String,
    pub display_name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

pub struct CredentialStore {
    conn: Mutex<Connection>,
}

impl CredentialStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied
        // statement behind, so the connection stays usable.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Admin credential ─────────────────────────────────────────────────

    pub fn admin_exists(&self) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row("SELECT id FROM admin_credential WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn setup_admin(&self, secret: &str) -> Result<()> {
        check_admin_secret(secret)?;
        let hash = secret::hash_secret(secret)?;

        let inserted = self.conn().execute(
            "INSERT INTO admin_credential (id, secret_hash, created_at) VALUES (1, ?1, ?2)",
            params![hash, Utc::now().timestamp()],
        );
        match inserted {
            Ok(_) => {
                log::info!("[✓] Admin credential initialized");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(AutoVpnError::AlreadyInitialized)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sets up the admin from a configured secret unless one already exists.
    /// Returns `true` when a new admin credential was written.
    pub fn bootstrap_admin(&self, secret: &str) -> Result<bool> {
        match self.setup_admin(secret) {
            Ok(()) => Ok(true),
            Err(AutoVpnError::AlreadyInitialized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fails closed: `false` when no admin has been set up.
    pub fn verify_admin(&self, secret: &str) -> Result<bool> {
        let stored: Option<String> = self
            .conn()
            .query_row(
                "SELECT secret_hash FROM admin_credential WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(stored
            .map(|hash| secret::verify_secret(secret, &hash))
            .unwrap_or(false))
    }

    pub fn rotate_admin(&self, current: &str, new_secret: &str) -> Result<()> {
        if !self.admin_exists()? {
            return Err(AutoVpnError::NotFound("admin credential".into()));
        }
        if !self.verify_admin(current)? {
            return Err(AutoVpnError::Unauthorized);
        }
        check_admin_secret(new_secret)?;
        let hash = secret::hash_secret(new_secret)?;
        self.conn().execute(
            "UPDATE admin_credential SET secret_hash = ?1, rotated_at = ?2 WHERE id = 1",
            params![hash, Utc::now().timestamp()],
        )?;
        log::info!("[✓] Admin credential rotated");
        Ok(())
    }

    // ── App passwords ────────────────────────────────────────────────────

    pub fn create_app_password(&self, name: &str) -> Result<IssuedAppPassword> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AutoVpnError::InvalidRequest(
                "app password name must not be empty".into(),
            ));
        }
        let plaintext = secret::generate_secret();
        let hash = secret::hash_secret(&plaintext)?;

        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO app_passwords (name, secret_hash, created_at) VALUES (?1, ?2, ?3)",
                params![name, hash, Utc::now().timestamp()],
            )?;
            conn.last_insert_rowid()
        };
        log::info!("[✓] App password '{}' created with id {}", name, id);

        Ok(IssuedAppPassword {
            id,
            name: name.to_string(),
            secret: plaintext,
        })
    }

    pub fn list_app_passwords(&self) -> Result<Vec<AppPasswordInfo>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, created_at, revoked FROM app_passwords ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let created: i64 = row.get(2)?;
            Ok(AppPasswordInfo {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
                revoked: row.get(3)?,
            })
        })?;
        let passwords = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(passwords)
    }

    /// Idempotent. The record is kept; only the flag changes.
    pub fn revoke_app_password(&self, id: i64) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE app_passwords SET revoked = 1, revoked_at = COALESCE(revoked_at, ?2) WHERE id = ?1",
            params![id, Utc::now().timestamp()],
        )?;
        if changed == 0 {
            return Err(AutoVpnError::NotFound(format!("app password {}", id)));
        }
        log::info!("[*] App password {} revoked", id);
        Ok(())
    }

    /// `false` for unknown and revoked ids, whatever the secret.
    pub fn verify_app_password(&self, id: i64, secret: &str) -> Result<bool> {
        let row: Option<(String, bool)> = self
            .conn()
            .query_row(
                "SELECT secret_hash, revoked FROM app_passwords WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match row {
            Some((hash, false)) => secret::verify_secret(secret, &hash),
            Some((_, true)) => {
                log::debug!("App password {} is revoked", id);
                false
            }
            None => false,
        })
    }

    // ── Site logins ──────────────────────────────────────────────────────

    pub fn add_site_login(
        &self,
        site: &str,
        credentials: &SiteCredentials,
        display_name: Option<&str>,
    ) -> Result<SiteLoginInfo> {
        let site = site.trim();
        let username = credentials.username.trim();
        if site.is_empty() || username.is_empty() || credentials.password.is_empty() {
            return Err(AutoVpnError::InvalidRequest(
                "site, username and password are all required".into(),
            ));
        }
        let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());
        let now = Utc::now().timestamp();

        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO site_logins (site, username, password, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    site,
                    username,
                    credentials.password,
                    display_name,
                    now
                ],
            )?;
            conn.last_insert_rowid()
        };
        log::info!("[✓] Login #{} for {} stored ({})", id, site, username);

        Ok(SiteLoginInfo {
            id,
            site: site.to_string(),
            username: username.to_string(),
            display_name: display_name.map(str::to_string),
            active: true,
            created_at: DateTime::from_timestamp(now, 0).unwrap_or_default(),
        })
    }

    /// Every stored login, optionally only those for `site`.
    pub fn list_site_logins(&self, site: Option<&str>) -> Result<Vec<SiteLoginInfo>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, site, username, display_name, active, created_at FROM site_logins
             WHERE ?1 IS NULL OR site = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![site], |row| {
            let created: i64 = row.get(5)?;
            Ok(SiteLoginInfo {
                id: row.get(0)?,
                site: row.get(1)?,
                username: row.get(2)?,
                display_name: row.get(3)?,
                active: row.get(4)?,
                created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            })
        })?;
        let logins = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logins)
    }

    /// Idempotent. Deactivated logins stay listed but can no longer be used.
    pub fn deactivate_site_login(&self, id: i64) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE site_logins SET active = 0 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(AutoVpnError::NotFound(format!("site login {}", id)));
        }
        log::info!("[*] Site login {} deactivated", id);
        Ok(())
    }

    /// Credentials of an active login stored for `site`. Unknown, inactive
    /// and other-site logins are all `NotFound`.
    pub(crate) fn site_login_credentials(&self, id: i64, site: &str) -> Result<SiteCredentials> {
        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT username, password FROM site_logins
                 WHERE id = ?1 AND site = ?2 AND active = 1",
                params![id, site],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(username, password)| SiteCredentials::new(username, password))
            .ok_or_else(|| AutoVpnError::NotFound(format!("active login {} for {}", id, site)))
    }
}

fn check_admin_secret(secret: &str) -> Result<()> {
    if secret.chars().count() < MIN_ADMIN_SECRET_LEN {
        return Err(AutoVpnError::InvalidRequest(format!(
            "admin password must be at least {} characters long",
            MIN_ADMIN_SECRET_LEN
        )));
    }
    Ok(())
}
