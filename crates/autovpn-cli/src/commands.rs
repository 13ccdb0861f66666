use crate::args::{Args, Command};
use crate::prompt;
use autovpn::utils::wipe_profile_dir;
use autovpn::{
    AppConfig, AutoVpnError, BrowserOptions, Caller, ChromeLauncher, ConvertOptions,
    CredentialStore, ProfileRequest, ProfileService, Result, ServiceOptions, SiteCredentials,
    SiteLogin, SiteOptions,
};
use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Loads configuration, applies command-line overrides, and runs the command.
pub(crate) fn run(args: Args) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(db) = args.database {
        config.database = db;
    }

    // Only credential-backed commands open (and possibly create) the database.
    let store = || open_store(&config);

    match args.command {
        Command::SetupAdmin => setup_admin(&*store()?),
        Command::VerifyAdmin => verify_admin(&*store()?),
        Command::RotateAdmin => rotate_admin(&*store()?),
        Command::CreatePassword { name } => create_password(&*store()?, name),
        Command::ListPasswords => list_passwords(&*store()?),
        Command::RevokePassword { id } => revoke_password(&*store()?, id),
        Command::AddLogin {
            site,
            username,
            display_name,
        } => add_login(&*store()?, &site, username, display_name),
        Command::ListLogins { site } => list_logins(&*store()?, site.as_deref()),
        Command::DeactivateLogin { id } => deactivate_login(&*store()?, id),
        Command::Generate {
            site,
            count,
            password_id,
            login_id,
            username,
            raw,
            output,
        } => generate(
            &config,
            store()?,
            GenerateArgs {
                site,
                count,
                password_id,
                login_id,
                username,
                raw,
                output,
            },
        ),
        Command::Convert {
            input,
            output,
            delimiter,
        } => convert(&input, output, delimiter),
        Command::Clean => clean(&config),
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<CredentialStore>> {
    let store = CredentialStore::open(&config.database)?;
    log::debug!("Using credential database {:?}", config.database);
    if let Some(secret) = &config.admin_bootstrap {
        if store.bootstrap_admin(secret)? {
            info!("[✓] Admin password initialized from AUTOVPN_ADMIN_PASSWORD");
        }
    }
    Ok(Arc::new(store))
}

// ── Credential commands ──────────────────────────────────────────────────────

fn setup_admin(store: &CredentialStore) -> Result<()> {
    if store.admin_exists()? {
        return Err(AutoVpnError::AlreadyInitialized);
    }
    let secret = prompt::new_admin_secret("New admin password")?;
    store.setup_admin(&secret)?;
    info!("[✓] Admin password set");
    Ok(())
}

fn verify_admin(store: &CredentialStore) -> Result<()> {
    let secret = prompt::secret("Admin password")?;
    if store.verify_admin(&secret)? {
        info!("[✓] Admin password is valid");
        Ok(())
    } else {
        Err(AutoVpnError::Unauthorized)
    }
}

/// Gate for commands that manage app passwords and site logins.
fn require_admin(store: &CredentialStore) -> Result<()> {
    if !store.admin_exists()? {
        log::warn!("[!] No admin password yet; run `autovpn setup-admin` first");
        return Err(AutoVpnError::NotFound("admin credential".into()));
    }
    let secret = prompt::secret("Admin password")?;
    if store.verify_admin(&secret)? {
        Ok(())
    } else {
        Err(AutoVpnError::Unauthorized)
    }
}

fn rotate_admin(store: &CredentialStore) -> Result<()> {
    let current = prompt::secret("Current admin password")?;
    if !store.verify_admin(&current)? {
        return Err(AutoVpnError::Unauthorized);
    }
    let new_secret = prompt::new_admin_secret("New admin password")?;
    store.rotate_admin(&current, &new_secret)?;
    info!("[✓] Admin password changed");
    Ok(())
}

fn create_password(store: &CredentialStore, name: Option<String>) -> Result<()> {
    require_admin(store)?;
    let name = match name {
        Some(n) => n,
        None => prompt::text("Name for the new app password")?,
    };
    let issued = store.create_app_password(&name)?;
    prompt::show_secret(
        &format!("App password #{} ({})", issued.id, issued.name),
        &issued.secret,
    );
    Ok(())
}

fn list_passwords(store: &CredentialStore) -> Result<()> {
    require_admin(store)?;
    let passwords = store.list_app_passwords()?;
    if passwords.is_empty() {
        info!("No app passwords issued yet.");
        return Ok(());
    }

    let header = Style::new().bold();
    let active = Style::new().green();
    let revoked = Style::new().red();
    println!(
        "{}",
        header.apply_to(format!(
            "{:<6} {:<24} {:<20} {}",
            "ID", "NAME", "CREATED (UTC)", "STATUS"
        ))
    );
    for p in passwords {
        let status = if p.revoked {
            revoked.apply_to("revoked")
        } else {
            active.apply_to("active")
        };
        println!(
            "{:<6} {:<24} {:<20} {}",
            p.id,
            p.name,
            p.created_at.format("%Y-%m-%d %H:%M:%S"),
            status
        );
    }
    Ok(())
}

fn revoke_password(store: &CredentialStore, id: i64) -> Result<()> {
    require_admin(store)?;
    store.revoke_app_password(id)?;
    info!("[✓] App password #{} revoked", id);
    Ok(())
}

// ── Site logins ──────────────────────────────────────────────────────────────

fn add_login(
    store: &CredentialStore,
    site: &Path,
    username: Option<String>,
    display_name: Option<String>,
) -> Result<()> {
    require_admin(store)?;
    let site = SiteOptions::load(site)?;
    let username = match username {
        Some(u) => u,
        None => prompt::text(&format!("Username on {}", site.name))?,
    };
    let password = prompt::confirmed_secret(&format!("Password on {}", site.name))?;
    let stored = store.add_site_login(
        &site.name,
        &SiteCredentials::new(username, password),
        display_name.as_deref(),
    )?;
    info!(
        "[✓] Login #{} stored for {}; use it with `generate --login-id {}`",
        stored.id, stored.site, stored.id
    );
    Ok(())
}

fn list_logins(store: &CredentialStore, site: Option<&Path>) -> Result<()> {
    require_admin(store)?;
    let site = site.map(SiteOptions::load).transpose()?;
    let logins = store.list_site_logins(site.as_ref().map(|s| s.name.as_str()))?;
    if logins.is_empty() {
        info!("No site logins stored yet.");
        return Ok(());
    }

    let header = Style::new().bold();
    let active = Style::new().green();
    let inactive = Style::new().red();
    println!(
        "{}",
        header.apply_to(format!(
            "{:<6} {:<16} {:<28} {:<20} {:<20} {}",
            "ID", "SITE", "USERNAME", "NAME", "CREATED (UTC)", "STATUS"
        ))
    );
    for l in logins {
        let status = if l.active {
            active.apply_to("active")
        } else {
            inactive.apply_to("inactive")
        };
        println!(
            "{:<6} {:<16} {:<28} {:<20} {:<20} {}",
            l.id,
            l.site,
            l.username,
            l.display_name.as_deref().unwrap_or("-"),
            l.created_at.format("%Y-%m-%d %H:%M:%S"),
            status
        );
    }
    Ok(())
}

fn deactivate_login(store: &CredentialStore, id: i64) -> Result<()> {
    require_admin(store)?;
    store.deactivate_site_login(id)?;
    info!("[✓] Site login #{} deactivated", id);
    Ok(())
}

// ── Automation commands ──────────────────────────────────────────────────────

struct GenerateArgs {
    site: PathBuf,
    count: u32,
    password_id: Option<i64>,
    login_id: Option<i64>,
    username: Option<String>,
    raw: bool,
    output: Option<PathBuf>,
}

fn generate(config: &AppConfig, store: Arc<CredentialStore>, args: GenerateArgs) -> Result<()> {
    let site = SiteOptions::load(&args.site)?;

    let caller = match args.password_id {
        Some(id) => Caller::AppPassword {
            id,
            secret: prompt::secret(&format!("App password #{}", id))?,
        },
        None => Caller::Admin(prompt::secret("Admin password")?),
    };

    let login = match args.login_id {
        Some(id) => SiteLogin::Stored(id),
        None if site.requires_login() => {
            let username = match args.username {
                Some(u) => u,
                None => prompt::text(&format!("Username on {}", site.name))?,
            };
            let password = prompt::secret(&format!("Password on {}", site.name))?;
            SiteLogin::Supplied(SiteCredentials::new(username, password))
        }
        None => SiteLogin::None,
    };

    let launcher = ChromeLauncher::new(BrowserOptions::from_config(config)?);
    let service = ProfileService::new(store, launcher, ServiceOptions::from(config));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Generating {} profile(s) on {}",
        args.count, site.name
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = service.submit(
        &caller,
        ProfileRequest {
            site,
            login,
            num_profiles: args.count,
            export: !args.raw,
        },
    );
    spinner.finish_and_clear();
    let delivery = outcome?;

    if args.raw {
        let text = delivery.request.result_text.unwrap_or_default();
        match args.output {
            Some(path) => {
                std::fs::write(&path, format!("{}\n", text))?;
                info!("[✓] Saved {}", path.display());
            }
            None => println!("{}", text),
        }
        return Ok(());
    }

    if let Some(artifact) = delivery.artifact {
        match args.output {
            Some(path) => {
                std::fs::write(&path, &artifact.bytes)?;
                info!("[✓] Saved {}", path.display());
            }
            None => {
                artifact.write_to(&config.export_dir)?;
            }
        }
    }
    Ok(())
}

fn convert(input: &Path, output: Option<PathBuf>, delimiter: char) -> Result<()> {
    if !delimiter.is_ascii() {
        return Err(AutoVpnError::InvalidRequest(format!(
            "delimiter '{}' is not an ASCII character",
            delimiter
        )));
    }
    let delimiter = delimiter as u8;
    let raw = std::fs::read_to_string(input)?;
    let bytes = autovpn::convert_with(
        &raw,
        &ConvertOptions {
            delimiter,
            ..ConvertOptions::default()
        },
    )?;

    let output = output.unwrap_or_else(|| input.with_extension("xlsx"));
    std::fs::write(&output, bytes)?;
    info!("[✓] Wrote {}", output.display());
    Ok(())
}

fn clean(config: &AppConfig) -> Result<()> {
    if wipe_profile_dir(&config.data_dir.join("profile"))? {
        info!("Browser profile successfully removed.");
    } else {
        info!("No browser profile to remove.");
    }
    Ok(())
}
