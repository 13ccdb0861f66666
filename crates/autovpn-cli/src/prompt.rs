use autovpn::store::MIN_ADMIN_SECRET_LEN;
use autovpn::{AutoVpnError, Result};
use console::Style;
use dialoguer::{Input, Password};

fn prompt_err(e: dialoguer::Error) -> AutoVpnError {
    AutoVpnError::Prompt(e.to_string())
}

/// Asks for a secret without echoing it.
pub(crate) fn secret(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(prompt_err)
}

/// Asks for a secret twice, without echoing it.
pub(crate) fn confirmed_secret(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match, try again")
        .interact()
        .map_err(prompt_err)
}

/// Asks for a new admin secret twice and enforces the minimum length.
pub(crate) fn new_admin_secret(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match, try again")
        .validate_with(|input: &String| -> std::result::Result<(), String> {
            if input.chars().count() >= MIN_ADMIN_SECRET_LEN {
                Ok(())
            } else {
                Err(format!(
                    "Password must be at least {} characters long",
                    MIN_ADMIN_SECRET_LEN
                ))
            }
        })
        .interact()
        .map_err(prompt_err)
}

pub(crate) fn text(prompt: &str) -> Result<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .map_err(prompt_err)
}

/// Prints a one-time secret so it stands out from log lines.
pub(crate) fn show_secret(label: &str, secret: &str) {
    let bold = Style::new().bold();
    let cyan = Style::new().cyan().bold();
    eprintln!("{} {}", bold.apply_to(">>"), label);
    println!("{}", cyan.apply_to(secret));
    eprintln!(
        "{}",
        Style::new()
            .dim()
            .apply_to("This secret is shown only once. Store it somewhere safe.")
    );
}
