//! User account CLI commands.

use clap::Subcommand;

use driftchat_core::auth::CredentialStore;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a new user and print a bearer token.
    Add {
        /// Email address (the login identifier).
        email: String,
    },
}

/// `driftchat user add <email>` - prompt for a password, create the account,
/// and issue a first bearer token.
pub async fn add_user(state: &AppState, email: &str, json: bool) -> anyhow::Result<()> {
    let password = dialoguer::Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let user = state.credentials.create_user(email, &password).await?;
    let token = state.credentials.issue(&user.id).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "user_id": user.id,
                "email": user.email,
                "token": token,
            }))?
        );
    } else {
        println!();
        println!(
            "  {} User '{}' created",
            console::style("✓").green(),
            console::style(&user.email).cyan()
        );
        println!();
        println!(
            "  {} Bearer token (save this -- it won't be shown again):",
            console::style("🔑").bold()
        );
        println!();
        println!("  {}", console::style(&token).yellow().bold());
        println!();
    }

    Ok(())
}
