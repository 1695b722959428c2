//! Auth commands - Login, Logout, and Whoami
//!
//! Provides the `microaudit auth` CLI subcommands which:
//! 1. `login`  - Signs in with email and password (or signs up with
//!    `--signup`) and stores the session in the system keyring. A fresh
//!    account gets the default welcome notes.
//! 2. `logout` - Ends the session on the server and clears the keyring.
//! 3. `whoami` - Shows the signed-in user.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use microaudit_core::config::Config;
use microaudit_core::usecases::SeedDefaultsUseCase;

use super::session::AppSession;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Password; read from MICROAUDIT_PASSWORD when omitted
        #[arg(long, env = "MICROAUDIT_PASSWORD", hide_env_values = true)]
        password: String,
        /// Create the account first
        #[arg(long)]
        signup: bool,
    },
    /// End the session and remove stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
}

impl AuthCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let app = AppSession::connect(config)?;
        match self {
            AuthCommand::Login {
                email,
                password,
                signup,
            } => execute_login(&app, email, password, *signup, &*fmt).await,
            AuthCommand::Logout => execute_logout(&app, &*fmt).await,
            AuthCommand::Whoami => execute_whoami(&app, &*fmt, format).await,
        }
    }
}

async fn execute_login(
    app: &AppSession,
    email: &str,
    password: &str,
    signup: bool,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let session = if signup {
        match app
            .identity
            .sign_up(email, password)
            .await
            .context("Sign-up failed")?
        {
            Some(session) => {
                let seeded = SeedDefaultsUseCase::new(app.store.clone())
                    .execute(&session.user.id)
                    .await
                    .context("Failed to create the welcome notes")?;
                info!(count = seeded.len(), "Created welcome notes");
                session
            }
            None => {
                fmt.success(&format!("Account created for {email}"));
                fmt.info("Confirm your email address, then run 'microaudit auth login'.");
                return Ok(());
            }
        }
    } else {
        app.identity
            .sign_in_with_password(email, password)
            .await
            .context("Sign-in failed")?
    };

    app.keyring
        .store(&session)
        .context("Failed to store session in keyring")?;

    fmt.success(&format!(
        "Signed in as {}",
        session.user.email.as_deref().unwrap_or(email)
    ));
    fmt.print_json(&serde_json::json!({
        "success": true,
        "user_id": session.user.id.as_str(),
        "email": session.user.email,
    }));
    Ok(())
}

async fn execute_logout(app: &AppSession, fmt: &dyn OutputFormatter) -> Result<()> {
    if app.resume().await?.is_none() {
        fmt.info("Not signed in");
        return Ok(());
    }

    // The local session goes away even if the server call fails.
    let server = app.identity.sign_out().await;
    app.keyring.clear()?;
    match server {
        Ok(()) => fmt.success("Signed out"),
        Err(e) => fmt.warn(&format!("Signed out locally; {e:#}")),
    }
    Ok(())
}

async fn execute_whoami(
    app: &AppSession,
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
) -> Result<()> {
    let user = app.resume().await?;
    if format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({
            "signed_in": user.is_some(),
            "user": user,
        }));
        return Ok(());
    }
    match user {
        Some(user) => {
            fmt.success(&format!(
                "Signed in as {}",
                user.email.as_deref().unwrap_or("(no email)")
            ));
            fmt.info(&format!("User id: {}", user.id));
        }
        None => fmt.info("Not signed in. Run 'microaudit auth login'."),
    }
    Ok(())
}
