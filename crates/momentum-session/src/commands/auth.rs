//! Session commands.

use super::print_json;
use crate::app::AppContext;
use chrono::{DateTime, Utc};
use client_config_and_utils::{Config, Paths};
use identity_client::{Credentials, OtpPurpose, User};
use serde::Serialize;
use session_lifecycle::{SessionLifecycleManager, SessionPhase};
use tracing::info;

#[derive(Debug, Serialize)]
struct StatusReport {
    authenticated: bool,
    phase: SessionPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StatusReport {
    fn from_manager(manager: &SessionLifecycleManager) -> Self {
        let snapshot = manager.snapshot();
        Self {
            authenticated: snapshot.is_authenticated,
            phase: snapshot.phase,
            user_id: snapshot.user_id,
            email: snapshot.email,
            expires_at: manager.current_session().map(|s| s.expires_at),
        }
    }
}

#[derive(Debug, Serialize)]
struct SignedInReport<'a> {
    user: &'a User,
    expires_at: DateTime<Utc>,
}

/// Restore the persisted session and report it.
pub async fn status(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let app = AppContext::build(config, paths, false)?;
    app.manager.initialize_session().await?;
    print_json(&StatusReport::from_manager(&app.manager))
}

pub async fn login(
    config: &Config,
    paths: &Paths,
    email: String,
    password: String,
) -> anyhow::Result<()> {
    let app = AppContext::build(config, paths, false)?;
    let outcome = app
        .manager
        .login(&Credentials::new(email, password))
        .await?;

    info!(user_id = %outcome.user.id, "Login complete");
    print_json(&SignedInReport {
        user: &outcome.user,
        expires_at: outcome.session.expires_at,
    })
}

pub async fn verify_otp(
    config: &Config,
    paths: &Paths,
    email: &str,
    code: &str,
    purpose: OtpPurpose,
) -> anyhow::Result<()> {
    let app = AppContext::build(config, paths, false)?;
    let outcome = app.manager.verify_otp(email, code, purpose).await?;

    print_json(&SignedInReport {
        user: &outcome.user,
        expires_at: outcome.session.expires_at,
    })
}

pub async fn logout(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let app = AppContext::build(config, paths, false)?;
    app.manager.initialize_session().await?;

    if !app.manager.is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }

    app.manager.logout().await;
    println!("Logged out");
    Ok(())
}

/// Print a usable access token.
pub async fn token(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let app = AppContext::build(config, paths, false)?;
    app.manager.initialize_session().await?;

    match app.manager.get_token().await {
        Some(token) => {
            println!("{}", token);
            Ok(())
        }
        None => anyhow::bail!("Not logged in"),
    }
}
