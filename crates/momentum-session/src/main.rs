//! Momentum session CLI - headless driver for the session lifecycle core.

mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};
use identity_client::OtpPurpose;

/// Momentum session command-line interface.
#[derive(Parser)]
#[command(name = "momentum-session")]
#[command(about = "Sign in, inspect, and watch the Momentum client session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Falls back to the config file
    #[arg(short, long, global = true, env = "MOMENTUM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Base directory for runtime files (config, session, logs). Defaults to ~/.momentum
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session
    Status,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MOMENTUM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Verify a one-time code
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
        /// signup, email, recovery, or email_change
        #[arg(long, default_value = "signup")]
        purpose: OtpPurpose,
    },
    /// Sign out and forget the local session
    Logout,
    /// Print a usable access token, refreshing it if needed
    Token,
    /// Probe reachability once
    Probe,
    /// Monitor connectivity and keep the session fresh until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    init_logging("momentum-session", log_level(cli.log_level.as_deref(), &config));

    match cli.command {
        Commands::Status => commands::auth::status(&config, &paths).await,
        Commands::Login { email, password } => {
            commands::auth::login(&config, &paths, email, password).await
        }
        Commands::VerifyOtp {
            email,
            code,
            purpose,
        } => commands::auth::verify_otp(&config, &paths, &email, &code, purpose).await,
        Commands::Logout => commands::auth::logout(&config, &paths).await,
        Commands::Token => commands::auth::token(&config, &paths).await,
        Commands::Probe => commands::connectivity::probe(&config).await,
        Commands::Watch => commands::connectivity::watch(&config, &paths).await,
    }
}

/// The `--log-level` flag wins over the configured level.
fn log_level<'a>(flag: Option<&'a str>, config: &'a Config) -> &'a str {
    flag.unwrap_or(&config.log_level)
}
