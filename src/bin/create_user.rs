use std::io::{self, Write};
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use asset_server::auth::{AuthConfig, AuthError, AuthState, PgAccountStore};
use asset_server::db::run_migrations;

#[derive(Parser, Debug)]
#[command(
    name = "create_user",
    about = "Register an asset-server account and print its first session token"
)]
struct Args {
    /// Username for the account (case sensitive).
    #[arg(long)]
    username: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Postgres connection string; defaults to DATABASE_URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let username = args.username.trim();

    if username.is_empty() || args.password.is_empty() {
        writeln!(io::stderr(), "error: username and password must not be empty")?;
        std::process::exit(1);
    }

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&args.database_url)
        .await?;
    run_migrations(&pool).await?;

    let config = AuthConfig::from_env()?;
    let state = AuthState::new(config, Arc::new(PgAccountStore::new(pool.clone())))?;

    let result = state
        .sessions
        .register(username, &args.password, Utc::now())
        .await;
    pool.close().await;

    match result {
        Ok(token) => {
            println!("Created user '{username}'");
            println!("token: {}", token.token);
            println!("issued: {}", token.issued_at.to_rfc3339());
            println!("expires: {}", token.expires_at.to_rfc3339());
            Ok(())
        }
        Err(AuthError::AlreadyRegistered) => {
            writeln!(io::stderr(), "error: user '{username}' already exists.")?;
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
