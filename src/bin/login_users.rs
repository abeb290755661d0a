//! Bulk Login Binary
//!
//! Re-authenticates every usable entry in the users document and writes a
//! single-column CSV of the obtained bearer tokens. Per-user failures are
//! logged and skipped.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use loadtest_fixtures::config::Settings;
use loadtest_fixtures::credentials::load_credentials;
use loadtest_fixtures::csvout;
use loadtest_fixtures::identity::IdentityClient;
use loadtest_fixtures::models::FieldValue;
use loadtest_fixtures::pacer::PacedQueue;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("login_users=info".parse()?))
        .with_target(false)
        .init();

    let matches = build_cli().get_matches();
    let mut settings = Settings::from_env();
    apply_overrides(&mut settings, &matches);

    let output: PathBuf = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tokens.csv"));

    let credentials = match load_credentials(
        &settings.run.users_file,
        &settings.identity.default_password,
    ) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let client = match IdentityClient::new(settings.identity.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let mut queue = PacedQueue::new(settings.identity.request_delay_ms);
    let mut tokens = Vec::new();
    let total = credentials.len();

    for (index, credential) in credentials.iter().enumerate() {
        let item = queue
            .run(&credential.username, || {
                client.request_token(&credential.username, &credential.password)
            })
            .await;
        match item.outcome {
            Ok(token) => {
                info!(
                    "Login successful {}/{}: {}",
                    index + 1,
                    total,
                    credential.username
                );
                tokens.push(token);
            }
            Err(e) => warn!(
                "Login failed {}/{} ({}): {}",
                index + 1,
                total,
                credential.username,
                e
            ),
        }
    }

    let rows: Vec<Vec<FieldValue>> = tokens
        .into_iter()
        .map(|token| vec![FieldValue::from(token)])
        .collect();
    csvout::write_file(&output, &["token"], &rows)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote {} token(s) to {}", rows.len(), output.display());
    Ok(())
}

fn build_cli() -> Command {
    Command::new("login-users")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Authenticate every provisioned user and emit a token CSV")
        .arg(
            Arg::new("users-file")
                .short('u')
                .long("users-file")
                .value_name("FILE")
                .help("Provisioned users document (users.json)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Token CSV path [default: tokens.csv]"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Platform base URL"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("Password for roster entries that carry none"),
        )
        .arg(
            Arg::new("delay")
                .long("delay")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Minimum milliseconds between identity requests"),
        )
}

fn apply_overrides(settings: &mut Settings, matches: &ArgMatches) {
    if let Some(path) = matches.get_one::<String>("users-file") {
        settings.run.users_file = PathBuf::from(path);
    }
    if let Some(url) = matches.get_one::<String>("base-url") {
        settings.identity.base_url = url.clone();
    }
    if let Some(password) = matches.get_one::<String>("password") {
        settings.identity.default_password = password.clone();
    }
    if let Some(delay) = matches.get_one::<u64>("delay") {
        settings.identity.request_delay_ms = *delay;
    }
}
