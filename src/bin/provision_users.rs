//! User Provisioning Binary
//!
//! Creates test accounts through the admin identity API, rotates each to the
//! final password, and writes the users.json document the other tools read.

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use loadtest_fixtures::config::Settings;
use loadtest_fixtures::identity::IdentityClient;
use loadtest_fixtures::pacer::PacedQueue;
use loadtest_fixtures::provisioning::{write_users_file, Provisioner};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("provision_users=info".parse()?),
        )
        .with_target(false)
        .init();

    let matches = build_cli().get_matches();
    let mut settings = Settings::from_env();
    apply_overrides(&mut settings, &matches);

    if let Err(e) = settings.provisioning.validate() {
        error!("Fatal: {}", e);
        std::process::exit(e.exit_code());
    }

    let output: PathBuf = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("users.json"));

    let client = match IdentityClient::new(settings.identity.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let provisioner = Provisioner::new(client, settings.provisioning.clone());
    let mut queue = PacedQueue::new(settings.identity.request_delay_ms);
    let users_file = provisioner.provision(&mut queue).await?;
    write_users_file(&output, &users_file)?;
    Ok(())
}

fn build_cli() -> Command {
    Command::new("provision-users")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Create test accounts and persist their credentials")
        .arg(
            Arg::new("count")
                .short('c')
                .long("count")
                .value_name("NUM")
                .value_parser(clap::value_parser!(usize))
                .help("Number of accounts to create"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Platform base URL"),
        )
        .arg(
            Arg::new("admin-token")
                .long("admin-token")
                .value_name("TOKEN")
                .help("Pre-obtained admin bearer token; skips the admin login"),
        )
        .arg(
            Arg::new("admin-username")
                .long("admin-username")
                .value_name("USERNAME")
                .help("Admin username for the provisioning login"),
        )
        .arg(
            Arg::new("admin-password")
                .long("admin-password")
                .value_name("PASSWORD")
                .help("Admin password for the provisioning login"),
        )
        .arg(
            Arg::new("entity-id")
                .long("entity-id")
                .value_name("ID")
                .value_parser(clap::value_parser!(i64))
                .help("Organizational entity assigned to created accounts"),
        )
        .arg(
            Arg::new("role-id")
                .long("role-id")
                .value_name("ID")
                .help("Role id assigned to created accounts"),
        )
        .arg(
            Arg::new("username-prefix")
                .long("username-prefix")
                .value_name("PREFIX")
                .help("Prefix for generated usernames"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("Final password set on every created account"),
        )
        .arg(
            Arg::new("delay")
                .long("delay")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Minimum milliseconds between identity requests"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Where to write the users document [default: users.json]"),
        )
}

fn apply_overrides(settings: &mut Settings, matches: &ArgMatches) {
    if let Some(count) = matches.get_one::<usize>("count") {
        settings.provisioning.user_count = *count;
    }
    if let Some(url) = matches.get_one::<String>("base-url") {
        settings.identity.base_url = url.clone();
    }
    if let Some(token) = matches.get_one::<String>("admin-token") {
        settings.provisioning.admin_token = Some(token.clone());
    }
    if let Some(username) = matches.get_one::<String>("admin-username") {
        settings.provisioning.admin_username = username.clone();
    }
    if let Some(password) = matches.get_one::<String>("admin-password") {
        settings.provisioning.admin_password = password.clone();
    }
    if let Some(entity_id) = matches.get_one::<i64>("entity-id") {
        settings.provisioning.entity_id = *entity_id;
    }
    if let Some(role_id) = matches.get_one::<String>("role-id") {
        settings.provisioning.role_id = role_id.clone();
    }
    if let Some(prefix) = matches.get_one::<String>("username-prefix") {
        settings.provisioning.username_prefix = prefix.clone();
    }
    if let Some(password) = matches.get_one::<String>("password") {
        settings.identity.default_password = password.clone();
    }
    if let Some(delay) = matches.get_one::<u64>("delay") {
        settings.identity.request_delay_ms = *delay;
    }
}
