//! Fixture Generation Binary
//!
//! Authenticates the provisioned roster, loads per-user access scopes, and
//! writes one CSV file per fixture definition under a timestamped directory.

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use loadtest_fixtures::config::Settings;
use loadtest_fixtures::engine;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("generate_fixtures=info".parse()?),
        )
        .with_target(false)
        .init();

    let matches = build_cli().get_matches();
    let mut settings = Settings::from_env();
    apply_overrides(&mut settings, &matches);

    info!(
        "Generating {} row(s) per fixture from {}",
        settings.run.rows_per_fixture,
        settings.run.users_file.display()
    );

    match engine::run(&settings).await {
        Ok(summary) => {
            if summary.fixtures_failed.is_empty() {
                info!("Done, all fixture files generated");
            } else {
                error!(
                    "Done with failures: {}",
                    summary.fixtures_failed.join(", ")
                );
            }
            Ok(())
        }
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn build_cli() -> Command {
    Command::new("generate-fixtures")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate identity-scoped CSV fixture data for load testing")
        .arg(
            Arg::new("rows")
                .short('n')
                .long("rows")
                .value_name("NUM")
                .value_parser(clap::value_parser!(usize))
                .help("Rows to generate per fixture definition"),
        )
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
                .value_name("DIR")
                .help("Directory for timestamped run directories"),
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
            Arg::new("database-url")
                .long("database-url")
                .value_name("URL")
                .help("PostgreSQL connection URL"),
        )
        .arg(
            Arg::new("mongodb-url")
                .long("mongodb-url")
                .value_name("URL")
                .help("MongoDB connection URL"),
        )
        .arg(
            Arg::new("mongodb-database")
                .long("mongodb-database")
                .value_name("NAME")
                .help("MongoDB database name"),
        )
        .arg(
            Arg::new("tenant-id")
                .long("tenant-id")
                .value_name("TENANT")
                .help("Tenant filter for document-store samples"),
        )
}

fn apply_overrides(settings: &mut Settings, matches: &ArgMatches) {
    if let Some(rows) = matches.get_one::<usize>("rows") {
        settings.run.rows_per_fixture = *rows;
    }
    if let Some(path) = matches.get_one::<String>("users-file") {
        settings.run.users_file = PathBuf::from(path);
    }
    if let Some(path) = matches.get_one::<String>("output") {
        settings.run.output_dir = PathBuf::from(path);
    }
    if let Some(url) = matches.get_one::<String>("base-url") {
        settings.identity.base_url = url.clone();
    }
    if let Some(password) = matches.get_one::<String>("password") {
        settings.identity.default_password = password.clone();
    }
    if let Some(url) = matches.get_one::<String>("database-url") {
        settings.stores.database_url = url.clone();
    }
    if let Some(url) = matches.get_one::<String>("mongodb-url") {
        settings.stores.mongodb_url = url.clone();
    }
    if let Some(name) = matches.get_one::<String>("mongodb-database") {
        settings.stores.mongodb_database = name.clone();
    }
    if let Some(tenant) = matches.get_one::<String>("tenant-id") {
        settings.stores.tenant_id = tenant.clone();
    }
}
