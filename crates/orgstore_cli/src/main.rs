//! Command-line entry point for the organization store.
//!
//! # Responsibility
//! - Verify `orgstore_core` linkage and storage bootstrap from a shell.
//! - Expose read and delete use cases with JSON output.

use clap::{Parser, Subcommand};
use orgstore_core::{
    core_version, init_logging, open_from_config, ping, CoreConfig, LogMailer, Notifier,
    OrganizationReadService, OrganizationWriteService, SearchCriteria,
    SqliteOrganizationRepository,
};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "orgstore_cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Organization store command-line tool")]
#[command(
    after_help = "Environment:\n  ORGSTORE_DB_PATH       SQLite file (in-memory when unset)\n  ORGSTORE_LOG_LEVEL     trace|debug|info|warn|error\n  ORGSTORE_LOG_DIR       Absolute directory for rotated log files\n  ORGSTORE_MAIL_ENABLED  Send create notifications (true|false)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Check core linkage
    Ping,
    /// Print the core crate version
    Version,
    /// Load one organization by id
    Get {
        id: String,
        /// Also load the organization's locations
        #[arg(long)]
        with_locations: bool,
    },
    /// Search organizations by `key=value` criteria
    Find {
        #[arg(value_name = "KEY=VALUE", value_parser = parse_criterion)]
        criteria: Vec<(String, String)>,
    },
    /// Delete one organization with its description and locations
    Delete { id: String },
}

fn parse_criterion(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn with_repo<T>(
    config: &CoreConfig,
    action: impl FnOnce(SqliteOrganizationRepository<'_>) -> Result<T, String>,
) -> Result<T, String> {
    let conn = open_from_config(&config.database).map_err(|err| err.to_string())?;
    let repo = SqliteOrganizationRepository::try_new(&conn).map_err(|err| err.to_string())?;
    action(repo)
}

fn run(command: Command, config: &CoreConfig) -> Result<String, String> {
    match command {
        Command::Ping => Ok(format!("orgstore_core ping={}", ping())),
        Command::Version => Ok(format!("orgstore_core version={}", core_version())),
        Command::Get { id, with_locations } => with_repo(config, |repo| {
            let organization = OrganizationReadService::new(repo)
                .find_by_id(&id, with_locations)
                .map_err(|err| err.to_string())?;
            serde_json::to_string_pretty(&organization).map_err(|err| err.to_string())
        }),
        Command::Find { criteria } => with_repo(config, |repo| {
            let criteria: SearchCriteria = criteria.into_iter().collect();
            let organizations = OrganizationReadService::new(repo)
                .find(Some(&criteria))
                .map_err(|err| err.to_string())?;
            serde_json::to_string_pretty(&organizations).map_err(|err| err.to_string())
        }),
        Command::Delete { id } => with_repo(config, |repo| {
            let organization = OrganizationReadService::new(repo)
                .find_by_id(&id, false)
                .map_err(|err| err.to_string())?;
            let notifier =
                Notifier::with_config(LogMailer::new(config.mail.recipient.clone()), &config.mail);
            let removed = OrganizationWriteService::new(repo, notifier)
                .delete(organization.id)
                .map_err(|err| err.to_string())?;
            Ok(serde_json::json!({ "id": organization.id, "removed": removed }).to_string())
        }),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&config.log) {
        eprintln!("logging disabled: {err}");
    }
    log::debug!("event=cli_start module=cli status=ok");

    match run(cli.command, &config) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;

    #[test]
    fn parses_get_with_locations_flag() {
        let cli = Cli::try_parse_from(["orgstore_cli", "get", "7", "--with-locations"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Get {
                id: "7".to_string(),
                with_locations: true
            }
        );
    }

    #[test]
    fn parses_find_pairs_in_order() {
        let cli = Cli::try_parse_from(["orgstore_cli", "find", "industry=it", "java=true"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Find {
                criteria: vec![
                    ("industry".to_string(), "it".to_string()),
                    ("java".to_string(), "true".to_string())
                ]
            }
        );
    }

    #[test]
    fn find_without_pairs_is_match_all() {
        let cli = Cli::try_parse_from(["orgstore_cli", "find"]).unwrap();
        assert_eq!(cli.command, Command::Find { criteria: Vec::new() });
    }

    #[test]
    fn rejects_unknown_command_and_malformed_pair() {
        assert!(Cli::try_parse_from(["orgstore_cli"]).is_err());
        assert!(Cli::try_parse_from(["orgstore_cli", "drop"]).is_err());
        assert!(Cli::try_parse_from(["orgstore_cli", "find", "industry"]).is_err());
        assert!(Cli::try_parse_from(["orgstore_cli", "delete"]).is_err());
    }
}
