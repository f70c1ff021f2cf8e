use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

/// Output format for every command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const QUICKSTART_HELP: &str = "\
Get started:
  clientsync health                 Check the sync server is reachable
  clientsync sync                   Pull new clients and visits
  clientsync returns                Clients due back around today
  clientsync services <client-id>   Visit history for one client";

#[derive(Parser, Debug)]
#[command(name = "clientsync", version)]
#[command(about = "Offline cache of service clients and their expected return dates")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Directory holding clientsync.db (overrides CLIENTSYNC_DATA_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Sync server base URL (overrides CLIENTSYNC_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run one incremental sync cycle
    Sync,

    /// Show last sync, client count and pending returns
    Status {
        /// Evaluate the return window as of this date (YYYY-MM-DD, UTC)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// List clients whose expected return falls inside the window
    Returns {
        /// Evaluate the return window as of this date (YYYY-MM-DD, UTC)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Days before today where the window starts
        #[arg(long)]
        days_before: Option<i64>,

        /// Days after today where the window ends
        #[arg(long)]
        days_after: Option<i64>,
    },

    /// List all cached clients by name
    Clients,

    /// Show the visit history of one client, newest first
    Services {
        client_id: String,
    },

    /// Show the sync attempt log, newest first
    History {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: i64,
    },

    /// Probe the sync server
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "clientsync",
            "returns",
            "--today",
            "2024-01-15",
            "--days-before",
            "3",
            "--data-dir",
            "/tmp/cs",
            "-o",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/cs")));
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(
            cli.command,
            Command::Returns {
                today: NaiveDate::from_ymd_opt(2024, 1, 15),
                days_before: Some(3),
                days_after: None,
            }
        );
    }

    #[test]
    fn services_requires_a_client_id() {
        assert!(Cli::try_parse_from(["clientsync", "services"]).is_err());
    }

    #[test]
    fn history_defaults_to_twenty_entries() {
        let cli = Cli::try_parse_from(["clientsync", "history"]).unwrap();
        assert_eq!(cli.command, Command::History { limit: 20 });
    }
}
