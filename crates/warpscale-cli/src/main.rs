//! warpscale: predictive scale-up and flexible scale-down for
//! elastically-sized compute groups.
//!
//! # Usage
//!
//! ```text
//! warpscale check-config -c warpscale.toml
//! warpscale run --snapshot fleet.json --at 1700000000 --format json
//! warpscale watch --store /var/lib/warpscale/fleet.redb --interval 60
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{EngineArgs, SourceArgs};

#[derive(Parser)]
#[command(
    name = "warpscale",
    about = "warpscale: predictive and flexible autoscaling decisions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log debug detail for every skipped check.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate every selected group once and print a report.
    Run {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// Evaluate as of this Unix timestamp instead of the current time.
        #[arg(long)]
        at: Option<u64>,

        /// Report format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Evaluate on a fixed interval until interrupted.
    Watch {
        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between runs.
        #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,

        /// Report format.
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate the configuration and print it resolved.
    CheckConfig {
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format)?;

    match cli.command {
        Command::Run {
            engine,
            source,
            at,
            format,
        } => commands::run::run(&engine, &source, at, format),
        Command::Watch {
            engine,
            source,
            interval,
            format,
        } => commands::run::watch(&engine, &source, interval, format).await,
        Command::CheckConfig { engine } => commands::check::check_config(&engine),
    }
}

/// `RUST_LOG` wins; otherwise the default depends on `--verbose`.
fn init_tracing(verbose: bool, format: LogFormat) -> anyhow::Result<()> {
    let default = if verbose {
        "info,warpscale=debug"
    } else {
        "warn,warpscale=info"
    };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_snapshot() {
        let cli = Cli::try_parse_from([
            "warpscale",
            "run",
            "--snapshot",
            "fleet.json",
            "--at",
            "1700000000",
            "--format",
            "json",
            "--groups",
            "web,api",
        ])
        .unwrap();
        match cli.command {
            Command::Run {
                engine,
                source,
                at,
                format,
            } => {
                assert_eq!(engine.groups, vec!["web", "api"]);
                assert_eq!(source.snapshot.as_deref(), Some(std::path::Path::new("fleet.json")));
                assert_eq!(at, Some(1_700_000_000));
                assert_eq!(format, OutputFormat::Json);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn store_and_snapshot_are_exclusive() {
        let result = Cli::try_parse_from([
            "warpscale",
            "run",
            "--store",
            "fleet.redb",
            "--snapshot",
            "fleet.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn run_needs_a_source() {
        assert!(Cli::try_parse_from(["warpscale", "run"]).is_err());
    }

    #[test]
    fn watch_rejects_zero_interval() {
        let result = Cli::try_parse_from([
            "warpscale",
            "watch",
            "--store",
            "fleet.redb",
            "--interval",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from(["warpscale", "check-config", "-v", "--log-format", "json"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
