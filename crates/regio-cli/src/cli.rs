//! CLI argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use regio_model::{ReplayScope, parse_date};

#[derive(Parser)]
#[command(
    name = "regio",
    version,
    about = "Harmonize regional statistics onto the codes valid on one anchor date",
    long_about = "Harmonize regional statistics onto the codes valid on one anchor date.\n\n\
                  Replays the official change-event registry (with documented overrides)\n\
                  to map every observed region code to its anchor code, then aggregates\n\
                  the observations and checks them against reference totals."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the anchor mapping and write harmonized measure tables.
    Harmonize(HarmonizeArgs),

    /// List every code connected to the given codes through change events.
    Closure(ClosureArgs),

    /// Summarize the change registry per date, with override effects.
    Changes(ChangesArgs),

    /// Map a list of codes valid on one date to the anchor geography.
    Crosswalk(CrosswalkArgs),
}

#[derive(Args)]
pub struct ConfigArg {
    /// Run configuration (TOML).
    #[arg(long = "config", short = 'c', value_name = "FILE")]
    pub path: PathBuf,
}

#[derive(Args)]
pub struct HarmonizeArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Anchor date (YYYY-MM-DD), overriding the config.
    #[arg(long = "anchor-date", value_name = "DATE", value_parser = date_arg)]
    pub anchor_date: Option<NaiveDate>,

    /// Which events apply to an observation, overriding the config.
    #[arg(long = "scope", value_enum)]
    pub scope: Option<ScopeArg>,

    /// Output directory (default: the config's, else <CONFIG_DIR>/output).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Run every stage and report without writing output files.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Exit with status 1 when the run raised any warning diagnostic.
    #[arg(long = "fail-on-warnings")]
    pub fail_on_warnings: bool,
}

#[derive(Args)]
pub struct ClosureArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Seed codes.
    #[arg(value_name = "CODE", required = true)]
    pub codes: Vec<String>,

    /// Use the registry as published, ignoring overrides.
    #[arg(long = "raw")]
    pub raw: bool,
}

#[derive(Args)]
pub struct ChangesArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

#[derive(Args)]
pub struct CrosswalkArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Code list (CSV with a `code` column).
    #[arg(long = "codes", value_name = "FILE")]
    pub codes: PathBuf,

    /// Date on which the listed codes are valid (default: today).
    #[arg(long = "date", value_name = "DATE", value_parser = date_arg)]
    pub date: Option<NaiveDate>,

    /// Anchor date (YYYY-MM-DD), overriding the config.
    #[arg(long = "anchor-date", value_name = "DATE", value_parser = date_arg)]
    pub anchor_date: Option<NaiveDate>,

    /// Write the crosswalk to this CSV instead of printing it.
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// CLI replay scope choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    Global,
    Period,
}

impl From<ScopeArg> for ReplayScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Global => Self::Global,
            ScopeArg::Period => Self::Period,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

fn date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn harmonize_flags_parse() {
        let cli = Cli::try_parse_from([
            "regio",
            "harmonize",
            "--config",
            "run.toml",
            "--anchor-date",
            "2024-01-01",
            "--scope",
            "period",
            "--dry-run",
        ])
        .unwrap();
        let Command::Harmonize(args) = cli.command else {
            panic!("expected harmonize");
        };
        assert_eq!(args.config.path, PathBuf::from("run.toml"));
        assert_eq!(args.anchor_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(matches!(args.scope, Some(ScopeArg::Period)));
        assert!(args.dry_run);
        assert!(!args.fail_on_warnings);
    }

    #[test]
    fn closure_needs_a_code() {
        assert!(Cli::try_parse_from(["regio", "closure", "--config", "run.toml"]).is_err());
        let cli =
            Cli::try_parse_from(["regio", "closure", "-c", "run.toml", "5012", "--raw"]).unwrap();
        let Command::Closure(args) = cli.command else {
            panic!("expected closure");
        };
        assert_eq!(args.codes, vec!["5012".to_string()]);
        assert!(args.raw);
    }

    #[test]
    fn invalid_date_is_rejected() {
        let result = Cli::try_parse_from([
            "regio",
            "harmonize",
            "--config",
            "run.toml",
            "--anchor-date",
            "01.01.2024",
        ]);
        assert!(result.is_err());
    }
}
