//! `depotkit` CLI:
//! Build the daily plan or QC request sheet for one date.
//!
//! Exit codes: `0` on success, `1` on a malformed date, a configuration
//! problem, an output conflict or a failed save.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use depotkit_report::conf::{C_MSG_INVALID_DATE, C_PROMPT_DATE};
use depotkit_report::{
    C_ENV_CONFIG, EnumProduct, ReportError, load_config, parse_target_date, run_report,
};

#[derive(Parser)]
#[command(name = "depotkit")]
#[command(version, about = "Daily plan and QC request workbooks from workshop work orders")]
struct Cli {
    /// Verbose output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file; built-in defaults when absent
    #[arg(long, value_name = "FILE", env = C_ENV_CONFIG, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the daily plan sheet
    Plan {
        /// Target date (dd.mm.yyyy); prompted for when omitted
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },

    /// Build the daily QC request sheet
    Qc {
        /// Target date (dd.mm.yyyy); prompted for when omitted
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
}

impl Commands {
    fn product(&self) -> EnumProduct {
        match self {
            Commands::Plan { .. } => EnumProduct::Plan,
            Commands::Qc { .. } => EnumProduct::QcRequest,
        }
    }

    fn date(&self) -> Option<&str> {
        match self {
            Commands::Plan { date } | Commands::Qc { date } => date.as_deref(),
        }
    }
}

fn prompt_target_date() -> Result<String> {
    inquire::Text::new(C_PROMPT_DATE)
        .prompt()
        .context("Failed to read the target date")
}

fn resolve_target_date(date: Option<&str>) -> Result<NaiveDate> {
    let c_date = match date {
        Some(c_date) => c_date.to_string(),
        None => prompt_target_date()?,
    };
    Ok(parse_target_date(&c_date)?)
}

fn run(cli: &Cli) -> Result<()> {
    let date = resolve_target_date(cli.command.date())?;
    let cfg = load_config(cli.config.as_deref())?;
    let report = run_report(&cfg, cli.command.product(), date)?;

    println!("Saved {}", report.path_output.display());
    println!("{}", report.format(&format!("[{}]", cli.command.product().as_str())));
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = depotkit_log::init_logging(cli.verbose) {
        eprintln!("{e}");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<ReportError>() {
                Some(ReportError::InvalidDate(_)) => eprintln!("{C_MSG_INVALID_DATE}"),
                _ => tracing::error!("{err:#}"),
            }
            ExitCode::from(1)
        }
    }
}
