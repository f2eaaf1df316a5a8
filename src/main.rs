use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use surveycheck::api::{FetchError, FileSource, OverpassClient, PointSource};
use surveycheck::config::{Config, FileConfig};
use surveycheck::exit::{codes, exit_code};
use surveycheck::logging::{self, LogLevel};
use surveycheck::mail::LettreMailer;
use surveycheck::pipeline::{Delivery, Pipeline, RunError};
use surveycheck::prerequisites::check_mail_transport;
use surveycheck::validate::ComparisonMode;

/// Check that OpenStreetMap survey points in Colombia carry latitude/longitude
/// tags matching their node coordinates, and mail the discrepancies
///
/// Recipients, log level and cleanup are read from EMAILS, LOG_LEVEL and CLEAN.
///
/// Examples:
///   # Regular run, report mailed to $EMAILS
///   surveycheck
///
///   # Print the report instead of mailing it
///   surveycheck --dry-run
///
///   # Re-check a saved Overpass response, flagging any difference
///   surveycheck --input survey_points.csv --strict --dry-run
#[derive(Parser, Debug)]
#[command(name = "surveycheck")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches surveycheck.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate a saved CSV response instead of querying Overpass
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Print the report to stdout instead of sending it
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Flag any difference between node and tag, not only larger node values
    #[arg(long)]
    strict: bool,

    /// Keep the query, response and report files after the run
    #[arg(long)]
    keep_files: bool,

    /// Print the Overpass query and exit
    #[arg(long)]
    print_query: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    codes::HELP
                }
                ErrorKind::DisplayVersion => codes::SUCCESS,
                _ => codes::INVALID_ARGUMENT,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(codes::INVALID_ARGUMENT);
        }
    };

    if args.print_query {
        println!("{}", config.query.to_overpass_ql());
        return ExitCode::from(codes::SUCCESS);
    }

    if let Err(err) = logging::init(config.log_level) {
        eprintln!("Error: {err}");
        return ExitCode::from(codes::LOGGER_UTILITY);
    }

    match run(&args, &config) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!("{err:#}");
            let code = err
                .downcast_ref::<RunError>()
                .map(exit_code)
                .unwrap_or(codes::GENERAL);
            ExitCode::from(code)
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let file_config = match &args.config {
        Some(path) => FileConfig::from_path(path)?,
        None => FileConfig::load()?.unwrap_or_default(),
    };

    let mut config = Config::from_env(file_config).context("Invalid configuration")?;
    if args.strict {
        config.comparison = ComparisonMode::AnyDifference;
    }
    if args.keep_files {
        config.clean = false;
    }
    if args.verbose {
        config.log_level = config.log_level.min(LogLevel::Debug);
    }
    Ok(config)
}

fn run(args: &Args, config: &Config) -> Result<u8> {
    let total_start = Instant::now();

    let mailer = if args.dry_run {
        None
    } else {
        check_mail_transport(&config.mail.transport).map_err(RunError::from)?;
        Some(LettreMailer::new(config.mail.clone()))
    };

    let inner: Box<dyn PointSource> = match &args.input {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(OverpassClient::new(config.overpass.clone())),
    };
    let source = SpinnerSource {
        inner: inner.as_ref(),
    };

    let mut pipeline = Pipeline::new(config, &source);
    if let Some(mailer) = &mailer {
        pipeline = pipeline.with_mailer(mailer);
    }
    let summary = pipeline.run()?;

    if args.dry_run {
        println!("Subject: {}", summary.subject);
        println!();
        print!("{}", summary.body);
        return Ok(codes::SUCCESS);
    }

    println!(
        "Checked {} survey points: {} discrepancies, {} malformed rows",
        summary.outcome.rows,
        summary.outcome.discrepancies.len(),
        summary.outcome.malformed.len()
    );
    if let Some(dir) = &summary.work_dir {
        println!("Work files: {}", dir.display());
    }

    let code = match summary.delivery {
        Delivery::Sent { recipients } => {
            println!("Report sent to {} recipient(s)", recipients);
            codes::SUCCESS
        }
        Delivery::Skipped => codes::SUCCESS,
        Delivery::Failed(err) => {
            tracing::error!("Report was not delivered: {err}");
            codes::GENERAL
        }
    };

    println!(
        "Done! Total time: {:.1}s",
        total_start.elapsed().as_secs_f32()
    );
    Ok(code)
}

/// Shows a spinner while the (often slow) Overpass query runs
struct SpinnerSource<'a> {
    inner: &'a dyn PointSource,
}

impl PointSource for SpinnerSource<'_> {
    fn fetch(&self, query: &str) -> Result<String, FetchError> {
        let spinner = create_spinner(&format!(
            "Fetching survey points from {}...",
            self.inner.describe()
        ));
        let start = Instant::now();
        let result = self.inner.fetch(query);
        match &result {
            Ok(body) => spinner.finish_with_message(format!(
                "Fetched {} rows [{:.1}s]",
                body.lines().filter(|l| !l.trim().is_empty()).count(),
                start.elapsed().as_secs_f32()
            )),
            Err(_) => spinner.finish_and_clear(),
        }
        result
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
