//! hostaudit - run local security audit probes and report normalized results.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use hostaudit_common::OsType;
use hostaudit_probe::sink::{read_report, FanoutSink};
use hostaudit_probe::{
    load_config, AuditConfig, JsonFileSink, JsonlSink, Orchestrator, TextSummarySink,
};
use hostaudit_report_schema::validation::validate_report_value;
use hostaudit_report_schema::validate_report;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hostaudit")]
#[command(
    author,
    version,
    about = "Run security audit probes on this host and normalize their output"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Status table
    Text,
    /// Full report as JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the probes and write the report
    Run {
        /// YAML configuration file (built-in probes if omitted)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Probe catalog to use (linux, windows); defaults to this host's OS
        #[arg(long)]
        os: Option<String>,

        /// Write the full report as JSON to this file
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Write one JSON line per probe to this file
        #[arg(long)]
        jsonl: Option<PathBuf>,

        /// Maximum number of probes running at once
        #[arg(long)]
        workers: Option<usize>,

        /// Run deadline in seconds
        #[arg(long)]
        deadline: Option<f64>,

        /// What to print on stdout
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the probes a run would execute
    ListProbes {
        #[arg(long, short)]
        config: Option<PathBuf>,

        #[arg(long)]
        os: Option<String>,
    },

    /// Check a configuration file without running anything
    ValidateConfig {
        #[arg(long, short)]
        config: PathBuf,
    },

    /// Check a report written by `run --out`
    ValidateReport {
        #[arg(long = "in")]
        input: PathBuf,
    },
}

fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // stdout carries the report.
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn resolve_config(config: Option<&Path>, os: Option<String>) -> anyhow::Result<AuditConfig> {
    let mut audit = match config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => AuditConfig::default(),
    };
    if let Some(os) = os {
        let os: OsType = os.parse()?;
        audit.os = Some(os);
    }
    Ok(audit)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Run {
            config,
            os,
            out,
            jsonl,
            workers,
            deadline,
            format,
        } => {
            let mut audit = resolve_config(config.as_deref(), os)?;
            if let Some(workers) = workers {
                audit.workers = workers;
            }
            if deadline.is_some() {
                audit.deadline_secs = deadline;
            }

            let specs = audit.specs().context("Invalid probe configuration")?;
            let orchestrator_config = audit
                .orchestrator_config()
                .context("Invalid run configuration")?;
            info!(
                "Auditing {} with {} probes",
                orchestrator_config.host,
                specs.len()
            );

            let mut sinks = FanoutSink::new();
            if let Some(path) = &out {
                sinks.push(JsonFileSink::new(path));
            }
            if let Some(path) = &jsonl {
                sinks.push(
                    JsonlSink::create(path)
                        .with_context(|| format!("Failed to create {:?}", path))?,
                );
            }
            if let OutputFormat::Text = format {
                sinks.push(TextSummarySink::new(std::io::stdout()));
            }

            let orchestrator = Orchestrator::with_process_runner(orchestrator_config);
            let report = orchestrator.run_all_with_sink(&specs, &mut sinks).await?;

            if let OutputFormat::Json = format {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }

            let summary = report.summary();
            if summary.failed() > 0 {
                warn!(
                    "{} of {} probes did not complete normally",
                    summary.failed(),
                    summary.total()
                );
            }
        }

        Commands::ListProbes { config, os } => {
            let audit = resolve_config(config.as_deref(), os)?;
            for spec in audit.specs()? {
                println!(
                    "{:<24} {:<16} {:>6.0}s  {}",
                    spec.name(),
                    spec.grammar().name(),
                    spec.timeout().as_secs_f64(),
                    spec.display_command()
                );
            }
        }

        Commands::ValidateConfig { config } => {
            let audit = load_config(&config)
                .with_context(|| format!("Failed to load configuration {:?}", config))?;
            let specs = audit.specs()?;
            println!("Configuration is valid: {} probes", specs.len());
        }

        Commands::ValidateReport { input } => {
            info!("Validating report: {:?}", input);

            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {:?}", input))?;
            let value: serde_json::Value = serde_json::from_str(&content)?;
            let mut result = validate_report_value(&value)?;
            if result.valid {
                let report = read_report(&input)?;
                result = validate_report(&report)?;
            }

            for warning in &result.warnings {
                println!("warning: {}", warning);
            }
            if !result.valid {
                for error in &result.errors {
                    println!("error: {}", error);
                }
                bail!("Report is invalid ({} errors)", result.errors.len());
            }
            println!("Report is valid");
        }
    }

    Ok(())
}
