//! Demo application running the hazard demonstrations from the command line.
//!
//! Run with:
//! ```bash
//! cargo run --example hazards --features demo -- --help
//! cargo run --example hazards --features demo -- top-up compare
//! RUST_LOG=corsa=debug cargo run --example hazards --features demo -- count lock-free --loop-count 100000
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use corsa::frequency::CountStrategy;
use corsa::harness::{Harness, HarnessConfig};
use corsa::observers::json::JsonObserver;
use corsa::observers::table::{TableObserver, TableStyle};
use corsa::store::TopUpStrategy;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Output format for run reports.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Pretty ASCII table
    Table,
    /// JSON format
    Json,
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Modern,
    Markdown,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Demo application for corsa - observable concurrency hazards.
///
/// Each subcommand runs one demonstration against a fresh worker pool and
/// prints what it observed.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Table style (for table format)
    #[arg(short, long, value_enum, default_value = "rounded", global = true)]
    style: StyleChoice,

    /// Pretty print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Include timestamp in JSON output
    #[arg(long, global = true)]
    timestamp: bool,

    #[command(flatten)]
    sizing: Sizing,
}

/// Overrides for the harness configuration.
#[derive(ClapArgs, Debug)]
struct Sizing {
    /// Worker threads per pool
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Size the keyed store must reach
    #[arg(long, global = true)]
    target: Option<usize>,

    /// Entries missing from the store at the start
    #[arg(long, global = true)]
    deficit: Option<usize>,

    /// Top-up tasks per run
    #[arg(long, global = true)]
    batches: Option<usize>,

    /// Total increments per counting run
    #[arg(long, global = true)]
    loop_count: Option<usize>,

    /// Number of distinct keys counted
    #[arg(long, global = true)]
    key_count: Option<usize>,

    /// Quiescence bound in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

impl Sizing {
    fn apply(&self, mut config: HarnessConfig) -> HarnessConfig {
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        let target = self.target.unwrap_or(config.target);
        let deficit = self.deficit.unwrap_or(config.deficit);
        config = config.with_target(target, deficit);
        if let Some(batches) = self.batches {
            config = config.with_batches(batches);
        }
        if let Some(loop_count) = self.loop_count {
            config = config.with_loop_count(loop_count);
        }
        if let Some(key_count) = self.key_count {
            config = config.with_key_count(key_count);
        }
        if let Some(secs) = self.timeout {
            config = config.with_quiescence_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top up a keyed store to its target size
    TopUp {
        #[arg(value_enum)]
        mode: TopUpMode,
    },
    /// Count random key occurrences
    Count {
        #[arg(value_enum)]
        mode: CountMode,
    },
    /// Run requests on recycled workers with a worker-local slot
    Context {
        #[arg(value_enum)]
        mode: ContextMode,

        /// Number of requests to run
        #[arg(long, default_value = "30")]
        calls: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TopUpMode {
    Flawed,
    Locked,
    Reserving,
    Compare,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CountMode {
    Locked,
    LockFree,
    Compare,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContextMode {
    Leaking,
    Scoped,
}

fn to_json<T: Serialize>(args: &Args, report: &T) -> corsa::Result<String> {
    JsonObserver::new()
        .pretty(args.pretty)
        .stamped(args.timestamp)
        .to_json(report)
}

fn table(args: &Args, title: &str) -> TableObserver {
    TableObserver::new()
        .with_style(args.style.into())
        .with_title(title)
}

/// Runs the selected demonstration and renders its output.
fn run(args: &Args) -> corsa::Result<String> {
    let harness = Harness::new(args.sizing.apply(HarnessConfig::default()))?;

    match &args.command {
        Command::TopUp { mode } => {
            let strategy = match mode {
                TopUpMode::Flawed => TopUpStrategy::Unsynchronized,
                TopUpMode::Locked => TopUpStrategy::CoarseLock,
                TopUpMode::Reserving => TopUpStrategy::Reserving,
                TopUpMode::Compare => {
                    let comparison = harness.compare_top_ups()?;
                    return match args.format {
                        OutputFormat::Json => to_json(args, &comparison),
                        OutputFormat::Table => {
                            Ok(table(args, "Top-up strategies").render_comparison(&comparison))
                        }
                    };
                }
            };
            let report = harness.run_top_up(strategy)?;
            match args.format {
                OutputFormat::Json => to_json(args, &report),
                OutputFormat::Table => Ok(format!(
                    "{}\n{}",
                    table(args, "Top-up").render_top_ups(std::slice::from_ref(&report)),
                    report.verdict
                )),
            }
        }

        Command::Count { mode } => {
            let strategy = match mode {
                CountMode::Locked => CountStrategy::Locked,
                CountMode::LockFree => CountStrategy::LockFree,
                CountMode::Compare => {
                    let comparison = harness.compare_counts()?;
                    return match args.format {
                        OutputFormat::Json => to_json(args, &comparison),
                        OutputFormat::Table => {
                            Ok(table(args, "Counting strategies").render_comparison(&comparison))
                        }
                    };
                }
            };
            let report = harness.run_count(strategy)?;
            match args.format {
                OutputFormat::Json => to_json(args, &report),
                OutputFormat::Table => Ok(format!(
                    "{}\n{}\n{}",
                    table(args, strategy.as_str()).render_snapshot(&report.snapshot),
                    report.sum_verdict,
                    report.domain_verdict
                )),
            }
        }

        Command::Context { mode, calls } => {
            let mut views = Vec::with_capacity(*calls as usize);
            for value in 1..=*calls {
                let view = match mode {
                    ContextMode::Leaking => harness.run_leaking_context(value)?,
                    ContextMode::Scoped => harness.run_scoped_context(value)?,
                };
                views.push(view);
            }
            let stale = views.iter().filter(|view| view.is_stale()).count();
            match args.format {
                OutputFormat::Json => to_json(args, &views),
                OutputFormat::Table => Ok(format!(
                    "{}\n{} of {} requests started from a stale slot",
                    table(args, "Worker-local context").render_contexts(&views),
                    stale,
                    calls
                )),
            }
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
