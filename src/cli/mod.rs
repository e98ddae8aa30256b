use std::num::NonZero;

use crate::{Result, env, logger, settings::Settings};
use clap::Parser;

mod check;
mod report;

#[derive(clap::Parser)]
#[clap(name = "plume", version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
struct Cli {
    /// Number of targets to drive in parallel
    #[clap(short, long, global = true)]
    jobs: Option<NonZero<usize>>,
    /// Enables verbose output
    #[clap(short, long, global = true, action = clap::ArgAction::Count, overrides_with = "quiet")]
    verbose: u8,
    /// Suppresses output
    #[clap(short, long, global = true, overrides_with = "verbose")]
    quiet: bool,
    /// Let step errors propagate instead of reporting them, and keep targets open
    #[clap(long, global = true)]
    debug: bool,
    /// Enable tracing spans and performance diagnostics
    #[clap(long, global = true)]
    trace: bool,
    /// Output traces as JSON Lines (requires --trace)
    #[clap(long, global = true, requires = "trace")]
    json: bool,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    Check(Box<check::Check>),
    Report(Box<report::Report>),
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // tracing has to be installed before anything logs
    let trace_mode = match (args.trace, args.json) {
        (true, true) => env::TraceMode::Json,
        (true, false) => env::TraceMode::Text,
        _ => *env::PLUME_TRACE,
    };
    if trace_mode != env::TraceMode::Off {
        crate::trace::init_tracing(trace_mode == env::TraceMode::Json)?;
    }

    let mut level = None;
    if args.verbose > 1 || log::log_enabled!(log::Level::Trace) {
        level = Some(log::LevelFilter::Trace);
    }
    if args.verbose == 1 || log::log_enabled!(log::Level::Debug) {
        level = Some(log::LevelFilter::Debug);
    }
    if args.quiet {
        level = Some(log::LevelFilter::Warn);
    }
    if trace_mode == env::TraceMode::Off {
        logger::init(level);
    }

    if let Some(jobs) = args.jobs {
        Settings::set_jobs(jobs);
    }
    if args.debug {
        Settings::set_debug(true);
    }
    match args.command {
        Commands::Check(cmd) => cmd.run().await,
        Commands::Report(cmd) => cmd.run().await,
    }
}
