use crate::Result;
use tracing_subscriber::fmt;

/// Initialize the tracing subscriber
///
/// Text mode writes compact spans to stderr; JSON mode writes JSON lines to stdout.
/// `log` records are forwarded so library log lines show up as trace events.
pub fn init_tracing(json_output: bool) -> Result<()> {
    use tracing_subscriber::prelude::*;

    if tracing_log::LogTracer::init().is_err() {
        // a logger is already installed, log records just won't be captured in traces
    }

    let filter = tracing_subscriber::EnvFilter::try_from_env("PLUME_TRACE_FILTER")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("plume=trace"));

    let result = if json_output {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stdout);
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_timer(fmt::time::uptime())
            .with_ansi(console::Term::stderr().features().colors_supported())
            .with_thread_ids(false)
            .with_thread_names(false)
            .compact();
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    if let Err(e) = result {
        // another subscriber was set first, spans still reach it
        debug!("tracing subscriber already installed: {e}");
    }
    Ok(())
}
