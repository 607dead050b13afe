//! Logging for `lamigrate`, written to stderr.
//!
//! At the default INFO level a migration reports the successors it found,
//! each `composer.json` edit and every composer run. Removal warnings are
//! WARN and caught migration failures ERROR. `-v` adds the "Exiting; ..."
//! lines each hook logs when it has nothing to do.

use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// # Arguments
/// * `verbosity` - 0 = INFO, 1 = DEBUG, 2+ = TRACE
/// * `json` - If true, output JSON lines to stderr
///
/// Progress messages of a migration are INFO events, so the default level
/// shows them; `-v` adds the "Exiting; ..." diagnostics of every no-op path.
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins for everything the flag does not cover.
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Ok(directive) = format!("lamigrate={level}").parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    let filter = filter.add_directive(level.into());

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
