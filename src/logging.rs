//! Log output for the CLI.
//!
//! Per-host and per-index progress ("Scraping 192.0.2.1:9200", connection
//! failures, lock retries) is emitted through `tracing` on **stderr**, so
//! stdout stays clean for command results and `escout dump` output.
//!
//! The level comes from `RUST_LOG` when set, otherwise `info` (or `debug`
//! with `--verbose`).

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Call once, before any work starts.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "elastic_scout={},escout={}",
            default_level, default_level
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .try_init();
}
