//! Tracing subscriber setup
//!
//! Log lines always go to stderr so stdout only ever carries the usage text
//! and VALID verdicts.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::VerbosityLevel;

/// Default level for a verbosity
pub fn level_for(verbosity: VerbosityLevel) -> LevelFilter {
    match verbosity {
        VerbosityLevel::Quiet => LevelFilter::ERROR,
        VerbosityLevel::Normal => LevelFilter::WARN,
        VerbosityLevel::Verbose => LevelFilter::INFO,
    }
}

/// `RUST_LOG` wins when set; otherwise the verbosity decides.
pub fn env_filter(verbosity: VerbosityLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy()
}

/// Install the global subscriber. Later calls are no-ops, which keeps
/// repeated in-process runs (tests) from failing.
pub fn init(verbosity: VerbosityLevel) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .try_init();
}
