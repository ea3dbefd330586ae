//! Command-line runner for the Alex Machine simulator.

use tracing_subscriber::EnvFilter;

/// Debug info side-file parsing and lookups.
pub mod debug_info;
pub use debug_info::ProgramDebugInfo;

/// Runner error type.
pub mod error;
pub use error::CliError;

/// ELF and flat image loading.
pub mod loader;
pub use loader::{Program, Segment, SegmentData};

/// One complete run from loaded image to outcome.
pub mod session;
pub use session::{run_session, SessionConfig, SessionOutcome};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs the global `tracing` subscriber, writing to stderr so log lines
/// never mix with program output. Later calls are ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
