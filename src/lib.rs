//! # FocusKit
//!
//! Closed-loop focus and power compensation for laser engraving machines.
//! A camera-derived focus offset, UDP machine telemetry and a line-by-line
//! G-code link are fused into one automation loop that corrects the B axis
//! whenever the machine pauses.
//!
//! ## Architecture
//!
//! FocusKit is organized as a workspace with multiple crates:
//!
//! 1. **focuskit-core** - Errors, data model, event bus
//! 2. **focuskit-vision** - Beam detection, triangulation, lock machine
//! 3. **focuskit-communication** - UDP telemetry, peripheral tokens, command streamer
//! 4. **focuskit-automation** - Coordinator and control loop
//! 5. **focuskit-settings** - Configuration
//! 6. **focuskit** - Application wiring, replay source, operator console

pub mod app;
pub mod console;
pub mod replay;

pub use focuskit_automation as automation;
pub use focuskit_communication as communication;
pub use focuskit_core as core;
pub use focuskit_settings as settings;
pub use focuskit_vision as vision;

pub use app::{App, StartOptions};
pub use console::{parse, ConsoleCommand, ConsoleError};
pub use replay::ImageReplay;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
/// - `level` as the default directive when given, `info` otherwise
pub fn init_logging(level: Option<tracing::level_filters::LevelFilter>) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default = level.unwrap_or(tracing::level_filters::LevelFilter::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
