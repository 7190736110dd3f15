//! One-time library initialization.

use crate::error::Result;
use parking_lot::Mutex as InitMutex;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Held for the whole attempt, so a concurrent caller blocks until the
// outcome is known instead of observing a half-done state.
static INITIALIZED: InitMutex<bool> = InitMutex::new(false);

/// Initialize logging for the library.
///
/// With `log_file = Some(path)` log lines are appended to that file;
/// otherwise they go to stderr. Verbosity follows the `RUST_LOG` environment
/// variable, defaulting to `info`.
///
/// Safe to call more than once, from any thread: the first successful call
/// returns `Ok(true)`, later calls are no-ops returning `Ok(false)`. A
/// failure to open the log file does not mark the library initialized, so a
/// corrected retry (including one racing the failed call) can still succeed.
pub fn init_library(log_file: Option<&Path>) -> Result<bool> {
    let mut initialized = INITIALIZED.lock();
    if *initialized {
        return Ok(false);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = match log_file {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    *initialized = true;

    // try_init fails only when another subscriber is already global (for
    // example one set up by the host application); logging still works, so
    // treat that the same as a repeat call.
    if installed.is_err() {
        return Ok(false);
    }

    info!("library initialized");
    Ok(true)
}
