//! Helpers for working with the system `ninja` binary in integration tests.

use std::path::Path;
use std::process::{Command, ExitStatus, Output};

use thiserror::Error;

/// Errors that can occur when running Ninja-backed integration tests.
#[derive(Error, Debug)]
pub enum NinjaError {
    /// The `ninja --version` probe failed to spawn, most likely because Ninja
    /// is not present in `PATH`.
    #[error("failed to spawn `ninja --version`: {0}")]
    ProbeSpawn(#[source] std::io::Error),
    /// `ninja --version` executed but returned a non-success status.
    #[error("`ninja --version` returned non-success status: {0}")]
    ProbeFailed(ExitStatus),
    /// A Ninja invocation could not be spawned.
    #[error("failed to run ninja: {0}")]
    Run(#[source] std::io::Error),
}

/// Whether a usable `ninja` is on `PATH`. Callers should skip their scenario
/// when this returns `Err`.
///
/// # Errors
///
/// Returns [`NinjaError`] when the probe cannot run or fails.
pub fn probe_ninja() -> Result<(), NinjaError> {
    let output = Command::new("ninja")
        .arg("--version")
        .output()
        .map_err(NinjaError::ProbeSpawn)?;

    if !output.status.success() {
        return Err(NinjaError::ProbeFailed(output.status));
    }
    Ok(())
}

/// Load the build files in `build_root` and plan the default targets
/// without running any command.
///
/// # Errors
///
/// Returns [`NinjaError::Run`] if `ninja` cannot be spawned.
pub fn dry_run(build_root: &Path) -> Result<Output, NinjaError> {
    Command::new("ninja")
        .arg("-C")
        .arg(build_root)
        .arg("-n")
        .output()
        .map_err(NinjaError::Run)
}
