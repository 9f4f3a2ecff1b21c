//! Makes sure the packaging tool is importable, installing it once if not.

use crate::runner::{RunStatus, Runner, Toolchain};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("failed to launch `{invocation}`")]
    Spawn {
        invocation: String,
        #[source]
        source: io::Error,
    },

    #[error("installing {package} failed ({status})")]
    InstallFailed { package: String, status: RunStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyState {
    /// Already importable; carries the reported version.
    Present(String),
    /// Installed by this run.
    Installed,
}

/// Version string reported by `<python> -m <module> --version`, if importable.
pub fn probe(runner: &mut dyn Runner, toolchain: &Toolchain<'_>) -> Option<String> {
    let inv = toolchain
        .python_module(&toolchain.config.packager_module)
        .arg("--version");
    match runner.capture(&inv) {
        Ok(out) if out.status.success() => Some(out.stdout.trim().to_string()),
        Ok(out) => {
            tracing::debug!(status = %out.status, "packager probe failed");
            None
        }
        Err(e) => {
            tracing::debug!("packager probe could not start: {e}");
            None
        }
    }
}

/// Probe, then `pip install` exactly once when missing. Install failure is fatal.
pub fn ensure_packager(
    runner: &mut dyn Runner,
    toolchain: &Toolchain<'_>,
) -> Result<DependencyState, DependencyError> {
    let config = toolchain.config;
    if let Some(version) = probe(runner, toolchain) {
        println!("✅ {} {version}", config.packager_module);
        return Ok(DependencyState::Present(version));
    }

    println!(
        "📦 {} not found, installing {}...",
        config.packager_module, config.packager_package
    );
    let inv = toolchain
        .python_module("pip")
        .args(["install", config.packager_package.as_str()]);
    let status = runner.run(&inv).map_err(|source| DependencyError::Spawn {
        invocation: inv.to_string(),
        source,
    })?;
    if !status.success() {
        return Err(DependencyError::InstallFailed {
            package: config.packager_package.clone(),
            status,
        });
    }

    println!("✅ Installed {}", config.packager_package);
    Ok(DependencyState::Installed)
}
