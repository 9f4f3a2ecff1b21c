//! Optional virtualenv activation.
//!
//! Sourcing `venv/Scripts/activate` only sets `VIRTUAL_ENV`, prepends the
//! scripts directory to `PATH` and drops `PYTHONHOME`. The same mutations are
//! computed here and handed to every child process; this process's own
//! environment is left alone.

use crate::config::PackConfig;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment overrides for child processes. Empty when no venv was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    venv: Option<PathBuf>,
    vars: Vec<(String, OsString)>,
    removed: Vec<String>,
}

impl Activation {
    pub fn ambient() -> Self {
        Activation::default()
    }

    pub fn venv(&self) -> Option<&Path> {
        self.venv.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.venv.is_some()
    }

    pub fn vars(&self) -> &[(String, OsString)] {
        &self.vars
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    /// Overrides that `script` would apply, with `existing_path` as the
    /// current `PATH`.
    fn from_script(script: &Path, existing_path: Option<OsString>) -> Option<Self> {
        let bin_dir = script.parent()?;
        let venv = bin_dir.parent()?;

        let mut paths = vec![bin_dir.to_path_buf()];
        if let Some(existing) = existing_path {
            paths.extend(env::split_paths(&existing));
        }
        let path = match env::join_paths(paths) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("cannot prepend {} to PATH: {e}", bin_dir.display());
                return None;
            }
        };

        Some(Activation {
            venv: Some(venv.to_path_buf()),
            vars: vec![
                ("VIRTUAL_ENV".to_string(), venv.as_os_str().to_os_string()),
                ("PATH".to_string(), path),
            ],
            removed: vec!["PYTHONHOME".to_string()],
        })
    }
}

/// The venv overrides for `root`, without reporting anything.
/// `None` when the activation script is missing or unusable.
pub fn find(root: &Path, config: &PackConfig) -> Option<Activation> {
    let script = root.join(&config.activation_script);
    if !script.is_file() {
        return None;
    }
    Activation::from_script(&script, env::var_os("PATH"))
}

/// Activates the project's venv when its activation script exists.
///
/// Never fails: a missing or unusable venv falls back to the ambient
/// environment with a warning.
pub fn activate(root: &Path, config: &PackConfig) -> Activation {
    let script = root.join(&config.activation_script);
    match find(root, config) {
        Some(activation) => {
            println!("🐍 Using virtual environment {}", script.display());
            tracing::info!(venv = ?activation.venv(), "virtual environment activated");
            activation
        }
        None if !script.is_file() => {
            println!(
                "⚠️  No virtual environment at {}; using the system Python.",
                script.display()
            );
            tracing::warn!(script = %script.display(), "activation script not found");
            Activation::ambient()
        }
        None => {
            println!(
                "⚠️  Could not activate {}; using the system Python.",
                script.display()
            );
            Activation::ambient()
        }
    }
}
