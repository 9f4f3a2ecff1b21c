//! Best-effort reset to a clean pre-build state.
//!
//! Running executables hold file locks on `dist/`, so they are terminated
//! first. Every removal failure is downgraded to a [`StillPresentWarning`].

use crate::config::{Layout, PackConfig};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Nothing was there.
    Absent,
    Removed,
}

#[derive(Debug, Error)]
#[error("{} is still present after cleanup", .path.display())]
pub struct StillPresentWarning {
    pub path: PathBuf,
    #[source]
    pub source: Option<io::Error>,
}

/// Terminates running processes by image name.
pub trait ProcessTerminator {
    /// Kill every process named `image`; returns how many were signalled.
    /// Finding none is not an error.
    fn terminate(&mut self, image: &str) -> usize;
}

/// Cross-platform terminator backed by `sysinfo`.
pub struct SystemTerminator {
    system: System,
}

impl SystemTerminator {
    pub fn new() -> Self {
        SystemTerminator {
            system: System::new(),
        }
    }
}

impl Default for SystemTerminator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTerminator for SystemTerminator {
    fn terminate(&mut self, image: &str) -> usize {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
        );

        // Linux truncates `name()` to 15 bytes, so also match the executable path.
        let image = OsStr::new(image);
        let mut killed = 0;
        for process in self.system.processes().values() {
            let by_exe = process
                .exe()
                .and_then(Path::file_name)
                .is_some_and(|f| same_image(f, image));
            if (same_image(process.name(), image) || by_exe) && process.kill() {
                tracing::debug!(pid = %process.pid(), "killed {}", image.to_string_lossy());
                killed += 1;
            }
        }
        killed
    }
}

/// Image names are case-insensitive on Windows.
fn same_image(name: &OsStr, image: &OsStr) -> bool {
    if cfg!(windows) {
        name.eq_ignore_ascii_case(image)
    } else {
        name == image
    }
}

/// Remove `path` (file or directory tree), then check it is really gone.
pub fn try_remove(path: &Path) -> Result<Removal, StillPresentWarning> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::Absent),
        Err(e) => {
            return Err(StillPresentWarning {
                path: path.to_path_buf(),
                source: Some(e),
            })
        }
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    still_present(path, result.err())
}

fn still_present(path: &Path, source: Option<io::Error>) -> Result<Removal, StillPresentWarning> {
    if path.exists() {
        Err(StillPresentWarning {
            path: path.to_path_buf(),
            source,
        })
    } else {
        Ok(Removal::Removed)
    }
}

/// Empty `dir` entry by entry, wait, then remove the directory itself.
///
/// Per-entry failures are ignored; only the final state matters.
pub fn clear_dir(dir: &Path, settle: Duration) -> Result<Removal, StillPresentWarning> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Removal::Absent),
        Err(e) => {
            tracing::warn!("cannot list {}: {e}", dir.display());
            return try_remove(dir);
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let res = match entry.file_type() {
            Ok(t) if t.is_dir() => fs::remove_dir_all(&path),
            _ => fs::remove_file(&path),
        };
        if let Err(e) = res {
            tracing::warn!("could not delete {}: {e}", path.display());
        }
    }

    if !settle.is_zero() {
        std::thread::sleep(settle);
    }
    let result = fs::remove_dir_all(dir);
    still_present(dir, result.err())
}

#[derive(Debug)]
pub struct CleanReport {
    /// (image name, processes terminated)
    pub terminated: Vec<(String, usize)>,
    pub build: Result<Removal, StillPresentWarning>,
    pub output: Result<Removal, StillPresentWarning>,
}

impl CleanReport {
    pub fn is_clean(&self) -> bool {
        self.build.is_ok() && self.output.is_ok()
    }

    /// Set when `dist/` survived; the build pipeline asks before going on.
    pub fn output_warning(&self) -> Option<&StillPresentWarning> {
        self.output.as_ref().err()
    }

    pub fn print(&self, layout: &Layout) {
        for (image, count) in &self.terminated {
            if *count > 0 {
                println!("🔪 Terminated {count} running {image}");
            }
        }
        if self.terminated.iter().all(|(_, n)| *n == 0) {
            println!("ℹ️  No running executables found.");
        }
        print_removal(&layout.build_dir, &self.build);
        print_removal(&layout.dist_dir, &self.output);
    }
}

fn print_removal(dir: &Path, result: &Result<Removal, StillPresentWarning>) {
    match result {
        Ok(Removal::Absent) => println!("ℹ️  {}: nothing to clean", dir.display()),
        Ok(Removal::Removed) => println!("✅ Removed directory {}", dir.display()),
        Err(w) => {
            println!("⚠️  {w}");
            println!("   A running executable or another program may still hold a lock on it.");
        }
    }
}

/// Terminate running artifacts, wait, then clear the build and output dirs.
pub fn clean(
    config: &PackConfig,
    layout: &Layout,
    terminator: &mut dyn ProcessTerminator,
) -> CleanReport {
    println!("🧹 Cleaning previous build...");
    let terminated: Vec<(String, usize)> = config
        .artifact_images()
        .into_iter()
        .map(|image| {
            let n = terminator.terminate(&image);
            (image, n)
        })
        .collect();

    let settle = config.settle_delay();
    if !settle.is_zero() {
        std::thread::sleep(settle);
    }

    let build = try_remove(&layout.build_dir);
    if let Err(w) = &build {
        tracing::warn!("{w}");
    }
    let output = clear_dir(&layout.dist_dir, settle);
    if let Err(w) = &output {
        tracing::warn!("{w}");
    }

    CleanReport {
        terminated,
        build,
        output,
    }
}
