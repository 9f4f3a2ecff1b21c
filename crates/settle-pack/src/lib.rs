//! # settle-pack
//!
//! Packages the settlement calculator into standalone executables.
//!
//! ## Structure
//!
//! - `config` - `settle-pack.toml` loading, package specs, directory layout
//! - `activate` - optional virtualenv activation for child processes
//! - `runner` - process seam (`Runner`) and the interpreter toolchain
//! - `deps` - makes sure the packaging tool is installed
//! - `clean` - best-effort reset of `build/` and `dist/`
//! - `packager` - one PyInstaller invocation per package
//! - `report` - artifact listing and usage text
//! - `pipeline` - the combined build state machine
//! - `doctor` - preflight checks
//! - `cli` / `app` - command-line surface and dispatch
//!
//! ## Pipeline
//!
//! ```text
//! Start -> EnvReady -> DepReady -> Cleaned -> PrimaryBuilt
//!       -> SecondaryBuiltOrWarned -> Reported -> End
//! ```

pub mod activate;
pub mod app;
pub mod clean;
pub mod cli;
pub mod config;
pub mod deps;
pub mod doctor;
pub mod packager;
pub mod pipeline;
pub mod report;
pub mod runner;

pub use config::{FailureRole, Layout, PackConfig, PackageSpec, SecondaryFailurePolicy};
pub use pipeline::{Outcome, Pipeline, RunSummary, Stage};
