//! Combined build pipeline.
//!
//! ```text
//! Start -> EnvReady -> DepReady -> Cleaned -> PrimaryBuilt
//!       -> SecondaryBuiltOrWarned -> Reported -> End
//! ```
//!
//! Missing `DepReady` or `PrimaryBuilt` aborts straight to `End`. A failed
//! secondary package stays in `SecondaryBuiltOrWarned` and the run continues
//! to the report.

use crate::activate::{self, Activation};
use crate::clean::{self, ProcessTerminator};
use crate::config::{FailureRole, Layout, PackConfig, SecondaryFailurePolicy};
use crate::deps;
use crate::packager::{self, display_relative, Artifact, BuildError};
use crate::report;
use crate::runner::{Runner, Toolchain};
use std::fmt;
use std::io::{self, BufRead, IsTerminal, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    EnvReady,
    DepReady,
    Cleaned,
    PrimaryBuilt,
    SecondaryBuiltOrWarned,
    Reported,
    End,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::EnvReady => "environment",
            Stage::DepReady => "dependencies",
            Stage::Cleaned => "cleanup",
            Stage::PrimaryBuilt => "primary build",
            Stage::SecondaryBuiltOrWarned => "secondary build",
            Stage::Reported => "report",
            Stage::End => "end",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub enum Outcome {
    Success,

    /// Secondary packages failed; everything in `valid` is still usable.
    Degraded {
        failures: Vec<BuildError>,
        valid: Vec<Artifact>,
    },

    /// `failed_at` is the stage that could not be reached.
    Aborted { failed_at: Stage, reason: String },

    /// The operator declined to continue after an incomplete cleanup.
    Cancelled,
}

impl Outcome {
    /// One-line operator message for the final state.
    pub fn headline(&self) -> String {
        match self {
            Outcome::Success => "Build complete.".to_string(),
            Outcome::Degraded { failures, valid } => {
                let failed: Vec<&str> = failures.iter().map(BuildError::package).collect();
                let ok: Vec<&str> = valid.iter().map(|a| a.name.as_str()).collect();
                if ok.is_empty() {
                    return format!("Build of {} failed.", failed.join(", "));
                }
                format!(
                    "Build of {} failed, but {} built successfully and remain(s) valid and usable.",
                    failed.join(", "),
                    ok.join(", ")
                )
            }
            Outcome::Aborted { failed_at, reason } => {
                format!("Build aborted during {failed_at}: {reason}")
            }
            Outcome::Cancelled => "Build cancelled; previous output was not fully removed.".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub visited: Vec<Stage>,
    pub outcome: Outcome,
    pub artifacts: Vec<Artifact>,
}

impl RunSummary {
    pub fn reached(&self, stage: Stage) -> bool {
        self.visited.contains(&stage)
    }

    pub fn exit_code(&self, policy: SecondaryFailurePolicy) -> i32 {
        match (&self.outcome, policy) {
            (Outcome::Success, _) | (Outcome::Degraded { .. }, SecondaryFailurePolicy::Warn) => 0,
            (Outcome::Degraded { .. }, SecondaryFailurePolicy::Fail)
            | (Outcome::Aborted { .. } | Outcome::Cancelled, _) => 1,
        }
    }
}

/// The human at the console.
pub trait Operator {
    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &str) -> bool;

    /// Hold the window open so a failure message can be read.
    fn pause(&mut self, message: &str);
}

/// Prompts on stdin when it is a terminal; otherwise never blocks.
pub struct ConsoleOperator {
    assume_yes: bool,
    pause_enabled: bool,
}

impl ConsoleOperator {
    pub fn new(assume_yes: bool, pause_enabled: bool) -> Self {
        ConsoleOperator {
            assume_yes,
            pause_enabled,
        }
    }

    fn read_line() -> Option<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        Some(line)
    }
}

impl Operator for ConsoleOperator {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes || !io::stdin().is_terminal() {
            return true;
        }
        print!("{prompt} [y/N] ");
        let _ = io::stdout().flush();
        Self::read_line().is_some_and(|l| matches!(l.trim(), "y" | "Y" | "yes" | "YES"))
    }

    fn pause(&mut self, message: &str) {
        if !self.pause_enabled || !io::stdin().is_terminal() {
            return;
        }
        print!("{message}");
        let _ = io::stdout().flush();
        let _ = Self::read_line();
    }
}

pub struct Pipeline<'a> {
    config: &'a PackConfig,
    layout: &'a Layout,
    runner: &'a mut dyn Runner,
    terminator: &'a mut dyn ProcessTerminator,
    operator: &'a mut dyn Operator,
    visited: Vec<Stage>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PackConfig,
        layout: &'a Layout,
        runner: &'a mut dyn Runner,
        terminator: &'a mut dyn ProcessTerminator,
        operator: &'a mut dyn Operator,
    ) -> Self {
        Pipeline {
            config,
            layout,
            runner,
            terminator,
            operator,
            visited: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::info!(%stage, "stage reached");
        self.visited.push(stage);
    }

    fn finish(mut self, outcome: Outcome, artifacts: Vec<Artifact>) -> RunSummary {
        self.enter(Stage::End);
        RunSummary {
            visited: self.visited,
            outcome,
            artifacts,
        }
    }

    fn abort(self, failed_at: Stage, reason: String) -> RunSummary {
        eprintln!("\n❌ {reason}");
        self.operator.pause("Press Enter to exit...");
        let outcome = Outcome::Aborted { failed_at, reason };
        self.finish(outcome, Vec::new())
    }

    pub fn run(mut self) -> RunSummary {
        println!("=== Building settlement executables ===\n");
        self.enter(Stage::Start);
        let config = self.config;
        let layout = self.layout;

        let activation: Activation = activate::activate(&layout.root, config);
        self.enter(Stage::EnvReady);

        let toolchain = Toolchain::new(config, layout, &activation);
        if let Err(e) = deps::ensure_packager(self.runner, &toolchain) {
            let reason = format!("Could not install {}: {e}", config.packager_package);
            return self.abort(Stage::DepReady, reason);
        }
        self.enter(Stage::DepReady);

        let report = clean::clean(config, layout, self.terminator);
        report.print(layout);
        if let Some(warning) = report.output_warning() {
            println!("⚠️  Continuing may mix stale files into {}.", warning.path.display());
            if !self.operator.confirm("Continue with the build anyway?") {
                let summary = self.finish(Outcome::Cancelled, Vec::new());
                eprintln!("\n❌ {}", summary.outcome.headline());
                return summary;
            }
        }
        self.enter(Stage::Cleaned);

        let mut artifacts = Vec::new();
        for spec in config.packages_with(FailureRole::Fatal) {
            match packager::invoke_packager(self.runner, &toolchain, spec) {
                Ok(a) => artifacts.push(a),
                Err(e) => return self.abort(Stage::PrimaryBuilt, e.to_string()),
            }
        }
        self.enter(Stage::PrimaryBuilt);

        let valid = artifacts.clone();
        let mut failures = Vec::new();
        for spec in config.packages_with(FailureRole::Degraded) {
            match packager::invoke_packager(self.runner, &toolchain, spec) {
                Ok(a) => artifacts.push(a),
                Err(e) => {
                    eprintln!("\n⚠️  {e}");
                    for a in &valid {
                        eprintln!(
                            "   {} is still valid and usable.",
                            display_relative(&a.path, &layout.root)
                        );
                    }
                    tracing::warn!(package = e.package(), "secondary build failed");
                    failures.push(e);
                }
            }
        }
        self.enter(Stage::SecondaryBuiltOrWarned);

        match report::collect(config, layout) {
            Ok(entries) => report::print(config, layout, &entries),
            Err(e) => tracing::warn!("cannot list {}: {e}", layout.dist_dir.display()),
        }
        self.enter(Stage::Reported);

        let outcome = if failures.is_empty() {
            Outcome::Success
        } else {
            Outcome::Degraded { failures, valid }
        };
        println!("\n{}", outcome.headline());
        self.finish(outcome, artifacts)
    }
}
