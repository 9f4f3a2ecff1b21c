//! Preflight checks: interpreter, packaging tool, entry scripts, venv.

use crate::activate;
use crate::config::{Layout, PackConfig};
use crate::deps;
use crate::runner::{Runner, Toolchain};
use anyhow::{bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub lines: Vec<(Check, String)>,
}

impl DoctorReport {
    fn push(&mut self, check: Check, message: String) {
        let tag = match check {
            Check::Ok => "[OK]",
            Check::Warn => "[WARN]",
            Check::Fail => "[FAIL]",
        };
        eprintln!("{tag} {message}");
        self.lines.push((check, message));
    }

    pub fn ok(&self) -> bool {
        self.lines.iter().all(|(c, _)| *c != Check::Fail)
    }
}

pub fn diagnose(config: &PackConfig, layout: &Layout, runner: &mut dyn Runner) -> DoctorReport {
    let mut report = DoctorReport::default();

    let activation = activate::find(&layout.root, config).unwrap_or_default();
    let script = layout.root.join(&config.activation_script);
    if activation.is_active() {
        report.push(Check::Ok, format!("virtual environment {}", script.display()));
    } else {
        report.push(
            Check::Warn,
            format!("no virtual environment at {}", script.display()),
        );
    }

    let toolchain = Toolchain::new(config, layout, &activation);
    let probe = toolchain.python_module("site");
    match which::which_in(&config.python, probe.search_path(), &layout.root) {
        Ok(path) => report.push(Check::Ok, format!("{} -> {}", config.python, path.display())),
        Err(_) => report.push(Check::Fail, format!("missing `{}` in PATH", config.python)),
    }

    match deps::probe(runner, &toolchain) {
        Some(version) => report.push(Check::Ok, format!("{} {version}", config.packager_module)),
        None => report.push(
            Check::Warn,
            format!(
                "{} not importable; `build` will install {}",
                config.packager_module, config.packager_package
            ),
        ),
    }

    for spec in &config.packages {
        let files = std::iter::once(&spec.entry).chain(spec.add_data.iter());
        for file in files {
            let path = layout.root.join(file);
            if path.is_file() {
                report.push(Check::Ok, format!("{}: {}", spec.name, file.display()));
            } else {
                report.push(
                    Check::Fail,
                    format!("{}: missing {}", spec.name, path.display()),
                );
            }
        }
    }

    report
}

pub fn run(config: &PackConfig, layout: &Layout, runner: &mut dyn Runner) -> Result<()> {
    if !diagnose(config, layout, runner).ok() {
        bail!("doctor checks failed");
    }
    Ok(())
}
