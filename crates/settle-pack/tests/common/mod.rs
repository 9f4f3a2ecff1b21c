//! Scripted stand-ins for Python, PyInstaller, the process table and the operator.

#![allow(dead_code)]

use settle_pack::clean::ProcessTerminator;
use settle_pack::config::{Layout, PackConfig};
use settle_pack::pipeline::Operator;
use settle_pack::runner::{Captured, Invocation, RunStatus, Runner};
use std::cell::RefCell;
use std::collections::HashSet;
use std::env::consts::EXE_SUFFIX;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

pub type Events = Rc<RefCell<Vec<String>>>;

/// A project directory with the Python sources the default config expects.
pub struct Project {
    pub dir: TempDir,
    pub config: PackConfig,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        for f in ["settle_baemin.py", "app.py", "app_streamlit_wrapper.py"] {
            fs::write(dir.path().join(f), "# python\n").unwrap();
        }
        let config = PackConfig {
            settle_delay_ms: 0,
            pause_on_failure: false,
            ..PackConfig::default()
        };
        Project { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.root(), &self.config)
    }

    pub fn dist_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.layout().dist_dir)
            .map(|rd| {
                rd.flatten()
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

pub fn exe(name: &str) -> String {
    format!("{name}{EXE_SUFFIX}")
}

/// Pretends to be `python`: answers the PyInstaller probe, pip and builds.
pub struct FakePython {
    pub packager_installed: bool,
    pub install_succeeds: bool,
    pub failing_packages: HashSet<String>,
    pub run_id: u32,
    pub calls: Vec<Invocation>,
    pub events: Events,
}

impl FakePython {
    pub fn new(events: &Events) -> Self {
        FakePython {
            packager_installed: true,
            install_succeeds: true,
            failing_packages: HashSet::new(),
            run_id: 1,
            calls: Vec::new(),
            events: Rc::clone(events),
        }
    }

    pub fn failing(mut self, package: &str) -> Self {
        self.failing_packages.insert(package.to_string());
        self
    }

    pub fn packager_calls(&self) -> Vec<&Invocation> {
        self.calls
            .iter()
            .filter(|c| c.has_arg("PyInstaller") && !c.has_arg("--version"))
            .collect()
    }

    pub fn built_names(&self) -> Vec<String> {
        self.packager_calls().iter().map(|c| package_name(c)).collect()
    }

    fn value_after(args: &[String], flag: &str) -> Option<String> {
        let i = args.iter().position(|a| a == flag)?;
        args.get(i + 1).cloned()
    }

    fn build(&mut self, inv: &Invocation) -> io::Result<RunStatus> {
        let name = package_name(inv);
        self.events.borrow_mut().push(format!("build {name}"));
        if self.failing_packages.contains(&name) {
            return Ok(RunStatus::failed(1));
        }

        let args = inv.args_lossy();
        let dist = PathBuf::from(Self::value_after(&args, "--distpath").unwrap());
        let work = PathBuf::from(Self::value_after(&args, "--workpath").unwrap());
        fs::create_dir_all(work.join(&name))?;
        fs::write(work.join(&name).join(format!("run-{}.toc", self.run_id)), "")?;
        fs::create_dir_all(&dist)?;
        fs::write(dist.join(exe(&name)), format!("MZ {name}"))?;
        if let Some(spec_dir) = Self::value_after(&args, "--specpath") {
            fs::write(Path::new(&spec_dir).join(format!("{name}.spec")), "# generated\n")?;
        }
        Ok(RunStatus::SUCCESS)
    }
}

/// `--name` value, or the stem of a reused `.spec` file.
pub fn package_name(inv: &Invocation) -> String {
    let args = inv.args_lossy();
    if let Some(i) = args.iter().position(|a| a == "--name") {
        return args[i + 1].clone();
    }
    let last = args.last().cloned().unwrap_or_default();
    Path::new(&last)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl Runner for FakePython {
    fn run(&mut self, inv: &Invocation) -> io::Result<RunStatus> {
        self.calls.push(inv.clone());
        if inv.has_arg("pip") {
            self.events.borrow_mut().push("pip install".to_string());
            return Ok(if self.install_succeeds {
                self.packager_installed = true;
                RunStatus::SUCCESS
            } else {
                RunStatus::failed(1)
            });
        }
        self.build(inv)
    }

    fn capture(&mut self, inv: &Invocation) -> io::Result<Captured> {
        self.calls.push(inv.clone());
        self.events.borrow_mut().push("probe".to_string());
        Ok(if self.packager_installed {
            Captured {
                status: RunStatus::SUCCESS,
                stdout: "6.10.0\n".to_string(),
            }
        } else {
            Captured {
                status: RunStatus::failed(1),
                stdout: String::new(),
            }
        })
    }
}

/// Records terminations and whether `dist/` still existed at that moment.
pub struct FakeProcesses {
    pub running: HashSet<String>,
    pub dist_dir: PathBuf,
    pub dist_present_at_kill: Vec<bool>,
    pub events: Events,
}

impl FakeProcesses {
    pub fn new(events: &Events, layout: &Layout) -> Self {
        FakeProcesses {
            running: HashSet::new(),
            dist_dir: layout.dist_dir.clone(),
            dist_present_at_kill: Vec::new(),
            events: Rc::clone(events),
        }
    }
}

impl ProcessTerminator for FakeProcesses {
    fn terminate(&mut self, image: &str) -> usize {
        self.events.borrow_mut().push(format!("terminate {image}"));
        self.dist_present_at_kill.push(self.dist_dir.exists());
        usize::from(self.running.remove(image))
    }
}

#[derive(Default)]
pub struct ScriptedOperator {
    pub answer: bool,
    pub confirms: usize,
    pub pauses: usize,
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, _prompt: &str) -> bool {
        self.confirms += 1;
        self.answer
    }

    fn pause(&mut self, _message: &str) {
        self.pauses += 1;
    }
}
