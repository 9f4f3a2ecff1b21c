//! External process seam.
//!
//! Every child process (interpreter probe, pip, PyInstaller) goes through a
//! [`Runner`], so the pipeline can be driven without Python installed.

use crate::activate::Activation;
use crate::config::{Layout, PackConfig};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A fully described child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
    pub env: Vec<(String, OsString)>,
    pub env_remove: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
            env_remove: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn with_activation(mut self, activation: &Activation) -> Self {
        self.env.extend(activation.vars().iter().cloned());
        self.env_remove
            .extend(activation.removed().iter().cloned());
        self
    }

    /// Effective `PATH` the child will see.
    pub fn search_path(&self) -> Option<OsString> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == "PATH")
            .map(|(_, v)| v.clone())
            .or_else(|| std::env::var_os("PATH"))
    }

    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            write!(f, " {}", a.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Exit status of a finished child; `code` is `None` when killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    pub code: Option<i32>,
}

impl RunStatus {
    pub const SUCCESS: RunStatus = RunStatus { code: Some(0) };

    pub fn failed(code: i32) -> Self {
        RunStatus { code: Some(code) }
    }

    pub fn success(self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

impl From<std::process::ExitStatus> for RunStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        RunStatus {
            code: status.code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub status: RunStatus,
    pub stdout: String,
}

pub trait Runner {
    /// Run with inherited stdio so the operator sees the tool's own output.
    fn run(&mut self, invocation: &Invocation) -> io::Result<RunStatus>;

    /// Run with stdout captured and stderr discarded.
    fn capture(&mut self, invocation: &Invocation) -> io::Result<Captured>;
}

/// Runs real processes with `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(invocation: &Invocation) -> Command {
        // Resolve against the child's PATH, which activation may have changed.
        let program = which::which_in(
            &invocation.program,
            invocation.search_path(),
            &invocation.cwd,
        )
        .unwrap_or_else(|_| PathBuf::from(&invocation.program));

        let mut cmd = Command::new(program);
        cmd.args(&invocation.args).current_dir(&invocation.cwd);
        for key in &invocation.env_remove {
            cmd.env_remove(key);
        }
        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl Runner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> io::Result<RunStatus> {
        tracing::debug!(%invocation, "running");
        let status = Self::command(invocation).status()?;
        tracing::debug!(status = %RunStatus::from(status), "finished");
        Ok(status.into())
    }

    fn capture(&mut self, invocation: &Invocation) -> io::Result<Captured> {
        tracing::debug!(%invocation, "capturing");
        let out = Self::command(invocation)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;
        Ok(Captured {
            status: out.status.into(),
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        })
    }
}

/// The interpreter every Python-side step runs through.
#[derive(Debug, Clone, Copy)]
pub struct Toolchain<'a> {
    pub config: &'a PackConfig,
    pub layout: &'a Layout,
    pub activation: &'a Activation,
}

impl<'a> Toolchain<'a> {
    pub fn new(config: &'a PackConfig, layout: &'a Layout, activation: &'a Activation) -> Self {
        Toolchain {
            config,
            layout,
            activation,
        }
    }

    /// `<python> -m <module>` in the project root with activation applied.
    pub fn python_module(&self, module: &str) -> Invocation {
        Invocation::new(&self.config.python, &self.layout.root)
            .args(["-m", module])
            .with_activation(self.activation)
    }
}
