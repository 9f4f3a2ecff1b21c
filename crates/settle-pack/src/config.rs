//! Configuration file support
//!
//! Reads `settle-pack.toml` from the project root. Interpreter, directories and
//! forced-include module lists live here, with built-in defaults when the file
//! is absent.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env::consts::EXE_SUFFIX;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE: &str = "settle-pack.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How a package failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureRole {
    /// Abort the pipeline immediately.
    #[default]
    Fatal,

    /// Report the failure and keep going; earlier artifacts stay valid.
    Degraded,
}

/// Exit status of a run whose degraded packages failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecondaryFailurePolicy {
    /// Exit 1, the way the batch scripts did.
    #[default]
    Fail,

    /// Exit 0 with a warning.
    Warn,
}

/// One executable to produce. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSpec {
    pub name: String,
    pub entry: PathBuf,

    #[serde(default = "default_true")]
    pub onefile: bool,

    #[serde(default = "default_true")]
    pub console: bool,

    #[serde(default)]
    pub failure: FailureRole,

    /// Modules static analysis misses; passed as `--hidden-import`.
    #[serde(default)]
    pub hidden_imports: Vec<String>,

    /// Packages whose plugins are discovered at runtime; passed as `--collect-all`.
    #[serde(default)]
    pub collect_all: Vec<String>,

    /// Files bundled next to the entry script.
    #[serde(default)]
    pub add_data: Vec<PathBuf>,

    /// Build from `<name>.spec` when it exists instead of the flag set.
    #[serde(default)]
    pub reuse_spec_file: bool,

    #[serde(default)]
    pub usage: Vec<String>,
}

impl PackageSpec {
    /// File name of the produced executable, e.g. `settle_baemin.exe` on Windows.
    pub fn artifact_file_name(&self) -> String {
        format!("{}{EXE_SUFFIX}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PackConfig {
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_packager_module")]
    pub packager_module: String,

    #[serde(default = "default_packager_package")]
    pub packager_package: String,

    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    #[serde(default = "default_activation_script")]
    pub activation_script: PathBuf,

    /// Blind wait after terminating processes and after emptying `dist/`.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_true")]
    pub pause_on_failure: bool,

    #[serde(default)]
    pub secondary_failure: SecondaryFailurePolicy,

    #[serde(default = "default_packages", rename = "package")]
    pub packages: Vec<PackageSpec>,
}

impl Default for PackConfig {
    fn default() -> Self {
        PackConfig {
            python: default_python(),
            packager_module: default_packager_module(),
            packager_package: default_packager_package(),
            build_dir: default_build_dir(),
            dist_dir: default_dist_dir(),
            activation_script: default_activation_script(),
            settle_delay_ms: default_settle_delay_ms(),
            pause_on_failure: true,
            secondary_failure: SecondaryFailurePolicy::default(),
            packages: default_packages(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_python() -> String {
    "python".to_string()
}
fn default_packager_module() -> String {
    "PyInstaller".to_string()
}
fn default_packager_package() -> String {
    "pyinstaller".to_string()
}
fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}
fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}
fn default_activation_script() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("venv/Scripts/activate")
    } else {
        PathBuf::from("venv/bin/activate")
    }
}
fn default_settle_delay_ms() -> u64 {
    2000
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_packages() -> Vec<PackageSpec> {
    vec![
        PackageSpec {
            name: "settle_baemin".to_string(),
            entry: PathBuf::from("settle_baemin.py"),
            onefile: true,
            console: true,
            failure: FailureRole::Fatal,
            hidden_imports: strings(&[
                "pandas",
                "numpy",
                "openpyxl",
                "openpyxl.cell._writer",
                "xlsxwriter",
            ]),
            collect_all: Vec::new(),
            add_data: Vec::new(),
            reuse_spec_file: false,
            usage: vec![
                format!("Usage: settle_baemin{EXE_SUFFIX} <input>.xlsx --out <output>.xlsx"),
                format!("  e.g. settle_baemin{EXE_SUFFIX} 배치데이터.xlsx --out 정산_최종_결과.xlsx"),
            ],
        },
        PackageSpec {
            name: "settle_baemin_web".to_string(),
            entry: PathBuf::from("app_streamlit_wrapper.py"),
            onefile: true,
            console: true,
            failure: FailureRole::Degraded,
            hidden_imports: strings(&[
                "streamlit",
                "streamlit.web.cli",
                "streamlit.runtime.scriptrunner.magic_funcs",
                "altair",
                "pyarrow",
                "pydeck",
                "tornado",
                "watchdog",
                "click",
                "validators",
                "pandas",
                "numpy",
                "openpyxl",
            ]),
            collect_all: strings(&["streamlit"]),
            add_data: vec![PathBuf::from("app.py"), PathBuf::from("settle_baemin.py")],
            reuse_spec_file: true,
            usage: Vec::new(),
        },
    ]
}

impl PackConfig {
    /// Load `explicit` if given, else `<root>/settle-pack.toml`, else defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE);
                if !candidate.exists() {
                    tracing::debug!("no {CONFIG_FILE} under {}, using defaults", root.display());
                    return Ok(PackConfig::default());
                }
                candidate
            }
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: path.clone(),
                source,
            },
            ParseFailure::Invalid(msg) => ConfigError::Invalid(msg),
        })?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, ParseFailure> {
        let config: PackConfig = toml::from_str(content).map_err(ParseFailure::Toml)?;
        config.validate().map_err(ParseFailure::Invalid)?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        owned_dir("build_dir", &self.build_dir)?;
        owned_dir("dist_dir", &self.dist_dir)?;
        if self.build_dir == self.dist_dir {
            return Err("build_dir and dist_dir must differ".to_string());
        }
        if self.packages.is_empty() {
            return Err("at least one [[package]] is required".to_string());
        }
        let mut seen = HashSet::new();
        for p in &self.packages {
            if p.name.is_empty() || p.name.contains(['/', '\\']) {
                return Err(format!("package name '{}' is not a plain file name", p.name));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(format!("package '{}' is declared twice", p.name));
            }
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Packages with the given role, in declaration order.
    pub fn packages_with(&self, role: FailureRole) -> impl Iterator<Item = &PackageSpec> {
        self.packages.iter().filter(move |p| p.failure == role)
    }

    /// Process image names the cleaner terminates.
    pub fn artifact_images(&self) -> Vec<String> {
        self.packages.iter().map(PackageSpec::artifact_file_name).collect()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// `build_dir` and `dist_dir` are deleted on every run, so they must name a
/// plain subdirectory of the project root.
fn owned_dir(field: &str, dir: &Path) -> Result<(), String> {
    if dir.as_os_str().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if !dir.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(format!(
            "{field} '{}' must be a relative path below the project root without '.' or '..'",
            dir.display()
        ));
    }
    Ok(())
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(String),
}

/// Absolute directories for one run, resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub build_dir: PathBuf,
    pub dist_dir: PathBuf,
}

impl Layout {
    pub fn new(root: &Path, config: &PackConfig) -> Self {
        Layout {
            root: root.to_path_buf(),
            build_dir: root.join(&config.build_dir),
            dist_dir: root.join(&config.dist_dir),
        }
    }

    pub fn artifact_path(&self, spec: &PackageSpec) -> PathBuf {
        self.dist_dir.join(spec.artifact_file_name())
    }

    /// Location of a previously generated PyInstaller spec file.
    pub fn spec_file(&self, spec: &PackageSpec) -> PathBuf {
        self.root.join(format!("{}.spec", spec.name))
    }
}
