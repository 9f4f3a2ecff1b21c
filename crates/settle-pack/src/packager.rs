//! PyInstaller invocation, one package at a time.

use crate::config::{Layout, PackageSpec};
use crate::runner::{RunStatus, Runner, Toolchain};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Separator PyInstaller expects between source and destination in `--add-data`.
const ADD_DATA_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{name}: entry script {} not found", .path.display())]
    MissingEntry { name: String, path: PathBuf },

    #[error("{name}: failed to launch the packager")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("{name}: packaging failed ({status})")]
    Failed { name: String, status: RunStatus },

    #[error("{name}: packager succeeded but {} was not produced", .path.display())]
    MissingArtifact { name: String, path: PathBuf },
}

impl BuildError {
    pub fn package(&self) -> &str {
        match self {
            BuildError::MissingEntry { name, .. }
            | BuildError::Spawn { name, .. }
            | BuildError::Failed { name, .. }
            | BuildError::MissingArtifact { name, .. } => name,
        }
    }
}

/// An executable produced by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
}

/// How the packager will be driven for `spec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Reuse a previously generated `<name>.spec`.
    SpecFile(PathBuf),
    /// Pass the full flag set.
    Flags,
}

pub fn build_mode(spec: &PackageSpec, layout: &Layout) -> BuildMode {
    let spec_file = layout.spec_file(spec);
    if spec.reuse_spec_file && spec_file.is_file() {
        BuildMode::SpecFile(spec_file)
    } else {
        BuildMode::Flags
    }
}

/// Packager arguments (after `-m PyInstaller`) for `spec`.
pub fn packager_args(spec: &PackageSpec, layout: &Layout, mode: &BuildMode) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--clean".into(), "--noconfirm".into()];
    args.push("--distpath".into());
    args.push(layout.dist_dir.clone().into());
    args.push("--workpath".into());
    args.push(layout.build_dir.clone().into());

    if let BuildMode::SpecFile(path) = mode {
        // Layout flags (--onefile, --name, ...) are rejected alongside a spec file.
        args.push(path.clone().into());
        return args;
    }

    if spec.onefile {
        args.push("--onefile".into());
    }
    let window = if spec.console { "--console" } else { "--windowed" };
    args.push(window.into());
    args.push("--name".into());
    args.push(spec.name.clone().into());
    args.push("--specpath".into());
    args.push(layout.root.clone().into());

    for module in &spec.hidden_imports {
        args.push("--hidden-import".into());
        args.push(module.into());
    }
    for package in &spec.collect_all {
        args.push("--collect-all".into());
        args.push(package.into());
    }
    for data in &spec.add_data {
        args.push("--add-data".into());
        let mut pair = layout.root.join(data).into_os_string();
        pair.push(ADD_DATA_SEPARATOR);
        pair.push(".");
        args.push(pair);
    }

    args.push(layout.root.join(&spec.entry).into());
    args
}

/// Run the packager for one package and confirm its artifact exists.
pub fn invoke_packager(
    runner: &mut dyn Runner,
    toolchain: &Toolchain<'_>,
    spec: &PackageSpec,
) -> Result<Artifact, BuildError> {
    let layout = toolchain.layout;
    let entry = layout.root.join(&spec.entry);
    if !entry.is_file() {
        return Err(BuildError::MissingEntry {
            name: spec.name.clone(),
            path: entry,
        });
    }

    let mode = build_mode(spec, layout);
    match &mode {
        BuildMode::SpecFile(p) => println!("🔨 Building {} from {}...", spec.name, p.display()),
        BuildMode::Flags => println!("🔨 Building {} ({})...", spec.name, spec.entry.display()),
    }

    let inv = toolchain
        .python_module(&toolchain.config.packager_module)
        .args(packager_args(spec, layout, &mode));
    let status = runner.run(&inv).map_err(|source| BuildError::Spawn {
        name: spec.name.clone(),
        source,
    })?;
    if !status.success() {
        return Err(BuildError::Failed {
            name: spec.name.clone(),
            status,
        });
    }

    let path = layout.artifact_path(spec);
    if !path.is_file() {
        return Err(BuildError::MissingArtifact {
            name: spec.name.clone(),
            path,
        });
    }

    println!("✅ Built {}", display_relative(&path, &layout.root));
    Ok(Artifact {
        name: spec.name.clone(),
        path,
    })
}

pub(crate) fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activate::Activation;
    use crate::config::PackConfig;
    use crate::runner::{Captured, Invocation};
    use std::fs;
    use tempfile::TempDir;

    /// Writes the artifact on success, like the real packager.
    struct FakePackager {
        status: RunStatus,
        produce: bool,
        calls: Vec<Invocation>,
    }

    impl Runner for FakePackager {
        fn run(&mut self, inv: &Invocation) -> io::Result<RunStatus> {
            self.calls.push(inv.clone());
            if self.produce {
                let args = inv.args_lossy();
                let dist = args
                    .iter()
                    .position(|a| a == "--distpath")
                    .map(|i| PathBuf::from(&args[i + 1]))
                    .unwrap();
                let name = args
                    .iter()
                    .position(|a| a == "--name")
                    .map_or("settle_baemin_web".to_string(), |i| args[i + 1].clone());
                fs::create_dir_all(&dist)?;
                fs::write(
                    dist.join(format!("{name}{}", std::env::consts::EXE_SUFFIX)),
                    b"MZ",
                )?;
            }
            Ok(self.status)
        }

        fn capture(&mut self, _inv: &Invocation) -> io::Result<Captured> {
            unreachable!("packager never captures")
        }
    }

    fn project() -> (TempDir, PackConfig) {
        let tmp = TempDir::new().unwrap();
        for f in ["settle_baemin.py", "app.py", "app_streamlit_wrapper.py"] {
            fs::write(tmp.path().join(f), "").unwrap();
        }
        (tmp, PackConfig::default())
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_cli_flags() {
        let (tmp, config) = project();
        let layout = Layout::new(tmp.path(), &config);
        let spec = &config.packages[0];
        let args = strings(&packager_args(spec, &layout, &BuildMode::Flags));

        for flag in ["--onefile", "--clean", "--noconfirm", "--console"] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        let hidden = args.iter().filter(|a| *a == "--hidden-import").count();
        assert_eq!(hidden, spec.hidden_imports.len());
        assert!(!args.iter().any(|a| a == "--collect-all"));
        assert!(args.last().unwrap().ends_with("settle_baemin.py"));
    }

    #[test]
    fn test_web_flags_collect_and_data() {
        let (tmp, config) = project();
        let layout = Layout::new(tmp.path(), &config);
        let spec = &config.packages[1];
        let args = strings(&packager_args(spec, &layout, &BuildMode::Flags));

        let i = args.iter().position(|a| a == "--collect-all").unwrap();
        assert_eq!(args[i + 1], "streamlit");
        let data: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--add-data")
            .map(|(i, _)| &args[i + 1])
            .collect();
        assert_eq!(data.len(), 2);
        assert!(data[0].ends_with(&format!("app.py{ADD_DATA_SEPARATOR}.")));
    }

    #[test]
    fn test_existing_spec_file_is_reused() {
        let (tmp, config) = project();
        let layout = Layout::new(tmp.path(), &config);
        let web = &config.packages[1];
        assert_eq!(build_mode(web, &layout), BuildMode::Flags);

        fs::write(layout.spec_file(web), "# generated\n").unwrap();
        let mode = build_mode(web, &layout);
        assert_eq!(mode, BuildMode::SpecFile(layout.spec_file(web)));
        let args = strings(&packager_args(web, &layout, &mode));
        assert!(!args.iter().any(|a| a == "--onefile" || a == "--name"));
        assert!(args.last().unwrap().ends_with("settle_baemin_web.spec"));

        // The CLI package never reuses, even when a spec file is around.
        let cli = &config.packages[0];
        fs::write(layout.spec_file(cli), "").unwrap();
        assert_eq!(build_mode(cli, &layout), BuildMode::Flags);
    }

    #[test]
    fn test_invoke_success_returns_artifact() {
        let (tmp, config) = project();
        let layout = Layout::new(tmp.path(), &config);
        let activation = Activation::ambient();
        let toolchain = Toolchain::new(&config, &layout, &activation);
        let mut runner = FakePackager {
            status: RunStatus::SUCCESS,
            produce: true,
            calls: Vec::new(),
        };

        let artifact = invoke_packager(&mut runner, &toolchain, &config.packages[0]).unwrap();
        assert_eq!(artifact.path, layout.artifact_path(&config.packages[0]));
        assert_eq!(runner.calls.len(), 1);
        assert_eq!(runner.calls[0].args_lossy()[..2], ["-m", "PyInstaller"]);
    }

    #[test]
    fn test_invoke_failure_and_missing_artifact() {
        let (tmp, config) = project();
        let layout = Layout::new(tmp.path(), &config);
        let activation = Activation::ambient();
        let toolchain = Toolchain::new(&config, &layout, &activation);

        let mut failing = FakePackager {
            status: RunStatus::failed(1),
            produce: false,
            calls: Vec::new(),
        };
        let err = invoke_packager(&mut failing, &toolchain, &config.packages[0]).unwrap_err();
        assert!(matches!(err, BuildError::Failed { .. }));
        assert_eq!(err.package(), "settle_baemin");

        let mut silent = FakePackager {
            status: RunStatus::SUCCESS,
            produce: false,
            calls: Vec::new(),
        };
        let err = invoke_packager(&mut silent, &toolchain, &config.packages[0]).unwrap_err();
        assert!(matches!(err, BuildError::MissingArtifact { .. }));
    }

    #[test]
    fn test_missing_entry_never_runs_packager() {
        let tmp = TempDir::new().unwrap();
        let config = PackConfig::default();
        let layout = Layout::new(tmp.path(), &config);
        let activation = Activation::ambient();
        let toolchain = Toolchain::new(&config, &layout, &activation);
        let mut runner = FakePackager {
            status: RunStatus::SUCCESS,
            produce: true,
            calls: Vec::new(),
        };
        let err = invoke_packager(&mut runner, &toolchain, &config.packages[0]).unwrap_err();
        assert!(matches!(err, BuildError::MissingEntry { .. }));
        assert!(runner.calls.is_empty());
    }
}
