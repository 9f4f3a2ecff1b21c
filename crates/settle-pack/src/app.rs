use crate::clean::{self, SystemTerminator};
use crate::cli::{BuildArgs, Cli, Cmd};
use crate::config::{Layout, PackConfig, SecondaryFailurePolicy};
use crate::pipeline::{ConsoleOperator, Pipeline};
use crate::report;
use crate::runner::SystemRunner;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` overrides the `-v` count.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .try_init();
}

/// Dispatch a parsed command line; returns the process exit code.
pub fn run(cli: Cli) -> Result<i32> {
    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("Resolving current directory")?,
    };
    let config = PackConfig::load(&root, cli.config.as_deref())
        .context("Loading settle-pack configuration")?;
    let layout = Layout::new(&root, &config);

    match cli.cmd.unwrap_or(Cmd::Build(BuildArgs::default())) {
        Cmd::Build(args) => Ok(build(&config, &layout, args)),
        Cmd::Clean => {
            let report = clean::clean(&config, &layout, &mut SystemTerminator::new());
            report.print(&layout);
            Ok(0)
        }
        Cmd::Status { json } => {
            let entries = report::collect(&config, &layout)
                .with_context(|| format!("Listing {}", layout.dist_dir.display()))?;
            if json {
                report::print_json(&entries)?;
            } else {
                report::print(&config, &layout, &entries);
            }
            Ok(0)
        }
        Cmd::Doctor => {
            crate::doctor::run(&config, &layout, &mut SystemRunner)?;
            Ok(0)
        }
        Cmd::Config => {
            print!("{}", config.to_toml().context("Serializing configuration")?);
            Ok(0)
        }
    }
}

/// `--allow-partial` overrides the configured policy.
fn secondary_policy(config: &PackConfig, args: BuildArgs) -> SecondaryFailurePolicy {
    if args.allow_partial {
        SecondaryFailurePolicy::Warn
    } else {
        config.secondary_failure
    }
}

fn build(config: &PackConfig, layout: &Layout, args: BuildArgs) -> i32 {
    let policy = secondary_policy(config, args);

    let mut runner = SystemRunner;
    let mut terminator = SystemTerminator::new();
    let mut operator = ConsoleOperator::new(args.yes, config.pause_on_failure);
    let summary = Pipeline::new(config, layout, &mut runner, &mut terminator, &mut operator).run();

    let code = summary.exit_code(policy);
    tracing::info!(code, outcome = ?summary.outcome, "build finished");
    code
}
