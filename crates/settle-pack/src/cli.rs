use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "settle-pack")]
#[command(about = "Package the settlement calculator into standalone executables")]
pub struct Cli {
    /// Project directory holding the Python sources.
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration file (default: <root>/settle-pack.toml if present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Clean, then build every package (the default).
    Build(BuildArgs),

    /// Terminate running executables and remove build/ and dist/.
    Clean,

    /// List built executables and usage.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Check the interpreter, packaging tool and entry scripts.
    Doctor,

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Args, Debug, Default, Clone, Copy)]
pub struct BuildArgs {
    /// Continue without asking when dist/ could not be fully removed.
    #[arg(short, long)]
    pub yes: bool,

    /// Exit 0 when only secondary (web) packages failed.
    #[arg(long)]
    pub allow_partial: bool,
}
