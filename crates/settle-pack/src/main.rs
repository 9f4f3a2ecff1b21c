//! # settle-pack
//!
//! Package the settlement calculator into standalone executables.
//!
//! ## Usage
//!
//! ```bash
//! settle-pack              # clean + build every package (same as `build`)
//! settle-pack build --yes  # don't ask when dist/ is locked
//! settle-pack clean        # terminate running executables, remove build/ and dist/
//! settle-pack status       # list built executables
//! settle-pack doctor       # preflight checks
//! ```

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let cli = settle_pack::cli::Cli::parse();
    settle_pack::app::init_tracing(cli.verbose);
    let code = settle_pack::app::run(cli)?;
    Ok(if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
