//! # Install Subcommand
//!
//! Verify an archive and push it to a runtime. The API token comes from
//! `MODFORGE_API_TOKEN`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use modforge_client::{InstallOutcome, Installer};
use modforge_pack::{archive, install_archive};

use crate::{block_on, connection};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Package archive produced by `modforge generate`.
    pub archive: PathBuf,

    /// Runtime base URL.
    #[arg(long)]
    pub target: String,
}

/// Exit `0` when the runtime applied the package, `1` on partial or failed
/// installs.
pub fn run_install(args: &InstallArgs) -> Result<u8> {
    let package = archive::read(&args.archive)
        .with_context(|| format!("cannot read archive {}", args.archive.display()))?;
    let installer = Installer::new(&connection(&args.target)?)
        .with_context(|| format!("cannot connect to {}", args.target))?;

    let result = block_on(install_archive(&installer, &package))?
        .with_context(|| format!("install of `{}` failed", package.module))?;

    println!("  module:  {}", result.module);
    println!("  outcome: {}", match result.outcome {
        InstallOutcome::Success => "success",
        InstallOutcome::Failure => "failure",
    });
    if !result.created_ids.is_empty() {
        println!("  created: {}", result.created_ids.join(", "));
    }
    if let Some(reason) = &result.reason {
        println!("  reason:  {reason}");
    }
    Ok(if result.is_success() { 0 } else { 1 })
}
