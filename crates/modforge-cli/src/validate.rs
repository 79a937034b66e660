//! # Validate Subcommand
//!
//! Decode a specification and run every validation check without compiling
//! anything. Extension targets are resolved against `--target` when given.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use modforge_pack::GeneratorConfig;
use modforge_spec::{load_specification, Validator};

use crate::{block_on, inventory_for, report_malformed};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Specification file (`.json`, `.yaml` or `.yml`).
    pub spec: PathBuf,

    /// Runtime base URL used to resolve extended entities.
    #[arg(long)]
    pub target: Option<String>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Exit `0` when the specification is valid, `1` otherwise.
pub fn run_validate(args: &ValidateArgs, config: &GeneratorConfig) -> Result<u8> {
    let spec = match load_specification(&args.spec) {
        Ok(spec) => spec,
        Err(err) => {
            if let Some(code) = report_malformed(&err) {
                return Ok(code);
            }
            return Err(err).with_context(|| format!("cannot load {}", args.spec.display()));
        }
    };
    let namespace = config.namespace_for(&spec).to_string();
    let inventory = block_on(inventory_for(&spec, &namespace, args.target.as_deref()))??;

    let report = match Validator::new(&inventory).validate(&spec) {
        Ok(report) => report,
        Err(unavailable) => {
            eprintln!("error: {unavailable}");
            return Ok(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
        if report.is_valid() {
            println!("{}: valid ({} warning(s))", args.spec.display(), report.warnings.len());
        }
    }
    Ok(if report.is_valid() { 0 } else { 1 })
}
