//! # Generate Subcommand
//!
//! Validate, compile and assemble a specification, then write the package
//! archive and optionally unpack it.
//!
//! ```bash
//! modforge generate contracts.yaml --offline
//! modforge generate partner_tiers.yaml --target https://erp.example.com --unpack addons/
//! ```
//!
//! Without `--target` the runtime URL is read from `MODFORGE_RUNTIME_URL`.
//! `--offline` skips the inventory; specifications that extend existing
//! entities then fail with `SourceUnavailable`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use modforge_core::CancellationFlag;
use modforge_pack::{archive, Archive, GenerationError, Generator, GeneratorConfig, ARCHIVE_EXTENSION};
use modforge_spec::{load_specification, InventoryContext};

use crate::{block_on, inventory_for, report_malformed};

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Specification file (`.json`, `.yaml` or `.yml`).
    pub spec: PathBuf,

    /// Archive path. Defaults to `<module>.mfpkg` in the current directory.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Also write the package tree under this directory.
    #[arg(long)]
    pub unpack: Option<PathBuf>,

    /// Do not contact the runtime.
    #[arg(long, conflicts_with = "target")]
    pub offline: bool,

    /// Runtime base URL for the inventory.
    #[arg(long)]
    pub target: Option<String>,
}

pub fn run_generate(args: &GenerateArgs, config: &GeneratorConfig) -> Result<u8> {
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
    let target = match (&args.target, args.offline) {
        (_, true) => None,
        (Some(target), false) => Some(target.clone()),
        (None, false) => match std::env::var("MODFORGE_RUNTIME_URL") {
            Ok(url) => Some(url),
            Err(_) => bail!("no runtime target: pass --target, set MODFORGE_RUNTIME_URL, or use --offline"),
        },
    };

    let cancel = CancellationFlag::new();
    let generator = Generator::new(config.clone());
    let outcome = block_on(async {
        let watcher = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling generation");
                watcher.cancel();
            }
        });
        let inventory = match target.as_deref() {
            Some(target) => inventory_for(&spec, &namespace, Some(target)).await?,
            None => InventoryContext::unavailable(&namespace, "offline"),
        };
        let cancel = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || generator.generate(&spec, &inventory, &cancel))
            .await
            .context("generation task failed")?;
        anyhow::Ok(outcome)
    })??;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(GenerationError::Invalid(report)) => {
            eprint!("{report}");
            return Ok(1);
        }
        Err(GenerationError::SourceUnavailable(unavailable)) => {
            eprintln!("error: {unavailable}");
            return Ok(1);
        }
        Err(err) => return Err(err).context("generation failed"),
    };
    for warning in &outcome.report.warnings {
        eprintln!("warning: {warning}");
    }

    let module = &outcome.module;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.{ARCHIVE_EXTENSION}", module.name)));
    write_archive(&out, &archive::encode(module)?)?;

    println!("  module:  {}", module.name);
    println!("  version: {}", module.version);
    println!("  digest:  {}", module.digest);
    println!("  files:   {}", module.files.len());
    println!("  archive: {}", out.display());
    if let Some(dir) = &args.unpack {
        let root = Archive::from_module(module).unpack(dir)?;
        println!("  tree:    {}", root.display());
    }
    Ok(0)
}

fn write_archive(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write archive: {}", path.display()))
}
