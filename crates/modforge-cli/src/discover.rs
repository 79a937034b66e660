//! # Discover Subcommand
//!
//! Write a specification that extends every entity of a runtime namespace
//! with a template set of fields. The output format follows the `--out`
//! extension.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use modforge_pack::{extend_all, ExtensionTemplate};
use modforge_spec::model::DEFAULT_NAMESPACE;
use modforge_spec::DocumentFormat;

use crate::{block_on, runtime};

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Runtime base URL.
    #[arg(long)]
    pub target: String,

    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Where to write the specification (`.json`, `.yaml` or `.yml`).
    #[arg(long)]
    pub out: PathBuf,

    /// YAML or JSON file overriding the default field template.
    #[arg(long)]
    pub template: Option<PathBuf>,
}

pub fn run_discover(args: &DiscoverArgs) -> Result<u8> {
    let template = match &args.template {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read template {}", path.display()))?;
            serde_yaml::from_str::<ExtensionTemplate>(&text)
                .with_context(|| format!("invalid template {}", path.display()))?
        }
        None => ExtensionTemplate::default(),
    };
    let runtime = runtime(&args.target)?;
    let spec = block_on(extend_all(&runtime, &args.namespace, &template))?
        .with_context(|| format!("discovery against {} failed", args.target))?;

    let text = match DocumentFormat::from_path(&args.out) {
        DocumentFormat::Yaml => serde_yaml::to_string(&spec)?,
        DocumentFormat::Json => serde_json::to_string_pretty(&spec)? + "\n",
    };
    std::fs::write(&args.out, text).with_context(|| format!("failed to write {}", args.out.display()))?;

    println!("  namespace: {}", args.namespace);
    println!("  extended:  {} entities", spec.models.len());
    println!("  written:   {}", args.out.display());
    Ok(0)
}
