//! # modforge-cli: Command-Line Interface
//!
//! The `modforge` binary. Argument parsing lives in `main.rs`; each
//! subcommand module holds its clap arguments and a `run_*` handler that
//! delegates to the library crates and returns a process exit code.
//!
//! ## Subcommands
//!
//! - `modforge validate`: check a specification, print the report.
//! - `modforge generate`: produce a `.mfpkg` archive, optionally unpacked.
//! - `modforge install`: send an archive to a runtime.
//! - `modforge inventory`: list entities, fields and states of a runtime.
//! - `modforge discover`: write a specification extending every entity.
//!
//! ```bash
//! modforge validate contracts.yaml
//! modforge generate contracts.yaml --offline --unpack build/
//! MODFORGE_API_TOKEN=… modforge install contracts.mfpkg --target https://erp.example.com
//! ```
//!
//! Exit codes: `0` success, `1` rejected input or failed operation, `2`
//! usage error.

pub mod discover;
pub mod generate;
pub mod install;
pub mod inventory;
pub mod validate;

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use modforge_client::{load_context, CachedInventory, HttpRuntime, RuntimeConnectionConfig};
use modforge_pack::GeneratorConfig;
use modforge_spec::{InventoryContext, ModuleSpecification, SpecError};

/// Load the generator configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<GeneratorConfig> {
    match path {
        Some(path) => Ok(GeneratorConfig::from_yaml_file(path)?),
        None => Ok(GeneratorConfig::default()),
    }
}

/// Connection to `target`, with the token and retry settings from the
/// environment.
pub fn runtime(target: &str) -> Result<HttpRuntime> {
    let config = connection(target)?;
    HttpRuntime::new(&config).with_context(|| format!("cannot connect to {target}"))
}

pub fn connection(target: &str) -> Result<RuntimeConnectionConfig> {
    RuntimeConnectionConfig::from_env_with_url(target)
        .with_context(|| format!("invalid runtime configuration for {target}"))
}

/// Run `future` to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(rt.block_on(future))
}

/// Snapshot the inventory `spec` needs from `target`, or an unavailable
/// inventory when there is no target.
pub async fn inventory_for(
    spec: &ModuleSpecification,
    namespace: &str,
    target: Option<&str>,
) -> Result<InventoryContext> {
    let Some(target) = target else {
        return Ok(InventoryContext::unavailable(namespace, "no runtime target given"));
    };
    let provider = CachedInventory::new(runtime(target)?);
    let mut scoped = spec.clone();
    scoped.namespace = namespace.to_string();
    Ok(load_context(&provider, &scoped).await)
}

/// Print the issues of a malformed document. Returns `None` for other
/// loading errors, which the caller propagates.
pub fn report_malformed(err: &SpecError) -> Option<u8> {
    match err {
        SpecError::Malformed { issues } => {
            for issue in issues {
                eprintln!("error: {issue}");
            }
            Some(1)
        }
        _ => None,
    }
}
