//! # Inventory Subcommand
//!
//! Show what a runtime already has: every entity in a namespace, or the
//! fields and workflow states of one entity.

use anyhow::{Context, Result};
use clap::Args;
use modforge_client::InventoryProvider;
use modforge_spec::model::DEFAULT_NAMESPACE;

use crate::{block_on, runtime};

#[derive(Args, Debug)]
pub struct InventoryArgs {
    /// Runtime base URL.
    #[arg(long)]
    pub target: String,

    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Show fields and states of this entity instead of listing entities.
    #[arg(long)]
    pub entity: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

pub fn run_inventory(args: &InventoryArgs) -> Result<u8> {
    let runtime = runtime(&args.target)?;
    match &args.entity {
        None => {
            let mut entities = block_on(runtime.list_entities(&args.namespace))?
                .with_context(|| format!("cannot list entities of {}", args.target))?;
            entities.sort_by(|a, b| a.name.cmp(&b.name));
            if args.json {
                println!("{}", serde_json::to_string_pretty(&entities)?);
                return Ok(0);
            }
            for entity in &entities {
                println!(
                    "  {:<32} {:<24} {}",
                    entity.name,
                    entity.module.as_deref().unwrap_or("-"),
                    entity.label
                );
            }
            println!();
            println!("Total: {} entities in `{}`", entities.len(), args.namespace);
        }
        Some(entity) => {
            let (fields, states) = block_on(async {
                let fields = runtime.list_fields(entity).await?;
                let states = runtime.list_workflow_states(entity).await?;
                Ok::<_, modforge_client::InventoryError>((fields, states))
            })?
            .with_context(|| format!("cannot describe `{entity}`"))?;
            if args.json {
                let doc = serde_json::json!({"entity": entity, "fields": fields, "states": states});
                println!("{}", serde_json::to_string_pretty(&doc)?);
                return Ok(0);
            }
            println!("{entity}");
            for field in &fields {
                let required = if field.required { " (required)" } else { "" };
                match &field.relation {
                    Some(relation) => println!("  {:<32} {} -> {relation}{required}", field.name, field.field_type),
                    None => println!("  {:<32} {}{required}", field.name, field.field_type),
                }
            }
            if !states.is_empty() {
                let names: Vec<&str> = states.iter().map(|s| s.name.as_str()).collect();
                println!("  states: {}", names.join(" -> "));
            }
        }
    }
    Ok(0)
}
