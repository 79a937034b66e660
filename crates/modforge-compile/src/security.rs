//! # Security Compiler
//!
//! Turns role/permission rules into the runtime's two access artifacts:
//!
//! - **Access rows** (`security/ir.model.access.csv`): one per (model, role)
//!   pair. Rules naming the same pair are merged; their permissions are
//!   unioned.
//! - **Row-level rules** (`security/<module>_rules.xml`): one per access row
//!   whose permissions are a strict subset of read/write/create/delete, or
//!   which carries a domain. The rule applies only to the granted operations.
//!
//! New models that no rule covers get an implicit read-only access row for
//! the default role, plus the matching row-level rule. Roles are passed
//! through verbatim, but record ids fold `.`, `-` and spaces into `_`; two
//! roles that fold to the same id on one model fail with
//! [`CompileError::DuplicateRecordId`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use modforge_core::TechnicalName;
use modforge_spec::{InventoryContext, Permission, RuleSpec, SecuritySpec};
use serde::Serialize;

use crate::error::CompileError;
use crate::schema::CompiledSchema;
use crate::text::{csv_cell, xml_escape};

/// Role granted implicit read access when no rule covers a model.
pub const DEFAULT_ROLE: &str = "base.group_user";

/// Domain that matches every record.
pub const ALL_RECORDS: &str = "[(1, '=', 1)]";

const ACCESS_HEADER: &str = "id,name,model_id:id,group_id:id,perm_read,perm_write,perm_create,perm_unlink";

/// One line of the access CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRow {
    pub id: String,
    pub name: String,
    pub model: String,
    pub model_ref: String,
    pub role: String,
    pub permissions: BTreeSet<Permission>,
    /// Generated because no rule covered the model.
    pub implicit: bool,
}

impl AccessRow {
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn is_full(&self) -> bool {
        self.permissions.len() == Permission::ALL.len()
    }
}

/// A record rule restricting one role on one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRule {
    pub id: String,
    pub name: String,
    pub model_ref: String,
    pub role: String,
    pub domain: String,
    pub permissions: BTreeSet<Permission>,
}

/// Everything the security compiler emits for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityArtifacts {
    pub access: Vec<AccessRow>,
    pub rules: Vec<RowRule>,
    /// Logical names of models that received the implicit read-only rule.
    pub implicit: Vec<String>,
}

impl SecurityArtifacts {
    /// Contents of `security/ir.model.access.csv`.
    pub fn render_access_csv(&self) -> String {
        let mut out = format!("{ACCESS_HEADER}\n");
        for row in &self.access {
            let flag = |p| if row.grants(p) { "1" } else { "0" };
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{},{}",
                csv_cell(&row.id),
                csv_cell(&row.name),
                csv_cell(&row.model_ref),
                csv_cell(&row.role),
                flag(Permission::Read),
                flag(Permission::Write),
                flag(Permission::Create),
                flag(Permission::Delete),
            );
        }
        out
    }

    /// Contents of `security/<module>_rules.xml`.
    pub fn render_rules_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<odoo>\n");
        for rule in &self.rules {
            let flag = |p: Permission| if rule.permissions.contains(&p) { "True" } else { "False" };
            let _ = writeln!(out, "    <record id=\"{}\" model=\"ir.rule\">", rule.id);
            let _ = writeln!(out, "        <field name=\"name\">{}</field>", xml_escape(&rule.name));
            let _ = writeln!(out, "        <field name=\"model_id\" ref=\"{}\"/>", rule.model_ref);
            let _ = writeln!(out, "        <field name=\"groups\" eval=\"[(4, ref('{}'))]\"/>", rule.role);
            let _ = writeln!(out, "        <field name=\"domain_force\">{}</field>", xml_escape(&rule.domain));
            for (field, p) in [
                ("perm_read", Permission::Read),
                ("perm_write", Permission::Write),
                ("perm_create", Permission::Create),
                ("perm_unlink", Permission::Delete),
            ] {
                let _ = writeln!(out, "        <field name=\"{field}\" eval=\"{}\"/>", flag(p));
            }
            out.push_str("    </record>\n");
        }
        out.push_str("</odoo>\n");
        out
    }

    /// Whether any row-level rules were produced.
    pub fn has_rules(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// Compile `security` against the module's schemas.
///
/// Rules may also name runtime entities outside the specification; they are
/// resolved through `inventory`, or taken verbatim when it is unavailable.
pub fn compile(
    security: &SecuritySpec,
    schemas: &[CompiledSchema],
    inventory: &InventoryContext,
    default_role: &str,
) -> Result<SecurityArtifacts, CompileError> {
    // (model_ref, role) -> merged grant, in first-appearance order.
    let mut order: Vec<(String, String)> = Vec::new();
    let mut merged: BTreeMap<(String, String), Grant> = BTreeMap::new();

    for (index, rule) in security.rules.iter().enumerate() {
        let target = target_of(rule, index, schemas, inventory)?;
        let key = (target.model_ref.clone(), rule.role.clone());
        let grant = merged.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Grant {
                target,
                index,
                permissions: BTreeSet::new(),
                domains: Vec::new(),
            }
        });
        grant.permissions.extend(rule.permissions.iter().copied());
        if let Some(domain) = &rule.domain {
            if !grant.domains.contains(domain) {
                grant.domains.push(domain.clone());
            }
        }
    }

    let mut artifacts = SecurityArtifacts::default();
    let mut ids = RecordIds::default();
    for key in &order {
        let Some(grant) = merged.remove(key) else {
            continue;
        };
        let row = access_row(&grant.target, &key.1, grant.permissions, false);
        ids.claim(&row, || format!("security.rules[{}]", grant.index))?;
        if !row.is_full() || !grant.domains.is_empty() {
            artifacts.rules.push(row_rule(&row, &grant.domains));
        }
        artifacts.access.push(row);
    }

    for schema in schemas.iter().filter(|s| !s.is_extension()) {
        if security.covers(&schema.model) {
            continue;
        }
        tracing::warn!(
            model = %schema.model,
            role = default_role,
            "no access rule declared; granting implicit read-only access"
        );
        let target = Target::of(schema);
        let row = access_row(&target, default_role, BTreeSet::from([Permission::Read]), true);
        ids.claim(&row, || format!("models.{}", schema.model))?;
        artifacts.rules.push(row_rule(&row, &[]));
        artifacts.access.push(row);
        artifacts.implicit.push(schema.model.clone());
    }

    tracing::debug!(
        access = artifacts.access.len(),
        rules = artifacts.rules.len(),
        implicit = artifacts.implicit.len(),
        "security compiled"
    );
    Ok(artifacts)
}

struct Grant {
    target: Target,
    /// First rule that named this (model, role) pair.
    index: usize,
    permissions: BTreeSet<Permission>,
    domains: Vec<String>,
}

#[derive(Debug, Clone)]
struct Target {
    model: String,
    stem: String,
    model_ref: String,
}

impl Target {
    fn of(schema: &CompiledSchema) -> Self {
        Self {
            model: schema.model.clone(),
            stem: schema.file_stem.clone(),
            model_ref: schema.model_ref.clone(),
        }
    }
}

fn target_of(
    rule: &RuleSpec,
    index: usize,
    schemas: &[CompiledSchema],
    inventory: &InventoryContext,
) -> Result<Target, CompileError> {
    if let Some(schema) = schemas.iter().find(|s| s.model == rule.model) {
        return Ok(Target::of(schema));
    }
    let runtime = inventory.entity(&rule.model);
    if runtime.is_none() && inventory.is_available() {
        return Err(CompileError::UnknownModel {
            path: format!("security.rules[{index}]"),
            model: rule.model.clone(),
        });
    }
    let technical = TechnicalName::existing(&rule.model);
    let model_ref = match runtime.and_then(|e| e.descriptor.module.as_deref()) {
        Some(owner) => format!("{owner}.{}", technical.model_xml_id()),
        None => technical.model_xml_id(),
    };
    Ok(Target {
        model: rule.model.clone(),
        stem: technical.file_stem(),
        model_ref,
    })
}

/// Access-row ids already emitted, with the model and role behind each.
#[derive(Default)]
struct RecordIds(BTreeMap<String, (String, String)>);

impl RecordIds {
    fn claim(&mut self, row: &AccessRow, path: impl FnOnce() -> String) -> Result<(), CompileError> {
        if let Some((model, role)) = self.0.get(&row.id) {
            return Err(CompileError::DuplicateRecordId {
                path: path(),
                id: row.id.clone(),
                first: format!("{role} on {model}"),
                second: format!("{} on {}", row.role, row.model),
            });
        }
        self.0.insert(row.id.clone(), (row.model.clone(), row.role.clone()));
        Ok(())
    }
}

fn role_stem(role: &str) -> String {
    role.replace(['.', '-', ' '], "_")
}

fn access_row(target: &Target, role: &str, permissions: BTreeSet<Permission>, implicit: bool) -> AccessRow {
    AccessRow {
        id: format!("access_{}_{}", target.stem, role_stem(role)),
        name: format!("{} {}", target.model, role),
        model: target.model.clone(),
        model_ref: target.model_ref.clone(),
        role: role.to_string(),
        permissions,
        implicit,
    }
}

fn row_rule(row: &AccessRow, domains: &[String]) -> RowRule {
    let domain = match domains {
        [] => ALL_RECORDS.to_string(),
        [one] => one.clone(),
        // Rules for one group are alternatives: any of the domains grants access.
        many => format!("['|'] * {} + {}", many.len() - 1, many.join(" + ")),
    };
    let granted: Vec<&str> = row.permissions.iter().map(|p| p.as_str()).collect();
    RowRule {
        id: format!("rule_{}", row.id.trim_start_matches("access_")),
        name: format!("{}: {}", row.name, granted.join("/")),
        model_ref: row.model_ref.clone(),
        role: row.role.clone(),
        domain,
        permissions: row.permissions.clone(),
    }
}
