//! Renders compiled schemas as runtime model sources.
//!
//! Output is byte-for-byte deterministic: no timestamps, no hash-ordered
//! collections.

use std::fmt::Write as _;

use modforge_state::StateMachineDefinition;

use crate::schema::{CompiledSchema, DefaultValue, FieldDeclaration, FieldType, SchemaMode};
use crate::text::{class_name, py_bool, py_str};

const HEADER: &str = "# Generated by modforge. Edit the module specification instead.\n";

/// Source of `models/<stem>.py`.
pub fn render_model(schema: &CompiledSchema, workflow: Option<&StateMachineDefinition>) -> String {
    let mut out = String::from(HEADER);
    out.push_str("from odoo import fields, models\n");
    if workflow.is_some() {
        out.push_str("from odoo.exceptions import UserError\n");
        out.push_str("from odoo.tools.safe_eval import safe_eval\n");
    }
    out.push_str("\n\n");

    let _ = writeln!(out, "class {}(models.Model):", class_name(&schema.model));
    match &schema.mode {
        SchemaMode::New => {
            let _ = writeln!(out, "    _name = {}", py_str(schema.technical.as_str()));
            let _ = writeln!(out, "    _description = {}", py_str(&schema.description));
        }
        SchemaMode::Extension { base } => {
            let _ = writeln!(out, "    _inherit = {}", py_str(base.as_str()));
        }
    }

    if !schema.fields.is_empty() {
        out.push('\n');
    }
    for field in &schema.fields {
        let _ = writeln!(out, "    {} = {}", field.name, declaration(field));
    }

    if let Some(machine) = workflow {
        render_transitions(&mut out, machine);
    }

    for method in &schema.methods {
        out.push('\n');
        let _ = writeln!(out, "    def {}(self):", method.name);
        if !method.behavior.is_empty() {
            let _ = writeln!(out, "        {}", docstring(&method.behavior));
        }
        out.push_str("        raise NotImplementedError()\n");
    }
    out
}

/// Source of `models/__init__.py`, importing each stem in load order.
pub fn render_models_init<'a>(stems: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::from(HEADER);
    for stem in stems {
        let _ = writeln!(out, "from . import {stem}");
    }
    out
}

/// Source of the package's top-level `__init__.py`.
pub fn render_package_init() -> String {
    format!("{HEADER}from . import models\n")
}

/// The right-hand side of a field assignment: `fields.Char(string='Name')`.
pub fn declaration(field: &FieldDeclaration) -> String {
    let mut args: Vec<String> = Vec::new();
    match &field.field_type {
        FieldType::Selection { choices } => {
            let options: Vec<String> = choices
                .iter()
                .map(|c| format!("({}, {})", py_str(&c.value), py_str(&c.label)))
                .collect();
            args.push(format!("[{}]", options.join(", ")));
        }
        FieldType::Many2many { comodel } => args.push(py_str(comodel.as_str())),
        _ => {}
    }
    args.push(format!("string={}", py_str(&field.label)));
    if let FieldType::Float { digits } = &field.field_type {
        args.push(format!("digits=({}, {})", digits.precision, digits.scale));
    }
    if field.required {
        args.push("required=True".to_string());
    }
    if let Some(default) = &field.default {
        args.push(format!("default={}", default_literal(default)));
    }
    if let Some(help) = &field.help {
        args.push(format!("help={}", py_str(help)));
    }
    format!("fields.{}({})", field.field_type.constructor(), args.join(", "))
}

fn default_literal(value: &DefaultValue) -> String {
    match value {
        DefaultValue::Integer(n) => n.to_string(),
        DefaultValue::Boolean(b) => py_bool(*b).to_string(),
        // Quoted so the runtime parses the exact text, not a Python float.
        DefaultValue::Decimal(d) => py_str(d.as_str()),
        DefaultValue::Text(s) | DefaultValue::Date(s) | DefaultValue::Datetime(s) | DefaultValue::Choice(s) => {
            py_str(s)
        }
    }
}

fn docstring(text: &str) -> String {
    format!("\"\"\"{}\"\"\"", text.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\""))
}

fn render_transitions(out: &mut String, machine: &StateMachineDefinition) {
    out.push_str("\n    _workflow_transitions = [\n");
    for t in &machine.transitions {
        let guard = t.key.guard.as_deref().map(py_str).unwrap_or_else(|| "None".to_string());
        let _ = writeln!(
            out,
            "        ({}, {}, {}, {}),",
            py_str(&t.key.from),
            py_str(&t.action),
            guard,
            py_str(&t.to)
        );
    }
    out.push_str("    ]\n\n");

    out.push_str("    def _apply_transition(self, action):\n");
    out.push_str("        for record in self:\n");
    out.push_str("            for source, name, guard, target in self._workflow_transitions:\n");
    out.push_str("                if name != action or record.status != source:\n");
    out.push_str("                    continue\n");
    out.push_str("                if guard and not safe_eval(guard, {'record': record}):\n");
    out.push_str("                    continue\n");
    out.push_str("                record.status = target\n");
    out.push_str("                break\n");
    out.push_str("            else:\n");
    out.push_str("                raise UserError('%s is not allowed from state %s' % (action, record.status))\n");
    out.push_str("        return True\n");

    for action in machine.actions() {
        out.push('\n');
        let _ = writeln!(out, "    def {action}(self):");
        let _ = writeln!(out, "        return self._apply_transition({})", py_str(action));
    }
}
