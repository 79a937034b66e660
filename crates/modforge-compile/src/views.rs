//! # View Synthesizer
//!
//! Derives a form, list and search view for each compiled schema.
//!
//! | View | Default fields | Extra |
//! |------|----------------|-------|
//! | form | every field, declaration order | status bar and transition buttons in the header |
//! | list | required fields, then `status` | first field when nothing else qualifies |
//! | search | text and single-choice fields | one filter per workflow state |
//!
//! A field's `visible_in` hint replaces the default rule for that field.
//! Views of extension models are standalone, low-priority views containing
//! only the added fields, so the runtime's own views stay untouched.

use std::fmt::Write as _;

use modforge_spec::{ViewKind, STATUS_FIELD};
use modforge_state::StateMachineDefinition;
use serde::Serialize;

use crate::schema::{CompiledSchema, FieldDeclaration};
use crate::text::xml_escape;

/// Priority given to views of extension models.
pub const EXTENSION_VIEW_PRIORITY: u32 = 99;

/// A button firing one workflow action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionButton {
    pub action: String,
    pub label: String,
    /// States the action is offered from, in table order.
    pub from_states: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormView {
    pub fields: Vec<String>,
    pub statusbar: bool,
    pub buttons: Vec<ActionButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateFilter {
    pub state: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchView {
    pub fields: Vec<String>,
    pub filters: Vec<StateFilter>,
}

/// The three views of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSet {
    pub model: String,
    pub technical: String,
    pub file_stem: String,
    pub title: String,
    pub priority: Option<u32>,
    pub form: FormView,
    pub list: Vec<String>,
    pub search: SearchView,
}

/// Derive the views for `schema`, with workflow controls when `workflow` is given.
pub fn synthesize(schema: &CompiledSchema, workflow: Option<&StateMachineDefinition>) -> ViewSet {
    let status = workflow.and_then(|_| schema.field(STATUS_FIELD));
    // The workflow status lives in the header and at the end of the list.
    let in_body = |f: &&FieldDeclaration| status.is_none() || f.name != STATUS_FIELD;

    let form_fields = names(
        schema
            .fields
            .iter()
            .filter(in_body)
            .filter(|f| f.shown_in(ViewKind::Form, true)),
    );

    let mut list = names(
        schema
            .fields
            .iter()
            .filter(in_body)
            .filter(|f| f.shown_in(ViewKind::List, f.required)),
    );
    if status.is_some_and(|s| s.shown_in(ViewKind::List, true)) {
        list.push(STATUS_FIELD.to_string());
    }
    if list.is_empty() {
        list.extend(form_fields.first().cloned());
    }

    let search_fields = names(schema.fields.iter().filter(|f| {
        f.shown_in(
            ViewKind::Search,
            f.field_type.is_textual() || f.field_type.is_selection(),
        )
    }));

    let (buttons, filters) = match workflow {
        Some(machine) => (buttons(machine), filters(machine)),
        None => (Vec::new(), Vec::new()),
    };

    tracing::debug!(
        model = %schema.model,
        form = form_fields.len(),
        list = list.len(),
        search = search_fields.len(),
        "views synthesized"
    );

    ViewSet {
        model: schema.model.clone(),
        technical: schema.technical.to_string(),
        file_stem: schema.file_stem.clone(),
        title: schema.description.clone(),
        priority: schema.is_extension().then_some(EXTENSION_VIEW_PRIORITY),
        form: FormView {
            fields: form_fields,
            statusbar: status.is_some(),
            buttons,
        },
        list,
        search: SearchView {
            fields: search_fields,
            filters,
        },
    }
}

fn names<'a>(fields: impl Iterator<Item = &'a FieldDeclaration>) -> Vec<String> {
    fields.map(|f| f.name.clone()).collect()
}

fn buttons(machine: &StateMachineDefinition) -> Vec<ActionButton> {
    machine
        .actions()
        .into_iter()
        .map(|action| {
            let rows: Vec<_> = machine.transitions.iter().filter(|t| t.action == action).collect();
            let mut from_states: Vec<String> = Vec::new();
            for row in &rows {
                if !from_states.contains(&row.key.from) {
                    from_states.push(row.key.from.clone());
                }
            }
            ActionButton {
                action: action.to_string(),
                label: rows.first().map(|t| t.label.clone()).unwrap_or_default(),
                from_states,
            }
        })
        .collect()
}

fn filters(machine: &StateMachineDefinition) -> Vec<StateFilter> {
    machine
        .states
        .iter()
        .map(|s| StateFilter {
            state: s.name.clone(),
            label: s.label.clone(),
        })
        .collect()
}

impl ViewSet {
    fn record_id(&self, kind: &str) -> String {
        format!("view_{}_{kind}", self.file_stem)
    }

    /// External ids of the records this view file defines.
    pub fn record_ids(&self) -> [String; 3] {
        [self.record_id("form"), self.record_id("list"), self.record_id("search")]
    }

    /// Contents of `views/<stem>_views.xml`.
    pub fn render_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<odoo>\n");
        let title = xml_escape(&self.title);

        let mut form = format!("            <form string=\"{title}\">\n");
        if self.form.statusbar || !self.form.buttons.is_empty() {
            form.push_str("                <header>\n");
            for b in &self.form.buttons {
                let states: Vec<String> = b.from_states.iter().map(|s| format!("'{s}'")).collect();
                let _ = writeln!(
                    form,
                    "                    <button name=\"{}\" type=\"object\" string=\"{}\" invisible=\"status not in ({},)\"/>",
                    b.action,
                    xml_escape(&b.label),
                    states.join(", ")
                );
            }
            if self.form.statusbar {
                form.push_str("                    <field name=\"status\" widget=\"statusbar\"/>\n");
            }
            form.push_str("                </header>\n");
        }
        form.push_str("                <sheet>\n                    <group>\n");
        for f in &self.form.fields {
            let _ = writeln!(form, "                        <field name=\"{f}\"/>");
        }
        form.push_str("                    </group>\n                </sheet>\n            </form>\n");
        self.push_record(&mut out, "form", &form);

        let mut list = format!("            <list string=\"{title}\">\n");
        for f in &self.list {
            let _ = writeln!(list, "                <field name=\"{f}\"/>");
        }
        list.push_str("            </list>\n");
        self.push_record(&mut out, "list", &list);

        let mut search = format!("            <search string=\"{title}\">\n");
        for f in &self.search.fields {
            let _ = writeln!(search, "                <field name=\"{f}\"/>");
        }
        if !self.search.filters.is_empty() {
            search.push_str("                <separator/>\n");
        }
        for filter in &self.search.filters {
            let _ = writeln!(
                search,
                "                <filter name=\"status_{0}\" string=\"{1}\" domain=\"[('status', '=', '{0}')]\"/>",
                filter.state,
                xml_escape(&filter.label)
            );
        }
        search.push_str("            </search>\n");
        self.push_record(&mut out, "search", &search);

        out.push_str("</odoo>\n");
        out
    }

    fn push_record(&self, out: &mut String, kind: &str, arch: &str) {
        let _ = writeln!(out, "    <record id=\"{}\" model=\"ir.ui.view\">", self.record_id(kind));
        let _ = writeln!(out, "        <field name=\"name\">{}.{kind}</field>", self.technical);
        let _ = writeln!(out, "        <field name=\"model\">{}</field>", self.technical);
        if let Some(priority) = self.priority {
            let _ = writeln!(out, "        <field name=\"priority\">{priority}</field>");
        }
        out.push_str("        <field name=\"arch\" type=\"xml\">\n");
        out.push_str(arch);
        out.push_str("        </field>\n    </record>\n");
    }
}
