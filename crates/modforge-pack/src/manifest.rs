//! # Package Manifest
//!
//! `manifest.json` at the root of every generated package: identity, runtime
//! dependencies, model load order, declared extensions of existing entities,
//! and the data files the runtime loads, in loading order.

use serde::{Deserialize, Serialize};

/// One model in load order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModel {
    pub model: String,
    pub technical: String,
    /// Path of the model source, relative to the package root.
    pub source: String,
    /// Whether the model adds to an existing entity instead of defining one.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub additive: bool,
}

/// A model extending an entity that already exists in the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalExtension {
    pub model: String,
    pub entity: String,
    /// Runtime module that owns `entity`, when the inventory reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    pub namespace: String,
    pub depends: Vec<String>,
    pub models: Vec<ManifestModel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<ExternalExtension>,
    /// Data files in load order: access CSV, row rules, then views.
    pub data: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workflows: Vec<String>,
    pub installable: bool,
}

impl Manifest {
    /// Position of `model` in the load order.
    pub fn load_position(&self, model: &str) -> Option<usize> {
        self.models.iter().position(|m| m.model == model)
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self).map(|mut s| {
            s.push('\n');
            s
        })
    }
}

/// Append `items` to `list`, skipping entries already present.
pub(crate) fn push_unique<I, S>(list: &mut Vec<String>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for item in items {
        let item = item.into();
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_unique_keeps_first_occurrence_order() {
        let mut list = vec!["base".to_string()];
        push_unique(&mut list, ["mail", "base", "sale", "mail"]);
        assert_eq!(list, vec!["base", "mail", "sale"]);
    }

    #[test]
    fn render_omits_empty_optional_sections() {
        let manifest = Manifest {
            name: "contracts".into(),
            version: "1.0".into(),
            summary: String::new(),
            namespace: "default".into(),
            depends: vec!["base".into()],
            models: vec![ManifestModel {
                model: "Contract".into(),
                technical: "contracts.contract".into(),
                source: "models/contract.py".into(),
                additive: false,
            }],
            extends: vec![],
            data: vec!["views/contract_views.xml".into()],
            workflows: vec![],
            installable: true,
        };
        let rendered = manifest.render().unwrap();
        assert!(rendered.ends_with("}\n"));
        let v: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert!(v.get("extends").is_none());
        assert!(v.get("summary").is_none());
        assert!(v["models"][0].get("additive").is_none());
        assert_eq!(manifest.load_position("Contract"), Some(0));
    }
}
