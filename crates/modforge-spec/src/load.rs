//! # Document Loading
//!
//! Reads a specification from JSON or YAML, applies the bundled structural
//! schema (`schemas/module-spec.schema.json`, Draft 2020-12), and decodes the
//! typed [`ModuleSpecification`].
//!
//! Structural violations and unknown field kinds are collected into one
//! [`SpecError::Malformed`] so the author sees every problem at once.

use std::path::Path;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::SpecError;
use crate::model::{FieldKind, ModuleSpecification};
use crate::report::{IssueCode, ValidationIssue};

const SPEC_SCHEMA: &str = include_str!("../../../schemas/module-spec.schema.json");

/// Serialization format of a specification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension. Anything other than
    /// `.yaml`/`.yml` is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Load and decode a specification file.
pub fn load_specification(path: &Path) -> Result<ModuleSpecification, SpecError> {
    let text = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = parse_document(&text, DocumentFormat::from_path(path), &path.display().to_string())?;
    tracing::debug!(path = %path.display(), "specification document parsed");
    decode_specification(&value)
}

/// Parse document text into the JSON value model.
pub fn parse_document(text: &str, format: DocumentFormat, origin: &str) -> Result<Value, SpecError> {
    match format {
        DocumentFormat::Json => serde_json::from_str(text).map_err(|e| SpecError::Parse {
            origin: origin.to_string(),
            reason: e.to_string(),
        }),
        DocumentFormat::Yaml => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(text).map_err(|e| SpecError::Parse {
                    origin: origin.to_string(),
                    reason: e.to_string(),
                })?;
            yaml_to_json(&yaml).map_err(|reason| SpecError::Parse {
                origin: origin.to_string(),
                reason,
            })
        }
    }
}

/// Check a document against the structural schema and decode it.
pub fn decode_specification(value: &Value) -> Result<ModuleSpecification, SpecError> {
    let mut issues = structural_issues(value)?;
    issues.extend(unknown_kind_issues(value));
    if !issues.is_empty() {
        return Err(SpecError::Malformed { issues });
    }
    serde_json::from_value(value.clone()).map_err(|e| SpecError::Malformed {
        issues: vec![ValidationIssue::new("", IssueCode::Malformed, e.to_string())],
    })
}

fn spec_schema() -> Result<&'static Validator, SpecError> {
    static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(SPEC_SCHEMA).map_err(|e| e.to_string())?;
            let mut opts = jsonschema::options();
            opts.with_draft(jsonschema::Draft::Draft202012);
            opts.build(&schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|reason| SpecError::Schema(reason.clone()))
}

fn structural_issues(value: &Value) -> Result<Vec<ValidationIssue>, SpecError> {
    let validator = spec_schema()?;
    Ok(validator
        .iter_errors(value)
        .map(|e| {
            let pointer = e.instance_path.to_string();
            ValidationIssue::new(readable_path(value, &pointer), IssueCode::Malformed, e.to_string())
        })
        .collect())
}

/// Report every `kind` string outside the closed enumeration.
fn unknown_kind_issues(value: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let Some(models) = value.get("models").and_then(Value::as_array) else {
        return issues;
    };
    for (mi, model) in models.iter().enumerate() {
        let Some(fields) = model.get("fields").and_then(Value::as_array) else {
            continue;
        };
        for (fi, field) in fields.iter().enumerate() {
            if let Some(kind) = field.get("kind").and_then(Value::as_str) {
                if FieldKind::parse(kind).is_none() {
                    let pointer = format!("/models/{mi}/fields/{fi}/kind");
                    issues.push(ValidationIssue::new(
                        readable_path(value, &pointer),
                        IssueCode::UnknownFieldKind,
                        format!(
                            "unknown field kind `{kind}`; expected one of: {}",
                            FieldKind::ALL.map(|k| k.as_str()).join(", ")
                        ),
                    ));
                }
            }
        }
    }
    issues
}

/// Render a JSON pointer as a dotted specification path, naming array
/// elements by their `name`/`model` where they have one.
///
/// `/models/0/fields/2/kind` becomes `models.Contract.fields.value.kind`.
pub fn readable_path(root: &Value, pointer: &str) -> String {
    let mut out = String::new();
    let mut node = Some(root);
    let mut parent_key = "";
    for segment in pointer.split('/').skip(1) {
        let current = node;
        node = match current {
            Some(Value::Array(items)) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Some(Value::Object(map)) => map.get(segment),
            _ => None,
        };
        if let (Some(Value::Array(_)), Ok(index)) = (current, segment.parse::<usize>()) {
            match node.and_then(|n| element_label(n, parent_key)) {
                Some(label) => {
                    out.push('.');
                    out.push_str(label);
                }
                None => out.push_str(&format!("[{index}]")),
            }
            continue;
        }
        let key = if segment == "workflow" { "workflows" } else { segment };
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(key);
        parent_key = segment;
    }
    out
}

fn element_label<'v>(element: &'v Value, parent_key: &str) -> Option<&'v str> {
    if matches!(parent_key, "transitions" | "rules") {
        return None;
    }
    match element {
        Value::String(s) => Some(s),
        Value::Object(map) => map
            .get("name")
            .or_else(|| map.get("model"))
            .or_else(|| map.get("value"))
            .and_then(Value::as_str),
        _ => None,
    }
}

/// Convert a YAML value tree to the JSON value model.
fn yaml_to_json(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq.iter().map(yaml_to_json).collect::<Result<_, _>>().map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key: {other:?}")),
                };
                out.insert(key, yaml_to_json(v)?);
            }
            Ok(Value::Object(out))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}
