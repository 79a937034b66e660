//! # Schema Compiler
//!
//! Maps each [`ModelSpec`] to a [`CompiledSchema`]: one typed
//! [`FieldDeclaration`] per field, with the runtime's technical model name
//! resolved and extensions marked additive.
//!
//! ## Type mapping
//!
//! | Field kind | Runtime declaration |
//! |------------|---------------------|
//! | `text` | `fields.Char` |
//! | `long-text` | `fields.Text` |
//! | `integer` | `fields.Integer` |
//! | `decimal` | `fields.Float(digits=(p, s))` |
//! | `boolean` | `fields.Boolean` |
//! | `date` | `fields.Date` |
//! | `datetime` | `fields.Datetime` |
//! | `single-choice` | `fields.Selection` |
//! | `multi-reference` | `fields.Many2many` |
//! | `binary` | `fields.Binary` |
//!
//! The match over [`FieldKind`] is exhaustive: adding a kind without a
//! mapping does not compile.

use modforge_core::{
    parse_date, CancellationFlag, DecimalLiteral, ModuleName, TechnicalName, Timestamp,
};
use modforge_spec::{
    Choice, Digits, FieldKind, FieldSpec, InventoryContext, MethodStub, ModelSpec,
    ModuleSpecification, ViewKind, STATUS_FIELD,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::CompileError;

/// Runtime field type with the parameters each type needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Char,
    Text,
    Integer,
    Float { digits: Digits },
    Boolean,
    Date,
    Datetime,
    Selection { choices: Vec<Choice> },
    Many2many { comodel: TechnicalName },
    Binary,
}

impl FieldType {
    /// The runtime's constructor name (`Char`, `Many2many`, ...).
    pub fn constructor(&self) -> &'static str {
        match self {
            Self::Char => "Char",
            Self::Text => "Text",
            Self::Integer => "Integer",
            Self::Float { .. } => "Float",
            Self::Boolean => "Boolean",
            Self::Date => "Date",
            Self::Datetime => "Datetime",
            Self::Selection { .. } => "Selection",
            Self::Many2many { .. } => "Many2many",
            Self::Binary => "Binary",
        }
    }

    pub fn is_selection(&self) -> bool {
        matches!(self, Self::Selection { .. })
    }

    /// Plain or long text.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Char | Self::Text)
    }
}

/// A typed default value, already checked against its field type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Text(String),
    Integer(i64),
    /// Exact decimal text; never passed through a float.
    Decimal(DecimalLiteral),
    Boolean(bool),
    /// `YYYY-MM-DD`.
    Date(String),
    /// `YYYY-MM-DD HH:MM:SS`, UTC.
    Datetime(String),
    Choice(String),
}

/// One compiled field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDeclaration {
    pub name: String,
    #[serde(flatten)]
    pub field_type: FieldType,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_in: Option<BTreeSet<ViewKind>>,
    /// Added by the generator rather than declared by the author.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub injected: bool,
}

impl FieldDeclaration {
    /// Whether the field belongs in `view`: the explicit hint when present,
    /// otherwise `derived`.
    pub fn shown_in(&self, view: ViewKind, derived: bool) -> bool {
        match &self.visible_in {
            Some(views) => views.contains(&view),
            None => derived,
        }
    }
}

/// Whether a schema defines a new entity or adds to an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SchemaMode {
    New,
    /// Declarations are additive to `base`.
    Extension { base: TechnicalName },
}

/// The compiled form of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledSchema {
    /// Logical name as written in the specification.
    pub model: String,
    pub technical: TechnicalName,
    #[serde(flatten)]
    pub mode: SchemaMode,
    /// External id of the runtime's model record, module-qualified for
    /// entities owned by another module.
    pub model_ref: String,
    pub file_stem: String,
    pub description: String,
    pub fields: Vec<FieldDeclaration>,
    pub methods: Vec<MethodStub>,
}

impl CompiledSchema {
    pub fn is_extension(&self) -> bool {
        matches!(self.mode, SchemaMode::Extension { .. })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_status(&self) -> bool {
        self.field(STATUS_FIELD).is_some()
    }

    /// Return a copy with the workflow's status field appended.
    ///
    /// Fails with [`CompileError::StatusConflict`] when the model already
    /// declares a `status` field.
    pub fn with_status(&self, status: &FieldSpec) -> Result<CompiledSchema, CompileError> {
        if self.has_status() {
            return Err(CompileError::StatusConflict {
                model: self.model.clone(),
            });
        }
        let mut declaration = compile_field(&self.model, status, FieldType::Selection {
            choices: status.choices.clone(),
        })?;
        declaration.injected = true;
        let mut schema = self.clone();
        schema.fields.push(declaration);
        Ok(schema)
    }
}

/// Compiles the models of one specification against an inventory snapshot.
#[derive(Debug)]
pub struct SchemaCompiler<'a> {
    spec: &'a ModuleSpecification,
    module: &'a ModuleName,
    inventory: &'a InventoryContext,
}

impl<'a> SchemaCompiler<'a> {
    pub fn new(
        spec: &'a ModuleSpecification,
        module: &'a ModuleName,
        inventory: &'a InventoryContext,
    ) -> Self {
        Self {
            spec,
            module,
            inventory,
        }
    }

    /// Compile every model in declaration order, checking `cancel` before
    /// each one.
    pub fn compile_all(&self, cancel: &CancellationFlag) -> Result<Vec<CompiledSchema>, CompileError> {
        let mut out = Vec::with_capacity(self.spec.models.len());
        for model in &self.spec.models {
            cancel.check("schema compilation")?;
            out.push(self.compile(model)?);
        }
        Ok(out)
    }

    /// Compile one model.
    pub fn compile(&self, model: &ModelSpec) -> Result<CompiledSchema, CompileError> {
        let (technical, mode) = match &model.extends {
            None => (
                TechnicalName::for_new_model(self.module, &model.name),
                SchemaMode::New,
            ),
            Some(base) => {
                let base = self.resolve(base, &format!("models.{}.extends", model.name))?;
                (base.clone(), SchemaMode::Extension { base })
            }
        };

        let fields = model
            .fields
            .iter()
            .map(|field| {
                let field_type = self.field_type(model, field)?;
                compile_field(&model.name, field, field_type)
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            model = %model.name,
            technical = %technical,
            fields = fields.len(),
            additive = model.extends.is_some(),
            "schema compiled"
        );

        Ok(CompiledSchema {
            model: model.name.clone(),
            model_ref: self.model_ref(&technical),
            file_stem: model.file_stem(),
            description: if model.description.is_empty() {
                model.name.clone()
            } else {
                model.description.clone()
            },
            technical,
            mode,
            fields,
            methods: model.methods.clone(),
        })
    }

    /// Technical name of a model declared in the specification or present in
    /// the inventory. With the inventory unavailable, unknown names are taken
    /// as runtime names verbatim.
    pub fn resolve(&self, name: &str, path: &str) -> Result<TechnicalName, CompileError> {
        if self.spec.model(name).is_some() {
            return self
                .spec
                .technical_name_of(self.module, name)
                .ok_or_else(|| CompileError::UnknownModel {
                    path: path.to_string(),
                    model: name.to_string(),
                });
        }
        if self.inventory.contains(name) || !self.inventory.is_available() {
            return Ok(TechnicalName::existing(name));
        }
        Err(CompileError::UnknownModel {
            path: path.to_string(),
            model: name.to_string(),
        })
    }

    /// `model_<stem>` for models this module owns, `<owner>.model_<stem>` for
    /// entities another runtime module owns.
    pub fn model_ref(&self, technical: &TechnicalName) -> String {
        match self
            .inventory
            .entity(technical.as_str())
            .and_then(|e| e.descriptor.module.as_deref())
        {
            Some(owner) if owner != self.module.as_str() => {
                format!("{owner}.{}", technical.model_xml_id())
            }
            _ => technical.model_xml_id(),
        }
    }

    fn field_type(&self, model: &ModelSpec, field: &FieldSpec) -> Result<FieldType, CompileError> {
        Ok(match field.kind {
            FieldKind::Text => FieldType::Char,
            FieldKind::LongText => FieldType::Text,
            FieldKind::Integer => FieldType::Integer,
            FieldKind::Decimal => FieldType::Float {
                digits: field.effective_digits(),
            },
            FieldKind::Boolean => FieldType::Boolean,
            FieldKind::Date => FieldType::Date,
            FieldKind::Datetime => FieldType::Datetime,
            FieldKind::SingleChoice => FieldType::Selection {
                choices: field.choices.clone(),
            },
            FieldKind::MultiReference => {
                let path = format!("models.{}.fields.{}", model.name, field.name);
                let target = field.reference.as_deref().ok_or_else(|| CompileError::MissingReference {
                    model: model.name.clone(),
                    field: field.name.clone(),
                })?;
                FieldType::Many2many {
                    comodel: self.resolve(target, &path)?,
                }
            }
            FieldKind::Binary => FieldType::Binary,
        })
    }
}

/// Compile one field of `model` given its already-resolved type.
fn compile_field(model: &str, field: &FieldSpec, field_type: FieldType) -> Result<FieldDeclaration, CompileError> {
    let default = match &field.default {
        None | Some(Value::Null) => None,
        Some(value) => Some(typed_default(field, &field_type, value).map_err(|reason| {
            CompileError::InvalidDefault {
                model: model.to_string(),
                field: field.name.clone(),
                reason,
            }
        })?),
    };

    if let FieldType::Selection { choices } = &field_type {
        if field.required && choices.is_empty() && default.is_none() {
            return Err(CompileError::IncompleteChoiceSet {
                model: model.to_string(),
                field: field.name.clone(),
            });
        }
    }

    Ok(FieldDeclaration {
        name: field.name.clone(),
        label: field.display_label(),
        required: field.required,
        default,
        help: field.help.clone(),
        visible_in: field.visible_in.clone(),
        injected: false,
        field_type,
    })
}

fn typed_default(field: &FieldSpec, field_type: &FieldType, value: &Value) -> Result<DefaultValue, String> {
    let mismatch = || format!("default {value} does not fit a {} field", field.kind);
    match field_type {
        FieldType::Char | FieldType::Text => value
            .as_str()
            .map(|s| DefaultValue::Text(s.to_string()))
            .ok_or_else(mismatch),
        FieldType::Integer => value.as_i64().map(DefaultValue::Integer).ok_or_else(mismatch),
        FieldType::Float { digits } => {
            let literal = match value {
                Value::String(s) => DecimalLiteral::parse(s).map_err(|e| e.to_string())?,
                Value::Number(n) => n
                    .as_i64()
                    .map(DecimalLiteral::from_integer)
                    .ok_or_else(|| format!("decimal default {n} must be written as a string"))?,
                _ => return Err(mismatch()),
            };
            literal
                .check_fits(digits.precision, digits.scale)
                .map_err(|e| e.to_string())?;
            Ok(DefaultValue::Decimal(literal))
        }
        FieldType::Boolean => value.as_bool().map(DefaultValue::Boolean).ok_or_else(mismatch),
        FieldType::Date => value
            .as_str()
            .and_then(parse_date)
            .map(|d| DefaultValue::Date(d.format("%Y-%m-%d").to_string()))
            .ok_or_else(mismatch),
        FieldType::Datetime => value
            .as_str()
            .and_then(Timestamp::parse)
            .map(|t| DefaultValue::Datetime(t.to_runtime_format()))
            .ok_or_else(mismatch),
        FieldType::Selection { choices } => match value.as_str() {
            Some(v) if choices.is_empty() || choices.iter().any(|c| c.value == v) => {
                Ok(DefaultValue::Choice(v.to_string()))
            }
            Some(v) => Err(format!("default `{v}` is not one of the declared choices")),
            None => Err(mismatch()),
        },
        FieldType::Many2many { .. } | FieldType::Binary => {
            Err(format!("{} fields cannot declare a default", field.kind))
        }
    }
}
