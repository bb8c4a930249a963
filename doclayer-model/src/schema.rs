use crate::error::{SchemaViolation, ValidationError, ViolationKind};
use crate::record::{ID_FIELD, Record, json_kind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field the parent finder requires the schema to declare.
pub const PARENT_ID_FIELD: &str = "parentId";

/// Field the tag finder requires the schema to declare.
pub const TAGS_FIELD: &str = "tags";

/// Optional structural schema of a repository's records.
///
/// Used for payload shape checks on create/update and to gate finders on
/// field presence. Never used to derive the persistence mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub fields: Vec<SchemaField>,
    /// Reject keys the schema does not declare.
    #[serde(default)]
    pub strict: bool,
}

/// One declared field of a [`DocumentSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl SchemaField {
    fn simple(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: &str) -> Self {
        Self::simple(name, FieldKind::Text)
    }

    /// Shorthand for a numeric field.
    pub fn number(name: &str) -> Self {
        Self::simple(name, FieldKind::Number)
    }

    /// Shorthand for a boolean field.
    pub fn bool(name: &str) -> Self {
        Self::simple(name, FieldKind::Bool)
    }

    /// Shorthand for a tag array field.
    pub fn tags(name: &str) -> Self {
        Self::simple(name, FieldKind::Tags)
    }

    /// Shorthand for a single foreign id field.
    pub fn reference(name: &str) -> Self {
        Self::simple(name, FieldKind::Reference)
    }

    /// Shorthand for a foreign id array field.
    pub fn references(name: &str) -> Self {
        Self::simple(name, FieldKind::References)
    }

    /// Shorthand for a nested object field.
    pub fn object(name: &str) -> Self {
        Self::simple(name, FieldKind::Object)
    }

    /// Shorthand for an array field of any element type.
    pub fn array(name: &str) -> Self {
        Self::simple(name, FieldKind::Array)
    }

    /// Shorthand for an untyped field.
    pub fn any(name: &str) -> Self {
        Self::simple(name, FieldKind::Any)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn check(&self, value: &Value) -> Option<ViolationKind> {
        if value.is_null() {
            return self.required.then_some(ViolationKind::Missing);
        }
        if self.kind.accepts(value) {
            None
        } else {
            Some(ViolationKind::WrongType {
                expected: self.kind.as_str(),
                found: json_kind(value),
            })
        }
    }
}

/// The structural type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Tags,
    Reference,
    References,
    Object,
    Array,
    Any,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Tags | Self::References => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            // A populated reference holds the referenced record instead of its id.
            Self::Reference => value.is_string() || value.is_object(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Tags => "tag array",
            Self::Reference => "reference",
            Self::References => "reference array",
            Self::Object => "object",
            Self::Array => "array",
            Self::Any => "any",
        }
    }
}

/// Which write a payload is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// Full payload; the identifier may be absent.
    Create,
    /// Partial payload; only keys present in the payload are checked.
    Update,
}

impl DocumentSchema {
    pub fn new(fields: Vec<SchemaField>) -> Self {
        Self {
            fields,
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// A schema restricted to exactly `keys`.
    pub fn restricted_to<'k, I>(&self, keys: I) -> DocumentSchema
    where
        I: IntoIterator<Item = &'k String>,
    {
        let keys: Vec<&String> = keys.into_iter().collect();
        DocumentSchema {
            fields: self
                .fields
                .iter()
                .filter(|f| keys.iter().any(|k| **k == f.name))
                .cloned()
                .collect(),
            strict: self.strict,
        }
    }

    /// Checks `record` against the schema.
    pub fn validate(&self, record: &Record, mode: SchemaMode) -> Result<(), ValidationError> {
        let schema = match mode {
            SchemaMode::Create => self.clone(),
            SchemaMode::Update => self.restricted_to(record.keys()),
        };

        let mut violations = Vec::new();
        for field in &schema.fields {
            let problem = match record.get(&field.name) {
                Some(value) => field.check(value),
                None if field.name == ID_FIELD && mode == SchemaMode::Create => None,
                None if field.required => Some(ViolationKind::Missing),
                None => None,
            };
            if let Some(problem) = problem {
                violations.push(SchemaViolation {
                    field: field.name.clone(),
                    problem,
                });
            }
        }

        if self.strict {
            for key in record.keys() {
                if key != ID_FIELD && !self.has_field(key) {
                    violations.push(SchemaViolation {
                        field: key.clone(),
                        problem: ViolationKind::Unknown,
                    });
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }
}
