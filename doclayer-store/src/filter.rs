//! Store filters: a conjunction of per-field conditions.
//!
//! Matching is array-aware the way document stores are: a scalar condition
//! matches an array field when any element matches, and `any_of` against an
//! array field means the two lists intersect.

use doclayer_model::{ID_FIELD, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A conjunction of clauses. The empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    clauses: Vec<Clause>,
}

/// One field condition of a [`Filter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Top-level key, or a dotted path into nested objects.
    pub field: String,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
    Exists(bool),
}

impl Filter {
    /// The filter matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().and_eq(ID_FIELD, Value::String(id.into()))
    }

    pub fn by_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::all().and_any_of(ID_FIELD, ids.into_iter().map(|id| Value::String(id.into())))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::all().and_any_of(field, values)
    }

    pub fn exists(field: impl Into<String>, present: bool) -> Self {
        Self::all().and_exists(field, present)
    }

    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            condition: Condition::Eq(value.into()),
        });
        self
    }

    pub fn and_any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.clauses.push(Clause {
            field: field.into(),
            condition: Condition::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn and_exists(mut self, field: impl Into<String>, present: bool) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            condition: Condition::Exists(present),
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The id this filter pins, when it is exactly `{_id: <string>}`.
    pub fn pinned_id(&self) -> Option<&str> {
        match self.clauses.as_slice() {
            [Clause { field, condition: Condition::Eq(Value::String(id)) }] if field == ID_FIELD => {
                Some(id.as_str())
            }
            _ => None,
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record))
    }
}

impl Clause {
    fn matches(&self, record: &Record) -> bool {
        let value = resolve_path(record, &self.field);
        match &self.condition {
            Condition::Eq(expected) => match value {
                Some(actual) => value_eq(actual, expected),
                None => expected.is_null(),
            },
            Condition::In(candidates) => match value {
                Some(actual) => candidates.iter().any(|c| value_eq(actual, c)),
                None => candidates.iter().any(Value::is_null),
            },
            Condition::Exists(present) => {
                let found = value.is_some_and(|v| !v.is_null());
                found == *present
            }
        }
    }
}

/// Resolves `path` (`a` or `a.b.c`) inside `record`.
pub fn resolve_path<'r>(record: &'r Record, path: &str) -> Option<&'r Value> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn value_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| item == expected),
        _ => false,
    }
}
