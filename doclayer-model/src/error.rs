//! Error types for the model layer.

use std::fmt;
use thiserror::Error;

/// Result type for mapping operations.
pub type MapperResult<T> = Result<T, MapperError>;

/// Result type for reference declarations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while converting between entities and records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapperError {
    /// The input could not be viewed as a plain object.
    #[error("expected a plain object, got {0}")]
    NotAnObject(&'static str),

    /// The identifier could not be coerced to a string.
    #[error("identifier cannot be coerced to a string: {0}")]
    InvalidId(String),

    /// The entity constructor rejected the record.
    #[error("cannot construct entity from record: {0}")]
    Decode(String),
}

/// Errors raised while declaring references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The declared property cannot hold a foreign id.
    #[error("property \"{property}\" on {owner} cannot carry a reference ({shape})")]
    InvalidDeclarationTarget {
        owner: &'static str,
        property: String,
        shape: &'static str,
    },
}

/// A single structural problem found by schema validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: String,
    pub problem: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    Unknown,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            ViolationKind::Missing => write!(f, "field `{}` is required", self.field),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "field `{}` expected {expected}, found {found}", self.field)
            }
            ViolationKind::Unknown => write!(f, "field `{}` is not declared", self.field),
        }
    }
}

/// A payload did not match the repository's structural schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("document failed schema validation: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<SchemaViolation>,
}

impl ValidationError {
    pub fn new(violations: Vec<SchemaViolation>) -> Self {
        Self { violations }
    }

    /// Returns true when `field` is among the violations.
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
