//! Reference integrity checks run before writes.

use crate::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use doclayer_model::{Record, ReferenceDeclaration};
use doclayer_store::{DocumentStore, Filter};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Anything that can answer "does a record matching this filter exist".
///
/// Repositories implement it so they can serve as each other's reference
/// targets. [`StoreProbe`] adapts a bare store client.
#[async_trait]
pub trait ReferenceProbe: Send + Sync {
    async fn exists(&self, filter: &Filter) -> RepositoryResult<bool>;
}

/// Probes a store collection directly.
pub struct StoreProbe(pub Arc<dyn DocumentStore>);

#[async_trait]
impl ReferenceProbe for StoreProbe {
    async fn exists(&self, filter: &Filter) -> RepositoryResult<bool> {
        Ok(self.0.exists(filter).await?)
    }
}

/// Which declarations a validation pass looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationScope {
    /// Every declaration. Used for inserts.
    All,
    /// Only declarations whose property is present in the record. Used for
    /// partial updates.
    PresentOnly,
}

/// Checks a mapped record against a fixed set of reference declarations.
pub struct ReferenceValidator {
    declarations: Vec<ReferenceDeclaration>,
    probes: HashMap<String, Arc<dyn ReferenceProbe>>,
}

impl ReferenceValidator {
    pub fn new(
        declarations: Vec<ReferenceDeclaration>,
        probes: HashMap<String, Arc<dyn ReferenceProbe>>,
    ) -> Self {
        Self {
            declarations,
            probes,
        }
    }

    pub fn declarations(&self) -> &[ReferenceDeclaration] {
        &self.declarations
    }

    pub fn declaration_for(&self, property: &str) -> Option<&ReferenceDeclaration> {
        self.declarations.iter().find(|d| d.property_key == property)
    }

    pub fn has_probe(&self, collection: &str) -> bool {
        self.probes.contains_key(collection)
    }

    /// Runs the declarations in order and returns the first failure.
    pub async fn validate(&self, record: &Record, scope: ValidationScope) -> RepositoryResult<()> {
        for declaration in &self.declarations {
            let value = record.get(&declaration.property_key);
            if scope == ValidationScope::PresentOnly && value.is_none() {
                continue;
            }
            self.check(declaration, value).await?;
        }
        Ok(())
    }

    async fn check(
        &self,
        declaration: &ReferenceDeclaration,
        value: Option<&Value>,
    ) -> RepositoryResult<()> {
        let value = match value {
            None | Some(Value::Null) => {
                if declaration.required {
                    return Err(RepositoryError::MissingRequiredReference {
                        collection: declaration.target_collection.clone(),
                        foreign_field: declaration.foreign_field.clone(),
                        property: declaration.property_key.clone(),
                    });
                }
                return Ok(());
            }
            Some(value) => value,
        };

        let probe = self
            .probes
            .get(&declaration.target_collection)
            .ok_or_else(|| RepositoryError::ReferenceModelUnavailable {
                collection: declaration.target_collection.clone(),
                property: declaration.property_key.clone(),
            })?;

        match value {
            Value::Array(elements) => {
                for element in elements {
                    probe_one(probe.as_ref(), declaration, element).await?;
                }
                Ok(())
            }
            other => probe_one(probe.as_ref(), declaration, other).await,
        }
    }
}

async fn probe_one(
    probe: &dyn ReferenceProbe,
    declaration: &ReferenceDeclaration,
    value: &Value,
) -> RepositoryResult<()> {
    let filter = Filter::eq(declaration.foreign_field.clone(), value.clone());
    if probe.exists(&filter).await? {
        return Ok(());
    }
    debug!(
        "Dangling reference {}.{}={} on property {}",
        declaration.target_collection, declaration.foreign_field, value, declaration.property_key
    );
    Err(RepositoryError::DanglingReference {
        name: declaration.name.clone(),
        collection: declaration.target_collection.clone(),
        foreign_field: declaration.foreign_field.clone(),
        property: declaration.property_key.clone(),
        value: display_value(value),
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
