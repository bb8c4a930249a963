//! Reference declarations and the per-type registry that holds them.
//!
//! A reference ties one property of an entity type to the identifying field
//! of another collection. Declarations are made once, when the type is first
//! registered, and are read on every write by the repository's validator.

use crate::entity::DomainEntity;
use crate::error::{RegistryError, RegistryResult};
use crate::record::ID_FIELD;
use serde::{Deserialize, Serialize};
use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::sync::{OnceLock, PoisonError, RwLock};
use tracing::debug;

/// A declared relationship from a property to another collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDeclaration {
    pub property_key: String,
    pub target_collection: String,
    pub required: bool,
    pub foreign_field: String,
    pub name: String,
}

/// Options of a reference declaration.
///
/// Defaults: required, foreign field `_id`, name derived from the singular
/// form of the target collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    target_collection: String,
    required: bool,
    foreign_field: Option<String>,
    name: Option<String>,
}

impl Reference {
    pub fn to(target_collection: impl Into<String>) -> Self {
        Self {
            target_collection: target_collection.into(),
            required: true,
            foreign_field: None,
            name: None,
        }
    }

    /// Marks the reference as optional: a missing value is skipped.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn foreign_field(mut self, field: impl Into<String>) -> Self {
        self.foreign_field = Some(field.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn into_declaration(self, property_key: String) -> ReferenceDeclaration {
        let name = self
            .name
            .unwrap_or_else(|| singular_of(&self.target_collection));
        ReferenceDeclaration {
            property_key,
            foreign_field: self.foreign_field.unwrap_or_else(|| ID_FIELD.to_string()),
            target_collection: self.target_collection,
            required: self.required,
            name,
        }
    }
}

/// The shape of the property a reference is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyShape {
    /// A single scalar id.
    Scalar,
    /// An array of raw ids.
    IdList,
    /// A nested entity.
    Entity,
    /// An array of nested entities.
    EntityList,
    /// Any other structured value.
    Object,
}

impl PropertyShape {
    pub fn is_reference_capable(self) -> bool {
        matches!(self, Self::Scalar | Self::IdList)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::IdList => "id list",
            Self::Entity => "nested entity",
            Self::EntityList => "nested entity list",
            Self::Object => "object",
        }
    }
}

/// Collects the declarations of one entity type.
pub struct ReferenceDeclarer<'r> {
    owner: &'static str,
    declarations: &'r mut Vec<ReferenceDeclaration>,
}

impl ReferenceDeclarer<'_> {
    /// Declares `property_key` as a reference. Fails synchronously when the
    /// property cannot carry an id.
    pub fn declare(
        &mut self,
        property_key: impl Into<String>,
        shape: PropertyShape,
        reference: Reference,
    ) -> RegistryResult<()> {
        let property_key = property_key.into();
        if !shape.is_reference_capable() {
            return Err(RegistryError::InvalidDeclarationTarget {
                owner: self.owner,
                property: property_key,
                shape: shape.as_str(),
            });
        }
        self.declarations
            .push(reference.into_declaration(property_key));
        Ok(())
    }
}

#[derive(Default)]
struct RegistryState {
    declarations: HashMap<TypeId, Vec<ReferenceDeclaration>>,
    registered: HashSet<TypeId>,
}

/// Static per-type store of declared references.
///
/// Duplicate declarations are kept as-is; the validator checks all of them.
#[derive(Default)]
pub struct ReferenceRegistry {
    state: RwLock<RegistryState>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used when a repository is not given one.
    pub fn global() -> &'static ReferenceRegistry {
        static GLOBAL: OnceLock<ReferenceRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ReferenceRegistry::new)
    }

    /// Appends one declaration to `T`'s list.
    pub fn declare<T: 'static>(
        &self,
        property_key: impl Into<String>,
        shape: PropertyShape,
        reference: Reference,
    ) -> RegistryResult<()> {
        let mut staged = Vec::new();
        ReferenceDeclarer {
            owner: type_name::<T>(),
            declarations: &mut staged,
        }
        .declare(property_key, shape, reference)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .declarations
            .entry(TypeId::of::<T>())
            .or_default()
            .extend(staged);
        Ok(())
    }

    /// Runs `T::declare_references` once for this registry.
    ///
    /// Subsequent calls are no-ops. A failing declaration leaves `T`
    /// unregistered so the error surfaces again on the next attempt.
    pub fn register<T: DomainEntity>(&self) -> RegistryResult<()> {
        let type_id = TypeId::of::<T>();
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.registered.contains(&type_id) {
                return Ok(());
            }
        }

        let mut staged = Vec::new();
        T::declare_references(&mut ReferenceDeclarer {
            owner: type_name::<T>(),
            declarations: &mut staged,
        })?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.registered.insert(type_id) {
            return Ok(());
        }
        debug!(
            "Registered {} reference(s) for {}",
            staged.len(),
            type_name::<T>()
        );
        state.declarations.entry(type_id).or_default().extend(staged);
        Ok(())
    }

    /// Returns `T`'s declarations, empty when none were made.
    pub fn references<T: 'static>(&self) -> Vec<ReferenceDeclaration> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .declarations
            .get(&TypeId::of::<T>())
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.registered.contains(&TypeId::of::<T>())
    }
}

/// English singular of a collection name, used as a reference's default name.
pub fn singular_of(collection: &str) -> String {
    let lower = collection.to_ascii_lowercase();
    if lower.ends_with("ies") && collection.len() > 3 {
        return format!("{}y", &collection[..collection.len() - 3]);
    }
    for suffix in ["ches", "shes", "sses", "xes", "zes"] {
        if lower.ends_with(suffix) {
            return collection[..collection.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && collection.len() > 1 {
        return collection[..collection.len() - 1].to_string();
    }
    collection.to_string()
}
