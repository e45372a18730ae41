//! MetadataResolver trait and the in-memory metamodel.
//!
//! The criteria front-end never owns entity metadata: it asks a resolver for
//! the descriptor of a named type whenever a root is established or an
//! attribute is navigated. [`Metamodel`] is the stock implementation, built in
//! code or loaded from TOML:
//!
//! ```toml
//! [[entity]]
//! name = "Person"
//!
//! [[entity.attribute]]
//! name = "age"
//! kind = "basic"
//! type = "integer"
//!
//! [[entity.attribute]]
//! name = "orders"
//! kind = "plural"
//! collection = "list"
//! target = "Order"
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::types::EntityType;
use crate::error::{CriteriaError, CriteriaResult};

/// Resolves type names to entity descriptors.
pub trait MetadataResolver: Debug + Send + Sync {
    /// Descriptor for the named managed type, if known.
    fn entity(&self, name: &str) -> Option<Arc<EntityType>>;
}

/// Convenience methods over [`MetadataResolver`].
pub trait MetadataResolverExt: MetadataResolver {
    /// Resolve an entity, failing with [`CriteriaError::NotAnEntity`].
    fn resolve_entity(&self, name: &str) -> CriteriaResult<Arc<EntityType>> {
        self.entity(name)
            .ok_or_else(|| CriteriaError::NotAnEntity(name.to_string()))
    }
}

impl<T: MetadataResolver + ?Sized> MetadataResolverExt for T {}

/// Error type for metamodel loading.
#[derive(Debug, thiserror::Error)]
pub enum MetamodelError {
    #[error("Metamodel file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read metamodel file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse metamodel: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Entity '{0}' is defined more than once")]
    DuplicateEntity(String),

    #[error("Attribute '{entity}.{attribute}' targets unknown type '{target}'")]
    UnknownTarget {
        entity: String,
        attribute: String,
        target: String,
    },
}

#[derive(Debug, Deserialize)]
struct MetamodelFile {
    #[serde(default, rename = "entity")]
    entities: Vec<EntityType>,
}

/// In-memory set of entity descriptors.
#[derive(Debug, Clone, Default)]
pub struct Metamodel {
    entities: HashMap<String, Arc<EntityType>>,
}

impl Metamodel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity (replacing one with the same name).
    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.add_entity(entity);
        self
    }

    pub fn add_entity(&mut self, entity: EntityType) {
        self.entities.insert(entity.name.clone(), Arc::new(entity));
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Parse a TOML metamodel document.
    ///
    /// Every attribute target must name an entity in the same document.
    pub fn from_toml_str(content: &str) -> Result<Self, MetamodelError> {
        let file: MetamodelFile = toml::from_str(content)?;
        let mut model = Metamodel::new();
        for entity in file.entities {
            if model.entities.contains_key(&entity.name) {
                return Err(MetamodelError::DuplicateEntity(entity.name));
            }
            model.add_entity(entity);
        }
        model.check_targets()?;
        debug!(entities = model.len(), "loaded metamodel");
        Ok(model)
    }

    /// Load a TOML metamodel file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MetamodelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MetamodelError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn check_targets(&self) -> Result<(), MetamodelError> {
        for entity in self.entities.values() {
            for attribute in &entity.attributes {
                if let Some(target) = attribute.target() {
                    if !self.entities.contains_key(target) {
                        return Err(MetamodelError::UnknownTarget {
                            entity: entity.name.clone(),
                            attribute: attribute.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl MetadataResolver for Metamodel {
    fn entity(&self, name: &str) -> Option<Arc<EntityType>> {
        self.entities.get(name).cloned()
    }
}
