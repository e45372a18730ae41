//! Entity metadata consumed by the criteria front-end.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              MetadataResolver                │
//! │   entity(name) -> Option<Arc<EntityType>>    │
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │   Metamodel (in-memory, code or TOML)        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Roots are established and attributes navigated through a resolver; an
//! unknown type surfaces immediately as [`CriteriaError::NotAnEntity`].
//!
//! [`CriteriaError::NotAnEntity`]: crate::error::CriteriaError::NotAnEntity

mod provider;
mod types;

pub use provider::{MetadataResolver, MetadataResolverExt, Metamodel, MetamodelError};
pub use types::{Attribute, AttributeKind, CollectionKind, EntityType, Plurality, ValueType};
