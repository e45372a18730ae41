//! # critql
//!
//! A criteria query front-end: a typed expression-tree API compiled into a
//! bound query IR and rendered to JPQL.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Criteria API (builder, roots, paths)          │
//! │  (expressions, predicates, orders, queries, subqueries)  │
//! └─────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼ [query_expression]           ▼ [to_jpql]
//! ┌───────────────────────────────┐  ┌─────────────────────┐
//! │        IR (unbound)           │  │   Text (walked from │
//! └───────────────────────────────┘  │   criteria objects) │
//!                │                   └─────────────────────┘
//!                ▼ [binder + symbol table]
//! ┌─────────────────────────────────────────────────────────┐
//! │          QueryCompilation (bound IR per clause)          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Entity metadata comes from a [`metadata::MetadataResolver`]; the bundled
//! [`metadata::Metamodel`] is built in code or loaded from TOML.

pub mod config;
pub mod criteria;
pub mod error;
pub mod ir;
pub mod metadata;
pub mod render;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{QuerySettings, Settings};
    pub use crate::criteria::{
        BooleanOperator, CriteriaBuilder, CriteriaDelete, CriteriaQuery, CriteriaUpdate,
        Expression, Fetch, FromPath, Join, JoinType, Order, Predicate, Root, Subquery, Trimspec,
    };
    pub use crate::error::{CriteriaError, CriteriaResult};
    pub use crate::ir::{IrExpr, QueryCompilation, StatementKind, Symbol, SymbolKind};
    pub use crate::metadata::{
        CollectionKind, EntityType, MetadataResolver, Metamodel, ValueType,
    };
    pub use crate::render::{render, JpqlRenderer};
}
