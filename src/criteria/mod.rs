//! Criteria API: typed expression trees that compile to bound IR.
//!
//! - [`builder`] - [`CriteriaBuilder`], the factory for everything below
//! - [`query`] - SELECT / UPDATE / DELETE assembly, compilation and text
//! - [`subquery`] - nested queries in a parent scope
//! - [`path`] - roots, joins, fetches and attribute navigation
//! - [`predicate`] - boolean composition and negation
//! - [`expression`] - the closed set of expression kinds
//! - [`order`] - ORDER BY items
//! - [`memo`] - revision-keyed caches
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use critql::criteria::CriteriaBuilder;
//! use critql::metadata::{EntityType, Metamodel, ValueType};
//!
//! let model = Metamodel::new().with_entity(
//!     EntityType::new("Person")
//!         .basic("name", ValueType::String)
//!         .basic("age", ValueType::Integer),
//! );
//! let cb = CriteriaBuilder::new(Arc::new(model));
//! let mut query = cb.create_query(ValueType::entity("Person"));
//! let person = query.from("Person")?;
//! query
//!     .filter(cb.gt(person.get("age")?, 18))
//!     .order_by([cb.asc(person.get("name")?)]);
//!
//! assert_eq!(
//!     query.to_jpql()?.as_str(),
//!     "SELECT FROM Person DN_THIS WHERE (DN_THIS.age > 18) ORDER BY DN_THIS.name ASC"
//! );
//! # Ok::<(), critql::error::CriteriaError>(())
//! ```

pub mod builder;
pub mod expression;
pub mod memo;
pub mod order;
pub mod path;
pub mod predicate;
pub mod query;
pub mod subquery;

pub use builder::{CaseBuilder, CriteriaBuilder, SimpleCaseBuilder, Trimspec};
pub use expression::{ExprKind, Expression};
pub use memo::{Memo, Revision};
pub use order::Order;
pub use path::{Fetch, FromPath, FromRole, Join, JoinType, PathExpression, Root};
pub use predicate::{BooleanOperator, Predicate, PredicateKind};
pub use query::{CriteriaDelete, CriteriaQuery, CriteriaUpdate};
pub use subquery::Subquery;
