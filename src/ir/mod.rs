//! Query intermediate representation.
//!
//! - [`expr`] - IR node types
//! - [`symbol`] - symbol tables and binding
//! - [`compilation`] - bound compilation units

pub mod compilation;
pub mod expr;
pub mod symbol;

pub use compilation::{QueryCompilation, StatementKind};
pub use expr::{
    ClassExpr, DyadicOp, IrExpr, JoinExpr, JoinKind, Literal, NullsOrder, OrderExpr, SortDir,
    SubqueryKeyword, SymbolRef,
};
pub use symbol::{Binder, Symbol, SymbolKind, SymbolTable};
