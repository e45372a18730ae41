//! Compiled query units.

use std::rc::Rc;

use serde::Serialize;

use super::expr::IrExpr;
use super::symbol::{Symbol, SymbolKind, SymbolTable};

/// Statement form of a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    Select,
    Update,
    Delete,
}

/// A bound query: candidate, symbol table and one IR fragment per clause.
#[derive(Debug, Clone, Serialize)]
pub struct QueryCompilation {
    /// Query-language tag, e.g. "JPQL".
    pub language: String,
    pub kind: StatementKind,
    /// Entity name of the candidate.
    pub candidate: String,
    pub candidate_alias: String,
    #[serde(skip)]
    pub symbols: Rc<SymbolTable>,
    /// `None` selects the candidate itself.
    pub result: Option<Vec<IrExpr>>,
    pub from: Vec<IrExpr>,
    pub filter: Option<IrExpr>,
    pub grouping: Option<Vec<IrExpr>>,
    pub having: Option<IrExpr>,
    pub ordering: Option<Vec<IrExpr>>,
    pub update: Option<Vec<IrExpr>>,
    pub distinct: bool,
    /// Compiled subqueries keyed by variable name, in declaration order.
    pub subqueries: Vec<(String, QueryCompilation)>,
}

impl QueryCompilation {
    /// Attach a compiled subquery under its variable name.
    pub fn add_subquery(&mut self, name: impl Into<String>, compilation: QueryCompilation) {
        self.subqueries.push((name.into(), compilation));
    }

    pub fn subquery(&self, name: &str) -> Option<&QueryCompilation> {
        self.subqueries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, compilation)| compilation)
    }

    /// Whether this unit compiles inside a parent scope.
    pub fn is_subquery(&self) -> bool {
        self.symbols.parent().is_some()
    }

    /// Parameter symbols registered while binding, in binding order, followed
    /// by those of each subquery.
    pub fn parameters(&self) -> Vec<Symbol> {
        let mut parameters: Vec<Symbol> = self
            .symbols
            .symbols()
            .filter(|s| s.kind == SymbolKind::Parameter)
            .cloned()
            .collect();
        for (_, subquery) in &self.subqueries {
            parameters.extend(subquery.parameters());
        }
        parameters
    }

    /// Pretty JSON dump of the compiled clauses.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
