//! ORDER BY items.

use crate::error::CriteriaResult;
use crate::ir::{IrExpr, NullsOrder, OrderExpr, SortDir};
use crate::render::JpqlRenderer;

use super::expression::Expression;

/// One ordering of a query.
#[derive(Debug, Clone)]
#[must_use]
pub struct Order {
    expr: Expression,
    dir: SortDir,
    nulls: Option<NullsOrder>,
}

impl Order {
    pub fn new(expr: impl Into<Expression>, dir: SortDir) -> Self {
        Self {
            expr: expr.into(),
            dir,
            nulls: None,
        }
    }

    pub fn asc(expr: impl Into<Expression>) -> Self {
        Self::new(expr, SortDir::Asc)
    }

    pub fn desc(expr: impl Into<Expression>) -> Self {
        Self::new(expr, SortDir::Desc)
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Flip the direction.
    pub fn reverse(mut self) -> Self {
        self.dir = match self.dir {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        };
        self
    }

    pub fn is_ascending(&self) -> bool {
        self.dir == SortDir::Asc
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    pub fn revision(&self) -> u64 {
        self.expr.revision()
    }

    pub fn query_expression(&self) -> IrExpr {
        IrExpr::Order(OrderExpr {
            expr: Box::new(self.expr.ir_owned()),
            dir: self.dir,
            nulls: self.nulls,
        })
    }

    pub(crate) fn to_text(&self, renderer: &JpqlRenderer) -> CriteriaResult<String> {
        renderer.render(&self.query_expression())
    }
}
