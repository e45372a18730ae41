//! Boolean predicates.
//!
//! A [`Predicate`] is a leaf (one boolean expression), a composite (children
//! joined by AND or OR), or a value-list membership test. Negation is a flag
//! on the predicate itself, so negating twice restores the original.

use std::ops::Not;
use std::rc::Rc;

use crate::error::CriteriaResult;
use crate::ir::{DyadicOp, IrExpr};
use crate::render::JpqlRenderer;

use super::expression::Expression;
use super::memo::Memo;

/// Operator of a composite predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    fn ir_op(self) -> DyadicOp {
        match self {
            BooleanOperator::And => DyadicOp::And,
            BooleanOperator::Or => DyadicOp::Or,
        }
    }

    fn separator(self) -> &'static str {
        match self {
            BooleanOperator::And => " AND ",
            BooleanOperator::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone)]
pub enum PredicateKind {
    /// Wraps one boolean expression.
    Leaf(Expression),
    Composite {
        operator: BooleanOperator,
        children: Vec<Predicate>,
    },
    /// `expr` equals one of `values`; lowered to an OR chain of equalities.
    In {
        expr: Expression,
        values: Vec<Expression>,
    },
}

/// A boolean condition.
#[derive(Debug, Clone)]
#[must_use]
pub struct Predicate {
    kind: PredicateKind,
    negated: bool,
    ir: Memo<IrExpr>,
}

impl Predicate {
    pub fn leaf(expr: Expression) -> Self {
        Self::with_kind(PredicateKind::Leaf(expr))
    }

    pub fn composite(
        operator: BooleanOperator,
        children: impl IntoIterator<Item = Predicate>,
    ) -> Self {
        Self::with_kind(PredicateKind::Composite {
            operator,
            children: children.into_iter().collect(),
        })
    }

    pub fn in_list(expr: Expression, values: Vec<Expression>) -> Self {
        Self::with_kind(PredicateKind::In { expr, values })
    }

    fn with_kind(kind: PredicateKind) -> Self {
        Self {
            kind,
            negated: false,
            ir: Memo::new(),
        }
    }

    pub fn kind(&self) -> &PredicateKind {
        &self.kind
    }

    /// AND for leaves and value lists.
    pub fn operator(&self) -> BooleanOperator {
        match &self.kind {
            PredicateKind::Composite { operator, .. } => *operator,
            _ => BooleanOperator::And,
        }
    }

    /// Child predicates; empty unless composite.
    pub fn children(&self) -> &[Predicate] {
        match &self.kind {
            PredicateKind::Composite { children, .. } => children,
            _ => &[],
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Toggle negation in place.
    pub fn negate(&mut self) {
        self.negated = !self.negated;
        self.ir = Memo::new();
    }

    /// Append a value to a value-list predicate. Other kinds are unchanged.
    pub fn value(mut self, value: impl Into<Expression>) -> Self {
        if let PredicateKind::In { values, .. } = &mut self.kind {
            values.push(value.into());
            self.ir = Memo::new();
        }
        self
    }

    pub fn revision(&self) -> u64 {
        match &self.kind {
            PredicateKind::Leaf(expr) => expr.revision(),
            PredicateKind::Composite { children, .. } => {
                children.iter().map(Predicate::revision).sum()
            }
            PredicateKind::In { expr, values } => {
                expr.revision() + values.iter().map(Expression::revision).sum::<u64>()
            }
        }
    }

    /// IR form: children folded pairwise left to right, wrapped in NOT when
    /// negated.
    pub fn query_expression(&self) -> Rc<IrExpr> {
        self.ir.get_or_init(self.revision(), || self.build_ir())
    }

    fn build_ir(&self) -> IrExpr {
        let body = match &self.kind {
            PredicateKind::Leaf(expr) => expr.ir_owned(),
            PredicateKind::Composite { operator, children } => {
                let op = operator.ir_op();
                let mut items = children.iter().map(|c| c.query_expression().as_ref().clone());
                match items.next() {
                    Some(first) => items.fold(first, |acc, next| IrExpr::dyadic(acc, op, next)),
                    // Empty conjunction is true, empty disjunction false.
                    None => IrExpr::literal(*operator == BooleanOperator::And),
                }
            }
            PredicateKind::In { expr, values } => {
                let subject = expr.ir_owned();
                let mut items = values
                    .iter()
                    .map(|v| IrExpr::dyadic(subject.clone(), DyadicOp::Eq, v.ir_owned()));
                match items.next() {
                    Some(first) => {
                        items.fold(first, |acc, next| IrExpr::dyadic(acc, DyadicOp::Or, next))
                    }
                    None => IrExpr::literal(false),
                }
            }
        };
        if self.negated {
            IrExpr::monadic(DyadicOp::Not, body)
        } else {
            body
        }
    }

    /// Text form used in query strings.
    ///
    /// Composite children are joined flat; a child that is itself a
    /// multi-term composite or value list is parenthesized.
    pub(crate) fn to_text(&self, renderer: &JpqlRenderer) -> CriteriaResult<String> {
        let body = match &self.kind {
            PredicateKind::Leaf(expr) => renderer.render(&expr.query_expression())?,
            PredicateKind::Composite { operator, children } => {
                if children.is_empty() {
                    let empty = if *operator == BooleanOperator::And {
                        "TRUE"
                    } else {
                        "FALSE"
                    };
                    empty.to_string()
                } else {
                    let mut parts = Vec::with_capacity(children.len());
                    for child in children {
                        let text = child.to_text(renderer)?;
                        parts.push(if child.is_multi_term() {
                            format!("({})", text)
                        } else {
                            text
                        });
                    }
                    parts.join(operator.separator())
                }
            }
            PredicateKind::In { expr, values } => {
                if values.is_empty() {
                    "FALSE".to_string()
                } else {
                    let subject = expr.ir_owned();
                    let mut parts = Vec::with_capacity(values.len());
                    for value in values {
                        let eq = IrExpr::dyadic(subject.clone(), DyadicOp::Eq, value.ir_owned());
                        parts.push(renderer.render(&eq)?);
                    }
                    parts.join(" OR ")
                }
            }
        };
        Ok(if self.negated {
            format!("!({})", body)
        } else {
            body
        })
    }

    fn is_multi_term(&self) -> bool {
        if self.negated {
            return false;
        }
        match &self.kind {
            PredicateKind::Leaf(_) => false,
            PredicateKind::Composite { children, .. } => children.len() > 1,
            PredicateKind::In { values, .. } => values.len() > 1,
        }
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(mut self) -> Predicate {
        self.negate();
        self
    }
}
