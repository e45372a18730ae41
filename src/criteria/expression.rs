//! User-facing expression nodes.
//!
//! An [`Expression`] is a typed handle over a closed set of node kinds
//! ([`ExprKind`]). Each expression lowers lazily to an [`IrExpr`]; the result
//! is memoized against the expression's revision, which only moves when a
//! FROM element it depends on is re-aliased or re-joined.

use std::rc::Rc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::error::{CriteriaError, CriteriaResult};
use crate::ir::{DyadicOp, IrExpr, Literal, SubqueryKeyword};
use crate::metadata::ValueType;

use super::memo::Memo;
use super::path::{navigate, split_path, FromPath, PathExpression};
use super::predicate::Predicate;
use super::subquery::Subquery;

/// Node kinds of the criteria tree.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    /// `:name` or `?position`.
    Parameter {
        name: Option<String>,
        position: Option<usize>,
    },
    /// Attribute navigation from another expression.
    Path(PathExpression),
    /// A root, join or fetch used as a value.
    From(FromPath),
    Dyadic {
        left: Box<Expression>,
        op: DyadicOp,
        right: Option<Box<Expression>>,
    },
    Invocation {
        target: Option<Box<Expression>>,
        name: String,
        args: Vec<Expression>,
        distinct: bool,
    },
    Creator {
        type_name: String,
        args: Vec<Expression>,
    },
    Case {
        conditions: Vec<(Expression, Expression)>,
        otherwise: Option<Box<Expression>>,
    },
    /// A subquery, optionally introduced by EXISTS/ALL/ANY/SOME.
    Subquery {
        keyword: Option<SubqueryKeyword>,
        subquery: Subquery,
    },
    /// A predicate used where a boolean value is expected.
    Predicate(Box<Predicate>),
}

/// A typed criteria expression.
#[derive(Debug, Clone)]
#[must_use]
pub struct Expression {
    kind: Rc<ExprKind>,
    value_type: ValueType,
    alias: Option<String>,
    ir: Memo<IrExpr>,
}

impl Expression {
    pub(crate) fn new(kind: ExprKind, value_type: ValueType) -> Self {
        Self {
            kind: Rc::new(kind),
            value_type,
            alias: None,
            ir: Memo::new(),
        }
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        let literal = value.into();
        let value_type = literal.value_type();
        Self::new(ExprKind::Literal(literal), value_type)
    }

    /// A typed null literal.
    pub fn null(value_type: ValueType) -> Self {
        Self::new(ExprKind::Literal(Literal::Null), value_type)
    }

    pub(crate) fn dyadic(
        left: Expression,
        op: DyadicOp,
        right: Expression,
        value_type: ValueType,
    ) -> Self {
        Self::new(
            ExprKind::Dyadic {
                left: Box::new(left),
                op,
                right: Some(Box::new(right)),
            },
            value_type,
        )
    }

    pub(crate) fn monadic(op: DyadicOp, operand: Expression, value_type: ValueType) -> Self {
        Self::new(
            ExprKind::Dyadic {
                left: Box::new(operand),
                op,
                right: None,
            },
            value_type,
        )
    }

    pub(crate) fn invoke(
        target: Option<Expression>,
        name: &str,
        args: Vec<Expression>,
        value_type: ValueType,
    ) -> Self {
        Self::new(
            ExprKind::Invocation {
                target: target.map(Box::new),
                name: name.into(),
                args,
                distinct: false,
            },
            value_type,
        )
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Declared value type.
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Selection alias, rendered as `AS alias`.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// View this expression as another type.
    ///
    /// The view shares this expression's IR node. No compatibility check is
    /// made between the two types.
    pub fn as_type(&self, value_type: ValueType) -> Expression {
        self.query_expression();
        Expression {
            kind: Rc::clone(&self.kind),
            value_type,
            alias: self.alias.clone(),
            ir: self.ir.clone(),
        }
    }

    /// Sum of the revisions of every FROM tree and subquery this expression
    /// reads from.
    pub fn revision(&self) -> u64 {
        match &*self.kind {
            ExprKind::Literal(_) | ExprKind::Parameter { .. } => 0,
            ExprKind::Path(path) => path.revision(),
            ExprKind::From(from) => from.revision(),
            ExprKind::Dyadic { left, right, .. } => {
                left.revision() + right.as_ref().map_or(0, |r| r.revision())
            }
            ExprKind::Invocation { target, args, .. } => {
                target.as_ref().map_or(0, |t| t.revision())
                    + args.iter().map(Expression::revision).sum::<u64>()
            }
            ExprKind::Creator { args, .. } => args.iter().map(Expression::revision).sum(),
            ExprKind::Case {
                conditions,
                otherwise,
            } => {
                conditions
                    .iter()
                    .map(|(when, then)| when.revision() + then.revision())
                    .sum::<u64>()
                    + otherwise.as_ref().map_or(0, |o| o.revision())
            }
            ExprKind::Subquery { subquery, .. } => subquery.revision(),
            ExprKind::Predicate(predicate) => predicate.revision(),
        }
    }

    /// The IR node for this expression.
    ///
    /// Repeated calls return the same node until a FROM element this
    /// expression depends on changes.
    pub fn query_expression(&self) -> Rc<IrExpr> {
        self.ir.get_or_init(self.revision(), || self.build_ir())
    }

    pub(crate) fn ir_owned(&self) -> IrExpr {
        (*self.query_expression()).clone()
    }

    fn build_ir(&self) -> IrExpr {
        match &*self.kind {
            ExprKind::Literal(literal) => IrExpr::Literal(literal.clone()),
            ExprKind::Parameter { name, position } => IrExpr::Parameter {
                name: name.clone(),
                position: *position,
                value_type: self.value_type.clone(),
            },
            ExprKind::Path(path) => path.ir(),
            ExprKind::From(from) => (*from.query_expression()).clone(),
            ExprKind::Dyadic { left, op, right } => IrExpr::Dyadic {
                left: Box::new(left.ir_owned()),
                op: *op,
                right: right.as_ref().map(|r| Box::new(r.ir_owned())),
            },
            ExprKind::Invocation {
                target,
                name,
                args,
                distinct,
            } => IrExpr::Invocation {
                target: target.as_ref().map(|t| Box::new(t.ir_owned())),
                name: name.clone(),
                args: args.iter().map(Expression::ir_owned).collect(),
                distinct: *distinct,
            },
            ExprKind::Creator { type_name, args } => IrExpr::Creator {
                type_name: type_name.clone(),
                args: args.iter().map(Expression::ir_owned).collect(),
            },
            ExprKind::Case {
                conditions,
                otherwise,
            } => IrExpr::Case {
                conditions: conditions
                    .iter()
                    .map(|(when, then)| (when.ir_owned(), then.ir_owned()))
                    .collect(),
                otherwise: otherwise.as_ref().map(|o| Box::new(o.ir_owned())),
            },
            ExprKind::Subquery { keyword, subquery } => {
                let variable = IrExpr::variable(subquery.name());
                match keyword {
                    Some(keyword) => IrExpr::Subquery {
                        keyword: *keyword,
                        variable: Box::new(variable),
                    },
                    None => variable,
                }
            }
            ExprKind::Predicate(predicate) => (*predicate.query_expression()).clone(),
        }
    }

    /// `this IS NULL`
    pub fn is_null(&self) -> Predicate {
        Predicate::leaf(Expression::dyadic(
            self.clone(),
            DyadicOp::Eq,
            Expression::null(self.value_type.clone()),
            ValueType::Boolean,
        ))
    }

    /// `this IS NOT NULL`
    pub fn is_not_null(&self) -> Predicate {
        Predicate::leaf(Expression::dyadic(
            self.clone(),
            DyadicOp::NotEq,
            Expression::null(self.value_type.clone()),
            ValueType::Boolean,
        ))
    }

    /// Membership in a list of values.
    pub fn in_values<I, V>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        Predicate::in_list(self.clone(), values.into_iter().map(Into::into).collect())
    }

    /// Navigate to an attribute; `path` may be dotted (`"address.city"`).
    ///
    /// Only paths and FROM elements carry the metamodel needed to navigate;
    /// use [`CriteriaBuilder::get`](super::CriteriaBuilder::get) for other
    /// entity-typed expressions.
    pub fn get(&self, path: &str) -> CriteriaResult<Expression> {
        match &*self.kind {
            ExprKind::From(from) => from.get(path),
            ExprKind::Path(p) => {
                let metadata = p.metadata().clone();
                split_path(path)?
                    .into_iter()
                    .try_fold(self.clone(), |current, segment| {
                        navigate(&current, segment, &metadata)
                    })
            }
            _ => Err(CriteriaError::NotNavigable {
                owner: self.value_type.to_string(),
                attribute: path.into(),
                reason: "expression is not a path".into(),
            }),
        }
    }

    pub fn as_from(&self) -> Option<&FromPath> {
        match &*self.kind {
            ExprKind::From(from) => Some(from),
            _ => None,
        }
    }
}

macro_rules! literal_expression {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expression {
                fn from(value: $ty) -> Self {
                    Expression::literal(value)
                }
            }
        )*
    };
}

literal_expression!(
    i64,
    i32,
    f64,
    bool,
    char,
    &str,
    String,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    DateTime<Utc>,
    Literal,
);

impl From<&Expression> for Expression {
    fn from(expr: &Expression) -> Self {
        expr.clone()
    }
}

impl From<FromPath> for Expression {
    fn from(from: FromPath) -> Self {
        from.to_expression()
    }
}

impl From<&FromPath> for Expression {
    fn from(from: &FromPath) -> Self {
        from.to_expression()
    }
}

impl From<Predicate> for Expression {
    fn from(predicate: Predicate) -> Self {
        Expression::new(ExprKind::Predicate(Box::new(predicate)), ValueType::Boolean)
    }
}

impl From<&Predicate> for Expression {
    fn from(predicate: &Predicate) -> Self {
        Expression::from(predicate.clone())
    }
}
