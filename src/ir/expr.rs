//! Generic query IR nodes.
//!
//! Every criteria object eventually lowers to an [`IrExpr`]. Nodes are plain
//! values; binding produces a copy with [`SymbolRef`]s filled in.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

use crate::metadata::ValueType;

// =============================================================================
// Literals
// =============================================================================

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    /// Any other point in time; rendered with the timestamp pattern.
    Instant(DateTime<Utc>),
}

impl Literal {
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Null => ValueType::Object,
            Literal::Bool(_) => ValueType::Boolean,
            Literal::Int(_) => ValueType::Long,
            Literal::Float(_) => ValueType::Double,
            Literal::String(_) => ValueType::String,
            Literal::Char(_) => ValueType::Character,
            Literal::Date(_) => ValueType::Date,
            Literal::Time(_) => ValueType::Time,
            Literal::Timestamp(_) | Literal::Instant(_) => ValueType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Int(n)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Int(n as i64)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<char> for Literal {
    fn from(c: char) -> Self {
        Literal::Char(c)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.into())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<NaiveDate> for Literal {
    fn from(d: NaiveDate) -> Self {
        Literal::Date(d)
    }
}

impl From<NaiveTime> for Literal {
    fn from(t: NaiveTime) -> Self {
        Literal::Time(t)
    }
}

impl From<NaiveDateTime> for Literal {
    fn from(ts: NaiveDateTime) -> Self {
        Literal::Timestamp(ts)
    }
}

impl From<DateTime<Utc>> for Literal {
    fn from(ts: DateTime<Utc>) -> Self {
        Literal::Instant(ts)
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Dyadic (and monadic) operators.
///
/// `Not` and `Neg` are monadic: their right operand is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DyadicOp {
    And,
    Or,
    Not,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
    Like,
    In,
    Is,
    Distinct,
    Cast,
}

impl DyadicOp {
    pub fn name(&self) -> &'static str {
        match self {
            DyadicOp::And => "AND",
            DyadicOp::Or => "OR",
            DyadicOp::Not => "NOT",
            DyadicOp::Neg => "NEG",
            DyadicOp::Add => "ADD",
            DyadicOp::Sub => "SUB",
            DyadicOp::Mul => "MUL",
            DyadicOp::Div => "DIV",
            DyadicOp::Mod => "MOD",
            DyadicOp::Concat => "CONCAT",
            DyadicOp::Eq => "EQ",
            DyadicOp::NotEq => "NOTEQ",
            DyadicOp::Gt => "GT",
            DyadicOp::Lt => "LT",
            DyadicOp::GtEq => "GTEQ",
            DyadicOp::LtEq => "LTEQ",
            DyadicOp::Like => "LIKE",
            DyadicOp::In => "IN",
            DyadicOp::Is => "IS",
            DyadicOp::Distinct => "DISTINCT",
            DyadicOp::Cast => "CAST",
        }
    }
}

/// Join kinds as they appear in a FROM chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    InnerFetch,
    LeftOuterFetch,
    RightOuterFetch,
}

impl JoinKind {
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            JoinKind::InnerFetch | JoinKind::LeftOuterFetch | JoinKind::RightOuterFetch
        )
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NullsOrder {
    First,
    Last,
}

/// Keyword introducing a subquery operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubqueryKeyword {
    Exists,
    All,
    Any,
    Some,
}

// =============================================================================
// Nodes
// =============================================================================

/// Reference from an identifier to the symbol it was bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolRef {
    pub name: String,
    /// 0 = own scope, 1 = parent scope, ...
    pub depth: usize,
    /// The identifier was a member of the candidate rather than a declared alias.
    pub implicit: bool,
}

/// An IR expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IrExpr {
    Literal(Literal),

    /// Named (`:name`) or positional (`?n`) placeholder.
    Parameter {
        name: Option<String>,
        position: Option<usize>,
        value_type: ValueType,
    },

    /// Dotted identifier chain, optionally continuing from an arbitrary expression.
    Primary {
        left: Option<Box<IrExpr>>,
        tuple: Vec<String>,
        symbol: Option<SymbolRef>,
    },

    /// Named variable (subquery results).
    Variable {
        name: String,
        symbol: Option<SymbolRef>,
    },

    Dyadic {
        left: Box<IrExpr>,
        op: DyadicOp,
        right: Option<Box<IrExpr>>,
    },

    /// Function or method invocation.
    Invocation {
        target: Option<Box<IrExpr>>,
        name: String,
        args: Vec<IrExpr>,
        distinct: bool,
    },

    /// Projection constructor: NEW Type(args...)
    Creator { type_name: String, args: Vec<IrExpr> },

    Case {
        conditions: Vec<(IrExpr, IrExpr)>,
        otherwise: Option<Box<IrExpr>>,
    },

    /// EXISTS / ALL / ANY / SOME over a subquery variable.
    Subquery {
        keyword: SubqueryKeyword,
        variable: Box<IrExpr>,
    },

    /// FROM-clause candidate marker with its join chain.
    Class(ClassExpr),

    Order(OrderExpr),
}

/// Candidate class marker of a FROM clause.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassExpr {
    pub entity: String,
    pub alias: String,
    pub join: Option<Box<JoinExpr>>,
}

/// One link of a FROM join chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinExpr {
    pub kind: JoinKind,
    pub primary: Box<IrExpr>,
    pub alias: Option<String>,
    pub on: Option<Box<IrExpr>>,
    pub next: Option<Box<JoinExpr>>,
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderExpr {
    pub expr: Box<IrExpr>,
    pub dir: SortDir,
    pub nulls: Option<NullsOrder>,
}

impl IrExpr {
    pub fn literal(lit: impl Into<Literal>) -> Self {
        IrExpr::Literal(lit.into())
    }

    pub fn null() -> Self {
        IrExpr::Literal(Literal::Null)
    }

    pub fn primary(tuple: Vec<String>) -> Self {
        IrExpr::Primary {
            left: None,
            tuple,
            symbol: None,
        }
    }

    pub fn dyadic(left: IrExpr, op: DyadicOp, right: IrExpr) -> Self {
        IrExpr::Dyadic {
            left: Box::new(left),
            op,
            right: Some(Box::new(right)),
        }
    }

    pub fn monadic(op: DyadicOp, expr: IrExpr) -> Self {
        IrExpr::Dyadic {
            left: Box::new(expr),
            op,
            right: None,
        }
    }

    pub fn invoke(target: Option<IrExpr>, name: &str, args: Vec<IrExpr>) -> Self {
        IrExpr::Invocation {
            target: target.map(Box::new),
            name: name.into(),
            args,
            distinct: false,
        }
    }

    pub fn variable(name: &str) -> Self {
        IrExpr::Variable {
            name: name.into(),
            symbol: None,
        }
    }

    /// Literal NULL check used for IS [NOT] NULL recognition.
    pub fn is_null_literal(&self) -> bool {
        matches!(self, IrExpr::Literal(Literal::Null))
    }

    /// The tuple of a primary with no left expression.
    pub fn bare_tuple(&self) -> Option<&[String]> {
        match self {
            IrExpr::Primary {
                left: None, tuple, ..
            } => Some(tuple),
            _ => None,
        }
    }

    /// Visit this node and all descendants, pre-order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a IrExpr)) {
        visit(self);
        match self {
            IrExpr::Literal(_) | IrExpr::Parameter { .. } | IrExpr::Variable { .. } => {}
            IrExpr::Primary { left, .. } => {
                if let Some(left) = left {
                    left.walk(visit);
                }
            }
            IrExpr::Dyadic { left, right, .. } => {
                left.walk(visit);
                if let Some(right) = right {
                    right.walk(visit);
                }
            }
            IrExpr::Invocation { target, args, .. } => {
                if let Some(target) = target {
                    target.walk(visit);
                }
                for arg in args {
                    arg.walk(visit);
                }
            }
            IrExpr::Creator { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            IrExpr::Case {
                conditions,
                otherwise,
            } => {
                for (when, then) in conditions {
                    when.walk(visit);
                    then.walk(visit);
                }
                if let Some(otherwise) = otherwise {
                    otherwise.walk(visit);
                }
            }
            IrExpr::Subquery { variable, .. } => variable.walk(visit),
            IrExpr::Class(class) => {
                let mut link = class.join.as_deref();
                while let Some(join) = link {
                    join.primary.walk(visit);
                    if let Some(on) = &join.on {
                        on.walk(visit);
                    }
                    link = join.next.as_deref();
                }
            }
            IrExpr::Order(order) => order.expr.walk(visit),
        }
    }
}

impl JoinExpr {
    /// Iterate this link and every following one.
    pub fn chain(&self) -> impl Iterator<Item = &JoinExpr> {
        std::iter::successors(Some(self), |join| join.next.as_deref())
    }
}
