//! IR-to-JPQL rendering.
//!
//! [`JpqlRenderer`] walks an [`IrExpr`] and emits a [`TokenStream`]. Dispatch is
//! exhaustive over IR node kinds; operators and invocation names the renderer
//! has no template for fail with an unsupported-operation error instead of
//! being guessed at.
//!
//! Shape rules worth knowing:
//!
//! - `EQ`/`NOTEQ` against a literal null prints `IS [NOT] NULL`.
//! - `CAST` prints `TREAT(x AS Type)`.
//! - Invocation names are matched case-insensitively, so `indexOf` and
//!   `INDEXOF` both print `LOCATE(..)`.

use std::collections::HashMap;

use crate::error::{CriteriaError, CriteriaResult};
use crate::ir::{
    ClassExpr, DyadicOp, IrExpr, JoinExpr, JoinKind, Literal, NullsOrder, OrderExpr, SortDir,
    SubqueryKeyword,
};

use super::token::{Token, TokenStream};

/// Renders IR nodes to JPQL text.
///
/// Subquery variables print as `(<subquery text>)` when their text has been
/// registered with [`with_subquery`](Self::with_subquery), and as the bare
/// variable name otherwise.
#[derive(Debug, Clone, Default)]
pub struct JpqlRenderer {
    subqueries: HashMap<String, String>,
}

impl JpqlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rendered text of a subquery variable.
    pub fn with_subquery(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.subqueries.insert(name.into(), text.into());
        self
    }

    pub fn add_subquery(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.subqueries.insert(name.into(), text.into());
    }

    /// Render an expression to a string.
    pub fn render(&self, expr: &IrExpr) -> CriteriaResult<String> {
        Ok(self.to_tokens(expr)?.serialize())
    }

    /// Convert an expression to a token stream.
    pub fn to_tokens(&self, expr: &IrExpr) -> CriteriaResult<TokenStream> {
        let mut ts = TokenStream::new();

        match expr {
            IrExpr::Literal(lit) => {
                ts.push(literal_token(lit)?);
            }

            IrExpr::Parameter { name, position, .. } => match (name, position) {
                (Some(name), _) => {
                    ts.push(Token::NamedParam(name.clone()));
                }
                (None, Some(position)) => {
                    ts.push(Token::PositionalParam(*position));
                }
                (None, None) => {
                    return Err(CriteriaError::invalid(
                        "parameter has neither a name nor a position",
                    ))
                }
            },

            IrExpr::Primary { left, tuple, .. } => {
                if let Some(left) = left {
                    ts.append(&self.to_tokens(left)?);
                    for part in tuple {
                        ts.push(Token::Dot).push(Token::Ident(part.clone()));
                    }
                } else {
                    for (i, part) in tuple.iter().enumerate() {
                        if i > 0 {
                            ts.push(Token::Dot);
                        }
                        ts.push(Token::Ident(part.clone()));
                    }
                }
            }

            IrExpr::Variable { name, .. } => match self.subqueries.get(name) {
                Some(text) => {
                    ts.lparen().push(Token::Raw(text.clone())).rparen();
                }
                None => {
                    ts.push(Token::Ident(name.clone()));
                }
            },

            IrExpr::Dyadic { left, op, right } => match right {
                None => self.monadic(&mut ts, *op, left)?,
                Some(right) => self.dyadic(&mut ts, left, *op, right)?,
            },

            IrExpr::Invocation {
                target,
                name,
                args,
                distinct,
            } => self.invocation(&mut ts, target.as_deref(), name, args, *distinct)?,

            IrExpr::Creator { type_name, args } => {
                ts.push(Token::New)
                    .space()
                    .push(Token::Ident(type_name.clone()));
                ts.append(&self.arg_list(args.iter())?);
            }

            IrExpr::Case {
                conditions,
                otherwise,
            } => {
                ts.push(Token::Case);
                for (when, then) in conditions {
                    ts.space().push(Token::When).space();
                    ts.append(&self.to_tokens(when)?);
                    ts.space().push(Token::Then).space();
                    ts.append(&self.to_tokens(then)?);
                }
                if let Some(otherwise) = otherwise {
                    ts.space().push(Token::Else).space();
                    ts.append(&self.to_tokens(otherwise)?);
                }
                ts.space().push(Token::End);
            }

            IrExpr::Subquery { keyword, variable } => {
                ts.push(match keyword {
                    SubqueryKeyword::Exists => Token::Exists,
                    SubqueryKeyword::All => Token::All,
                    SubqueryKeyword::Any => Token::Any,
                    SubqueryKeyword::Some => Token::Some,
                });
                ts.space();
                ts.append(&self.to_tokens(variable)?);
            }

            IrExpr::Class(class) => {
                ts.append(&self.class_tokens(class)?);
            }

            IrExpr::Order(order) => {
                ts.append(&self.order_tokens(order)?);
            }
        }

        Ok(ts)
    }

    /// `Entity alias` followed by its join chain.
    pub fn class_tokens(&self, class: &ClassExpr) -> CriteriaResult<TokenStream> {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(class.entity.clone()))
            .space()
            .push(Token::Ident(class.alias.clone()));
        if let Some(join) = &class.join {
            for link in join.chain() {
                ts.space();
                ts.append(&self.join_tokens(link)?);
            }
        }
        Ok(ts)
    }

    /// One join link, without the links that follow it.
    pub fn join_tokens(&self, join: &JoinExpr) -> CriteriaResult<TokenStream> {
        let mut ts = TokenStream::new();
        match join.kind {
            JoinKind::Inner | JoinKind::InnerFetch => {}
            JoinKind::LeftOuter | JoinKind::LeftOuterFetch => {
                ts.push(Token::Left).space();
            }
            JoinKind::RightOuter | JoinKind::RightOuterFetch => {
                ts.push(Token::Right).space();
            }
        }
        ts.push(Token::Join);
        if join.kind.is_fetch() {
            ts.space().push(Token::Fetch);
        }
        ts.space();
        ts.append(&self.to_tokens(&join.primary)?);
        if let Some(alias) = &join.alias {
            ts.space().push(Token::Ident(alias.clone()));
        }
        if let Some(on) = &join.on {
            ts.space().push(Token::On).space();
            ts.append(&self.to_tokens(on)?);
        }
        Ok(ts)
    }

    pub fn order_tokens(&self, order: &OrderExpr) -> CriteriaResult<TokenStream> {
        let mut ts = self.to_tokens(&order.expr)?;
        ts.space().push(match order.dir {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        });
        match order.nulls {
            Some(NullsOrder::First) => {
                ts.space().push(Token::NullsFirst);
            }
            Some(NullsOrder::Last) => {
                ts.space().push(Token::NullsLast);
            }
            None => {}
        }
        Ok(ts)
    }

    fn monadic(
        &self,
        ts: &mut TokenStream,
        op: DyadicOp,
        operand: &IrExpr,
    ) -> CriteriaResult<()> {
        match op {
            DyadicOp::Not => {
                ts.push(Token::Bang).lparen();
                ts.append(&self.to_tokens(operand)?);
                ts.rparen();
            }
            DyadicOp::Neg => {
                ts.push(Token::Minus);
                ts.append(&self.to_tokens(operand)?);
            }
            other => return Err(CriteriaError::UnsupportedOperator(other.name().into())),
        }
        Ok(())
    }

    fn dyadic(
        &self,
        ts: &mut TokenStream,
        left: &IrExpr,
        op: DyadicOp,
        right: &IrExpr,
    ) -> CriteriaResult<()> {
        if op == DyadicOp::Cast {
            ts.push(Token::Treat).lparen();
            ts.append(&self.to_tokens(left)?);
            ts.space().push(Token::As).space();
            match right {
                IrExpr::Literal(Literal::String(type_name)) => {
                    ts.push(Token::Ident(type_name.clone()));
                }
                other => {
                    ts.append(&self.to_tokens(other)?);
                }
            }
            ts.rparen();
            return Ok(());
        }

        if matches!(op, DyadicOp::Eq | DyadicOp::NotEq) && right.is_null_literal() {
            ts.lparen();
            ts.append(&self.to_tokens(left)?);
            ts.space().push(Token::Is).space();
            if op == DyadicOp::NotEq {
                ts.push(Token::Not).space();
            }
            ts.push(Token::Null).rparen();
            return Ok(());
        }

        let token = infix_token(op)?;
        ts.lparen();
        ts.append(&self.to_tokens(left)?);
        ts.space().push(token).space();
        ts.append(&self.to_tokens(right)?);
        ts.rparen();
        Ok(())
    }

    fn invocation(
        &self,
        ts: &mut TokenStream,
        target: Option<&IrExpr>,
        name: &str,
        args: &[IrExpr],
        distinct: bool,
    ) -> CriteriaResult<()> {
        let operands: Vec<&IrExpr> = target.into_iter().chain(args.iter()).collect();
        let lower = name.to_ascii_lowercase();

        match lower.as_str() {
            "current_date" | "current_time" | "current_timestamp" => {
                ts.push(Token::FunctionName(name.to_ascii_uppercase()));
            }
            "length" => self.call(ts, "LENGTH", &operands)?,
            "lower" | "tolowercase" => self.call(ts, "LOWER", &single(name, &operands)?)?,
            "upper" | "touppercase" => self.call(ts, "UPPER", &single(name, &operands)?)?,
            "isempty" => {
                let [subject] = single(name, &operands)?;
                ts.append(&self.to_tokens(subject)?);
                ts.space().push(Token::Is).space().push(Token::Empty);
            }
            "indexof" | "locate" => self.call(ts, "LOCATE", &operands)?,
            "substring" => self.call(ts, "SUBSTRING", &operands)?,
            "trim" | "trimleft" | "trimright" => {
                let subject = target
                    .ok_or_else(|| CriteriaError::invalid(format!("{} needs a target", name)))?;
                ts.push(Token::FunctionName("TRIM".into())).lparen();
                ts.push(match lower.as_str() {
                    "trimleft" => Token::Leading,
                    "trimright" => Token::Trailing,
                    _ => Token::Both,
                });
                ts.space();
                if let Some(character) = args.first() {
                    ts.append(&self.to_tokens(character)?);
                    ts.space();
                }
                ts.push(Token::From).space();
                ts.append(&self.to_tokens(subject)?);
                ts.rparen();
            }
            "matches" => {
                let subject = target
                    .ok_or_else(|| CriteriaError::invalid("matches needs a target"))?;
                let pattern = args
                    .first()
                    .ok_or_else(|| CriteriaError::invalid("matches needs a pattern"))?;
                ts.append(&self.to_tokens(subject)?);
                ts.space().push(Token::Like).space();
                ts.append(&self.to_tokens(pattern)?);
                if let Some(escape) = args.get(1) {
                    ts.space().push(Token::Escape).space();
                    ts.append(&self.to_tokens(escape)?);
                }
            }
            "contains" => {
                let collection = target
                    .ok_or_else(|| CriteriaError::invalid("contains needs a collection"))?;
                let element = args
                    .first()
                    .ok_or_else(|| CriteriaError::invalid("contains needs an element"))?;
                ts.append(&self.to_tokens(element)?);
                ts.space().push(Token::MemberOf).space();
                ts.append(&self.to_tokens(collection)?);
            }
            "count" => {
                ts.push(Token::FunctionName("COUNT".into())).lparen();
                if distinct {
                    ts.push(Token::Distinct).space();
                }
                ts.append(&self.comma_separated(operands.iter().copied())?);
                ts.rparen();
            }
            "coalesce" | "nullif" | "abs" | "avg" | "max" | "min" | "sqrt" | "sum" | "size"
            | "concat" | "mod" => {
                ts.push(Token::FunctionName(name.to_ascii_uppercase()));
                if distinct {
                    ts.lparen().push(Token::Distinct).space();
                    ts.append(&self.comma_separated(operands.iter().copied())?);
                    ts.rparen();
                } else {
                    ts.append(&self.arg_list(operands.iter().copied())?);
                }
            }
            "function" => self.call(ts, "FUNCTION", &operands)?,
            _ => return Err(CriteriaError::UnsupportedFunction(name.into())),
        }
        Ok(())
    }

    fn call(
        &self,
        ts: &mut TokenStream,
        function: &str,
        operands: &[&IrExpr],
    ) -> CriteriaResult<()> {
        ts.push(Token::FunctionName(function.into()));
        ts.append(&self.arg_list(operands.iter().copied())?);
        Ok(())
    }

    /// `(a, b, ...)`
    fn arg_list<'e>(&self, args: impl Iterator<Item = &'e IrExpr>) -> CriteriaResult<TokenStream> {
        let mut ts = TokenStream::new();
        ts.lparen();
        ts.append(&self.comma_separated(args)?);
        ts.rparen();
        Ok(ts)
    }

    fn comma_separated<'e>(
        &self,
        items: impl Iterator<Item = &'e IrExpr>,
    ) -> CriteriaResult<TokenStream> {
        let mut ts = TokenStream::new();
        for (i, item) in items.enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(&self.to_tokens(item)?);
        }
        Ok(ts)
    }
}

/// Render an expression with no subquery context.
pub fn render(expr: &IrExpr) -> CriteriaResult<String> {
    JpqlRenderer::new().render(expr)
}

fn single<'e>(name: &str, operands: &[&'e IrExpr]) -> CriteriaResult<[&'e IrExpr; 1]> {
    match operands {
        [only] => Ok([*only]),
        _ => Err(CriteriaError::invalid(format!(
            "{} takes exactly one operand, got {}",
            name,
            operands.len()
        ))),
    }
}

fn infix_token(op: DyadicOp) -> CriteriaResult<Token> {
    Ok(match op {
        DyadicOp::And => Token::And,
        DyadicOp::Or => Token::Or,
        DyadicOp::Add => Token::Plus,
        DyadicOp::Sub => Token::Minus,
        DyadicOp::Mul => Token::Mul,
        DyadicOp::Div => Token::Div,
        DyadicOp::Eq => Token::Eq,
        DyadicOp::NotEq => Token::Ne,
        DyadicOp::Gt => Token::Gt,
        DyadicOp::Lt => Token::Lt,
        DyadicOp::GtEq => Token::Gte,
        DyadicOp::LtEq => Token::Lte,
        other => return Err(CriteriaError::UnsupportedOperator(other.name().into())),
    })
}

fn literal_token(lit: &Literal) -> CriteriaResult<Token> {
    Ok(match lit {
        Literal::Null => Token::LitNull,
        Literal::Bool(b) => Token::LitBool(*b),
        Literal::Int(n) => Token::LitInt(*n),
        Literal::Float(f) => {
            if !f.is_finite() {
                return Err(CriteriaError::invalid(format!(
                    "cannot render non-finite number {}",
                    f
                )));
            }
            Token::LitFloat(*f)
        }
        Literal::String(s) => Token::LitString(s.clone()),
        Literal::Char(c) => Token::LitChar(*c),
        Literal::Date(d) => Token::LitDate(*d),
        Literal::Time(t) => Token::LitTime(*t),
        Literal::Timestamp(ts) => Token::LitTimestamp(*ts),
        Literal::Instant(instant) => Token::LitTimestamp(instant.naive_utc()),
    })
}
