//! Factory for queries, expressions and predicates.
//!
//! [`CriteriaBuilder`] is the entry point of the criteria API. It owns the
//! metamodel handle and the query settings shared by everything it creates.
//!
//! ```text
//! CriteriaBuilder ──create_query──▶ CriteriaQuery ──from──▶ Root
//!        │                                │                  │
//!        │ gt / equal / and / ...         │ filter/order_by  │ get / join
//!        ▼                                ▼                  ▼
//!    Predicate ─────────────────────▶ compilation() / to_jpql()
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::QuerySettings;
use crate::error::CriteriaResult;
use crate::ir::{DyadicOp, Literal, SubqueryKeyword};
use crate::metadata::{MetadataResolver, MetadataResolverExt, ValueType};

use super::expression::{ExprKind, Expression};
use super::order::Order;
use super::path::{navigate, split_path};
use super::predicate::{BooleanOperator, Predicate};
use super::query::{CriteriaDelete, CriteriaQuery, CriteriaUpdate};
use super::subquery::Subquery;

/// Process-wide counter for anonymous parameter names.
static PARAMETER_SEQ: AtomicU64 = AtomicU64::new(0);

/// State shared by a builder and every query it creates.
#[derive(Debug)]
pub(crate) struct BuilderContext {
    pub(crate) metadata: Arc<dyn MetadataResolver>,
    pub(crate) settings: QuerySettings,
    subquery_seq: AtomicU64,
}

impl BuilderContext {
    pub(crate) fn next_subquery_name(&self) -> String {
        let n = self.subquery_seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", self.settings.subquery_prefix, n)
    }

    fn next_parameter_name(&self) -> String {
        let n = PARAMETER_SEQ.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", self.settings.parameter_prefix, n)
    }
}

/// Which side(s) `trim` strips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trimspec {
    #[default]
    Both,
    Leading,
    Trailing,
}

/// Builds criteria queries against one metamodel.
#[derive(Debug, Clone)]
pub struct CriteriaBuilder {
    context: Arc<BuilderContext>,
}

impl CriteriaBuilder {
    pub fn new(metadata: Arc<dyn MetadataResolver>) -> Self {
        Self::with_settings(metadata, QuerySettings::default())
    }

    pub fn with_settings(metadata: Arc<dyn MetadataResolver>, settings: QuerySettings) -> Self {
        Self {
            context: Arc::new(BuilderContext {
                metadata,
                settings,
                subquery_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.context.settings
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataResolver> {
        &self.context.metadata
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn create_query(&self, result_type: ValueType) -> CriteriaQuery {
        CriteriaQuery::new(Arc::clone(&self.context), result_type)
    }

    /// Bulk update of `entity`; the root is created immediately.
    pub fn create_update(&self, entity: &str) -> CriteriaResult<CriteriaUpdate> {
        CriteriaUpdate::new(Arc::clone(&self.context), entity)
    }

    /// Bulk delete of `entity`; the root is created immediately.
    pub fn create_delete(&self, entity: &str) -> CriteriaResult<CriteriaDelete> {
        CriteriaDelete::new(Arc::clone(&self.context), entity)
    }

    // =========================================================================
    // Literals and parameters
    // =========================================================================

    pub fn literal(&self, value: impl Into<Literal>) -> Expression {
        Expression::literal(value)
    }

    pub fn null_literal(&self, value_type: ValueType) -> Expression {
        Expression::null(value_type)
    }

    /// Named parameter, rendered `:name`.
    pub fn parameter(&self, value_type: ValueType, name: &str) -> Expression {
        Expression::new(
            ExprKind::Parameter {
                name: Some(name.to_string()),
                position: None,
            },
            value_type,
        )
    }

    /// Parameter with a generated, process-unique name.
    pub fn anonymous_parameter(&self, value_type: ValueType) -> Expression {
        let name = self.context.next_parameter_name();
        self.parameter(value_type, &name)
    }

    /// Positional parameter, rendered `?n`.
    pub fn positional_parameter(&self, value_type: ValueType, position: usize) -> Expression {
        Expression::new(
            ExprKind::Parameter {
                name: None,
                position: Some(position),
            },
            value_type,
        )
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Navigate from any entity-typed expression.
    pub fn get(&self, expr: &Expression, path: &str) -> CriteriaResult<Expression> {
        match expr.kind() {
            ExprKind::From(_) | ExprKind::Path(_) => expr.get(path),
            _ => split_path(path)?
                .into_iter()
                .try_fold(expr.clone(), |current, segment| {
                    navigate(&current, segment, &self.context.metadata)
                }),
        }
    }

    /// Narrow an expression to `entity`, rendered `TREAT(x AS entity)`.
    pub fn treat(&self, expr: &Expression, entity: &str) -> CriteriaResult<Expression> {
        if let ExprKind::From(from) = expr.kind() {
            return from.treat(entity);
        }
        let target = self.context.metadata.resolve_entity(entity)?;
        Ok(Expression::dyadic(
            expr.clone(),
            DyadicOp::Cast,
            Expression::literal(target.name.as_str()),
            ValueType::entity(target.name.as_str()),
        ))
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    pub fn asc(&self, expr: impl Into<Expression>) -> Order {
        Order::asc(expr)
    }

    pub fn desc(&self, expr: impl Into<Expression>) -> Order {
        Order::desc(expr)
    }

    // =========================================================================
    // Boolean composition
    // =========================================================================

    /// Conjunction of `predicates`, in argument order.
    pub fn and(&self, predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::composite(BooleanOperator::And, predicates)
    }

    /// Disjunction of `predicates`, in argument order.
    pub fn or(&self, predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::composite(BooleanOperator::Or, predicates)
    }

    /// `x AND y` over two boolean expressions, as a single leaf.
    pub fn and_expr(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::And, y)
    }

    /// `x OR y` over two boolean expressions, as a single leaf.
    pub fn or_expr(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::Or, y)
    }

    /// Toggle the negation of `predicate`.
    pub fn not(&self, mut predicate: Predicate) -> Predicate {
        predicate.negate();
        predicate
    }

    /// Always-true predicate (empty conjunction).
    pub fn conjunction(&self) -> Predicate {
        self.and([])
    }

    /// Always-false predicate (empty disjunction).
    pub fn disjunction(&self) -> Predicate {
        self.or([])
    }

    // =========================================================================
    // Comparisons
    // =========================================================================

    pub fn equal(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::Eq, y)
    }

    pub fn not_equal(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::NotEq, y)
    }

    pub fn gt(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::Gt, y)
    }

    pub fn ge(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::GtEq, y)
    }

    pub fn lt(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::Lt, y)
    }

    pub fn le(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::LtEq, y)
    }

    /// `lower <= x <= upper`, built eagerly as `(x >= lower) AND (x <= upper)`.
    pub fn between(
        &self,
        x: impl Into<Expression>,
        lower: impl Into<Expression>,
        upper: impl Into<Expression>,
    ) -> Predicate {
        let x = x.into();
        let ge = Expression::dyadic(x.clone(), DyadicOp::GtEq, lower.into(), ValueType::Boolean);
        let le = Expression::dyadic(x, DyadicOp::LtEq, upper.into(), ValueType::Boolean);
        Predicate::leaf(Expression::dyadic(ge, DyadicOp::And, le, ValueType::Boolean))
    }

    pub fn like(&self, x: impl Into<Expression>, pattern: impl Into<Expression>) -> Predicate {
        Predicate::leaf(Expression::invoke(
            Some(x.into()),
            "matches",
            vec![pattern.into()],
            ValueType::Boolean,
        ))
    }

    pub fn like_escape(
        &self,
        x: impl Into<Expression>,
        pattern: impl Into<Expression>,
        escape: char,
    ) -> Predicate {
        Predicate::leaf(Expression::invoke(
            Some(x.into()),
            "matches",
            vec![pattern.into(), Expression::literal(escape)],
            ValueType::Boolean,
        ))
    }

    pub fn not_like(&self, x: impl Into<Expression>, pattern: impl Into<Expression>) -> Predicate {
        !self.like(x, pattern)
    }

    pub fn is_true(&self, x: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::Eq, true)
    }

    pub fn is_false(&self, x: impl Into<Expression>) -> Predicate {
        compare(x, DyadicOp::Eq, false)
    }

    pub fn is_null(&self, x: impl Into<Expression>) -> Predicate {
        x.into().is_null()
    }

    pub fn is_not_null(&self, x: impl Into<Expression>) -> Predicate {
        x.into().is_not_null()
    }

    /// `element MEMBER OF collection`
    pub fn is_member(
        &self,
        element: impl Into<Expression>,
        collection: impl Into<Expression>,
    ) -> Predicate {
        Predicate::leaf(Expression::invoke(
            Some(collection.into()),
            "contains",
            vec![element.into()],
            ValueType::Boolean,
        ))
    }

    pub fn is_not_member(
        &self,
        element: impl Into<Expression>,
        collection: impl Into<Expression>,
    ) -> Predicate {
        !self.is_member(element, collection)
    }

    /// `collection IS EMPTY`
    pub fn is_empty(&self, collection: impl Into<Expression>) -> Predicate {
        Predicate::leaf(Expression::invoke(
            Some(collection.into()),
            "isEmpty",
            vec![],
            ValueType::Boolean,
        ))
    }

    pub fn is_not_empty(&self, collection: impl Into<Expression>) -> Predicate {
        !self.is_empty(collection)
    }

    /// `x` equals one of `values`.
    pub fn in_values<I, V>(&self, x: impl Into<Expression>, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        x.into().in_values(values)
    }

    // =========================================================================
    // Subqueries
    // =========================================================================

    pub fn exists(&self, subquery: &Subquery) -> Predicate {
        Predicate::leaf(subquery_expression(
            subquery,
            SubqueryKeyword::Exists,
            ValueType::Boolean,
        ))
    }

    pub fn all(&self, subquery: &Subquery) -> Expression {
        subquery_expression(subquery, SubqueryKeyword::All, subquery.result_type())
    }

    pub fn any(&self, subquery: &Subquery) -> Expression {
        subquery_expression(subquery, SubqueryKeyword::Any, subquery.result_type())
    }

    pub fn some(&self, subquery: &Subquery) -> Expression {
        subquery_expression(subquery, SubqueryKeyword::Some, subquery.result_type())
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    pub fn neg(&self, x: impl Into<Expression>) -> Expression {
        let x = x.into();
        let value_type = x.value_type().clone();
        Expression::monadic(DyadicOp::Neg, x, value_type)
    }

    pub fn abs(&self, x: impl Into<Expression>) -> Expression {
        unary_function("ABS", x.into())
    }

    pub fn sqrt(&self, x: impl Into<Expression>) -> Expression {
        Expression::invoke(None, "SQRT", vec![x.into()], ValueType::Double)
    }

    pub fn add(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
        arithmetic(x, DyadicOp::Add, y)
    }

    pub fn diff(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
        arithmetic(x, DyadicOp::Sub, y)
    }

    pub fn prod(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
        arithmetic(x, DyadicOp::Mul, y)
    }

    pub fn quot(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
        arithmetic(x, DyadicOp::Div, y)
    }

    /// `MOD(x, y)`
    pub fn modulo(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
        Expression::invoke(None, "MOD", vec![x.into(), y.into()], ValueType::Integer)
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub fn count(&self, x: impl Into<Expression>) -> Expression {
        Expression::invoke(None, "COUNT", vec![x.into()], ValueType::Long)
    }

    pub fn count_distinct(&self, x: impl Into<Expression>) -> Expression {
        Expression::new(
            ExprKind::Invocation {
                target: None,
                name: "COUNT".into(),
                args: vec![x.into()],
                distinct: true,
            },
            ValueType::Long,
        )
    }

    pub fn sum(&self, x: impl Into<Expression>) -> Expression {
        unary_function("SUM", x.into())
    }

    pub fn avg(&self, x: impl Into<Expression>) -> Expression {
        Expression::invoke(None, "AVG", vec![x.into()], ValueType::Double)
    }

    pub fn max(&self, x: impl Into<Expression>) -> Expression {
        unary_function("MAX", x.into())
    }

    pub fn min(&self, x: impl Into<Expression>) -> Expression {
        unary_function("MIN", x.into())
    }

    // =========================================================================
    // Strings
    // =========================================================================

    pub fn lower(&self, x: impl Into<Expression>) -> Expression {
        Expression::invoke(Some(x.into()), "toLowerCase", vec![], ValueType::String)
    }

    pub fn upper(&self, x: impl Into<Expression>) -> Expression {
        Expression::invoke(Some(x.into()), "toUpperCase", vec![], ValueType::String)
    }

    pub fn length(&self, x: impl Into<Expression>) -> Expression {
        Expression::invoke(Some(x.into()), "length", vec![], ValueType::Integer)
    }

    /// Strip blanks from both ends.
    pub fn trim(&self, x: impl Into<Expression>) -> Expression {
        self.trim_with(Trimspec::Both, None, x)
    }

    /// Strip `character` (blank when `None`) from the given side(s).
    pub fn trim_with(
        &self,
        spec: Trimspec,
        character: Option<char>,
        x: impl Into<Expression>,
    ) -> Expression {
        let name = match spec {
            Trimspec::Both => "trim",
            Trimspec::Leading => "trimLeft",
            Trimspec::Trailing => "trimRight",
        };
        let args = character.map(Expression::literal).into_iter().collect();
        Expression::invoke(Some(x.into()), name, args, ValueType::String)
    }

    /// `SUBSTRING(x, from[, len])`
    pub fn substring(
        &self,
        x: impl Into<Expression>,
        from: impl Into<Expression>,
        len: Option<Expression>,
    ) -> Expression {
        let mut args = vec![from.into()];
        args.extend(len);
        Expression::invoke(Some(x.into()), "substring", args, ValueType::String)
    }

    /// `LOCATE(x, pattern[, from])`
    pub fn locate(
        &self,
        x: impl Into<Expression>,
        pattern: impl Into<Expression>,
        from: Option<Expression>,
    ) -> Expression {
        let mut args = vec![pattern.into()];
        args.extend(from);
        Expression::invoke(Some(x.into()), "indexOf", args, ValueType::Integer)
    }

    pub fn concat(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
        Expression::invoke(None, "CONCAT", vec![x.into(), y.into()], ValueType::String)
    }

    // =========================================================================
    // Other functions
    // =========================================================================

    /// Number of elements of a collection.
    pub fn size(&self, collection: impl Into<Expression>) -> Expression {
        Expression::invoke(None, "SIZE", vec![collection.into()], ValueType::Integer)
    }

    /// First non-null of `items`.
    pub fn coalesce<I, V>(&self, items: I) -> Expression
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        let args: Vec<Expression> = items.into_iter().map(Into::into).collect();
        let value_type = args
            .first()
            .map_or(ValueType::Object, |first| first.value_type().clone());
        Expression::invoke(None, "COALESCE", args, value_type)
    }

    pub fn nullif(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Expression {
        let x = x.into();
        let value_type = x.value_type().clone();
        Expression::invoke(None, "NULLIF", vec![x, y.into()], value_type)
    }

    /// Database function call, rendered `FUNCTION('name', args...)`.
    pub fn function(&self, name: &str, value_type: ValueType, args: Vec<Expression>) -> Expression {
        let mut all = vec![Expression::literal(name)];
        all.extend(args);
        Expression::invoke(None, "FUNCTION", all, value_type)
    }

    pub fn current_date(&self) -> Expression {
        Expression::invoke(None, "CURRENT_DATE", vec![], ValueType::Date)
    }

    pub fn current_time(&self) -> Expression {
        Expression::invoke(None, "CURRENT_TIME", vec![], ValueType::Time)
    }

    pub fn current_timestamp(&self) -> Expression {
        Expression::invoke(None, "CURRENT_TIMESTAMP", vec![], ValueType::Timestamp)
    }

    // =========================================================================
    // CASE and projections
    // =========================================================================

    /// Searched CASE: `CASE WHEN cond THEN result ... END`.
    pub fn select_case(&self) -> CaseBuilder {
        CaseBuilder::default()
    }

    /// Simple CASE over `subject`; each `when(value, ..)` tests `subject = value`.
    pub fn simple_case(&self, subject: impl Into<Expression>) -> SimpleCaseBuilder {
        SimpleCaseBuilder {
            subject: subject.into(),
            case: CaseBuilder::default(),
        }
    }

    /// `NEW type_name(args...)`
    pub fn construct(&self, type_name: &str, args: Vec<Expression>) -> Expression {
        Expression::new(
            ExprKind::Creator {
                type_name: type_name.to_string(),
                args,
            },
            ValueType::Object,
        )
    }

    /// Selection list for a multi-column result.
    pub fn tuple<I, V>(&self, items: I) -> Vec<Expression>
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        items.into_iter().map(Into::into).collect()
    }

    /// Same as [`tuple`](Self::tuple); results come back as arrays.
    pub fn array<I, V>(&self, items: I) -> Vec<Expression>
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        self.tuple(items)
    }
}

/// Searched CASE under construction.
#[derive(Debug, Clone, Default)]
#[must_use = "builders have no effect until used"]
pub struct CaseBuilder {
    conditions: Vec<(Expression, Expression)>,
}

impl CaseBuilder {
    pub fn when(mut self, condition: Predicate, result: impl Into<Expression>) -> Self {
        self.conditions
            .push((Expression::from(condition), result.into()));
        self
    }

    pub fn otherwise(self, result: impl Into<Expression>) -> Expression {
        self.finish(Some(result.into()))
    }

    /// Finish without an ELSE branch.
    pub fn end(self) -> Expression {
        self.finish(None)
    }

    fn finish(self, otherwise: Option<Expression>) -> Expression {
        let value_type = self
            .conditions
            .first()
            .map(|(_, then)| then.value_type().clone())
            .or_else(|| otherwise.as_ref().map(|o| o.value_type().clone()))
            .unwrap_or(ValueType::Object);
        Expression::new(
            ExprKind::Case {
                conditions: self.conditions,
                otherwise: otherwise.map(Box::new),
            },
            value_type,
        )
    }
}

/// Simple CASE under construction.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until used"]
pub struct SimpleCaseBuilder {
    subject: Expression,
    case: CaseBuilder,
}

impl SimpleCaseBuilder {
    pub fn when(mut self, value: impl Into<Expression>, result: impl Into<Expression>) -> Self {
        let test = Predicate::leaf(Expression::dyadic(
            self.subject.clone(),
            DyadicOp::Eq,
            value.into(),
            ValueType::Boolean,
        ));
        self.case = self.case.when(test, result);
        self
    }

    pub fn otherwise(self, result: impl Into<Expression>) -> Expression {
        self.case.otherwise(result)
    }

    pub fn end(self) -> Expression {
        self.case.end()
    }
}

fn compare(x: impl Into<Expression>, op: DyadicOp, y: impl Into<Expression>) -> Predicate {
    Predicate::leaf(Expression::dyadic(x.into(), op, y.into(), ValueType::Boolean))
}

fn arithmetic(x: impl Into<Expression>, op: DyadicOp, y: impl Into<Expression>) -> Expression {
    let x = x.into();
    let value_type = x.value_type().clone();
    Expression::dyadic(x, op, y.into(), value_type)
}

fn unary_function(name: &str, x: Expression) -> Expression {
    let value_type = x.value_type().clone();
    Expression::invoke(None, name, vec![x], value_type)
}

fn subquery_expression(
    subquery: &Subquery,
    keyword: SubqueryKeyword,
    value_type: ValueType,
) -> Expression {
    Expression::new(
        ExprKind::Subquery {
            keyword: Some(keyword),
            subquery: subquery.clone(),
        },
        value_type,
    )
}
