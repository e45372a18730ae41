//! Subqueries.
//!
//! A [`Subquery`] is declared inside a parent query and named by the builder
//! context (`DN_SUBQUERY_1`, ...). Inside parent clauses it appears as a
//! variable of that name; it compiles against a scope chained to the
//! parent's symbol table, so its clauses may reference parent aliases.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{CriteriaError, CriteriaResult};
use crate::ir::{QueryCompilation, StatementKind, SymbolTable};
use crate::metadata::ValueType;

use super::builder::BuilderContext;
use super::expression::{ExprKind, Expression};
use super::path::{FromPath, Root};
use super::predicate::Predicate;
use super::query::{conjoin, QueryCore};

struct SubqueryInner {
    name: String,
    result_type: ValueType,
    core: RefCell<QueryCore>,
    /// Set while this subquery's revision is being measured.
    visiting: Cell<bool>,
    /// Set when a measurement reached this subquery again.
    reentered: Cell<bool>,
}

/// A nested SELECT. Clones are handles to the same subquery.
#[derive(Clone)]
pub struct Subquery(Rc<SubqueryInner>);

impl Subquery {
    pub(crate) fn new(context: Arc<BuilderContext>, result_type: ValueType) -> Self {
        let name = context.next_subquery_name();
        let default_alias = format!("{}_THIS", name);
        let core = QueryCore::new(context, StatementKind::Select, default_alias);
        Subquery(Rc::new(SubqueryInner {
            name,
            result_type,
            core: RefCell::new(core),
            visiting: Cell::new(false),
            reentered: Cell::new(false),
        }))
    }

    /// Variable name of this subquery in the parent scope.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn result_type(&self) -> ValueType {
        self.0.result_type.clone()
    }

    pub fn from(&self, entity: &str) -> CriteriaResult<Root> {
        self.0.core.borrow_mut().add_root(entity)
    }

    pub fn roots(&self) -> Vec<Root> {
        self.0.core.borrow().roots().to_vec()
    }

    pub fn select(&self, selection: impl Into<Expression>) -> &Self {
        self.0.core.borrow_mut().set_selection(vec![selection.into()]);
        self
    }

    pub fn distinct(&self, distinct: bool) -> &Self {
        self.0.core.borrow_mut().set_distinct(distinct);
        self
    }

    pub fn filter(&self, predicate: Predicate) -> &Self {
        self.0.core.borrow_mut().set_filter(Some(predicate));
        self
    }

    pub fn filter_all(&self, predicates: impl IntoIterator<Item = Predicate>) -> &Self {
        self.0.core.borrow_mut().set_filter(conjoin(predicates));
        self
    }

    pub fn group_by<I, V>(&self, items: I) -> &Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        self.0
            .core
            .borrow_mut()
            .set_grouping(items.into_iter().map(Into::into).collect());
        self
    }

    pub fn having(&self, predicate: Predicate) -> &Self {
        self.0.core.borrow_mut().set_having(Some(predicate));
        self
    }

    /// Declare a subquery nested in this one.
    pub fn subquery(&self, result_type: ValueType) -> Subquery {
        self.0.core.borrow_mut().new_subquery(result_type)
    }

    /// Correlated roots and joins are not supported.
    pub fn correlate(&self, _parent: &FromPath) -> CriteriaResult<Root> {
        Err(CriteriaError::unsupported("correlated subquery roots"))
    }

    /// This subquery as a value of its result type.
    pub fn to_expression(&self) -> Expression {
        Expression::new(
            ExprKind::Subquery {
                keyword: None,
                subquery: self.clone(),
            },
            self.result_type(),
        )
    }

    /// A subquery reached from its own clauses contributes nothing.
    pub fn revision(&self) -> u64 {
        if self.0.visiting.get() {
            self.0.reentered.set(true);
            return 0;
        }
        // Mutably borrowed: one of our own setters is measuring the core.
        match self.0.core.try_borrow() {
            Ok(core) => self.visit(|| core.revision()),
            Err(_) => 0,
        }
    }

    /// JPQL text of the subquery body, without enclosing parentheses.
    pub fn to_jpql(&self) -> CriteriaResult<Rc<String>> {
        let core = self.core()?;
        self.check_acyclic(&core)?;
        core.text()
    }

    pub(crate) fn compile(&self, parent: Rc<SymbolTable>) -> CriteriaResult<QueryCompilation> {
        let core = self.core()?;
        self.check_acyclic(&core)?;
        core.compile(Some(parent))
    }

    fn core(&self) -> CriteriaResult<Ref<'_, QueryCore>> {
        self.0.core.try_borrow().map_err(|_| self.self_reference())
    }

    fn visit<R>(&self, measure: impl FnOnce() -> R) -> R {
        self.0.visiting.set(true);
        let result = measure();
        self.0.visiting.set(false);
        result
    }

    fn check_acyclic(&self, core: &QueryCore) -> CriteriaResult<()> {
        if self.0.visiting.get() {
            return Err(self.self_reference());
        }
        self.0.reentered.set(false);
        self.visit(|| core.revision());
        if self.0.reentered.replace(false) {
            return Err(self.self_reference());
        }
        Ok(())
    }

    fn self_reference(&self) -> CriteriaError {
        CriteriaError::invalid(format!("subquery {} references itself", self.name()))
    }

    pub fn ptr_eq(&self, other: &Subquery) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Subquery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subquery")
            .field("name", &self.0.name)
            .field("result_type", &self.0.result_type)
            .finish_non_exhaustive()
    }
}

impl From<&Subquery> for Expression {
    fn from(subquery: &Subquery) -> Self {
        subquery.to_expression()
    }
}

impl From<Subquery> for Expression {
    fn from(subquery: Subquery) -> Self {
        subquery.to_expression()
    }
}
