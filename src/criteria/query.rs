//! Query assembly: SELECT, UPDATE and DELETE criteria.
//!
//! All three statement forms share one [`QueryCore`]. A core holds the
//! clauses as criteria objects and derives two things from them on demand:
//!
//! - a [`QueryCompilation`], the bound IR of every clause, and
//! - the JPQL text, walked directly from the criteria objects.
//!
//! Both are memoized against [`QueryCore::revision`], the sum of the core's
//! own mutation counter and the revisions of everything it references.

use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{CriteriaError, CriteriaResult};
use crate::ir::{
    Binder, DyadicOp, IrExpr, QueryCompilation, StatementKind, Symbol, SymbolTable,
};
use crate::metadata::{MetadataResolverExt, ValueType};
use crate::render::{JpqlRenderer, Token, TokenStream};

use super::builder::BuilderContext;
use super::expression::Expression;
use super::memo::Memo;
use super::order::Order;
use super::path::{FromPath, Root};
use super::predicate::{BooleanOperator, Predicate};
use super::subquery::Subquery;

/// Clause state shared by queries and subqueries.
#[derive(Debug)]
pub(crate) struct QueryCore {
    context: Arc<BuilderContext>,
    kind: StatementKind,
    default_alias: String,
    selection: Vec<Expression>,
    distinct: bool,
    roots: Vec<Root>,
    filter: Option<Predicate>,
    grouping: Vec<Expression>,
    having: Option<Predicate>,
    ordering: Vec<Order>,
    assignments: Vec<(Expression, Expression)>,
    subqueries: Vec<Subquery>,
    version: u64,
    compiled: Memo<QueryCompilation>,
    rendered: Memo<String>,
}

impl QueryCore {
    pub(crate) fn new(
        context: Arc<BuilderContext>,
        kind: StatementKind,
        default_alias: String,
    ) -> Self {
        Self {
            context,
            kind,
            default_alias,
            selection: Vec::new(),
            distinct: false,
            roots: Vec::new(),
            filter: None,
            grouping: Vec::new(),
            having: None,
            ordering: Vec::new(),
            assignments: Vec::new(),
            subqueries: Vec::new(),
            version: 0,
            compiled: Memo::new(),
            rendered: Memo::new(),
        }
    }

    pub(crate) fn revision(&self) -> u64 {
        let clauses: u64 = self.selection.iter().map(Expression::revision).sum::<u64>()
            + self.filter.as_ref().map_or(0, Predicate::revision)
            + self.grouping.iter().map(Expression::revision).sum::<u64>()
            + self.having.as_ref().map_or(0, Predicate::revision)
            + self.ordering.iter().map(Order::revision).sum::<u64>()
            + self
                .assignments
                .iter()
                .map(|(path, value)| path.revision() + value.revision())
                .sum::<u64>();
        self.version
            + self.roots.iter().map(FromPath::revision).sum::<u64>()
            + self.subqueries.iter().map(Subquery::revision).sum::<u64>()
            + clauses
    }

    /// Apply a structural change. The revision strictly increases, even when
    /// the change drops a clause that contributed to it.
    fn mutate(&mut self, change: impl FnOnce(&mut Self)) {
        let before = self.revision();
        change(self);
        let after = self.revision();
        self.version += before.saturating_sub(after) + 1;
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Add a FROM root. The first root takes the default alias, later ones
    /// the default alias suffixed with their position.
    pub(crate) fn add_root(&mut self, entity: &str) -> CriteriaResult<Root> {
        let entity = self.context.metadata.resolve_entity(entity)?;
        let alias = match self.roots.len() {
            0 => self.default_alias.clone(),
            n => format!("{}{}", self.default_alias, n),
        };
        let root = FromPath::root(entity, alias, Arc::clone(&self.context.metadata));
        let added = root.clone();
        self.mutate(|core| core.roots.push(added));
        Ok(root)
    }

    pub(crate) fn set_selection(&mut self, selection: Vec<Expression>) {
        self.mutate(|core| core.selection = selection);
    }

    pub(crate) fn set_distinct(&mut self, distinct: bool) {
        self.mutate(|core| core.distinct = distinct);
    }

    pub(crate) fn set_filter(&mut self, filter: Option<Predicate>) {
        self.mutate(|core| core.filter = filter);
    }

    pub(crate) fn set_grouping(&mut self, grouping: Vec<Expression>) {
        self.mutate(|core| core.grouping = grouping);
    }

    pub(crate) fn set_having(&mut self, having: Option<Predicate>) {
        self.mutate(|core| core.having = having);
    }

    pub(crate) fn set_ordering(&mut self, ordering: Vec<Order>) {
        self.mutate(|core| core.ordering = ordering);
    }

    pub(crate) fn add_assignment(&mut self, path: Expression, value: Expression) {
        self.mutate(|core| core.assignments.push((path, value)));
    }

    pub(crate) fn new_subquery(&mut self, result_type: ValueType) -> Subquery {
        let subquery = Subquery::new(Arc::clone(&self.context), result_type);
        let added = subquery.clone();
        self.mutate(|core| core.subqueries.push(added));
        subquery
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub(crate) fn roots(&self) -> &[Root] {
        &self.roots
    }

    pub(crate) fn selection(&self) -> &[Expression] {
        &self.selection
    }

    pub(crate) fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub(crate) fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    pub(crate) fn grouping(&self) -> &[Expression] {
        &self.grouping
    }

    pub(crate) fn having(&self) -> Option<&Predicate> {
        self.having.as_ref()
    }

    pub(crate) fn ordering(&self) -> &[Order] {
        &self.ordering
    }

    pub(crate) fn subqueries(&self) -> &[Subquery] {
        &self.subqueries
    }

    // =========================================================================
    // Compilation
    // =========================================================================

    pub(crate) fn compilation(&self) -> CriteriaResult<Rc<QueryCompilation>> {
        let revision = self.revision();
        if let Some(compiled) = self.compiled.peek(revision) {
            trace!(revision, "compilation cache hit");
            return Ok(compiled);
        }
        trace!(revision, "compilation cache miss");
        self.compiled
            .get_or_try_init(revision, || self.compile(None))
    }

    /// Bind every clause against a fresh scope, chained to `parent` for
    /// subqueries.
    pub(crate) fn compile(
        &self,
        parent: Option<Rc<SymbolTable>>,
    ) -> CriteriaResult<QueryCompilation> {
        let candidate = self.roots.first().ok_or(CriteriaError::MissingCandidate)?;
        let candidate_alias = candidate
            .alias()
            .unwrap_or_else(|| self.default_alias.clone());

        let mut table = match parent {
            Some(parent) => SymbolTable::with_parent(parent),
            None => SymbolTable::new(),
        };
        self.seed(&mut table, candidate, &candidate_alias)?;

        let metadata = &*self.context.metadata;
        let mut binder = Binder::new(&mut table, metadata);

        let from = self
            .roots
            .iter()
            .map(|root| binder.bind_clause("from", &root.from_clause_expression()))
            .collect::<CriteriaResult<Vec<_>>>()?;

        let selects_candidate = |expr: &Expression| {
            expr.query_expression()
                .bare_tuple()
                .is_some_and(|tuple| tuple.len() == 1 && tuple[0] == candidate_alias)
        };
        let result = match self.selection.as_slice() {
            [] => None,
            [only] if selects_candidate(only) => None,
            items => Some(bind_expressions(&mut binder, "result", items)?),
        };

        let filter = match &self.filter {
            Some(filter) => Some(binder.bind_clause("filter", &filter.query_expression())?),
            None => None,
        };
        let grouping = if self.grouping.is_empty() {
            None
        } else {
            Some(bind_expressions(&mut binder, "grouping", &self.grouping)?)
        };
        let having = match &self.having {
            Some(having) => Some(binder.bind_clause("having", &having.query_expression())?),
            None => None,
        };
        let ordering = if self.ordering.is_empty() {
            None
        } else {
            let mut bound = Vec::with_capacity(self.ordering.len());
            for order in &self.ordering {
                bound.push(binder.bind_clause("ordering", &order.query_expression())?);
            }
            Some(bound)
        };
        let update = if self.kind == StatementKind::Update {
            self.require_assignments()?;
            let mut bound = Vec::with_capacity(self.assignments.len());
            for (path, value) in &self.assignments {
                let assignment = IrExpr::dyadic(path.ir_owned(), DyadicOp::Eq, value.ir_owned());
                bound.push(binder.bind_clause("update", &assignment)?);
            }
            Some(bound)
        } else {
            None
        };

        let symbols = Rc::new(table);
        let mut compilation = QueryCompilation {
            language: self.context.settings.language.clone(),
            kind: self.kind,
            candidate: candidate.entity_name().to_string(),
            candidate_alias,
            symbols: Rc::clone(&symbols),
            result,
            from,
            filter,
            grouping,
            having,
            ordering,
            update,
            distinct: self.distinct,
            subqueries: Vec::new(),
        };
        for subquery in &self.subqueries {
            compilation.add_subquery(subquery.name(), subquery.compile(Rc::clone(&symbols))?);
        }

        debug!(
            candidate = %compilation.candidate,
            alias = %compilation.candidate_alias,
            kind = ?compilation.kind,
            symbols = compilation.symbols.len(),
            subqueries = compilation.subqueries.len(),
            "compiled criteria query"
        );
        Ok(compilation)
    }

    /// Candidate, other aliased roots, aliased joins and subquery variables,
    /// all declared before any clause is bound.
    fn seed(
        &self,
        table: &mut SymbolTable,
        candidate: &Root,
        candidate_alias: &str,
    ) -> CriteriaResult<()> {
        table.add_candidate(candidate_alias, ValueType::entity(candidate.entity_name()))?;
        for root in self.roots.iter().skip(1) {
            if let Some(alias) = root.alias() {
                table.add(Symbol::identifier(&alias, ValueType::entity(root.entity_name())))?;
            }
        }
        for root in &self.roots {
            for join in root.join_chain() {
                if join.is_fetch() {
                    continue;
                }
                if let Some(alias) = join.alias() {
                    table.add(Symbol::identifier(&alias, ValueType::entity(join.entity_name())))?;
                }
            }
        }
        for subquery in &self.subqueries {
            table.add(Symbol::variable(subquery.name(), subquery.result_type()))?;
        }
        Ok(())
    }

    // =========================================================================
    // Text
    // =========================================================================

    pub(crate) fn text(&self) -> CriteriaResult<Rc<String>> {
        let revision = self.revision();
        if let Some(text) = self.rendered.peek(revision) {
            trace!(revision, "rendered text cache hit");
            return Ok(text);
        }
        trace!(revision, "rendered text cache miss");
        self.rendered.get_or_try_init(revision, || self.render())
    }

    fn render(&self) -> CriteriaResult<String> {
        let mut renderer = JpqlRenderer::new();
        for subquery in &self.subqueries {
            renderer.add_subquery(subquery.name(), subquery.to_jpql()?.as_str());
        }

        let mut ts = TokenStream::new();
        match self.kind {
            StatementKind::Select => {
                ts.push(Token::Select).space();
                if self.distinct {
                    ts.push(Token::Distinct).space();
                }
                if !self.selection.is_empty() {
                    for (i, item) in self.selection.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.push(Token::Raw(renderer.render(&item.query_expression())?));
                        if let Some(alias) = item.alias() {
                            ts.space()
                                .push(Token::As)
                                .space()
                                .push(Token::Ident(alias.to_string()));
                        }
                    }
                    ts.space();
                }
                ts.push(Token::From).space();
                self.push_roots(&mut ts, &renderer)?;
            }
            StatementKind::Update => {
                self.require_assignments()?;
                ts.push(Token::Update).space();
                self.push_roots(&mut ts, &renderer)?;
                ts.space().push(Token::Set).space();
                for (i, (path, value)) in self.assignments.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Raw(renderer.render(&path.query_expression())?))
                        .space()
                        .push(Token::Eq)
                        .space()
                        .push(Token::Raw(renderer.render(&value.query_expression())?));
                }
            }
            StatementKind::Delete => {
                ts.push(Token::Delete).space().push(Token::From).space();
                self.push_roots(&mut ts, &renderer)?;
            }
        }

        if let Some(filter) = &self.filter {
            ts.space()
                .push(Token::Where)
                .space()
                .push(Token::Raw(filter.to_text(&renderer)?));
        }
        if !self.grouping.is_empty() {
            ts.space().push(Token::GroupBy).space();
            for (i, expr) in self.grouping.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Raw(renderer.render(&expr.query_expression())?));
            }
        }
        if let Some(having) = &self.having {
            ts.space()
                .push(Token::Having)
                .space()
                .push(Token::Raw(having.to_text(&renderer)?));
        }
        if !self.ordering.is_empty() {
            ts.space().push(Token::OrderBy).space();
            for (i, order) in self.ordering.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Raw(order.to_text(&renderer)?));
            }
        }

        Ok(ts.serialize())
    }

    fn require_assignments(&self) -> CriteriaResult<()> {
        if self.assignments.is_empty() {
            return Err(CriteriaError::invalid("UPDATE has no SET assignments"));
        }
        Ok(())
    }

    fn push_roots(&self, ts: &mut TokenStream, renderer: &JpqlRenderer) -> CriteriaResult<()> {
        if self.roots.is_empty() {
            return Err(CriteriaError::MissingCandidate);
        }
        for (i, root) in self.roots.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Raw(root.to_text(renderer)?));
        }
        Ok(())
    }
}

fn bind_expressions(
    binder: &mut Binder<'_>,
    clause: &str,
    items: &[Expression],
) -> CriteriaResult<Vec<IrExpr>> {
    items
        .iter()
        .map(|item| binder.bind_clause(clause, &item.query_expression()))
        .collect()
}

/// AND of `predicates`; a single predicate is kept as is.
pub(crate) fn conjoin(predicates: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
    let mut predicates: Vec<Predicate> = predicates.into_iter().collect();
    match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(Predicate::composite(BooleanOperator::And, predicates)),
    }
}

/// A SELECT query.
///
/// Mutators return `&mut Self` so calls chain; every mutation invalidates
/// the cached compilation and text.
#[derive(Debug)]
pub struct CriteriaQuery {
    result_type: ValueType,
    core: QueryCore,
}

impl CriteriaQuery {
    pub(crate) fn new(context: Arc<BuilderContext>, result_type: ValueType) -> Self {
        let default_alias = context.settings.default_alias.clone();
        Self {
            result_type,
            core: QueryCore::new(context, StatementKind::Select, default_alias),
        }
    }

    pub fn result_type(&self) -> &ValueType {
        &self.result_type
    }

    /// Add a root for `entity`.
    pub fn from(&mut self, entity: &str) -> CriteriaResult<Root> {
        self.core.add_root(entity)
    }

    pub fn roots(&self) -> &[Root] {
        self.core.roots()
    }

    /// Select a single item.
    pub fn select(&mut self, selection: impl Into<Expression>) -> &mut Self {
        self.core.set_selection(vec![selection.into()]);
        self
    }

    /// Select several items.
    pub fn multiselect<I, V>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        self.core
            .set_selection(items.into_iter().map(Into::into).collect());
        self
    }

    pub fn selection(&self) -> &[Expression] {
        self.core.selection()
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.core.set_distinct(distinct);
        self
    }

    pub fn is_distinct(&self) -> bool {
        self.core.is_distinct()
    }

    /// Replace the WHERE clause.
    pub fn filter(&mut self, predicate: Predicate) -> &mut Self {
        self.core.set_filter(Some(predicate));
        self
    }

    /// Replace the WHERE clause with the conjunction of `predicates`; an
    /// empty list removes it.
    pub fn filter_all(&mut self, predicates: impl IntoIterator<Item = Predicate>) -> &mut Self {
        self.core.set_filter(conjoin(predicates));
        self
    }

    pub fn restriction(&self) -> Option<&Predicate> {
        self.core.filter()
    }

    pub fn group_by<I, V>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expression>,
    {
        self.core
            .set_grouping(items.into_iter().map(Into::into).collect());
        self
    }

    pub fn group_list(&self) -> &[Expression] {
        self.core.grouping()
    }

    pub fn having(&mut self, predicate: Predicate) -> &mut Self {
        self.core.set_having(Some(predicate));
        self
    }

    pub fn group_restriction(&self) -> Option<&Predicate> {
        self.core.having()
    }

    /// Replace the ORDER BY list.
    pub fn order_by(&mut self, orders: impl IntoIterator<Item = Order>) -> &mut Self {
        self.core.set_ordering(orders.into_iter().collect());
        self
    }

    pub fn order_list(&self) -> &[Order] {
        self.core.ordering()
    }

    /// Declare a subquery in this query's scope.
    pub fn subquery(&mut self, result_type: ValueType) -> Subquery {
        self.core.new_subquery(result_type)
    }

    pub fn subqueries(&self) -> &[Subquery] {
        self.core.subqueries()
    }

    /// The bound query, compiled on first use after a change.
    pub fn compilation(&self) -> CriteriaResult<Rc<QueryCompilation>> {
        self.core.compilation()
    }

    /// Parameters registered while binding, subqueries included.
    pub fn parameters(&self) -> CriteriaResult<Vec<Symbol>> {
        Ok(self.compilation()?.parameters())
    }

    /// JPQL text, rendered on first use after a change.
    pub fn to_jpql(&self) -> CriteriaResult<Rc<String>> {
        self.core.text()
    }
}

/// A bulk UPDATE over one entity.
#[derive(Debug)]
pub struct CriteriaUpdate {
    root: Root,
    core: QueryCore,
}

impl CriteriaUpdate {
    pub(crate) fn new(context: Arc<BuilderContext>, entity: &str) -> CriteriaResult<Self> {
        let default_alias = context.settings.default_alias.clone();
        let mut core = QueryCore::new(context, StatementKind::Update, default_alias);
        let root = core.add_root(entity)?;
        Ok(Self { root, core })
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Add `path = value` to the SET list.
    pub fn set(&mut self, path: impl Into<Expression>, value: impl Into<Expression>) -> &mut Self {
        self.core.add_assignment(path.into(), value.into());
        self
    }

    /// Add `root.attribute = value` to the SET list.
    pub fn set_attribute(
        &mut self,
        attribute: &str,
        value: impl Into<Expression>,
    ) -> CriteriaResult<&mut Self> {
        let path = self.root.get(attribute)?;
        Ok(self.set(path, value))
    }

    pub fn filter(&mut self, predicate: Predicate) -> &mut Self {
        self.core.set_filter(Some(predicate));
        self
    }

    pub fn filter_all(&mut self, predicates: impl IntoIterator<Item = Predicate>) -> &mut Self {
        self.core.set_filter(conjoin(predicates));
        self
    }

    pub fn restriction(&self) -> Option<&Predicate> {
        self.core.filter()
    }

    pub fn subquery(&mut self, result_type: ValueType) -> Subquery {
        self.core.new_subquery(result_type)
    }

    pub fn compilation(&self) -> CriteriaResult<Rc<QueryCompilation>> {
        self.core.compilation()
    }

    pub fn parameters(&self) -> CriteriaResult<Vec<Symbol>> {
        Ok(self.compilation()?.parameters())
    }

    pub fn to_jpql(&self) -> CriteriaResult<Rc<String>> {
        self.core.text()
    }
}

/// A bulk DELETE over one entity.
#[derive(Debug)]
pub struct CriteriaDelete {
    root: Root,
    core: QueryCore,
}

impl CriteriaDelete {
    pub(crate) fn new(context: Arc<BuilderContext>, entity: &str) -> CriteriaResult<Self> {
        let default_alias = context.settings.default_alias.clone();
        let mut core = QueryCore::new(context, StatementKind::Delete, default_alias);
        let root = core.add_root(entity)?;
        Ok(Self { root, core })
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn filter(&mut self, predicate: Predicate) -> &mut Self {
        self.core.set_filter(Some(predicate));
        self
    }

    pub fn filter_all(&mut self, predicates: impl IntoIterator<Item = Predicate>) -> &mut Self {
        self.core.set_filter(conjoin(predicates));
        self
    }

    pub fn restriction(&self) -> Option<&Predicate> {
        self.core.filter()
    }

    pub fn subquery(&mut self, result_type: ValueType) -> Subquery {
        self.core.new_subquery(result_type)
    }

    pub fn compilation(&self) -> CriteriaResult<Rc<QueryCompilation>> {
        self.core.compilation()
    }

    pub fn parameters(&self) -> CriteriaResult<Vec<Symbol>> {
        Ok(self.compilation()?.parameters())
    }

    pub fn to_jpql(&self) -> CriteriaResult<Rc<String>> {
        self.core.text()
    }
}
