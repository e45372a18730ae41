//! Paths, roots and joins.
//!
//! A FROM tree is a set of [`FromPath`] nodes sharing one [`Revision`]. The
//! root is held by its query; each node owns its joins and fetches and keeps
//! a weak link back to its parent.
//!
//! ```text
//!  Root Person DN_THIS
//!   ├── Join address a        (joins: insertion order)
//!   │    └── Join country
//!   └── Fetch orders          (fetches: no symbol, no alias)
//! ```
//!
//! IR forms:
//!
//! | node | IR |
//! |---|---|
//! | root, aliased join | `Primary[alias]` |
//! | unaliased join / fetch | parent tuple + attribute |
//! | path over a tuple | tuple + attribute |
//! | path over anything else | `Primary{left: expr, [attribute]}` |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::error::{CriteriaError, CriteriaResult};
use crate::ir::{ClassExpr, DyadicOp, IrExpr, JoinExpr, JoinKind};
use crate::metadata::{
    Attribute, CollectionKind, EntityType, MetadataResolver, MetadataResolverExt, Plurality,
    ValueType,
};
use crate::render::JpqlRenderer;

use super::expression::{ExprKind, Expression};
use super::memo::{Memo, Revision};
use super::predicate::Predicate;

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

/// What a FROM node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FromRole {
    Root,
    Join {
        join_type: JoinType,
        plurality: Plurality,
    },
    Fetch {
        join_type: JoinType,
        plurality: Plurality,
    },
}

impl FromRole {
    fn join_kind(&self) -> Option<JoinKind> {
        match self {
            FromRole::Root => None,
            FromRole::Join { join_type, .. } => Some(match join_type {
                JoinType::Inner => JoinKind::Inner,
                JoinType::Left => JoinKind::LeftOuter,
                JoinType::Right => JoinKind::RightOuter,
            }),
            FromRole::Fetch { join_type, .. } => Some(match join_type {
                JoinType::Inner => JoinKind::InnerFetch,
                JoinType::Left => JoinKind::LeftOuterFetch,
                JoinType::Right => JoinKind::RightOuterFetch,
            }),
        }
    }

    fn plurality(&self) -> Plurality {
        match self {
            FromRole::Root => Plurality::Singular,
            FromRole::Join { plurality, .. } | FromRole::Fetch { plurality, .. } => *plurality,
        }
    }
}

struct FromNode {
    role: FromRole,
    entity: Arc<EntityType>,
    /// Attribute navigated from the parent; `None` for roots.
    attribute: Option<Attribute>,
    parent: Weak<FromNode>,
    alias: RefCell<Option<String>>,
    joins: RefCell<Vec<FromPath>>,
    fetches: RefCell<Vec<FromPath>>,
    on: RefCell<Option<Predicate>>,
    revision: Revision,
    metadata: Arc<dyn MetadataResolver>,
    ir: Memo<IrExpr>,
}

/// A root, join or fetch.
#[derive(Clone)]
pub struct FromPath(Rc<FromNode>);

pub type Root = FromPath;
pub type Join = FromPath;
pub type Fetch = FromPath;

impl FromPath {
    pub(crate) fn root(
        entity: Arc<EntityType>,
        alias: String,
        metadata: Arc<dyn MetadataResolver>,
    ) -> Self {
        FromPath(Rc::new(FromNode {
            role: FromRole::Root,
            entity,
            attribute: None,
            parent: Weak::new(),
            alias: RefCell::new(Some(alias)),
            joins: RefCell::new(Vec::new()),
            fetches: RefCell::new(Vec::new()),
            on: RefCell::new(None),
            revision: Revision::new(),
            metadata,
            ir: Memo::new(),
        }))
    }

    fn child(&self, role: FromRole, attribute: Attribute, entity: Arc<EntityType>) -> FromPath {
        FromPath(Rc::new(FromNode {
            role,
            entity,
            attribute: Some(attribute),
            parent: Rc::downgrade(&self.0),
            alias: RefCell::new(None),
            joins: RefCell::new(Vec::new()),
            fetches: RefCell::new(Vec::new()),
            on: RefCell::new(None),
            revision: self.0.revision.clone(),
            metadata: Arc::clone(&self.0.metadata),
            ir: Memo::new(),
        }))
    }

    pub fn role(&self) -> FromRole {
        self.0.role
    }

    pub fn is_root(&self) -> bool {
        self.0.role == FromRole::Root
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self.0.role, FromRole::Fetch { .. })
    }

    pub fn plurality(&self) -> Plurality {
        self.0.role.plurality()
    }

    /// Target entity of this node.
    pub fn entity(&self) -> &Arc<EntityType> {
        &self.0.entity
    }

    pub fn entity_name(&self) -> &str {
        &self.0.entity.name
    }

    pub fn attribute(&self) -> Option<&Attribute> {
        self.0.attribute.as_ref()
    }

    /// The parent node, while it is still alive.
    pub fn parent(&self) -> Option<FromPath> {
        self.0.parent.upgrade().map(FromPath)
    }

    pub fn alias(&self) -> Option<String> {
        self.0.alias.borrow().clone()
    }

    /// Assign an alias. Fetch joins cannot be aliased.
    pub fn set_alias(&self, alias: &str) -> CriteriaResult<()> {
        if self.is_fetch() {
            return Err(CriteriaError::invalid("a fetch join cannot be aliased"));
        }
        if alias.is_empty() {
            return Err(CriteriaError::invalid("alias must not be empty"));
        }
        *self.0.alias.borrow_mut() = Some(alias.to_string());
        self.0.revision.bump();
        Ok(())
    }

    pub fn with_alias(self, alias: &str) -> CriteriaResult<Self> {
        self.set_alias(alias)?;
        Ok(self)
    }

    pub fn joins(&self) -> Vec<FromPath> {
        self.0.joins.borrow().clone()
    }

    pub fn fetches(&self) -> Vec<FromPath> {
        self.0.fetches.borrow().clone()
    }

    /// Inner join along `path` (dotted paths join each segment).
    pub fn join(&self, path: &str) -> CriteriaResult<Join> {
        self.join_with(path, JoinType::Inner)
    }

    pub fn left_join(&self, path: &str) -> CriteriaResult<Join> {
        self.join_with(path, JoinType::Left)
    }

    pub fn join_with(&self, path: &str, join_type: JoinType) -> CriteriaResult<Join> {
        self.attach(path, |plurality| FromRole::Join {
            join_type,
            plurality,
        })
    }

    pub fn fetch(&self, path: &str) -> CriteriaResult<Fetch> {
        self.fetch_with(path, JoinType::Inner)
    }

    pub fn fetch_with(&self, path: &str, join_type: JoinType) -> CriteriaResult<Fetch> {
        self.attach(path, |plurality| FromRole::Fetch {
            join_type,
            plurality,
        })
    }

    /// Resolve every segment first, then link one child per segment, so a
    /// bad segment leaves the tree untouched.
    fn attach(&self, path: &str, role: impl Fn(Plurality) -> FromRole) -> CriteriaResult<FromPath> {
        let segments = self.segments(path)?;
        let last = segments.len() - 1;
        let mut owner = Arc::clone(&self.0.entity);
        let mut steps = Vec::with_capacity(segments.len());

        for (i, segment) in segments.into_iter().enumerate() {
            let attribute = owner.attribute(segment).cloned().ok_or_else(|| {
                CriteriaError::UnknownAttribute {
                    owner: owner.name.clone(),
                    attribute: segment.to_string(),
                }
            })?;
            let allowed = if i == last {
                attribute.is_joinable()
            } else {
                attribute.is_relational()
            };
            let target = match (allowed, attribute.target()) {
                (true, Some(target)) => target.to_string(),
                _ => {
                    return Err(CriteriaError::NotNavigable {
                        owner: owner.name.clone(),
                        attribute: segment.to_string(),
                        reason: if i == last {
                            "a basic attribute cannot be joined".into()
                        } else {
                            "only relationships can appear inside a join path".into()
                        },
                    })
                }
            };
            let entity = self.0.metadata.resolve_entity(&target)?;
            owner = Arc::clone(&entity);
            steps.push((attribute, entity));
        }

        let mut current = self.clone();
        for (attribute, entity) in steps {
            let child = current.child(role(attribute.plurality()), attribute, entity);
            if child.is_fetch() {
                current.0.fetches.borrow_mut().push(child.clone());
            } else {
                current.0.joins.borrow_mut().push(child.clone());
            }
            current = child;
        }

        self.0.revision.bump();
        Ok(current)
    }

    /// Restrict this join with an ON condition.
    pub fn on(&self, predicate: Predicate) -> CriteriaResult<Join> {
        match self.0.role {
            FromRole::Join { .. } => {
                *self.0.on.borrow_mut() = Some(predicate);
                self.0.revision.bump();
                Ok(self.clone())
            }
            _ => Err(CriteriaError::invalid(
                "an ON condition can only be placed on a join",
            )),
        }
    }

    pub fn on_condition(&self) -> Option<Predicate> {
        self.0.on.borrow().clone()
    }

    /// Navigate to an attribute. A dotted path whose first segment equals
    /// this node's alias is read relative to this node.
    pub fn get(&self, path: &str) -> CriteriaResult<Expression> {
        let metadata = Arc::clone(&self.0.metadata);
        self.segments(path)?
            .into_iter()
            .try_fold(self.to_expression(), |current, segment| {
                navigate(&current, segment, &metadata)
            })
    }

    /// Map key of a map-valued join.
    pub fn key(&self) -> CriteriaResult<Expression> {
        self.require_map("key")?;
        Err(CriteriaError::unsupported("key() of a map join"))
    }

    /// Map value of a map-valued join.
    pub fn value(&self) -> CriteriaResult<Expression> {
        self.require_map("value")?;
        Err(CriteriaError::unsupported("value() of a map join"))
    }

    fn require_map(&self, what: &str) -> CriteriaResult<()> {
        match self.plurality() {
            Plurality::Plural(CollectionKind::Map) => Ok(()),
            _ => Err(CriteriaError::invalid(format!(
                "{}() requires a map join, '{}' is not one",
                what,
                self.entity_name()
            ))),
        }
    }

    /// Narrow this root to a subtype.
    pub fn treat(&self, entity: &str) -> CriteriaResult<Expression> {
        if !self.is_root() {
            return Err(CriteriaError::unsupported("treat() on a join"));
        }
        let target = self.0.metadata.resolve_entity(entity)?;
        Ok(Expression::dyadic(
            self.to_expression(),
            DyadicOp::Cast,
            Expression::literal(target.name.as_str()),
            ValueType::entity(target.name.as_str()),
        ))
    }

    pub fn to_expression(&self) -> Expression {
        Expression::new(
            ExprKind::From(self.clone()),
            ValueType::entity(self.entity_name()),
        )
    }

    pub fn revision(&self) -> u64 {
        self.0.revision.get()
    }

    pub fn query_expression(&self) -> Rc<IrExpr> {
        self.0.ir.get_or_init(self.revision(), || self.build_ir())
    }

    fn build_ir(&self) -> IrExpr {
        match (self.0.role, self.alias()) {
            (FromRole::Root, alias) => IrExpr::primary(vec![
                alias.unwrap_or_else(|| self.entity_name().to_string())
            ]),
            (_, Some(alias)) => IrExpr::primary(vec![alias]),
            (_, None) => self.navigation_ir(),
        }
    }

    /// `parent.attribute`, regardless of this node's own alias.
    fn navigation_ir(&self) -> IrExpr {
        let name = self
            .0
            .attribute
            .as_ref()
            .map(|a| a.name.clone())
            .unwrap_or_default();
        match self.parent() {
            Some(parent) => extend_primary(&parent.query_expression(), name),
            None => IrExpr::primary(vec![name]),
        }
    }

    /// Every join and fetch below this node, pre-order, joins before fetches.
    pub fn join_chain(&self) -> Vec<FromPath> {
        let mut chain = Vec::new();
        self.collect_joins(&mut chain);
        chain
    }

    fn collect_joins(&self, chain: &mut Vec<FromPath>) {
        for join in self.0.joins.borrow().iter() {
            chain.push(join.clone());
            join.collect_joins(chain);
        }
        for fetch in self.0.fetches.borrow().iter() {
            chain.push(fetch.clone());
            fetch.collect_joins(chain);
        }
    }

    fn join_link(&self, next: Option<Box<JoinExpr>>, with_on: bool) -> Option<JoinExpr> {
        let kind = self.0.role.join_kind()?;
        Some(JoinExpr {
            kind,
            primary: Box::new(self.navigation_ir()),
            alias: self.alias(),
            on: if with_on {
                self.on_condition().map(|p| Box::new(p.query_expression().as_ref().clone()))
            } else {
                None
            },
            next,
        })
    }

    /// FROM-clause IR: a class marker for this root followed by its join chain.
    pub fn from_clause_expression(&self) -> IrExpr {
        let mut next = None;
        for join in self.join_chain().iter().rev() {
            if let Some(link) = join.join_link(next.take(), true) {
                next = Some(Box::new(link));
            }
        }
        IrExpr::Class(ClassExpr {
            entity: self.entity_name().to_string(),
            alias: self
                .alias()
                .unwrap_or_else(|| self.entity_name().to_string()),
            join: next,
        })
    }

    /// `Entity alias[ JOIN ...]...` with ON conditions in predicate text form.
    pub(crate) fn to_text(&self, renderer: &JpqlRenderer) -> CriteriaResult<String> {
        let mut text = format!(
            "{} {}",
            self.entity_name(),
            self.alias()
                .unwrap_or_else(|| self.entity_name().to_string())
        );
        for join in self.join_chain() {
            if let Some(link) = join.join_link(None, false) {
                text.push(' ');
                text.push_str(&renderer.join_tokens(&link)?.serialize());
            }
            if let Some(on) = join.on_condition() {
                text.push_str(" ON ");
                text.push_str(&on.to_text(renderer)?);
            }
        }
        Ok(text)
    }

    fn segments<'p>(&self, path: &'p str) -> CriteriaResult<Vec<&'p str>> {
        let mut segments = split_path(path)?;
        if segments.len() > 1 && self.alias().as_deref() == Some(segments[0]) {
            segments.remove(0);
        }
        Ok(segments)
    }

    pub fn ptr_eq(&self, other: &FromPath) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FromPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromPath")
            .field("role", &self.0.role)
            .field("entity", &self.0.entity.name)
            .field("alias", &self.0.alias.borrow())
            .field("joins", &self.0.joins.borrow())
            .field("fetches", &self.0.fetches.borrow())
            .finish()
    }
}

/// Navigation from an expression to one of its attributes.
#[derive(Clone)]
pub struct PathExpression {
    parent: Box<Expression>,
    attribute: Attribute,
    metadata: Arc<dyn MetadataResolver>,
}

impl PathExpression {
    pub fn parent(&self) -> &Expression {
        &self.parent
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub(crate) fn metadata(&self) -> &Arc<dyn MetadataResolver> {
        &self.metadata
    }

    pub fn revision(&self) -> u64 {
        self.parent.revision()
    }

    pub(crate) fn ir(&self) -> IrExpr {
        extend_primary(&self.parent.query_expression(), self.attribute.name.clone())
    }
}

impl fmt::Debug for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathExpression")
            .field("parent", &self.parent)
            .field("attribute", &self.attribute.name)
            .finish()
    }
}

fn extend_primary(parent: &IrExpr, attribute: String) -> IrExpr {
    match parent {
        IrExpr::Primary { left, tuple, .. } => {
            let mut tuple = tuple.clone();
            tuple.push(attribute);
            IrExpr::Primary {
                left: left.clone(),
                tuple,
                symbol: None,
            }
        }
        other => IrExpr::Primary {
            left: Some(Box::new(other.clone())),
            tuple: vec![attribute],
            symbol: None,
        },
    }
}

/// Split a dotted attribute path, rejecting empty segments.
pub(crate) fn split_path(path: &str) -> CriteriaResult<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(CriteriaError::invalid(format!(
            "'{}' is not a valid attribute path",
            path
        )));
    }
    Ok(segments)
}

/// Step from an entity-typed expression to one of its attributes.
pub(crate) fn navigate(
    parent: &Expression,
    name: &str,
    metadata: &Arc<dyn MetadataResolver>,
) -> CriteriaResult<Expression> {
    let owner = parent
        .value_type()
        .entity_name()
        .ok_or_else(|| CriteriaError::NotNavigable {
            owner: parent.value_type().to_string(),
            attribute: name.to_string(),
            reason: "not a managed type".into(),
        })?;
    let entity = metadata.resolve_entity(owner)?;
    let attribute = entity
        .attribute(name)
        .cloned()
        .ok_or_else(|| CriteriaError::UnknownAttribute {
            owner: owner.to_string(),
            attribute: name.to_string(),
        })?;
    let value_type = attribute.value_type();
    Ok(Expression::new(
        ExprKind::Path(PathExpression {
            parent: Box::new(parent.clone()),
            attribute,
            metadata: Arc::clone(metadata),
        }),
        value_type,
    ))
}
