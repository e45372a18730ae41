//! Symbol tables and IR binding.
//!
//! A [`SymbolTable`] maps aliases to typed symbols and may chain to a parent
//! table (subquery scopes). The [`Binder`] resolves the free identifiers of an
//! IR fragment against a table, producing a bound copy of the fragment.

use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::trace;

use super::expr::{ClassExpr, IrExpr, JoinExpr, OrderExpr, SymbolRef};
use crate::error::{CriteriaError, CriteriaResult};
use crate::metadata::{MetadataResolver, ValueType};

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    /// A FROM alias (candidate or join).
    Identifier,
    Parameter,
    /// A subquery result variable.
    Variable,
}

/// A typed, named entry of a symbol table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub value_type: ValueType,
}

impl Symbol {
    pub fn identifier(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Identifier,
            value_type,
        }
    }

    pub fn parameter(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Parameter,
            value_type,
        }
    }

    pub fn variable(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: SymbolKind::Variable,
            value_type,
        }
    }
}

/// Alias scope, optionally chained to a parent scope.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    order: Vec<String>,
    candidate: Option<String>,
    parent: Option<Rc<SymbolTable>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope whose unresolved identifiers fall back to `parent`.
    pub fn with_parent(parent: Rc<SymbolTable>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<&Rc<SymbolTable>> {
        self.parent.as_ref()
    }

    /// Alias of the candidate of this scope.
    pub fn candidate(&self) -> Option<&str> {
        self.candidate.as_deref()
    }

    /// Register the candidate alias and its identifier symbol.
    pub fn add_candidate(&mut self, alias: &str, value_type: ValueType) -> CriteriaResult<()> {
        self.add(Symbol::identifier(alias, value_type))?;
        self.candidate = Some(alias.to_string());
        Ok(())
    }

    /// Add a symbol; a second declaration of the same name fails.
    pub fn add(&mut self, symbol: Symbol) -> CriteriaResult<()> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(CriteriaError::DuplicateAlias(symbol.name));
        }
        self.order.push(symbol.name.clone());
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Symbol declared in this scope only.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    /// Find a symbol here or in an enclosing scope, with its scope depth.
    pub fn resolve(&self, name: &str) -> Option<(&Symbol, usize)> {
        let mut depth = 0;
        let mut table = self;
        loop {
            if let Some(symbol) = table.symbols.get(name) {
                return Some((symbol, depth));
            }
            table = table.parent.as_deref()?;
            depth += 1;
        }
    }

    /// Symbols of this scope in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter().filter_map(|name| self.symbols.get(name))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Binds IR fragments against a symbol table.
///
/// Identifiers that match no declared symbol in any scope are treated as
/// members of the nearest candidate; they must name an attribute of the
/// candidate's entity.
pub struct Binder<'a> {
    table: &'a mut SymbolTable,
    metadata: &'a dyn MetadataResolver,
}

impl<'a> Binder<'a> {
    pub fn new(table: &'a mut SymbolTable, metadata: &'a dyn MetadataResolver) -> Self {
        Self { table, metadata }
    }

    /// Produce a bound copy of `expr`.
    pub fn bind(&mut self, expr: &IrExpr) -> CriteriaResult<IrExpr> {
        let bound = match expr {
            IrExpr::Literal(_) => expr.clone(),

            IrExpr::Parameter {
                name, value_type, ..
            } => {
                if let Some(name) = name {
                    if self.table.resolve(name).is_none() {
                        self.table
                            .add(Symbol::parameter(name, value_type.clone()))?;
                    }
                }
                expr.clone()
            }

            IrExpr::Primary { left, tuple, .. } => match left {
                Some(left) => IrExpr::Primary {
                    left: Some(Box::new(self.bind(left)?)),
                    tuple: tuple.clone(),
                    symbol: None,
                },
                None => {
                    let head = tuple.first().ok_or_else(|| {
                        CriteriaError::invalid("primary expression with empty identifier")
                    })?;
                    IrExpr::Primary {
                        left: None,
                        tuple: tuple.clone(),
                        symbol: Some(self.resolve_identifier(head)?),
                    }
                }
            },

            IrExpr::Variable { name, .. } => {
                let (_, depth) = self
                    .table
                    .resolve(name)
                    .ok_or_else(|| CriteriaError::UnresolvedSymbol(name.clone()))?;
                IrExpr::Variable {
                    name: name.clone(),
                    symbol: Some(SymbolRef {
                        name: name.clone(),
                        depth,
                        implicit: false,
                    }),
                }
            }

            IrExpr::Dyadic { left, op, right } => IrExpr::Dyadic {
                left: Box::new(self.bind(left)?),
                op: *op,
                right: match right {
                    Some(right) => Some(Box::new(self.bind(right)?)),
                    None => None,
                },
            },

            IrExpr::Invocation {
                target,
                name,
                args,
                distinct,
            } => IrExpr::Invocation {
                target: match target {
                    Some(target) => Some(Box::new(self.bind(target)?)),
                    None => None,
                },
                name: name.clone(),
                args: self.bind_all(args)?,
                distinct: *distinct,
            },

            IrExpr::Creator { type_name, args } => IrExpr::Creator {
                type_name: type_name.clone(),
                args: self.bind_all(args)?,
            },

            IrExpr::Case {
                conditions,
                otherwise,
            } => {
                let mut bound = Vec::with_capacity(conditions.len());
                for (when, then) in conditions {
                    bound.push((self.bind(when)?, self.bind(then)?));
                }
                IrExpr::Case {
                    conditions: bound,
                    otherwise: match otherwise {
                        Some(otherwise) => Some(Box::new(self.bind(otherwise)?)),
                        None => None,
                    },
                }
            }

            IrExpr::Subquery { keyword, variable } => IrExpr::Subquery {
                keyword: *keyword,
                variable: Box::new(self.bind(variable)?),
            },

            IrExpr::Class(class) => IrExpr::Class(ClassExpr {
                entity: class.entity.clone(),
                alias: class.alias.clone(),
                join: match &class.join {
                    Some(join) => Some(Box::new(self.bind_join(join)?)),
                    None => None,
                },
            }),

            IrExpr::Order(order) => IrExpr::Order(OrderExpr {
                expr: Box::new(self.bind(&order.expr)?),
                dir: order.dir,
                nulls: order.nulls,
            }),
        };
        Ok(bound)
    }

    pub fn bind_all(&mut self, exprs: &[IrExpr]) -> CriteriaResult<Vec<IrExpr>> {
        exprs.iter().map(|e| self.bind(e)).collect()
    }

    /// Bind one clause fragment.
    pub fn bind_clause(&mut self, clause: &str, expr: &IrExpr) -> CriteriaResult<IrExpr> {
        let bound = self.bind(expr)?;
        trace!(clause, ?bound, "bound clause");
        Ok(bound)
    }

    fn bind_join(&mut self, join: &JoinExpr) -> CriteriaResult<JoinExpr> {
        Ok(JoinExpr {
            kind: join.kind,
            primary: Box::new(self.bind(&join.primary)?),
            alias: join.alias.clone(),
            on: match &join.on {
                Some(on) => Some(Box::new(self.bind(on)?)),
                None => None,
            },
            next: match &join.next {
                Some(next) => Some(Box::new(self.bind_join(next)?)),
                None => None,
            },
        })
    }

    fn resolve_identifier(&self, head: &str) -> CriteriaResult<SymbolRef> {
        if let Some((_, depth)) = self.table.resolve(head) {
            return Ok(SymbolRef {
                name: head.to_string(),
                depth,
                implicit: false,
            });
        }

        // Member of the nearest candidate.
        let mut depth = 0;
        let mut scope = Some(&*self.table);
        while let Some(table) = scope {
            if let Some(candidate) = table.candidate() {
                let entity = table
                    .get(candidate)
                    .and_then(|symbol| symbol.value_type.entity_name())
                    .and_then(|name| self.metadata.entity(name));
                if let Some(entity) = entity {
                    if entity.attribute(head).is_some() {
                        return Ok(SymbolRef {
                            name: candidate.to_string(),
                            depth,
                            implicit: true,
                        });
                    }
                }
            }
            scope = table.parent.as_deref();
            depth += 1;
        }

        Err(CriteriaError::UnresolvedSymbol(head.to_string()))
    }
}
