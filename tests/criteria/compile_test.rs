//! Integration tests for query compilation: candidate, symbol table and
//! clause binding.

mod common;

use std::rc::Rc;
use std::sync::Arc;

use critql::config::QuerySettings;
use critql::criteria::{CriteriaBuilder, CriteriaQuery};
use critql::error::CriteriaError;
use critql::ir::{DyadicOp, IrExpr, StatementKind, Symbol, SymbolKind, SymbolRef};
use critql::metadata::ValueType;
use insta::assert_snapshot;

use common::{builder, model};

fn symbol_of(expr: &IrExpr) -> Option<&SymbolRef> {
    match expr {
        IrExpr::Primary { symbol, .. } => symbol.as_ref(),
        _ => None,
    }
}

// ============================================================================
// Candidate and result
// ============================================================================

#[test]
fn test_candidate_from_first_root() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    query
        .filter(cb.gt(person.get("age").unwrap(), 18))
        .order_by([cb.asc(person.get("name").unwrap())]);

    let compiled = query.compilation().unwrap();
    assert_eq!(compiled.language, "JPQL");
    assert_eq!(compiled.kind, StatementKind::Select);
    assert_eq!(compiled.candidate, "Person");
    assert_eq!(compiled.candidate_alias, "DN_THIS");
    assert!(compiled.result.is_none());
    assert!(!compiled.is_subquery());
    assert!(!compiled.distinct);
    assert_eq!(compiled.from.len(), 1);
    assert!(matches!(&compiled.from[0], IrExpr::Class(class) if class.alias == "DN_THIS"));

    let symbol = compiled.symbols.get("DN_THIS").unwrap();
    assert_eq!(symbol.kind, SymbolKind::Identifier);
    assert_eq!(symbol.value_type, ValueType::entity("Person"));
    assert_eq!(compiled.symbols.candidate(), Some("DN_THIS"));

    match compiled.filter.as_ref().unwrap() {
        IrExpr::Dyadic { left, op, .. } => {
            assert_eq!(*op, DyadicOp::Gt);
            assert_eq!(
                symbol_of(left),
                Some(&SymbolRef {
                    name: "DN_THIS".into(),
                    depth: 0,
                    implicit: false
                })
            );
        }
        other => panic!("unexpected {:?}", other),
    }

    let ordering = compiled.ordering.as_ref().unwrap();
    assert_eq!(ordering.len(), 1);
    assert!(matches!(ordering[0], IrExpr::Order(_)));
}

#[test]
fn test_selecting_the_root_is_the_same_as_selecting_nothing() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let implicit = query.compilation().unwrap();
    query.select(&person);
    let explicit = query.compilation().unwrap();
    assert!(implicit.result.is_none());
    assert!(explicit.result.is_none());

    query.select(person.get("name").unwrap());
    let projected = query.compilation().unwrap();
    assert_eq!(projected.result.as_ref().map(Vec::len), Some(1));

    query.multiselect([person.to_expression(), person.get("age").unwrap()]);
    let both = query.compilation().unwrap();
    assert_eq!(both.result.as_ref().map(Vec::len), Some(2));
}

#[test]
fn test_missing_root() {
    let cb = builder();
    let query = cb.create_query(ValueType::Object);
    assert_eq!(
        query.compilation().unwrap_err(),
        CriteriaError::MissingCandidate
    );
}

// ============================================================================
// Symbols
// ============================================================================

#[test]
fn test_join_aliases_are_declared_before_binding() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    // The filter is set before the join it refers to exists.
    let address = person.join("address").unwrap();
    query.filter(cb.equal(address.get("city").unwrap(), "Oslo"));
    address.set_alias("a").unwrap();
    person.fetch("orders").unwrap();

    let compiled = query.compilation().unwrap();
    let symbol = compiled.symbols.get("a").unwrap();
    assert_eq!(symbol.value_type, ValueType::entity("Address"));
    assert_eq!(compiled.symbols.len(), 2);

    match compiled.filter.as_ref().unwrap() {
        IrExpr::Dyadic { left, .. } => {
            assert_eq!(left.bare_tuple().unwrap(), ["a", "city"]);
            assert_eq!(symbol_of(left).unwrap().name, "a");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_duplicate_alias_fails_compilation() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    person.join("address").unwrap().set_alias("x").unwrap();
    person.join("employer").unwrap().set_alias("x").unwrap();

    assert_eq!(
        query.compilation().unwrap_err(),
        CriteriaError::DuplicateAlias("x".into())
    );
}

#[test]
fn test_second_root_is_declared() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::Object);
    let person = query.from("Person").unwrap();
    let order = query.from("Order").unwrap();
    query.filter(cb.equal(order.get("customer").unwrap(), &person));

    let compiled = query.compilation().unwrap();
    assert_eq!(compiled.candidate, "Person");
    assert_eq!(compiled.from.len(), 2);
    assert_eq!(
        compiled.symbols.get("DN_THIS1").map(|s| s.value_type.clone()),
        Some(ValueType::entity("Order"))
    );
}

#[test]
fn test_foreign_alias_is_unresolved() {
    let other = CriteriaBuilder::with_settings(
        Arc::new(model()),
        QuerySettings {
            default_alias: "q".into(),
            ..QuerySettings::default()
        },
    );
    let mut foreign = other.create_query(ValueType::entity("Person"));
    let stranger = foreign.from("Person").unwrap();

    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    query.from("Person").unwrap();
    query.filter(cb.gt(stranger.get("age").unwrap(), 1));

    assert_eq!(
        query.compilation().unwrap_err(),
        CriteriaError::UnresolvedSymbol("q".into())
    );
}

#[test]
fn test_named_parameters_become_symbols() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    query.filter(cb.and([
        cb.ge(person.get("age").unwrap(), cb.parameter(ValueType::Integer, "minAge")),
        cb.equal(person.get("name").unwrap(), cb.positional_parameter(ValueType::String, 1)),
        cb.le(person.get("age").unwrap(), cb.parameter(ValueType::Integer, "minAge")),
    ]));

    let parameters = query.parameters().unwrap();
    assert_eq!(
        parameters,
        [Symbol::parameter("minAge", ValueType::Integer)]
    );
}

#[test]
fn test_custom_settings() {
    let cb = CriteriaBuilder::with_settings(
        Arc::new(model()),
        QuerySettings {
            default_alias: "p".into(),
            language: "JDOQL".into(),
            ..QuerySettings::default()
        },
    );
    let mut query = cb.create_query(ValueType::entity("Person"));
    query.from("Person").unwrap();

    let compiled = query.compilation().unwrap();
    assert_eq!(compiled.language, "JDOQL");
    assert_eq!(compiled.candidate_alias, "p");
    assert_snapshot!(query.to_jpql().unwrap().as_str(), @"SELECT FROM Person p");
}

// ============================================================================
// Caching
// ============================================================================

#[test]
fn test_compilation_is_cached_until_mutation() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    query.filter(cb.gt(person.get("age").unwrap(), 18));

    let first = query.compilation().unwrap();
    let again = query.compilation().unwrap();
    assert!(Rc::ptr_eq(&first, &again));

    query.filter(cb.gt(person.get("age").unwrap(), 21));
    let refiltered = query.compilation().unwrap();
    assert!(!Rc::ptr_eq(&first, &refiltered));

    person.join("address").unwrap().set_alias("a").unwrap();
    let rejoined = query.compilation().unwrap();
    assert!(!Rc::ptr_eq(&refiltered, &rejoined));
    assert!(rejoined.symbols.has_symbol("a"));
}

#[test]
fn test_text_is_cached_until_mutation() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    let age = person.get("age").unwrap();

    query.filter(cb.gt(&age, 18));
    let s1 = query.to_jpql().unwrap();
    assert!(Rc::ptr_eq(&s1, &query.to_jpql().unwrap()));

    query.filter(cb.gt(&age, 30));
    let s2 = query.to_jpql().unwrap();
    assert_ne!(s1, s2);

    // Dropping a clause must not bring back an older cached text.
    query.filter_all([]);
    let s3 = query.to_jpql().unwrap();
    assert_eq!(s3.as_str(), "SELECT FROM Person DN_THIS");
    query.filter(cb.gt(&age, 18));
    assert_eq!(*query.to_jpql().unwrap(), *s1);
}

/// Run `change` and check that both the compilation and the text moved.
fn assert_invalidates(query: &mut CriteriaQuery, change: impl FnOnce(&mut CriteriaQuery)) {
    let compiled = query.compilation().unwrap();
    let text = query.to_jpql().unwrap();
    change(query);
    assert!(!Rc::ptr_eq(&compiled, &query.compilation().unwrap()));
    assert_ne!(*text, *query.to_jpql().unwrap());
}

#[test]
fn test_every_select_setter_invalidates_caches() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::Object);
    let person = query.from("Person").unwrap();
    let name = person.get("name").unwrap();
    let age = person.get("age").unwrap();

    assert_invalidates(&mut query, |q| {
        q.select(&name);
    });
    assert_invalidates(&mut query, |q| {
        q.multiselect([&name, &age]);
    });
    assert_invalidates(&mut query, |q| {
        q.distinct(true);
    });
    assert_invalidates(&mut query, |q| {
        q.group_by([&name, &age]);
    });
    assert_invalidates(&mut query, |q| {
        q.having(cb.gt(cb.count(&age), 1));
    });
    assert_invalidates(&mut query, |q| {
        q.order_by([cb.asc(&name)]);
    });

    assert_snapshot!(
        query.to_jpql().unwrap().as_str(),
        @"SELECT DISTINCT DN_THIS.name, DN_THIS.age FROM Person DN_THIS GROUP BY DN_THIS.name, DN_THIS.age HAVING (COUNT(DN_THIS.age) > 1) ORDER BY DN_THIS.name ASC"
    );
}

#[test]
fn test_update_set_invalidates_caches() {
    let cb = builder();
    let mut update = cb.create_update("Employee").unwrap();
    let salary = update.root().get("salary").unwrap();
    update.set(&salary, 100);

    let compiled = update.compilation().unwrap();
    let text = update.to_jpql().unwrap();
    update.set_attribute("name", "Ann").unwrap();

    let recompiled = update.compilation().unwrap();
    assert!(!Rc::ptr_eq(&compiled, &recompiled));
    assert_eq!(recompiled.update.as_ref().map(Vec::len), Some(2));
    assert_ne!(*text, *update.to_jpql().unwrap());
}

#[test]
fn test_expression_ir_is_reference_stable() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    let name = cb.upper(person.get("name").unwrap());

    assert!(Rc::ptr_eq(&name.query_expression(), &name.query_expression()));
}

// ============================================================================
// UPDATE and DELETE
// ============================================================================

#[test]
fn test_update_compiles_assignments() {
    let cb = builder();
    let mut update = cb.create_update("Employee").unwrap();
    let salary = update.root().get("salary").unwrap();
    update.set(&salary, 100);

    let compiled = update.compilation().unwrap();
    assert_eq!(compiled.kind, StatementKind::Update);
    assert_eq!(compiled.candidate, "Employee");
    let assignments = compiled.update.as_ref().unwrap();
    assert_eq!(assignments.len(), 1);
    match &assignments[0] {
        IrExpr::Dyadic { left, op, right } => {
            assert_eq!(*op, DyadicOp::Eq);
            assert_eq!(symbol_of(left).unwrap().name, "DN_THIS");
            assert_eq!(**right.as_ref().unwrap(), IrExpr::literal(100));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert_snapshot!(
        update.to_jpql().unwrap().as_str(),
        @"UPDATE Employee DN_THIS SET DN_THIS.salary = 100"
    );
}

#[test]
fn test_update_with_filter_and_string_value() {
    let cb = builder();
    let mut update = cb.create_update("Employee").unwrap();
    let root = update.root().clone();
    update
        .set_attribute("name", "O'Neil")
        .unwrap()
        .set_attribute("salary", cb.prod(root.get("salary").unwrap(), 2))
        .unwrap()
        .filter(cb.is_null(root.get("manager").unwrap()));

    assert_snapshot!(
        update.to_jpql().unwrap().as_str(),
        @"UPDATE Employee DN_THIS SET DN_THIS.name = 'O''Neil', DN_THIS.salary = (DN_THIS.salary * 2) WHERE (DN_THIS.manager IS NULL)"
    );
    assert!(update.set_attribute("bonus", 1).is_err());
}

#[test]
fn test_update_without_assignments_is_rejected() {
    let cb = builder();
    let update = cb.create_update("Employee").unwrap();

    assert!(update.to_jpql().unwrap_err().is_illegal_argument());
    assert!(update.compilation().unwrap_err().is_illegal_argument());
}

#[test]
fn test_delete() {
    let cb = builder();
    let mut delete = cb.create_delete("Employee").unwrap();
    let salary = delete.root().get("salary").unwrap();
    delete.filter(cb.lt(&salary, 10));

    let compiled = delete.compilation().unwrap();
    assert_eq!(compiled.kind, StatementKind::Delete);
    assert!(compiled.update.is_none());
    assert!(compiled.filter.is_some());

    assert_snapshot!(
        delete.to_jpql().unwrap().as_str(),
        @"DELETE FROM Employee DN_THIS WHERE (DN_THIS.salary < 10)"
    );
    assert!(cb.create_delete("Nothing").unwrap_err().is_illegal_argument());
}

#[test]
fn test_compilation_json_dump() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    query.filter(cb.equal(person.get("status").unwrap(), "A"));

    let json = query.compilation().unwrap().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["candidate"], "Person");
    assert_eq!(value["candidate_alias"], "DN_THIS");
    assert_eq!(value["kind"], "Select");
    assert!(value["filter"].is_object());
}
