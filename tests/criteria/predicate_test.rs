//! Integration tests for predicate composition and comparison builders.

mod common;

use std::rc::Rc;

use critql::criteria::{BooleanOperator, CriteriaBuilder, CriteriaQuery, Predicate, Root};
use critql::ir::{DyadicOp, IrExpr};
use critql::metadata::ValueType;
use critql::render::render;
use insta::assert_snapshot;

use common::builder;

fn person_query(cb: &CriteriaBuilder) -> (CriteriaQuery, Root) {
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    (query, person)
}

fn where_text(query: &mut CriteriaQuery, predicate: Predicate) -> String {
    query.filter(predicate);
    query.to_jpql().unwrap().as_str().to_string()
}

// ============================================================================
// Comparisons
// ============================================================================

#[test]
fn test_equal_renders_parenthesized_infix() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let text = where_text(&mut query, cb.equal(person.get("age").unwrap(), 30));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE (DN_THIS.age = 30)");
}

#[test]
fn test_null_checks_use_is_null_syntax() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let name = person.get("name").unwrap();

    let text = where_text(&mut query, cb.is_null(&name));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE (DN_THIS.name IS NULL)");

    let text = where_text(&mut query, name.is_not_null());
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE (DN_THIS.name IS NOT NULL)");

    // Still an equality against a null literal in the IR.
    match &*cb.is_null(&name).query_expression() {
        IrExpr::Dyadic { op, right, .. } => {
            assert_eq!(*op, DyadicOp::Eq);
            assert!(right.as_ref().unwrap().is_null_literal());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_ordering_comparisons() {
    let cb = builder();
    let (_, person) = person_query(&cb);
    let age = person.get("age").unwrap();

    let rendered: Vec<String> = [
        cb.gt(&age, 1),
        cb.ge(&age, 2),
        cb.lt(&age, 3),
        cb.le(&age, 4),
        cb.not_equal(&age, 5),
    ]
    .iter()
    .map(|p| render(&p.query_expression()).unwrap())
    .collect();
    assert_eq!(
        rendered,
        [
            "(DN_THIS.age > 1)",
            "(DN_THIS.age >= 2)",
            "(DN_THIS.age < 3)",
            "(DN_THIS.age <= 4)",
            "(DN_THIS.age <> 5)",
        ]
    );
}

#[test]
fn test_between_is_composed_eagerly() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let age = person.get("age").unwrap();

    let between = cb.between(&age, 18, 65);
    assert!(between.children().is_empty());
    let explicit = cb.and([cb.ge(&age, 18), cb.le(&age, 65)]);
    assert_eq!(*between.query_expression(), *explicit.query_expression());

    query.filter(between);
    let from_between = query.compilation().unwrap().filter.clone();
    query.filter(explicit);
    let from_and = query.compilation().unwrap().filter.clone();
    assert_eq!(from_between, from_and);

    let text = where_text(&mut query, cb.between(&age, 18, 65));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE ((DN_THIS.age >= 18) AND (DN_THIS.age <= 65))");
}

#[test]
fn test_like_with_and_without_escape() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let name = person.get("name").unwrap();

    let text = where_text(&mut query, cb.like(&name, "A%"));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE DN_THIS.name LIKE 'A%'");

    let text = where_text(&mut query, cb.like_escape(&name, "100!%", '!'));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE DN_THIS.name LIKE '100!%' ESCAPE '!'");

    let text = where_text(&mut query, cb.not_like(&name, "A%"));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE !(DN_THIS.name LIKE 'A%')");
}

#[test]
fn test_boolean_tests() {
    let cb = builder();
    let (_, person) = person_query(&cb);
    let active = person.get("active").unwrap();

    assert_eq!(
        render(&cb.is_true(&active).query_expression()).unwrap(),
        "(DN_THIS.active = TRUE)"
    );
    assert_eq!(
        render(&cb.is_false(&active).query_expression()).unwrap(),
        "(DN_THIS.active = FALSE)"
    );
}

#[test]
fn test_membership_and_emptiness() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let phones = person.get("phones").unwrap();
    let phone = cb.parameter(ValueType::entity("Phone"), "phone");

    let text = where_text(&mut query, cb.is_member(&phone, &phones));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE :phone MEMBER OF DN_THIS.phones");

    let text = where_text(&mut query, cb.is_not_member(&phone, &phones));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE !(:phone MEMBER OF DN_THIS.phones)");

    let text = where_text(&mut query, cb.is_empty(person.get("orders").unwrap()));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE DN_THIS.orders IS EMPTY");

    let text = where_text(&mut query, cb.is_not_empty(person.get("orders").unwrap()));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE !(DN_THIS.orders IS EMPTY)");
}

// ============================================================================
// Value lists
// ============================================================================

#[test]
fn test_in_values_is_an_or_chain_of_equalities() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let status = person.get("status").unwrap();

    let text = where_text(&mut query, cb.in_values(&status, ["A", "B"]));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE (DN_THIS.status = 'A') OR (DN_THIS.status = 'B')");

    let text = where_text(&mut query, cb.not(status.in_values(["A", "B"])));
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE !((DN_THIS.status = 'A') OR (DN_THIS.status = 'B'))");

    match &*status.in_values(["A", "B"]).query_expression() {
        IrExpr::Dyadic { left, op, right } => {
            assert_eq!(*op, DyadicOp::Or);
            assert!(matches!(**left, IrExpr::Dyadic { op: DyadicOp::Eq, .. }));
            assert!(matches!(
                right.as_deref(),
                Some(IrExpr::Dyadic { op: DyadicOp::Eq, .. })
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_in_values_grows_with_value() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let status = person.get("status").unwrap();

    let predicate = status.in_values(Vec::<&str>::new()).value("X").value("Y");
    let text = where_text(&mut query, predicate);
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE (DN_THIS.status = 'X') OR (DN_THIS.status = 'Y')");
}

// ============================================================================
// Composition and negation
// ============================================================================

#[test]
fn test_composites_keep_argument_order() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let age = person.get("age").unwrap();
    let name = person.get("name").unwrap();

    let predicate = cb.and([
        cb.gt(&age, 18),
        cb.or([cb.equal(&name, "Ann"), cb.equal(&name, "Bob")]),
        cb.is_not_null(&name),
    ]);
    assert_eq!(predicate.operator(), BooleanOperator::And);
    assert_eq!(predicate.children().len(), 3);

    let text = where_text(&mut query, predicate);
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE (DN_THIS.age > 18) AND ((DN_THIS.name = 'Ann') OR (DN_THIS.name = 'Bob')) AND (DN_THIS.name IS NOT NULL)");
}

#[test]
fn test_two_expression_and_is_a_leaf() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let active = person.get("active").unwrap();

    let leaf = cb.and_expr(&active, true);
    assert!(leaf.children().is_empty());
    let text = where_text(&mut query, leaf);
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE (DN_THIS.active AND TRUE)");

    let composite = cb.and([cb.is_true(&active), cb.is_true(true)]);
    assert_eq!(composite.children().len(), 2);
}

#[test]
fn test_double_negation_is_identity() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let predicate = cb.gt(person.get("age").unwrap(), 18);

    let twice = cb.not(cb.not(predicate.clone()));
    assert!(!twice.is_negated());
    assert_eq!(*twice.query_expression(), *predicate.query_expression());

    let original = where_text(&mut query, predicate);
    let restored = where_text(&mut query, twice);
    assert_eq!(original, restored);
}

#[test]
fn test_negated_composite_wraps_whole_fold() {
    let cb = builder();
    let (mut query, person) = person_query(&cb);
    let age = person.get("age").unwrap();

    let predicate = !cb.or([cb.lt(&age, 18), cb.gt(&age, 65)]);
    match &*predicate.query_expression() {
        IrExpr::Dyadic {
            op: DyadicOp::Not,
            left,
            right: None,
        } => assert!(matches!(**left, IrExpr::Dyadic { op: DyadicOp::Or, .. })),
        other => panic!("unexpected {:?}", other),
    }
    let text = where_text(&mut query, predicate);
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE !((DN_THIS.age < 18) OR (DN_THIS.age > 65))");
}

#[test]
fn test_conjunction_and_disjunction() {
    let cb = builder();
    let (mut query, _) = person_query(&cb);

    let text = where_text(&mut query, cb.conjunction());
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE TRUE");
    let text = where_text(&mut query, cb.disjunction());
    assert_snapshot!(text, @"SELECT FROM Person DN_THIS WHERE FALSE");
}

#[test]
fn test_predicate_ir_is_reference_stable() {
    let cb = builder();
    let (_, person) = person_query(&cb);
    let predicate = cb.and([cb.gt(person.get("age").unwrap(), 18), cb.is_true(true)]);

    let first = predicate.query_expression();
    let second = predicate.query_expression();
    assert!(Rc::ptr_eq(&first, &second));

    person.set_alias("p").unwrap();
    let renamed = predicate.query_expression();
    assert!(!Rc::ptr_eq(&first, &renamed));
    assert_eq!(
        render(&renamed).unwrap(),
        "((p.age > 18) AND (TRUE = TRUE))"
    );
}
