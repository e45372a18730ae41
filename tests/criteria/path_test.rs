//! Integration tests for roots, joins and attribute navigation.

mod common;

use critql::criteria::{FromRole, JoinType};
use critql::error::CriteriaError;
use critql::metadata::{CollectionKind, Plurality, ValueType};
use critql::render::render;
use insta::assert_snapshot;

use common::builder;

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_dotted_get_extends_tuple() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let city = person.get("address.country.code").unwrap();
    assert_eq!(city.value_type(), &ValueType::String);
    assert_eq!(
        city.query_expression().bare_tuple().unwrap(),
        ["DN_THIS", "address", "country", "code"]
    );
    assert_eq!(
        render(&city.query_expression()).unwrap(),
        "DN_THIS.address.country.code"
    );
}

#[test]
fn test_step_by_step_get_matches_dotted_get() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let stepped = person
        .get("address")
        .and_then(|a| a.get("city"))
        .unwrap();
    let dotted = person.get("address.city").unwrap();
    assert_eq!(*stepped.query_expression(), *dotted.query_expression());
}

#[test]
fn test_leading_alias_segment_is_consumed() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let qualified = person.get("DN_THIS.name").unwrap();
    let plain = person.get("name").unwrap();
    assert_eq!(*qualified.query_expression(), *plain.query_expression());
}

#[test]
fn test_alias_matching_attribute_name_shadows_the_attribute() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Address"));
    let address = query.from("Address").unwrap();
    address.set_alias("country").unwrap();

    // "country" is read as the alias, so "code" is looked up on Address.
    let err = address.get("country.code").unwrap_err();
    assert_eq!(
        err,
        CriteriaError::UnknownAttribute {
            owner: "Address".into(),
            attribute: "code".into()
        }
    );

    // A single segment is always an attribute.
    let country = address.get("country").unwrap();
    assert_eq!(country.value_type(), &ValueType::entity("Country"));
}

#[test]
fn test_navigation_from_non_path_expression() {
    let cb = builder();
    let param = cb.parameter(ValueType::entity("Person"), "who");
    let name = cb.get(&param, "address.city").unwrap();
    assert_eq!(render(&name.query_expression()).unwrap(), ":who.address.city");

    let err = param.get("name").unwrap_err();
    assert!(matches!(err, CriteriaError::NotNavigable { .. }));
}

#[test]
fn test_navigating_a_basic_value_fails() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let err = person.get("name.length").unwrap_err();
    assert!(err.is_illegal_argument());
    assert!(matches!(err, CriteriaError::NotNavigable { .. }));
}

// ============================================================================
// Roots
// ============================================================================

#[test]
fn test_unknown_entity_is_rejected_immediately() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::Object);
    let err = query.from("Spaceship").unwrap_err();
    assert_eq!(err, CriteriaError::NotAnEntity("Spaceship".into()));
    assert!(err.is_illegal_argument());
    assert!(query.roots().is_empty());
}

#[test]
fn test_treat_root() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let narrowed = person.treat("Person").unwrap();
    assert_eq!(narrowed.value_type(), &ValueType::entity("Person"));
    assert_eq!(
        render(&narrowed.query_expression()).unwrap(),
        "TREAT(DN_THIS AS Person)"
    );

    let employer = person.get("employer").unwrap();
    let cast = cb.treat(&employer, "Company").unwrap();
    assert_eq!(
        render(&cast.query_expression()).unwrap(),
        "TREAT(DN_THIS.employer AS Company)"
    );
}

// ============================================================================
// Joins
// ============================================================================

#[test]
fn test_join_roles_follow_attribute_plurality() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let address = person.join("address").unwrap();
    let orders = person.join_with("orders", JoinType::Right).unwrap();
    assert_eq!(
        address.role(),
        FromRole::Join {
            join_type: JoinType::Inner,
            plurality: Plurality::Singular
        }
    );
    assert_eq!(
        orders.plurality(),
        Plurality::Plural(CollectionKind::List)
    );
    assert!(address.parent().unwrap().ptr_eq(&person));
}

#[test]
fn test_chained_join_creates_one_join_per_segment() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let country = person.join("address.country").unwrap();
    assert_eq!(country.entity_name(), "Country");
    let chain = person.join_chain();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].entity_name(), "Address");
    assert!(chain[1].ptr_eq(&country));

    assert_snapshot!(
        query.to_jpql().unwrap().as_str(),
        @"SELECT FROM Person DN_THIS JOIN DN_THIS.address JOIN DN_THIS.address.country"
    );
}

#[test]
fn test_non_relational_join_segment_is_rejected() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let err = person.join("name.first").unwrap_err();
    assert!(err.is_illegal_argument());
    let err = person.join("address.city").unwrap_err();
    assert_eq!(
        err,
        CriteriaError::NotNavigable {
            owner: "Address".into(),
            attribute: "city".into(),
            reason: "a basic attribute cannot be joined".into()
        }
    );
    assert!(person.joins().is_empty());
    let err = person.join("pets").unwrap_err();
    assert!(matches!(err, CriteriaError::UnknownAttribute { .. }));
}

#[test]
fn test_joins_render_in_insertion_order() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    person.left_join("orders").unwrap().set_alias("o").unwrap();
    person.join("address").unwrap().set_alias("a").unwrap();
    person.fetch("phones").unwrap();

    assert_snapshot!(
        query.to_jpql().unwrap().as_str(),
        @"SELECT FROM Person DN_THIS LEFT JOIN DN_THIS.orders o JOIN DN_THIS.address a JOIN FETCH DN_THIS.phones"
    );
}

#[test]
fn test_join_alias_drives_child_navigation() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let address = person.join("address").unwrap().with_alias("a").unwrap();
    address.join("country").unwrap().set_alias("c").unwrap();
    let code = address.get("country.code").unwrap();
    assert_eq!(render(&code.query_expression()).unwrap(), "a.country.code");

    assert_snapshot!(
        query.to_jpql().unwrap().as_str(),
        @"SELECT FROM Person DN_THIS JOIN DN_THIS.address a JOIN a.country c"
    );
}

#[test]
fn test_join_on_condition() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let orders = person.left_join("orders").unwrap().with_alias("o").unwrap();
    orders.on(cb.gt(orders.get("total").unwrap(), 100)).unwrap();
    assert!(orders.on_condition().is_some());

    assert_snapshot!(
        query.to_jpql().unwrap().as_str(),
        @"SELECT FROM Person DN_THIS LEFT JOIN DN_THIS.orders o ON (o.total > 100)"
    );

    let err = person.on(cb.conjunction()).unwrap_err();
    assert!(err.is_illegal_argument());
}

#[test]
fn test_fetch_joins_are_not_aliasable() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();

    let phones = person.fetch_with("phones", JoinType::Left).unwrap();
    assert!(phones.is_fetch());
    assert!(person.joins().is_empty());
    assert_eq!(person.fetches().len(), 1);
    assert!(phones.set_alias("ph").unwrap_err().is_illegal_argument());

    assert_snapshot!(
        query.to_jpql().unwrap().as_str(),
        @"SELECT FROM Person DN_THIS LEFT JOIN FETCH DN_THIS.phones"
    );
}

#[test]
fn test_map_key_and_value_are_unsupported() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Company"));
    let company = query.from("Company").unwrap();

    let departments = company.join("departments").unwrap();
    assert_eq!(
        departments.plurality(),
        Plurality::Plural(CollectionKind::Map)
    );
    assert!(departments.key().unwrap_err().is_unsupported());
    assert!(departments.value().unwrap_err().is_unsupported());

    let employees = company.join("employees").unwrap();
    assert!(employees.key().unwrap_err().is_illegal_argument());
}

#[test]
fn test_treat_on_join_is_unsupported() {
    let cb = builder();
    let mut query = cb.create_query(ValueType::entity("Person"));
    let person = query.from("Person").unwrap();
    let employer = person.join("employer").unwrap();

    let err = employer.treat("Company").unwrap_err();
    assert!(err.is_unsupported());
    let err = cb.treat(&employer.to_expression(), "Company").unwrap_err();
    assert!(err.is_unsupported());
}
