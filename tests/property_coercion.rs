//! Catalog-driven property typing: Numeric, DateTime and Boolean property
//! accesses are coerced at their materialized access point.

use std::sync::Arc;

use aqlc::schema::{MemoryPropertyCatalog, PropertyKind, PropertyOwner};
use aqlc::{Compiler, CompilerConfig, QueryOptions};

const TENANT: u64 = 7;

fn catalog() -> MemoryPropertyCatalog {
    MemoryPropertyCatalog::new()
        .define(TENANT, PropertyOwner::Event, "$screen_width", PropertyKind::Numeric)
        .define(TENANT, PropertyOwner::Event, "$screen_height", PropertyKind::Numeric)
        .define(TENANT, PropertyOwner::Event, "bool", PropertyKind::Boolean)
        .define(TENANT, PropertyOwner::Person, "tickets", PropertyKind::Numeric)
        .define(
            TENANT,
            PropertyOwner::Person,
            "provided_timestamp",
            PropertyKind::DateTime,
        )
        .define(
            TENANT,
            PropertyOwner::Person,
            "$initial_browser",
            PropertyKind::String,
        )
}

fn compiler() -> Compiler {
    Compiler::new(CompilerConfig::default())
        .unwrap()
        .with_catalog(Arc::new(catalog()))
}

fn compile(source: &str) -> String {
    compiler()
        .compile(source, &QueryOptions::for_tenant(TENANT))
        .unwrap()
        .backend_sql
}

#[test]
fn numeric_event_properties_multiply_as_floats() {
    let sql = compile("select properties.$screen_width * properties.$screen_height from events");
    assert_eq!(
        sql,
        "SELECT multiply(\
         toFloat64OrNull(replaceRegexpAll(JSONExtractRaw(events.properties, %(hogql_val_0)s), '^\"|\"$', '')), \
         toFloat64OrNull(replaceRegexpAll(JSONExtractRaw(events.properties, %(hogql_val_1)s), '^\"|\"$', ''))) \
         FROM events WHERE equals(events.team_id, 7) LIMIT 100"
    );
}

#[test]
fn boolean_event_property_compares_against_true() {
    let compiled = compiler()
        .compile(
            "select properties.bool from events",
            &QueryOptions::for_tenant(TENANT),
        )
        .unwrap();
    assert_eq!(
        compiled.backend_sql,
        "SELECT equals(replaceRegexpAll(JSONExtractRaw(events.properties, %(hogql_val_0)s), '^\"|\"$', ''), %(hogql_val_1)s) \
         FROM events WHERE equals(events.team_id, 7) LIMIT 100"
    );
    assert_eq!(
        compiled.bound_values.get("hogql_val_1").unwrap(),
        &aqlc::aql_parser::ast::ConstantValue::String("true".to_string())
    );
}

#[test]
fn person_properties_coerce_per_declared_kind() {
    let sql = compile(
        "select properties.tickets, properties.provided_timestamp, properties.$initial_browser from persons",
    );
    assert_eq!(
        sql,
        "SELECT toFloat64OrNull(replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_0)s), '^\"|\"$', '')), \
         parseDateTimeBestEffort(replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_1)s), '^\"|\"$', '')), \
         replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_2)s), '^\"|\"$', '') \
         FROM person WHERE equals(person.team_id, 7) LIMIT 100"
    );
}

#[test]
fn rollup_properties_coerce_inside_arg_max() {
    let sql = compile("select properties.$screen_width * person.properties.tickets from events");
    assert_eq!(
        sql,
        "SELECT multiply(\
         toFloat64OrNull(replaceRegexpAll(JSONExtractRaw(events.properties, %(hogql_val_0)s), '^\"|\"$', '')), \
         events__pdi__person.properties___tickets) \
         FROM events INNER JOIN (SELECT argMax(person_distinct_id2.person_id, person_distinct_id2.version) AS person_id, \
         person_distinct_id2.distinct_id FROM person_distinct_id2 WHERE equals(person_distinct_id2.team_id, 7) \
         GROUP BY person_distinct_id2.distinct_id HAVING equals(argMax(person_distinct_id2.is_deleted, person_distinct_id2.version), 0)) \
         AS events__pdi ON equals(events.distinct_id, events__pdi.distinct_id) \
         INNER JOIN (SELECT argMax(toFloat64OrNull(replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_1)s), '^\"|\"$', '')), person.version) \
         AS properties___tickets, person.id FROM person WHERE equals(person.team_id, 7) \
         GROUP BY person.id HAVING equals(argMax(person.is_deleted, person.version), 0)) \
         AS events__pdi__person ON equals(events__pdi.person_id, events__pdi__person.id) \
         WHERE equals(events.team_id, 7) LIMIT 100"
    );
    // The outer access prints the pre-coerced output column unwrapped.
    assert!(!sql.contains("toFloat64OrNull(events__pdi__person.properties___tickets)"));
}

#[test]
fn person_on_events_properties_use_the_person_namespace() {
    let compiler = Compiler::new(CompilerConfig {
        person_on_events: true,
        ..CompilerConfig::default()
    })
    .unwrap()
    .with_catalog(Arc::new(catalog()));
    let sql = compiler
        .compile(
            "select person.properties.tickets from events",
            &QueryOptions::for_tenant(TENANT),
        )
        .unwrap()
        .backend_sql;
    assert_eq!(
        sql,
        "SELECT toFloat64OrNull(replaceRegexpAll(JSONExtractRaw(events.person_properties, %(hogql_val_0)s), '^\"|\"$', '')) \
         FROM events WHERE equals(events.team_id, 7) LIMIT 100"
    );
}

#[test]
fn undeclared_properties_stay_raw_strings() {
    let sql = compile("select properties.random_uuid from events");
    assert!(sql.starts_with(
        "SELECT replaceRegexpAll(JSONExtractRaw(events.properties, %(hogql_val_0)s), '^\"|\"$', '')"
    ));
    assert!(!sql.contains("toFloat64OrNull"));
}

#[test]
fn declared_properties_resolve_bare_on_a_single_table() {
    // Rule (d): a catalogued property name on the single FROM table
    // resolves without the properties prefix.
    let sql = compile("select tickets from persons");
    assert_eq!(
        sql,
        "SELECT toFloat64OrNull(replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_0)s), '^\"|\"$', '')) \
         FROM person WHERE equals(person.team_id, 7) LIMIT 100"
    );
}
