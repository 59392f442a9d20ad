//! End-to-end compilation scenarios: AQL in, backend SQL + normalized AQL
//! + bound values out.

use std::collections::HashMap;

use test_case::test_case;

use aqlc::aql_parser::ast::{ConstantValue, Expr};
use aqlc::{CompileError, CompiledQuery, Compiler, CompilerConfig, QueryOptions};

fn compiler() -> Compiler {
    Compiler::new(CompilerConfig::default()).unwrap()
}

fn compiler_with_person_on_events() -> Compiler {
    Compiler::new(CompilerConfig {
        person_on_events: true,
        ..CompilerConfig::default()
    })
    .unwrap()
}

fn compile(source: &str) -> CompiledQuery {
    compiler()
        .compile(source, &QueryOptions::for_tenant(7))
        .unwrap()
}

fn bound(compiled: &CompiledQuery, key: &str) -> ConstantValue {
    compiled
        .bound_values
        .get(key)
        .cloned()
        .unwrap_or_else(|| panic!("missing bound value {}", key))
}

#[test]
fn property_filter_with_placeholder() {
    let options = QueryOptions::for_tenant(7).with_placeholder(
        "random_uuid",
        Expr::constant(ConstantValue::String("abc".to_string())),
    );
    let compiled = compiler()
        .compile(
            "select count(), event from events where properties.random_uuid = {random_uuid} group by event",
            &options,
        )
        .unwrap();

    assert_eq!(
        compiled.backend_sql,
        "SELECT count(), events.event FROM events WHERE and(equals(events.team_id, 7), \
         equals(replaceRegexpAll(JSONExtractRaw(events.properties, %(hogql_val_0)s), '^\"|\"$', ''), %(hogql_val_1)s)) \
         GROUP BY events.event LIMIT 100"
    );
    assert_eq!(
        compiled.aql_sql,
        "SELECT count(), event FROM events WHERE equals(properties.random_uuid, %(hogql_val_0)s) GROUP BY event LIMIT 100"
    );
    assert_eq!(
        bound(&compiled, "hogql_val_0"),
        ConstantValue::String("random_uuid".to_string())
    );
    assert_eq!(
        bound(&compiled, "hogql_val_1"),
        ConstantValue::String("abc".to_string())
    );
}

#[test]
fn distinct_person_properties() {
    let compiled = compile("select distinct properties.sneaky_mail from persons");
    assert_eq!(
        compiled.backend_sql,
        "SELECT DISTINCT replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_0)s), '^\"|\"$', '') \
         FROM person WHERE equals(person.team_id, 7) LIMIT 100"
    );
    assert_eq!(
        compiled.aql_sql,
        "SELECT DISTINCT properties.sneaky_mail FROM persons LIMIT 100"
    );
}

#[test]
fn pdi_navigation_materializes_one_rollup_join() {
    let compiled =
        compile("SELECT event, timestamp, pdi.distinct_id, pdi.person_id FROM events LIMIT 10");
    assert_eq!(
        compiled.backend_sql,
        "SELECT events.event, events.timestamp, events__pdi.distinct_id, events__pdi.person_id \
         FROM events INNER JOIN (SELECT argMax(person_distinct_id2.person_id, person_distinct_id2.version) AS person_id, \
         person_distinct_id2.distinct_id FROM person_distinct_id2 WHERE equals(person_distinct_id2.team_id, 7) \
         GROUP BY person_distinct_id2.distinct_id HAVING equals(argMax(person_distinct_id2.is_deleted, person_distinct_id2.version), 0)) \
         AS events__pdi ON equals(events.distinct_id, events__pdi.distinct_id) \
         WHERE equals(events.team_id, 7) LIMIT 10"
    );
    assert_eq!(
        compiled.aql_sql,
        "SELECT event, timestamp, pdi.distinct_id, pdi.person_id FROM events LIMIT 10"
    );
    assert!(compiled.bound_values.is_empty());
}

#[test]
fn chained_person_navigation_coerces_inside_the_rollup() {
    let compiled = compile("SELECT event, e.pdi.person.properties.sneaky_mail FROM events e");
    assert_eq!(
        compiled.backend_sql,
        "SELECT e.event, e__pdi__person.properties___sneaky_mail FROM events AS e \
         INNER JOIN (SELECT argMax(person_distinct_id2.person_id, person_distinct_id2.version) AS person_id, \
         person_distinct_id2.distinct_id FROM person_distinct_id2 WHERE equals(person_distinct_id2.team_id, 7) \
         GROUP BY person_distinct_id2.distinct_id HAVING equals(argMax(person_distinct_id2.is_deleted, person_distinct_id2.version), 0)) \
         AS e__pdi ON equals(e.distinct_id, e__pdi.distinct_id) \
         INNER JOIN (SELECT argMax(replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_0)s), '^\"|\"$', ''), person.version) \
         AS properties___sneaky_mail, person.id FROM person WHERE equals(person.team_id, 7) \
         GROUP BY person.id HAVING equals(argMax(person.is_deleted, person.version), 0)) \
         AS e__pdi__person ON equals(e__pdi.person_id, e__pdi__person.id) \
         WHERE equals(e.team_id, 7) LIMIT 100"
    );
    assert_eq!(
        bound(&compiled, "hogql_val_0"),
        ConstantValue::String("sneaky_mail".to_string())
    );
}

#[test]
fn person_on_events_flag_removes_person_joins() {
    let compiled = compiler_with_person_on_events()
        .compile(
            "SELECT event, timestamp, person.id, person.properties.sneaky_mail FROM events LIMIT 10",
            &QueryOptions::for_tenant(7),
        )
        .unwrap();
    assert_eq!(
        compiled.backend_sql,
        "SELECT events.event, events.timestamp, events.person_id, \
         replaceRegexpAll(JSONExtractRaw(events.person_properties, %(hogql_val_0)s), '^\"|\"$', '') \
         FROM events WHERE equals(events.team_id, 7) LIMIT 10"
    );
    assert!(!compiled.backend_sql.contains("JOIN"));
}

#[test]
fn person_without_the_flag_expands_through_pdi() {
    let compiled = compile("SELECT event, person.id FROM events LIMIT 10");
    assert!(compiled.backend_sql.contains("AS events__pdi "));
    assert!(compiled.backend_sql.contains("AS events__pdi__person "));
    assert!(compiled
        .backend_sql
        .contains("ON equals(events__pdi.person_id, events__pdi__person.id)"));
}

#[test]
fn pdi_anchor_rolls_up_person_properties() {
    let compiled =
        compile("SELECT pdi.distinct_id, pdi.person.properties.sneaky_mail FROM person_distinct_ids pdi LIMIT 10");
    assert_eq!(
        compiled.backend_sql,
        "SELECT pdi.distinct_id, pdi__person.properties___sneaky_mail FROM person_distinct_id2 AS pdi \
         INNER JOIN (SELECT argMax(replaceRegexpAll(JSONExtractRaw(person.properties, %(hogql_val_0)s), '^\"|\"$', ''), person.version) \
         AS properties___sneaky_mail, person.id FROM person WHERE equals(person.team_id, 7) \
         GROUP BY person.id HAVING equals(argMax(person.is_deleted, person.version), 0)) \
         AS pdi__person ON equals(pdi.person_id, pdi__person.id) \
         WHERE equals(pdi.team_id, 7) LIMIT 10"
    );
}

#[test]
fn poe_reads_denormalized_person_properties() {
    let compiled = compile(
        "SELECT poe.properties.sneaky_mail, count() FROM events s GROUP BY poe.properties.sneaky_mail LIMIT 10",
    );
    assert_eq!(
        compiled.backend_sql,
        "SELECT replaceRegexpAll(JSONExtractRaw(s.person_properties, %(hogql_val_0)s), '^\"|\"$', ''), count() \
         FROM events AS s WHERE equals(s.team_id, 7) \
         GROUP BY replaceRegexpAll(JSONExtractRaw(s.person_properties, %(hogql_val_1)s), '^\"|\"$', '') LIMIT 10"
    );
}

#[test]
fn anonymous_subquery_columns_print_unqualified() {
    let options = QueryOptions::for_tenant(7).with_placeholder(
        "random_uuid",
        Expr::constant(ConstantValue::String("abc".to_string())),
    );
    let compiled = compiler()
        .compile(
            "select count, event from (select count() as count, event from events where properties.random_uuid = {random_uuid} group by event) group by count, event",
            &options,
        )
        .unwrap();
    assert_eq!(
        compiled.backend_sql,
        "SELECT count, event FROM (SELECT count() AS count, events.event FROM events \
         WHERE and(equals(events.team_id, 7), \
         equals(replaceRegexpAll(JSONExtractRaw(events.properties, %(hogql_val_0)s), '^\"|\"$', ''), %(hogql_val_1)s)) \
         GROUP BY events.event) GROUP BY count, event LIMIT 100"
    );
}

#[test]
fn aliased_subquery_columns_print_qualified() {
    let compiled = compile(
        "select count, event from (select count(*) as count, event from events group by event) as c group by count, event",
    );
    assert_eq!(
        compiled.backend_sql,
        "SELECT c.count, c.event FROM (SELECT count(*) AS count, events.event FROM events \
         WHERE equals(events.team_id, 7) GROUP BY events.event) AS c GROUP BY c.count, c.event LIMIT 100"
    );
}

#[test]
fn explicit_joins_get_tenant_predicates_in_from_order() {
    let compiled = compile(
        "select e.event, s.session_id from events e left join session_recording_events s on s.session_id = e.properties.$session_id where e.properties.$session_id is not null limit 10",
    );
    assert_eq!(
        compiled.backend_sql,
        "SELECT e.event, s.session_id FROM events AS e \
         LEFT JOIN session_recording_events AS s ON equals(s.session_id, e.`$session_id`) \
         WHERE and(equals(e.team_id, 7), equals(s.team_id, 7), isNotNull(e.`$session_id`)) LIMIT 10"
    );
}

#[test]
fn non_materialized_property_in_join_key_stays_json() {
    let compiled = compile(
        "select e.event, s.session_id from events e left join session_recording_events s on s.session_id = e.properties.$$$session_id where e.properties.$$$session_id is not null limit 10",
    );
    assert_eq!(
        compiled.backend_sql,
        "SELECT e.event, s.session_id FROM events AS e \
         LEFT JOIN session_recording_events AS s \
         ON equals(s.session_id, replaceRegexpAll(JSONExtractRaw(e.properties, %(hogql_val_0)s), '^\"|\"$', '')) \
         WHERE and(equals(e.team_id, 7), equals(s.team_id, 7), \
         isNotNull(replaceRegexpAll(JSONExtractRaw(e.properties, %(hogql_val_1)s), '^\"|\"$', ''))) LIMIT 10"
    );
}

#[test]
fn cohort_placeholder_filters_compile() {
    // The cohort filter arrives as a pre-built AST fragment, the way an
    // application layer injects catalog-derived predicates.
    let cohort_filter = {
        use aqlc::aql_parser::ast::{CompareOperator, ExprKind};
        let mut placeholders = HashMap::new();
        placeholders.insert(
            "cohort_id".to_string(),
            Expr::constant(ConstantValue::Integer(42)),
        );
        let inner = aqlc::aql_parser::parse_query(
            "select person_id from person_static_cohort where cohort_id = {cohort_id}",
            &placeholders,
        )
        .unwrap();
        Expr::new(ExprKind::CompareOp {
            op: CompareOperator::In,
            left: Box::new(Expr::field(vec!["pdi".to_string(), "person_id".to_string()])),
            right: Box::new(Expr::new(ExprKind::Select(Box::new(inner)))),
        })
    };
    let options = QueryOptions::for_tenant(7).with_placeholder("cohort_filter", cohort_filter);
    let compiled = compiler()
        .compile(
            "SELECT event, count() FROM events WHERE {cohort_filter} GROUP BY event",
            &options,
        )
        .unwrap();
    assert!(compiled.backend_sql.contains(
        "in(events__pdi.person_id, (SELECT person_static_cohort.person_id FROM person_static_cohort \
         WHERE and(equals(person_static_cohort.team_id, 7), equals(person_static_cohort.cohort_id, %(hogql_val_0)s))))"
    ));
    assert!(compiled.backend_sql.contains("AS events__pdi "));
    assert_eq!(bound(&compiled, "hogql_val_0"), ConstantValue::Integer(42));
}

#[test]
fn user_numeric_constants_are_captured() {
    let compiled = compile("select event from events where properties.index = 4 limit 10");
    assert!(compiled.backend_sql.contains("%(hogql_val_1)s"));
    assert_eq!(bound(&compiled, "hogql_val_1"), ConstantValue::Integer(4));
    // LIMIT counts are structural and never captured.
    assert!(compiled.backend_sql.ends_with("LIMIT 10"));
}

#[test]
fn order_by_and_offset_round_trip() {
    let compiled =
        compile("select event from events order by timestamp desc, event limit 10 offset 20");
    assert!(compiled
        .backend_sql
        .ends_with("ORDER BY events.timestamp DESC, events.event ASC LIMIT 10 OFFSET 20"));
}

#[test_case("select event from events limit 10" ; "lowercase")]
#[test_case("SELECT event FROM events LIMIT 10" ; "uppercase")]
#[test_case("sElEcT event fRoM events lImIt 10" ; "mixed_case")]
fn keywords_are_case_insensitive(source: &str) {
    let compiled = compile(source);
    assert_eq!(
        compiled.backend_sql,
        "SELECT events.event FROM events WHERE equals(events.team_id, 7) LIMIT 10"
    );
}

#[test]
fn syntax_errors_surface_with_offsets() {
    let err = compiler()
        .compile("select from where", &QueryOptions::for_tenant(7))
        .unwrap_err();
    match err {
        CompileError::Syntax(e) => assert!(e.offset < "select from where".len()),
        other => panic!("expected syntax error, got {:?}", other),
    }
}

#[test]
fn unknown_tables_and_fields_are_resolve_errors() {
    let err = compiler()
        .compile("select 1 from nonexistent", &QueryOptions::for_tenant(7))
        .unwrap_err();
    assert!(matches!(err, CompileError::Resolve(_)));
}
