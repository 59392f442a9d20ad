//! The concrete analytics schema served by the registry.
//!
//! Two physical variants exist for `events`: the base variant, where person
//! columns are reached through the `pdi` hop, and the person-on-events
//! variant, where person columns are denormalized onto the event row. The
//! `person_on_events` feature flag selects which variant the logical name
//! `events` resolves to.

use indexmap::IndexMap;

use super::types::{PropertyOwner, ScalarType};
use super::{
    Column, FieldDef, JoinStrategy, LazyJoin, PropertyBag, SchemaRegistry, Table, VirtualColumn,
    VirtualTable,
};

const TENANT_COLUMN: &str = "team_id";

fn column(backend_name: &str, scalar: ScalarType) -> FieldDef {
    FieldDef::Scalar(Column {
        backend_name: backend_name.to_string(),
        scalar,
    })
}

fn person_virtual_table() -> VirtualTable {
    let mut fields = IndexMap::new();
    fields.insert(
        "id".to_string(),
        VirtualColumn::Scalar(Column {
            backend_name: "person_id".to_string(),
            scalar: ScalarType::Uuid,
        }),
    );
    fields.insert(
        "created_at".to_string(),
        VirtualColumn::Scalar(Column {
            backend_name: "person_created_at".to_string(),
            scalar: ScalarType::DateTime,
        }),
    );
    fields.insert(
        "properties".to_string(),
        VirtualColumn::Bag(PropertyBag {
            backend_name: "person_properties".to_string(),
            owner: PropertyOwner::Person,
            materialized: IndexMap::new(),
        }),
    );
    VirtualTable { fields }
}

fn events_table(person_on_events: bool) -> Table {
    let mut fields = IndexMap::new();
    fields.insert("uuid".to_string(), column("uuid", ScalarType::Uuid));
    fields.insert("event".to_string(), column("event", ScalarType::String));
    fields.insert(
        "timestamp".to_string(),
        column("timestamp", ScalarType::DateTime),
    );
    fields.insert(
        "distinct_id".to_string(),
        column("distinct_id", ScalarType::String),
    );
    fields.insert(
        "elements_chain".to_string(),
        column("elements_chain", ScalarType::String),
    );
    fields.insert(
        "created_at".to_string(),
        column("created_at", ScalarType::DateTime),
    );

    let mut materialized = IndexMap::new();
    materialized.insert("$session_id".to_string(), "$session_id".to_string());
    fields.insert(
        "properties".to_string(),
        FieldDef::Properties(PropertyBag {
            backend_name: "properties".to_string(),
            owner: PropertyOwner::Event,
            materialized,
        }),
    );

    fields.insert(
        "pdi".to_string(),
        FieldDef::Join(LazyJoin {
            target: "person_distinct_ids".to_string(),
            strategy: JoinStrategy::ArgMaxRollup {
                key: "distinct_id".to_string(),
                source_key: "distinct_id".to_string(),
                version_column: "version".to_string(),
                deleted_column: "is_deleted".to_string(),
            },
        }),
    );

    // Person columns denormalized onto the event row. Always addressable as
    // `poe`; the `person` name switches between this and the pdi hop chain
    // depending on the feature flag.
    fields.insert(
        "poe".to_string(),
        FieldDef::Virtual(person_virtual_table()),
    );
    if person_on_events {
        fields.insert(
            "person".to_string(),
            FieldDef::Virtual(person_virtual_table()),
        );
        fields.insert(
            "person_id".to_string(),
            column("person_id", ScalarType::Uuid),
        );
        fields.insert(
            "person_created_at".to_string(),
            column("person_created_at", ScalarType::DateTime),
        );
        fields.insert(
            "person_properties".to_string(),
            FieldDef::Properties(PropertyBag {
                backend_name: "person_properties".to_string(),
                owner: PropertyOwner::Person,
                materialized: IndexMap::new(),
            }),
        );
    } else {
        fields.insert(
            "person".to_string(),
            FieldDef::Expansion(vec!["pdi".to_string(), "person".to_string()]),
        );
    }

    Table {
        name: "events".to_string(),
        backend_name: "events".to_string(),
        tenant_column: TENANT_COLUMN.to_string(),
        fields,
    }
}

fn persons_table() -> Table {
    let mut fields = IndexMap::new();
    fields.insert("id".to_string(), column("id", ScalarType::Uuid));
    fields.insert(
        "created_at".to_string(),
        column("created_at", ScalarType::DateTime),
    );
    fields.insert(
        "is_identified".to_string(),
        column("is_identified", ScalarType::Boolean),
    );
    fields.insert(
        "is_deleted".to_string(),
        column("is_deleted", ScalarType::Integer),
    );
    fields.insert("version".to_string(), column("version", ScalarType::Integer));
    fields.insert(
        "properties".to_string(),
        FieldDef::Properties(PropertyBag {
            backend_name: "properties".to_string(),
            owner: PropertyOwner::Person,
            materialized: IndexMap::new(),
        }),
    );

    Table {
        name: "persons".to_string(),
        backend_name: "person".to_string(),
        tenant_column: TENANT_COLUMN.to_string(),
        fields,
    }
}

fn person_distinct_ids_table() -> Table {
    let mut fields = IndexMap::new();
    fields.insert(
        "distinct_id".to_string(),
        column("distinct_id", ScalarType::String),
    );
    fields.insert(
        "person_id".to_string(),
        column("person_id", ScalarType::Uuid),
    );
    fields.insert(
        "is_deleted".to_string(),
        column("is_deleted", ScalarType::Integer),
    );
    fields.insert("version".to_string(), column("version", ScalarType::Integer));
    fields.insert(
        "person".to_string(),
        FieldDef::Join(LazyJoin {
            target: "persons".to_string(),
            strategy: JoinStrategy::ArgMaxRollup {
                key: "id".to_string(),
                source_key: "person_id".to_string(),
                version_column: "version".to_string(),
                deleted_column: "is_deleted".to_string(),
            },
        }),
    );

    Table {
        name: "person_distinct_ids".to_string(),
        backend_name: "person_distinct_id2".to_string(),
        tenant_column: TENANT_COLUMN.to_string(),
        fields,
    }
}

fn session_recording_events_table() -> Table {
    let mut fields = IndexMap::new();
    fields.insert("uuid".to_string(), column("uuid", ScalarType::Uuid));
    fields.insert(
        "timestamp".to_string(),
        column("timestamp", ScalarType::DateTime),
    );
    fields.insert(
        "distinct_id".to_string(),
        column("distinct_id", ScalarType::String),
    );
    fields.insert(
        "session_id".to_string(),
        column("session_id", ScalarType::String),
    );
    fields.insert(
        "snapshot_data".to_string(),
        column("snapshot_data", ScalarType::String),
    );

    Table {
        name: "session_recording_events".to_string(),
        backend_name: "session_recording_events".to_string(),
        tenant_column: TENANT_COLUMN.to_string(),
        fields,
    }
}

fn cohortpeople_table() -> Table {
    let mut fields = IndexMap::new();
    fields.insert(
        "person_id".to_string(),
        column("person_id", ScalarType::Uuid),
    );
    fields.insert(
        "cohort_id".to_string(),
        column("cohort_id", ScalarType::Integer),
    );
    fields.insert("sign".to_string(), column("sign", ScalarType::Integer));
    fields.insert("version".to_string(), column("version", ScalarType::Integer));

    Table {
        name: "cohortpeople".to_string(),
        backend_name: "cohortpeople".to_string(),
        tenant_column: TENANT_COLUMN.to_string(),
        fields,
    }
}

fn person_static_cohort_table() -> Table {
    let mut fields = IndexMap::new();
    fields.insert("id".to_string(), column("id", ScalarType::Uuid));
    fields.insert(
        "person_id".to_string(),
        column("person_id", ScalarType::Uuid),
    );
    fields.insert(
        "cohort_id".to_string(),
        column("cohort_id", ScalarType::Integer),
    );

    Table {
        name: "person_static_cohort".to_string(),
        backend_name: "person_static_cohort".to_string(),
        tenant_column: TENANT_COLUMN.to_string(),
        fields,
    }
}

/// Build the registry for a given flag set.
pub fn default_registry(person_on_events: bool) -> SchemaRegistry {
    SchemaRegistry::new(vec![
        events_table(person_on_events),
        persons_table(),
        person_distinct_ids_table(),
        session_recording_events_table(),
        cohortpeople_table(),
        person_static_cohort_table(),
    ])
}
