use recordkit::engine::record::filter::{build_dynamic_or_query, project_filter};
use recordkit::engine::record::{build_predicates, FieldDef, ScalarType};
use recordkit::{
    execute_or_query, DatabaseAdapter, FieldMap, Manager, Record, RecordError, RecordType, SqlDialect, SqlValue,
    SqliteAdapter, Value,
};

static TEAM: RecordType = RecordType {
    name: "Team",
    table: "teams",
    primary_key: "id",
    fields: &[
        FieldDef::scalar("id", ScalarType::Integer),
        FieldDef::scalar("name", ScalarType::Text).not_null(),
    ],
};

static PERSON: RecordType = RecordType {
    name: "Person",
    table: "people",
    primary_key: "id",
    fields: &[
        FieldDef::scalar("id", ScalarType::Integer),
        FieldDef::scalar("name", ScalarType::Text).stored_as("full_name"),
        FieldDef::scalar("age", ScalarType::Integer),
        FieldDef::reference("team", &TEAM).stored_as("team_id"),
    ],
};

/// Two teams and four people on a file-backed store
fn seeded_store(dir: &std::path::Path) -> Result<(SqliteAdapter, Record, Record), Box<dyn std::error::Error>> {
    let adapter = SqliteAdapter::new(&dir.join("people.db"))?;
    let teams = Manager::new(&adapter, &TEAM);
    let people = Manager::new(&adapter, &PERSON);
    teams.create_table()?;
    people.create_table()?;

    let mut red = Record::with_values(&TEAM, [("name", "red")])?;
    let mut blue = Record::with_values(&TEAM, [("name", "blue")])?;
    teams.save(&mut red)?;
    teams.save(&mut blue)?;

    for (name, age, team) in [
        ("Alice", 30, &red),
        ("Bob", 30, &blue),
        ("Alice", 41, &blue),
        ("Carol", 25, &red),
    ] {
        let mut person = Record::new(&PERSON);
        person.set("name", name)?;
        person.set("age", age)?;
        person.set("team", team.clone())?;
        people.save(&mut person)?;
    }
    Ok((adapter, red, blue))
}

fn names_and_ages(records: &[Record]) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = records
        .iter()
        .map(|r| {
            (
                r.get("name").unwrap().to_string(),
                r.get("age").unwrap().as_i64().unwrap(),
            )
        })
        .collect();
    rows.sort();
    rows
}

#[test]
fn test_or_query_returns_each_match_once() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let (adapter, _, _) = seeded_store(dir.path())?;

    // Alice (30) matches both predicates and must appear once
    let filter: FieldMap = [("name", Value::from("Alice")), ("age", Value::Integer(30))]
        .into_iter()
        .collect();
    let records = execute_or_query(&adapter, &PERSON, &filter)?;

    assert_eq!(
        names_and_ages(&records),
        vec![
            ("Alice".to_string(), 30),
            ("Alice".to_string(), 41),
            ("Bob".to_string(), 30),
        ]
    );
    Ok(())
}

#[test]
fn test_unknown_keys_are_dropped_not_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let filter: FieldMap = [("bogus_key", Value::Integer(1)), ("age", Value::Integer(5))]
        .into_iter()
        .collect();

    let predicates = build_predicates(&PERSON, &filter)?;
    assert_eq!(predicates.len(), 1);
    assert_eq!(predicates[0].field, "age");

    let projection = project_filter(&PERSON, &filter)?;
    assert_eq!(projection.dropped, vec!["bogus_key".to_string()]);
    Ok(())
}

#[test]
fn test_storage_alias_and_reference_key() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let (adapter, red, _) = seeded_store(dir.path())?;

    let filter: FieldMap = [("team", Value::from(red.clone())), ("name", Value::from("Bob"))]
        .into_iter()
        .collect();

    let query = build_dynamic_or_query(&PERSON, &filter, adapter.dialect())?;
    assert_eq!(
        query.sql,
        "SELECT * FROM \"people\" WHERE \"team_id\" = ?1 OR \"full_name\" = ?2"
    );
    // The team is bound by primary key, not as a record
    assert_eq!(query.params[0], SqlValue::Integer(1));

    let records = Manager::new(&adapter, &PERSON).dynamic_or(&filter)?;
    assert_eq!(
        names_and_ages(&records),
        vec![
            ("Alice".to_string(), 30),
            ("Bob".to_string(), 30),
            ("Carol".to_string(), 25),
        ]
    );
    for record in &records {
        // Loaded references hold the key until expanded
        assert!(record.get("team")?.as_i64().is_some());
    }
    Ok(())
}

#[test]
fn test_empty_filter_fails_without_querying() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let (adapter, _, _) = seeded_store(dir.path())?;

    let filter: FieldMap = [("nickname", "Al"), ("shoe_size", "42")].into_iter().collect();
    let err = execute_or_query(&adapter, &PERSON, &filter).unwrap_err();
    match err {
        RecordError::EmptyFilter { record_type, dropped } => {
            assert_eq!(record_type, "Person");
            assert_eq!(dropped, vec!["nickname".to_string(), "shoe_size".to_string()]);
        }
        other => panic!("expected EmptyFilter, got {:?}", other),
    }

    let empty = FieldMap::new();
    assert!(matches!(
        build_dynamic_or_query(&PERSON, &empty, SqlDialect::Postgres),
        Err(RecordError::EmptyFilter { .. })
    ));
    Ok(())
}

#[test]
fn test_reference_filter_needs_a_saved_record() {
    let by_key: FieldMap = [("team", Value::Integer(1))].into_iter().collect();
    assert!(matches!(
        build_predicates(&PERSON, &by_key),
        Err(RecordError::TypeMismatch { .. })
    ));

    let wrong_type: FieldMap = [("team", Value::from(Record::new(&PERSON)))].into_iter().collect();
    assert!(matches!(
        build_predicates(&PERSON, &wrong_type),
        Err(RecordError::TypeMismatch { .. })
    ));
}

#[test]
fn test_hydrated_cli_style_filter() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let (adapter, _, blue) = seeded_store(dir.path())?;
    let people = Manager::new(&adapter, &PERSON);

    let raw: FieldMap = [("team", blue.pk().clone())].into_iter().collect();
    let records = people.dynamic_or(&people.hydrate_references(raw)?)?;
    assert_eq!(
        names_and_ages(&records),
        vec![("Alice".to_string(), 41), ("Bob".to_string(), 30)]
    );
    Ok(())
}
