//! Dynamic OR filters
//!
//! Turns an untrusted filter dictionary into equality predicates over a
//! record type's storage columns and runs them as one disjunctive SELECT.
//! Column names only ever come from the record type's declaration.

use tracing::debug;

use super::error::{RecordError, RecordResult};
use super::record::Record;
use super::schema::{FieldDef, FieldKind, RecordType};
use super::value::{FieldMap, Value};
use crate::engine::adapter::{DatabaseAdapter, DialectGenerator, SqlDialect, SqlValue};

/// `column = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: &'static str,
    pub column: &'static str,
    pub value: SqlValue,
}

impl Predicate {
    /// SQL condition for this predicate, with the bind placeholder at `index`.
    /// A null value compares with `IS NULL` and binds nothing.
    pub fn condition(&self, gen: &DialectGenerator, index: usize) -> String {
        let column = gen.quote_ident(self.column);
        if self.value == SqlValue::Null {
            format!("{} IS NULL", column)
        } else {
            format!("{} = {}", column, gen.placeholder(index))
        }
    }

    pub fn binds(&self) -> bool {
        self.value != SqlValue::Null
    }
}

/// A filter dictionary split into what was kept and what was dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterProjection {
    pub predicates: Vec<Predicate>,
    /// Keys that are not fields of the record type
    pub dropped: Vec<String>,
}

/// Validate `filter` against `record_type`, keeping dictionary order.
///
/// Unknown keys are dropped, not rejected. A reference field takes a record
/// of the referenced type and is replaced by that record's primary key.
pub fn project_filter(record_type: &RecordType, filter: &FieldMap) -> RecordResult<FilterProjection> {
    let mut projection = FilterProjection::default();
    for (key, value) in filter.iter() {
        match record_type.field(key) {
            Some(field) => projection.predicates.push(predicate_for(field, value)?),
            None => projection.dropped.push(key.to_string()),
        }
    }
    if !projection.dropped.is_empty() {
        debug!(record_type = record_type.name, dropped = ?projection.dropped, "dropped unknown filter keys");
    }
    Ok(projection)
}

/// Ordered `(column, value)` predicates for the valid subset of `filter`
pub fn build_predicates(record_type: &RecordType, filter: &FieldMap) -> RecordResult<Vec<Predicate>> {
    Ok(project_filter(record_type, filter)?.predicates)
}

pub(crate) fn predicate_for(field: &'static FieldDef, value: &Value) -> RecordResult<Predicate> {
    let mismatch = |reason: String| RecordError::TypeMismatch {
        field: field.name.to_string(),
        reason,
    };

    let resolved = match field.kind {
        FieldKind::Reference(target) => match value {
            Value::Record(related) if related.record_type() == target => {
                if related.pk().is_null() {
                    return Err(mismatch(format!("the {} record has no primary key yet", target.name)));
                }
                related.pk().clone()
            }
            Value::Record(related) => {
                return Err(mismatch(format!(
                    "expected a {} record, got a {} record",
                    target.name,
                    related.record_type().name
                )))
            }
            other => {
                return Err(mismatch(format!(
                    "expected a {} record, got {}",
                    target.name,
                    other.kind_name()
                )))
            }
        },
        FieldKind::Scalar(ty) => ty.coerce(value.clone()).map_err(mismatch)?,
    };

    let value = resolved
        .to_sql()
        .ok_or_else(|| mismatch("value cannot be compared".to_string()))?;
    Ok(Predicate {
        field: field.name,
        column: field.storage_column(),
        value,
    })
}

/// A parameterized SELECT with its bind values
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicOrQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Render the predicates of `filter` as one `SELECT * ... WHERE a OR b`.
/// Fails with `EmptyFilter` when no key survives validation.
pub fn build_dynamic_or_query(
    record_type: &RecordType,
    filter: &FieldMap,
    dialect: SqlDialect,
) -> RecordResult<DynamicOrQuery> {
    let projection = project_filter(record_type, filter)?;
    if projection.predicates.is_empty() {
        return Err(RecordError::EmptyFilter {
            record_type: record_type.name,
            dropped: projection.dropped,
        });
    }

    let gen = DialectGenerator::new(dialect);
    let mut conditions = Vec::with_capacity(projection.predicates.len());
    let mut params = Vec::new();
    for predicate in projection.predicates {
        conditions.push(predicate.condition(&gen, params.len() + 1));
        if predicate.binds() {
            params.push(predicate.value);
        }
    }

    let sql = format!(
        "SELECT * FROM {} WHERE {}",
        gen.quote_ident(record_type.table),
        conditions.join(" OR ")
    );
    Ok(DynamicOrQuery { sql, params })
}

/// Every record of `record_type` matching any predicate of `filter`,
/// loaded in full.
pub fn execute_or_query(
    adapter: &dyn DatabaseAdapter,
    record_type: &'static RecordType,
    filter: &FieldMap,
) -> RecordResult<Vec<Record>> {
    let query = build_dynamic_or_query(record_type, filter, adapter.dialect())?;
    let result = adapter.query(&query.sql, &query.params)?;
    let records = result
        .rows
        .iter()
        .map(|row| Record::from_row(record_type, &result, row))
        .collect::<RecordResult<Vec<_>>>()?;
    debug!(record_type = record_type.name, matched = records.len(), "dynamic OR query");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::adapter::sqlite::SqliteAdapter;
    use crate::engine::record::fixtures::{author, AUTHOR, BOOK};

    #[test]
    fn test_unknown_keys_are_dropped() {
        let filter: FieldMap = [("bogus_key", 1), ("pages", 5)].into_iter().collect();
        let projection = project_filter(&BOOK, &filter).unwrap();

        assert_eq!(
            projection.predicates,
            vec![Predicate {
                field: "pages",
                column: "pages",
                value: SqlValue::Integer(5)
            }]
        );
        assert_eq!(projection.dropped, vec!["bogus_key".to_string()]);
    }

    #[test]
    fn test_predicates_keep_dictionary_order() {
        let filter: FieldMap = [
            ("title", Value::from("Dune")),
            ("in_print", Value::Bool(true)),
            ("rating", Value::Integer(4)),
        ]
        .into_iter()
        .collect();
        let columns: Vec<&str> = build_predicates(&BOOK, &filter)
            .unwrap()
            .iter()
            .map(|p| p.column)
            .collect();
        assert_eq!(columns, vec!["title", "in_print", "rating"]);
    }

    #[test]
    fn test_reference_resolves_to_primary_key() {
        let filter: FieldMap = [("author", author(7, "Frank Herbert"))].into_iter().collect();
        let predicates = build_predicates(&BOOK, &filter).unwrap();
        assert_eq!(predicates[0].column, "author_id");
        assert_eq!(predicates[0].value, SqlValue::Integer(7));
    }

    #[test]
    fn test_reference_requires_identity() {
        let bare_key: FieldMap = [("author", 7)].into_iter().collect();
        assert!(matches!(
            build_predicates(&BOOK, &bare_key),
            Err(RecordError::TypeMismatch { .. })
        ));

        let unsaved: FieldMap = [("author", Record::new(&AUTHOR))].into_iter().collect();
        assert!(matches!(
            build_predicates(&BOOK, &unsaved),
            Err(RecordError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_uncoercible_scalar_is_a_type_mismatch() {
        let filter: FieldMap = [("title", Value::from("Dune")), ("pages", Value::from("many"))]
            .into_iter()
            .collect();
        let err = build_predicates(&BOOK, &filter).unwrap_err();
        assert!(matches!(err, RecordError::TypeMismatch { ref field, .. } if field == "pages"));

        let numeric_text: FieldMap = [("pages", "412")].into_iter().collect();
        assert_eq!(build_predicates(&BOOK, &numeric_text).unwrap()[0].value, SqlValue::Integer(412));
    }

    #[test]
    fn test_empty_filter_fails_fast() {
        let filter: FieldMap = [("bogus_key", 1)].into_iter().collect();
        let err = build_dynamic_or_query(&BOOK, &filter, SqlDialect::Sqlite).unwrap_err();
        assert!(matches!(err, RecordError::EmptyFilter { dropped, .. } if dropped == vec!["bogus_key"]));
    }

    #[test]
    fn test_dynamic_or_sql_per_dialect() {
        let filter: FieldMap = [("title", Value::from("Dune")), ("published", Value::Null), ("pages", Value::Integer(412))]
            .into_iter()
            .collect();

        let sqlite = build_dynamic_or_query(&BOOK, &filter, SqlDialect::Sqlite).unwrap();
        assert_eq!(
            sqlite.sql,
            "SELECT * FROM \"books\" WHERE \"title\" = ?1 OR \"published\" IS NULL OR \"pages\" = ?2"
        );
        assert_eq!(sqlite.params, vec![SqlValue::Text("Dune".into()), SqlValue::Integer(412)]);

        let mysql = build_dynamic_or_query(&BOOK, &filter, SqlDialect::Mysql).unwrap();
        assert_eq!(
            mysql.sql,
            "SELECT * FROM `books` WHERE `title` = ? OR `published` IS NULL OR `pages` = ?"
        );
    }

    #[test]
    fn test_execute_or_query_matches_each_row_once() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .execute_batch(
                "CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
                 INSERT INTO authors (id, name, email) VALUES
                    (1, 'Alice', 'alice@example.com'),
                    (2, 'Bob', 'alice@example.com'),
                    (3, 'Carol', 'carol@example.com');",
            )
            .unwrap();

        let filter: FieldMap = [("name", "Alice"), ("email", "alice@example.com"), ("nickname", "Al")]
            .into_iter()
            .collect();
        let mut names: Vec<String> = execute_or_query(&adapter, &AUTHOR, &filter)
            .unwrap()
            .iter()
            .map(|r| r.get("name").unwrap().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }
}
