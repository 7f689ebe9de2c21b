//! Field introspection and merging
//!
//! Reads fields generically off any record, optionally expanding
//! references one level, and merges update mappings (or other records) into
//! a target under the overwrite / falsy rules.

use std::borrow::Cow;
use tracing::debug;

use super::error::{FieldAccessError, RecordResult};
use super::record::Record;
use super::schema::{FieldKind, RecordType};
use super::value::{FieldMap, Value};

/// Loads a referenced record by primary key
pub trait RelationResolver {
    fn resolve(&self, record_type: &'static RecordType, pk: &Value) -> RecordResult<Option<Record>>;
}

/// Persists a record
pub trait RecordWriter {
    fn save(&self, record: &mut Record) -> RecordResult<()>;
}

/// Field names of a record type, in declaration order
pub fn list_field_names(record_type: &RecordType) -> Vec<&'static str> {
    record_type.field_names()
}

/// Reads field values, resolving unloaded references through an optional
/// resolver when expansion is requested.
#[derive(Clone, Copy, Default)]
pub struct FieldReader<'a> {
    resolver: Option<&'a dyn RelationResolver>,
}

impl<'a> FieldReader<'a> {
    pub fn new() -> Self {
        Self { resolver: None }
    }

    pub fn with_resolver(resolver: &'a dyn RelationResolver) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Read one field, reporting why a reference could not be expanded
    pub fn try_field_value(
        &self,
        record: &Record,
        field_name: &str,
        expand: bool,
    ) -> Result<Value, FieldAccessError> {
        let record_type = record.record_type();
        let idx = record_type
            .field_index(field_name)
            .ok_or_else(|| FieldAccessError::UnknownField {
                record_type: record_type.name,
                field: field_name.to_string(),
            })?;
        let field = &record_type.fields[idx];
        let slot = record.value_at(idx);

        let target = match field.kind {
            FieldKind::Scalar(_) => return Ok(slot.clone()),
            FieldKind::Reference(target) => target,
        };

        if !expand {
            return Ok(slot.reference_key());
        }

        // Expansion stops after one level: the related record's own
        // references are read as keys.
        match slot {
            Value::Null => Ok(Value::Null),
            Value::Record(related) => Ok(Value::Map(FieldReader::new().field_values(related, false))),
            key => {
                let resolver = self.resolver.ok_or_else(|| FieldAccessError::Unresolved {
                    field: field.name,
                    reason: "reference is not loaded and no resolver is available".to_string(),
                })?;
                match resolver.resolve(target, key) {
                    Ok(Some(related)) => Ok(Value::Map(FieldReader::new().field_values(&related, false))),
                    Ok(None) => Err(FieldAccessError::Unresolved {
                        field: field.name,
                        reason: format!("no {} with primary key {}", target.name, key),
                    }),
                    Err(err) => Err(FieldAccessError::Unresolved {
                        field: field.name,
                        reason: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Read one field. Unknown fields are an error; a reference that fails
    /// to expand reads as null.
    pub fn get_field_value(&self, record: &Record, field_name: &str, expand: bool) -> RecordResult<Value> {
        match self.try_field_value(record, field_name, expand) {
            Ok(value) => Ok(value),
            Err(FieldAccessError::Unresolved { field, reason }) => {
                debug!(record_type = record.record_type().name, field, %reason, "reference expansion failed, reading null");
                Ok(Value::Null)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Every field of the record, keyed by field name in declaration order
    pub fn field_values(&self, record: &Record, expand: bool) -> FieldMap {
        record
            .record_type()
            .fields
            .iter()
            .map(|field| {
                let value = self
                    .get_field_value(record, field.name, expand)
                    .unwrap_or(Value::Null);
                (field.name, value)
            })
            .collect()
    }
}

/// `FieldReader::get_field_value` without a resolver
pub fn get_field_value(record: &Record, field_name: &str, expand: bool) -> RecordResult<Value> {
    FieldReader::new().get_field_value(record, field_name, expand)
}

/// `FieldReader::field_values` without a resolver
pub fn field_values(record: &Record, expand: bool) -> FieldMap {
    FieldReader::new().field_values(record, expand)
}

/// Where merged values come from
#[derive(Debug, Clone, Copy)]
pub enum MergeSource<'s> {
    Map(&'s FieldMap),
    /// Read with `field_values(expand = false)`
    Record(&'s Record),
}

impl<'s> From<&'s FieldMap> for MergeSource<'s> {
    fn from(map: &'s FieldMap) -> Self {
        MergeSource::Map(map)
    }
}

impl<'s> From<&'s Record> for MergeSource<'s> {
    fn from(record: &'s Record) -> Self {
        MergeSource::Record(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Replace non-falsy target values too
    pub overwrite: bool,
    /// Let falsy source values through
    pub honor_falsy: bool,
    /// Save the target when it changed
    pub persist: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            honor_falsy: false,
            persist: true,
        }
    }
}

impl MergeOptions {
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn honor_falsy(mut self, honor_falsy: bool) -> Self {
        self.honor_falsy = honor_falsy;
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

/// Apply `source` to `target` in memory and return the fields written.
///
/// Keys that are not fields of the target are skipped. Falsy source values
/// are skipped unless `honor_falsy`; surviving values are written only when
/// `overwrite` is set or the target's current value is falsy. Nothing is
/// written unless every surviving value fits its field.
pub fn apply_merge(
    target: &mut Record,
    source: MergeSource<'_>,
    options: &MergeOptions,
) -> RecordResult<Vec<&'static str>> {
    let source: Cow<'_, FieldMap> = match source {
        MergeSource::Map(map) => Cow::Borrowed(map),
        MergeSource::Record(record) => Cow::Owned(field_values(record, false)),
    };

    let record_type = target.record_type();
    let mut updates = Vec::new();
    for (key, value) in source.iter() {
        let Some(idx) = record_type.field_index(key) else {
            continue;
        };
        if !value.is_truthy() && !options.honor_falsy {
            continue;
        }
        if options.overwrite || !target.value_at(idx).is_truthy() {
            updates.push((idx, value.clone()));
        }
    }

    let written = updates.iter().map(|(idx, _)| record_type.fields[*idx].name).collect();
    target.set_all_at(updates)?;
    Ok(written)
}

/// Merge `source` into `target`; returns whether the target now differs
/// from its last-persisted state.
///
/// When it does and `options.persist` is set, the target is saved through
/// `writer`. Save failures propagate.
pub fn merge_into(
    target: &mut Record,
    source: MergeSource<'_>,
    options: MergeOptions,
    writer: &dyn RecordWriter,
) -> RecordResult<bool> {
    let written = apply_merge(target, source, &options)?;

    let changed = target.changed_fields();
    if changed.is_empty() {
        return Ok(false);
    }

    debug!(
        record_type = target.record_type().name,
        ?written,
        ?changed,
        persist = options.persist,
        "merge changed record"
    );
    if options.persist {
        writer.save(target)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::adapter::AdapterError;
    use crate::engine::record::error::RecordError;
    use crate::engine::record::fixtures::{author, AUTHOR, BOOK};
    use std::cell::Cell;

    /// Counts saves instead of touching a store
    #[derive(Default)]
    struct CountingWriter {
        saves: Cell<usize>,
        fail: bool,
    }

    impl RecordWriter for CountingWriter {
        fn save(&self, record: &mut Record) -> RecordResult<()> {
            if self.fail {
                return Err(AdapterError::Query("disk I/O error".into()).into());
            }
            self.saves.set(self.saves.get() + 1);
            record.mark_persisted();
            Ok(())
        }
    }

    struct MapResolver(Vec<Record>);

    impl RelationResolver for MapResolver {
        fn resolve(&self, record_type: &'static RecordType, pk: &Value) -> RecordResult<Option<Record>> {
            Ok(self
                .0
                .iter()
                .find(|r| r.record_type() == record_type && r.pk() == pk)
                .cloned())
        }
    }

    struct FailingResolver;

    impl RelationResolver for FailingResolver {
        fn resolve(&self, _: &'static RecordType, _: &Value) -> RecordResult<Option<Record>> {
            Err(AdapterError::Connection("pool timed out".into()).into())
        }
    }

    fn saved_book() -> Record {
        Record::with_values(
            &BOOK,
            [
                ("id", Value::Integer(1)),
                ("title", Value::from("Dune")),
                ("pages", Value::Integer(0)),
                ("author", Value::Integer(7)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_field_values_cover_every_field() {
        let book = saved_book();
        let values = field_values(&book, false);
        let keys: Vec<&str> = values.keys().collect();
        assert_eq!(keys, list_field_names(&BOOK));
        assert_eq!(values.get("author"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let book = saved_book();
        assert!(matches!(
            get_field_value(&book, "isbn", false),
            Err(RecordError::UnknownField { .. })
        ));
        assert!(matches!(
            FieldReader::new().try_field_value(&book, "isbn", true),
            Err(FieldAccessError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_unset_reference_expands_to_null() {
        let book = Record::new(&BOOK);
        assert_eq!(get_field_value(&book, "author", true).unwrap(), Value::Null);
        assert_eq!(get_field_value(&book, "author", false).unwrap(), Value::Null);
    }

    #[test]
    fn test_loaded_reference_expands_one_level() {
        let mut book = saved_book();
        book.set("author", author(7, "Frank Herbert")).unwrap();

        assert_eq!(get_field_value(&book, "author", false).unwrap(), Value::Integer(7));
        let Value::Map(expanded) = get_field_value(&book, "author", true).unwrap() else {
            panic!("expected expanded author");
        };
        assert_eq!(expanded.get("name"), Some(&Value::from("Frank Herbert")));
        assert_eq!(expanded.keys().collect::<Vec<_>>(), list_field_names(&AUTHOR));
    }

    #[test]
    fn test_unloaded_reference_resolves_through_resolver() {
        let book = saved_book();
        let resolver = MapResolver(vec![author(7, "Frank Herbert")]);
        let reader = FieldReader::with_resolver(&resolver);

        let Value::Map(expanded) = reader.get_field_value(&book, "author", true).unwrap() else {
            panic!("expected expanded author");
        };
        assert_eq!(expanded.get("id"), Some(&Value::Integer(7)));

        // Dangling key
        let mut orphan = saved_book();
        orphan.set("author", 99).unwrap();
        assert!(matches!(
            reader.try_field_value(&orphan, "author", true),
            Err(FieldAccessError::Unresolved { field: "author", .. })
        ));
        assert_eq!(reader.get_field_value(&orphan, "author", true).unwrap(), Value::Null);
    }

    #[test]
    fn test_resolver_failure_reads_null() {
        let book = saved_book();
        let reader = FieldReader::with_resolver(&FailingResolver);
        assert_eq!(reader.get_field_value(&book, "author", true).unwrap(), Value::Null);
        assert_eq!(reader.field_values(&book, true).get("author"), Some(&Value::Null));
    }

    #[test]
    fn test_merge_fills_only_falsy_fields() {
        let mut book = saved_book();
        let source: FieldMap = [
            ("title", Value::from("Dune Messiah")),
            ("pages", Value::Integer(256)),
            ("rating", Value::Real(4.5)),
            ("isbn", Value::from("978-0")),
        ]
        .into_iter()
        .collect();
        let writer = CountingWriter::default();

        let changed = merge_into(&mut book, (&source).into(), MergeOptions::default(), &writer).unwrap();

        assert!(changed);
        assert_eq!(writer.saves.get(), 1);
        assert_eq!(book.get("title").unwrap(), &Value::from("Dune"));
        assert_eq!(book.get("pages").unwrap(), &Value::Integer(256));
        assert_eq!(book.get("rating").unwrap(), &Value::Real(4.5));
    }

    #[test]
    fn test_merge_skips_falsy_source_values() {
        let mut book = saved_book();
        let source: FieldMap = [("title", Value::from("")), ("rating", Value::Real(0.0))]
            .into_iter()
            .collect();
        let writer = CountingWriter::default();

        let options = MergeOptions::default().overwrite(true);
        assert!(!merge_into(&mut book, (&source).into(), options, &writer).unwrap());
        assert_eq!(book.get("title").unwrap(), &Value::from("Dune"));
        assert_eq!(writer.saves.get(), 0);
    }

    #[test]
    fn test_merge_overwrite_and_honor_falsy() {
        let mut book = saved_book();
        let source: FieldMap = [
            ("title", Value::from("")),
            ("pages", Value::Integer(300)),
            ("author", Value::Null),
        ]
        .into_iter()
        .collect();
        let writer = CountingWriter::default();

        let options = MergeOptions::default().overwrite(true).honor_falsy(true);
        assert!(merge_into(&mut book, (&source).into(), options, &writer).unwrap());
        for (key, value) in source.iter() {
            assert_eq!(book.get(key).unwrap(), value);
        }
    }

    #[test]
    fn test_merge_without_difference_does_not_write() {
        let mut book = saved_book();
        let source: FieldMap = [("title", "Dune"), ("id", "1")].into_iter().collect();
        let writer = CountingWriter::default();

        let options = MergeOptions::default().overwrite(true);
        assert!(!merge_into(&mut book, (&source).into(), options, &writer).unwrap());
        assert_eq!(writer.saves.get(), 0);
    }

    #[test]
    fn test_merge_without_persist_reports_change() {
        let mut book = saved_book();
        let source: FieldMap = [("pages", 10)].into_iter().collect();
        let writer = CountingWriter::default();

        let options = MergeOptions::default().persist(false);
        assert!(merge_into(&mut book, (&source).into(), options, &writer).unwrap());
        assert_eq!(writer.saves.get(), 0);
        assert!(book.has_changed());
    }

    #[test]
    fn test_merge_from_record_source() {
        let mut target = Record::with_values(&BOOK, [("id", 2)]).unwrap();
        let mut source = saved_book();
        source.set("author", author(7, "Frank Herbert")).unwrap();
        let writer = CountingWriter::default();

        assert!(merge_into(&mut target, (&source).into(), MergeOptions::default(), &writer).unwrap());
        // The non-falsy id is kept, the reference arrives as a key
        assert_eq!(target.pk(), &Value::Integer(2));
        assert_eq!(target.get("title").unwrap(), &Value::from("Dune"));
        assert_eq!(target.get("author").unwrap(), &Value::Integer(7));
    }

    #[test]
    fn test_merge_propagates_save_failure() {
        let mut book = saved_book();
        let source: FieldMap = [("pages", 10)].into_iter().collect();
        let writer = CountingWriter {
            fail: true,
            ..Default::default()
        };

        let err = merge_into(&mut book, (&source).into(), MergeOptions::default(), &writer).unwrap_err();
        assert!(matches!(err, RecordError::Store(AdapterError::Query(_))));
    }

    #[test]
    fn test_merge_rejects_uncoercible_value() {
        let mut book = saved_book();
        let source: FieldMap = [("pages", "many")].into_iter().collect();
        let writer = CountingWriter::default();

        let err = merge_into(&mut book, (&source).into(), MergeOptions::default(), &writer).unwrap_err();
        assert!(matches!(err, RecordError::TypeMismatch { .. }));
    }

    #[test]
    fn test_failed_merge_leaves_target_untouched() {
        let mut book = saved_book();
        let source: FieldMap = [("pages", Value::Integer(300)), ("rating", Value::from("lots"))]
            .into_iter()
            .collect();
        let writer = CountingWriter::default();

        let err = merge_into(&mut book, (&source).into(), MergeOptions::default(), &writer).unwrap_err();
        assert!(matches!(err, RecordError::TypeMismatch { ref field, .. } if field == "rating"));
        assert_eq!(book.get("pages").unwrap(), &Value::Integer(0));
        assert!(book.changed_fields().is_empty());
        assert_eq!(writer.saves.get(), 0);
    }
}
