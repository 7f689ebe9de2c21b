//! Record Manager
//!
//! Per-record-type handle over a `DatabaseAdapter`: table creation, lookup,
//! persistence, dynamic OR filters and merges.

use chrono::{SubsecRound, Utc};
use tracing::{debug, info};

use super::adapter::{DatabaseAdapter, DialectGenerator, SqlValue};
use super::queryset::QuerySet;
use super::record::{
    execute_or_query, introspect, AutoTimestamp, FieldMap, FieldReader, MergeOptions,
    MergeSource, Record, RecordError, RecordResult, RecordType, RecordWriter, RelationResolver,
    Value,
};

#[derive(Clone, Copy)]
pub struct Manager<'a> {
    adapter: &'a dyn DatabaseAdapter,
    record_type: &'static RecordType,
    approximate_counts: bool,
}

impl<'a> Manager<'a> {
    pub fn new(adapter: &'a dyn DatabaseAdapter, record_type: &'static RecordType) -> Self {
        Self {
            adapter,
            record_type,
            approximate_counts: true,
        }
    }

    /// Whether unconstrained counts may use the store's row estimate
    pub fn with_approximate_counts(mut self, enabled: bool) -> Self {
        self.approximate_counts = enabled;
        self
    }

    pub fn adapter(&self) -> &'a dyn DatabaseAdapter {
        self.adapter
    }

    pub fn record_type(&self) -> &'static RecordType {
        self.record_type
    }

    pub fn approximate_counts(&self) -> bool {
        self.approximate_counts
    }

    pub(crate) fn generator(&self) -> DialectGenerator {
        DialectGenerator::new(self.adapter.dialect())
    }

    /// Create the record type's table if it does not exist yet
    pub fn create_table(&self) -> RecordResult<()> {
        self.record_type.validate()?;
        let sql = self
            .generator()
            .create_table(self.record_type.table, &self.record_type.column_defs());
        self.adapter.execute_batch(&sql)?;
        debug!(table = self.record_type.table, "ensured table");
        Ok(())
    }

    /// Look a record up by primary key
    pub fn get(&self, pk: impl Into<Value>) -> RecordResult<Option<Record>> {
        let rt = self.record_type;
        let pk = rt.primary_key_type().coerce(pk.into()).map_err(|reason| RecordError::TypeMismatch {
            field: rt.primary_key.to_string(),
            reason,
        })?;
        let Some(pk) = pk.to_sql().filter(|v| *v != SqlValue::Null) else {
            return Ok(None);
        };

        let gen = self.generator();
        let sql = format!(
            "SELECT * FROM {} WHERE {} = {}",
            gen.quote_ident(rt.table),
            gen.quote_ident(self.pk_column()),
            gen.placeholder(1)
        );
        let result = self.adapter.query(&sql, &[pk])?;
        result
            .rows
            .first()
            .map(|row| Record::from_row(rt, &result, row))
            .transpose()
    }

    /// Every record of this type, lazily
    pub fn all(&self) -> QuerySet<'a> {
        QuerySet::new(*self)
    }

    /// Records whose `field` equals `value`
    pub fn filter(&self, field: &str, value: impl Into<Value>) -> RecordResult<QuerySet<'a>> {
        self.all().filter(field, value)
    }

    pub fn count(&self) -> RecordResult<u64> {
        self.all().count()
    }

    /// Records matching any key of `filter` that names a field
    pub fn dynamic_or(&self, filter: &FieldMap) -> RecordResult<Vec<Record>> {
        execute_or_query(self.adapter, self.record_type, filter)
    }

    /// Merge into `target` and save it through this manager when it changed
    pub fn merge_into(
        &self,
        target: &mut Record,
        source: MergeSource<'_>,
        options: MergeOptions,
    ) -> RecordResult<bool> {
        self.ensure_owns(target)?;
        introspect::merge_into(target, source, options, self)
    }

    /// Field reader that loads unloaded references through this store
    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader::with_resolver(self)
    }

    /// Replace primary keys held by reference fields of `values` with the
    /// records they identify, so the mapping can be used as a filter.
    pub fn hydrate_references(&self, values: FieldMap) -> RecordResult<FieldMap> {
        let mut hydrated = FieldMap::new();
        for (key, value) in values {
            let target = self.record_type.field(&key).and_then(|f| f.reference_target());
            let value = match (target, value) {
                (Some(target), key_value) if !key_value.is_null() && !matches!(key_value, Value::Record(_)) => {
                    let related = self.resolve(target, &key_value)?.ok_or_else(|| {
                        RecordError::Validation(format!("no {} with primary key {}", target.name, key_value))
                    })?;
                    Value::from(related)
                }
                (_, other) => other,
            };
            hydrated.insert(key, value);
        }
        Ok(hydrated)
    }

    /// Insert or update `record`.
    ///
    /// A null primary key inserts and takes the key the store assigns. A set
    /// key updates, and inserts when no row had that key.
    pub fn save(&self, record: &mut Record) -> RecordResult<()> {
        self.ensure_owns(record)?;
        let rt = self.record_type;

        // Stored timestamps keep microseconds
        let now = Utc::now().trunc_subsecs(6);
        for (idx, field) in rt.fields.iter().enumerate() {
            match field.auto {
                AutoTimestamp::OnSave => record.set_at(idx, Value::Timestamp(now))?,
                AutoTimestamp::OnCreate if record.value_at(idx).is_null() => {
                    record.set_at(idx, Value::Timestamp(now))?
                }
                _ => {}
            }
        }

        let created = if record.pk().is_null() {
            self.insert(record)?;
            true
        } else if self.update(record)? == 0 {
            self.insert(record)?;
            true
        } else {
            false
        };

        record.mark_persisted();
        info!(
            record_type = rt.name,
            pk = %record.pk(),
            created,
            "saved record"
        );
        Ok(())
    }

    fn insert(&self, record: &mut Record) -> RecordResult<()> {
        let rt = self.record_type;
        let assign_pk = record.pk().is_null();
        if assign_pk && !rt.has_auto_primary_key() {
            return Err(RecordError::Validation(format!(
                "{} needs a primary key before it can be saved",
                rt.name
            )));
        }

        let gen = self.generator();
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for (field, value) in record.iter() {
            if field.name == rt.primary_key && value.is_null() {
                continue;
            }
            columns.push(gen.quote_ident(field.storage_column()));
            params.push(bindable(field.name, value)?);
        }

        let table = gen.quote_ident(rt.table);
        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let placeholders: Vec<String> = (1..=params.len()).map(|i| gen.placeholder(i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let exec = self.adapter.execute(&sql, &params)?;
        if assign_pk {
            let id = exec.last_insert_id.ok_or_else(|| {
                RecordError::Validation(format!("store assigned no primary key to the new {}", rt.name))
            })?;
            if let Some(idx) = rt.primary_key_index() {
                record.set_at(idx, Value::Integer(id))?;
            }
        }
        Ok(())
    }

    /// Rows affected by updating `record` in place
    fn update(&self, record: &Record) -> RecordResult<u64> {
        let rt = self.record_type;
        let gen = self.generator();

        let mut sets = Vec::new();
        let mut params = Vec::new();
        for (field, value) in record.iter() {
            if field.name == rt.primary_key {
                continue;
            }
            params.push(bindable(field.name, value)?);
            sets.push(format!(
                "{} = {}",
                gen.quote_ident(field.storage_column()),
                gen.placeholder(params.len())
            ));
        }
        params.push(bindable(rt.primary_key, record.pk())?);
        let pk_condition = format!("{} = {}", gen.quote_ident(self.pk_column()), gen.placeholder(params.len()));

        if sets.is_empty() {
            // Nothing but the key: the row either exists or it does not
            let sql = format!("SELECT 1 FROM {} WHERE {}", gen.quote_ident(rt.table), pk_condition);
            return Ok(self.adapter.query(&sql, &params)?.rows.len() as u64);
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            gen.quote_ident(rt.table),
            sets.join(", "),
            pk_condition
        );
        Ok(self.adapter.execute(&sql, &params)?.affected_rows)
    }

    fn pk_column(&self) -> &'static str {
        self.record_type
            .primary_key_field()
            .map(|f| f.storage_column())
            .unwrap_or(self.record_type.primary_key)
    }

    fn ensure_owns(&self, record: &Record) -> RecordResult<()> {
        if record.record_type() != self.record_type {
            return Err(RecordError::Validation(format!(
                "a {} record cannot be handled by the {} manager",
                record.record_type().name,
                self.record_type.name
            )));
        }
        Ok(())
    }
}

fn bindable(field: &str, value: &Value) -> RecordResult<SqlValue> {
    value.to_sql().ok_or_else(|| RecordError::TypeMismatch {
        field: field.to_string(),
        reason: format!("a {} cannot be stored", value.kind_name()),
    })
}

impl RecordWriter for Manager<'_> {
    fn save(&self, record: &mut Record) -> RecordResult<()> {
        Manager::save(self, record)
    }
}

impl RelationResolver for Manager<'_> {
    fn resolve(&self, record_type: &'static RecordType, pk: &Value) -> RecordResult<Option<Record>> {
        Manager::new(self.adapter, record_type).get(pk.clone())
    }
}
