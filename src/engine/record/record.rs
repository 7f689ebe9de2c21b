//! Change-tracked record instances

use std::fmt;

use super::error::{RecordError, RecordResult};
use super::schema::{FieldDef, FieldKind, RecordType};
use super::value::{FieldMap, Value};
use crate::engine::adapter::QueryResult;
use crate::engine::adapter::SqlValue;

static NULL: Value = Value::Null;

/// A value assignment over a record type's fields.
///
/// Values are held in declaration order. The tracked snapshot is the state
/// at construction or after the last load/save; `changed_fields` compares
/// against it, with reference slots compared by primary key.
#[derive(Clone)]
pub struct Record {
    record_type: &'static RecordType,
    values: Vec<Value>,
    tracked: Vec<Value>,
}

impl Record {
    /// Fresh record holding each field's default, or null
    pub fn new(record_type: &'static RecordType) -> Self {
        let values: Vec<Value> = record_type
            .fields
            .iter()
            .map(|f| f.default.map(|d| d.value()).unwrap_or(Value::Null))
            .collect();
        let tracked = values.iter().map(Value::reference_key).collect();
        Self {
            record_type,
            values,
            tracked,
        }
    }

    /// Fresh record with the given values applied; the result counts as
    /// unchanged, like a freshly constructed instance.
    pub fn with_values<I, K, V>(record_type: &'static RecordType, values: I) -> RecordResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::new(record_type);
        for (name, value) in values {
            record.set(name.as_ref(), value)?;
        }
        record.mark_persisted();
        Ok(record)
    }

    /// Decode one row of a SELECT over this record type's table
    pub fn from_row(
        record_type: &'static RecordType,
        result: &QueryResult,
        row: &[SqlValue],
    ) -> RecordResult<Self> {
        let mut values = Vec::with_capacity(record_type.fields.len());
        for field in record_type.fields {
            let column = field.storage_column();
            let decode_err = |reason: String| RecordError::Decode {
                table: record_type.table,
                column,
                reason,
            };
            let raw = result
                .column_index(column)
                .and_then(|idx| row.get(idx))
                .ok_or_else(|| decode_err("column missing from result".to_string()))?;
            let value = field
                .storage_type()
                .coerce(Value::from_sql(raw.clone()))
                .map_err(decode_err)?;
            values.push(value);
        }

        let tracked = values.iter().map(Value::reference_key).collect();
        Ok(Self {
            record_type,
            values,
            tracked,
        })
    }

    pub fn record_type(&self) -> &'static RecordType {
        self.record_type
    }

    pub fn get(&self, name: &str) -> RecordResult<&Value> {
        let idx = self.index_of(name)?;
        Ok(&self.values[idx])
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> RecordResult<()> {
        let idx = self.index_of(name)?;
        self.set_at(idx, value.into())
    }

    pub fn value_at(&self, idx: usize) -> &Value {
        &self.values[idx]
    }

    /// Write a field by position, coercing to the field's type
    pub(crate) fn set_at(&mut self, idx: usize, value: Value) -> RecordResult<()> {
        let field = &self.record_type.fields[idx];
        self.values[idx] = coerce_for_field(field, value)?;
        Ok(())
    }

    /// Write several fields by position. Every value is coerced before any
    /// is stored, so a failure leaves the record untouched.
    pub(crate) fn set_all_at(&mut self, updates: Vec<(usize, Value)>) -> RecordResult<()> {
        let coerced = updates
            .into_iter()
            .map(|(idx, value)| Ok((idx, coerce_for_field(&self.record_type.fields[idx], value)?)))
            .collect::<RecordResult<Vec<_>>>()?;
        for (idx, value) in coerced {
            self.values[idx] = value;
        }
        Ok(())
    }

    /// Fields paired with their current values, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&'static FieldDef, &Value)> {
        self.record_type.fields.iter().zip(self.values.iter())
    }

    /// Primary key value, null until the record is first saved
    pub fn pk(&self) -> &Value {
        match self.record_type.primary_key_index() {
            Some(idx) => &self.values[idx],
            None => &NULL,
        }
    }

    /// Names of fields whose value differs from the tracked snapshot
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.iter()
            .zip(self.tracked.iter())
            .filter(|((_, current), previous)| current.reference_key() != **previous)
            .map(|((field, _), _)| field.name)
            .collect()
    }

    pub fn has_changed(&self) -> bool {
        !self.changed_fields().is_empty()
    }

    /// Value of a field as of the tracked snapshot
    pub fn previous(&self, name: &str) -> RecordResult<&Value> {
        let idx = self.index_of(name)?;
        Ok(&self.tracked[idx])
    }

    /// Take the current values as the new snapshot
    pub(crate) fn mark_persisted(&mut self) {
        self.tracked = self.values.iter().map(Value::reference_key).collect();
    }

    /// Flat JSON object of the record; references appear as primary keys
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (field, value) in self.iter() {
            obj.insert(field.name.to_string(), value.reference_key().to_json());
        }
        serde_json::Value::Object(obj)
    }

    /// Field values with references collapsed to keys
    pub fn to_field_map(&self) -> FieldMap {
        self.iter()
            .map(|(field, value)| (field.name, value.reference_key()))
            .collect()
    }

    fn index_of(&self, name: &str) -> RecordResult<usize> {
        self.record_type
            .field_index(name)
            .ok_or_else(|| RecordError::UnknownField {
                record_type: self.record_type.name,
                field: name.to_string(),
            })
    }
}

fn coerce_for_field(field: &FieldDef, value: Value) -> RecordResult<Value> {
    let mismatch = |reason: String| RecordError::TypeMismatch {
        field: field.name.to_string(),
        reason,
    };

    match (field.kind, value) {
        (_, Value::Map(_)) => Err(mismatch("a map cannot be stored in a field".to_string())),
        (FieldKind::Reference(target), Value::Record(related)) => {
            if related.record_type() != target {
                return Err(mismatch(format!(
                    "expected a {} record, got a {} record",
                    target.name,
                    related.record_type().name
                )));
            }
            Ok(Value::Record(related))
        }
        (FieldKind::Reference(target), key) => target.primary_key_type().coerce(key).map_err(mismatch),
        (FieldKind::Scalar(_), Value::Record(related)) => Err(mismatch(format!(
            "a {} record cannot be stored in a scalar field",
            related.record_type().name
        ))),
        (FieldKind::Scalar(ty), scalar) => ty.coerce(scalar).map_err(mismatch),
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.record_type == other.record_type && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.record_type.name);
        for (field, value) in self.iter() {
            out.field(field.name, value);
        }
        out.finish()
    }
}
