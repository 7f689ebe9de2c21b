//! Record type declarations
//!
//! Every record type is a `static` description of its table and ordered
//! fields. Nothing is discovered at runtime: introspection, filtering and
//! persistence all read these declarations.

use chrono::{SubsecRound, Utc};
use std::collections::HashSet;
use std::fmt;

use super::error::{RecordError, RecordResult};
use super::value::{parse_timestamp, Value};
use crate::engine::adapter::dialect::{ColumnDef, ForeignKeyDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Integer,
    Real,
    Text,
    Bool,
    Timestamp,
}

impl ScalarType {
    /// Universal SQL type, mapped per dialect by `DialectGenerator::map_type`
    pub fn universal_type(&self) -> &'static str {
        match self {
            ScalarType::Integer => "BIGINT",
            ScalarType::Real => "DOUBLE",
            ScalarType::Text => "TEXT",
            ScalarType::Bool => "BOOLEAN",
            ScalarType::Timestamp => "TIMESTAMP",
        }
    }

    /// Convert a value into this type's canonical representation
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),

            (ScalarType::Integer, Value::Integer(i)) => Ok(Value::Integer(i)),
            (ScalarType::Integer, Value::Bool(b)) => Ok(Value::Integer(b as i64)),
            (ScalarType::Integer, Value::Real(f)) if f.fract() == 0.0 => Ok(Value::Integer(f as i64)),
            (ScalarType::Integer, Value::Text(s)) => s
                .trim()
                .parse()
                .map(Value::Integer)
                .map_err(|_| format!("'{}' is not an integer", s)),

            (ScalarType::Real, Value::Real(f)) => Ok(Value::Real(f)),
            (ScalarType::Real, Value::Integer(i)) => Ok(Value::Real(i as f64)),
            (ScalarType::Real, Value::Text(s)) => s
                .trim()
                .parse()
                .map(Value::Real)
                .map_err(|_| format!("'{}' is not a number", s)),

            (ScalarType::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (ScalarType::Text, v @ (Value::Integer(_) | Value::Real(_) | Value::Bool(_))) => {
                Ok(Value::Text(v.to_string()))
            }

            (ScalarType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ScalarType::Bool, Value::Integer(i)) if i == 0 || i == 1 => Ok(Value::Bool(i == 1)),
            (ScalarType::Bool, Value::Text(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{}' is not a boolean", s)),
            },

            (ScalarType::Timestamp, Value::Timestamp(dt)) => Ok(Value::Timestamp(dt)),
            (ScalarType::Timestamp, Value::Text(s)) => parse_timestamp(&s)
                .map(Value::Timestamp)
                .ok_or_else(|| format!("'{}' is not a timestamp", s)),
            (ScalarType::Timestamp, Value::Integer(secs)) => chrono::DateTime::from_timestamp(secs, 0)
                .map(Value::Timestamp)
                .ok_or_else(|| format!("{} is out of range for a timestamp", secs)),

            (ty, other) => Err(format!("expected {:?}, got {}", ty, other.kind_name())),
        }
    }
}

/// What a field holds
#[derive(Clone, Copy)]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Identifies a record of another type by its primary key
    Reference(&'static RecordType),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(ty) => write!(f, "Scalar({:?})", ty),
            FieldKind::Reference(target) => write!(f, "Reference({})", target.name),
        }
    }
}

/// Timestamps the store fills in on save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoTimestamp {
    None,
    /// Set once, when the record is first inserted
    OnCreate,
    /// Set on every save
    OnSave,
}

/// Value a fresh record starts with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Bool(bool),
    Integer(i64),
    Text(&'static str),
    Now,
}

impl FieldDefault {
    pub fn value(&self) -> Value {
        match self {
            FieldDefault::Bool(b) => Value::Bool(*b),
            FieldDefault::Integer(i) => Value::Integer(*i),
            FieldDefault::Text(s) => Value::Text(s.to_string()),
            FieldDefault::Now => Value::Timestamp(Utc::now().trunc_subsecs(6)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    /// Storage alias, when the column name differs from the field name
    pub column: Option<&'static str>,
    pub kind: FieldKind,
    pub nullable: bool,
    pub unique: bool,
    pub auto: AutoTimestamp,
    pub default: Option<FieldDefault>,
}

impl FieldDef {
    pub const fn scalar(name: &'static str, ty: ScalarType) -> Self {
        Self {
            name,
            column: None,
            kind: FieldKind::Scalar(ty),
            nullable: true,
            unique: false,
            auto: AutoTimestamp::None,
            default: None,
        }
    }

    pub const fn reference(name: &'static str, target: &'static RecordType) -> Self {
        Self {
            name,
            column: None,
            kind: FieldKind::Reference(target),
            nullable: true,
            unique: false,
            auto: AutoTimestamp::None,
            default: None,
        }
    }

    pub const fn stored_as(self, column: &'static str) -> Self {
        Self { column: Some(column), ..self }
    }

    pub const fn not_null(self) -> Self {
        Self { nullable: false, ..self }
    }

    pub const fn unique_key(self) -> Self {
        Self { unique: true, ..self }
    }

    pub const fn auto_set(self, auto: AutoTimestamp) -> Self {
        Self { auto, ..self }
    }

    pub const fn default_to(self, default: FieldDefault) -> Self {
        Self { default: Some(default), ..self }
    }

    /// Storage alias if declared, else the field name
    pub fn storage_column(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }

    pub fn reference_target(&self) -> Option<&'static RecordType> {
        match self.kind {
            FieldKind::Reference(target) => Some(target),
            FieldKind::Scalar(_) => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference_target().is_some()
    }

    /// Scalar type of what is stored in the column; references store the
    /// target's primary key.
    pub fn storage_type(&self) -> ScalarType {
        match self.kind {
            FieldKind::Scalar(ty) => ty,
            FieldKind::Reference(target) => target.primary_key_type(),
        }
    }
}

pub struct RecordType {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    pub fields: &'static [FieldDef],
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("table", &self.table)
            .finish()
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.table == other.table
    }
}

impl RecordType {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn primary_key_index(&self) -> Option<usize> {
        self.field_index(self.primary_key)
    }

    pub fn primary_key_field(&self) -> Option<&'static FieldDef> {
        self.field(self.primary_key)
    }

    pub fn primary_key_type(&self) -> ScalarType {
        match self.primary_key_field().map(|f| f.kind) {
            Some(FieldKind::Scalar(ty)) => ty,
            _ => ScalarType::Integer,
        }
    }

    /// Primary keys of integer type are assigned by the store
    pub fn has_auto_primary_key(&self) -> bool {
        self.primary_key_type() == ScalarType::Integer
    }

    /// Check the declaration: unique field names, unique storage columns and
    /// a scalar primary key.
    pub fn validate(&self) -> RecordResult<()> {
        let invalid = |reason: String| RecordError::Schema {
            record_type: self.name,
            reason,
        };

        let mut names = HashSet::new();
        let mut columns = HashSet::new();
        for field in self.fields {
            if !names.insert(field.name) {
                return Err(invalid(format!("duplicate field name '{}'", field.name)));
            }
            if !columns.insert(field.storage_column()) {
                return Err(invalid(format!(
                    "duplicate storage column '{}'",
                    field.storage_column()
                )));
            }
        }

        match self.primary_key_field() {
            None => Err(invalid(format!("primary key '{}' is not a field", self.primary_key))),
            Some(field) if field.is_reference() => {
                Err(invalid(format!("primary key '{}' must be a scalar", self.primary_key)))
            }
            Some(_) => Ok(()),
        }
    }

    /// Column definitions for CREATE TABLE
    pub fn column_defs(&self) -> Vec<ColumnDef> {
        self.fields
            .iter()
            .map(|field| {
                let is_pk = field.name == self.primary_key;
                ColumnDef {
                    name: field.storage_column().to_string(),
                    col_type: field.storage_type().universal_type().to_string(),
                    nullable: field.nullable,
                    default_value: None,
                    is_primary_key: is_pk,
                    is_unique: field.unique,
                    is_auto_increment: is_pk && self.has_auto_primary_key(),
                    foreign_key: field.reference_target().map(|target| ForeignKeyDef {
                        table: target.table.to_string(),
                        column: target
                            .primary_key_field()
                            .map(|pk| pk.storage_column())
                            .unwrap_or(target.primary_key)
                            .to_string(),
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::record::fixtures::{AUTHOR, BOOK};

    #[test]
    fn test_storage_column_alias() {
        let author = BOOK.field("author").unwrap();
        assert_eq!(author.storage_column(), "author_id");
        assert!(author.is_reference());
        assert_eq!(author.reference_target(), Some(&AUTHOR));

        let title = BOOK.field("title").unwrap();
        assert_eq!(title.storage_column(), "title");
    }

    #[test]
    fn test_field_names_in_declaration_order() {
        assert_eq!(BOOK.field_names(), vec!["id", "title", "pages", "rating", "author", "in_print", "published"]);
        assert_eq!(BOOK.primary_key_index(), Some(0));
    }

    #[test]
    fn test_validate_rejects_duplicate_columns() {
        static CLASHING: RecordType = RecordType {
            name: "Clashing",
            table: "clashing",
            primary_key: "id",
            fields: &[
                FieldDef::scalar("id", ScalarType::Integer),
                FieldDef::scalar("a", ScalarType::Text).stored_as("shared"),
                FieldDef::scalar("b", ScalarType::Text).stored_as("shared"),
            ],
        };
        assert!(matches!(CLASHING.validate(), Err(RecordError::Schema { .. })));
        assert!(BOOK.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_primary_key() {
        static KEYLESS: RecordType = RecordType {
            name: "Keyless",
            table: "keyless",
            primary_key: "id",
            fields: &[FieldDef::scalar("name", ScalarType::Text)],
        };
        assert!(KEYLESS.validate().is_err());
    }

    #[test]
    fn test_coerce() {
        assert_eq!(ScalarType::Real.coerce(Value::Integer(3)), Ok(Value::Real(3.0)));
        assert_eq!(ScalarType::Bool.coerce(Value::Integer(1)), Ok(Value::Bool(true)));
        assert_eq!(ScalarType::Text.coerce(Value::Integer(7)), Ok(Value::Text("7".into())));
        assert_eq!(ScalarType::Integer.coerce(Value::Text("12".into())), Ok(Value::Integer(12)));
        assert!(ScalarType::Integer.coerce(Value::Text("twelve".into())).is_err());
        assert!(ScalarType::Bool.coerce(Value::Integer(2)).is_err());
        assert!(matches!(
            ScalarType::Timestamp.coerce(Value::Text("2024-01-02T03:04:05Z".into())),
            Ok(Value::Timestamp(_))
        ));
    }

    #[test]
    fn test_column_defs_carry_foreign_keys() {
        let defs = BOOK.column_defs();
        let id = &defs[0];
        assert!(id.is_primary_key && id.is_auto_increment);

        let author = defs.iter().find(|d| d.name == "author_id").unwrap();
        assert_eq!(author.col_type, "BIGINT");
        let fk = author.foreign_key.as_ref().unwrap();
        assert_eq!((fk.table.as_str(), fk.column.as_str()), ("authors", "id"));
    }
}
