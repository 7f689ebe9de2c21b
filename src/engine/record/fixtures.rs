//! Record types shared by unit tests

use super::record::Record;
use super::schema::{FieldDef, RecordType, ScalarType};
use super::value::Value;

pub static AUTHOR: RecordType = RecordType {
    name: "Author",
    table: "authors",
    primary_key: "id",
    fields: &[
        FieldDef::scalar("id", ScalarType::Integer),
        FieldDef::scalar("name", ScalarType::Text).not_null(),
        FieldDef::scalar("email", ScalarType::Text),
    ],
};

pub static BOOK: RecordType = RecordType {
    name: "Book",
    table: "books",
    primary_key: "id",
    fields: &[
        FieldDef::scalar("id", ScalarType::Integer),
        FieldDef::scalar("title", ScalarType::Text),
        FieldDef::scalar("pages", ScalarType::Integer),
        FieldDef::scalar("rating", ScalarType::Real),
        FieldDef::reference("author", &AUTHOR).stored_as("author_id"),
        FieldDef::scalar("in_print", ScalarType::Bool),
        FieldDef::scalar("published", ScalarType::Timestamp),
    ],
};

/// An author as if loaded from the store
pub fn author(id: i64, name: &str) -> Record {
    Record::with_values(
        &AUTHOR,
        [("id", Value::Integer(id)), ("name", Value::from(name))],
    )
    .expect("fixture author")
}
