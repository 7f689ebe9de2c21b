//! recordkit - Typed record layer over SQLite
//!
//! Statically declared record types, change-tracked records, field
//! introspection and merging, dynamic OR filters and an approximate-count
//! queryset.

pub mod engine;

pub use engine::adapter::sqlite::SqliteAdapter;
pub use engine::adapter::{DatabaseAdapter, SqlDialect, SqlValue};
pub use engine::manager::Manager;
pub use engine::queryset::QuerySet;
pub use engine::record::{
    build_predicates, execute_or_query, field_values, get_field_value, list_field_names, merge_into, FieldMap,
    MergeOptions, MergeSource, Record, RecordError, RecordResult, RecordType, Value,
};
pub use engine::users::UserManager;
