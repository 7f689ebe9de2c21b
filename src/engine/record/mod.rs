//! Record layer
//!
//! Statically declared record types, change-tracked records, field
//! introspection and merging, and dynamic OR filters.

pub mod error;
pub mod filter;
pub mod introspect;
pub mod record;
pub mod schema;
pub mod value;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{FieldAccessError, RecordError, RecordResult};
pub use filter::{
    build_dynamic_or_query, build_predicates, execute_or_query, project_filter, DynamicOrQuery,
    FilterProjection, Predicate,
};
pub use introspect::{
    apply_merge, field_values, get_field_value, list_field_names, merge_into, FieldReader,
    MergeOptions, MergeSource, RecordWriter, RelationResolver,
};
pub use record::Record;
pub use schema::{AutoTimestamp, FieldDef, FieldDefault, FieldKind, RecordType, ScalarType};
pub use value::{format_timestamp, parse_timestamp, FieldMap, Value};
