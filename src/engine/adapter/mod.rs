//! Database Adapter Layer
//!
//! Provides a trait-based abstraction over the backing store. Records,
//! managers and querysets only ever talk to a `DatabaseAdapter`; SQLite is
//! the bundled implementation.

pub mod dialect;
pub mod sqlite;

pub use dialect::{DialectGenerator, SqlDialect};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Universal result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Core database adapter trait, implemented by every backend
pub trait DatabaseAdapter: Send + Sync {
    /// Which SQL dialect this adapter uses
    fn dialect(&self) -> SqlDialect;

    /// Execute a query that returns rows (SELECT, PRAGMA, etc.)
    fn query(&self, sql: &str, params: &[SqlValue]) -> AdapterResult<QueryResult>;

    /// Execute a statement that modifies data (INSERT, UPDATE, DELETE, CREATE, etc.)
    fn execute(&self, sql: &str, params: &[SqlValue]) -> AdapterResult<ExecResult>;

    /// Execute multiple statements as a batch
    fn execute_batch(&self, sql: &str) -> AdapterResult<()>;

    /// Get all user table names
    fn get_tables(&self) -> AdapterResult<Vec<String>>;

    /// Whether a table with this name exists
    fn table_exists(&self, table: &str) -> AdapterResult<bool> {
        Ok(self.get_tables()?.iter().any(|t| t == table))
    }

    /// Exact row count for a table
    fn get_row_count(&self, table: &str) -> AdapterResult<u64>;

    /// Cheap row count estimate kept by the store's statistics, if any.
    ///
    /// `None` means the store has no estimate for this table and callers
    /// should fall back to an exact count.
    fn estimated_row_count(&self, table: &str) -> AdapterResult<Option<u64>>;
}

/// SQL value for parameterized queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Bool(b) => Some(*b as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Result from a SELECT-type query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Position of a column in each row
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Result from an INSERT/UPDATE/DELETE-type statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub affected_rows: u64,
    pub last_insert_id: Option<i64>,
    pub execution_time_ms: u64,
}

/// Database adapter errors
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_as_i64() {
        assert_eq!(SqlValue::Integer(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(SqlValue::Bool(true).as_i64(), Some(1));
        assert_eq!(SqlValue::Real(1.5).as_i64(), None);
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn test_column_index() {
        let result = QueryResult {
            columns: vec!["id".into(), "name".into()],
            rows: vec![],
            execution_time_ms: 0,
        };
        assert_eq!(result.column_index("name"), Some(1));
        assert_eq!(result.column_index("missing"), None);
    }
}
