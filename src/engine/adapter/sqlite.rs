//! SQLite Adapter
//!
//! Implements DatabaseAdapter for SQLite using rusqlite + r2d2 connection pooling.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::dialect::{DialectGenerator, SqlDialect};
use super::{AdapterError, AdapterResult, DatabaseAdapter, ExecResult, QueryResult, SqlValue};
use crate::engine::querylog::QueryLog;

type DbPool = Pool<SqliteConnectionManager>;
type DbConn = PooledConnection<SqliteConnectionManager>;

const DEFAULT_POOL_SIZE: u32 = 10;

pub struct SqliteAdapter {
    pool: DbPool,
    db_path: PathBuf,
    query_log: Option<Arc<QueryLog>>,
}

impl SqliteAdapter {
    pub fn new(db_path: &Path) -> AdapterResult<Self> {
        Self::with_pool_size(db_path, DEFAULT_POOL_SIZE)
    }

    pub fn with_pool_size(db_path: &Path, pool_size: u32) -> AdapterResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys=ON"));
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        let adapter = Self {
            pool,
            db_path: db_path.to_path_buf(),
            query_log: None,
        };
        adapter.init_schema()?;
        Ok(adapter)
    }

    /// Every pooled connection to `:memory:` is its own database, so the
    /// pool is capped at one connection.
    pub fn in_memory() -> AdapterResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys=ON"));
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AdapterError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            db_path: PathBuf::from(":memory:"),
            query_log: None,
        })
    }

    /// Attach a query log; every statement run afterwards is recorded in it
    pub fn with_query_log(mut self, log: Arc<QueryLog>) -> Self {
        self.query_log = Some(log);
        self
    }

    pub fn query_log(&self) -> Option<&Arc<QueryLog>> {
        self.query_log.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> AdapterResult<()> {
        let conn = self.get_conn()?;
        let _: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| AdapterError::Schema(e.to_string()))?;
        Ok(())
    }

    fn get_conn(&self) -> AdapterResult<DbConn> {
        self.pool
            .get()
            .map_err(|e| AdapterError::Connection(e.to_string()))
    }

    fn log(&self, sql: &str, start: Instant) {
        let elapsed = start.elapsed();
        debug!(sql = sql.trim(), elapsed_us = elapsed.as_micros() as u64, "executed statement");
        if let Some(log) = &self.query_log {
            log.record(sql, elapsed);
        }
    }

    fn value_ref_to_sql(val: ValueRef<'_>) -> SqlValue {
        match val {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(*b as i64)),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl DatabaseAdapter for SqliteAdapter {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> AdapterResult<QueryResult> {
        let conn = self.get_conn()?;
        let start = Instant::now();

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AdapterError::Query(e.to_string()))?;

        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                let mut vals = Vec::with_capacity(width);
                for i in 0..width {
                    vals.push(Self::value_ref_to_sql(row.get_ref(i)?));
                }
                Ok(vals)
            })
            .map_err(|e| AdapterError::Query(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AdapterError::Query(e.to_string()))?;

        self.log(sql, start);
        Ok(QueryResult {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> AdapterResult<ExecResult> {
        let conn = self.get_conn()?;
        let start = Instant::now();

        let affected = conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))
            .map_err(|e| AdapterError::Query(e.to_string()))?;

        let last_id = conn.last_insert_rowid();

        self.log(sql, start);
        Ok(ExecResult {
            affected_rows: affected as u64,
            last_insert_id: Some(last_id),
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn execute_batch(&self, sql: &str) -> AdapterResult<()> {
        let conn = self.get_conn()?;
        let start = Instant::now();
        conn.execute_batch(sql)
            .map_err(|e| AdapterError::Query(e.to_string()))?;
        self.log(sql, start);
        Ok(())
    }

    fn get_tables(&self) -> AdapterResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .map_err(|e| AdapterError::Query(e.to_string()))?;

        let tables = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| AdapterError::Query(e.to_string()))?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| AdapterError::Query(e.to_string()))?;

        Ok(tables)
    }

    fn table_exists(&self, table: &str) -> AdapterResult<bool> {
        let conn = self.get_conn()?;
        let found: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| AdapterError::Query(e.to_string()))?;
        Ok(found > 0)
    }

    fn get_row_count(&self, table: &str) -> AdapterResult<u64> {
        let generator = DialectGenerator::new(self.dialect());
        let sql = format!("SELECT COUNT(*) FROM {}", generator.quote_ident(table));
        let result = self.query(&sql, &[])?;
        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .map(|n| n as u64)
            .ok_or_else(|| AdapterError::Query(format!("COUNT(*) on {} returned no rows", table)))
    }

    /// Reads the row estimate `ANALYZE` leaves in `sqlite_stat1`. The first
    /// integer of a `stat` entry is the table's row count at analysis time.
    fn estimated_row_count(&self, table: &str) -> AdapterResult<Option<u64>> {
        if !self.table_exists("sqlite_stat1")? {
            return Ok(None);
        }

        let generator = DialectGenerator::new(self.dialect());
        let result = self.query(
            generator.estimated_count_sql(),
            &[SqlValue::Text(table.to_string())],
        )?;

        let estimate = result
            .rows
            .first()
            .and_then(|row| row.get(generator.estimate_column()))
            .and_then(|stat| match stat {
                SqlValue::Text(s) => s.split_whitespace().next().and_then(|n| n.parse().ok()),
                other => other.as_i64().map(|n| n as u64),
            });
        Ok(estimate)
    }
}
