//! QuerySet
//!
//! A lazily evaluated SELECT over one record type. Counting an unconstrained
//! queryset reads the store's row estimate instead of scanning the table
//! when the manager allows it.

use tracing::{debug, warn};

use super::adapter::{DialectGenerator, SqlValue};
use super::manager::Manager;
use super::record::filter::{predicate_for, Predicate};
use super::record::{Record, RecordError, RecordResult, Value};

#[derive(Clone)]
pub struct QuerySet<'a> {
    manager: Manager<'a>,
    predicates: Vec<Predicate>,
    limit: Option<usize>,
    offset: usize,
    distinct: bool,
    cache: Option<Vec<Record>>,
}

impl<'a> QuerySet<'a> {
    pub fn new(manager: Manager<'a>) -> Self {
        Self {
            manager,
            predicates: Vec::new(),
            limit: None,
            offset: 0,
            distinct: false,
            cache: None,
        }
    }

    /// Narrow to records whose `field` equals `value`; conditions are ANDed
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> RecordResult<Self> {
        let rt = self.manager.record_type();
        let def = rt.field(field).ok_or_else(|| RecordError::UnknownField {
            record_type: rt.name,
            field: field.to_string(),
        })?;
        self.predicates.push(predicate_for(def, &value.into())?);
        self.cache = None;
        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self.cache = None;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self.cache = None;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self.cache = None;
        self
    }

    /// No conditions, no slicing and no DISTINCT
    pub fn is_unconstrained(&self) -> bool {
        self.predicates.is_empty() && self.limit.is_none() && self.offset == 0 && !self.distinct
    }

    fn where_clause(&self, gen: &DialectGenerator) -> (String, Vec<SqlValue>) {
        if self.predicates.is_empty() {
            return (String::new(), Vec::new());
        }
        let mut conditions = Vec::with_capacity(self.predicates.len());
        let mut params = Vec::new();
        for predicate in &self.predicates {
            conditions.push(predicate.condition(gen, params.len() + 1));
            if predicate.binds() {
                params.push(predicate.value.clone());
            }
        }
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }

    fn select(&self) -> (String, Vec<SqlValue>) {
        let gen = self.manager.generator();
        let rt = self.manager.record_type();
        let (where_clause, params) = self.where_clause(&gen);
        let order_column = rt
            .primary_key_field()
            .map(|f| f.storage_column())
            .unwrap_or(rt.primary_key);

        let sql = format!(
            "SELECT {}* FROM {}{} ORDER BY {}{}",
            if self.distinct { "DISTINCT " } else { "" },
            gen.quote_ident(rt.table),
            where_clause,
            gen.quote_ident(order_column),
            gen.limit_clause(self.limit, self.offset)
        );
        (sql, params)
    }

    /// The SELECT this queryset runs
    pub fn sql(&self) -> String {
        self.select().0
    }

    /// Run the query once and keep the rows
    pub fn fetch(&mut self) -> RecordResult<&[Record]> {
        if self.cache.is_none() {
            let rt = self.manager.record_type();
            let (sql, params) = self.select();
            let result = self.manager.adapter().query(&sql, &params)?;
            let records = result
                .rows
                .iter()
                .map(|row| Record::from_row(rt, &result, row))
                .collect::<RecordResult<Vec<_>>>()?;
            self.cache = Some(records);
        }
        Ok(self.cache.as_deref().unwrap_or_default())
    }

    pub fn records(mut self) -> RecordResult<Vec<Record>> {
        self.fetch()?;
        Ok(self.cache.take().unwrap_or_default())
    }

    pub fn first(self) -> RecordResult<Option<Record>> {
        Ok(self.limit(1).records()?.into_iter().next())
    }

    /// Number of matching records.
    ///
    /// Fetched rows are counted directly. An unconstrained queryset takes
    /// the store's estimate when approximate counts are on and the store
    /// keeps one; anything else is an exact `COUNT(*)`.
    pub fn count(&self) -> RecordResult<u64> {
        if let Some(cached) = &self.cache {
            return Ok(cached.len() as u64);
        }

        let rt = self.manager.record_type();
        if self.is_unconstrained() && self.manager.approximate_counts() {
            match self.manager.adapter().estimated_row_count(rt.table) {
                Ok(Some(estimate)) => {
                    debug!(table = rt.table, estimate, "using estimated row count");
                    return Ok(estimate);
                }
                Ok(None) => {}
                Err(e) => warn!(table = rt.table, error = %e, "row estimate failed, counting exactly"),
            }
        }
        self.exact_count()
    }

    /// `COUNT(*)`, never estimated
    pub fn exact_count(&self) -> RecordResult<u64> {
        let gen = self.manager.generator();
        let rt = self.manager.record_type();
        let (sql, params) = if self.limit.is_some() || self.offset > 0 || self.distinct {
            let (select, params) = self.select();
            (format!("SELECT COUNT(*) FROM ({}) AS counted", select), params)
        } else {
            let (where_clause, params) = self.where_clause(&gen);
            (
                format!("SELECT COUNT(*) FROM {}{}", gen.quote_ident(rt.table), where_clause),
                params,
            )
        };

        let result = self.manager.adapter().query(&sql, &params)?;
        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(SqlValue::as_i64)
            .map(|n| n as u64)
            .ok_or_else(|| RecordError::Decode {
                table: rt.table,
                column: "COUNT(*)",
                reason: "count query returned no rows".to_string(),
            })
    }
}
