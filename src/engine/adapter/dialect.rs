//! SQL Dialect Generator
//!
//! Generates database-specific SQL from universal type definitions.
//! Supports SQLite, PostgreSQL, and MySQL dialects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlDialect::Sqlite => write!(f, "sqlite"),
            SqlDialect::Postgres => write!(f, "postgres"),
            SqlDialect::Mysql => write!(f, "mysql"),
        }
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(SqlDialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(SqlDialect::Postgres),
            "mysql" | "mariadb" => Ok(SqlDialect::Mysql),
            other => Err(format!("unknown SQL dialect: {}", other)),
        }
    }
}

/// SQL dialect-aware code generator
pub struct DialectGenerator {
    pub dialect: SqlDialect,
}

impl DialectGenerator {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Map a universal/generic type to the dialect-specific type
    pub fn map_type(&self, universal_type: &str) -> String {
        let upper = universal_type.to_uppercase();
        match (self.dialect, upper.as_str()) {
            // Booleans
            (SqlDialect::Sqlite, "BOOLEAN") => "INTEGER".into(),
            (SqlDialect::Postgres, "BOOLEAN") => "BOOLEAN".into(),
            (SqlDialect::Mysql, "BOOLEAN") => "TINYINT(1)".into(),

            // Date/Time
            (SqlDialect::Sqlite, "TIMESTAMP") => "TEXT".into(),
            (SqlDialect::Postgres, "TIMESTAMP") => "TIMESTAMPTZ".into(),
            (SqlDialect::Mysql, "TIMESTAMP") => "DATETIME(6)".into(),

            // Big integer
            (SqlDialect::Sqlite, "BIGINT") => "INTEGER".into(),
            (_, "BIGINT") => "BIGINT".into(),

            // Float / Double
            (SqlDialect::Sqlite, "DOUBLE") => "REAL".into(),
            (SqlDialect::Postgres, "DOUBLE") => "DOUBLE PRECISION".into(),
            (SqlDialect::Mysql, "DOUBLE") => "DOUBLE".into(),

            // MySQL cannot index unbounded TEXT
            (SqlDialect::Mysql, "TEXT") => "VARCHAR(255)".into(),

            // Pass through unchanged
            _ => universal_type.to_string(),
        }
    }

    /// Get the auto-increment syntax for a primary key column
    pub fn auto_increment_pk(&self, col_name: &str) -> String {
        let col = self.quote_ident(col_name);
        match self.dialect {
            SqlDialect::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", col),
            SqlDialect::Postgres => format!("{} BIGSERIAL PRIMARY KEY", col),
            SqlDialect::Mysql => format!("{} BIGINT AUTO_INCREMENT PRIMARY KEY", col),
        }
    }

    /// Quote an identifier (table or column name)
    pub fn quote_ident(&self, name: &str) -> String {
        match self.dialect {
            SqlDialect::Sqlite | SqlDialect::Postgres => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            SqlDialect::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// Bind parameter placeholder, 1-based
    pub fn placeholder(&self, index: usize) -> String {
        match self.dialect {
            SqlDialect::Sqlite => format!("?{}", index),
            SqlDialect::Postgres => format!("${}", index),
            SqlDialect::Mysql => "?".to_string(),
        }
    }

    /// Generate CREATE TABLE SQL
    pub fn create_table(&self, table: &str, columns: &[ColumnDef]) -> String {
        let mut col_defs = Vec::new();

        for col in columns {
            if col.is_auto_increment && col.is_primary_key {
                col_defs.push(self.auto_increment_pk(&col.name));
                continue;
            }

            let mut def = format!("{} {}", self.quote_ident(&col.name), self.map_type(&col.col_type));
            if col.is_primary_key {
                def.push_str(" PRIMARY KEY");
            }
            if !col.nullable && !col.is_primary_key {
                def.push_str(" NOT NULL");
            }
            if col.is_unique && !col.is_primary_key {
                def.push_str(" UNIQUE");
            }
            if let Some(ref default) = col.default_value {
                if !default.is_empty() {
                    def.push_str(&format!(" DEFAULT {}", default));
                }
            }
            if let Some(ref fk) = col.foreign_key {
                def.push_str(&format!(
                    " REFERENCES {}({})",
                    self.quote_ident(&fk.table),
                    self.quote_ident(&fk.column)
                ));
            }

            col_defs.push(def);
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n);",
            self.quote_ident(table),
            col_defs.join(",\n  ")
        )
    }

    /// LIMIT/OFFSET tail for a SELECT, empty when neither applies
    pub fn limit_clause(&self, limit: Option<usize>, offset: usize) -> String {
        match (limit, offset) {
            (None, 0) => String::new(),
            (Some(n), 0) => format!(" LIMIT {}", n),
            (Some(n), off) => format!(" LIMIT {} OFFSET {}", n, off),
            // An OFFSET alone is not valid SQL in SQLite or MySQL
            (None, off) => match self.dialect {
                SqlDialect::Sqlite => format!(" LIMIT -1 OFFSET {}", off),
                SqlDialect::Postgres => format!(" OFFSET {}", off),
                SqlDialect::Mysql => format!(" LIMIT 18446744073709551615 OFFSET {}", off),
            },
        }
    }

    /// Statement reading the store's own row estimate for a table.
    ///
    /// Takes the table name as its single bind parameter. The estimate lives
    /// in a different column per dialect; see `estimate_column`.
    pub fn estimated_count_sql(&self) -> &'static str {
        match self.dialect {
            SqlDialect::Sqlite => {
                "SELECT stat FROM sqlite_stat1 WHERE tbl = ?1 ORDER BY idx IS NULL DESC LIMIT 1"
            }
            SqlDialect::Postgres => {
                "SELECT reltuples::bigint FROM pg_class WHERE relname = $1 AND relkind = 'r'"
            }
            SqlDialect::Mysql => "SHOW TABLE STATUS LIKE ?",
        }
    }

    /// Column of `estimated_count_sql`'s first row holding the estimate
    pub fn estimate_column(&self) -> usize {
        match self.dialect {
            SqlDialect::Sqlite | SqlDialect::Postgres => 0,
            // Name, Engine, Version, Row_format, Rows
            SqlDialect::Mysql => 4,
        }
    }
}

/// Column definition used by the dialect generator
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub col_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub is_auto_increment: bool,
    pub foreign_key: Option<ForeignKeyDef>,
}

/// Foreign key definition for column defs
#[derive(Debug, Clone)]
pub struct ForeignKeyDef {
    pub table: String,
    pub column: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, col_type: &str) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            col_type: col_type.to_string(),
            nullable: true,
            default_value: None,
            is_primary_key: false,
            is_unique: false,
            is_auto_increment: false,
            foreign_key: None,
        }
    }

    #[test]
    fn test_dialect_parse() {
        assert_eq!("SQLite3".parse::<SqlDialect>(), Ok(SqlDialect::Sqlite));
        assert_eq!("pg".parse::<SqlDialect>(), Ok(SqlDialect::Postgres));
        assert_eq!("mariadb".parse::<SqlDialect>(), Ok(SqlDialect::Mysql));
        assert!("oracle".parse::<SqlDialect>().is_err());
    }

    #[test]
    fn test_quote_ident_escapes() {
        let sqlite = DialectGenerator::new(SqlDialect::Sqlite);
        assert_eq!(sqlite.quote_ident("users"), "\"users\"");
        assert_eq!(sqlite.quote_ident("we\"ird"), "\"we\"\"ird\"");

        let mysql = DialectGenerator::new(SqlDialect::Mysql);
        assert_eq!(mysql.quote_ident("users"), "`users`");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(DialectGenerator::new(SqlDialect::Sqlite).placeholder(2), "?2");
        assert_eq!(DialectGenerator::new(SqlDialect::Postgres).placeholder(2), "$2");
        assert_eq!(DialectGenerator::new(SqlDialect::Mysql).placeholder(2), "?");
    }

    #[test]
    fn test_create_table_sqlite() {
        let generator = DialectGenerator::new(SqlDialect::Sqlite);
        let mut id = column("id", "BIGINT");
        id.is_primary_key = true;
        id.is_auto_increment = true;
        let mut name = column("name", "TEXT");
        name.nullable = false;
        name.is_unique = true;
        let mut author = column("author_id", "BIGINT");
        author.foreign_key = Some(ForeignKeyDef {
            table: "authors".into(),
            column: "id".into(),
        });

        let sql = generator.create_table("books", &[id, name, author]);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"books\""));
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("\"name\" TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("\"author_id\" INTEGER REFERENCES \"authors\"(\"id\")"));
    }

    #[test]
    fn test_limit_clause() {
        let sqlite = DialectGenerator::new(SqlDialect::Sqlite);
        assert_eq!(sqlite.limit_clause(None, 0), "");
        assert_eq!(sqlite.limit_clause(Some(5), 0), " LIMIT 5");
        assert_eq!(sqlite.limit_clause(Some(5), 10), " LIMIT 5 OFFSET 10");
        assert_eq!(sqlite.limit_clause(None, 10), " LIMIT -1 OFFSET 10");
        assert_eq!(
            DialectGenerator::new(SqlDialect::Postgres).limit_clause(None, 3),
            " OFFSET 3"
        );
    }

    #[test]
    fn test_estimate_statements() {
        let mysql = DialectGenerator::new(SqlDialect::Mysql);
        assert_eq!(mysql.estimated_count_sql(), "SHOW TABLE STATUS LIKE ?");
        assert_eq!(mysql.estimate_column(), 4);
        let sqlite = DialectGenerator::new(SqlDialect::Sqlite);
        assert!(sqlite.estimated_count_sql().contains("sqlite_stat1"));
    }
}
