//! recordkit Configuration Module
//! Handles loading and validating recordkit.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::adapter::SqlDialect;
use super::users::PasswordHasher;

pub const CONFIG_FILE: &str = "recordkit.config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabase(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub project: ProjectConfig,
    pub database: DatabaseConfig,
    /// Debug console output and verbose logging
    #[serde(default)]
    pub debug: bool,
    /// Let unconstrained counts use the store's row estimate
    #[serde(default = "default_true")]
    pub approximate_counts: bool,
    /// Argon2 cost for new passwords
    #[serde(default)]
    pub password_hashing: PasswordHashingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PasswordHashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashingConfig {
    fn default() -> Self {
        let hasher = PasswordHasher::default();
        Self {
            memory_kib: hasher.memory_kib,
            iterations: hasher.iterations,
            parallelism: hasher.parallelism,
        }
    }
}

impl PasswordHashingConfig {
    pub fn hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.memory_kib, self.iterations, self.parallelism)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub db_type: String,
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    10
}

impl DatabaseConfig {
    /// Only SQLite stores can be opened
    pub fn dialect(&self) -> Result<SqlDialect, ConfigError> {
        match self.db_type.parse::<SqlDialect>() {
            Ok(SqlDialect::Sqlite) => Ok(SqlDialect::Sqlite),
            _ => Err(ConfigError::UnsupportedDatabase(self.db_type.clone())),
        }
    }

    /// Database path, relative paths resolved against the project directory
    pub fn resolve_path(&self, project_dir: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            project_dir.join(&self.path)
        }
    }
}

impl Config {
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = project_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(project_dir)?;
        let config_path = project_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn default_for_project(name: &str) -> Self {
        Self {
            version: "0.1.0".to_string(),
            project: ProjectConfig {
                name: name.to_string(),
            },
            database: DatabaseConfig {
                db_type: "sqlite".to_string(),
                path: PathBuf::from("./data/recordkit.db"),
                pool_size: default_pool_size(),
            },
            debug: false,
            approximate_counts: true,
            password_hashing: PasswordHashingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_optional_keys_take_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "version": "0.1.0",
                "project": { "name": "shop" },
                "database": { "type": "sqlite", "path": "db.sqlite" }
            }"#,
        )
        .unwrap();

        assert!(!config.debug);
        assert!(config.approximate_counts);
        assert_eq!(config.database.pool_size, 10);
        assert_eq!(config.password_hashing.hasher(), PasswordHasher::default());
    }

    #[test]
    fn test_database_dialect() {
        let mut db = Config::default_for_project("shop").database;
        assert_eq!(db.dialect().unwrap(), SqlDialect::Sqlite);

        db.db_type = "postgres".into();
        assert!(matches!(db.dialect(), Err(ConfigError::UnsupportedDatabase(_))));
    }

    #[test]
    fn test_resolve_path() {
        let db = Config::default_for_project("shop").database;
        assert_eq!(
            db.resolve_path(Path::new("/srv/shop")),
            PathBuf::from("/srv/shop/./data/recordkit.db")
        );
    }
}
