//! recordkit CLI Module
//! Command-line interface over a project's record store

pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::record::{FieldMap, Value};

#[derive(Parser, Debug)]
#[command(name = "recordkit")]
#[command(version)]
#[command(about = "Typed records over SQLite: dynamic OR queries, merges and users", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Print every statement run, with timings, once the command is done
    #[arg(long, global = true)]
    pub print_queries: bool,

    /// Echo the command and its duration, and log verbosely
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new recordkit project
    Init {
        /// Project name
        #[arg(short, long)]
        name: String,
    },

    /// Records matching any of the given field=value pairs
    Query {
        /// Record type name or table
        record_type: String,

        /// Filters as field=value; unknown fields are ignored
        #[arg(required = true)]
        filters: Vec<String>,
    },

    /// Count records of a type
    Count {
        /// Record type name or table
        record_type: String,

        /// Always run COUNT(*) instead of reading the row estimate
        #[arg(long)]
        exact: bool,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Create a user
    Create {
        username: String,

        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Extra fields as field=value
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        fields: Vec<String>,
    },

    /// Create a superuser
    Superuser {
        username: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        email: Option<String>,
    },

    /// List users
    List {
        #[arg(short, long, default_value = "50")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show one user
    Show {
        /// User id
        id: i64,
    },

    /// Merge field=value pairs into a user
    Update {
        /// User id
        id: i64,

        /// Changes as field=value
        #[arg(required = true)]
        changes: Vec<String>,

        /// Replace fields that already hold a value
        #[arg(long)]
        overwrite: bool,

        /// Apply empty, zero and false values too
        #[arg(long)]
        honor_falsy: bool,

        /// Report the outcome without saving
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    pub fn get_project_dir(&self) -> PathBuf {
        self.project
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Parse `field=value` arguments. Values are read as JSON when they parse,
/// so `age=30` is an integer and `name=Alice` is text.
pub fn parse_assignments(args: &[String]) -> Result<FieldMap, String> {
    let mut map = FieldMap::new();
    for arg in args {
        let (key, raw) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected field=value, got '{}'", arg))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("missing field name in '{}'", arg));
        }
        map.insert(key, parse_value(raw));
    }
    Ok(map)
}

pub fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(&json),
        Err(_) => Value::Text(raw.to_string()),
    }
}
