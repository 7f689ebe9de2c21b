//! recordkit CLI - Main entry point for CLI binary
//!
//! This binary provides the `recordkit` tool for querying a project's
//! records and managing its users.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::Color;
use recordkit::engine::{
    adapter::sqlite::SqliteAdapter,
    cli::{
        formatter::{format_elapsed, format_value, CliFormatter},
        parse_assignments, Cli, Commands, OutputFormat, UserAction,
    },
    config::{Config, ConfigError},
    debug::{DebugConsole, PrintStyle},
    manager::Manager,
    querylog::QueryLog,
    record::{FieldMap, MergeOptions, Record, RecordType},
    registry::{self, RecordDisplay},
    users::{missing_required_fields, UserManager, USER, USER_DISPLAY},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        CliFormatter::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "recordkit=debug" } else { "recordkit=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loaded config, or `None` when the directory is not a project yet
fn load_config(project_dir: &Path) -> Result<Option<Config>> {
    match Config::load(project_dir) {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct Session {
    project_dir: PathBuf,
    json: bool,
    console: DebugConsole,
    query_log: Arc<QueryLog>,
}

fn run_cli(cli: Cli) -> Result<()> {
    let started = Instant::now();
    let project_dir = cli.get_project_dir();
    let config = load_config(&project_dir)?;
    let debug = cli.debug || config.as_ref().is_some_and(|c| c.debug);

    init_tracing(debug);
    let console = DebugConsole::new(debug);
    let invocation: Vec<String> = std::env::args().collect();
    console.print(invocation.join(" "), PrintStyle::color(Color::Cyan));

    let ctx = Session {
        project_dir,
        json: cli.format == OutputFormat::Json,
        console,
        query_log: Arc::new(QueryLog::new(cli.print_queries)),
    };

    match cli.command {
        Commands::Init { name } => cmd_init(&ctx, cli.project.as_deref(), &name)?,
        Commands::Query { record_type, filters } => {
            cmd_query(&ctx, &require_config(config)?, &record_type, &filters)?
        }
        Commands::Count { record_type, exact } => {
            cmd_count(&ctx, &require_config(config)?, &record_type, exact)?
        }
        Commands::User { action } => cmd_user(&ctx, &require_config(config)?, action)?,
    }

    if cli.print_queries {
        print!("{}", ctx.query_log.render());
    }
    ctx.console.print(
        format!("Responded in {}", format_elapsed(started.elapsed())),
        PrintStyle::plain(),
    );
    Ok(())
}

impl Session {
    fn open_store(&self, config: &Config) -> Result<SqliteAdapter> {
        open_store(&self.project_dir, config, &self.query_log)
    }
}

fn require_config(config: Option<Config>) -> Result<Config> {
    config.ok_or_else(|| anyhow!("Not a recordkit project; run `recordkit init` first"))
}

/// Open the project's store and make sure every registered table exists
fn open_store(project_dir: &Path, config: &Config, query_log: &Arc<QueryLog>) -> Result<SqliteAdapter> {
    config.database.dialect()?;
    let db_path = config.database.resolve_path(project_dir);
    let adapter = SqliteAdapter::with_pool_size(&db_path, config.database.pool_size)
        .with_context(|| format!("opening {}", db_path.display()))?
        .with_query_log(query_log.clone());

    for record_type in registry::record_types() {
        Manager::new(&adapter, record_type).create_table()?;
    }
    Ok(adapter)
}

fn cmd_init(ctx: &Session, explicit_dir: Option<&Path>, name: &str) -> Result<()> {
    let project_dir = match explicit_dir {
        Some(dir) => dir.to_path_buf(),
        None => ctx.project_dir.join(name),
    };
    if load_config(&project_dir)?.is_some() {
        bail!("Project already initialized: {}", project_dir.display());
    }

    let config = Config::default_for_project(name);
    config.save(&project_dir)?;
    let adapter = open_store(&project_dir, &config, &ctx.query_log)?;

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({
                "success": true,
                "project_dir": project_dir.display().to_string(),
                "database": adapter.path().display().to_string(),
                "name": name
            })
        );
    } else {
        CliFormatter::success(&format!("Created recordkit project: {}", name));
        CliFormatter::kv("Directory", &project_dir.display().to_string());
        CliFormatter::kv("Database", &adapter.path().display().to_string());
    }
    Ok(())
}

fn lookup(name: &str) -> Result<&'static registry::Registration> {
    registry::lookup(name).ok_or_else(|| {
        let known: Vec<&str> = registry::record_types().map(|rt| rt.name).collect();
        anyhow!("Unknown record type '{}' (known: {})", name, known.join(", "))
    })
}

fn cmd_query(ctx: &Session, config: &Config, type_name: &str, filters: &[String]) -> Result<()> {
    let registration = lookup(type_name)?;
    let adapter = ctx.open_store(config)?;
    let manager = Manager::new(&adapter, registration.record_type);

    let filter = parse_assignments(filters).map_err(anyhow::Error::msg)?;
    ctx.console.print_json(&filter.to_json(), PrintStyle::color(Color::Cyan));
    let filter = manager.hydrate_references(filter)?;

    let records = manager.dynamic_or(&filter)?;
    print_records(ctx, registration.record_type, registration.display, &records);
    Ok(())
}

fn cmd_count(ctx: &Session, config: &Config, type_name: &str, exact: bool) -> Result<()> {
    let registration = lookup(type_name)?;
    let adapter = ctx.open_store(config)?;
    let approximate = config.approximate_counts && !exact;
    let count = Manager::new(&adapter, registration.record_type)
        .with_approximate_counts(approximate)
        .count()?;

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({
                "record_type": registration.record_type.name,
                "count": count,
                "exact": !approximate
            })
        );
    } else {
        CliFormatter::kv(registration.record_type.name, &count.to_string());
    }
    Ok(())
}

fn cmd_user(ctx: &Session, config: &Config, action: UserAction) -> Result<()> {
    let adapter = ctx.open_store(config)?;
    let users = UserManager::new(&adapter)
        .with_hasher(config.password_hashing.hasher())
        .with_approximate_counts(config.approximate_counts);

    match action {
        UserAction::Create {
            username,
            password,
            email,
            fields,
        } => {
            let mut extra = parse_assignments(&fields).map_err(anyhow::Error::msg)?;
            if let Some(email) = email {
                extra.insert("email", email);
            }
            refuse_readonly(&USER_DISPLAY, &extra)?;
            let user = users.create_user(&username, password.as_deref(), &extra)?;
            print_user(ctx, &user, &format!("Created user {}", username));
        }
        UserAction::Superuser {
            username,
            password,
            email,
        } => {
            let mut extra = FieldMap::new();
            if let Some(email) = email {
                extra.insert("email", email);
            }
            let missing = missing_required_fields(&extra);
            if !missing.is_empty() {
                bail!("Superusers need: {}", missing.join(", "));
            }
            let user = users.create_superuser(&username, Some(&password), &extra)?;
            print_user(ctx, &user, &format!("Created superuser {}", username));
        }
        UserAction::List { limit, offset } => {
            let records = users.records().all().offset(offset).limit(limit).records()?;
            let total = users.records().count()?;
            print_records(ctx, &USER, &USER_DISPLAY, &records);
            if !ctx.json {
                CliFormatter::info(&format!("{} of about {} users", records.len(), total));
            }
        }
        UserAction::Show { id } => {
            let user = users.get(id)?.ok_or_else(|| anyhow!("No user with id {}", id))?;
            print_user(ctx, &user, &format!("User {}", id));
        }
        UserAction::Update {
            id,
            changes,
            overwrite,
            honor_falsy,
            dry_run,
        } => {
            let mut user = users.get(id)?.ok_or_else(|| anyhow!("No user with id {}", id))?;
            let mut changes = parse_assignments(&changes).map_err(anyhow::Error::msg)?;
            ctx.console.print_json(&changes.to_json(), PrintStyle::color(Color::Cyan));
            refuse_readonly(&USER_DISPLAY, &changes)?;

            if let Some(raw) = changes.remove("password") {
                let raw = raw.as_str().map(str::to_string).unwrap_or_else(|| raw.to_string());
                let mut hashed = Record::new(&USER);
                users.set_password(&mut hashed, &raw)?;
                changes.insert("password", hashed.get("password")?.clone());
            }

            let before = user.clone();
            let options = MergeOptions::default()
                .overwrite(overwrite)
                .honor_falsy(honor_falsy)
                .persist(!dry_run);
            let changed = users.records().merge_into(&mut user, (&changes).into(), options)?;
            let updated: Vec<&str> = changes
                .keys()
                .filter(|key| USER.field(key).is_some())
                .filter(|key| before.get(key).ok() != user.get(key).ok())
                .collect();

            if ctx.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "id": id,
                        "changed": changed,
                        "saved": changed && !dry_run,
                        "fields": updated,
                        "user": user_json(&user)
                    })
                );
            } else if !changed {
                CliFormatter::info("Nothing to update");
            } else if dry_run {
                CliFormatter::warning(&format!("Would update: {}", updated.join(", ")));
            } else {
                CliFormatter::success(&format!("Updated: {}", updated.join(", ")));
            }
        }
    }
    Ok(())
}

fn refuse_readonly(display: &RecordDisplay, values: &FieldMap) -> Result<()> {
    let readonly: Vec<&str> = values.keys().filter(|k| display.is_readonly(k)).collect();
    if !readonly.is_empty() {
        bail!("Read-only fields cannot be set: {}", readonly.join(", "));
    }
    Ok(())
}

/// User as JSON without the password hash
fn user_json(user: &Record) -> serde_json::Value {
    let mut json = user.to_json();
    if let Some(obj) = json.as_object_mut() {
        obj.remove("password");
    }
    json
}

fn print_user(ctx: &Session, user: &Record, title: &str) {
    if ctx.json {
        println!("{}", user_json(user));
        return;
    }
    CliFormatter::success(title);
    for (section, fields) in USER_DISPLAY.sections(&USER) {
        if let Some(section) = section {
            CliFormatter::header(section);
        }
        for field in fields {
            let value = user.get(field).map(format_value).unwrap_or_default();
            CliFormatter::kv(field, &value);
        }
    }
}

fn print_records(ctx: &Session, record_type: &RecordType, display: &RecordDisplay, records: &[Record]) {
    if ctx.json {
        let rows: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                if r.record_type() == &USER {
                    user_json(r)
                } else {
                    r.to_json()
                }
            })
            .collect();
        println!("{}", serde_json::Value::Array(rows));
        return;
    }

    if records.is_empty() {
        CliFormatter::info("No matching records");
        return;
    }
    let columns = display.list_columns(record_type);
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c).map(|v| format_value(&v.reference_key())).unwrap_or_default())
                .collect()
        })
        .collect();
    CliFormatter::table(&columns, &rows);
    CliFormatter::blank();
    CliFormatter::info(&format!("{} record(s)", records.len()));
}
