// recordkit engine - core module structure
pub mod adapter;
pub mod cli;
pub mod config;
pub mod debug;
pub mod manager;
pub mod querylog;
pub mod queryset;
pub mod record;
pub mod registry;
pub mod users;

pub use config::Config;
pub use manager::Manager;
pub use querylog::QueryLog;
