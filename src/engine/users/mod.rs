//! Users
//!
//! The `User` record type, its manager and password hashing.

pub mod display;
pub mod manager;
pub mod model;
pub mod password;

pub use display::USER_DISPLAY;
pub use manager::UserManager;
pub use model::{missing_required_fields, REQUIRED_FIELDS, USER, USERNAME_FIELD};
pub use password::{check_password, PasswordError, PasswordHasher};
