//! User Manager
//!
//! Creates users and superusers on top of the generic record manager.

use tracing::info;

use super::model::{USER, USERNAME_FIELD};
use super::password::{self, PasswordHasher};
use crate::engine::adapter::DatabaseAdapter;
use crate::engine::manager::Manager;
use crate::engine::record::{FieldMap, Record, RecordError, RecordResult, Value};

#[derive(Clone, Copy)]
pub struct UserManager<'a> {
    manager: Manager<'a>,
    hasher: PasswordHasher,
}

impl<'a> UserManager<'a> {
    pub fn new(adapter: &'a dyn DatabaseAdapter) -> Self {
        Self {
            manager: Manager::new(adapter, &USER),
            hasher: PasswordHasher::default(),
        }
    }

    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn with_approximate_counts(mut self, enabled: bool) -> Self {
        self.manager = self.manager.with_approximate_counts(enabled);
        self
    }

    /// The generic manager over the users table
    pub fn records(&self) -> Manager<'a> {
        self.manager
    }

    pub fn create_table(&self) -> RecordResult<()> {
        self.manager.create_table()
    }

    /// Create and save a user. The password is hashed when given; without
    /// one the account cannot log in until a password is set.
    pub fn create_user(&self, username: &str, password: Option<&str>, extra: &FieldMap) -> RecordResult<Record> {
        if username.trim().is_empty() {
            return Err(RecordError::Validation("A valid username is required.".to_string()));
        }

        let mut user = Record::new(&USER);
        user.set(USERNAME_FIELD, username)?;
        for (field, value) in extra.iter() {
            user.set(field, value.clone())?;
        }
        if let Some(raw) = password {
            self.set_password(&mut user, raw)?;
        }
        user.set("last_login", Value::Null)?;

        self.manager.save(&mut user)?;
        info!(username, pk = %user.pk(), "created user");
        Ok(user)
    }

    /// Create a user with staff, active and superuser flags set
    pub fn create_superuser(&self, username: &str, password: Option<&str>, extra: &FieldMap) -> RecordResult<Record> {
        let Some(password) = password else {
            return Err(RecordError::Validation(
                "Must supply a password for new superusers.".to_string(),
            ));
        };

        let mut user = self.create_user(username, Some(password), extra)?;
        user.set("is_staff", true)?;
        user.set("is_active", true)?;
        user.set("is_superuser", true)?;
        self.manager.save(&mut user)?;
        info!(username, pk = %user.pk(), "granted superuser");
        Ok(user)
    }

    pub fn get(&self, pk: impl Into<Value>) -> RecordResult<Option<Record>> {
        self.manager.get(pk)
    }

    pub fn get_by_username(&self, username: &str) -> RecordResult<Option<Record>> {
        self.manager.filter(USERNAME_FIELD, username)?.first()
    }

    /// Hash and store a new password; the caller saves
    pub fn set_password(&self, user: &mut Record, raw: &str) -> RecordResult<()> {
        let encoded = self
            .hasher
            .make_password(raw)
            .map_err(|e| RecordError::Validation(e.to_string()))?;
        user.set("password", encoded)
    }

    pub fn set_unusable_password(&self, user: &mut Record) -> RecordResult<()> {
        user.set("password", password::make_unusable_password())
    }

    pub fn check_password(&self, user: &Record, raw: &str) -> RecordResult<bool> {
        Ok(user
            .get("password")?
            .as_str()
            .is_some_and(|encoded| password::check_password(raw, encoded)))
    }

    pub fn has_usable_password(&self, user: &Record) -> RecordResult<bool> {
        Ok(user
            .get("password")?
            .as_str()
            .is_some_and(password::is_password_usable))
    }
}
