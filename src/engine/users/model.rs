//! The `User` record type

use crate::engine::record::{AutoTimestamp, FieldDef, FieldDefault, FieldMap, RecordType, ScalarType};

/// Field users log in with
pub const USERNAME_FIELD: &str = "username";

/// Fields a superuser must be given besides the username and password
pub const REQUIRED_FIELDS: &[&str] = &["email"];

/// Required fields that are absent or empty in `values`
pub fn missing_required_fields(values: &FieldMap) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !values.get(field).is_some_and(|v| v.is_truthy()))
        .collect()
}

pub static USER: RecordType = RecordType {
    name: "User",
    table: "users",
    primary_key: "id",
    fields: &[
        FieldDef::scalar("id", ScalarType::Integer),
        FieldDef::scalar("password", ScalarType::Text).not_null().default_to(FieldDefault::Text("")),
        FieldDef::scalar("last_login", ScalarType::Timestamp),
        FieldDef::scalar("is_superuser", ScalarType::Bool)
            .not_null()
            .default_to(FieldDefault::Bool(false)),
        FieldDef::scalar("username", ScalarType::Text).not_null().unique_key(),
        FieldDef::scalar("first_name", ScalarType::Text).default_to(FieldDefault::Text("")),
        FieldDef::scalar("last_name", ScalarType::Text).default_to(FieldDefault::Text("")),
        FieldDef::scalar("email", ScalarType::Text).default_to(FieldDefault::Text("")),
        FieldDef::scalar("is_staff", ScalarType::Bool)
            .not_null()
            .default_to(FieldDefault::Bool(false)),
        FieldDef::scalar("is_active", ScalarType::Bool)
            .not_null()
            .default_to(FieldDefault::Bool(true)),
        FieldDef::scalar("date_joined", ScalarType::Timestamp)
            .not_null()
            .default_to(FieldDefault::Now),
        FieldDef::scalar("created", ScalarType::Timestamp)
            .not_null()
            .auto_set(AutoTimestamp::OnCreate),
        FieldDef::scalar("modified", ScalarType::Timestamp)
            .not_null()
            .auto_set(AutoTimestamp::OnSave),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_declaration_is_valid() {
        assert!(USER.validate().is_ok());
        assert!(USER.field(USERNAME_FIELD).unwrap().unique);
        for field in REQUIRED_FIELDS {
            assert!(USER.field(field).is_some());
        }
    }

    #[test]
    fn test_missing_required_fields() {
        assert_eq!(missing_required_fields(&FieldMap::new()), vec!["email"]);

        let blank: FieldMap = [("email", "")].into_iter().collect();
        assert_eq!(missing_required_fields(&blank), vec!["email"]);

        let given: FieldMap = [("email", "root@example.com")].into_iter().collect();
        assert!(missing_required_fields(&given).is_empty());
    }
}
