//! Record type registry
//!
//! Record types the CLI can address by name, each with the display settings
//! used to list and show its records.

use super::record::RecordType;
use super::users::{USER, USER_DISPLAY};

/// A titled group of fields shown together
#[derive(Debug, Clone, Copy)]
pub struct Fieldset {
    pub title: &'static str,
    pub fields: &'static [&'static str],
}

/// How records of one type are listed, shown and edited
#[derive(Debug, Clone, Copy)]
pub struct RecordDisplay {
    /// Columns of list output; empty means every field
    pub list_display: &'static [&'static str],
    pub fieldsets: &'static [Fieldset],
    /// Fields that cannot be edited from the CLI
    pub readonly_fields: &'static [&'static str],
}

impl RecordDisplay {
    pub fn is_readonly(&self, field: &str) -> bool {
        self.readonly_fields.iter().any(|f| *f == field)
    }

    pub fn list_columns(&self, record_type: &RecordType) -> Vec<&'static str> {
        if self.list_display.is_empty() {
            record_type.field_names()
        } else {
            self.list_display.to_vec()
        }
    }

    /// Fieldsets to show, or one untitled set of every field
    pub fn sections(&self, record_type: &RecordType) -> Vec<(Option<&'static str>, Vec<&'static str>)> {
        if self.fieldsets.is_empty() {
            return vec![(None, record_type.field_names())];
        }
        self.fieldsets
            .iter()
            .map(|set| (Some(set.title), set.fields.to_vec()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub record_type: &'static RecordType,
    pub display: &'static RecordDisplay,
}

static REGISTRY: &[Registration] = &[Registration {
    record_type: &USER,
    display: &USER_DISPLAY,
}];

/// Find a registration by record type name (any case) or table name
pub fn lookup(name: &str) -> Option<&'static Registration> {
    REGISTRY
        .iter()
        .find(|r| r.record_type.name.eq_ignore_ascii_case(name) || r.record_type.table == name)
}

pub fn registrations() -> &'static [Registration] {
    REGISTRY
}

pub fn record_types() -> impl Iterator<Item = &'static RecordType> {
    REGISTRY.iter().map(|r| r.record_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_or_table() {
        assert_eq!(lookup("user").unwrap().record_type.table, "users");
        assert_eq!(lookup("users").unwrap().record_type.name, "User");
        assert!(lookup("books").is_none());
    }

    #[test]
    fn test_display_fields_exist() {
        for reg in registrations() {
            let rt = reg.record_type;
            let display = reg.display;
            for field in display
                .list_display
                .iter()
                .chain(display.readonly_fields)
                .chain(display.fieldsets.iter().flat_map(|s| s.fields))
            {
                assert!(rt.field(field).is_some(), "{} has no field {}", rt.name, field);
            }
        }
    }

    #[test]
    fn test_defaults_cover_every_field() {
        let display = RecordDisplay {
            list_display: &[],
            fieldsets: &[],
            readonly_fields: &[],
        };
        let rt = record_types().next().unwrap();
        assert_eq!(display.list_columns(rt), rt.field_names());
        assert_eq!(display.sections(rt), vec![(None, rt.field_names())]);
        assert!(!display.is_readonly("id"));
    }
}
