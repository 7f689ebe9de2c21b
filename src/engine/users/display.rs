use crate::engine::registry::{Fieldset, RecordDisplay};

pub static USER_DISPLAY: RecordDisplay = RecordDisplay {
    list_display: &["id", "username", "is_superuser", "email", "created"],
    fieldsets: &[
        Fieldset {
            title: "Basic",
            fields: &["id", "username", "email"],
        },
        Fieldset {
            title: "Permissions",
            fields: &["is_active", "is_staff", "is_superuser"],
        },
        Fieldset {
            title: "Chronology",
            fields: &["last_login", "created", "modified"],
        },
    ],
    readonly_fields: &["id", "is_superuser", "last_login", "created", "modified"],
};
