//! Diesel schema definitions.

diesel::table! {
    installations (id) {
        id -> Text,
        variant_id -> Text,
        device_token -> Text,
        alias -> Nullable<Text>,
        device_type -> Nullable<Text>,
        operating_system -> Nullable<Text>,
        os_version -> Nullable<Text>,
        platform -> Nullable<Text>,
        enabled -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    installation_categories (installation_id, category) {
        installation_id -> Text,
        category -> Text,
    }
}

diesel::joinable!(installation_categories -> installations (installation_id));

diesel::allow_tables_to_appear_in_same_query!(installations, installation_categories);
