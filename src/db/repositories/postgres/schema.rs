//! Diesel table definitions matching the embedded migrations.

diesel::table! {
    meeting_types (id) {
        id -> Int8,
        host_id -> Int8,
        duration_min -> Int4,
        buffer_before_min -> Int4,
        buffer_after_min -> Int4,
        is_active -> Bool,
    }
}

diesel::table! {
    availability_windows (id) {
        id -> Int8,
        meeting_type_id -> Int8,
        weekday -> Int2,
        start_local -> Time,
        end_local -> Time,
        timezone -> Text,
    }
}

diesel::table! {
    bookings (id) {
        id -> Uuid,
        host_id -> Int8,
        meeting_type_id -> Int8,
        guest_name -> Text,
        guest_email -> Text,
        start_utc -> Timestamptz,
        end_utc -> Timestamptz,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(meeting_types, availability_windows, bookings);
