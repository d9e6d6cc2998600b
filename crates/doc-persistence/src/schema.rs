// Esquema Diesel compartido por SQLite (pruebas) y Postgres (producción).
// Tablas: processes, process_activities, documents, activity_scans, admins.
// Los ids son uuids serializados como Text y los instantes van como
// segundos de epoch en BigInt para mantener el esquema portable.
use diesel::allow_tables_to_appear_in_same_query;
diesel::table! {
    processes (id) {
        id -> Text,
        code -> Text,
        name -> Text,
    }
}
diesel::table! {
    process_activities (id) {
        id -> Text,
        process_id -> Text,
        name -> Text,
        order_no -> Integer,
        is_mandatory -> Bool,
        is_decision -> Bool,
        decision_accept_label -> Nullable<Text>,
        decision_reject_label -> Nullable<Text>,
        next_on_accept -> Nullable<Text>,
        next_on_reject -> Nullable<Text>,
    }
}
diesel::table! {
    documents (id) {
        id -> Text,
        process_id -> Text,
        doc_type -> Text,
        office_type -> Text,
        region -> Text,
        status -> Text,
        accepted_at_ts -> Nullable<BigInt>,
        created_at_ts -> BigInt,
        version -> BigInt,
    }
}
diesel::table! {
    activity_scans (id) {
        id -> Text,
        document_id -> Text,
        process_activity_id -> Nullable<Text>,
        activity_name -> Text,
        start_time_ts -> BigInt,
        end_time_ts -> Nullable<BigInt>,
        duration_seconds -> Nullable<BigInt>,
        waiting_seconds -> BigInt,
        resting_seconds -> BigInt,
        next_activity_id -> Nullable<Text>,
    }
}
diesel::table! {
    admins (admin_id) {
        admin_id -> Text,
        name -> Text,
        office_type -> Text,
        region -> Text,
    }
}
allow_tables_to_appear_in_same_query!(processes, process_activities, documents, activity_scans, admins);
