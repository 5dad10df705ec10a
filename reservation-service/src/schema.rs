diesel::table! {
    events (id) {
        id -> Uuid,
        name -> Varchar,
        starts_at -> Timestamptz,
        description -> Text,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    ticket_tiers (id) {
        id -> Uuid,
        event_id -> Uuid,
        name -> Varchar,
        price -> Numeric,
    }
}

diesel::table! {
    clients (id) {
        id -> Uuid,
        email -> Varchar,
        first_name -> Varchar,
        last_name -> Varchar,
    }
}

diesel::table! {
    reservations (id) {
        id -> Uuid,
        event_id -> Uuid,
        client_id -> Nullable<Uuid>,
        status -> Varchar,
        booked_time -> Timestamptz,
    }
}

diesel::table! {
    tickets (id) {
        id -> Uuid,
        event_id -> Uuid,
        tier_id -> Uuid,
        seat_identifier -> Varchar,
        reservation_id -> Nullable<Uuid>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    events,
    ticket_tiers,
    clients,
    reservations,
    tickets,
);
