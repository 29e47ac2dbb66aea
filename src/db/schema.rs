use rusqlite::Connection;

/// Initialize the database schema. Idempotent, runs at startup.
///
/// Soft deletes use an `is_deleted` flag defaulting to 0 (not deleted);
/// participation rows are never deleted at all.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            university TEXT,
            description TEXT,
            profile_picture TEXT,
            stripe_account_id TEXT,
            stripe_onboarding_complete INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        CREATE INDEX IF NOT EXISTS idx_users_stripe_account ON users(stripe_account_id);

        CREATE TABLE IF NOT EXISTS meals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            ingredients TEXT NOT NULL,
            image_url TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_meals_user ON meals(user_id);

        -- current_participants counts confirmed rows only and is mutated in
        -- the same transaction as the participation row that justifies it.
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            host_user_id TEXT NOT NULL REFERENCES users(id),
            meal_id TEXT NOT NULL REFERENCES meals(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            max_participants INTEGER NOT NULL,
            current_participants INTEGER NOT NULL DEFAULT 0,
            location TEXT NOT NULL,
            event_date INTEGER NOT NULL,
            image_url TEXT,
            price INTEGER NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'usd',
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,

            CHECK (current_participants >= 0),
            CHECK (current_participants <= max_participants)
        );
        CREATE INDEX IF NOT EXISTS idx_events_host ON events(host_user_id);
        CREATE INDEX IF NOT EXISTS idx_events_date ON events(event_date);

        CREATE TABLE IF NOT EXISTS events_participants (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL REFERENCES events(id),
            participant_id TEXT NOT NULL REFERENCES users(id),
            joined_at INTEGER NOT NULL,
            payment_intent_id TEXT,
            status TEXT NOT NULL DEFAULT 'confirmed'
                CHECK (status IN ('booked', 'confirmed', 'cancelled')),
            refunded_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_participants_event ON events_participants(event_id);
        CREATE INDEX IF NOT EXISTS idx_participants_user ON events_participants(participant_id);
        CREATE INDEX IF NOT EXISTS idx_participants_intent ON events_participants(payment_intent_id);
        "#,
    )
}
