//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, name, email, password_hash, university, description, \
     profile_picture, stripe_account_id, stripe_onboarding_complete, created_at";

pub const MEAL_COLS: &str =
    "id, user_id, title, description, ingredients, image_url, created_at";

pub const EVENT_COLS: &str = "id, host_user_id, meal_id, title, description, max_participants, \
     current_participants, location, event_date, image_url, price, currency, created_at";

pub const PARTICIPANT_COLS: &str =
    "id, event_id, participant_id, joined_at, payment_intent_id, status, refunded_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            university: row.get(4)?,
            description: row.get(5)?,
            profile_picture: row.get(6)?,
            stripe_account_id: row.get(7)?,
            stripe_onboarding_complete: row.get::<_, i64>(8)? != 0,
            created_at: row.get(9)?,
        })
    }
}

impl FromRow for Meal {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Meal {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            ingredients: row.get(4)?,
            image_url: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for Event {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Event {
            id: row.get(0)?,
            host_user_id: row.get(1)?,
            meal_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            max_participants: row.get(5)?,
            current_participants: row.get(6)?,
            location: row.get(7)?,
            event_date: row.get(8)?,
            image_url: row.get(9)?,
            price: row.get(10)?,
            currency: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

impl FromRow for EventParticipant {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EventParticipant {
            id: row.get(0)?,
            event_id: row.get(1)?,
            participant_id: row.get(2)?,
            joined_at: row.get(3)?,
            payment_intent_id: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            refunded_at: row.get(6)?,
        })
    }
}

impl FromRow for EventParticipantUser {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(EventParticipantUser {
            id: row.get(0)?,
            name: row.get(1)?,
            profile_picture: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
        })
    }
}
