use chrono::Utc;
use rusqlite::{params, types::Value, Connection, TransactionBehavior};
use uuid::Uuid;

use crate::error::{msg, AppError, Result};
use crate::models::*;

use super::from_row::{
    query_all, query_one, EVENT_COLS, MEAL_COLS, PARTICIPANT_COLS, USER_COLS,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
        }
    }

    fn set_opt<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.fields.push((column, v.into()));
        }
        self
    }

    fn execute(self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser, password_hash: &str) -> Result<User> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    let inserted = conn.execute(
        "INSERT INTO users (id, name, email, password_hash, university, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            &input.name,
            &email,
            password_hash,
            &input.university,
            &input.description,
            now
        ],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Conflict(msg::EMAIL_TAKEN.into()));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(User {
        id,
        name: input.name.clone(),
        email,
        password_hash: password_hash.to_string(),
        university: input.university.clone(),
        description: input.description.clone(),
        profile_picture: None,
        stripe_account_id: None,
        stripe_onboarding_complete: false,
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn get_user_by_stripe_account(conn: &Connection, account_id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE stripe_account_id = ?1", USER_COLS),
        &[&account_id],
    )
}

pub fn search_users(conn: &Connection, query: &str, limit: i64) -> Result<Vec<User>> {
    let pattern = format!("%{}%", query.trim());
    query_all(
        conn,
        &format!(
            "SELECT {} FROM users WHERE name LIKE ?1 ORDER BY name LIMIT ?2",
            USER_COLS
        ),
        &[&pattern, &limit],
    )
}

pub fn update_user(conn: &Connection, id: &str, input: &UpdateUser) -> Result<Option<User>> {
    UpdateBuilder::new("users", id)
        .set_opt("university", input.university.clone())
        .set_opt("description", input.description.clone())
        .set_opt("profile_picture", input.profile_picture.clone())
        .execute(conn)?;
    get_user_by_id(conn, id)
}

pub fn set_stripe_account(conn: &Connection, user_id: &str, account_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET stripe_account_id = ?1 WHERE id = ?2",
        params![account_id, user_id],
    )?;
    Ok(())
}

pub fn set_stripe_onboarding(conn: &Connection, user_id: &str, complete: bool) -> Result<()> {
    conn.execute(
        "UPDATE users SET stripe_onboarding_complete = ?1 WHERE id = ?2",
        params![complete as i64, user_id],
    )?;
    Ok(())
}

// ============ Meals ============

pub fn create_meal(conn: &Connection, user_id: &str, input: &CreateMeal) -> Result<Meal> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO meals (id, user_id, title, description, ingredients, image_url, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            user_id,
            &input.title,
            &input.description,
            &input.ingredients,
            &input.image_url,
            now
        ],
    )?;

    Ok(Meal {
        id,
        user_id: user_id.to_string(),
        title: input.title.clone(),
        description: input.description.clone(),
        ingredients: input.ingredients.clone(),
        image_url: input.image_url.clone(),
        created_at: now,
    })
}

pub fn get_meal_by_id(conn: &Connection, id: &str) -> Result<Option<Meal>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM meals WHERE id = ?1 AND is_deleted = 0",
            MEAL_COLS
        ),
        &[&id],
    )
}

pub fn list_meals_by_user(conn: &Connection, user_id: &str) -> Result<Vec<Meal>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM meals WHERE user_id = ?1 AND is_deleted = 0
             ORDER BY created_at DESC",
            MEAL_COLS
        ),
        &[&user_id],
    )
}

pub fn update_meal(conn: &Connection, id: &str, input: &UpdateMeal) -> Result<Option<Meal>> {
    UpdateBuilder::new("meals", id)
        .set_opt("title", input.title.clone())
        .set_opt("description", input.description.clone())
        .set_opt("ingredients", input.ingredients.clone())
        .set_opt("image_url", input.image_url.clone())
        .execute(conn)?;
    get_meal_by_id(conn, id)
}

pub fn soft_delete_meal(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE meals SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Events ============

pub fn create_event(conn: &Connection, host_user_id: &str, input: &CreateEvent) -> Result<Event> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO events (id, host_user_id, meal_id, title, description, max_participants,
                             current_participants, location, event_date, image_url, price,
                             currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            &id,
            host_user_id,
            &input.meal_id,
            &input.title,
            &input.description,
            input.max_participants,
            &input.location,
            input.event_date,
            &input.image_url,
            input.price,
            &input.currency,
            now
        ],
    )?;

    Ok(Event {
        id,
        host_user_id: host_user_id.to_string(),
        meal_id: input.meal_id.clone(),
        title: input.title.clone(),
        description: input.description.clone(),
        max_participants: input.max_participants,
        current_participants: 0,
        location: input.location.clone(),
        event_date: input.event_date,
        image_url: input.image_url.clone(),
        price: input.price,
        currency: input.currency.clone(),
        created_at: now,
    })
}

pub fn get_event_by_id(conn: &Connection, id: &str) -> Result<Option<Event>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM events WHERE id = ?1 AND is_deleted = 0",
            EVENT_COLS
        ),
        &[&id],
    )
}

/// Fetch an event regardless of its soft-delete flag, reporting the flag.
/// Used by the delete endpoint, which must distinguish "missing" from
/// "already deleted".
pub fn get_event_any(conn: &Connection, id: &str) -> Result<Option<(Event, bool)>> {
    conn.query_row(
        &format!(
            "SELECT {}, is_deleted FROM events WHERE id = ?1",
            EVENT_COLS
        ),
        params![id],
        |row| {
            let event = <Event as super::from_row::FromRow>::from_row(row)?;
            let is_deleted: i64 = row.get(13)?;
            Ok((event, is_deleted != 0))
        },
    )
    .map(Some)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other.into()),
    })
}

pub fn list_events(conn: &Connection) -> Result<Vec<Event>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM events WHERE is_deleted = 0 ORDER BY event_date DESC",
            EVENT_COLS
        ),
        &[],
    )
}

pub fn list_events_by_host(conn: &Connection, host_user_id: &str) -> Result<Vec<Event>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM events WHERE host_user_id = ?1 AND is_deleted = 0
             ORDER BY event_date DESC",
            EVENT_COLS
        ),
        &[&host_user_id],
    )
}

/// Events the user has joined and not refunded out of.
pub fn list_joined_events(conn: &Connection, user_id: &str) -> Result<Vec<Event>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM events WHERE is_deleted = 0 AND id IN (
                 SELECT event_id FROM events_participants
                 WHERE participant_id = ?1 AND refunded_at IS NULL
             )
             ORDER BY event_date DESC",
            EVENT_COLS
        ),
        &[&user_id],
    )
}

pub fn update_event(conn: &Connection, id: &str, input: &UpdateEvent) -> Result<Option<Event>> {
    UpdateBuilder::new("events", id)
        .set_opt("title", input.title.clone())
        .set_opt("description", input.description.clone())
        .set_opt("max_participants", input.max_participants)
        .set_opt("location", input.location.clone())
        .set_opt("event_date", input.event_date)
        .set_opt("image_url", input.image_url.clone())
        .set_opt("price", input.price)
        .execute(conn)?;
    get_event_by_id(conn, id)
}

pub fn soft_delete_event(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE events SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0",
        params![id],
    )?;
    Ok(affected > 0)
}

// ============ Participants ============

/// Latest participation row for (event, participant), any status.
pub fn get_participation(
    conn: &Connection,
    event_id: &str,
    participant_id: &str,
) -> Result<Option<EventParticipant>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM events_participants
             WHERE event_id = ?1 AND participant_id = ?2
             ORDER BY joined_at DESC LIMIT 1",
            PARTICIPANT_COLS
        ),
        &[&event_id, &participant_id],
    )
}

pub fn confirmed_count(conn: &Connection, event_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM events_participants WHERE event_id = ?1 AND status = 'confirmed'",
        params![event_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn list_event_participants(
    conn: &Connection,
    event_id: &str,
) -> Result<Vec<EventParticipantUser>> {
    query_all(
        conn,
        "SELECT u.id, u.name, u.profile_picture, p.status
         FROM events_participants p
         JOIN users u ON u.id = p.participant_id
         WHERE p.event_id = ?1
         ORDER BY p.joined_at",
        &[&event_id],
    )
}

// ============ Participation state machine ============
//
// Every mutation below runs inside an Immediate transaction: SQLite takes
// the write lock up front, so two webhook deliveries (or a webhook and a
// refund) for the same event serialize instead of racing the
// current_participants read-modify-write. Gateway calls never happen while
// one of these transactions is open.

/// Outcome of processing a `checkout.session.completed` event.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// New confirmed participation inserted, counter incremented.
    Created,
    /// Existing row promoted to confirmed, counter incremented.
    Confirmed,
    /// Row was already confirmed with this payment recorded (redelivery).
    AlreadyConfirmed,
    /// Approval mode: participation recorded as booked, capture deferred.
    BookedPending,
    /// Event at capacity; nothing written. Money has moved, so the caller
    /// must log this for manual reconciliation.
    CapacityExceeded,
    EventNotFound,
}

/// Apply a verified checkout completion to the participation table.
///
/// Idempotent for redelivery of the same gateway event: a row that is
/// already confirmed with a payment intent recorded is left untouched.
pub fn confirm_participation(
    conn: &mut Connection,
    event_id: &str,
    foodie_id: &str,
    payment_intent_id: &str,
    as_booked: bool,
) -> Result<ConfirmOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let event: Option<(i64, i64)> = tx
        .query_row(
            "SELECT current_participants, max_participants FROM events
             WHERE id = ?1 AND is_deleted = 0",
            params![event_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(AppError::from(other)),
        })?;

    let Some((current, max)) = event else {
        return Ok(ConfirmOutcome::EventNotFound);
    };

    let existing: Option<(String, String, Option<String>)> = tx
        .query_row(
            "SELECT id, status, payment_intent_id FROM events_participants
             WHERE event_id = ?1 AND participant_id = ?2
             ORDER BY joined_at DESC LIMIT 1",
            params![event_id, foodie_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(AppError::from(other)),
        })?;

    let outcome = match existing {
        Some((_, ref status, Some(_))) if status == "confirmed" => {
            // Duplicate delivery guard: providers redeliver webhooks.
            ConfirmOutcome::AlreadyConfirmed
        }
        Some((row_id, _, _)) => {
            // Re-promoting a cancelled row is a fresh paid join: clear the
            // old refund stamp and restart the grace window, or the second
            // payment could never be refunded.
            if as_booked {
                tx.execute(
                    "UPDATE events_participants
                     SET status = 'booked', payment_intent_id = ?1,
                         joined_at = ?2, refunded_at = NULL
                     WHERE id = ?3",
                    params![payment_intent_id, now(), row_id],
                )?;
                ConfirmOutcome::BookedPending
            } else if current >= max {
                return Ok(ConfirmOutcome::CapacityExceeded);
            } else {
                tx.execute(
                    "UPDATE events_participants
                     SET status = 'confirmed', payment_intent_id = ?1,
                         joined_at = ?2, refunded_at = NULL
                     WHERE id = ?3",
                    params![payment_intent_id, now(), row_id],
                )?;
                tx.execute(
                    "UPDATE events SET current_participants = current_participants + 1
                     WHERE id = ?1",
                    params![event_id],
                )?;
                ConfirmOutcome::Confirmed
            }
        }
        None => {
            if as_booked {
                tx.execute(
                    "INSERT INTO events_participants
                         (id, event_id, participant_id, joined_at, payment_intent_id, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'booked')",
                    params![gen_id(), event_id, foodie_id, now(), payment_intent_id],
                )?;
                ConfirmOutcome::BookedPending
            } else if current >= max {
                return Ok(ConfirmOutcome::CapacityExceeded);
            } else {
                tx.execute(
                    "INSERT INTO events_participants
                         (id, event_id, participant_id, joined_at, payment_intent_id, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, 'confirmed')",
                    params![gen_id(), event_id, foodie_id, now(), payment_intent_id],
                )?;
                tx.execute(
                    "UPDATE events SET current_participants = current_participants + 1
                     WHERE id = ?1",
                    params![event_id],
                )?;
                ConfirmOutcome::Created
            }
        }
    };

    tx.commit()?;
    Ok(outcome)
}

/// Outcome of finalizing a host acceptance after the capture succeeded.
#[derive(Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    /// The booked row vanished or changed state between validation and
    /// commit (lost race); the capture has already happened.
    NoLongerBooked,
    /// Event filled up between validation and commit; capture has already
    /// happened, caller must log for reconciliation.
    CapacityExceeded,
}

/// Promote a booked participation to confirmed and bump the counter.
/// Called only after the payment intent capture succeeded at the gateway.
pub fn finalize_acceptance(
    conn: &mut Connection,
    event_id: &str,
    participant_id: &str,
) -> Result<AcceptOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (current, max): (i64, i64) = tx.query_row(
        "SELECT current_participants, max_participants FROM events WHERE id = ?1",
        params![event_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    if current >= max {
        return Ok(AcceptOutcome::CapacityExceeded);
    }

    let affected = tx.execute(
        "UPDATE events_participants SET status = 'confirmed'
         WHERE event_id = ?1 AND participant_id = ?2 AND status = 'booked'",
        params![event_id, participant_id],
    )?;

    if affected == 0 {
        return Ok(AcceptOutcome::NoLongerBooked);
    }

    tx.execute(
        "UPDATE events SET current_participants = current_participants + 1 WHERE id = ?1",
        params![event_id],
    )?;

    tx.commit()?;
    Ok(AcceptOutcome::Accepted)
}

/// Record a successful gateway refund: cancel the participation, stamp
/// `refunded_at`, decrement the counter, all in one transaction.
///
/// Returns false when no refundable row matched (already refunded or not
/// confirmed) so the caller can detect a lost race after the gateway call.
pub fn apply_refund(conn: &mut Connection, event_id: &str, participant_id: &str) -> Result<bool> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let affected = tx.execute(
        "UPDATE events_participants SET status = 'cancelled', refunded_at = ?1
         WHERE event_id = ?2 AND participant_id = ?3
           AND status = 'confirmed' AND refunded_at IS NULL",
        params![now(), event_id, participant_id],
    )?;

    if affected == 0 {
        return Ok(false);
    }

    tx.execute(
        "UPDATE events SET current_participants = current_participants - 1
         WHERE id = ?1 AND current_participants > 0",
        params![event_id],
    )?;

    tx.commit()?;
    Ok(true)
}
