use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{msg, AppError, Result};

/// Share of the original price returned on refund; the rest is retained.
pub const REFUND_PERCENT: i64 = 70;

/// A refund may be requested up to this long after joining.
pub const REFUND_GRACE_SECS: i64 = 12 * 3600;

/// A refund must be requested at least this long before the event starts.
pub const REFUND_MIN_LEAD_SECS: i64 = 24 * 3600;

/// Participation lifecycle: `booked -> confirmed -> cancelled`.
///
/// `booked` is only reachable in deployments that require host approval
/// (payment authorized, capture deferred); the checkout webhook otherwise
/// enters directly at `confirmed`. `cancelled` is terminal and set by the
/// refund processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Booked,
    Confirmed,
    Cancelled,
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticipantStatus::Booked => "booked",
            ParticipantStatus::Confirmed => "confirmed",
            ParticipantStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for ParticipantStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "booked" => Ok(ParticipantStatus::Booked),
            "confirmed" => Ok(ParticipantStatus::Confirmed),
            "cancelled" => Ok(ParticipantStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// One user's participation in one event. Never physically deleted;
/// `refunded_at` doubles as the idempotency guard against double refunds.
#[derive(Debug, Clone, Serialize)]
pub struct EventParticipant {
    pub id: String,
    pub event_id: String,
    pub participant_id: String,
    pub joined_at: i64,
    pub payment_intent_id: Option<String>,
    pub status: ParticipantStatus,
    pub refunded_at: Option<i64>,
}

/// Participant list entry: user fields plus their participation status.
#[derive(Debug, Clone, Serialize)]
pub struct EventParticipantUser {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    pub status: ParticipantStatus,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refund_amount_cents: i64,
    pub message: String,
}

/// 70% of the original price, floor division.
pub fn refund_amount_cents(price_cents: i64) -> i64 {
    price_cents * REFUND_PERCENT / 100
}

/// Enforce the two refund time windows: within the grace period after
/// joining, and not too close to the event start.
pub fn check_refund_window(joined_at: i64, event_date: i64, now: i64) -> Result<()> {
    if now - joined_at > REFUND_GRACE_SECS {
        return Err(AppError::BadRequest(msg::REFUND_WINDOW_EXPIRED.into()));
    }
    if event_date - now < REFUND_MIN_LEAD_SECS {
        return Err(AppError::BadRequest(msg::TOO_CLOSE_TO_EVENT.into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3600;

    #[test]
    fn refund_amount_is_seventy_percent() {
        assert_eq!(refund_amount_cents(1000), 700);
        assert_eq!(refund_amount_cents(999), 699);
        assert_eq!(refund_amount_cents(0), 0);
    }

    #[test]
    fn refund_accepted_just_inside_grace_period() {
        let joined_at = 1_000_000;
        let now = joined_at + 11 * HOUR + 59 * 60;
        let event_date = now + 48 * HOUR;
        assert!(check_refund_window(joined_at, event_date, now).is_ok());
    }

    #[test]
    fn refund_rejected_just_past_grace_period() {
        let joined_at = 1_000_000;
        let now = joined_at + 12 * HOUR + 60;
        let event_date = now + 48 * HOUR;
        let err = check_refund_window(joined_at, event_date, now).unwrap_err();
        assert!(err.to_string().contains(msg::REFUND_WINDOW_EXPIRED));
    }

    #[test]
    fn refund_rejected_close_to_event_even_if_recent() {
        let joined_at = 1_000_000;
        let now = joined_at + HOUR;
        let event_date = now + 23 * HOUR;
        let err = check_refund_window(joined_at, event_date, now).unwrap_err();
        assert!(err.to_string().contains(msg::TOO_CLOSE_TO_EVENT));
    }

    #[test]
    fn refund_boundaries_are_inclusive() {
        let joined_at = 1_000_000;
        // Exactly 12h after joining is still allowed.
        let now = joined_at + REFUND_GRACE_SECS;
        let event_date = now + REFUND_MIN_LEAD_SECS;
        assert!(check_refund_window(joined_at, event_date, now).is_ok());
    }

    #[test]
    fn status_string_roundtrip() {
        for s in [
            ParticipantStatus::Booked,
            ParticipantStatus::Confirmed,
            ParticipantStatus::Cancelled,
        ] {
            assert_eq!(s.to_string().parse::<ParticipantStatus>().unwrap(), s);
        }
        assert!("pending".parse::<ParticipantStatus>().is_err());
    }
}
