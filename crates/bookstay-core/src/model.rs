// ABOUTME: Record types for the three marketplace collections: accounts, listings, and bookings.
// ABOUTME: Also defines booking status transitions and the projected summaries used for bulk reads.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A registered account. The account's email is its key in the users table
/// and is therefore not repeated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub session_active: bool,
}

impl Account {
    /// Create an account with an active session, as registration logs the user in.
    pub fn new(name: String, password: String) -> Self {
        Self {
            name,
            password,
            session_active: true,
        }
    }

    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password == candidate
    }
}

/// An inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

/// A listing offered by an account. `metadata` and review entries are opaque
/// JSON blobs owned by the client; they are stored and returned untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub title: String,
    pub owner: String,
    pub address: String,
    pub price: f64,
    pub thumbnail: String,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub reviews: Vec<Value>,
    #[serde(default)]
    pub availability: Vec<DateRange>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub posted_on: Option<DateTime<Utc>>,
}

impl Listing {
    /// Create an unpublished listing with no reviews.
    pub fn new(
        title: String,
        owner: String,
        address: String,
        price: f64,
        thumbnail: String,
        metadata: Value,
    ) -> Self {
        Self {
            title,
            owner,
            address,
            price,
            thumbnail,
            metadata,
            reviews: Vec::new(),
            availability: Vec::new(),
            published: false,
            posted_on: None,
        }
    }

    /// Set the published group (flag, availability, posted-on) in one step.
    pub fn publish(&mut self, availability: Vec<DateRange>, now: DateTime<Utc>) {
        self.availability = availability;
        self.published = true;
        self.posted_on = Some(now);
    }

    /// Clear the published group in one step.
    pub fn unpublish(&mut self) {
        self.availability.clear();
        self.published = false;
        self.posted_on = None;
    }

    pub fn summary(&self, id: &str) -> ListingSummary {
        ListingSummary {
            id: id.to_string(),
            title: self.title.clone(),
            owner: self.owner.clone(),
            address: self.address.clone(),
            thumbnail: self.thumbnail.clone(),
            price: self.price,
            reviews: self.reviews.clone(),
            published: self.published,
        }
    }
}

/// Lifecycle of a booking. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Declined,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Declined => "declined",
        };
        f.write_str(s)
    }
}

/// Rejected booking status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("booking is already {0}")]
    Terminal(BookingStatus),

    #[error("a booking cannot return to pending")]
    BackToPending,
}

/// A request by one account to stay at a listing over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub owner: String,
    pub date_range: DateRange,
    pub total_price: f64,
    pub listing_id: String,
    pub status: BookingStatus,
}

impl Booking {
    /// Create a pending booking.
    pub fn new(owner: String, date_range: DateRange, total_price: f64, listing_id: String) -> Self {
        Self {
            owner,
            date_range,
            total_price,
            listing_id,
            status: BookingStatus::Pending,
        }
    }

    /// Move a pending booking to `outcome`. Terminal bookings and transitions
    /// back to pending are refused and leave the status unchanged.
    pub fn resolve(&mut self, outcome: BookingStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        if outcome == BookingStatus::Pending {
            return Err(TransitionError::BackToPending);
        }
        self.status = outcome;
        Ok(())
    }

    pub fn summary(&self, id: &str) -> BookingSummary {
        BookingSummary {
            id: id.to_string(),
            owner: self.owner.clone(),
            date_range: self.date_range,
            total_price: self.total_price,
            listing_id: self.listing_id.clone(),
            status: self.status,
        }
    }
}

/// Read-only projection of a listing for bulk enumeration. Omits metadata and
/// availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub id: String,
    pub title: String,
    pub owner: String,
    pub address: String,
    pub thumbnail: String,
    pub price: f64,
    pub reviews: Vec<Value>,
    pub published: bool,
}

/// Read-only projection of a booking for bulk enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub id: String,
    pub owner: String,
    pub date_range: DateRange,
    pub total_price: f64,
    pub listing_id: String,
    pub status: BookingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(start.parse().unwrap(), end.parse().unwrap())
    }

    fn loft() -> Listing {
        Listing::new(
            "Loft".to_string(),
            "a@x.com".to_string(),
            "1 Rd".to_string(),
            100.0,
            "t.png".to_string(),
            json!({"beds": 2}),
        )
    }

    #[test]
    fn publish_and_unpublish_move_the_group_together() {
        let mut listing = loft();
        let availability = vec![range("2026-01-01", "2026-01-10")];

        listing.publish(availability.clone(), Utc::now());
        assert!(listing.published);
        assert!(listing.posted_on.is_some());
        assert_eq!(listing.availability, availability);

        listing.unpublish();
        assert!(!listing.published);
        assert!(listing.posted_on.is_none());
        assert!(listing.availability.is_empty());
    }

    #[test]
    fn booking_resolves_once() {
        for outcome in [BookingStatus::Accepted, BookingStatus::Declined] {
            let mut booking = Booking::new(
                "b@x.com".to_string(),
                range("2026-02-01", "2026-02-03"),
                200.0,
                "123456789".to_string(),
            );
            assert_eq!(booking.status, BookingStatus::Pending);

            booking.resolve(outcome).unwrap();
            assert_eq!(booking.status, outcome);

            for later in [BookingStatus::Accepted, BookingStatus::Declined] {
                let err = booking.resolve(later).unwrap_err();
                assert_eq!(err, TransitionError::Terminal(outcome));
                assert_eq!(booking.status, outcome);
            }
        }
    }

    #[test]
    fn booking_never_returns_to_pending() {
        let mut booking = Booking::new(
            "b@x.com".to_string(),
            range("2026-02-01", "2026-02-03"),
            200.0,
            "1".to_string(),
        );
        assert_eq!(
            booking.resolve(BookingStatus::Pending),
            Err(TransitionError::BackToPending)
        );
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn date_range_validity() {
        assert!(range("2026-01-01", "2026-01-01").is_valid());
        assert!(!range("2026-01-02", "2026-01-01").is_valid());
    }

    #[test]
    fn listing_serializes_with_camel_case_keys() {
        let value = serde_json::to_value(loft()).unwrap();
        assert_eq!(value["postedOn"], Value::Null);
        assert_eq!(value["published"], json!(false));
        assert_eq!(value["metadata"]["beds"], json!(2));
    }

    #[test]
    fn summary_omits_private_fields() {
        let value = serde_json::to_value(loft().summary("42")).unwrap();
        assert_eq!(value["id"], json!("42"));
        assert!(value.get("metadata").is_none());
        assert!(value.get("availability").is_none());
    }
}
