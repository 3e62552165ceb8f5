// ABOUTME: Marketplace facade: account, listing, and booking operations with their business rules.
// ABOUTME: Each operation is one serialized critical section; mutations then await their snapshot save.

use bookstay_core::serializer::{self, Serializer};
use bookstay_core::{
    Account, Booking, BookingStatus, BookingSummary, DateRange, Listing, ListingSummary, MarketStore,
    Snapshot, TransitionError,
};
use bookstay_store::{PersistenceCoordinator, SnapshotWriter};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MarketConfig;
use crate::error::MarketError;

const INVALID_TOKEN: &str = "Invalid token";
const INVALID_LISTING: &str = "Invalid listing ID";
const INVALID_BOOKING: &str = "Invalid booking ID";
const DUPLICATE_TITLE: &str = "A listing with this title already exists";
const NOT_LISTING_OWNER: &str = "User does not own this listing";
const NOT_BOOKING_OWNER: &str = "User does not own this booking";

/// Fields supplied when creating a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub title: String,
    pub address: String,
    pub price: f64,
    pub thumbnail: String,
    #[serde(default)]
    pub metadata: Value,
}

/// Fields to change on a listing. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub address: Option<String>,
    pub price: Option<f64>,
    pub thumbnail: Option<String>,
    pub metadata: Option<Value>,
}

/// Fields supplied when requesting a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub listing_id: String,
    pub date_range: DateRange,
    pub total_price: f64,
}

/// Shared handle to the marketplace. Clones talk to the same serializer and
/// snapshot writer.
#[derive(Clone)]
pub struct Marketplace {
    serializer: Serializer<MarketStore>,
    writer: SnapshotWriter,
}

impl Marketplace {
    /// Load the stored snapshot using the backends in `config` and start serving.
    pub async fn open(config: &MarketConfig) -> Result<Self, MarketError> {
        Self::open_with(config.coordinator()).await
    }

    /// Load the stored snapshot through `coordinator` and start serving.
    pub async fn open_with(coordinator: PersistenceCoordinator) -> Result<Self, MarketError> {
        let snapshot = coordinator.load_at_startup().await?;
        tracing::info!(
            backend = coordinator.primary_name(),
            users = snapshot.users.len(),
            listings = snapshot.listings.len(),
            bookings = snapshot.bookings.len(),
            "marketplace state loaded"
        );
        Ok(Self::start(MarketStore::from_snapshot(snapshot), coordinator))
    }

    /// Start serving `store` without loading anything.
    pub fn start(store: MarketStore, coordinator: PersistenceCoordinator) -> Self {
        Self {
            serializer: serializer::spawn(store),
            writer: SnapshotWriter::spawn(coordinator),
        }
    }

    /// Run a read-only critical section.
    async fn read<T, F>(&self, op: F) -> Result<T, MarketError>
    where
        F: FnOnce(&MarketStore) -> Result<T, MarketError> + Send + 'static,
        T: Send + 'static,
    {
        self.serializer
            .with_exclusive_access(move |store| op(&*store))
            .await?
    }

    /// Run a mutating critical section. On success the resulting snapshot is
    /// queued before the section ends, and the caller waits for it to be saved.
    /// A failed save does not undo the in-memory change.
    async fn mutate<T, F>(&self, op: F) -> Result<T, MarketError>
    where
        F: FnOnce(&mut MarketStore) -> Result<T, MarketError> + Send + 'static,
        T: Send + 'static,
    {
        let writer = self.writer.clone();
        let (value, pending) = self
            .serializer
            .with_exclusive_access(move |store| {
                let value = op(store)?;
                let pending = writer.enqueue(store.snapshot());
                Ok::<_, MarketError>((value, pending))
            })
            .await??;

        pending.wait().await?;
        Ok(value)
    }

    // Accounts

    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<(), MarketError> {
        let email = email.to_owned();
        let password = password.to_owned();
        let name = name.to_owned();

        self.mutate(move |store| {
            require("email", &email)?;
            require("password", &password)?;
            require("name", &name)?;
            if store.account(&email).is_some() {
                return Err(MarketError::input("Email address already registered"));
            }
            tracing::info!(email = %email, "account registered");
            store.insert_account(email, Account::new(name, password));
            Ok(())
        })
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), MarketError> {
        let email = email.to_owned();
        let password = password.to_owned();

        self.mutate(move |store| {
            let account = store
                .account_mut(&email)
                .filter(|account| account.password_matches(&password))
                .ok_or_else(|| MarketError::input("Invalid email or password"))?;
            account.session_active = true;
            tracing::debug!(email = %email, "logged in");
            Ok(())
        })
        .await
    }

    pub async fn logout(&self, email: &str) -> Result<(), MarketError> {
        let email = email.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            if let Some(account) = store.account_mut(&email) {
                account.session_active = false;
            }
            tracing::debug!(email = %email, "logged out");
            Ok(())
        })
        .await
    }

    // Listings

    /// Create a listing owned by `email` and return its id.
    pub async fn add_listing(&self, email: &str, new: NewListing) -> Result<String, MarketError> {
        let email = email.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            require("title", &new.title)?;
            require("address", &new.address)?;
            require("thumbnail", &new.thumbnail)?;
            require_amount("price", new.price)?;
            if store.listing_id_by_title(&new.title).is_some() {
                return Err(MarketError::input(DUPLICATE_TITLE));
            }

            let listing = Listing::new(
                new.title,
                email,
                new.address,
                new.price,
                new.thumbnail,
                new.metadata,
            );
            let id = store.insert_listing(listing)?;
            tracing::info!(listing_id = %id, "listing created");
            Ok(id)
        })
        .await
    }

    /// Full record for one listing.
    pub async fn listing(&self, id: &str) -> Result<Listing, MarketError> {
        let id = id.to_owned();
        self.read(move |store| {
            store
                .listing(&id)
                .cloned()
                .ok_or_else(|| MarketError::input(INVALID_LISTING))
        })
        .await
    }

    pub async fn all_listings(&self) -> Result<Vec<ListingSummary>, MarketError> {
        self.read(|store| Ok(store.listing_summaries())).await
    }

    pub async fn update_listing(
        &self,
        email: &str,
        id: &str,
        patch: ListingPatch,
    ) -> Result<(), MarketError> {
        let email = email.to_owned();
        let id = id.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            check_listing_owner(store, &email, &id)?;
            if let Some(title) = &patch.title {
                require("title", title)?;
                if store
                    .listing_id_by_title(title)
                    .is_some_and(|other| other != id)
                {
                    return Err(MarketError::input(DUPLICATE_TITLE));
                }
            }
            if let Some(address) = &patch.address {
                require("address", address)?;
            }
            if let Some(thumbnail) = &patch.thumbnail {
                require("thumbnail", thumbnail)?;
            }
            if let Some(price) = patch.price {
                require_amount("price", price)?;
            }

            let listing = store
                .listing_mut(&id)
                .ok_or_else(|| MarketError::input(INVALID_LISTING))?;
            if let Some(title) = patch.title {
                listing.title = title;
            }
            if let Some(address) = patch.address {
                listing.address = address;
            }
            if let Some(price) = patch.price {
                listing.price = price;
            }
            if let Some(thumbnail) = patch.thumbnail {
                listing.thumbnail = thumbnail;
            }
            if let Some(metadata) = patch.metadata {
                listing.metadata = metadata;
            }
            tracing::debug!(listing_id = %id, "listing updated");
            Ok(())
        })
        .await
    }

    /// Delete a listing. Bookings that reference it are kept.
    pub async fn remove_listing(&self, email: &str, id: &str) -> Result<(), MarketError> {
        let email = email.to_owned();
        let id = id.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            check_listing_owner(store, &email, &id)?;
            store.remove_listing(&id);
            tracing::info!(listing_id = %id, "listing removed");
            Ok(())
        })
        .await
    }

    pub async fn publish_listing(
        &self,
        email: &str,
        id: &str,
        availability: Vec<DateRange>,
    ) -> Result<(), MarketError> {
        let email = email.to_owned();
        let id = id.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            check_listing_owner(store, &email, &id)?;
            if availability.is_empty() {
                return Err(MarketError::input("Availability must not be empty"));
            }
            if !availability.iter().all(DateRange::is_valid) {
                return Err(MarketError::input("Invalid date range"));
            }

            let listing = store
                .listing_mut(&id)
                .ok_or_else(|| MarketError::input(INVALID_LISTING))?;
            if listing.published {
                return Err(MarketError::input("This listing is already published"));
            }
            listing.publish(availability, Utc::now());
            tracing::info!(listing_id = %id, "listing published");
            Ok(())
        })
        .await
    }

    pub async fn unpublish_listing(&self, email: &str, id: &str) -> Result<(), MarketError> {
        let email = email.to_owned();
        let id = id.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            check_listing_owner(store, &email, &id)?;

            let listing = store
                .listing_mut(&id)
                .ok_or_else(|| MarketError::input(INVALID_LISTING))?;
            if !listing.published {
                return Err(MarketError::input("This listing is not published"));
            }
            listing.unpublish();
            tracing::info!(listing_id = %id, "listing unpublished");
            Ok(())
        })
        .await
    }

    /// Append a review to a listing the caller has a booking for.
    pub async fn review_listing(
        &self,
        email: &str,
        listing_id: &str,
        booking_id: &str,
        review: Value,
    ) -> Result<(), MarketError> {
        let email = email.to_owned();
        let listing_id = listing_id.to_owned();
        let booking_id = booking_id.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            if store.listing(&listing_id).is_none() {
                return Err(MarketError::input(INVALID_LISTING));
            }
            let booking = store
                .booking(&booking_id)
                .ok_or_else(|| MarketError::input(INVALID_BOOKING))?;
            if booking.owner != email {
                return Err(MarketError::access(NOT_BOOKING_OWNER));
            }
            if booking.listing_id != listing_id {
                return Err(MarketError::input("Booking is not for this listing"));
            }

            let listing = store
                .listing_mut(&listing_id)
                .ok_or_else(|| MarketError::input(INVALID_LISTING))?;
            listing.reviews.push(review);
            tracing::debug!(listing_id = %listing_id, booking_id = %booking_id, "review added");
            Ok(())
        })
        .await
    }

    // Bookings

    /// Request a booking and return its id. The booking starts pending.
    pub async fn make_booking(&self, email: &str, new: NewBooking) -> Result<String, MarketError> {
        let email = email.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            let listing = store
                .listing(&new.listing_id)
                .ok_or_else(|| MarketError::input(INVALID_LISTING))?;
            if listing.owner == email {
                return Err(MarketError::input("Cannot book your own listing"));
            }
            if !new.date_range.is_valid() {
                return Err(MarketError::input("Invalid date range"));
            }
            require_amount("total price", new.total_price)?;

            let booking = Booking::new(email, new.date_range, new.total_price, new.listing_id);
            let id = store.insert_booking(booking)?;
            tracing::info!(booking_id = %id, "booking requested");
            Ok(id)
        })
        .await
    }

    pub async fn accept_booking(&self, email: &str, id: &str) -> Result<(), MarketError> {
        self.resolve_booking(email, id, BookingStatus::Accepted).await
    }

    pub async fn decline_booking(&self, email: &str, id: &str) -> Result<(), MarketError> {
        self.resolve_booking(email, id, BookingStatus::Declined).await
    }

    /// Only the owner of the booked listing may resolve a booking, and only once.
    async fn resolve_booking(
        &self,
        email: &str,
        id: &str,
        outcome: BookingStatus,
    ) -> Result<(), MarketError> {
        let email = email.to_owned();
        let id = id.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            let booking = store
                .booking(&id)
                .ok_or_else(|| MarketError::input(INVALID_BOOKING))?;
            let listing = store
                .listing(&booking.listing_id)
                .ok_or_else(|| MarketError::input(INVALID_LISTING))?;
            if listing.owner != email {
                return Err(MarketError::access(NOT_LISTING_OWNER));
            }

            let booking = store
                .booking_mut(&id)
                .ok_or_else(|| MarketError::input(INVALID_BOOKING))?;
            booking.resolve(outcome).map_err(|e| match e {
                TransitionError::Terminal(status) => {
                    MarketError::input(format!("Booking has already been {}", status))
                }
                TransitionError::BackToPending => MarketError::input(e.to_string()),
            })?;
            tracing::info!(booking_id = %id, status = %outcome, "booking resolved");
            Ok(())
        })
        .await
    }

    pub async fn remove_booking(&self, email: &str, id: &str) -> Result<(), MarketError> {
        let email = email.to_owned();
        let id = id.to_owned();

        self.mutate(move |store| {
            authenticate(store, &email)?;
            let booking = store
                .booking(&id)
                .ok_or_else(|| MarketError::input(INVALID_BOOKING))?;
            if booking.owner != email {
                return Err(MarketError::access(NOT_BOOKING_OWNER));
            }
            store.remove_booking(&id);
            tracing::info!(booking_id = %id, "booking removed");
            Ok(())
        })
        .await
    }

    /// Bookings the caller made, plus bookings on listings the caller owns.
    pub async fn all_bookings(&self, email: &str) -> Result<Vec<BookingSummary>, MarketError> {
        let email = email.to_owned();

        self.read(move |store| {
            authenticate(store, &email)?;
            Ok(store.booking_summaries(|_, booking| {
                booking.owner == email
                    || store
                        .listing(&booking.listing_id)
                        .is_some_and(|listing| listing.owner == email)
            }))
        })
        .await
    }

    // Admin

    /// Clear all three collections and wait for the empty snapshot to be saved.
    pub async fn reset(&self) -> Result<(), MarketError> {
        self.mutate(|store| {
            store.clear();
            tracing::warn!("marketplace reset: all collections cleared");
            Ok(())
        })
        .await
    }

    /// Number of accounts, listings, and bookings.
    pub async fn counts(&self) -> Result<(usize, usize, usize), MarketError> {
        self.read(|store| Ok(store.counts())).await
    }

    /// Consistent copy of the full current state, credentials included. For
    /// persistence checks and admin tooling; never return it to clients.
    pub async fn snapshot(&self) -> Result<Snapshot, MarketError> {
        self.read(|store| Ok(store.snapshot())).await
    }
}

/// The account behind `email` must exist and have an active session.
fn authenticate<'a>(store: &'a MarketStore, email: &str) -> Result<&'a Account, MarketError> {
    store
        .account(email)
        .filter(|account| account.session_active)
        .ok_or_else(|| MarketError::access(INVALID_TOKEN))
}

fn check_listing_owner(store: &MarketStore, email: &str, id: &str) -> Result<(), MarketError> {
    let listing = store
        .listing(id)
        .ok_or_else(|| MarketError::input(INVALID_LISTING))?;
    if listing.owner != email {
        return Err(MarketError::access(NOT_LISTING_OWNER));
    }
    Ok(())
}

fn require(field: &str, value: &str) -> Result<(), MarketError> {
    if value.trim().is_empty() {
        return Err(MarketError::input(format!("The {} field is required", field)));
    }
    Ok(())
}

fn require_amount(field: &str, amount: f64) -> Result<(), MarketError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(MarketError::input(format!(
            "The {} must be a non-negative number",
            field
        )));
    }
    Ok(())
}
