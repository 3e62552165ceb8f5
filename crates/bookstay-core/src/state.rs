// ABOUTME: Defines the Snapshot document and the MarketStore that owns the three collections.
// ABOUTME: Primitives here carry no locking; they are reached only through the mutation serializer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{IdAllocator, IdError};
use crate::model::{Account, Booking, BookingSummary, Listing, ListingSummary};

/// A keyed collection of records. Serializes as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table<T> {
    rows: BTreeMap<String, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.rows.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.rows.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    /// Insert under a caller-chosen key, returning any record it replaced.
    pub fn insert(&mut self, id: String, record: T) -> Option<T> {
        self.rows.insert(id, record)
    }

    /// Insert under a freshly allocated key that is unused in this table.
    pub fn insert_new(&mut self, ids: &mut IdAllocator, record: T) -> Result<String, IdError> {
        let id = ids.allocate(|candidate| self.rows.contains_key(candidate))?;
        self.rows.insert(id.clone(), record);
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        self.rows.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.rows.iter().map(|(id, record)| (id.as_str(), record))
    }

    /// First record matching `pred`, with its key.
    pub fn find<P>(&self, pred: P) -> Option<(&str, &T)>
    where
        P: Fn(&str, &T) -> bool,
    {
        self.iter().find(|&(id, record)| pred(id, record))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The full contents of all three collections at one instant. This is the
/// document written to and read from every persistence backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Table<Account>,
    #[serde(default)]
    pub listings: Table<Listing>,
    #[serde(default)]
    pub bookings: Table<Booking>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.listings.is_empty() && self.bookings.is_empty()
    }
}

/// Owns the live collections and the identifier allocator. Moved into the
/// serializer worker at startup, so every access is already exclusive.
#[derive(Debug, Default)]
pub struct MarketStore {
    tables: Snapshot,
    ids: IdAllocator,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self::with_allocator(snapshot, IdAllocator::new())
    }

    pub fn with_allocator(snapshot: Snapshot, ids: IdAllocator) -> Self {
        Self {
            tables: snapshot,
            ids,
        }
    }

    /// Copy of the current state for persistence.
    pub fn snapshot(&self) -> Snapshot {
        self.tables.clone()
    }

    /// Drop every record in all three collections.
    pub fn clear(&mut self) {
        self.tables = Snapshot::empty();
    }

    // Accounts

    pub fn account(&self, email: &str) -> Option<&Account> {
        self.tables.users.get(email)
    }

    pub fn account_mut(&mut self, email: &str) -> Option<&mut Account> {
        self.tables.users.get_mut(email)
    }

    pub fn insert_account(&mut self, email: String, account: Account) {
        self.tables.users.insert(email, account);
    }

    // Listings

    pub fn listing(&self, id: &str) -> Option<&Listing> {
        self.tables.listings.get(id)
    }

    pub fn listing_mut(&mut self, id: &str) -> Option<&mut Listing> {
        self.tables.listings.get_mut(id)
    }

    /// Id of the live listing titled `title`, if any.
    pub fn listing_id_by_title(&self, title: &str) -> Option<&str> {
        self.tables
            .listings
            .find(|_, listing| listing.title == title)
            .map(|(id, _)| id)
    }

    pub fn insert_listing(&mut self, listing: Listing) -> Result<String, IdError> {
        self.tables.listings.insert_new(&mut self.ids, listing)
    }

    pub fn remove_listing(&mut self, id: &str) -> Option<Listing> {
        self.tables.listings.remove(id)
    }

    pub fn listing_summaries(&self) -> Vec<ListingSummary> {
        self.tables
            .listings
            .iter()
            .map(|(id, listing)| listing.summary(id))
            .collect()
    }

    // Bookings

    pub fn booking(&self, id: &str) -> Option<&Booking> {
        self.tables.bookings.get(id)
    }

    pub fn booking_mut(&mut self, id: &str) -> Option<&mut Booking> {
        self.tables.bookings.get_mut(id)
    }

    pub fn insert_booking(&mut self, booking: Booking) -> Result<String, IdError> {
        self.tables.bookings.insert_new(&mut self.ids, booking)
    }

    pub fn remove_booking(&mut self, id: &str) -> Option<Booking> {
        self.tables.bookings.remove(id)
    }

    /// Projections of the bookings matching `pred`.
    pub fn booking_summaries<P>(&self, pred: P) -> Vec<BookingSummary>
    where
        P: Fn(&str, &Booking) -> bool,
    {
        self.tables
            .bookings
            .iter()
            .filter(|&(id, booking)| pred(id, booking))
            .map(|(id, booking)| booking.summary(id))
            .collect()
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.tables.users.len(),
            self.tables.listings.len(),
            self.tables.bookings.len(),
        )
    }
}
