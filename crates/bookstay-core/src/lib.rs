// ABOUTME: Core library for bookstay: domain records, identifier allocation, state store, and serializer.
// ABOUTME: Everything that touches the shared collections goes through the Serializer defined here.

pub mod ids;
pub mod model;
pub mod serializer;
pub mod state;

pub use ids::{IdAllocator, IdError};
pub use model::{
    Account, Booking, BookingStatus, BookingSummary, DateRange, Listing, ListingSummary,
    TransitionError,
};
pub use serializer::{Serializer, SerializerError};
pub use state::{MarketStore, Snapshot, Table};
