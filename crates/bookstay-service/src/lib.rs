// ABOUTME: Business operations for the bookstay marketplace, built on the core serializer and store.
// ABOUTME: Exposes the Marketplace facade, its error type, and environment-driven configuration.

pub mod config;
pub mod error;
pub mod marketplace;

pub use config::{ConfigError, MarketConfig, RemoteConfig};
pub use error::MarketError;
pub use marketplace::{ListingPatch, Marketplace, NewBooking, NewListing};
