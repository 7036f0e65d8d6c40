//! Core types and traits for pricebook storage backends.
//!
//! This crate provides the `KeyValueStore` trait that persistence backends
//! implement, plus the price-entry model shared by the record store and the
//! comparison logic.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{parse_price, MatchPolicy, PriceEntry, PriceError, StoreTable, TableId};
pub use models::write::{AddEntryCommand, DeleteEntryCommand};
pub use storage::{KeyValueStore, StorageError};
