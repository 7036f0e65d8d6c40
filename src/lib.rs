pub mod aggregator;
pub mod commands;
pub mod config;
pub mod mutator;
pub mod record_store;
pub mod render;
pub mod sqlite_storage;
pub mod storage;

pub use pricebook_core::{MatchPolicy, PriceEntry, StoreTable, TableId};
