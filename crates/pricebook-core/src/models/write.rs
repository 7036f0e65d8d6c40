use std::sync::Arc;

use rust_decimal::Decimal;

use super::{PriceEntry, TableId};

#[derive(Debug, Clone, PartialEq)]
pub struct AddEntryCommand {
    pub table: TableId,
    pub product: Arc<str>,
    pub store: Arc<str>,
    pub price: Decimal,
}

impl AddEntryCommand {
    pub fn into_entry(self) -> (TableId, PriceEntry) {
        let entry = PriceEntry {
            product: self.product,
            store: self.store,
            price: self.price,
        };
        (self.table, entry)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteEntryCommand {
    pub table: TableId,
    pub product: Arc<str>,
    pub store: Arc<str>,
}
