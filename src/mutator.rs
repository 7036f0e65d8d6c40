use std::sync::Arc;

use pricebook_core::{parse_price, AddEntryCommand, DeleteEntryCommand, PriceError, StoreTable, TableId};
use thiserror::Error;

use crate::{
    aggregator::{self, Comparison, ComparisonOptions, TableView},
    record_store::RecordStore,
    storage::{KeyValueStore, StorageError},
};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("product name is empty")]
    EmptyProduct,
    #[error("store name is empty")]
    EmptyStore,
    #[error(transparent)]
    InvalidPrice(#[from] PriceError),
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("no entry for product '{product}' at store '{store}' in table {table}")]
    NotFound {
        table: TableId,
        product: String,
        store: String,
    },
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Application state: the record store plus the comparison settings.
///
/// Each successful mutation returns a freshly computed [`Comparison`];
/// failed ones leave every table untouched.
pub struct TableMutator {
    store: RecordStore,
    options: ComparisonOptions,
}

impl TableMutator {
    pub fn new(store: RecordStore, options: ComparisonOptions) -> Self {
        Self { store, options }
    }

    pub fn open(backend: Arc<dyn KeyValueStore>, tables: Vec<StoreTable>, options: ComparisonOptions) -> Self {
        Self::new(RecordStore::open(backend, tables), options)
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Finds a table by exact id, falling back to a case-insensitive label match.
    pub fn resolve_table(&self, name: &str) -> Result<TableId, MutationError> {
        let name = name.trim();
        let tables = self.store.tables();
        tables.iter()
            .find(|t| t.id.as_str() == name)
            .or_else(|| tables.iter().find(|t| t.label.to_lowercase() == name.to_lowercase()))
            .map(|t| t.id.clone())
            .ok_or_else(|| MutationError::UnknownTable(name.to_string()))
    }

    pub fn validate_add(&self, table: &TableId, product: &str, store: &str, price_text: &str) -> Result<AddEntryCommand, MutationError> {
        self.ensure_table(table)?;
        let product = product.trim();
        let store = store.trim();
        if product.is_empty() {
            return Err(ValidationError::EmptyProduct.into());
        }
        if store.is_empty() {
            return Err(ValidationError::EmptyStore.into());
        }
        let price = parse_price(price_text).map_err(ValidationError::from)?;
        if self.store.grand_total().checked_add(price).is_none() {
            return Err(ValidationError::InvalidPrice(PriceError::OutOfRange(price_text.trim().to_string())).into());
        }

        Ok(AddEntryCommand {
            table: table.clone(),
            product: Arc::from(product),
            store: Arc::from(store),
            price,
        })
    }

    pub fn validate_delete(&self, table: &TableId, product: &str, store: &str) -> Result<DeleteEntryCommand, MutationError> {
        self.ensure_table(table)?;
        let product = product.trim();
        let store = store.trim();
        if product.is_empty() {
            return Err(ValidationError::EmptyProduct.into());
        }
        if store.is_empty() {
            return Err(ValidationError::EmptyStore.into());
        }

        Ok(DeleteEntryCommand {
            table: table.clone(),
            product: Arc::from(product),
            store: Arc::from(store),
        })
    }

    pub fn add_entry(&mut self, table: &TableId, product: &str, store: &str, price_text: &str) -> Result<Comparison, MutationError> {
        let command = self.validate_add(table, product, store, price_text)?;
        tracing::debug!(table = %command.table, product = %command.product, store = %command.store, price = %command.price, "Adding entry");
        let (table, entry) = command.into_entry();
        self.store.append(&table, entry)?;
        Ok(self.recompute())
    }

    pub fn delete_entry(&mut self, table: &TableId, product: &str, store: &str) -> Result<Comparison, MutationError> {
        let command = self.validate_delete(table, product, store)?;
        let removed = self.store.remove_first_match(&command.table, &command.product, &command.store, self.options.product_matching)?;
        if !removed {
            return Err(MutationError::NotFound {
                table: command.table,
                product: command.product.to_string(),
                store: command.store.to_string(),
            });
        }
        tracing::debug!(table = %command.table, product = %command.product, store = %command.store, "Deleted entry");
        Ok(self.recompute())
    }

    /// Empties every table and its persisted bytes.
    ///
    /// Tables are cleared one at a time in enumeration order. If the backend
    /// fails part-way, the error is returned and the tables before the failing
    /// one stay cleared; the cache still matches the backend for every table.
    pub fn clear_all(&mut self) -> Result<Comparison, MutationError> {
        let ids: Vec<TableId> = self.store.tables().iter().map(|t| t.id.clone()).collect();
        for id in &ids {
            self.store.clear(id)?;
        }
        tracing::info!(tables = ids.len(), "Cleared all tables");
        Ok(self.recompute())
    }

    pub fn recompute(&self) -> Comparison {
        let views: Vec<TableView<'_>> = self.store.tables().iter()
            .map(|table| TableView {
                table,
                entries: self.store.entries(&table.id),
            })
            .collect();
        aggregator::compare(&views, &self.options)
    }

    fn ensure_table(&self, table: &TableId) -> Result<(), MutationError> {
        match self.store.table(table) {
            Some(_) => Ok(()),
            None => Err(MutationError::UnknownTable(table.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::storage::InMemoryStorage;

    fn mutator() -> TableMutator {
        let tables = (1..=4).map(|i| StoreTable::new(&format!("table{}", i), &format!("Store {}", i))).collect();
        TableMutator::open(Arc::new(InMemoryStorage::new()), tables, ComparisonOptions::default())
    }

    #[test]
    fn add_rejects_blank_fields_and_bad_prices() {
        let mut m = mutator();
        let t1 = TableId::from("table1");

        assert!(matches!(m.add_entry(&t1, "  ", "Store 1", "1.00"), Err(MutationError::Validation(ValidationError::EmptyProduct))));
        assert!(matches!(m.add_entry(&t1, "Milk", "", "1.00"), Err(MutationError::Validation(ValidationError::EmptyStore))));
        assert!(matches!(
            m.add_entry(&t1, "Milk", "Store 1", "cheap"),
            Err(MutationError::Validation(ValidationError::InvalidPrice(PriceError::NotANumber(_))))
        ));
        assert!(matches!(
            m.add_entry(&t1, "Milk", "Store 1", "-2"),
            Err(MutationError::Validation(ValidationError::InvalidPrice(PriceError::Negative(_))))
        ));
        assert!(m.store().entries(&t1).is_empty());
    }

    #[test]
    fn add_rejects_totals_that_would_overflow() {
        let mut m = mutator();
        let t1 = TableId::from("table1");
        let t2 = TableId::from("table2");
        let huge = "50000000000000000000000000000";

        m.add_entry(&t1, "Gold", "Vault", huge).unwrap();
        assert!(matches!(
            m.add_entry(&t1, "Gold", "Vault", huge),
            Err(MutationError::Validation(ValidationError::InvalidPrice(PriceError::OutOfRange(ref text)))) if text == huge
        ));
        assert!(matches!(
            m.add_entry(&t2, "Silver", "Vault", huge),
            Err(MutationError::Validation(ValidationError::InvalidPrice(PriceError::OutOfRange(_))))
        ));

        assert_eq!(m.store().entries(&t1).len(), 1);
        assert!(m.store().entries(&t2).is_empty());
        let comparison = m.recompute();
        assert_eq!(comparison.total_for(&t1), Some(dec!(50000000000000000000000000000)));
        assert_eq!(comparison.basket.unwrap().basket_total, dec!(50000000000000000000000000000));
    }

    #[test]
    fn add_trims_and_recomputes() {
        let mut m = mutator();
        let t1 = TableId::from("table1");

        let comparison = m.add_entry(&t1, " Milk ", " Store 1 ", " 1.50 ").unwrap();
        assert_eq!(comparison.total_for(&t1), Some(dec!(1.50)));
        assert_eq!(&*m.store().entries(&t1)[0].product, "Milk");
        assert_eq!(&*m.store().entries(&t1)[0].store, "Store 1");
    }

    #[test]
    fn duplicate_adds_then_single_delete() {
        let mut m = mutator();
        let t1 = TableId::from("table1");

        m.add_entry(&t1, "Eggs", "Store 1", "3.99").unwrap();
        let comparison = m.add_entry(&t1, "Eggs", "Store 1", "3.99").unwrap();
        assert_eq!(m.store().entries(&t1).len(), 2);
        assert_eq!(comparison.total_for(&t1), Some(dec!(7.98)));

        let comparison = m.delete_entry(&t1, "Eggs", "Store 1").unwrap();
        assert_eq!(m.store().entries(&t1).len(), 1);
        assert_eq!(comparison.total_for(&t1), Some(dec!(3.99)));
    }

    #[test]
    fn delete_reports_missing_entry_without_changes() {
        let mut m = mutator();
        let t1 = TableId::from("table1");
        m.add_entry(&t1, "Milk", "Store 1", "1.00").unwrap();

        let err = m.delete_entry(&t1, "Milk", "Store 2").unwrap_err();
        assert!(matches!(err, MutationError::NotFound { ref product, .. } if product == "Milk"));
        assert!(matches!(m.delete_entry(&t1, "", "Store 1"), Err(MutationError::Validation(ValidationError::EmptyProduct))));
        assert_eq!(m.store().entries(&t1).len(), 1);
    }

    #[test]
    fn clear_all_resets_to_baseline() {
        let mut m = mutator();
        m.add_entry(&TableId::from("table1"), "Milk", "Store 1", "1.00").unwrap();
        m.add_entry(&TableId::from("table3"), "Milk", "Store 3", "0.90").unwrap();

        let comparison = m.clear_all().unwrap();
        assert!(comparison.is_baseline());
        assert!(comparison.cheapest.is_none());
        assert!(comparison.basket.is_none());
        assert!(comparison.totals.iter().all(|t| t.total == Decimal::ZERO));
    }

    /// Fails every `remove` for one key.
    struct FailingRemove {
        inner: InMemoryStorage,
        key: &'static str,
    }

    impl KeyValueStore for FailingRemove {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::Other(format!("cannot remove {}", key)));
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn clear_all_stops_at_failing_table() {
        let backend = Arc::new(FailingRemove { inner: InMemoryStorage::new(), key: "table3" });
        let tables = (1..=4).map(|i| StoreTable::new(&format!("table{}", i), &format!("Store {}", i))).collect();
        let mut m = TableMutator::open(backend.clone(), tables, ComparisonOptions::default());
        for i in 1..=4 {
            m.add_entry(&TableId::from(format!("table{}", i).as_str()), "Milk", "Shop", "1.00").unwrap();
        }

        assert!(matches!(m.clear_all(), Err(MutationError::Storage(StorageError::Other(_)))));

        for (id, remaining) in [("table1", 0), ("table2", 0), ("table3", 1), ("table4", 1)] {
            let id = TableId::from(id);
            assert_eq!(m.store().entries(&id).len(), remaining);
            assert_eq!(crate::record_store::load(backend.as_ref(), &id).len(), remaining);
        }
    }

    #[test]
    fn resolve_table_by_id_or_label() {
        let m = mutator();
        assert_eq!(m.resolve_table("table2").unwrap(), TableId::from("table2"));
        assert_eq!(m.resolve_table("store 3").unwrap(), TableId::from("table3"));
        assert!(matches!(m.resolve_table("Store 9"), Err(MutationError::UnknownTable(_))));
    }

    #[test]
    fn unknown_table_is_rejected_before_validation() {
        let mut m = mutator();
        assert!(matches!(m.add_entry(&TableId::from("nope"), "", "", ""), Err(MutationError::UnknownTable(_))));
    }
}
