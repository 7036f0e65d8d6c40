use std::{collections::BTreeMap, sync::Arc};

use pricebook_core::{MatchPolicy, PriceEntry, StoreTable, TableId};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    aggregator,
    storage::{KeyValueStore, StorageError},
};

/// Per-table sequences of price entries, mirrored to a key-value backend.
///
/// Every change rewrites the table's full sequence. The backend is written
/// first and the cached sequence replaced only after the write succeeded,
/// so a failed persist leaves the store as it was.
///
/// The sum of every price across all tables always fits in a `Decimal`.
/// Table totals and the basket total are bounded by it, so the aggregator
/// never overflows on stored data.
pub struct RecordStore {
    backend: Arc<dyn KeyValueStore>,
    tables: Vec<StoreTable>,
    entries: BTreeMap<TableId, Vec<PriceEntry>>,
}

impl RecordStore {
    /// Loads every configured table from the backend.
    ///
    /// Entries are taken in table order; one that would push the running sum
    /// of all prices past `Decimal::MAX` is dropped.
    pub fn open(backend: Arc<dyn KeyValueStore>, tables: Vec<StoreTable>) -> Self {
        let mut entries = BTreeMap::new();
        let mut running = Decimal::ZERO;
        for table in &tables {
            let mut kept = load(backend.as_ref(), &table.id);
            kept.retain(|entry| match running.checked_add(entry.price) {
                Some(sum) => {
                    running = sum;
                    true
                },
                None => {
                    tracing::warn!(table = %table.id, product = %entry.product, price = %entry.price, "Skipping entry whose price overflows the running total");
                    false
                },
            });
            entries.insert(table.id.clone(), kept);
        }
        tracing::info!(tables = tables.len(), "Record store opened");
        Self {
            backend,
            tables,
            entries,
        }
    }

    /// Tables in canonical enumeration order.
    pub fn tables(&self) -> &[StoreTable] {
        &self.tables
    }

    pub fn table(&self, id: &TableId) -> Option<&StoreTable> {
        self.tables.iter().find(|t| &t.id == id)
    }

    pub fn entries(&self, id: &TableId) -> &[PriceEntry] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of every price in every table.
    pub fn grand_total(&self) -> Decimal {
        self.entries.values().map(|entries| aggregator::table_total(entries)).fold(Decimal::ZERO, Decimal::saturating_add)
    }

    pub fn append(&mut self, id: &TableId, entry: PriceEntry) -> Result<(), StorageError> {
        self.ensure_known(id)?;
        let mut updated = self.entries(id).to_vec();
        updated.push(entry);
        self.persist(id, updated)
    }

    /// Removes the first entry whose product and store match under `policy`.
    /// Returns `false` without touching the backend when nothing matches.
    pub fn remove_first_match(&mut self, id: &TableId, product: &str, store: &str, policy: MatchPolicy) -> Result<bool, StorageError> {
        self.ensure_known(id)?;
        let current = self.entries(id);
        let position = current.iter()
            .position(|e| policy.matches(&e.product, product) && policy.matches(&e.store, store));

        match position {
            Some(index) => {
                let mut updated = current.to_vec();
                updated.remove(index);
                self.persist(id, updated)?;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    pub fn clear(&mut self, id: &TableId) -> Result<(), StorageError> {
        self.ensure_known(id)?;
        self.backend.remove(id.as_str())?;
        self.entries.insert(id.clone(), Vec::new());
        tracing::debug!(table = %id, "Table cleared");
        Ok(())
    }

    fn ensure_known(&self, id: &TableId) -> Result<(), StorageError> {
        if self.entries.contains_key(id) {
            Ok(())
        } else {
            Err(StorageError::UnknownTable(id.to_string()))
        }
    }

    fn persist(&mut self, id: &TableId, updated: Vec<PriceEntry>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(&updated)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.put(id.as_str(), &bytes)?;
        tracing::debug!(table = %id, entries = updated.len(), "Table persisted");
        self.entries.insert(id.clone(), updated);
        Ok(())
    }
}

/// Reads one table's sequence. Never fails: unreadable or malformed bytes
/// yield an empty table and malformed elements are dropped individually.
pub fn load(backend: &dyn KeyValueStore, id: &TableId) -> Vec<PriceEntry> {
    let bytes = match backend.get(id.as_str()) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(table = %id, error = %e, "Failed to read table, treating as empty");
            return Vec::new();
        }
    };

    let values: Vec<Value> = match serde_json::from_slice(&bytes) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(table = %id, error = %e, "Persisted table is not a JSON array, treating as empty");
            return Vec::new();
        }
    };

    let mut entries = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<PriceEntry>(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(table = %id, index, error = %e, "Skipping malformed entry"),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::storage::InMemoryStorage;

    fn tables() -> Vec<StoreTable> {
        vec![StoreTable::new("table1", "Store 1"), StoreTable::new("table2", "Store 2")]
    }

    fn open_with(backend: Arc<InMemoryStorage>) -> RecordStore {
        RecordStore::open(backend, tables())
    }

    #[test]
    fn load_missing_key_is_empty() {
        let backend = InMemoryStorage::new();
        assert!(load(&backend, &TableId::from("table1")).is_empty());
    }

    #[test]
    fn load_garbage_is_empty() {
        let backend = InMemoryStorage::new();
        backend.put("table1", b"not json").unwrap();
        backend.put("table2", br#"{"product":"Milk"}"#).unwrap();

        assert!(load(&backend, &TableId::from("table1")).is_empty());
        assert!(load(&backend, &TableId::from("table2")).is_empty());
    }

    #[test]
    fn load_skips_malformed_entries_and_reads_numeric_prices() {
        let backend = InMemoryStorage::new();
        backend.put("table1", br#"[
            {"product":"Milk","store":"Store 1","price":"1.50"},
            {"product":"Bread","store":"Store 1"},
            {"product":"Eggs","store":"Store 1","price":"abc"},
            {"product":"Tea","store":"Store 1","price":2.25},
            42
        ]"#).unwrap();

        let entries = load(&backend, &TableId::from("table1"));
        assert_eq!(entries, vec![
            PriceEntry::new("Milk", "Store 1", dec!(1.50)),
            PriceEntry::new("Tea", "Store 1", dec!(2.25)),
        ]);
    }

    #[test]
    fn append_persists_full_sequence_in_order() {
        let backend = Arc::new(InMemoryStorage::new());
        let mut store = open_with(backend.clone());
        let id = TableId::from("table1");

        store.append(&id, PriceEntry::new("Milk", "Store 1", dec!(1.50))).unwrap();
        store.append(&id, PriceEntry::new("Milk", "Store 1", dec!(1.50))).unwrap();
        store.append(&id, PriceEntry::new("Bread", "Store 1", dec!(2.00))).unwrap();

        assert_eq!(store.entries(&id).len(), 3);
        assert_eq!(load(backend.as_ref(), &id), store.entries(&id));
        assert_eq!(&*store.entries(&id)[2].product, "Bread");
    }

    #[test]
    fn remove_first_match_removes_once_then_reports_false() {
        let backend = Arc::new(InMemoryStorage::new());
        let mut store = open_with(backend.clone());
        let id = TableId::from("table1");
        store.append(&id, PriceEntry::new("Milk", "Store 1", dec!(1.50))).unwrap();
        store.append(&id, PriceEntry::new("Bread", "Store 1", dec!(2.00))).unwrap();

        assert!(store.remove_first_match(&id, "MILK", " store 1", MatchPolicy::CaseInsensitive).unwrap());
        let after_first = load(backend.as_ref(), &id);
        assert_eq!(after_first, vec![PriceEntry::new("Bread", "Store 1", dec!(2.00))]);

        assert!(!store.remove_first_match(&id, "Milk", "Store 1", MatchPolicy::CaseInsensitive).unwrap());
        assert_eq!(load(backend.as_ref(), &id), after_first);
        assert_eq!(store.entries(&id), after_first.as_slice());
    }

    #[test]
    fn remove_first_match_honours_exact_policy() {
        let backend = Arc::new(InMemoryStorage::new());
        let mut store = open_with(backend);
        let id = TableId::from("table1");
        store.append(&id, PriceEntry::new("Milk", "Store 1", dec!(1.50))).unwrap();

        assert!(!store.remove_first_match(&id, "milk", "Store 1", MatchPolicy::Exact).unwrap());
        assert!(store.remove_first_match(&id, "Milk", "Store 1", MatchPolicy::Exact).unwrap());
    }

    #[test]
    fn clear_erases_one_table_only() {
        let backend = Arc::new(InMemoryStorage::new());
        let mut store = open_with(backend.clone());
        let t1 = TableId::from("table1");
        let t2 = TableId::from("table2");
        store.append(&t1, PriceEntry::new("Milk", "Store 1", dec!(1.50))).unwrap();
        store.append(&t2, PriceEntry::new("Milk", "Store 2", dec!(1.00))).unwrap();

        store.clear(&t1).unwrap();

        assert!(store.entries(&t1).is_empty());
        assert_eq!(backend.get("table1").unwrap(), None);
        assert_eq!(store.entries(&t2).len(), 1);
        assert_eq!(load(backend.as_ref(), &t2).len(), 1);
    }

    #[test]
    fn open_drops_entries_that_overflow_the_running_total() {
        let backend = Arc::new(InMemoryStorage::new());
        let huge = r#"{"product":"Gold","store":"Vault","price":"50000000000000000000000000000"}"#;
        backend.put("table1", format!("[{huge},{huge}]").as_bytes()).unwrap();
        backend.put("table2", format!(r#"[{huge},{{"product":"Milk","store":"Store 2","price":"1.00"}}]"#).as_bytes()).unwrap();

        let store = open_with(backend);
        assert_eq!(store.entries(&TableId::from("table1")).len(), 1);
        assert_eq!(store.entries(&TableId::from("table2")), &[PriceEntry::new("Milk", "Store 2", dec!(1.00))]);
        assert_eq!(store.grand_total(), dec!(50000000000000000000000000001));
    }

    #[test]
    fn unknown_table_is_rejected() {
        let mut store = open_with(Arc::new(InMemoryStorage::new()));
        let err = store.append(&TableId::from("table9"), PriceEntry::new("Milk", "S", dec!(1))).unwrap_err();
        assert!(matches!(err, StorageError::UnknownTable(id) if id == "table9"));
    }

    #[test]
    fn open_reads_existing_data() {
        let backend = Arc::new(InMemoryStorage::new());
        backend.put("table2", br#"[{"product":"Eggs","store":"Store 2","price":"3.99"}]"#).unwrap();

        let store = open_with(backend);
        assert_eq!(store.entries(&TableId::from("table2")), &[PriceEntry::new("Eggs", "Store 2", dec!(3.99))]);
        assert!(store.entries(&TableId::from("table1")).is_empty());
    }
}
