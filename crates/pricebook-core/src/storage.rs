use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
}

/// Byte-oriented persistence keyed by table id.
///
/// Values are opaque to the backend; the record store owns the encoding.
/// A missing key and an empty table are indistinguishable to callers.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
