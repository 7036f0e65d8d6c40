use std::{fmt::{self, Display}, str::FromStr, sync::Arc};

use rust_decimal::Decimal;
use serde::{de::{self, Visitor}, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub mod write;

/// Identifier of one store's record collection. Doubles as the persistence key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(Arc<str>);

impl TableId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TableId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct StoreTable {
    pub id: TableId,
    pub label: Arc<str>,
}

impl StoreTable {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: TableId::new(id),
            label: Arc::from(label),
        }
    }
}

/// One recorded (product, store, price) observation.
///
/// Persisted as `{"product": .., "store": .., "price": ..}`. The price is
/// written as a string and read back from either a string or a JSON number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceEntry {
    pub product: Arc<str>,
    pub store: Arc<str>,
    #[serde(serialize_with = "serialize_price", deserialize_with = "deserialize_price")]
    pub price: Decimal,
}

impl PriceEntry {
    pub fn new(product: &str, store: &str, price: Decimal) -> Self {
        Self {
            product: Arc::from(product),
            store: Arc::from(store),
            price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("price is empty")]
    Empty,
    #[error("price is not a number: {0}")]
    NotANumber(String),
    #[error("price is negative: {0}")]
    Negative(String),
    #[error("price is out of range: {0}")]
    OutOfRange(String),
}

/// Parses user or persisted price text into a non-negative decimal.
///
/// Accepts plain decimals (`3.99`, `.5`, ` 2 `) and scientific notation (`1e2`).
pub fn parse_price(text: &str) -> Result<Decimal, PriceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PriceError::Empty);
    }

    let price = match Decimal::from_str(text).or_else(|_| Decimal::from_scientific(text)) {
        Ok(price) => price,
        Err(_) => return Err(classify_unrepresentable(text)),
    };

    if price.is_sign_negative() && !price.is_zero() {
        return Err(PriceError::Negative(text.to_string()));
    }

    Ok(price)
}

// Text a Decimal cannot hold is still a number if f64 reads it as finite.
fn classify_unrepresentable(text: &str) -> PriceError {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v < 0.0 => PriceError::Negative(text.to_string()),
        Ok(v) if v.is_finite() => PriceError::OutOfRange(text.to_string()),
        _ => PriceError::NotANumber(text.to_string()),
    }
}

fn serialize_price<S: Serializer>(price: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&price.to_string())
}

fn deserialize_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    deserializer.deserialize_any(PriceVisitor)
}

struct PriceVisitor;

impl<'de> Visitor<'de> for PriceVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative price as a string or a number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
        parse_price(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
        if v < 0 {
            return Err(E::custom(PriceError::Negative(v.to_string())));
        }
        Ok(Decimal::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
        if !v.is_finite() {
            return Err(E::custom(PriceError::NotANumber(v.to_string())));
        }
        // f64 Display is the shortest round-trip form, so 1.1 stays 1.1
        parse_price(&v.to_string()).map_err(E::custom)
    }
}

/// How product and store names are compared when deleting and when grouping
/// products for the cheapest-item and basket views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Trimmed, lower-cased comparison.
    #[default]
    CaseInsensitive,
    /// Byte-exact comparison.
    Exact,
}

impl MatchPolicy {
    pub fn key(&self, name: &str) -> String {
        match self {
            MatchPolicy::CaseInsensitive => name.trim().to_lowercase(),
            MatchPolicy::Exact => name.to_string(),
        }
    }

    pub fn matches(&self, a: &str, b: &str) -> bool {
        match self {
            MatchPolicy::CaseInsensitive => a.trim().to_lowercase() == b.trim().to_lowercase(),
            MatchPolicy::Exact => a == b,
        }
    }
}
