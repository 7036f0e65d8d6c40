//! Derived comparison views over all tables.
//!
//! Everything here is a pure function of the table contents: nothing is
//! cached between runs, so recomputing after every edit is always safe.

use std::{collections::{BTreeMap, BTreeSet}, sync::Arc};

use pricebook_core::{MatchPolicy, PriceEntry, StoreTable, TableId};
use rust_decimal::Decimal;
use serde::Deserialize;

/// One table and its entries, borrowed from wherever they live.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    pub table: &'a StoreTable,
    pub entries: &'a [PriceEntry],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ComparisonOptions {
    #[serde(default)]
    pub product_matching: MatchPolicy,
    /// Leave zero-entry tables out of the cheapest-store pick.
    #[serde(default)]
    pub exclude_empty_tables: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableTotal {
    pub table: StoreTable,
    pub total: Decimal,
    pub entry_count: usize,
}

/// Position of an entry: its table and its index in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryRef {
    pub table: TableId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductGroup {
    /// First spelling seen in canonical table order.
    pub name: Arc<str>,
    pub min_price: Decimal,
    /// Every entry priced at `min_price`, ties included.
    pub cheapest: BTreeSet<EntryRef>,
}

impl ProductGroup {
    pub fn tables(&self) -> BTreeSet<TableId> {
        self.cheapest.iter().map(|e| e.table.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheapestByProduct {
    pub groups: BTreeMap<String, ProductGroup>,
}

impl CheapestByProduct {
    pub fn is_cheapest(&self, table: &TableId, index: usize) -> bool {
        let probe = EntryRef { table: table.clone(), index };
        self.groups.values().any(|g| g.cheapest.contains(&probe))
    }

    pub fn get(&self, product: &str, policy: MatchPolicy) -> Option<&ProductGroup> {
        self.groups.get(&policy.key(product))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Savings {
    /// The store total exceeds the basket by this amount.
    CanSave(Decimal),
    AlreadyCheapest,
    /// The store total is below the basket by this amount.
    BelowBasket(Decimal),
}

impl Savings {
    pub fn classify(difference: Decimal) -> Self {
        if difference > Decimal::ZERO {
            Savings::CanSave(difference)
        } else if difference.is_zero() {
            Savings::AlreadyCheapest
        } else {
            Savings::BelowBasket(-difference)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreSavings {
    pub table: StoreTable,
    /// Store total minus basket total; may be negative.
    pub difference: Decimal,
    pub savings: Savings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasketSummary {
    pub basket_total: Decimal,
    pub stores: Vec<StoreSavings>,
}

impl BasketSummary {
    pub fn savings_for(&self, table: &TableId) -> Option<&StoreSavings> {
        self.stores.iter().find(|s| &s.table.id == table)
    }
}

/// Every derived view for one snapshot of the tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub totals: Vec<TableTotal>,
    /// `None` when no table holds any entry, or every candidate was excluded.
    pub cheapest: Option<TableTotal>,
    pub cheapest_products: CheapestByProduct,
    /// `None` when no table holds any entry.
    pub basket: Option<BasketSummary>,
}

impl Comparison {
    pub fn total_for(&self, table: &TableId) -> Option<Decimal> {
        self.totals.iter().find(|t| &t.table.id == table).map(|t| t.total)
    }

    pub fn is_baseline(&self) -> bool {
        self.totals.iter().all(|t| t.entry_count == 0)
    }
}

/// Sum of all prices in a table; zero for an empty table. No rounding.
///
/// Saturates at `Decimal::MAX`; the record store keeps the sum of every
/// stored price in range, so saturation only shows for hand-built input.
pub fn table_total(entries: &[PriceEntry]) -> Decimal {
    saturating_total(entries.iter().map(|e| e.price))
}

fn saturating_total<I: IntoIterator<Item = Decimal>>(prices: I) -> Decimal {
    prices.into_iter().fold(Decimal::ZERO, |sum, price| sum.saturating_add(price))
}

/// The table with the smallest total. Ties keep the earliest table in
/// enumeration order.
pub fn cheapest_table<'a, I>(totals: I) -> Option<&'a TableId>
where
    I: IntoIterator<Item = (&'a TableId, Decimal)>,
{
    let mut cheapest: Option<(&'a TableId, Decimal)> = None;
    for (id, total) in totals {
        match cheapest {
            Some((_, min)) if total >= min => {},
            _ => cheapest = Some((id, total)),
        }
    }
    cheapest.map(|(id, _)| id)
}

/// Groups every entry across all tables by product and marks each entry
/// priced at its group's minimum.
pub fn cheapest_by_product(tables: &[TableView<'_>], policy: MatchPolicy) -> CheapestByProduct {
    let mut groups: BTreeMap<String, ProductGroup> = BTreeMap::new();

    for view in tables {
        for entry in view.entries {
            let key = policy.key(&entry.product);
            groups.entry(key)
                .and_modify(|g| {
                    if entry.price < g.min_price {
                        g.min_price = entry.price;
                    }
                })
                .or_insert_with(|| ProductGroup {
                    name: entry.product.clone(),
                    min_price: entry.price,
                    cheapest: BTreeSet::new(),
                });
        }
    }

    for view in tables {
        for (index, entry) in view.entries.iter().enumerate() {
            if let Some(group) = groups.get_mut(&policy.key(&entry.product)) {
                if entry.price == group.min_price {
                    group.cheapest.insert(EntryRef { table: view.table.id.clone(), index });
                }
            }
        }
    }

    CheapestByProduct { groups }
}

/// Basket total is the sum of each product's cheapest price anywhere; each
/// table's savings is its own total minus that basket.
pub fn cheapest_basket_and_savings(tables: &[TableView<'_>], policy: MatchPolicy) -> BasketSummary {
    let products = cheapest_by_product(tables, policy);
    basket_from_groups(tables, &products)
}

fn basket_from_groups(tables: &[TableView<'_>], products: &CheapestByProduct) -> BasketSummary {
    let basket_total = saturating_total(products.groups.values().map(|g| g.min_price));

    let stores = tables.iter()
        .map(|view| {
            let difference = table_total(view.entries) - basket_total;
            StoreSavings {
                table: view.table.clone(),
                difference,
                savings: Savings::classify(difference),
            }
        })
        .collect();

    BasketSummary { basket_total, stores }
}

/// Computes all views in one pass over the tables.
pub fn compare(tables: &[TableView<'_>], options: &ComparisonOptions) -> Comparison {
    let totals: Vec<TableTotal> = tables.iter()
        .map(|view| TableTotal {
            table: view.table.clone(),
            total: table_total(view.entries),
            entry_count: view.entries.len(),
        })
        .collect();

    let cheapest_products = cheapest_by_product(tables, options.product_matching);

    if totals.iter().all(|t| t.entry_count == 0) {
        return Comparison {
            totals,
            cheapest: None,
            cheapest_products,
            basket: None,
        };
    }

    let candidates = totals.iter()
        .filter(|t| !options.exclude_empty_tables || t.entry_count > 0)
        .map(|t| (&t.table.id, t.total));
    let cheapest = cheapest_table(candidates)
        .and_then(|id| totals.iter().find(|t| &t.table.id == id))
        .cloned();

    let basket = basket_from_groups(tables, &cheapest_products);

    Comparison {
        totals,
        cheapest,
        cheapest_products,
        basket: Some(basket),
    }
}
