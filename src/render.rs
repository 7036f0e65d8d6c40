//! Terminal rendering of tables and comparison results.

use pricebook_core::PriceEntry;
use prettytable::{format, row, Cell, Row, Table};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    aggregator::{BasketSummary, Comparison, Savings},
    record_store::RecordStore,
};

/// Two-decimal display form used for every amount shown to the user.
/// Halves round away from zero, so 0.125 shows as 0.13.
pub fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// One table's rows in insertion order, cheapest prices marked, with a total footer.
pub fn entries_table(entries: &[PriceEntry], total: Decimal, is_cheapest: impl Fn(usize) -> bool) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Product", "Store", "Price", ""]);

    for (index, entry) in entries.iter().enumerate() {
        let price = entry.price.to_string();
        if is_cheapest(index) {
            table.add_row(Row::new(vec![
                Cell::new(&entry.product),
                Cell::new(&entry.store),
                Cell::new(&price).style_spec("Fg"),
                Cell::new("*").style_spec("Fg"),
            ]));
        } else {
            table.add_row(row![entry.product, entry.store, price, ""]);
        }
    }

    table.add_empty_row();
    table.add_row(row!["Total", "", money(total), ""]);
    table
}

pub fn cheapest_store_label(comparison: &Comparison) -> Option<String> {
    comparison.cheapest.as_ref().map(|c| {
        format!("Cheapest store: {} (Total: {})", c.table.label, money(c.total))
    })
}

pub fn savings_report(basket: &BasketSummary) -> String {
    let mut lines = vec![format!("Cheapest possible basket total: {}", money(basket.basket_total))];
    for store in &basket.stores {
        let line = match store.savings {
            Savings::CanSave(amount) => format!(
                "{}: You can save {} by buying only the cheapest products.",
                store.table.label,
                money(amount)
            ),
            Savings::AlreadyCheapest => format!(
                "{}: No savings, this store already has the cheapest basket.",
                store.table.label
            ),
            Savings::BelowBasket(_) => format!(
                "{}: This store is cheaper than the calculated basket!",
                store.table.label
            ),
        };
        lines.push(line);
    }
    lines.join("\n")
}

/// Full report: every table, then the cheapest-store label and savings block.
pub fn report(store: &RecordStore, comparison: &Comparison) -> String {
    let mut out = String::new();

    for table in store.tables() {
        let entries = store.entries(&table.id);
        let total = comparison.total_for(&table.id).unwrap_or(Decimal::ZERO);
        let rendered = entries_table(entries, total, |index| {
            comparison.cheapest_products.is_cheapest(&table.id, index)
        });
        out.push_str(&format!("{} [{}]\n{}\n", table.label, table.id, rendered));
    }

    if let Some(label) = cheapest_store_label(comparison) {
        out.push_str(&label);
        out.push('\n');
    }
    if let Some(basket) = &comparison.basket {
        out.push_str(&savings_report(basket));
        out.push('\n');
    }

    out
}
