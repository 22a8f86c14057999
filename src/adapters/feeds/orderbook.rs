//! Local order-book reconstruction for binary markets.
//!
//! The venue only publishes resting bids on each side. A YES ask is the
//! complement of the best NO bid (`100 - bid`, in cents) and vice versa.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::domain::types::MarketId;

/// Which side of the binary contract a ladder belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Yes,
    No,
}

/// Bid ladders for one market, keyed by price in cents.
#[derive(Debug, Clone, Default)]
pub struct BinaryBook {
    yes_bids: BTreeMap<u32, i64>,
    no_bids: BTreeMap<u32, i64>,
}

impl BinaryBook {
    /// Builds a book from `[price, qty]` pairs, skipping malformed entries.
    pub fn from_levels(yes: &[Vec<i64>], no: &[Vec<i64>]) -> Self {
        Self {
            yes_bids: parse_levels(yes),
            no_bids: parse_levels(no),
        }
    }

    /// Adds `delta` contracts at `price`. Levels that reach zero are removed.
    pub fn apply_delta(&mut self, side: BookSide, price: u32, delta: i64) {
        let ladder = match side {
            BookSide::Yes => &mut self.yes_bids,
            BookSide::No => &mut self.no_bids,
        };
        let qty = ladder.get(&price).copied().unwrap_or(0) + delta;
        if qty <= 0 {
            ladder.remove(&price);
        } else {
            ladder.insert(price, qty);
        }
    }

    fn best(ladder: &BTreeMap<u32, i64>) -> Option<u32> {
        ladder
            .iter()
            .rev()
            .find(|(_, qty)| **qty > 0)
            .map(|(price, _)| *price)
    }

    /// `(yes_ask, no_ask)` in dollars. A side with no opposing bids is 0.
    pub fn implied_asks(&self) -> (f64, f64) {
        let yes_ask = Self::best(&self.no_bids).map_or(0, |bid| 100u32.saturating_sub(bid));
        let no_ask = Self::best(&self.yes_bids).map_or(0, |bid| 100u32.saturating_sub(bid));
        (f64::from(yes_ask) / 100.0, f64::from(no_ask) / 100.0)
    }
}

fn parse_levels(levels: &[Vec<i64>]) -> BTreeMap<u32, i64> {
    levels
        .iter()
        .filter_map(|level| match level.as_slice() {
            [price, qty, ..] => u32::try_from(*price).ok().map(|p| (p, *qty)),
            _ => None,
        })
        .collect()
}

/// Books for every subscribed market.
#[derive(Debug, Default)]
pub struct BookStore {
    books: HashMap<MarketId, BinaryBook>,
}

impl BookStore {
    pub fn replace(&mut self, market: &str, book: BinaryBook) -> &BinaryBook {
        self.books.insert(market.to_string(), book);
        &self.books[market]
    }

    pub fn apply_delta(
        &mut self,
        market: &str,
        side: BookSide,
        price: u32,
        delta: i64,
    ) -> &BinaryBook {
        let book = self.books.entry(market.to_string()).or_default();
        book.apply_delta(side, price, delta);
        book
    }

    pub fn remove(&mut self, market: &str) {
        self.books.remove(market);
    }

    pub fn clear(&mut self) {
        self.books.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_implied_asks() {
        let book = BinaryBook::from_levels(&[vec![40, 10], vec![45, 5]], &[vec![52, 3]]);
        let (yes, no) = book.implied_asks();
        assert!((yes - 0.48).abs() < 1e-12);
        assert!((no - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_delta_removes_empty_level() {
        let mut book = BinaryBook::from_levels(&[vec![45, 5]], &[vec![52, 3], vec![50, 1]]);
        book.apply_delta(BookSide::No, 52, -3);
        let (yes, _) = book.implied_asks();
        assert!((yes - 0.50).abs() < 1e-12);
        book.apply_delta(BookSide::No, 50, -2);
        assert_eq!(book.implied_asks().0, 0.0);
    }

    #[test]
    fn test_delta_on_unknown_market_creates_book() {
        let mut store = BookStore::default();
        let book = store.apply_delta("MKT", BookSide::Yes, 30, 4);
        assert!((book.implied_asks().1 - 0.70).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_levels_skipped() {
        let book = BinaryBook::from_levels(&[vec![45], vec![-1, 3]], &[]);
        assert_eq!(book.implied_asks(), (0.0, 0.0));
    }
}
