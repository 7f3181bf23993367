use std::collections::HashMap;

use crate::types::catalog::{BestPrice, PriceSource, ProductWithSources};

/// A single-step drop larger than this (percent) raises a per-source alert.
pub const SOURCE_DROP_ALERT_PCT: f64 = 2.0;

/// Cheapest current price across a product's sources.
///
/// Ties resolve to the first source in input order, so a later source must be
/// strictly cheaper to take the label.
pub fn best_price(sources: &[PriceSource]) -> Option<BestPrice> {
    let mut best: Option<&PriceSource> = None;
    for source in sources {
        match best {
            Some(current) if source.price >= current.price => {}
            _ => best = Some(source),
        }
    }
    best.map(|s| BestPrice {
        source_id: s.id,
        source_name: s.source_name.clone(),
        price: s.price,
        currency: s.currency.clone(),
    })
}

/// Case-insensitive substring filter on product name. Empty or whitespace-only
/// queries match everything.
pub fn filter_products(
    products: Vec<ProductWithSources>,
    query: &str,
) -> Vec<ProductWithSources> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return products;
    }
    products
        .into_iter()
        .filter(|p| p.product.name.to_lowercase().contains(&needle))
        .collect()
}

pub fn pct_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        return 0.0;
    }
    (new - old) / old * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePair {
    pub previous: f64,
    pub current: f64,
}

/// Transient per-source previous/current price state, overwritten on every
/// tick or external update. Never persisted.
#[derive(Debug, Default)]
pub struct PriceBook {
    pairs: HashMap<i64, PricePair>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new current price for a source and return the resulting pair.
    /// The first observation uses the new price as its own baseline.
    pub fn record(&mut self, source_id: i64, price: f64) -> PricePair {
        let pair = match self.pairs.get(&source_id) {
            Some(existing) => PricePair {
                previous: existing.current,
                current: price,
            },
            None => PricePair {
                previous: price,
                current: price,
            },
        };
        self.pairs.insert(source_id, pair);
        pair
    }

    pub fn get(&self, source_id: i64) -> Option<PricePair> {
        self.pairs.get(&source_id).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Per-product last observed minimum, used to decide whether a best-price
/// drop notification should fire.
#[derive(Debug, Default)]
pub struct MinTracker {
    minima: HashMap<i64, f64>,
}

impl MinTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a freshly computed product minimum. Returns the prior minimum
    /// iff the new one is strictly lower; equal or higher minima only update
    /// the stored value.
    pub fn observe(&mut self, product_id: i64, min_price: f64) -> Option<f64> {
        let prior = self.minima.insert(product_id, min_price);
        match prior {
            Some(old) if min_price < old => Some(old),
            _ => None,
        }
    }

    pub fn current(&self, product_id: i64) -> Option<f64> {
        self.minima.get(&product_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::catalog::Product;

    fn source(id: i64, name: &str, price: f64) -> PriceSource {
        PriceSource {
            id,
            product_id: 1,
            source_name: name.to_string(),
            source_url: None,
            price,
            currency: "INR".to_string(),
            in_stock: true,
            updated_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    fn product(name: &str) -> ProductWithSources {
        ProductWithSources {
            product: Product {
                id: 1,
                name: name.to_string(),
                category: None,
                image_url: None,
            },
            sources: Vec::new(),
            best_price: None,
        }
    }

    #[test]
    fn best_price_picks_minimum() {
        let sources = vec![
            source(1, "Amazon", 99999.0),
            source(2, "Flipkart", 98999.0),
        ];
        let best = best_price(&sources).unwrap();
        assert_eq!(best.price, 98999.0);
        assert_eq!(best.source_name, "Flipkart");
        assert_eq!(best.source_id, 2);
    }

    #[test]
    fn best_price_empty_sources_is_none() {
        assert!(best_price(&[]).is_none());
    }

    #[test]
    fn best_price_tie_goes_to_first_source() {
        let sources = vec![source(1, "Amazon", 500.0), source(2, "Flipkart", 500.0)];
        let best = best_price(&sources).unwrap();
        assert_eq!(best.source_id, 1);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let products = vec![
            product("iPhone 15 Pro"),
            product("Galaxy S24"),
            product("Pixel 8 Pro"),
        ];
        let filtered = filter_products(products, "pro");
        let names: Vec<&str> = filtered.iter().map(|p| p.product.name.as_str()).collect();
        assert_eq!(names, vec!["iPhone 15 Pro", "Pixel 8 Pro"]);
    }

    #[test]
    fn empty_query_matches_everything() {
        let products = vec![product("iPhone 15 Pro"), product("Galaxy S24")];
        assert_eq!(filter_products(products, "   ").len(), 2);
    }

    #[test]
    fn filter_with_no_match_is_empty() {
        let products = vec![product("iPhone 15 Pro")];
        assert!(filter_products(products, "thinkpad").is_empty());
    }

    #[test]
    fn pct_change_signs() {
        assert!((pct_change(100.0, 98.0) - (-2.0)).abs() < 1e-9);
        assert!((pct_change(100.0, 102.5) - 2.5).abs() < 1e-9);
        assert_eq!(pct_change(0.0, 50.0), 0.0);
    }

    #[test]
    fn drop_from_98999_to_95000_crosses_alert_threshold() {
        let change = pct_change(98999.0, 95000.0);
        assert!(change < -SOURCE_DROP_ALERT_PCT);
        assert!((95000.0f64 - 98999.0).abs() - 3999.0 < 1e-9);
    }

    #[test]
    fn book_first_observation_has_no_delta() {
        let mut book = PriceBook::new();
        let pair = book.record(7, 98999.0);
        assert_eq!(pair.previous, 98999.0);
        assert_eq!(pair.current, 98999.0);
    }

    #[test]
    fn book_record_shifts_current_to_previous() {
        let mut book = PriceBook::new();
        book.record(7, 98999.0);
        let pair = book.record(7, 95000.0);
        assert_eq!(pair.previous, 98999.0);
        assert_eq!(pair.current, 95000.0);

        // overwritten on every update
        let pair = book.record(7, 96000.0);
        assert_eq!(pair.previous, 95000.0);
        assert_eq!(pair.current, 96000.0);
    }

    #[test]
    fn min_tracker_fires_only_on_strict_decrease() {
        let mut tracker = MinTracker::new();
        assert_eq!(tracker.observe(1, 98999.0), None); // first observation
        assert_eq!(tracker.observe(1, 98999.0), None); // equal, no alert
        assert_eq!(tracker.observe(1, 99500.0), None); // increase, no alert
        assert_eq!(tracker.observe(1, 95000.0), Some(99500.0)); // strict drop
        assert_eq!(tracker.current(1), Some(95000.0));
    }

    #[test]
    fn min_tracker_products_are_independent() {
        let mut tracker = MinTracker::new();
        tracker.observe(1, 100.0);
        tracker.observe(2, 200.0);
        assert_eq!(tracker.observe(1, 90.0), Some(100.0));
        assert_eq!(tracker.observe(2, 250.0), None);
    }
}
