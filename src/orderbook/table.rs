//! Per-side price level table

use std::collections::HashMap;

use super::PriceLevel;

/// Mapping from exchange price string to resting quantity
///
/// A level with zero quantity does not exist; it is removed rather than
/// stored. The table has no intrinsic ordering.
#[derive(Debug, Clone, Default)]
pub struct SideTable {
    levels: HashMap<String, f64>,
}

impl SideTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a level, or delete it when `quantity` is exactly zero
    ///
    /// Idempotent: applying the same pair twice equals applying it once.
    pub fn apply_update(&mut self, price: &str, quantity: f64) {
        if quantity == 0.0 {
            self.levels.remove(price);
        } else {
            self.levels.insert(price.to_string(), quantity);
        }
    }

    pub fn get(&self, price: &str) -> Option<f64> {
        self.levels.get(price).copied()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Copy of every level, in no particular order
    pub fn levels(&self) -> Vec<PriceLevel> {
        self.levels
            .iter()
            .map(|(price, quantity)| PriceLevel {
                price: price.clone(),
                quantity: *quantity,
            })
            .collect()
    }
}
