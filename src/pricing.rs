use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Price per unit by base fruit name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTable {
    pub prices: HashMap<String, u32>,
    /// Price for fruits not in the table
    pub default_price: u32,
    pub unit: String,
}

impl Default for PriceTable {
    fn default() -> Self {
        let prices = [
            ("Apple", 120),
            ("Banana", 40),
            ("Grapes", 80),
            ("Mango", 150),
            ("Orange", 60),
            ("Strawberry", 200),
            ("Tomato", 30),
            ("Watermelon", 50),
            ("Pineapple", 100),
            ("Kiwi", 180),
            ("Papaya", 70),
            ("Guava", 50),
            ("Lemon", 80),
            ("Pomegranate", 120),
            ("Cherry", 250),
            ("Pear", 90),
            ("Peach", 100),
            ("Plum", 110),
            ("Avocado", 200),
            ("Coconut", 60),
            ("Raspberry", 250),
            ("Blueberry", 300),
        ]
        .into_iter()
        .map(|(name, price)| (name.to_string(), price))
        .collect();

        Self {
            prices,
            default_price: 80,
            unit: "kg".to_string(),
        }
    }
}

impl PriceTable {
    /// Price for a class label; variety suffixes are ignored ("Apple Braeburn" → Apple)
    pub fn price_for(&self, label: &str) -> u32 {
        let base = base_name(label);
        self.prices.get(base).copied().unwrap_or(self.default_price)
    }
}

/// First whitespace separated word of a label
pub fn base_name(label: &str) -> &str {
    label.split_whitespace().next().unwrap_or(label)
}
