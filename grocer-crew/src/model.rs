//! Grocery domain types and their JSON wire shapes
//!
//! Models answer in loosely typed JSON: counts arrive as `"2"` or `1.0`,
//! dates as `"unknown"`. Decoding is lenient where a sensible value exists
//! and strict where none does.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Calendar date format used in every file.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One line of groceries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroceryItem {
    #[serde(rename = "item_name")]
    pub name: String,
    #[serde(deserialize_with = "lenient::count")]
    pub count: u32,
    #[serde(default)]
    pub unit: String,
    #[serde(
        default,
        deserialize_with = "lenient::date",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_date: Option<NaiveDate>,
}

impl GroceryItem {
    pub fn new(name: impl Into<String>, count: u32, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count,
            unit: unit.into(),
            expiration_date: None,
        }
    }

    pub fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// Expiration date strictly before `on`; undated items never expire.
    pub fn is_expired(&self, on: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|d| d < on)
    }
}

/// Output of the receipt reading stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptExtraction {
    pub items: Vec<GroceryItem>,
    #[serde(
        default,
        deserialize_with = "lenient::date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_of_purchase: Option<NaiveDate>,
}

impl ReceiptExtraction {
    /// The printed purchase date, or `fallback` when the receipt had none.
    pub fn purchase_date_or(&self, fallback: NaiveDate) -> NaiveDate {
        self.date_of_purchase.unwrap_or(fallback)
    }
}

/// A list of items with expiration dates (estimated or tracked)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<GroceryItem>,
}

impl Inventory {
    pub fn new(items: Vec<GroceryItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Exact name lookup. Names are identities and are not normalized.
    pub fn find(&self, name: &str) -> Option<&GroceryItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Items with a count above zero
    pub fn in_stock(&self) -> impl Iterator<Item = &GroceryItem> {
        self.items.iter().filter(|item| item.count > 0)
    }

    /// Items whose names do not appear in `reference`
    pub fn unknown_names<'a>(&'a self, reference: &Inventory) -> Vec<&'a str> {
        self.items
            .iter()
            .filter(|item| reference.find(&item.name).is_none())
            .map(|item| item.name.as_str())
            .collect()
    }
}

/// One ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item_name: String,
    #[serde(deserialize_with = "lenient::quantity")]
    pub quantity: String,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(rename = "recipe_name")]
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestockRecommendation {
    pub item_name: String,
    #[serde(deserialize_with = "lenient::count")]
    pub quantity_needed: u32,
    #[serde(default)]
    pub unit: String,
}

/// Output of the recommendation stage. Either list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecommendations {
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub restock_recommendations: Vec<RestockRecommendation>,
}

impl RecipeRecommendations {
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty() && self.restock_recommendations.is_empty()
    }
}

mod lenient {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;
    use tracing::warn;

    /// Non-negative integer from a number or a numeric string.
    /// Negatives clamp to zero. Fractions round, except that a positive
    /// amount never rounds down to zero.
    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let number = match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|n| n.is_finite())
        .ok_or_else(|| D::Error::custom(format!("expected a count, got {}", value)))?;

        if number < 0.0 {
            warn!(count = number, "negative count clamped to zero");
            return Ok(0);
        }
        let rounded = match number {
            n if n > 0.0 && n < 1.0 => 1.0,
            n => n.round(),
        };
        if rounded > u32::MAX as f64 {
            return Err(D::Error::custom(format!("count {} is out of range", number)));
        }
        Ok(rounded as u32)
    }

    /// Free-form quantity ("1/2", "2", 1.5) kept as text.
    pub fn quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Null => Ok(String::new()),
            other => Err(D::Error::custom(format!("expected a quantity, got {}", other))),
        }
    }

    /// `YYYY-MM-DD`, or None for null and placeholders like "unknown".
    pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(text) => match NaiveDate::parse_from_str(text.trim(), DATE_FORMAT) {
                Ok(date) => Ok(Some(date)),
                Err(_) => {
                    warn!(value = %text, "unrecognized date left empty");
                    Ok(None)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn item_uses_wire_names() {
        let item = GroceryItem::new("milk", 1, "gallon").with_expiration(date("2024-11-23"));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "item_name": "milk",
                "count": 1,
                "unit": "gallon",
                "expiration_date": "2024-11-23"
            })
        );
    }

    #[test]
    fn receipt_item_omits_missing_expiration() {
        let value = serde_json::to_value(GroceryItem::new("eggs", 12, "unit")).unwrap();
        assert!(value.get("expiration_date").is_none());
    }

    #[test]
    fn counts_are_lenient() {
        let items: Vec<GroceryItem> = serde_json::from_value(json!([
            {"item_name": "a", "count": "3", "unit": "unit"},
            {"item_name": "b", "count": 2.0, "unit": "lbs"},
            {"item_name": "c", "count": -1, "unit": "unit"},
        ]))
        .unwrap();

        let counts: Vec<u32> = items.iter().map(|i| i.count).collect();
        assert_eq!(counts, vec![3, 2, 0]);
    }

    #[test]
    fn weighed_fraction_stays_in_stock() {
        let item: GroceryItem =
            serde_json::from_value(json!({"item_name": "ground beef", "count": 0.45, "unit": "kg"}))
                .unwrap();
        assert_eq!(item.count, 1);

        let inventory = Inventory::new(vec![item]);
        assert_eq!(inventory.in_stock().count(), 1);

        let item: GroceryItem =
            serde_json::from_value(json!({"item_name": "flour", "count": "0.2", "unit": "kg"})).unwrap();
        assert_eq!(item.count, 1);
    }

    #[test]
    fn garbage_count_is_rejected() {
        let result: Result<GroceryItem, _> =
            serde_json::from_value(json!({"item_name": "a", "count": "lots"}));
        assert!(result.is_err());
    }

    #[test]
    fn placeholder_dates_become_none() {
        let extraction: ReceiptExtraction = serde_json::from_value(json!({
            "items": [{"item_name": "bread", "count": 1, "unit": "loaf", "expiration_date": "unknown"}],
            "date_of_purchase": null
        }))
        .unwrap();

        assert_eq!(extraction.items[0].expiration_date, None);
        assert_eq!(extraction.purchase_date_or(date("2024-11-16")), date("2024-11-16"));
    }

    #[test]
    fn inventory_lookup_is_exact() {
        let inventory = Inventory::new(vec![
            GroceryItem::new("Whole Milk", 1, "gallon"),
            GroceryItem::new("eggs", 0, "unit"),
        ]);

        assert!(inventory.find("Whole Milk").is_some());
        assert!(inventory.find("whole milk").is_none());
        assert_eq!(inventory.in_stock().count(), 1);

        let tracked = Inventory::new(vec![GroceryItem::new("milk", 1, "gallon")]);
        assert_eq!(tracked.unknown_names(&inventory), vec!["milk"]);
    }

    #[test]
    fn expired_is_strictly_before_today() {
        let item = GroceryItem::new("yogurt", 1, "cup").with_expiration(date("2024-11-16"));
        assert!(!item.is_expired(date("2024-11-16")));
        assert!(item.is_expired(date("2024-11-17")));
    }

    #[test]
    fn recommendations_decode_numeric_quantity() {
        let recs: RecipeRecommendations = serde_json::from_value(json!({
            "recipes": [{
                "recipe_name": "Omelette",
                "ingredients": [{"item_name": "eggs", "quantity": 3, "unit": "unit"}],
                "steps": ["Whisk", "Cook"],
                "source": "https://www.americastestkitchen.com/recipes/omelette"
            }]
        }))
        .unwrap();

        assert_eq!(recs.recipes[0].ingredients[0].quantity, "3");
        assert!(recs.restock_recommendations.is_empty());
        assert!(!recs.is_empty());
    }
}
