//! Expected-output shapes and JSON extraction from model answers

use serde_json::{json, Value};

use grocer_error::{Error, Result};

/// The JSON shape a task must answer with.
///
/// `example` is shown to the model verbatim, each leaf describing its
/// field. `required` lists the top-level keys a valid answer must carry;
/// when `any_of` is set, at least one of those keys must be present too.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    name: &'static str,
    example: Value,
    required: &'static [&'static str],
    any_of: &'static [&'static str],
}

impl OutputSchema {
    pub fn new(name: &'static str, example: Value, required: &'static [&'static str]) -> Self {
        Self {
            name,
            example,
            required,
            any_of: &[],
        }
    }

    pub fn with_any_of(mut self, keys: &'static [&'static str]) -> Self {
        self.any_of = keys;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Pretty example for prompts and `grocer schema`.
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(&self.example).unwrap_or_else(|_| self.example.to_string())
    }

    pub fn required_keys(&self) -> &'static [&'static str] {
        self.required
    }

    /// Pull the JSON object out of `answer` and check its top-level keys.
    pub fn parse_answer(&self, answer: &str) -> Result<Value> {
        let value = extract_json(answer)?;
        let object = value.as_object().ok_or_else(|| {
            Error::parse_failed(format!("expected a JSON object for {}", self.name))
                .with_operation("schema::parse_answer")
        })?;

        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(Error::parse_failed(format!(
                "{} answer is missing field(s): {}",
                self.name,
                missing.join(", ")
            ))
            .with_operation("schema::parse_answer"));
        }

        if !self.any_of.is_empty() && !self.any_of.iter().any(|key| object.contains_key(*key)) {
            return Err(Error::parse_failed(format!(
                "{} answer needs at least one of: {}",
                self.name,
                self.any_of.join(", ")
            ))
            .with_operation("schema::parse_answer"));
        }

        Ok(value)
    }

    /// Items read off the receipt plus the purchase date
    pub fn receipt_extraction() -> Self {
        Self::new(
            "receipt_extraction",
            json!({
                "items": [
                    {
                        "item_name": "string - Human-readable name of the item",
                        "count": "integer - Number of units purchased",
                        "unit": "string - Unit of measurement (e.g., kg, lbs, pcs)"
                    }
                ],
                "date_of_purchase": "string - Date in YYYY-MM-DD format"
            }),
            &["items", "date_of_purchase"],
        )
    }

    /// Items with an estimated expiration date
    pub fn estimated_inventory() -> Self {
        Self::new(
            "estimated_inventory",
            json!({
                "items": [
                    {
                        "item_name": "string - Human-readable name of the item",
                        "count": "integer - Number of units purchased",
                        "unit": "string - Unit of measurement (e.g., kg, lbs, pcs)",
                        "expiration_date": "string - Estimated expiration date in YYYY-MM-DD format"
                    }
                ]
            }),
            &["items"],
        )
    }

    /// Remaining groceries after consumption
    pub fn tracked_inventory() -> Self {
        Self::new(
            "tracked_inventory",
            json!({
                "items": [
                    {
                        "item_name": "string - Human-readable name of the item",
                        "count": "integer - Updated number of units remaining",
                        "unit": "string - Unit of measurement (e.g., kg, lbs, pcs)",
                        "expiration_date": "string - Estimated expiration date in YYYY-MM-DD format"
                    }
                ]
            }),
            &["items"],
        )
    }

    /// Recipes for what is left, or restocking advice when nothing fits
    pub fn recipe_recommendations() -> Self {
        Self::new(
            "recipe_recommendations",
            json!({
                "recipes": [
                    {
                        "recipe_name": "string - Name of the recipe",
                        "ingredients": [
                            {
                                "item_name": "string - Ingredient name",
                                "quantity": "string - Quantity required",
                                "unit": "string - Measurement unit (e.g., kg, pcs, tbsp)"
                            }
                        ],
                        "steps": ["string - Step-by-step instructions for the recipe"],
                        "source": "string - Website URL for the recipe"
                    }
                ],
                "restock_recommendations": [
                    {
                        "item_name": "string - Name of the item to restock",
                        "quantity_needed": "integer - Suggested quantity to purchase",
                        "unit": "string - Measurement unit (e.g., kg, pcs)"
                    }
                ]
            }),
            &[],
        )
        // Either list may be left out, not both.
        .with_any_of(&["recipes", "restock_recommendations"])
    }

    /// All stage schemas in pipeline order
    pub fn all() -> Vec<Self> {
        vec![
            Self::receipt_extraction(),
            Self::estimated_inventory(),
            Self::tracked_inventory(),
            Self::recipe_recommendations(),
        ]
    }
}

/// Find the JSON value in a model answer.
///
/// Handles ```json fences, bare fences, and prose around a single object.
pub fn extract_json(content: &str) -> Result<Value> {
    let candidate = if content.contains("```json") {
        content
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(content)
    } else if content.contains("```") {
        content.split("```").nth(1).unwrap_or(content)
    } else {
        content
    }
    .trim();

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok(value);
    }

    // Prose around the object: take the outermost braces.
    let sliced = match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if start < end => &candidate[start..=end],
        _ => candidate,
    };

    serde_json::from_str::<Value>(sliced).map_err(|e| {
        Error::parse_failed(format!("answer is not valid JSON: {}", e))
            .with_operation("schema::extract_json")
            .with_context("content", truncate(content, 200))
            .set_source(e)
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
