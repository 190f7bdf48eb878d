//! Canned stage answers for `--dry-run`

use chrono::{Days, NaiveDate};
use serde_json::json;

use grocer_crew::DATE_FORMAT;
use grocer_llm::ScriptedProvider;

/// A provider that answers the four stages without a network or key.
pub fn scripted_provider(today: NaiveDate) -> ScriptedProvider {
    let day = |offset: u64| {
        today
            .checked_add_days(Days::new(offset))
            .unwrap_or(today)
            .format(DATE_FORMAT)
            .to_string()
    };

    let provider = ScriptedProvider::new();
    provider
        .push_text(
            json!({
                "items": [
                    {"item_name": "Whole Milk", "count": 1, "unit": "gallon"},
                    {"item_name": "Eggs", "count": 12, "unit": "pcs"},
                    {"item_name": "Baby Spinach", "count": 1, "unit": "bag"}
                ],
                "date_of_purchase": day(0)
            })
            .to_string(),
        )
        .push_text(
            json!({
                "items": [
                    {"item_name": "Whole Milk", "count": 1, "unit": "gallon", "expiration_date": day(7)},
                    {"item_name": "Eggs", "count": 12, "unit": "pcs", "expiration_date": day(28)},
                    {"item_name": "Baby Spinach", "count": 1, "unit": "bag", "expiration_date": day(5)}
                ]
            })
            .to_string(),
        )
        .push_text(
            json!({
                "items": [
                    {"item_name": "Whole Milk", "count": 0, "unit": "gallon", "expiration_date": day(7)},
                    {"item_name": "Eggs", "count": 10, "unit": "pcs", "expiration_date": day(28)},
                    {"item_name": "Baby Spinach", "count": 1, "unit": "bag", "expiration_date": day(5)}
                ]
            })
            .to_string(),
        )
        .push_text(
            json!({
                "recipes": [{
                    "recipe_name": "Spinach and Egg Scramble",
                    "ingredients": [
                        {"item_name": "Eggs", "quantity": "4", "unit": "pcs"},
                        {"item_name": "Baby Spinach", "quantity": "2", "unit": "cups"}
                    ],
                    "steps": [
                        "Whisk the eggs with a pinch of salt.",
                        "Wilt the spinach in a buttered skillet.",
                        "Add the eggs and stir gently until just set."
                    ],
                    "source": "https://www.americastestkitchen.com/recipes"
                }],
                "restock_recommendations": [
                    {"item_name": "Whole Milk", "quantity_needed": 1, "unit": "gallon"}
                ]
            })
            .to_string(),
        );
    provider
}
