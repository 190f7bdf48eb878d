use std::path::Path;

use chrono::NaiveDate;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use grocer_crew::pipeline::{ESTIMATE_EXPIRATION, READ_RECEIPT, TRACK_GROCERIES};
use grocer_crew::{AppConfig, FixedHumanInput, GroceryPipeline, PipelineOptions};
use grocer_error::ErrorKind;
use grocer_llm::{ChatMessage, Role, ScriptedProvider, ToolCall};

const RECEIPT: &str = "\
# FreshMart
Date: 2024-11-16

| Item | Qty |
|------|-----|
| Whole Milk | 1 gallon |
| Eggs | 12 |
| Spinach | 1 bag |
";

const EXTRACTION: &str = r#"{"items": [
    {"item_name": "Whole Milk", "count": 1, "unit": "gallon"},
    {"item_name": "Eggs", "count": 12, "unit": "pcs"},
    {"item_name": "Spinach", "count": 1, "unit": "bag"}
], "date_of_purchase": "2024-11-16"}"#;

const ESTIMATED: &str = r#"{"items": [
    {"item_name": "Whole Milk", "count": 1, "unit": "gallon", "expiration_date": "2024-11-23"},
    {"item_name": "Eggs", "count": 12, "unit": "pcs", "expiration_date": "2024-12-14"},
    {"item_name": "Spinach", "count": 1, "unit": "bag", "expiration_date": "2024-11-21"}
]}"#;

const TRACKED: &str = r#"```json
{"items": [
    {"item_name": "Whole Milk", "count": 0, "unit": "gallon", "expiration_date": "2024-11-23"},
    {"item_name": "Eggs", "count": "10", "unit": "pcs", "expiration_date": "2024-12-14"},
    {"item_name": "Spinach", "count": 1, "unit": "bag", "expiration_date": "2024-11-21"}
]}
```"#;

const RECOMMENDED: &str = r#"{"recipes": [{
    "recipe_name": "Spinach Frittata",
    "ingredients": [
        {"item_name": "Eggs", "quantity": 6, "unit": "pcs"},
        {"item_name": "Spinach", "quantity": "1", "unit": "bag"}
    ],
    "steps": ["Whisk the eggs", "Wilt the spinach", "Bake until set"],
    "source": "https://www.americastestkitchen.com/recipes/spinach-frittata"
}], "restock_recommendations": [
    {"item_name": "Whole Milk", "quantity_needed": 1, "unit": "gallon"}
]}"#;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, 16).unwrap()
}

fn options(dir: &Path, config: &AppConfig) -> PipelineOptions {
    let mut options = PipelineOptions::from_config(config, today()).unwrap();
    options.receipt = dir.join("extracted").join("grocery_receipt.md");
    options.tracker_output = dir.join("output").join("grocery_tracker.json");
    options.recipe_output = dir.join("output").join("recipe_recommendation.json");
    options.crew.agent.retry_backoff = std::time::Duration::ZERO;
    options
}

fn write_receipt(options: &PipelineOptions) {
    std::fs::create_dir_all(options.receipt.parent().unwrap()).unwrap();
    std::fs::write(&options.receipt, RECEIPT).unwrap();
}

fn user_prompt(messages: &[ChatMessage]) -> &str {
    messages.iter().find(|m| m.role == Role::User).unwrap().text()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn stages_run_in_order_and_write_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), &AppConfig::default());
    write_receipt(&options);

    let provider = ScriptedProvider::new();
    provider
        .push_text(EXTRACTION)
        .push_text(ESTIMATED)
        .push_text(TRACKED)
        .push_text(RECOMMENDED);

    let pipeline = GroceryPipeline::new(options.clone()).unwrap();
    let report = pipeline
        .run(&provider, &FixedHumanInput::new("I drank all the milk and ate 2 eggs"))
        .await
        .unwrap();

    // A -> B -> C -> D, each fed its predecessor's output
    let requests = provider.requests();
    assert_eq!(requests.len(), 4);
    assert!(user_prompt(&requests[0].messages).contains("<td>Whole Milk</td>"));
    assert!(user_prompt(&requests[0].messages).contains("Today's date is 2024-11-16"));

    let estimate = user_prompt(&requests[1].messages);
    assert!(estimate.contains(&format!("## {}", READ_RECEIPT)));
    assert!(estimate.contains("\"date_of_purchase\": \"2024-11-16\""));

    let track = user_prompt(&requests[2].messages);
    assert!(track.contains(&format!("## {}", ESTIMATE_EXPIRATION)));
    assert!(!track.contains(&format!("## {}", READ_RECEIPT)));
    assert!(track.contains("Answer: I drank all the milk and ate 2 eggs"));

    let recommend = user_prompt(&requests[3].messages);
    assert!(recommend.contains(&format!("## {}", TRACK_GROCERIES)));
    assert!(recommend.contains("\"count\": 10"));

    // Typed results
    assert_eq!(report.extraction.items.len(), 3);
    assert_eq!(report.purchase_date, today());
    assert_eq!(report.tracked.find("Whole Milk").unwrap().count, 0);
    assert_eq!(report.tracked.find("Eggs").unwrap().count, 10);
    assert!(report.identity_mismatches.is_empty());
    assert!(report.early_expirations.is_empty());
    assert_eq!(report.consumption.as_deref(), Some("I drank all the milk and ate 2 eggs"));
    assert_eq!(report.usage.total_calls, 4);

    // Output files use the wire field names
    let tracker = read_json(&options.tracker_output);
    let items = tracker["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    for item in items {
        for field in ["item_name", "count", "unit", "expiration_date"] {
            assert!(item.get(field).is_some(), "tracker item missing {}", field);
        }
    }
    assert_eq!(items[1]["count"], 10);

    let recipes = read_json(&options.recipe_output);
    let recipe = &recipes["recipes"][0];
    assert_eq!(recipe["recipe_name"], "Spinach Frittata");
    assert_eq!(recipe["ingredients"][0]["quantity"], "6");
    assert_eq!(recipe["steps"].as_array().unwrap().len(), 3);
    assert_eq!(recipes["restock_recommendations"][0]["quantity_needed"], 1);
}

#[tokio::test]
async fn missing_receipt_fails_before_any_model_call() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), &AppConfig::default());

    let provider = ScriptedProvider::new();
    let pipeline = GroceryPipeline::new(options.clone()).unwrap();
    let err = pipeline
        .run(&provider, &FixedHumanInput::new(""))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FileNotFound);
    assert!(provider.requests().is_empty());
    assert!(!options.tracker_output.exists());
}

#[tokio::test]
async fn renamed_items_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), &AppConfig::default());
    write_receipt(&options);

    let provider = ScriptedProvider::new();
    provider
        .push_text(EXTRACTION)
        .push_text(ESTIMATED)
        .push_text(
            r#"{"items": [
                {"item_name": "Milk", "count": 0, "unit": "gallon", "expiration_date": "2024-11-23"},
                {"item_name": "Eggs", "count": 12, "unit": "pcs", "expiration_date": "2024-12-14"},
                {"item_name": "Spinach", "count": 1, "unit": "bag", "expiration_date": "2024-11-21"}
            ]}"#,
        )
        .push_text(r#"{"recipes": [], "restock_recommendations": []}"#);

    let report = GroceryPipeline::new(options)
        .unwrap()
        .run(&provider, &FixedHumanInput::new("milk is gone"))
        .await
        .unwrap();

    assert_eq!(report.identity_mismatches, vec!["Milk".to_string()]);
    assert!(report.recommendations.is_empty());
}

#[tokio::test]
async fn estimator_searches_the_shelf_life_site() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><p>Whole milk keeps about 7 days in the refrigerator after purchase.</p></body></html>",
        ))
        .expect(1)
        .mount(&site)
        .await;

    let mut config = AppConfig::default();
    config.sources.shelf_life_site = format!("{}/", site.uri());

    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), &config);
    write_receipt(&options);

    let provider = ScriptedProvider::new();
    provider
        .push_text(EXTRACTION)
        .push_tool_calls(vec![ToolCall::new(
            "call_milk",
            "search_127_0_0_1",
            r#"{"search_query": "whole milk refrigerator"}"#,
        )])
        .push_text(ESTIMATED)
        .push_text(TRACKED)
        .push_text(RECOMMENDED);

    GroceryPipeline::new(options)
        .unwrap()
        .run(&provider, &FixedHumanInput::new(""))
        .await
        .unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 5);
    let tool_result = requests[2]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(tool_result.text().contains("7 days"));
    assert!(tool_result.text().contains(&format!("Source: {}/", site.uri())));
}

#[tokio::test]
async fn parse_runs_only_the_receipt_stage() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path(), &AppConfig::default());
    write_receipt(&options);

    let provider = ScriptedProvider::new();
    provider.push_text(EXTRACTION);

    let extraction = GroceryPipeline::new(options.clone())
        .unwrap()
        .parse_receipt(&provider)
        .await
        .unwrap();

    assert_eq!(extraction.items[1].name, "Eggs");
    assert_eq!(extraction.date_of_purchase, Some(today()));
    assert_eq!(provider.requests().len(), 1);
    assert!(!options.tracker_output.exists());
}
