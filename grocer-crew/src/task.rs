//! Tasks - one unit of work assigned to an agent

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use grocer_error::{Error, Result};

use crate::agent::Agent;
use crate::schema::OutputSchema;

/// Turns a schema-checked answer into its canonical JSON form.
pub type Canonicalize = fn(Value) -> Result<Value>;

/// A task in a crew
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub description: String,
    pub agent: Arc<Agent>,
    pub expected_output: OutputSchema,
    /// Names of earlier tasks whose output is shown to this one
    pub context: Vec<String>,
    /// Question put to the user before the agent starts
    pub human_input: Option<String>,
    pub output_file: Option<PathBuf>,
    canonicalize: Option<Canonicalize>,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        agent: Arc<Agent>,
        description: impl Into<String>,
        expected_output: OutputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            agent,
            expected_output,
            context: Vec::new(),
            human_input: None,
            output_file: None,
            canonicalize: None,
        }
    }

    pub fn with_context<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = tasks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_human_input(mut self, question: impl Into<String>) -> Self {
        self.human_input = Some(question.into());
        self
    }

    pub fn with_output_file(mut self, path: impl AsRef<Path>) -> Self {
        self.output_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Require the answer to decode as `T`; the stored output is `T`
    /// serialized back, so field names always match `T`.
    pub fn with_output_model<T: DeserializeOwned + Serialize>(mut self) -> Self {
        self.canonicalize = Some(canonical::<T>);
        self
    }

    /// Check an answer against the schema and output model.
    pub fn accept(&self, answer: &str) -> Result<Value> {
        let value = self.expected_output.parse_answer(answer)?;
        match self.canonicalize {
            Some(canonicalize) => canonicalize(value),
            None => Ok(value),
        }
    }
}

fn canonical<T: DeserializeOwned + Serialize>(value: Value) -> Result<Value> {
    let typed: T = serde_json::from_value(value).map_err(|e| {
        Error::parse_failed(format!("answer does not match the expected fields: {}", e))
            .with_operation("task::accept")
            .set_source(e)
    })?;
    serde_json::to_value(typed).map_err(|e| {
        Error::serialization_failed(e.to_string())
            .with_operation("task::accept")
            .set_source(e)
    })
}

/// What a finished task produced
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    /// The model's final answer as given
    pub raw: String,
    pub json: Value,
    pub human_input: Option<String>,
    pub output_file: Option<PathBuf>,
}

impl TaskOutput {
    /// Decode the output into a domain type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.json.clone()).map_err(|e| {
            Error::parse_failed(format!("output of task '{}' is malformed: {}", self.task, e))
                .with_operation("task::decode")
                .set_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Inventory, RecipeRecommendations};
    use grocer_error::ErrorKind;
    use serde_json::json;

    fn task() -> Task {
        let agent = Arc::new(Agent::new("Grocery Tracker", "Track groceries"));
        Task::new("track", agent, "Track it", OutputSchema::tracked_inventory())
    }

    #[test]
    fn builder_sets_fields() {
        let t = task()
            .with_context(["read", "estimate"])
            .with_human_input("What did you eat?")
            .with_output_file("out/grocery_tracker.json");

        assert_eq!(t.context, vec!["read", "estimate"]);
        assert_eq!(t.human_input.as_deref(), Some("What did you eat?"));
        assert_eq!(t.output_file, Some(PathBuf::from("out/grocery_tracker.json")));
    }

    #[test]
    fn accept_without_model_keeps_answer() {
        let value = task().accept(r#"{"items": [], "note": "x"}"#).unwrap();
        assert_eq!(value, json!({"items": [], "note": "x"}));
    }

    #[test]
    fn output_model_canonicalizes() {
        let t = task().with_output_model::<Inventory>();
        let value = t
            .accept(r#"{"items": [{"item_name": "milk", "count": "2", "unit": "gallon", "expiration_date": "2024-11-23"}], "note": "x"}"#)
            .unwrap();

        assert_eq!(
            value,
            json!({"items": [{"item_name": "milk", "count": 2, "unit": "gallon", "expiration_date": "2024-11-23"}]})
        );
    }

    #[test]
    fn output_model_rejects_wrong_fields() {
        let t = task().with_output_model::<Inventory>();
        let err = t.accept(r#"{"items": [{"name": "milk", "count": 1}]}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
    }

    #[test]
    fn recommendation_needs_one_of_its_lists() {
        let agent = Arc::new(Agent::new("Recipe Recommender", "Recommend recipes"));
        let t = Task::new("recommend", agent, "Recommend", OutputSchema::recipe_recommendations())
            .with_output_model::<RecipeRecommendations>();

        let err = t
            .accept(r#"{"message": "I could not reach the recipe site."}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);

        let value = t.accept(r#"{"restock_recommendations": []}"#).unwrap();
        assert_eq!(value, json!({"recipes": [], "restock_recommendations": []}));
    }

    #[test]
    fn decode_task_output() {
        let output = TaskOutput {
            task: "track".into(),
            agent: "Grocery Tracker".into(),
            raw: String::new(),
            json: json!({"items": []}),
            human_input: None,
            output_file: None,
        };
        let inventory: Inventory = output.decode().unwrap();
        assert!(inventory.is_empty());
    }
}
