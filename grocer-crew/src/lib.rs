//! # Grocer Crew
//!
//! Agents and tasks that turn a grocery receipt into an inventory and
//! recipe suggestions:
//! 1. The receipt interpreter reads items off the receipt markdown
//! 2. The expiration estimator looks up shelf life on the web
//! 3. The tracker subtracts what the user says they consumed
//! 4. The recommender finds recipes, or suggests what to restock
//!
//! Each stage is a [`Task`] run by an [`Agent`] inside a [`Crew`]; the
//! grocery-specific wiring lives in [`GroceryPipeline`].

pub mod agent;
pub mod config;
pub mod crew;
pub mod human;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod receipt;
pub mod schema;
pub mod task;
pub mod tool;

pub use agent::{Agent, AgentRun, AgentSettings};
pub use config::{load_config, AppConfig, Credentials, CONFIG_FILE_NAME};
pub use crew::{Crew, CrewOutput, CrewSettings};
pub use human::{FixedHumanInput, HumanInput, StdinHumanInput};
pub use model::{
    GroceryItem, Ingredient, Inventory, ReceiptExtraction, Recipe, RecipeRecommendations,
    RestockRecommendation, DATE_FORMAT,
};
pub use pipeline::{GroceryPipeline, GroceryReport, PipelineOptions};
pub use schema::OutputSchema;
pub use task::{Task, TaskOutput};
pub use tool::{Tool, ToolSet, WebsiteSearchTool};
