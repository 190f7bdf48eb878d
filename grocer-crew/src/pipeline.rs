//! The four-stage grocery pipeline
//!
//! read receipt -> estimate expiration -> track consumption -> recommend
//!
//! Each stage is a crew task whose answer must decode into the stage's
//! model type; the tracking and recommendation outputs are written to disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use url::Url;

use grocer_error::{Error, Result};
use grocer_llm::{LlmProvider, UsageTracker};

use crate::agent::{Agent, AgentSettings};
use crate::config::AppConfig;
use crate::crew::{Crew, CrewOutput, CrewSettings};
use crate::human::{FixedHumanInput, HumanInput};
use crate::model::{Inventory, ReceiptExtraction, RecipeRecommendations, DATE_FORMAT};
use crate::receipt::load_receipt;
use crate::schema::OutputSchema;
use crate::task::Task;
use crate::tool::WebsiteSearchTool;

pub const READ_RECEIPT: &str = "read_receipt";
pub const ESTIMATE_EXPIRATION: &str = "estimate_expiration";
pub const TRACK_GROCERIES: &str = "track_groceries";
pub const RECOMMEND_RECIPES: &str = "recommend_recipes";

/// Asked before the tracking stage
pub const CONSUMPTION_QUESTION: &str =
    "Which groceries have you used since the purchase, and how much of each? (leave empty if nothing)";

/// Resolved settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub receipt: PathBuf,
    pub tracker_output: PathBuf,
    pub recipe_output: PathBuf,
    /// Reference date for the receipt stage
    pub today: NaiveDate,
    pub shelf_life_site: Url,
    pub recipe_site: Url,
    pub search_results: usize,
    pub search_max_pages: usize,
    pub crew: CrewSettings,
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig, today: NaiveDate) -> Result<Self> {
        let site = |key: &str, value: &str| {
            Url::parse(value).map_err(|e| {
                Error::config_invalid(format!("{} is not a valid URL: {}", key, e))
                    .with_context("value", value.to_string())
            })
        };

        Ok(Self {
            receipt: config.paths.receipt.clone(),
            tracker_output: config.paths.tracker_output.clone(),
            recipe_output: config.paths.recipe_output.clone(),
            today,
            shelf_life_site: site("sources.shelf_life_site", &config.sources.shelf_life_site)?,
            recipe_site: site("sources.recipe_site", &config.sources.recipe_site)?,
            search_results: config.crew.search_results,
            search_max_pages: config.crew.search_max_pages,
            crew: CrewSettings {
                agent: AgentSettings {
                    model: Some(config.llm.model.clone()),
                    temperature: config.llm.temperature,
                    max_tokens: config.llm.max_tokens,
                    max_iterations: config.crew.max_iterations,
                    max_retries: config.llm.max_retries,
                    retry_backoff: Duration::from_millis(config.llm.retry_backoff_ms),
                },
                max_output_repairs: config.crew.max_output_repairs,
            },
        })
    }
}

/// What a full run produced
#[derive(Debug, Clone)]
pub struct GroceryReport {
    pub extraction: ReceiptExtraction,
    pub purchase_date: NaiveDate,
    pub estimated: Inventory,
    pub tracked: Inventory,
    pub recommendations: RecipeRecommendations,
    pub consumption: Option<String>,
    /// Tracked names that were not in the estimated list
    pub identity_mismatches: Vec<String>,
    /// Items estimated to expire before they were bought
    pub early_expirations: Vec<String>,
    pub usage: UsageTracker,
}

/// The four grocery agents
#[derive(Debug, Clone)]
pub struct GroceryAgents {
    pub receipt_interpreter: Arc<Agent>,
    pub expiration_estimator: Arc<Agent>,
    pub grocery_tracker: Arc<Agent>,
    pub recipe_recommender: Arc<Agent>,
}

impl GroceryAgents {
    pub fn new(options: &PipelineOptions) -> Result<Self> {
        let shelf_life = WebsiteSearchTool::new(
            options.shelf_life_site.clone(),
            options.search_max_pages,
            options.search_results,
        )?;
        let recipes = WebsiteSearchTool::new(
            options.recipe_site.clone(),
            options.search_max_pages,
            options.search_results,
        )?;

        let receipt_interpreter = Agent::new(
            "Receipt Markdown Interpreter",
            "Extract items, their counts, and weights with units from a receipt in markdown format. \
             Provide structured data to support the grocery management system.",
        )
        .with_backstory(
            "As a key member of the grocery management crew, you extract details such as item names, \
             quantities, and weights from receipt markdown files. Your work is vital for tracking inventory levels.",
        )
        .with_personality("Diligent, detail-oriented, and efficient.");

        let expiration_estimator = Agent::new(
            "Expiration Date Estimation Specialist",
            "Estimate the expiration dates of items extracted by the Receipt Interpreter. \
             Utilize online sources to determine typical shelf life when refrigerated.",
        )
        .with_backstory(
            "You ensure groceries are consumed before expiration by searching for shelf-life estimates online.",
        )
        .with_personality("Meticulous, resourceful, and reliable.")
        .with_tool(Arc::new(shelf_life));

        let grocery_tracker = Agent::new(
            "Grocery Inventory Tracker",
            "Track remaining groceries based on user consumption input. \
             Update the inventory list and provide expiration dates.",
        )
        .with_backstory(
            "You ensure groceries are accurately tracked, minimizing waste and helping users stay organized.",
        )
        .with_personality("Helpful, detail-oriented, and responsive.");

        let recipe_recommender = Agent::new(
            "Grocery Recipe Recommendation Specialist",
            "Recommend recipes using available ingredients. \
             Suggest restocking recommendations if ingredients are insufficient.",
        )
        .with_backstory(
            "You help households make the most out of their remaining groceries by finding suitable recipes.",
        )
        .with_personality("Creative, resourceful, and efficient.")
        .with_tool(Arc::new(recipes));

        Ok(Self {
            receipt_interpreter: Arc::new(receipt_interpreter),
            expiration_estimator: Arc::new(expiration_estimator),
            grocery_tracker: Arc::new(grocery_tracker),
            recipe_recommender: Arc::new(recipe_recommender),
        })
    }
}

/// Receipt to recipes
#[derive(Debug, Clone)]
pub struct GroceryPipeline {
    options: PipelineOptions,
    agents: GroceryAgents,
}

impl GroceryPipeline {
    pub fn new(options: PipelineOptions) -> Result<Self> {
        let agents = GroceryAgents::new(&options)?;
        Ok(Self { options, agents })
    }

    pub fn agents(&self) -> &GroceryAgents {
        &self.agents
    }

    fn read_receipt_task(&self, receipt_markdown: &str) -> Task {
        Task::new(
            READ_RECEIPT,
            self.agents.receipt_interpreter.clone(),
            format!(
                "Analyze the receipt markdown file:\n\n{}\n\n\
                 Extract information on items purchased, their counts, weights, and units. \
                 Today's date is {}. Ensure all item names are clear and human-readable. \
                 If the receipt shows no purchase date, use today's date.",
                receipt_markdown,
                self.options.today.format(DATE_FORMAT)
            ),
            OutputSchema::receipt_extraction(),
        )
        .with_output_model::<ReceiptExtraction>()
    }

    /// All four stages, in order
    pub fn crew(&self, receipt_markdown: &str) -> Crew {
        let estimate = Task::new(
            ESTIMATE_EXPIRATION,
            self.agents.expiration_estimator.clone(),
            "Using the list of items extracted by the Receipt Interpreter, search online to find the \
             typical shelf life of each item. Add this information to the purchase date to estimate \
             the expiration date for each item. Keep item names, counts and units exactly as given.",
            OutputSchema::estimated_inventory(),
        )
        .with_context([READ_RECEIPT])
        .with_output_model::<Inventory>();

        let track = Task::new(
            TRACK_GROCERIES,
            self.agents.grocery_tracker.clone(),
            "Using the grocery list with expiration dates, update the inventory based on user input \
             about consumed items. Subtract consumed quantities and provide a summary of what's left, \
             including expiration dates. Keep every item, using a count of 0 for items that are used up, \
             and keep item names exactly as they appear in the list.",
            OutputSchema::tracked_inventory(),
        )
        .with_context([ESTIMATE_EXPIRATION])
        .with_human_input(CONSUMPTION_QUESTION)
        .with_output_file(&self.options.tracker_output)
        .with_output_model::<Inventory>();

        let recommend = Task::new(
            RECOMMEND_RECIPES,
            self.agents.recipe_recommender.clone(),
            "Using the updated grocery list, search online for recipes that utilize available \
             ingredients (items with a count above 0). If no suitable recipe can be found, \
             provide restocking recommendations.",
            OutputSchema::recipe_recommendations(),
        )
        .with_context([TRACK_GROCERIES])
        .with_output_file(&self.options.recipe_output)
        .with_output_model::<RecipeRecommendations>();

        Crew::new(self.options.crew.clone())
            .with_task(self.read_receipt_task(receipt_markdown))
            .with_task(estimate)
            .with_task(track)
            .with_task(recommend)
    }

    /// Receipt stage only. Writes nothing.
    #[instrument(skip_all, fields(receipt = %self.options.receipt.display()))]
    pub async fn parse_receipt<P: LlmProvider>(&self, provider: &P) -> Result<ReceiptExtraction> {
        let receipt = load_receipt(&self.options.receipt)?;
        let output = Crew::new(self.options.crew.clone())
            .with_task(self.read_receipt_task(&receipt))
            .kickoff(provider, &FixedHumanInput::new(""))
            .await?;
        output.require(READ_RECEIPT)?.decode()
    }

    /// Run all four stages and write both output files.
    #[instrument(skip_all, fields(receipt = %self.options.receipt.display(), today = %self.options.today))]
    pub async fn run<P: LlmProvider>(&self, provider: &P, human: &dyn HumanInput) -> Result<GroceryReport> {
        let receipt = load_receipt(&self.options.receipt)?;
        let output = self.crew(&receipt).kickoff(provider, human).await?;
        let report = self.report(output)?;

        info!(
            items = report.extraction.items.len(),
            remaining = report.tracked.in_stock().count(),
            recipes = report.recommendations.recipes.len(),
            restock = report.recommendations.restock_recommendations.len(),
            "pipeline finished"
        );
        Ok(report)
    }

    fn report(&self, output: CrewOutput) -> Result<GroceryReport> {
        let extraction: ReceiptExtraction = output.require(READ_RECEIPT)?.decode()?;
        let estimated: Inventory = output.require(ESTIMATE_EXPIRATION)?.decode()?;
        let tracking = output.require(TRACK_GROCERIES)?;
        let tracked: Inventory = tracking.decode()?;
        let recommendations: RecipeRecommendations = output.require(RECOMMEND_RECIPES)?.decode()?;

        if extraction.items.is_empty() {
            warn!("no items were read from the receipt");
        }
        if extraction.date_of_purchase.is_none() {
            warn!(today = %self.options.today, "receipt has no purchase date, assuming today");
        }
        let purchase_date = extraction.purchase_date_or(self.options.today);

        Ok(GroceryReport {
            early_expirations: expiring_before(&estimated, purchase_date),
            identity_mismatches: identity_mismatches(&estimated, &tracked),
            consumption: tracking.human_input.clone(),
            extraction,
            purchase_date,
            estimated,
            tracked,
            recommendations,
            usage: output.usage,
        })
    }
}

/// Names of items estimated to expire before `purchase_date`.
fn expiring_before(inventory: &Inventory, purchase_date: NaiveDate) -> Vec<String> {
    inventory
        .items
        .iter()
        .filter(|item| item.is_expired(purchase_date))
        .map(|item| {
            warn!(
                item = %item.name,
                expiration_date = ?item.expiration_date,
                %purchase_date,
                "estimated expiration precedes purchase"
            );
            item.name.clone()
        })
        .collect()
}

/// Tracked names with no exact match in the estimated list.
fn identity_mismatches(estimated: &Inventory, tracked: &Inventory) -> Vec<String> {
    tracked
        .unknown_names(estimated)
        .into_iter()
        .map(|name| {
            warn!(item = %name, "tracked item does not match any estimated item by name");
            name.to_string()
        })
        .collect()
}
