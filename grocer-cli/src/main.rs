//! # Grocer CLI
//!
//! Turn a grocery receipt into an inventory and recipe suggestions.
//!
//! Usage:
//!   grocer run [--receipt <file.md>] [--consumed <text>]
//!   grocer parse [--receipt <file.md>]
//!   grocer schema
//!
//! Examples:
//!   grocer run --today 2024-11-16 --consumed "1 gallon of milk, 2 eggs"
//!   grocer run --dry-run --consumed ""
//!   grocer -v parse --receipt receipts/2024-11-16.md

mod dry_run;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use grocer_crew::{
    load_config, AppConfig, Credentials, FixedHumanInput, GroceryPipeline, GroceryReport,
    HumanInput, OutputSchema, PipelineOptions, StdinHumanInput, DATE_FORMAT,
};
use grocer_error::{Error, Result};
use grocer_llm::{LlmProvider, OpenAIProvider, ProviderConfig};

#[derive(Parser)]
#[command(name = "grocer")]
#[command(author, version, about = "Grocer - from receipt to inventory to recipes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ./grocer.toml when present)
    #[arg(long, global = true, env = "GROCER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Options shared by every command that reads a receipt
#[derive(Args, Debug)]
struct ReceiptArgs {
    /// Receipt markdown file
    #[arg(long)]
    receipt: Option<PathBuf>,

    /// Reference date, YYYY-MM-DD (default: the local date)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Model to use instead of the configured one
    #[arg(long)]
    model: Option<String>,

    /// Use canned answers instead of calling the model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run all four stages and write the output files
    Run {
        #[command(flatten)]
        receipt: ReceiptArgs,

        /// What was consumed since the purchase (asked on stdin when absent)
        #[arg(long)]
        consumed: Option<String>,

        /// Where to write the remaining inventory
        #[arg(long)]
        tracker_out: Option<PathBuf>,

        /// Where to write the recipe recommendations
        #[arg(long)]
        recipes_out: Option<PathBuf>,
    },
    /// Read the receipt only and print the extracted items
    Parse {
        #[command(flatten)]
        receipt: ReceiptArgs,
    },
    /// Show the JSON shape each stage answers with
    Schema,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn init_tracing(verbose: u8, format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "grocer={0},grocer_crew={0},grocer_llm={0}",
            level
        ))
    });

    match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Config file values with command-line overrides applied
fn resolve_config(cli_config: Option<&PathBuf>, args: &ReceiptArgs) -> Result<AppConfig> {
    let mut config = load_config(cli_config.map(PathBuf::as_path))?;
    if let Some(receipt) = &args.receipt {
        config.paths.receipt = receipt.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    Ok(config)
}

fn openai_provider(config: &AppConfig, credentials: &Credentials) -> Result<OpenAIProvider> {
    let key = credentials.require_llm_key(config)?;
    let mut provider_config = ProviderConfig::openai(key)
        .with_model(config.llm.model.clone())
        .with_timeout(config.llm.timeout_secs);
    if let Some(base_url) = &config.llm.base_url {
        provider_config = provider_config.with_base_url(base_url.clone());
    }
    OpenAIProvider::new(provider_config).map_err(Error::from)
}

async fn run_pipeline<P: LlmProvider>(
    provider: &P,
    options: PipelineOptions,
    human: &dyn HumanInput,
) -> Result<GroceryReport> {
    info!(provider = provider.name(), model = provider.default_model(), "starting crew");
    GroceryPipeline::new(options)?.run(provider, human).await
}

async fn parse_receipt<P: LlmProvider>(provider: &P, options: PipelineOptions) -> Result<()> {
    let extraction = GroceryPipeline::new(options)?.parse_receipt(provider).await?;
    let json = serde_json::to_string_pretty(&extraction)
        .map_err(|e| Error::serialization_failed(e.to_string()).set_source(e))?;
    println!("{}", json);
    Ok(())
}

fn print_report(report: &GroceryReport, options: &PipelineOptions) {
    println!("Crew execution completed. Results saved to output files.");
    println!(
        "  {}: {} items, {} still in stock",
        options.tracker_output.display(),
        report.tracked.len(),
        report.tracked.in_stock().count()
    );
    println!(
        "  {}: {} recipes, {} restock recommendations",
        options.recipe_output.display(),
        report.recommendations.recipes.len(),
        report.recommendations.restock_recommendations.len()
    );
    if !report.identity_mismatches.is_empty() {
        println!(
            "  warning: tracked items not in the estimated list: {}",
            report.identity_mismatches.join(", ")
        );
    }
    if !report.early_expirations.is_empty() {
        println!(
            "  warning: expiration estimated before purchase for: {}",
            report.early_expirations.join(", ")
        );
    }
    println!(
        "  tokens: {} over {} model calls",
        report.usage.total_tokens(),
        report.usage.total_calls
    );
}

fn show_schema() {
    for schema in OutputSchema::all() {
        println!("# {}", schema.name());
        println!("{}\n", schema.render());
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Schema => {
            show_schema();
            Ok(())
        }
        Commands::Parse { receipt } => {
            let config = resolve_config(cli.config.as_ref(), &receipt)?;
            let today = receipt.today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let options = PipelineOptions::from_config(&config, today)?;

            if receipt.dry_run {
                parse_receipt(&dry_run::scripted_provider(today), options).await
            } else {
                let credentials = Credentials::from_env(&config);
                parse_receipt(&openai_provider(&config, &credentials)?, options).await
            }
        }
        Commands::Run {
            receipt,
            consumed,
            tracker_out,
            recipes_out,
        } => {
            let mut config = resolve_config(cli.config.as_ref(), &receipt)?;
            if let Some(path) = tracker_out {
                config.paths.tracker_output = path;
            }
            if let Some(path) = recipes_out {
                config.paths.recipe_output = path;
            }
            let today = receipt.today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let options = PipelineOptions::from_config(&config, today)?;

            let human: Box<dyn HumanInput> = match consumed {
                Some(answer) => Box::new(FixedHumanInput::new(answer)),
                None => Box::new(StdinHumanInput),
            };

            let report = if receipt.dry_run {
                run_pipeline(&dry_run::scripted_provider(today), options.clone(), human.as_ref()).await?
            } else {
                let credentials = Credentials::from_env(&config);
                let provider = openai_provider(&config, &credentials)?;
                run_pipeline(&provider, options.clone(), human.as_ref()).await?
            };

            print_report(&report, &options);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
