//! Application configuration for grocer.
//!
//! Config lives in `grocer.toml` (working directory, or `--config <path>`).
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file, only the names of the
//! environment variables that hold them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use grocer_error::{Error, Result};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "grocer.toml";

const DEFAULT_RECEIPT: &str = "../data/grocery_management_agents_system/extracted/grocery_receipt.md";
const DEFAULT_TRACKER_OUTPUT: &str = "../data/grocery_management_agents_system/output/grocery_tracker.json";
const DEFAULT_RECIPE_OUTPUT: &str = "../data/grocery_management_agents_system/output/recipe_recommendation.json";

// ---------------------------------------------------------------------------
// Config structs (matching grocer.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub crew: CrewConfig,
}

/// `[llm]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    /// Override for OpenAI-compatible servers.
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    /// Cap on completion tokens per model call.
    pub max_tokens: Option<usize>,
    pub timeout_secs: u64,
    /// Retries for temporary failures (rate limits, 5xx, network).
    pub max_retries: u32,
    /// Base delay between retries; grows linearly with the attempt.
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".into(),
            base_url: None,
            model: "gpt-4o".into(),
            temperature: None,
            max_tokens: None,
            timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 1_000,
        }
    }
}

/// `[ocr]` section. The key is loaded but no stage consumes it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub api_key_env: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key_env: "LLAMA_OCR_API_KEY".into(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub receipt: PathBuf,
    pub tracker_output: PathBuf,
    pub recipe_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            receipt: DEFAULT_RECEIPT.into(),
            tracker_output: DEFAULT_TRACKER_OUTPUT.into(),
            recipe_output: DEFAULT_RECIPE_OUTPUT.into(),
        }
    }
}

/// `[sources]` section - websites the search tools are scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub shelf_life_site: String,
    pub recipe_site: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            shelf_life_site: "https://www.stilltasty.com/".into(),
            recipe_site: "https://www.americastestkitchen.com/recipes".into(),
        }
    }
}

/// `[crew]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    /// Model turns an agent may take before it must answer.
    pub max_iterations: usize,
    /// Re-prompts allowed when an answer does not match the task schema.
    pub max_output_repairs: usize,
    /// Passages returned per website search.
    pub search_results: usize,
    /// Linked pages tried per website, beyond its root, when building its search index.
    pub search_max_pages: usize,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_output_repairs: 1,
            search_results: 5,
            search_max_pages: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse config from TOML text.
pub fn parse_config(text: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(text).map_err(|e| {
        Error::config_invalid(format!("invalid {}: {}", CONFIG_FILE_NAME, e)).set_source(e)
    })?;
    config.validate()?;
    Ok(config)
}

/// Load the config.
///
/// An explicit path must exist. Without one, `grocer.toml` in the working
/// directory is used when present, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(CONFIG_FILE_NAME), false),
    };

    if !required && !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }

    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::io_at(&path, e).with_operation("config::load"))?;
    let config = parse_config(&text).map_err(|e| e.with_context("path", path.display().to_string()))?;

    info!(path = %path.display(), "loaded config");
    Ok(config)
}

impl AppConfig {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        for (key, site) in [
            ("sources.shelf_life_site", &self.sources.shelf_life_site),
            ("sources.recipe_site", &self.sources.recipe_site),
        ] {
            Url::parse(site).map_err(|e| {
                Error::config_invalid(format!("{} is not a valid URL: {}", key, e))
                    .with_context("value", site.clone())
            })?;
        }

        if self.crew.max_iterations == 0 {
            return Err(Error::config_invalid("crew.max_iterations must be at least 1"));
        }
        if self.crew.search_results == 0 || self.crew.search_max_pages == 0 {
            return Err(Error::config_invalid(
                "crew.search_results and crew.search_max_pages must be at least 1",
            ));
        }
        if let Some(temp) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(Error::config_invalid(format!(
                    "llm.temperature must be within 0.0..=2.0, got {}",
                    temp
                )));
            }
        }
        if self.llm.max_tokens == Some(0) {
            return Err(Error::config_invalid("llm.max_tokens must be at least 1 when set"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API keys resolved once at startup and handed to whoever needs them.
#[derive(Clone, Default)]
pub struct Credentials {
    llm_api_key: Option<String>,
    ocr_api_key: Option<String>,
}

impl Credentials {
    /// Read the keys named in `config` from the process environment.
    pub fn from_env(config: &AppConfig) -> Self {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    /// Resolve keys through an arbitrary lookup (tests, secret stores).
    pub fn from_lookup(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            llm_api_key: non_empty(&config.llm.api_key_env),
            ocr_api_key: non_empty(&config.ocr.api_key_env),
        }
    }

    pub fn new(llm_api_key: Option<String>, ocr_api_key: Option<String>) -> Self {
        Self { llm_api_key, ocr_api_key }
    }

    pub fn llm_api_key(&self) -> Option<&str> {
        self.llm_api_key.as_deref()
    }

    pub fn ocr_api_key(&self) -> Option<&str> {
        self.ocr_api_key.as_deref()
    }

    /// The LLM key, or a MissingCredential error naming the variable.
    pub fn require_llm_key(&self, config: &AppConfig) -> Result<&str> {
        self.llm_api_key()
            .ok_or_else(|| Error::missing_credential(config.llm.api_key_env.clone()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("llm_api_key", &redact(&self.llm_api_key))
            .field("ocr_api_key", &redact(&self.ocr_api_key))
            .finish()
    }
}
