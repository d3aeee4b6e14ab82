use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub scoring: ScoringWeights,

    #[serde(default)]
    pub hackernews: HackerNewsConfig,

    #[serde(default)]
    pub stackexchange: StackExchangeConfig,

    #[serde(default)]
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint root, e.g. `https://api.deepseek.com/v1`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    /// Character budget for the post body embedded in a prompt.
    pub max_body_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "deepseek-chat".to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_secs: 60,
            max_body_chars: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub upvotes_multiplier: f64,
    pub comments_multiplier: f64,
    pub age_decay_per_day: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            upvotes_multiplier: 0.5,
            comments_multiplier: 0.3,
            age_decay_per_day: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HackerNewsConfig {
    pub base_url: String,
    pub story_limit: usize,
    pub min_score: i64,
    pub max_concurrent_requests: usize,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hacker-news.firebaseio.com/v0".to_string(),
            story_limit: 20,
            min_score: 3,
            max_concurrent_requests: 5,
            request_delay_ms: 100,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub slug: String,
    pub name: String,
    pub limit: u32,
}

impl SiteConfig {
    fn new(slug: &str, name: &str, limit: u32) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            limit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StackExchangeConfig {
    pub base_url: String,
    pub version: String,
    pub api_key: Option<String>,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
    /// Below this remaining daily quota a warning is logged after each site.
    pub quota_warning_threshold: i64,
    pub sites: Vec<SiteConfig>,
}

const TIER1_LIMIT: u32 = 30;
const TIER2_LIMIT: u32 = 15;

impl Default for StackExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stackexchange.com".to_string(),
            version: "2.3".to_string(),
            api_key: None,
            request_delay_ms: 500,
            timeout_secs: 30,
            quota_warning_threshold: 50,
            sites: vec![
                SiteConfig::new("money", "Personal Finance & Money", TIER1_LIMIT),
                SiteConfig::new("workplace", "The Workplace", TIER1_LIMIT),
                SiteConfig::new("parenting", "Parenting", TIER1_LIMIT),
                SiteConfig::new("travel", "Travel", TIER1_LIMIT),
                SiteConfig::new("diy", "Home Improvement", TIER1_LIMIT),
                SiteConfig::new("cooking", "Seasoned Advice", TIER1_LIMIT),
                SiteConfig::new("pets", "Pets", TIER2_LIMIT),
                SiteConfig::new("gardening", "Gardening & Landscaping", TIER2_LIMIT),
                SiteConfig::new("law", "Law", TIER2_LIMIT),
                SiteConfig::new("academia", "Academia", TIER2_LIMIT),
                SiteConfig::new("interpersonal", "Interpersonal Skills", TIER2_LIMIT),
                SiteConfig::new("lifehacks", "Lifehacks", TIER2_LIMIT),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("probhub");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("probhub.db").to_string_lossy().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            llm: LlmConfig::default(),
            scoring: ScoringWeights::default(),
            hackernews: HackerNewsConfig::default(),
            stackexchange: StackExchangeConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}

impl Config {
    /// Loads the config file (writing defaults on first use) and applies env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("probhub")
            .join("config.toml")
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = non_empty("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = non_empty("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = non_empty("STACKEXCHANGE_API_KEY") {
            self.stackexchange.api_key = Some(v);
        }
        if let Some(v) = non_empty("PROBHUB_DB_PATH") {
            self.db_path = v;
        }
    }

    /// Fails unless the model service is fully configured. Checked before any ingestion run.
    pub fn require_llm(&self) -> Result<(&str, &str)> {
        let api_key = self
            .llm
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Config("llm.api_key (or LLM_API_KEY) is required".into()))?;
        let base_url = self
            .llm
            .base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::Config("llm.base_url (or LLM_BASE_URL) is required".into()))?;
        if self.llm.max_retries == 0 {
            return Err(AppError::Config("llm.max_retries must be at least 1".into()));
        }
        Ok((api_key, base_url))
    }
}
