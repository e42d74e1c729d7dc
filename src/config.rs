use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_MODEL: &str = "ollama/qwq";
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_BASE: &str = "http://127.0.0.1:11434/v1";
pub const MAX_ATTEMPTS_CEILING: u32 = 20;

/// Main configuration structure loaded from uplan.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub generation: GenerationConfig,
    pub paths: PathsConfig,
    pub provider: ProviderConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// How documents are generated
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub max_attempts: u32,
    pub stream: bool,
    pub review: bool,
}

/// Where forms are read from and documents are written to
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub category: String,
}

/// Completion endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub openai_base_url: String,
    pub ollama_base_url: String,
    pub timeout_ms: u64,
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub openai_api_key: Option<String>,
    pub log_level: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_attempts: 5,
            stream: false,
            review: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./input"),
            output_dir: PathBuf::from("./output"),
            category: "dev".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE.to_string(),
            ollama_base_url: DEFAULT_OLLAMA_BASE.to_string(),
            timeout_ms: 600_000,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            log_level: "uplan=info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            paths: PathsConfig::default(),
            provider: ProviderConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "uplan=info".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses UPLAN_CONFIG environment variable or defaults to "uplan.toml"
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(env_path) = std::env::var("UPLAN_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
        }

        let config_path =
            std::env::var("UPLAN_CONFIG").unwrap_or_else(|_| "uplan.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.normalize();

        Ok(config)
    }

    /// Parse a configuration document without touching the environment
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.normalize();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("UPLAN_MODEL") {
            tracing::debug!("UPLAN_MODEL env override applied");
            self.generation.model = model;
        }
        if let Some(attempts) = std::env::var("UPLAN_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.generation.max_attempts = attempts;
        }
        if let Ok(category) = std::env::var("UPLAN_CATEGORY") {
            self.paths.category = category;
        }
        if let Ok(dir) = std::env::var("UPLAN_INPUT_DIR") {
            self.paths.input_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("UPLAN_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = std::env::var("UPLAN_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.provider.timeout_ms = timeout;
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            self.provider.openai_base_url = base;
        }
        if let Ok(base) = std::env::var("OLLAMA_API_BASE") {
            self.provider.ollama_base_url = base;
        }
    }

    fn normalize(&mut self) {
        if self.generation.max_attempts == 0 {
            self.generation.max_attempts = 1;
        } else if self.generation.max_attempts > MAX_ATTEMPTS_CEILING {
            tracing::warn!(
                "max_attempts {} exceeds max {}, clamping",
                self.generation.max_attempts,
                MAX_ATTEMPTS_CEILING
            );
            self.generation.max_attempts = MAX_ATTEMPTS_CEILING;
        }

        for base in [
            &mut self.provider.openai_base_url,
            &mut self.provider.ollama_base_url,
        ] {
            let trimmed = base.trim_end_matches('/').to_string();
            if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
                tracing::warn!(
                    "Provider URL '{}' doesn't start with http:// or https://",
                    trimmed
                );
            }
            *base = trimmed;
        }
    }

    /// Input folder for the configured form category
    pub fn input_folder(&self) -> PathBuf {
        self.paths.input_dir.join(&self.paths.category)
    }

    /// Output folder for the configured form category
    pub fn output_folder(&self) -> PathBuf {
        self.paths.output_dir.join(&self.paths.category)
    }
}
