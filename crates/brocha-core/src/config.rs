use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BrochaError, Result};

/// Top-level configuration for the Brocha assistant.
///
/// Loaded from `~/.brocha/config.toml` by default. Each section corresponds
/// to one component; every field has a default so partial files are valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrochaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl BrochaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BrochaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BrochaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port for the webhook server.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.brocha/data".to_string(),
            log_level: "info".to_string(),
            port: 8000,
        }
    }
}

impl GeneralConfig {
    /// The data directory with a leading `~` expanded to the home directory.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    /// Path of the SQLite database inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_path().join("brocha.db")
    }
}

/// Which intent classifier strategy the orchestrator uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierStrategy {
    /// Single call returning a JSON intent.
    #[default]
    Json,
    /// Small-talk gate followed by a knowledge/product split.
    TwoStage,
}

/// Dialogue and conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum messages kept per user (oldest dropped first).
    pub history_limit: usize,
    /// Seconds between eviction passes, and the idle time after which a
    /// conversation is evicted.
    pub cleanup_interval_secs: u64,
    /// Number of recent messages handed to the classifier as context.
    pub context_window: usize,
    /// Inbound messages longer than this are truncated.
    pub max_message_chars: usize,
    pub classifier: ClassifierStrategy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 5,
            cleanup_interval_secs: 3600,
            context_window: 10,
            max_message_chars: 2000,
            classifier: ClassifierStrategy::Json,
        }
    }
}

/// Knowledge-base retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Vector collection holding the painting guides.
    pub collection: String,
    /// Number of candidate passages fetched per question.
    pub top_k: usize,
    /// Minimum judged relevance for a passage to reach the answer prompt.
    pub relevance_threshold: f64,
    /// Target chunk length in characters when ingesting documents.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            collection: "guias".to_string(),
            top_k: 3,
            relevance_threshold: 0.7,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Product catalog query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Brands matched by the price-scoped query.
    pub featured_brands: Vec<String>,
    /// Row cap for every catalog query.
    pub row_limit: usize,
    /// Vector collection that mirrors the product table.
    pub collection: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            featured_brands: vec!["Alba".to_string(), "Sherwin".to_string()],
            row_limit: 5,
            collection: "productos".to_string(),
        }
    }
}

/// Text-generation and embedding provider settings.
///
/// The API key is never stored in the file; it is read from the environment
/// variable named by `api_key_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub endpoint: String,
    pub chat_model: String,
    pub embed_model: String,
    pub temperature: f32,
    pub seed: Option<u64>,
    /// Request timeout in milliseconds (0 disables it).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 disables it).
    pub connect_timeout_ms: u64,
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "cohere".to_string(),
            endpoint: "https://api.cohere.com".to_string(),
            chat_model: "command-r-plus-08-2024".to_string(),
            embed_model: "embed-multilingual-v3.0".to_string(),
            temperature: 0.3,
            seed: Some(42),
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
            api_key_env: "COHERE_API_KEY".to_string(),
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(BrochaError::Config(format!(
                "environment variable {} is not set",
                self.api_key_env
            ))),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = BrochaConfig::default();
        assert_eq!(config.general.data_dir, "~/.brocha/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.chat.history_limit, 5);
        assert_eq!(config.chat.cleanup_interval_secs, 3600);
        assert_eq!(config.chat.context_window, 10);
        assert_eq!(config.chat.classifier, ClassifierStrategy::Json);
        assert_eq!(config.retrieval.collection, "guias");
        assert_eq!(config.retrieval.top_k, 3);
        assert!((config.retrieval.relevance_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.catalog.featured_brands, vec!["Alba", "Sherwin"]);
        assert_eq!(config.catalog.row_limit, 5);
        assert_eq!(config.llm.chat_model, "command-r-plus-08-2024");
        assert_eq!(config.llm.embed_model, "embed-multilingual-v3.0");
        assert_eq!(config.llm.seed, Some(42));
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/brocha"
log_level = "debug"
port = 9090

[chat]
history_limit = 8
cleanup_interval_secs = 120
classifier = "two_stage"

[retrieval]
top_k = 5
relevance_threshold = 0.5

[catalog]
featured_brands = ["Colorin"]

[llm]
temperature = 0.0
timeout_ms = 5000
"#;
        let file = create_temp_config(content);
        let config = BrochaConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/brocha");
        assert_eq!(config.general.port, 9090);
        assert_eq!(config.chat.history_limit, 8);
        assert_eq!(config.chat.cleanup_interval_secs, 120);
        assert_eq!(config.chat.classifier, ClassifierStrategy::TwoStage);
        assert_eq!(config.chat.context_window, 10);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.relevance_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.retrieval.collection, "guias");
        assert_eq!(config.catalog.featured_brands, vec!["Colorin"]);
        assert_eq!(config.llm.timeout_ms, 5000);
        assert_eq!(config.llm.provider, "cohere");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = BrochaConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.brocha/data");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(BrochaConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_classifier_rejected() {
        let file = create_temp_config("[chat]\nclassifier = \"magic\"\n");
        assert!(BrochaConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = BrochaConfig::load(file.path()).unwrap();
        assert_eq!(config.chat.history_limit, 5);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 200);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = BrochaConfig::default();
        config.chat.classifier = ClassifierStrategy::TwoStage;
        config.save(&path).unwrap();

        let reloaded = BrochaConfig::load(&path).unwrap();
        assert_eq!(reloaded.chat.classifier, ClassifierStrategy::TwoStage);
        assert_eq!(reloaded.general.port, config.general.port);
        assert_eq!(reloaded.llm.seed, Some(42));
    }

    #[test]
    fn test_api_key_missing() {
        let config = LlmConfig {
            api_key_env: "BROCHA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        let err = config.api_key().unwrap_err();
        assert!(err.to_string().contains("BROCHA_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_expand_home_absolute_untouched() {
        assert_eq!(expand_home("/var/lib/brocha"), PathBuf::from("/var/lib/brocha"));
    }

    #[test]
    fn test_expand_home_tilde() {
        let expanded = expand_home("~/.brocha/data");
        assert!(expanded.ends_with(".brocha/data"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_database_path() {
        let general = GeneralConfig {
            data_dir: "/tmp/brocha".to_string(),
            ..GeneralConfig::default()
        };
        assert_eq!(general.database_path(), PathBuf::from("/tmp/brocha/brocha.db"));
    }
}
