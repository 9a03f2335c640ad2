use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MnemoConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub host: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
}

/// Knobs for the decay, cap-eviction and merge passes.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    /// Importance lost per day of disuse.
    pub decay_per_day: f64,
    pub total_cap_user: usize,
    pub total_cap_assistant: usize,
    /// Per-tag entry caps, enforced independently for each owner type.
    pub tag_caps: BTreeMap<String, usize>,
    /// Cosine similarity at or above which two entries are merged.
    pub similarity_merge_threshold: f32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mnemo_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            host: "http://localhost:11434".into(),
            model: "nomic-embed-text".into(),
            timeout_secs: 30,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { default_limit: 8 }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        let tag_caps = [
            ("preference", 120),
            ("project", 150),
            ("relationship", 100),
            ("self", 80),
            ("episodic", 80),
            ("history", 80),
            ("other", 50),
        ]
        .into_iter()
        .map(|(tag, cap)| (tag.to_string(), cap))
        .collect();

        Self {
            decay_per_day: 0.01,
            total_cap_user: 500,
            total_cap_assistant: 500,
            tag_caps,
            similarity_merge_threshold: 0.95,
        }
    }
}

/// Returns `~/.mnemo/`
pub fn default_mnemo_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemo")
}

/// Returns the default config file path: `~/.mnemo/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemo_dir().join("config.toml")
}

impl MnemoConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemoConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMO_DB, MNEMO_LOG_LEVEL,
    /// MNEMO_EMBED_HOST, MNEMO_EMBED_MODEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMO_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMO_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("MNEMO_EMBED_HOST") {
            self.embedding.host = val;
        }
        if let Ok(val) = std::env::var("MNEMO_EMBED_MODEL") {
            self.embedding.model = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MnemoConfig::default();
        assert_eq!(config.logging.log_level, "info");
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.retrieval.default_limit, 8);
        assert_eq!(config.retention.total_cap_user, 500);
        assert_eq!(config.retention.total_cap_assistant, 500);
        assert_eq!(config.retention.tag_caps.get("preference"), Some(&120));
        assert_eq!(config.retention.tag_caps.get("other"), Some(&50));
        assert_eq!(config.retention.tag_caps.len(), 7);
        assert!(config.storage.db_path.ends_with("memory.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[logging]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[retention]
decay_per_day = 0.05
total_cap_user = 10

[retention.tag_caps]
preference = 3
"#;
        let config: MnemoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.retention.decay_per_day, 0.05);
        assert_eq!(config.retention.total_cap_user, 10);
        // an explicit tag table replaces the defaults wholesale
        assert_eq!(config.retention.tag_caps.len(), 1);
        assert_eq!(config.retention.tag_caps.get("preference"), Some(&3));
        // defaults still apply for unset fields
        assert_eq!(config.retention.total_cap_assistant, 500);
        assert_eq!(config.embedding.model, "nomic-embed-text");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MnemoConfig::default();
        std::env::set_var("MNEMO_DB", "/tmp/override.db");
        std::env::set_var("MNEMO_LOG_LEVEL", "trace");
        std::env::set_var("MNEMO_EMBED_HOST", "http://embedder:11434");
        std::env::set_var("MNEMO_EMBED_MODEL", "mxbai-embed-large");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.logging.log_level, "trace");
        assert_eq!(config.embedding.host, "http://embedder:11434");
        assert_eq!(config.embedding.model, "mxbai-embed-large");

        std::env::remove_var("MNEMO_DB");
        std::env::remove_var("MNEMO_LOG_LEVEL");
        std::env::remove_var("MNEMO_EMBED_HOST");
        std::env::remove_var("MNEMO_EMBED_MODEL");
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/lib/mnemo.db"), PathBuf::from("/var/lib/mnemo.db"));
    }
}
