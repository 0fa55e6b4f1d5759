//! Configuration system for xtract.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace `xtract.toml` -> explicit config file -> environment -> CLI overrides.
//! The user-level file lives at `~/.config/xtract/config.toml` (platform
//! equivalent via `directories`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embeddings::EncoderConfig;
use crate::error::ConfigError;
use crate::index::Metric;

/// Name of the workspace-level configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "xtract.toml";

/// Top-level configuration for the xtract service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Where the corpus lives and which columns keyword search scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Path to the CSV dataset.
    pub path: PathBuf,
    /// Columns scanned by keyword search (only those present are used).
    pub text_fields: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/papers.csv"),
            text_fields: vec!["title".into(), "abstract".into()],
        }
    }
}

/// Which engine answers `/search` when the request does not say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Case-insensitive substring scan over the corpus text fields.
    #[default]
    Keyword,
    /// Encode the query and return nearest neighbours from the vector index.
    Semantic,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(SearchMode::Keyword),
            "semantic" => Ok(SearchMode::Semantic),
            other => Err(format!(
                "Unknown search mode '{}', expected 'keyword' or 'semantic'",
                other
            )),
        }
    }
}

/// Search result limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default engine for `/search`.
    pub mode: SearchMode,
    /// Result count when the request gives no `top_k`/`limit`.
    pub default_limit: usize,
    /// Upper bound applied to any requested count.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Keyword,
            default_limit: crate::keyword::DEFAULT_LIMIT,
            max_limit: 1000,
        }
    }
}

/// Recommendation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    pub default_top_k: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            default_top_k: crate::similarity::DEFAULT_TOP_K,
        }
    }
}

/// Vector index settings for the similarity deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Whether the similarity engine is loaded at all.
    pub enabled: bool,
    /// Precomputed `.npy` embedding matrix, one row per corpus record.
    /// When unset the matrix is built at startup with the configured encoder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings_path: Option<PathBuf>,
    /// Score convention reported verbatim as `similarity`.
    pub metric: Metric,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            embeddings_path: None,
            metric: Metric::InnerProduct,
        }
    }
}

impl AppConfig {
    /// Return human-readable problems with this configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.corpus.text_fields.is_empty() {
            problems.push("corpus.text_fields must name at least one column".to_string());
        }
        if self.search.default_limit == 0 {
            problems.push("search.default_limit must be greater than 0".to_string());
        }
        if self.search.max_limit < self.search.default_limit {
            problems.push(format!(
                "search.max_limit ({}) is smaller than search.default_limit ({})",
                self.search.max_limit, self.search.default_limit
            ));
        }
        if self.search.mode == SearchMode::Semantic && !self.index.enabled {
            problems.push("search.mode = \"semantic\" requires index.enabled = true".to_string());
        }
        if self.encoder.concurrency == 0 {
            problems.push("encoder.concurrency must be greater than 0".to_string());
        }
        problems
    }

    /// `self` if [`validate`](Self::validate) finds nothing, otherwise every
    /// problem joined into one [`ConfigError::Invalid`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid {
                message: problems.join("; "),
            })
        }
    }
}

/// Path of the user-level configuration file, if a home directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "xtract", "xtract")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from all layers.
///
/// An explicit `config_file` must exist; the user-level and workspace files
/// are optional.
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (XTRACT_SERVER__PORT, XTRACT_INDEX__ENABLED, etc.)
    figment = figment.merge(Env::prefixed("XTRACT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// Load configuration and reject it if [`AppConfig::validate`] finds problems.
pub fn load_validated(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, ConfigError> {
    load_config(workspace, config_file, overrides)?.validated()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.corpus.text_fields, vec!["title", "abstract"]);
        assert_eq!(config.search.mode, SearchMode::Keyword);
        assert_eq!(config.search.default_limit, 50);
        assert_eq!(config.recommend.default_top_k, 6);
        assert!(!config.index.enabled);
        assert_eq!(config.index.metric, Metric::InnerProduct);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_search_mode_from_str() {
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert_eq!(" Semantic ".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_validate_semantic_requires_index() {
        let mut config = AppConfig::default();
        config.search.mode = SearchMode::Semantic;
        let problems = config.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("index.enabled"));
    }

    #[test]
    fn test_validated_accepts_fixed_config() {
        let mut config = AppConfig::default();
        config.search.mode = SearchMode::Semantic;
        assert!(matches!(
            config.clone().validated(),
            Err(ConfigError::Invalid { .. })
        ));
        config.index.enabled = true;
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let mut config = AppConfig::default();
        config.search.max_limit = 10;
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("max_limit")));
    }

    #[test]
    fn test_load_workspace_config_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(WORKSPACE_CONFIG_FILE),
            r#"
[server]
host = "0.0.0.0"
port = 9100

[search]
mode = "semantic"
default_limit = 20
max_limit = 200

[index]
enabled = true
metric = "l2"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.search.mode, SearchMode::Semantic);
        assert_eq!(config.search.default_limit, 20);
        assert!(config.index.enabled);
        assert_eq!(config.index.metric, Metric::L2);
        // Untouched sections keep their defaults
        assert_eq!(config.recommend.default_top_k, 6);
    }

    #[test]
    fn test_explicit_config_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = load_config(None, Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        fs::write(&file, "[server]\nport = 7000\n").unwrap();

        let mut overrides = AppConfig::default();
        overrides.server.port = 7100;
        let config = load_config(None, Some(&file), Some(&overrides)).unwrap();
        assert_eq!(config.server.port, 7100);
    }

    #[test]
    fn test_load_validated_rejects_problems() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.toml");
        fs::write(&file, "[search]\nmode = \"semantic\"\n").unwrap();
        let err = load_validated(None, Some(&file), None).unwrap_err();
        match err {
            ConfigError::Invalid { message } => assert!(message.contains("index.enabled")),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.index.embeddings_path = Some(PathBuf::from("data/embeddings.npy"));
        let json = serde_json::to_string(&config).unwrap();
        let restored: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.index.embeddings_path.as_deref(),
            Some(Path::new("data/embeddings.npy"))
        );
    }
}
