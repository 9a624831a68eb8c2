//! Configuration management for RoleFlow.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`roleflow.yaml` in the workspace, or `ROLEFLOW_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Relative paths in the configuration are resolved against the workspace root.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file name, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "roleflow.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("openai" or "ollama")
    pub provider: String,

    /// Model identifier for the active provider
    pub model: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    pub paths: PathsConfig,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub attribution: AttributionConfig,
    pub access: AccessConfig,
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathsConfig {
    /// Root of the department-partitioned document tree
    pub data_root: PathBuf,

    /// Where per-department indexes are persisted
    pub index_dir: PathBuf,

    /// HR record file used to verify logins
    pub hr_records: PathBuf,

    /// Directory holding prompt overrides
    pub prompts_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            index_dir: PathBuf::from(".roleflow/indexes"),
            hr_records: PathBuf::from("data/hr/hr_data.csv"),
            prompts_dir: PathBuf::from(".roleflow/prompts"),
        }
    }
}

/// HTTP host settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub bind: String,
    pub cors_origins: Vec<String>,
    pub token_ttl_hours: i64,
    /// Name of the environment variable holding the token signing secret
    pub jwt_secret_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            cors_origins: vec!["http://localhost:8501".to_string()],
            token_ttl_hours: 24,
            jwt_secret_env: "JWT_SECRET_KEY".to_string(),
        }
    }
}

/// LLM configuration from roleflow.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmConfig {
    pub active_provider: Option<String>,
    pub providers: HashMap<String, ProviderConfig>,
    /// Upper bound on a single generation call
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig::OpenAI {
                api_key_env: "OPENROUTER_API_KEY".to_string(),
                model: "mistralai/mistral-small-3.2-24b-instruct:free".to_string(),
                endpoint: Some("https://openrouter.ai/api/v1".to_string()),
            },
        );
        providers.insert(
            "ollama".to_string(),
            ProviderConfig::Ollama {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                timeout: None,
            },
        );

        Self {
            active_provider: None,
            providers,
            timeout_secs: 60,
            temperature: 0.7,
        }
    }
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::OpenAI { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// "trigram" (offline, deterministic) or "ollama"
    pub provider: String,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: None,
            endpoint: None,
            dimensions: 384,
        }
    }
}

/// Retrieval and chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Passages requested from each department
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            chunk_size: 1500,
            chunk_overlap: 150,
        }
    }
}

/// Source attribution thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributionConfig {
    /// Words must be strictly longer than this to count
    pub min_word_len: usize,
    /// Share of a passage's words that must appear in the answer (strictly greater)
    pub overlap_threshold: f64,
    /// Fallback citations need a top-1 distance strictly below this
    pub distance_threshold: f32,
    pub max_fallback_sources: usize,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            min_word_len: 4,
            overlap_threshold: 0.2,
            distance_threshold: 0.7,
            max_fallback_sources: 2,
        }
    }
}

/// Department access policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessConfig {
    /// Employee ids granted `privileged_scopes` regardless of department
    pub privileged_ids: Vec<String>,
    pub privileged_scopes: Vec<String>,
    /// Lower-cased home department -> readable departments
    pub policy: BTreeMap<String, Vec<String>>,
    /// Scopes for departments missing from `policy`
    pub default_scopes: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        let scopes = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut policy = BTreeMap::new();
        policy.insert("finance".to_string(), scopes(&["finance", "general"]));
        policy.insert("marketing".to_string(), scopes(&["marketing", "general"]));
        policy.insert("hr".to_string(), scopes(&["hr", "general"]));
        policy.insert("technology".to_string(), scopes(&["engineering", "general"]));

        Self {
            privileged_ids: scopes(&["FINEMP1000", "FINEMP1001"]),
            privileged_scopes: scopes(&["engineering", "finance", "hr", "marketing", "general"]),
            policy,
            default_scopes: scopes(&["general"]),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    paths: Option<PathsConfig>,
    server: Option<ServerConfig>,
    llm: Option<LlmConfig>,
    embedding: Option<EmbeddingConfig>,
    retrieval: Option<RetrievalConfig>,
    attribution: Option<AttributionConfig>,
    access: Option<AccessConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let llm = LlmConfig::default();
        let provider = "openai".to_string();
        let model = llm
            .providers
            .get(&provider)
            .map(|p| p.model().to_string())
            .unwrap_or_default();

        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider,
            model,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            paths: PathsConfig::default(),
            server: ServerConfig::default(),
            llm,
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            attribution: AttributionConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `ROLEFLOW_WORKSPACE`: Override workspace path
    /// - `ROLEFLOW_CONFIG`: Path to config file
    /// - `ROLEFLOW_PROVIDER`: LLM provider
    /// - `ROLEFLOW_MODEL`: Model identifier
    /// - `ROLEFLOW_DATA_ROOT`: Document tree root
    /// - `ROLEFLOW_INDEX_DIR`: Index persistence directory
    /// - `ROLEFLOW_BIND`: HTTP bind address
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use roleflow_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Data root: {:?}", config.data_root());
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, letting CLI-provided workspace and config paths
    /// take precedence over the environment when locating the YAML file.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("ROLEFLOW_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        if let Ok(config_file) = std::env::var("ROLEFLOW_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }
        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(CONFIG_FILE_NAME),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        config.apply_env();

        Ok(config)
    }

    /// Environment variables override YAML config.
    fn apply_env(&mut self) {
        if let Ok(provider) = std::env::var("ROLEFLOW_PROVIDER") {
            self.select_provider(provider);
        }
        if let Ok(model) = std::env::var("ROLEFLOW_MODEL") {
            self.model = model;
        }
        if let Ok(data_root) = std::env::var("ROLEFLOW_DATA_ROOT") {
            self.paths.data_root = PathBuf::from(data_root);
        }
        if let Ok(index_dir) = std::env::var("ROLEFLOW_INDEX_DIR") {
            self.paths.index_dir = PathBuf::from(index_dir);
        }
        if let Ok(bind) = std::env::var("ROLEFLOW_BIND") {
            self.server.bind = bind;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.clone().merge(config_file))
    }

    fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            self.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.json_logs = json;
            }
        }

        if let Some(paths) = file.paths {
            self.paths = paths;
        }
        if let Some(server) = file.server {
            self.server = server;
        }
        if let Some(llm) = file.llm {
            let active = llm.active_provider.clone();
            self.llm = llm;
            if let Some(active) = active {
                self.select_provider(active);
            } else {
                let current = self.provider.clone();
                self.select_provider(current);
            }
        }
        if let Some(embedding) = file.embedding {
            self.embedding = embedding;
        }
        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(attribution) = file.attribution {
            self.attribution = attribution;
        }
        if let Some(access) = file.access {
            self.access = access;
        }

        self
    }

    /// Switch the active provider and pick up its configured model.
    fn select_provider(&mut self, provider: String) {
        if let Some(provider_config) = self.llm.providers.get(&provider) {
            self.model = provider_config.model().to_string();
        }
        self.provider = provider;
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// This method merges command-line flags with the loaded configuration,
    /// giving precedence to CLI flags over environment variables.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.select_provider(provider);
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Resolve a configured path against the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    pub fn data_root(&self) -> PathBuf {
        self.resolve_path(&self.paths.data_root)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.index_dir)
    }

    pub fn hr_records(&self) -> PathBuf {
        self.resolve_path(&self.paths.hr_records)
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.prompts_dir)
    }

    /// Get the active provider configuration.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.providers.get(provider)
    }

    /// Endpoint for the active provider, if configured.
    pub fn provider_endpoint(&self) -> Option<String> {
        match self.get_provider_config(&self.provider)? {
            ProviderConfig::OpenAI { endpoint, .. } => endpoint.clone(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.clone()),
        }
    }

    /// Resolve API key from the environment variable named by the provider config.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        match self.get_provider_config(provider)? {
            ProviderConfig::OpenAI { api_key_env, .. } => std::env::var(api_key_env).ok(),
            ProviderConfig::Ollama { .. } => None,
        }
    }

    /// Read the token signing secret from the configured environment variable.
    pub fn resolve_jwt_secret(&self) -> AppResult<String> {
        std::env::var(&self.server.jwt_secret_env).map_err(|_| {
            AppError::Config(format!(
                "Token signing secret not set in environment variable: {}",
                self.server.jwt_secret_env
            ))
        })
    }

    /// Validate configuration for the active provider and the retrieval policy.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["openai", "ollama"];
        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        let known_embedders = ["trigram", "ollama"];
        if !known_embedders.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                known_embedders.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("retrieval.topK must be at least 1".to_string()));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }

        let threshold = self.attribution.overlap_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::Config(format!(
                "attribution.overlapThreshold must be within [0, 1], got {}",
                threshold
            )));
        }

        if self.attribution.distance_threshold <= 0.0 {
            return Err(AppError::Config(
                "attribution.distanceThreshold must be positive".to_string(),
            ));
        }

        if self.access.policy.is_empty() {
            return Err(AppError::Config("access.policy must not be empty".to_string()));
        }

        if self.access.default_scopes.is_empty() {
            return Err(AppError::Config(
                "access.defaultScopes must name at least one department".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(AppError::Config("llm.timeoutSecs must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "mistralai/mistral-small-3.2-24b-instruct:free");
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.chunk_size, 1500);
        assert_eq!(config.retrieval.chunk_overlap, 150);
        assert_eq!(config.attribution.min_word_len, 4);
        assert_eq!(config.attribution.max_fallback_sources, 2);
        assert_eq!(config.server.token_ttl_hours, 24);
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_default_policy() {
        let access = AccessConfig::default();
        assert_eq!(access.policy["technology"], vec!["engineering", "general"]);
        assert_eq!(access.default_scopes, vec!["general"]);
        assert!(access.privileged_ids.contains(&"FINEMP1000".to_string()));
        assert_eq!(access.privileged_scopes.len(), 5);
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            Some("ollama".to_string()),
            None,
            None,
            true,
            false,
            false,
        );

        assert_eq!(overridden.provider, "ollama");
        assert_eq!(overridden.model, "llama3.2");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_explicit_model_beats_provider_default() {
        let overridden = AppConfig::default().with_overrides(
            Some("ollama".to_string()),
            Some("qwen2.5".to_string()),
            None,
            false,
            false,
            true,
        );
        assert_eq!(overridden.model, "qwen2.5");
        assert!(overridden.json_logs);
    }

    #[test]
    fn test_merge_yaml_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
logging:
  level: warn
  json: true
paths:
  dataRoot: corpus
llm:
  activeProvider: ollama
  timeoutSecs: 15
  providers:
    ollama:
      endpoint: http://gpu-box:11434
      model: mistral
attribution:
  overlapThreshold: 0.3
"#,
        )
        .unwrap();

        let mut base = AppConfig::default();
        base.workspace = dir.path().to_path_buf();
        let config = base.merge_yaml(&path).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("warn"));
        assert!(config.json_logs);
        assert_eq!(config.data_root(), dir.path().join("corpus"));
        // Unspecified fields in a section keep their defaults
        assert_eq!(config.paths.index_dir, PathBuf::from(".roleflow/indexes"));
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "mistral");
        assert_eq!(config.llm.timeout_secs, 15);
        assert_eq!(config.attribution.overlap_threshold, 0.3);
        assert_eq!(config.attribution.distance_threshold, 0.7);
        assert_eq!(
            config.provider_endpoint().as_deref(),
            Some("http://gpu-box:11434")
        );
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/srv/roleflow");
        config.paths.index_dir = PathBuf::from("/var/lib/roleflow");
        assert_eq!(config.index_dir(), PathBuf::from("/var/lib/roleflow"));
        assert_eq!(config.data_root(), PathBuf::from("/srv/roleflow/data"));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = AppConfig::default();
        config.attribution.overlap_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.access.policy.clear();
        assert!(config.validate().is_err());
    }
}
