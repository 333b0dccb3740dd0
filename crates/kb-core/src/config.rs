//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against a known base
//! directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::types::BackendId;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
    env_name: String,
}

impl Config {
    /// Load configuration from the current working directory.
    pub fn load() -> anyhow::Result<Self> { Self::load_from(&env::current_dir()?) }

    /// Load `config.toml` and the environment overlay found in `base_dir`.
    pub fn load_from(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self::from_figment(figment, base_dir, env_name))
    }

    pub fn from_figment(figment: Figment, base_dir: &Path, env_name: impl Into<String>) -> Self {
        Self { figment, base_dir: base_dir.to_path_buf(), env_name: env_name.into() }
    }

    pub fn env_name(&self) -> &str { &self.env_name }

    pub fn base_dir(&self) -> &Path { &self.base_dir }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract, path-resolve and validate the full settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.lexical.corpus_dir = resolve_with_base(&self.base_dir, settings.lexical.corpus_dir.to_string_lossy());
        settings.telemetry.log_path = resolve_with_base(&self.base_dir, settings.telemetry.log_path.to_string_lossy());
        settings.validate()?;
        if matches!(self.env_name.as_str(), "prod" | "production") && settings.embedding.provider == EmbeddingProvider::Hash {
            tracing::warn!("hash embeddings configured in production; vector backends will rank poorly");
        }
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub qdrant: QdrantSettings,
    pub multi_collection: MultiCollectionSettings,
    pub vector_a: CollectionSettings,
    pub vector_b: CollectionSettings,
    pub lexical: LexicalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub telemetry: TelemetrySettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.retrieval.default_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.default_top_k must be at least 1".into()));
        }
        if self.retrieval.max_top_k < self.retrieval.default_top_k {
            return Err(Error::InvalidConfig("retrieval.max_top_k must be at least retrieval.default_top_k".into()));
        }
        let mut seen = HashSet::new();
        for id in &self.retrieval.order {
            if !seen.insert(*id) {
                return Err(Error::InvalidConfig(format!("retrieval.order lists '{id}' more than once")));
            }
        }
        if self.retrieval.request_deadline_ms == Some(0) {
            return Err(Error::InvalidConfig("retrieval.request_deadline_ms must be positive".into()));
        }
        let timeouts = [
            ("multi_collection.timeout_ms", self.multi_collection.timeout_ms),
            ("vector_a.timeout_ms", self.vector_a.timeout_ms),
            ("vector_b.timeout_ms", self.vector_b.timeout_ms),
            ("lexical.timeout_ms", self.lexical.timeout_ms),
            ("embedding.timeout_ms", self.embedding.timeout_ms),
            ("generation.timeout_ms", self.generation.timeout_ms),
        ];
        if let Some((key, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(Error::InvalidConfig(format!("{key} must be positive")));
        }
        if self.generation.max_passages == 0 {
            return Err(Error::InvalidConfig("generation.max_passages must be at least 1".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be at least 1".into()));
        }
        if self.multi_collection.enabled && self.multi_collection.collections.is_empty() {
            return Err(Error::InvalidConfig("multi_collection is enabled but lists no collections".into()));
        }
        Ok(())
    }

    /// Timeout for one backend call.
    pub fn backend_timeout(&self, id: BackendId) -> Duration {
        let ms = match id {
            BackendId::MultiCollection => self.multi_collection.timeout_ms,
            BackendId::VectorA => self.vector_a.timeout_ms,
            BackendId::VectorB => self.vector_b.timeout_ms,
            BackendId::Lexical => self.lexical.timeout_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn backend_enabled(&self, id: BackendId) -> bool {
        match id {
            BackendId::MultiCollection => self.multi_collection.enabled,
            BackendId::VectorA => self.vector_a.enabled,
            BackendId::VectorB => self.vector_b.enabled,
            BackendId::Lexical => self.lexical.enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Backend priority, richest store first.
    pub order: Vec<BackendId>,
    pub default_top_k: usize,
    /// Upper bound applied to any caller-supplied `top_k`.
    pub max_top_k: usize,
    /// Budget for the whole cascade; unset means per-backend timeouts only.
    pub request_deadline_ms: Option<u64>,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { order: BackendId::ALL.to_vec(), default_top_k: 5, max_top_k: 50, request_deadline_ms: None } }
}

impl RetrievalSettings {
    pub fn request_deadline(&self) -> Option<Duration> { self.request_deadline_ms.map(Duration::from_millis) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
}

impl Default for QdrantSettings {
    fn default() -> Self { Self { url: "http://localhost:6333".into(), api_key: None } }
}

/// A collection as exposed to users (`name`) and as stored in Qdrant (`collection`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCollection {
    pub name: String,
    pub collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiCollectionSettings {
    pub enabled: bool,
    pub collections: Vec<NamedCollection>,
    pub content_field: String,
    pub timeout_ms: u64,
}

impl Default for MultiCollectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            collections: vec![
                NamedCollection { name: "vedas".into(), collection: "vedas_nas".into() },
                NamedCollection { name: "wellness".into(), collection: "wellness_nas".into() },
            ],
            content_field: "content".into(),
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub enabled: bool,
    pub collection: String,
    pub content_field: String,
    pub timeout_ms: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self { enabled: true, collection: "vedabase".into(), content_field: "content".into(), timeout_ms: 10_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalSettings {
    pub enabled: bool,
    pub corpus_dir: PathBuf,
    pub extensions: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for LexicalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            corpus_dir: PathBuf::from("knowledge_base"),
            extensions: vec!["txt".into(), "md".into()],
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Hash,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub url: String,
    pub model: String,
    pub dim: usize,
    pub timeout_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            url: "http://localhost:11434/api/embeddings".into(),
            model: "nomic-embed-text".into(),
            dim: 384,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub enabled: bool,
    pub url: String,
    pub model: String,
    pub timeout_ms: u64,
    /// How many top passages feed the synthesizer.
    pub max_passages: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:11434/api/generate".into(),
            model: "llama3.1".into(),
            timeout_ms: 30_000,
            max_passages: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub log_path: PathBuf,
}

impl Default for TelemetrySettings {
    fn default() -> Self { Self { enabled: true, log_path: PathBuf::from("logs/learning_log.jsonl") } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self { Self { filter: "info".into(), json: false } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
