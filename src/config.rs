//! TOML configuration parsing with environment overrides.
//!
//! All settings live in one TOML file (`lexrag.toml` by default). Provider
//! credentials are never stored in the file; they come from the environment
//! (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` for the object store,
//! `OPENAI_API_KEY` for OpenAI-backed embedding/completion).
//!
//! Recognized environment overrides (applied after the file is parsed):
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `LEXRAG_INDEX_DIR` | vector index directory |
//! | `LEXRAG_PDF_DIR` | PDF source directory |
//! | `LEXRAG_BUCKET` | object store bucket |
//! | `LEXRAG_AUDIT_DIR` | audit log directory |
//! | `LEXRAG_CHAT_BACKEND` | chat storage backend (`inmemory` or `remote`) |
//! | `LEXRAG_PII_CONFIDENCE` | PII emission threshold |
//! | `LEXRAG_MIN_INPUT_LEN` / `LEXRAG_MAX_INPUT_LEN` | input length bounds |
//! | `LEXRAG_MAX_FILE_MB` | file upload limit |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("data/vector_index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
        }
    }
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("data/pdfs")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Provider: `"openai"`, `"ollama"`, `"mock"`, or `"disabled"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider: `"openai"` or `"ollama"`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Default read timeout. Chat raises this per call, capped at 180.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_llm_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ObjectStoreConfig {
    /// When false, ingestion skips uploads and chunks carry no document URL.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_key_prefix() -> String {
    "cases".to_string()
}
fn default_download_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_max_chunks_per_case")]
    pub max_chunks_per_case: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            max_chunks_per_case: default_max_chunks_per_case(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_max_chunks_per_case() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    #[serde(default = "default_min_input_len")]
    pub min_input_len: usize,
    #[serde(default = "default_max_input_len")]
    pub max_input_len: usize,
    #[serde(default = "default_max_file_mb")]
    pub max_file_mb: u64,
    #[serde(default = "default_special_char_ratio")]
    pub special_char_ratio: f64,
    #[serde(default = "default_pii_confidence")]
    pub min_pii_confidence: f64,
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_input_len: default_min_input_len(),
            max_input_len: default_max_input_len(),
            max_file_mb: default_max_file_mb(),
            special_char_ratio: default_special_char_ratio(),
            min_pii_confidence: default_pii_confidence(),
            audit_dir: default_audit_dir(),
        }
    }
}

fn default_min_input_len() -> usize {
    10
}
fn default_max_input_len() -> usize {
    50_000
}
fn default_max_file_mb() -> u64 {
    10
}
fn default_special_char_ratio() -> f64 {
    0.2
}
fn default_pii_confidence() -> f64 {
    0.7
}
fn default_audit_dir() -> PathBuf {
    PathBuf::from("data/audit")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Storage backend: `"inmemory"` or `"remote"`.
    #[serde(default = "default_chat_backend")]
    pub backend: String,
    /// Number of recent turns included in the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Per-hit page-excerpt budget in characters.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Read timeout for chat completions; capped at 180.
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            backend: default_chat_backend(),
            history_window: default_history_window(),
            excerpt_chars: default_excerpt_chars(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_backend() -> String {
    "inmemory".to_string()
}
fn default_history_window() -> usize {
    10
}
fn default_excerpt_chars() -> usize {
    1000
}
fn default_chat_timeout_secs() -> u64 {
    180
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8600".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load configuration from a TOML file and apply environment overrides.
///
/// A missing file yields the default configuration, so the CLI works out of
/// the box against a local corpus.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        toml::from_str("").expect("empty config parses to defaults")
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("LEXRAG_INDEX_DIR") {
        config.index.dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("LEXRAG_PDF_DIR") {
        config.corpus.pdf_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("LEXRAG_BUCKET") {
        config.object_store.bucket = v;
        config.object_store.enabled = true;
    }
    if let Ok(v) = std::env::var("LEXRAG_AUDIT_DIR") {
        config.security.audit_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("LEXRAG_CHAT_BACKEND") {
        config.chat.backend = v;
    }
    if let Ok(v) = std::env::var("LEXRAG_PII_CONFIDENCE") {
        if let Ok(f) = v.parse() {
            config.security.min_pii_confidence = f;
        }
    }
    if let Ok(v) = std::env::var("LEXRAG_MIN_INPUT_LEN") {
        if let Ok(n) = v.parse() {
            config.security.min_input_len = n;
        }
    }
    if let Ok(v) = std::env::var("LEXRAG_MAX_INPUT_LEN") {
        if let Ok(n) = v.parse() {
            config.security.max_input_len = n;
        }
    }
    if let Ok(v) = std::env::var("LEXRAG_MAX_FILE_MB") {
        if let Ok(n) = v.parse() {
            config.security.max_file_mb = n;
        }
    }
}
