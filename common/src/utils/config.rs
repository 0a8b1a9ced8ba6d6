use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    OpenAI,
    Hashed,
}

fn default_embedding_backend() -> EmbeddingBackendKind {
    EmbeddingBackendKind::OpenAI
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_surrealdb_address")]
    pub surrealdb_address: String,
    #[serde(default = "default_surrealdb_credential")]
    pub surrealdb_username: String,
    #[serde(default = "default_surrealdb_credential")]
    pub surrealdb_password: String,
    #[serde(default = "default_surrealdb_namespace")]
    pub surrealdb_namespace: String,
    #[serde(default = "default_surrealdb_database")]
    pub surrealdb_database: String,
    /// API key sent to the OpenAI-compatible endpoint. Ollama accepts any value.
    #[serde(default = "default_api_key")]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackendKind,
    /// Upper bound for a single completion request. Local-model inference is
    /// slow enough that this is measured in minutes.
    #[serde(default = "default_llm_request_timeout_secs")]
    pub llm_request_timeout_secs: u64,
    /// Character budget for the retrieved-context block of an agent prompt.
    #[serde(default = "default_llm_context_window_chars")]
    pub llm_context_window_chars: usize,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
}

fn default_surrealdb_address() -> String {
    "ws://localhost:8000".to_string()
}

fn default_surrealdb_credential() -> String {
    "root".to_string()
}

fn default_surrealdb_namespace() -> String {
    "procura".to_string()
}

fn default_surrealdb_database() -> String {
    "procurement".to_string()
}

fn default_api_key() -> String {
    "ollama".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_llm_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_embedding_model() -> String {
    "bge-m3:567m".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1024
}

fn default_llm_request_timeout_secs() -> u64 {
    300
}

fn default_llm_context_window_chars() -> usize {
    12_000
}

fn default_data_dir() -> String {
    "./data".to_string()
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
