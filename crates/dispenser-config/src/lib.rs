use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config failed: {0}")]
    Read(String),
    #[error("parse config failed: {0}")]
    Parse(String),
    #[error("schema load failed: {0}")]
    SchemaLoad(String),
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: Server,
    pub store: Store,
    #[serde(default)]
    pub fetch: Fetch,
    #[serde(default)]
    pub chat: Chat,
    pub audit: Audit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub json_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fetch {
    #[serde(default = "default_fetch_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_fetch_max_bytes")]
    pub max_bytes: usize,
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            timeout_ms: default_fetch_timeout_ms(),
            max_bytes: default_fetch_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Who gets told when the inventory runs dry.
    #[serde(default)]
    pub operator_ids: Vec<String>,
    /// Any message posted in one of these channels counts as a claim.
    #[serde(default)]
    pub claim_channel_ids: Vec<String>,
}

impl Default for Chat {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            operator_ids: Vec::new(),
            claim_channel_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub jsonl_path: String,
    #[serde(default)]
    pub immutable_mirror_path: Option<String>,
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_fetch_max_bytes() -> usize {
    1024 * 1024
}

fn default_command_prefix() -> String {
    "$key ".to_string()
}

pub fn load_and_validate(path: &str) -> Result<Config, ConfigError> {
    let config_text =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&config_text).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let instance = serde_json::to_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_against_schema(&instance)?;

    let cfg: Config =
        serde_json::from_value(instance).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_runtime_support(&cfg)?;
    Ok(cfg)
}

fn validate_against_schema(instance: &serde_json::Value) -> Result<(), ConfigError> {
    let schema_path = [
        std::path::PathBuf::from("config/config.schema.json"),
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .join("config/config.schema.json"),
    ]
    .into_iter()
    .find(|p| p.exists())
    .ok_or_else(|| {
        ConfigError::SchemaLoad(
            "config schema not found at config/config.schema.json or workspace config path"
                .to_string(),
        )
    })?;

    let schema_text =
        std::fs::read_to_string(schema_path).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;
    let schema: serde_json::Value =
        serde_json::from_str(&schema_text).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;

    let validator =
        jsonschema::validator_for(&schema).map_err(|e| ConfigError::SchemaLoad(e.to_string()))?;
    if let Err(first) = validator.validate(instance) {
        return Err(ConfigError::SchemaValidation(first.to_string()));
    }
    Ok(())
}

fn validate_runtime_support(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.store.kind != "memory" && cfg.store.kind != "json" {
        return Err(ConfigError::UnsupportedConfig(format!(
            "store.type={} is not implemented; supported: memory, json",
            cfg.store.kind
        )));
    }
    if cfg.store.kind == "memory" && cfg.store.json_path.is_some() {
        return Err(ConfigError::UnsupportedConfig(
            "store.json_path is not supported when store.type=memory".to_string(),
        ));
    }
    if cfg.store.kind == "json"
        && cfg
            .store
            .json_path
            .as_ref()
            .map(|v| v.trim().is_empty())
            .unwrap_or(true)
    {
        return Err(ConfigError::UnsupportedConfig(
            "store.json_path is required when store.type=json".to_string(),
        ));
    }
    if cfg.fetch.timeout_ms == 0 {
        return Err(ConfigError::UnsupportedConfig(
            "fetch.timeout_ms must be >= 1".to_string(),
        ));
    }
    if cfg.fetch.max_bytes == 0 {
        return Err(ConfigError::UnsupportedConfig(
            "fetch.max_bytes must be >= 1".to_string(),
        ));
    }
    if cfg.chat.command_prefix.trim().is_empty() {
        return Err(ConfigError::UnsupportedConfig(
            "chat.command_prefix must contain a non-whitespace character".to_string(),
        ));
    }
    Ok(())
}
