use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const API_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct SchemaManifestEntry {
    pub path: &'static str,
    pub sha256: &'static str,
    pub body: &'static str,
}

#[derive(Debug, Clone)]
pub struct ContractsManifest {
    pub openapi_sha256: &'static str,
    pub schema_set_sha256: &'static str,
    pub built_at: &'static str,
    pub schemas: Vec<SchemaManifestEntry>,
}

include!(concat!(env!("OUT_DIR"), "/contract_manifest.rs"));

pub fn contracts_manifest_v1() -> ContractsManifest {
    ContractsManifest {
        openapi_sha256: OPENAPI_SHA256,
        schema_set_sha256: SCHEMA_SET_SHA256,
        built_at: MANIFEST_BUILT_AT,
        schemas: SCHEMA_ENTRIES
            .iter()
            .map(|&(path, sha256, body)| SchemaManifestEntry { path, sha256, body })
            .collect(),
    }
}

/// One license key in the persisted inventory.
///
/// Fields are declared in lexical order so the serialized document comes out
/// key-sorted. `claimed_by` is `null` while the key is available; an empty
/// string read from an older document means the same thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub claimed_by: Option<String>,
    #[serde(alias = "steam_key")]
    pub key: String,
}

impl KeyRecord {
    pub fn unclaimed(key: impl Into<String>) -> Self {
        Self {
            claimed_by: None,
            key: key.into(),
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }

    pub fn is_claimed_by(&self, requester_id: &str) -> bool {
        self.claimed_by.as_deref() == Some(requester_id)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimRequest {
    pub requester_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Issued { key: String },
    AlreadyClaimed,
    Exhausted,
}

/// Instructions for the chat collaborator. The core decides *what* must be
/// delivered and to whom; rendering and channel choice stay with the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    DeliverPrivately { requester_id: String, key: String },
    NotifyOperators { operator_ids: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClaimResponse {
    pub requester_id: String,
    pub outcome: ClaimOutcome,
    #[serde(default)]
    pub signals: Vec<Signal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestRequest {
    pub input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Added { added: usize, candidates: usize },
    DuplicateKey { key: String },
    InvalidInput { input: String },
    IngestFailed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IngestResponse {
    pub outcome: IngestOutcome,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InventoryReport {
    pub available: usize,
    pub total: usize,
    pub percent_remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMessage {
    pub author_id: String,
    #[serde(default)]
    pub author_is_bot: bool,
    pub channel_id: String,
    #[serde(default)]
    pub direct: bool,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    AuthorIsBot,
    NotACommand,
    AddRequiresDirectMessage,
    MissingArgument,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageResponse {
    Ignored { reason: IgnoreReason },
    Claim(ClaimResponse),
    Report(InventoryReport),
    Ingest(IngestResponse),
    Help { commands: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractsMetadata {
    pub api_version: String,
    pub openapi_sha256: String,
    pub schema_set_sha256: String,
    pub built_at: String,
    pub schemas: BTreeMap<String, String>,
}

impl ContractsMetadata {
    pub fn current() -> Self {
        let manifest = contracts_manifest_v1();
        Self {
            api_version: API_VERSION.to_string(),
            openapi_sha256: manifest.openapi_sha256.to_string(),
            schema_set_sha256: manifest.schema_set_sha256.to_string(),
            built_at: manifest.built_at.to_string(),
            schemas: manifest
                .schemas
                .iter()
                .map(|s| (s.path.to_string(), s.sha256.to_string()))
                .collect(),
        }
    }
}
