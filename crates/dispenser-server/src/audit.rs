use chrono::Utc;
use dispenser_kernel::jcs_sha256_hex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only, hash-chained JSONL record of claims and ingestions.
///
/// Each line carries the hash of the previous line, so edits or deletions
/// break verification. Records hold key fingerprints, never key material.
pub struct AuditLog {
    state: Mutex<AuditState>,
}

struct AuditState {
    file: tokio::fs::File,
    mirror: Option<tokio::fs::File>,
    last_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditRecord {
    pub audit_id: String,
    pub ts: String,
    pub operation: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    pub record_hash: String,
}

impl AuditRecord {
    pub fn new(operation: &str, outcome: &str) -> Self {
        Self {
            audit_id: format!("audit_{}", uuid::Uuid::new_v4().as_simple()),
            ts: Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            outcome: outcome.to_string(),
            requester_id: None,
            key_fingerprint: None,
            detail: None,
            prev_hash: None,
            record_hash: String::new(),
        }
    }

    pub fn requester(mut self, requester_id: &str) -> Self {
        self.requester_id = Some(requester_id.to_string());
        self
    }

    pub fn fingerprint(mut self, fingerprint: String) -> Self {
        self.key_fingerprint = Some(fingerprint);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn compute_hash(&self) -> Result<String, String> {
        let mut seed = self.clone();
        seed.record_hash.clear();
        let value = serde_json::to_value(&seed).map_err(|e| e.to_string())?;
        jcs_sha256_hex(&value)
    }
}

impl AuditLog {
    pub async fn open(path: &str, immutable_mirror_path: Option<&str>) -> Result<Self, String> {
        let last_hash = tokio::fs::read_to_string(path)
            .await
            .ok()
            .and_then(|text| last_record_hash(&text));

        let file = open_append(path).await?;
        let mirror = match immutable_mirror_path {
            Some(p) if !p.is_empty() => Some(open_append(p).await?),
            _ => None,
        };

        Ok(Self {
            state: Mutex::new(AuditState {
                file,
                mirror,
                last_hash,
            }),
        })
    }

    /// Failures are logged and swallowed; auditing never blocks an outcome.
    pub async fn append(&self, mut rec: AuditRecord) {
        let mut state = self.state.lock().await;
        rec.prev_hash = state.last_hash.clone();
        rec.record_hash = match rec.compute_hash() {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(err = %e, "audit record hash failed");
                return;
            }
        };
        let line = match serde_json::to_string(&rec) {
            Ok(line) => format!("{line}\n"),
            Err(e) => {
                tracing::warn!(err = %e, "audit record encode failed");
                return;
            }
        };

        if let Err(e) = write_line(&mut state.file, &line).await {
            tracing::warn!(err = %e, audit_id = %rec.audit_id, "audit append failed");
            return;
        }
        if let Some(mirror) = state.mirror.as_mut() {
            if let Err(e) = write_line(mirror, &line).await {
                tracing::warn!(err = %e, audit_id = %rec.audit_id, "audit mirror append failed");
            }
        }
        state.last_hash = Some(rec.record_hash);
    }
}

async fn write_line(file: &mut tokio::fs::File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

async fn open_append(path: &str) -> Result<tokio::fs::File, String> {
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| format!("open audit log {path} failed: {e}"))
}

fn last_record_hash(text: &str) -> Option<String> {
    text.lines().rev().find_map(|line| {
        serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("record_hash")?.as_str().map(str::to_string))
    })
}

pub fn verify_audit_chain(path: &str) -> Result<String, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let mut prev: Option<String> = None;
    let mut count = 0usize;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let rec: AuditRecord = serde_json::from_str(line)
            .map_err(|e| format!("line {} parse failed: {e}", idx + 1))?;
        if rec.prev_hash != prev {
            return Err(format!(
                "line {} prev_hash mismatch: expected {:?}, got {:?}",
                idx + 1,
                prev,
                rec.prev_hash
            ));
        }
        let expected_hash = rec
            .compute_hash()
            .map_err(|e| format!("line {} hash seed failed: {e}", idx + 1))?;
        if rec.record_hash != expected_hash {
            return Err(format!(
                "line {} record_hash mismatch: expected {}, got {}",
                idx + 1,
                expected_hash,
                rec.record_hash
            ));
        }
        prev = Some(rec.record_hash);
        count += 1;
    }

    Ok(format!("audit chain verified: {count} records"))
}

pub fn verify_audit_chain_with_mirror(path: &str, mirror: Option<&str>) -> Result<String, String> {
    let summary = verify_audit_chain(path)?;
    let Some(mirror) = mirror else {
        return Ok(summary);
    };
    let primary = std::fs::read(path).map_err(|e| e.to_string())?;
    let copy = std::fs::read(mirror).map_err(|e| e.to_string())?;
    if primary != copy {
        return Err(format!("audit mirror {mirror} differs from {path}"));
    }
    Ok(format!("{summary}; mirror identical"))
}
