//! Claim and ingestion orchestration.
//!
//! Every operation that changes the inventory runs load -> mutate -> save
//! while holding `mutation_lock`, so two claims can never hand out the same
//! key and two ingestions can never append the same key twice. Reports read
//! a fresh snapshot without taking the lock.

use dispenser_config::Config;
use dispenser_contracts::{
    ClaimOutcome, ClaimResponse, IngestOutcome, IngestResponse, InventoryReport, KeyRecord,
    Signal,
};
use dispenser_kernel::{
    classify_ingest_input, extract_candidates, find_unclaimed_for, has_claimed, key_fingerprint,
    merge, report, IngestInput,
};
use tokio::sync::Mutex;

use crate::audit::{AuditLog, AuditRecord};
use crate::error::{DispenserError, FetchError};
use crate::fetch::HttpFetcher;
use crate::store::KeyStore;

pub struct Dispenser {
    store: KeyStore,
    fetcher: HttpFetcher,
    audit: AuditLog,
    operator_ids: Vec<String>,
    mutation_lock: Mutex<()>,
}

impl Dispenser {
    pub fn new(
        store: KeyStore,
        fetcher: HttpFetcher,
        audit: AuditLog,
        operator_ids: Vec<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            audit,
            operator_ids,
            mutation_lock: Mutex::new(()),
        }
    }

    pub async fn from_config(cfg: &Config) -> Result<Self, String> {
        let store = KeyStore::from_config(&cfg.store)?;
        store.ensure_initialized().await.map_err(|e| e.to_string())?;
        Ok(Self::new(
            store,
            HttpFetcher::new(&cfg.fetch)?,
            AuditLog::open(
                &cfg.audit.jsonl_path,
                cfg.audit.immutable_mirror_path.as_deref(),
            )
            .await?,
            cfg.chat.operator_ids.clone(),
        ))
    }

    /// Hands `requester_id` at most one key, ever. Surrounding whitespace is
    /// not part of the identity.
    pub async fn claim_for(&self, requester_id: &str) -> Result<ClaimResponse, DispenserError> {
        let requester_id = requester_id.trim();
        if requester_id.is_empty() {
            return Err(DispenserError::InvalidRequest(
                "requester_id is required".to_string(),
            ));
        }

        let guard = self.mutation_lock.lock().await;
        let mut inventory = self.load_logged("claim").await?;

        if has_claimed(&inventory, requester_id) {
            drop(guard);
            tracing::info!(requester_id, "claim refused: requester already holds a key");
            self.audit
                .append(AuditRecord::new("claim", "already_claimed").requester(requester_id))
                .await;
            return Ok(ClaimResponse {
                requester_id: requester_id.to_string(),
                outcome: ClaimOutcome::AlreadyClaimed,
                signals: Vec::new(),
            });
        }

        let Some(key) = find_unclaimed_for(&mut inventory, requester_id) else {
            drop(guard);
            tracing::warn!(
                requester_id,
                total = inventory.len(),
                "claim failed: inventory exhausted"
            );
            self.audit
                .append(AuditRecord::new("claim", "exhausted").requester(requester_id))
                .await;
            return Ok(ClaimResponse {
                requester_id: requester_id.to_string(),
                outcome: ClaimOutcome::Exhausted,
                signals: vec![Signal::NotifyOperators {
                    operator_ids: self.operator_ids.clone(),
                }],
            });
        };

        self.save_logged("claim", &inventory).await?;
        drop(guard);

        let fingerprint = key_fingerprint(&key);
        tracing::info!(requester_id, key = %fingerprint, "key issued");
        self.audit
            .append(
                AuditRecord::new("claim", "issued")
                    .requester(requester_id)
                    .fingerprint(fingerprint),
            )
            .await;
        Ok(ClaimResponse {
            requester_id: requester_id.to_string(),
            outcome: ClaimOutcome::Issued { key: key.clone() },
            signals: vec![Signal::DeliverPrivately {
                requester_id: requester_id.to_string(),
                key,
            }],
        })
    }

    /// Adds one literal key, or every key found in a remote document.
    pub async fn ingest(&self, input: &str) -> Result<IngestResponse, DispenserError> {
        let outcome = match classify_ingest_input(input) {
            IngestInput::Invalid => {
                tracing::info!("ingest rejected: input is neither a key nor a locator");
                self.audit
                    .append(AuditRecord::new("ingest", "invalid_input"))
                    .await;
                IngestOutcome::InvalidInput {
                    input: input.to_string(),
                }
            }
            IngestInput::Literal(key) => self.ingest_literal(key).await?,
            IngestInput::Locator(locator) => self.ingest_locator(&locator).await?,
        };
        Ok(IngestResponse { outcome })
    }

    pub async fn report(&self) -> Result<InventoryReport, DispenserError> {
        let inventory = self.load_logged("report").await?;
        Ok(report(&inventory))
    }

    async fn ingest_literal(&self, key: String) -> Result<IngestOutcome, DispenserError> {
        let fingerprint = key_fingerprint(&key);
        let guard = self.mutation_lock.lock().await;
        let inventory = self.load_logged("ingest").await?;
        let merged = merge(&inventory, std::slice::from_ref(&key));
        if merged.added == 0 {
            drop(guard);
            tracing::info!(key = %fingerprint, "ingest skipped: key already present");
            self.audit
                .append(AuditRecord::new("ingest", "duplicate_key").fingerprint(fingerprint))
                .await;
            return Ok(IngestOutcome::DuplicateKey { key });
        }
        self.save_logged("ingest", &merged.inventory).await?;
        drop(guard);

        tracing::info!(key = %fingerprint, "key added");
        self.audit
            .append(
                AuditRecord::new("ingest", "added")
                    .fingerprint(fingerprint)
                    .detail("added=1 candidates=1"),
            )
            .await;
        Ok(IngestOutcome::Added {
            added: 1,
            candidates: 1,
        })
    }

    async fn ingest_locator(&self, locator: &str) -> Result<IngestOutcome, DispenserError> {
        let source = redact_locator(locator);
        // Fetch outside the lock so a slow remote never stalls claims.
        let text = match self.fetch_text(locator).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(source = %source, err = %e, "ingest failed: key list unavailable");
                self.audit
                    .append(
                        AuditRecord::new("ingest", "ingest_failed")
                            .detail(format!("{source}: {e}")),
                    )
                    .await;
                return Ok(IngestOutcome::IngestFailed {
                    reason: e.to_string(),
                });
            }
        };
        let candidates = extract_candidates(&text);

        let guard = self.mutation_lock.lock().await;
        let inventory = self.load_logged("ingest").await?;
        let merged = merge(&inventory, &candidates);
        if merged.added > 0 {
            self.save_logged("ingest", &merged.inventory).await?;
        }
        drop(guard);

        tracing::info!(
            source = %source,
            added = merged.added,
            candidates = candidates.len(),
            "key list ingested"
        );
        self.audit
            .append(AuditRecord::new("ingest", "added").detail(format!(
                "{source}: added={} candidates={}",
                merged.added,
                candidates.len()
            )))
            .await;
        Ok(IngestOutcome::Added {
            added: merged.added,
            candidates: candidates.len(),
        })
    }

    async fn fetch_text(&self, locator: &str) -> Result<String, FetchError> {
        let bytes = self.fetcher.fetch(locator).await?;
        String::from_utf8(bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn load_logged(&self, operation: &str) -> Result<Vec<KeyRecord>, DispenserError> {
        self.store.load().await.map_err(|e| {
            tracing::error!(operation, err = %e, "inventory load failed");
            DispenserError::from(e)
        })
    }

    async fn save_logged(
        &self,
        operation: &str,
        inventory: &[KeyRecord],
    ) -> Result<(), DispenserError> {
        self.store.save(inventory).await.map_err(|e| {
            tracing::error!(operation, err = %e, "inventory save failed");
            DispenserError::from(e)
        })
    }
}

/// Host and path of a key-list locator. Query strings and credentials often
/// carry access tokens and never reach logs or the audit trail.
fn redact_locator(locator: &str) -> String {
    match reqwest::Url::parse(locator) {
        Ok(url) => format!("{}{}", url.host_str().unwrap_or_default(), url.path()),
        Err(_) => "<unparsable locator>".to_string(),
    }
}
