mod command;
mod extract;

use std::collections::HashSet;

use dispenser_contracts::{InventoryReport, KeyRecord};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use command::{parse_command, Command, COMMAND_NAMES};
pub use extract::{
    classify_ingest_input, extract_candidates, is_locator, is_valid_key, IngestInput,
};

/// Result of merging candidates into an inventory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub added: usize,
    pub inventory: Vec<KeyRecord>,
}

/// Assigns the first unclaimed key, in stored order, to `requester_id`.
///
/// Returns the key material when a record changed; the caller owns the
/// snapshot and must persist it. `None` leaves the inventory untouched.
pub fn find_unclaimed_for(inventory: &mut [KeyRecord], requester_id: &str) -> Option<String> {
    let record = inventory.iter_mut().find(|r| !r.is_claimed())?;
    record.claimed_by = Some(requester_id.to_string());
    Some(record.key.clone())
}

pub fn has_claimed(inventory: &[KeyRecord], requester_id: &str) -> bool {
    inventory.iter().any(|r| r.is_claimed_by(requester_id))
}

pub fn count_available(inventory: &[KeyRecord]) -> usize {
    inventory.iter().filter(|r| !r.is_claimed()).count()
}

pub fn count_total(inventory: &[KeyRecord]) -> usize {
    inventory.len()
}

/// Share of the inventory still available, rounded down. An empty inventory
/// reports 0.
pub fn percent_remaining(available: usize, total: usize) -> u32 {
    if total == 0 || available == 0 {
        return 0;
    }
    let percent = (available.min(total) as u128 * 100) / total as u128;
    percent as u32
}

pub fn report(inventory: &[KeyRecord]) -> InventoryReport {
    let available = count_available(inventory);
    let total = count_total(inventory);
    InventoryReport {
        available,
        total,
        percent_remaining: percent_remaining(available, total),
    }
}

/// Appends every candidate not already present, preserving input order.
///
/// Candidates repeated within the same call are only appended once.
pub fn merge(inventory: &[KeyRecord], candidates: &[String]) -> Merged {
    let mut seen: HashSet<&str> = inventory.iter().map(|r| r.key.as_str()).collect();
    let mut merged = inventory.to_vec();
    let mut added = 0;
    for candidate in candidates {
        if seen.insert(candidate.as_str()) {
            merged.push(KeyRecord::unclaimed(candidate.as_str()));
            added += 1;
        }
    }
    Merged {
        added,
        inventory: merged,
    }
}

pub fn jcs_sha256_hex(value: &Value) -> Result<String, String> {
    let canonical = serde_jcs::to_string(value)
        .map_err(|err| format!("failed to canonicalize JSON via JCS: {err}"))?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Short, non-reversible handle for a key, safe to log and audit.
pub fn key_fingerprint(key: &str) -> String {
    let digest = sha256_hex(key.as_bytes());
    format!("sha256:{}", &digest[..16])
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
