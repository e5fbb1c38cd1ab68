//! Durable inventory storage.
//!
//! The inventory is always read and written as one document. Saves to the
//! JSON backend go through a temp file in the target directory that is
//! fsynced and then renamed over the old document, so a crash or a failed
//! write leaves the previous inventory intact for the next load.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dispenser_config::Store;
use dispenser_contracts::KeyRecord;

use crate::error::StoreError;

pub enum KeyStore {
    Memory(MemoryStore),
    Json(JsonFileStore),
}

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<KeyRecord>>,
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn from_config(cfg: &Store) -> Result<Self, String> {
        match cfg.kind.as_str() {
            "memory" => Ok(KeyStore::Memory(MemoryStore::default())),
            "json" => {
                let path = cfg
                    .json_path
                    .clone()
                    .ok_or_else(|| "store.json_path is required for json store".to_string())?;
                Ok(KeyStore::Json(JsonFileStore::new(path)))
            }
            other => Err(format!("unsupported store type: {other}")),
        }
    }

    pub async fn load(&self) -> Result<Vec<KeyRecord>, StoreError> {
        match self {
            KeyStore::Memory(store) => store.load(),
            KeyStore::Json(store) => store.load().await,
        }
    }

    pub async fn save(&self, inventory: &[KeyRecord]) -> Result<(), StoreError> {
        match self {
            KeyStore::Memory(store) => store.save(inventory),
            KeyStore::Json(store) => store.save(inventory).await,
        }
    }

    /// Writes an empty inventory when the JSON document does not exist yet.
    /// Fails when its directory is missing, so a mistyped path stops startup.
    pub async fn ensure_initialized(&self) -> Result<(), StoreError> {
        let KeyStore::Json(store) = self else {
            return Ok(());
        };
        let exists = tokio::fs::try_exists(&store.path).await.map_err(|e| {
            StoreError::Unavailable(format!("stat {} failed: {e}", store.path.display()))
        })?;
        if !exists {
            store.save(&[]).await?;
            tracing::info!(path = %store.path.display(), "created empty inventory");
        }
        Ok(())
    }
}

impl MemoryStore {
    pub fn with_records(records: Vec<KeyRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn load(&self) -> Result<Vec<KeyRecord>, StoreError> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))
    }

    fn save(&self, inventory: &[KeyRecord]) -> Result<(), StoreError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))?;
        *records = inventory.to_vec();
        Ok(())
    }
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<KeyRecord>, StoreError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            StoreError::Unavailable(format!("read {} failed: {e}", self.path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Unavailable(format!("parse {} failed: {e}", self.path.display()))
        })
    }

    async fn save(&self, inventory: &[KeyRecord]) -> Result<(), StoreError> {
        let bytes = encode_inventory(inventory)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &bytes))
            .await
            .map_err(|e| StoreError::Unavailable(format!("save task failed: {e}")))?
    }
}

/// Two-space indented JSON with a trailing newline; record fields come out in
/// lexical order.
pub fn encode_inventory(inventory: &[KeyRecord]) -> Result<Vec<u8>, StoreError> {
    let mut bytes = serde_json::to_vec_pretty(inventory)
        .map_err(|e| StoreError::Unavailable(format!("encode inventory failed: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn atomic_write(target: &Path, data: &[u8]) -> Result<(), StoreError> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
        StoreError::Unavailable(format!("create temp file in {}: {e}", parent.display()))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = temp
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
        {
            tracing::warn!(path = %temp.path().display(), err = %e, "failed to restrict temp file permissions");
        }
    }

    temp.write_all(data).map_err(|e| {
        StoreError::Unavailable(format!("write temp file for {}: {e}", target.display()))
    })?;
    temp.as_file().sync_all().map_err(|e| {
        StoreError::Unavailable(format!("sync temp file for {}: {e}", target.display()))
    })?;
    temp.persist(target).map_err(|e| {
        StoreError::Unavailable(format!("rename temp file to {}: {}", target.display(), e.error))
    })?;
    sync_dir(parent)
}

/// Commits the rename to the directory entry table.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let handle = std::fs::OpenOptions::new()
        .read(true)
        .open(dir)
        .map_err(|e| StoreError::Unavailable(format!("open {} for sync: {e}", dir.display())))?;
    handle
        .sync_all()
        .map_err(|e| StoreError::Unavailable(format!("sync {}: {e}", dir.display())))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}
