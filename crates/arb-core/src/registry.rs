//! Approved and pending recipients.
//!
//! Approved recipients are persisted as a flat JSON object mapping the
//! string-encoded chat id to a display name; the file is rewritten in full on
//! every approval. Pending requests live only in memory and are lost on restart.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use tokio::sync::Mutex;

use crate::{
    domain::{ApprovedRecipient, RecipientId},
    errors::Error,
    Result,
};

#[derive(Debug, Default)]
struct RegistryState {
    approved: BTreeMap<RecipientId, String>,
    pending: HashMap<RecipientId, String>,
}

/// Single owner of the approved and pending maps.
///
/// One coarse lock serializes approve/deny against fan-out reads.
pub struct RecipientRegistry {
    path: PathBuf,
    state: Mutex<RegistryState>,
}

impl RecipientRegistry {
    /// Load the approved map from `path`, starting empty when the file is
    /// missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let approved = match load_approved_file(&path) {
            Ok(Some(map)) => map,
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load approved recipients; starting empty");
                BTreeMap::new()
            }
        };
        tracing::info!(count = approved.len(), "loaded approved recipients");

        Self {
            path,
            state: Mutex::new(RegistryState {
                approved,
                pending: HashMap::new(),
            }),
        }
    }

    pub async fn is_approved(&self, id: RecipientId) -> bool {
        self.state.lock().await.approved.contains_key(&id)
    }

    pub async fn is_pending(&self, id: RecipientId) -> bool {
        self.state.lock().await.pending.contains_key(&id)
    }

    /// Record a registration request. No-op when `id` is already approved or
    /// pending; an existing pending name is never overwritten.
    pub async fn add_pending(&self, id: RecipientId, name: &str) {
        let mut state = self.state.lock().await;
        if state.approved.contains_key(&id) || state.pending.contains_key(&id) {
            return;
        }
        state.pending.insert(id, name.to_string());
    }

    /// Promote a pending request and persist the approved map.
    ///
    /// Returns `None` when `id` was not pending. A failed write is logged and
    /// the approval stays effective in memory.
    pub async fn approve(&self, id: RecipientId) -> Option<ApprovedRecipient> {
        let mut state = self.state.lock().await;
        let name = state.pending.remove(&id)?;
        state.approved.insert(id, name.clone());

        if let Err(e) = save_approved_file(&self.path, &state.approved) {
            tracing::error!(path = %self.path.display(), error = %e, "failed to persist approved recipients");
        }

        Some(ApprovedRecipient { id, name })
    }

    /// Discard a pending request, returning its display name.
    pub async fn deny(&self, id: RecipientId) -> Option<String> {
        self.state.lock().await.pending.remove(&id)
    }

    /// Snapshot of approved recipient ids, for fan-out.
    pub async fn approved_ids(&self) -> Vec<RecipientId> {
        self.state.lock().await.approved.keys().copied().collect()
    }

    pub async fn approved_count(&self) -> usize {
        self.state.lock().await.approved.len()
    }

    pub async fn pending_name(&self, id: RecipientId) -> Option<String> {
        self.state.lock().await.pending.get(&id).cloned()
    }

    /// Rewrite the approved map to disk.
    pub async fn persist(&self) -> Result<()> {
        let state = self.state.lock().await;
        save_approved_file(&self.path, &state.approved)
    }
}

fn load_approved_file(path: &Path) -> Result<Option<BTreeMap<RecipientId, String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }

    let raw: BTreeMap<String, String> = serde_json::from_str(&txt)?;
    let mut out = BTreeMap::new();
    for (key, name) in raw {
        match key.trim().parse::<i64>() {
            Ok(id) => {
                out.insert(RecipientId(id), name);
            }
            Err(_) => {
                tracing::warn!(key = %key, "skipping approved entry with non-numeric id");
            }
        }
    }
    Ok(Some(out))
}

fn save_approved_file(path: &Path, approved: &BTreeMap<RecipientId, String>) -> Result<()> {
    let raw: BTreeMap<String, &str> = approved
        .iter()
        .map(|(id, name)| (id.0.to_string(), name.as_str()))
        .collect();
    let txt = serde_json::to_string_pretty(&raw)?;

    // Write-then-rename so a crash mid-write never truncates the record.
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::InvalidRegistry {
            path: path.to_path_buf(),
            reason: "path has no file name".to_string(),
        })?
        .to_string_lossy()
        .into_owned();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, txt)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
