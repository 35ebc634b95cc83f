use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::auth::StoreContext;
use super::datastore::Datastore;
use crate::common::{now_ms, ScanResult, ScanType};

const DISPLAY_TEXT_LEN: usize = 50;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

// History entry
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: ScanType,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    pub display_text: String,
}

impl HistoryEntry {
    pub fn new(user_id: &str, content: &str, kind: ScanType, timestamp_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            kind,
            timestamp_ms,
            display_text: display_text(content),
        }
    }
}

/// First 50 characters of `content`, with `...` appended when cut.
pub fn display_text(content: &str) -> String {
    match content.char_indices().nth(DISPLAY_TEXT_LEN) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Short age of a history entry, as shown in the history list.
pub fn relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    match diff {
        d if d < MINUTE_MS => "Just now".to_string(),
        d if d < HOUR_MS => format!("{}m ago", d / MINUTE_MS),
        d if d < DAY_MS => format!("{}h ago", d / HOUR_MS),
        d if d < WEEK_MS => format!("{}d ago", d / DAY_MS),
        _ => DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
            .map(|t| t.format("%b %d, %Y").to_string())
            .unwrap_or_default(),
    }
}

// History store
//------------------------------------------------------------------------------

/// Per-user scan history. Every call acts for the current user of the store and
/// fails with `NotAuthenticated` when there is none.
pub trait HistoryStore: Send + Sync {
    fn save(&self, content: &str, kind: ScanType) -> ScanResult<HistoryEntry>;

    /// Newest first.
    fn list(&self) -> ScanResult<Vec<HistoryEntry>>;

    fn delete(&self, id: &str) -> ScanResult<()>;

    fn delete_all(&self) -> ScanResult<()>;

    fn save_generated(&self, text: &str) -> ScanResult<HistoryEntry> {
        self.save(text, ScanType::Generated)
    }

    fn get(&self, id: &str) -> ScanResult<Option<HistoryEntry>> {
        Ok(self.list()?.into_iter().find(|e| e.id == id))
    }
}

// Repository
//------------------------------------------------------------------------------

pub struct HistoryRepository {
    db: Arc<Datastore>,
    ctx: StoreContext,
}

impl HistoryRepository {
    pub fn new(db: Arc<Datastore>, ctx: StoreContext) -> Self {
        Self { db, ctx }
    }

    pub fn save_at(&self, content: &str, kind: ScanType, timestamp_ms: i64) -> ScanResult<HistoryEntry> {
        let uid = self.ctx.uid().inspect_err(|e| error!("Cannot save scan: {e}"))?;
        let entry = HistoryEntry::new(&uid, content, kind, timestamp_ms);
        debug!(id = %entry.id, %kind, "Saving scan to scan_history/{uid}");

        let stored = entry.clone();
        self.db
            .write(move |t| t.scan_history.entry(uid).or_default().insert(stored.id.clone(), stored))
            .inspect_err(|e| error!("Failed to save scan: {e}"))?;

        info!(id = %entry.id, "Saved scan");
        Ok(entry)
    }
}

impl HistoryStore for HistoryRepository {
    fn save(&self, content: &str, kind: ScanType) -> ScanResult<HistoryEntry> {
        self.save_at(content, kind, now_ms())
    }

    fn list(&self) -> ScanResult<Vec<HistoryEntry>> {
        let uid = self.ctx.uid().inspect_err(|e| error!("Cannot get scans: {e}"))?;
        let mut scans = self.db.read(|t| {
            t.scan_history.get(&uid).map(|m| m.values().cloned().collect::<Vec<_>>()).unwrap_or_default()
        })?;
        scans.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        debug!("Fetched {} scans for {uid}", scans.len());
        Ok(scans)
    }

    fn delete(&self, id: &str) -> ScanResult<()> {
        let uid = self.ctx.uid().inspect_err(|e| error!("Cannot delete scan: {e}"))?;
        let removed = self
            .db
            .write(|t| t.scan_history.get_mut(&uid).and_then(|m| m.remove(id)).is_some())
            .inspect_err(|e| error!("Failed to delete scan {id}: {e}"))?;
        if removed {
            info!(id, "Deleted scan");
        } else {
            debug!(id, "Scan already gone");
        }
        Ok(())
    }

    fn delete_all(&self) -> ScanResult<()> {
        let uid = self.ctx.uid().inspect_err(|e| error!("Cannot delete all scans: {e}"))?;
        let n = self
            .db
            .write(|t| t.scan_history.remove(&uid).map_or(0, |m| m.len()))
            .inspect_err(|e| error!("Failed to delete all scans: {e}"))?;
        info!("Deleted all {n} scans for {uid}");
        Ok(())
    }
}
