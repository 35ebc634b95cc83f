use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::history::HistoryEntry;
use super::profile::UserProfile;
use crate::common::{ScanError, ScanResult};

// Tree
//------------------------------------------------------------------------------

/// Document tree: `scan_history/{uid}/{id}` and `users/{uid}`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Tree {
    #[serde(default)]
    pub scan_history: BTreeMap<String, BTreeMap<String, HistoryEntry>>,
    #[serde(default)]
    pub users: BTreeMap<String, UserProfile>,
}

// Datastore
//------------------------------------------------------------------------------

/// JSON document store, optionally flushed to a file after every write.
pub struct Datastore {
    tree: Mutex<Tree>,
    path: Option<PathBuf>,
}

impl Datastore {
    pub fn in_memory() -> Self {
        Self { tree: Mutex::new(Tree::default()), path: None }
    }

    pub fn open(path: &Path) -> ScanResult<Self> {
        let tree = if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|e| ScanError::StoreReadFailure(format!("{}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| ScanError::StoreReadFailure(format!("{}: {e}", path.display())))?
        } else {
            Tree::default()
        };
        info!("Datastore opened at {}", path.display());
        Ok(Self { tree: Mutex::new(tree), path: Some(path.to_path_buf()) })
    }

    pub(crate) fn read<F, T>(&self, f: F) -> ScanResult<T>
    where
        F: FnOnce(&Tree) -> T,
    {
        let tree = self
            .tree
            .lock()
            .map_err(|e| ScanError::StoreReadFailure(format!("datastore lock poisoned: {e}")))?;
        Ok(f(&tree))
    }

    /// Applies `f` and flushes. A failed flush rolls the tree back.
    pub(crate) fn write<F, T>(&self, f: F) -> ScanResult<T>
    where
        F: FnOnce(&mut Tree) -> T,
    {
        let mut tree = self
            .tree
            .lock()
            .map_err(|e| ScanError::StoreWriteFailure(format!("datastore lock poisoned: {e}")))?;
        let before = self.path.as_ref().map(|_| tree.clone());
        let res = f(&mut tree);
        if let Err(e) = self.flush(&tree) {
            if let Some(before) = before {
                *tree = before;
            }
            return Err(e);
        }
        Ok(res)
    }

    fn flush(&self, tree: &Tree) -> ScanResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(tree)
            .map_err(|e| ScanError::StoreWriteFailure(e.to_string()))?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| ScanError::StoreWriteFailure(e.to_string()))?;
        }
        fs::write(path, raw)
            .map_err(|e| ScanError::StoreWriteFailure(format!("{}: {e}", path.display())))?;
        debug!("Datastore flushed to {}", path.display());
        Ok(())
    }
}
