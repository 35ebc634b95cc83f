mod auth;
mod datastore;
mod history;
mod profile;

use std::sync::Arc;

pub use auth::{sign_out, Auth, Identity, StoreContext, LOCAL_UID};
pub use datastore::Datastore;
pub use history::{display_text, relative_time, HistoryEntry, HistoryRepository, HistoryStore};
pub use profile::{
    decode_photo, encode_photo, ProfileRepository, ProfileStore, UserProfile, DEFAULT_PHOTO_MAX_KB,
};

use crate::common::{Config, ScanResult};

/// History and profile stores sharing one datastore.
pub struct Stores {
    pub history: Arc<HistoryRepository>,
    pub profiles: ProfileRepository,
}

impl Stores {
    pub fn new(db: Datastore, ctx: StoreContext) -> Self {
        let db = Arc::new(db);
        Self {
            history: Arc::new(HistoryRepository::new(Arc::clone(&db), ctx.clone())),
            profiles: ProfileRepository::new(db, ctx),
        }
    }

    /// Opens the datastore file for the configured mode.
    pub fn open(config: &Config, auth: Auth) -> ScanResult<Self> {
        let db = Datastore::open(&config.store_path())?;
        Ok(Self::new(db, StoreContext::new(config.mode, auth)))
    }
}
