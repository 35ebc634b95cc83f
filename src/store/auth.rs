use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::{AppMode, Prefs, ScanError, ScanResult};

/// User id that owns all data in offline mode.
pub const LOCAL_UID: &str = "local";

// Identity
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: Option<String>) -> Self {
        Self { uid: uid.into(), email }
    }
}

// Auth
//------------------------------------------------------------------------------

/// Shared handle to the currently signed-in user. Clones see the same user.
#[derive(Debug, Clone, Default)]
pub struct Auth {
    current: Arc<RwLock<Option<Identity>>>,
}

impl Auth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        let auth = Self::new();
        auth.sign_in(identity);
        auth
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(uid = %identity.uid, "Signed in");
        *self.write() = Some(identity);
    }

    pub fn sign_out(&self) {
        if let Some(user) = self.write().take() {
            info!(uid = %user.uid, "Signed out");
        }
    }

    // Writes are single assignments, so a poisoned value is still whole.
    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Identity>> {
        self.current.write().unwrap_or_else(|e| {
            warn!("Recovering poisoned auth lock");
            e.into_inner()
        })
    }
}

/// Signs out and drops the persisted prefs, so the next session starts online
/// with no remembered user.
pub fn sign_out(auth: &Auth, data_dir: &Path) -> ScanResult<()> {
    auth.sign_out();
    Prefs::clear(data_dir)
}

// Store context
//------------------------------------------------------------------------------

/// Resolves which user a store operation acts for.
#[derive(Debug, Clone)]
pub struct StoreContext {
    pub mode: AppMode,
    pub auth: Auth,
}

impl StoreContext {
    pub fn new(mode: AppMode, auth: Auth) -> Self {
        Self { mode, auth }
    }

    pub fn uid(&self) -> ScanResult<String> {
        match self.mode {
            AppMode::Offline => Ok(LOCAL_UID.to_string()),
            AppMode::Online => {
                self.auth.current_user().map(|u| u.uid).ok_or(ScanError::NotAuthenticated)
            }
        }
    }

    pub fn email(&self) -> Option<String> {
        self.auth.current_user().and_then(|u| u.email)
    }
}

#[cfg(test)]
mod auth_tests {
    use super::{sign_out, Auth, Identity, StoreContext, LOCAL_UID};
    use crate::common::{AppMode, Prefs, ScanError};

    #[test]
    fn test_clones_share_user() {
        let auth = Auth::new();
        let other = auth.clone();
        assert_eq!(other.current_user(), None);
        auth.sign_in(Identity::new("u1", Some("u1@example.com".into())));
        assert_eq!(other.current_user().unwrap().uid, "u1");
        other.sign_out();
        assert_eq!(auth.current_user(), None);
    }

    #[test]
    fn test_survives_poisoned_lock() {
        let auth = Auth::signed_in(Identity::new("u1", None));
        let other = auth.clone();
        let res = std::thread::spawn(move || {
            let _guard = other.current.write().unwrap();
            panic!("panic while holding the auth lock");
        })
        .join();
        assert!(res.is_err());
        assert!(auth.current.is_poisoned());

        assert_eq!(auth.current_user().unwrap().uid, "u1");
        auth.sign_in(Identity::new("u2", None));
        assert_eq!(auth.current_user().unwrap().uid, "u2");
        auth.sign_out();
        assert_eq!(auth.current_user(), None);
    }

    #[test]
    fn test_uid_by_mode() {
        let auth = Auth::new();
        let online = StoreContext::new(AppMode::Online, auth.clone());
        let offline = StoreContext::new(AppMode::Offline, auth.clone());

        assert_eq!(online.uid(), Err(ScanError::NotAuthenticated));
        assert_eq!(offline.uid().unwrap(), LOCAL_UID);

        auth.sign_in(Identity::new("u1", None));
        assert_eq!(online.uid().unwrap(), "u1");
        assert_eq!(offline.uid().unwrap(), LOCAL_UID);
    }

    #[test]
    fn test_sign_out_clears_prefs() {
        let dir = tempfile::tempdir().unwrap();
        let identity = Identity::new("u1", None);
        Prefs { offline: true, user: Some(identity.clone()) }.save(dir.path()).unwrap();

        let auth = Auth::signed_in(identity);
        sign_out(&auth, dir.path()).unwrap();
        assert_eq!(auth.current_user(), None);
        assert_eq!(Prefs::load(dir.path()).unwrap(), None);
    }
}
