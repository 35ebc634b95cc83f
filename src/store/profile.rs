use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::auth::StoreContext;
use super::datastore::Datastore;
use crate::common::{now_ms, ScanError, ScanResult};

/// Upper bound for the base64 text of a profile photo, in KiB.
pub const DEFAULT_PHOTO_MAX_KB: usize = 200;

// User profile
//------------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_base64: String,
    pub created_at: i64,
    pub total_scans: u32,
}

impl UserProfile {
    /// Profile to store after an edit. `createdAt` and `totalScans` carry over
    /// from `current`; the photo carries over unless a new one is given.
    pub fn edited(
        current: Option<&UserProfile>,
        uid: &str,
        email: Option<&str>,
        display_name: &str,
        photo_base64: Option<String>,
    ) -> ScanResult<Self> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ScanError::InvalidProfile("Display name cannot be empty"));
        }
        Ok(Self {
            uid: uid.to_string(),
            email: email.unwrap_or_default().to_string(),
            display_name: display_name.to_string(),
            photo_base64: photo_base64
                .or_else(|| current.map(|p| p.photo_base64.clone()))
                .unwrap_or_default(),
            created_at: current.map_or_else(now_ms, |p| p.created_at),
            total_scans: current.map_or(0, |p| p.total_scans),
        })
    }
}

// Photo
//------------------------------------------------------------------------------

/// JPEG-encodes `img` and returns it as base64, lowering the quality in steps
/// of 10 until the text fits in `max_kb` KiB. Gives up lowering below 20.
pub fn encode_photo(img: &DynamicImage, max_kb: usize) -> ScanResult<String> {
    let rgb = img.to_rgb8();
    let mut quality = 100u8;
    loop {
        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, quality)
            .encode_image(&rgb)
            .map_err(|e| ScanError::Encode(e.to_string()))?;
        let encoded = STANDARD.encode(buf.into_inner());
        let size_kb = encoded.len() / 1024;
        debug!(quality, size_kb, "Compressed photo");

        if size_kb <= max_kb || quality <= 20 {
            info!(quality, size_kb, "Photo encoded");
            return Ok(encoded);
        }
        quality -= 10;
    }
}

/// Inverse of `encode_photo`. `None` on empty or undecodable input.
pub fn decode_photo(encoded: &str) -> Option<DynamicImage> {
    if encoded.is_empty() {
        warn!("Empty photo data");
        return None;
    }
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).inspect_err(|e| error!("Bad photo base64: {e}")).ok()?;
    let img = image::load_from_memory(&bytes).inspect_err(|e| error!("Bad photo image: {e}")).ok()?;
    debug!("Decoded photo {}x{}", img.width(), img.height());
    Some(img)
}

// Profile store
//------------------------------------------------------------------------------

pub trait ProfileStore: Send + Sync {
    fn get_profile(&self) -> ScanResult<Option<UserProfile>>;

    fn update_profile(&self, profile: &UserProfile) -> ScanResult<()>;

    /// Returns the new count.
    fn increment_scan_count(&self) -> ScanResult<u32>;
}

pub struct ProfileRepository {
    db: Arc<Datastore>,
    ctx: StoreContext,
}

impl ProfileRepository {
    pub fn new(db: Arc<Datastore>, ctx: StoreContext) -> Self {
        Self { db, ctx }
    }

    /// Validates the edit and stores it for the current user.
    pub fn save_edit(&self, display_name: &str, photo: Option<&DynamicImage>) -> ScanResult<UserProfile> {
        let uid = self.ctx.uid()?;
        let current = self.get_profile()?;
        let photo = photo.map(|p| encode_photo(p, DEFAULT_PHOTO_MAX_KB)).transpose()?;
        let email = self.ctx.email().or_else(|| current.as_ref().map(|p| p.email.clone()));
        let profile =
            UserProfile::edited(current.as_ref(), &uid, email.as_deref(), display_name, photo)?;
        self.update_profile(&profile)?;
        Ok(profile)
    }
}

impl ProfileStore for ProfileRepository {
    fn get_profile(&self) -> ScanResult<Option<UserProfile>> {
        let uid = self.ctx.uid().inspect_err(|e| error!("Cannot get profile: {e}"))?;
        let profile = self.db.read(|t| t.users.get(&uid).cloned())?;
        if profile.is_none() {
            debug!("No profile found for {uid}");
        }
        Ok(profile)
    }

    fn update_profile(&self, profile: &UserProfile) -> ScanResult<()> {
        let uid = self.ctx.uid().inspect_err(|e| error!("Cannot update profile: {e}"))?;
        let mut stored = profile.clone();
        stored.uid.clone_from(&uid);
        self.db
            .write(|t| t.users.insert(uid.clone(), stored))
            .inspect_err(|e| error!("Failed to update profile: {e}"))?;
        info!("Profile updated for {uid}");
        Ok(())
    }

    fn increment_scan_count(&self) -> ScanResult<u32> {
        let uid = self.ctx.uid()?;
        let count = self.db.write(|t| {
            let profile = t.users.entry(uid.clone()).or_insert_with(|| UserProfile {
                uid: uid.clone(),
                created_at: now_ms(),
                ..Default::default()
            });
            profile.total_scans += 1;
            profile.total_scans
        })?;
        debug!("Scan count for {uid} is now {count}");
        Ok(count)
    }
}

#[cfg(test)]
mod profile_tests {
    use std::sync::Arc;

    use image::{DynamicImage, Rgb, RgbImage};

    use super::{decode_photo, encode_photo, ProfileRepository, ProfileStore, UserProfile};
    use crate::common::{AppMode, ScanError};
    use crate::store::{Auth, Datastore, Identity, StoreContext};

    fn repo(auth: &Auth) -> ProfileRepository {
        ProfileRepository::new(
            Arc::new(Datastore::in_memory()),
            StoreContext::new(AppMode::Online, auth.clone()),
        )
    }

    fn noise(w: u32, h: u32) -> DynamicImage {
        let mut seed = 0x2545_f491_u32;
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |_, _| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let [r, g, b, _] = seed.to_le_bytes();
            Rgb([r, g, b])
        }))
    }

    #[test]
    fn test_edited_validates_and_carries_over() {
        assert_eq!(
            UserProfile::edited(None, "u1", None, "   ", None),
            Err(ScanError::InvalidProfile("Display name cannot be empty"))
        );

        let current = UserProfile {
            uid: "u1".into(),
            photo_base64: "abc".into(),
            created_at: 7,
            total_scans: 12,
            ..Default::default()
        };
        let p = UserProfile::edited(Some(&current), "u1", Some("a@b.co"), " Ada ", None).unwrap();
        assert_eq!(p.display_name, "Ada");
        assert_eq!(p.email, "a@b.co");
        assert_eq!(p.photo_base64, "abc");
        assert_eq!(p.created_at, 7);
        assert_eq!(p.total_scans, 12);

        let p = UserProfile::edited(Some(&current), "u1", None, "Ada", Some("new".into())).unwrap();
        assert_eq!(p.photo_base64, "new");
    }

    #[test]
    fn test_photo_round_trip() {
        let img = noise(32, 24);
        let encoded = encode_photo(&img, 200).unwrap();
        let decoded = decode_photo(&encoded).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
        assert!(decode_photo("").is_none());
        assert!(decode_photo("!!not base64!!").is_none());
        assert!(decode_photo("aGVsbG8=").is_none());
    }

    #[test]
    fn test_photo_shrinks_to_fit() {
        let img = noise(400, 400);
        let best = encode_photo(&img, usize::MAX).unwrap();
        let small = encode_photo(&img, 64).unwrap();
        assert!(small.len() < best.len());
    }

    #[test]
    fn test_profile_store() {
        let auth = Auth::signed_in(Identity::new("u1", Some("u1@example.com".into())));
        let repo = repo(&auth);
        assert_eq!(repo.get_profile().unwrap(), None);

        assert_eq!(repo.increment_scan_count().unwrap(), 1);
        assert_eq!(repo.increment_scan_count().unwrap(), 2);

        let saved = repo.save_edit("Ada", Some(&noise(8, 8))).unwrap();
        assert_eq!(saved.total_scans, 2);
        assert_eq!(saved.email, "u1@example.com");
        assert!(!saved.photo_base64.is_empty());
        assert_eq!(repo.get_profile().unwrap(), Some(saved));

        auth.sign_out();
        assert_eq!(repo.get_profile(), Err(ScanError::NotAuthenticated));
        assert_eq!(repo.increment_scan_count(), Err(ScanError::NotAuthenticated));
    }
}
