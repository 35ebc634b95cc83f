//! # qrscan
//!
//! Core of a QR scanning app: classifies decoded text, gates repeated detections of
//! the same code so history only grows when it should, keeps a per-user scan history
//! and profile, and generates QR images.
//!
//! ## Features
//!
//! - **Classification**: Maps decoded text to URL, email, phone or plain text
//! - **Debounce Gate**: Saves a code once per 5 s window and asks before saving a code
//!   that has stayed in view for more than 10 s
//! - **Scan Session**: Serialises frame results and prompt replies on one tokio task,
//!   with fire-and-forget saves and a cancellable rescan cooldown
//! - **History & Profile Stores**: User-scoped JSON document store, online or offline
//! - **QR Generation & Reading**: Builder over `qrcode` with zxing-style sizing, and
//!   frame/gallery decoding over `rqrr`
//!
//! ## Quick Start
//!
//! ### Classifying and Gating Scans
//!
//! ```rust
//! use qrscan::scanner::{classify, on_scan, Action, DebounceState};
//! use qrscan::ScanType;
//!
//! assert_eq!(classify("example.com"), ScanType::Url);
//! assert_eq!(classify("+1-555-0100"), ScanType::Phone);
//!
//! let mut state = DebounceState::new();
//! let t0 = 1_700_000_000_000;
//! assert!(matches!(on_scan("hello", t0, &mut state), Action::Persist(..)));
//! assert_eq!(on_scan("hello", t0 + 1000, &mut state), Action::Suppress);
//! assert!(matches!(on_scan("hello", t0 + 11_000, &mut state), Action::PromptRescan(..)));
//! ```
//!
//! ### Generating a QR Code
//!
//! ```rust
//! use qrscan::{ECLevel, QRBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = QRBuilder::new("https://example.com")
//!     .size(512)            // Output side in pixels, grown if the symbol doesn't fit
//!     .margin(2)            // Quiet zone in modules
//!     .ec_level(ECLevel::Q) // Defaults to ECLevel::M
//!     .build()?;
//!
//! assert_eq!(qrscan::reader::decode_frame(&img.into()), vec!["https://example.com"]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Running a Scan Session
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use qrscan::scanner::{Intervals, ScanSession, SessionEvent};
//! use qrscan::store::{Auth, Datastore, HistoryRepository, HistoryStore, StoreContext};
//! use qrscan::{AppMode, RawScanEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ctx = StoreContext::new(AppMode::Offline, Auth::new());
//! let history = Arc::new(HistoryRepository::new(Arc::new(Datastore::in_memory()), ctx));
//!
//! let mut session = ScanSession::start(Intervals::default(), history.clone());
//! session.submit(RawScanEvent::new("user@example.com", 0));
//! session.submit(RawScanEvent::new("user@example.com", 250));
//! session.stop().await;
//!
//! assert!(matches!(session.try_next_event(), Some(SessionEvent::Detected { .. })));
//! assert_eq!(history.list().unwrap().len(), 1);
//! # }
//! ```
//!
//! ## Modes
//!
//! - **Online**: Every store call acts for the signed-in user and fails with
//!   `NotAuthenticated` without one
//! - **Offline**: Data belongs to a fixed local user and lives in its own file
//!
//! The mode is part of [`Config`], loaded from `QRSCAN_*` environment variables and
//! the persisted prefs.

pub mod builder;
pub mod common;
pub mod reader;
pub mod scanner;
pub mod store;

pub use builder::{ECLevel, QRBuilder};
pub use common::{AppMode, Config, RawScanEvent, ScanError, ScanResult, ScanType};
