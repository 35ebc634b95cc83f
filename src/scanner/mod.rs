pub mod classify;
pub mod debounce;
pub mod session;

pub use classify::{classify, is_web_url, open_action, url_candidate, OpenAction};
pub use debounce::{
    clear_prompt, on_scan, Action, DebounceState, Intervals, RESCAN_CONFIRMATION_THRESHOLD,
    SCAN_DEBOUNCE_INTERVAL,
};
pub use session::{ScanSession, SessionEvent, SessionHandle};
