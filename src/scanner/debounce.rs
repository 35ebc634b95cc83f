use tracing::debug;

use super::classify::classify;
use crate::common::ScanType;

/// Minimum time between two saves of the identical scanned value.
pub const SCAN_DEBOUNCE_INTERVAL: i64 = 5000;
/// How long the same value must keep being detected before the user is asked
/// whether to save it again.
pub const RESCAN_CONFIRMATION_THRESHOLD: i64 = 10000;

// Action
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Action {
    Persist(String, ScanType),
    Suppress,
    PromptRescan(String, ScanType),
}

// Intervals
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Intervals {
    pub debounce_ms: i64,
    pub rescan_ms: i64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self { debounce_ms: SCAN_DEBOUNCE_INTERVAL, rescan_ms: RESCAN_CONFIRMATION_THRESHOLD }
    }
}

// Debounce state
//------------------------------------------------------------------------------

/// Per-session memory of the last saved value. Timestamps are not validated, a
/// clock going backwards only shortens or lengthens the windows.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct DebounceState {
    pub last_saved_value: Option<String>,
    pub last_saved_at_ms: i64,
    pub first_seen_at_ms: i64,
    pub rescan_prompt_shown: bool,
}

impl DebounceState {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, now_ms: i64) {
        self.last_saved_value = None;
        self.last_saved_at_ms = 0;
        self.rescan_prompt_shown = false;
        self.first_seen_at_ms = now_ms;
    }

    fn is_last_saved(&self, raw: &str) -> bool {
        self.last_saved_value.as_deref() == Some(raw)
    }

    fn record_save(&mut self, raw: &str, kind: ScanType, now_ms: i64) -> Action {
        self.last_saved_value = Some(raw.to_string());
        self.last_saved_at_ms = now_ms;
        if self.first_seen_at_ms == 0 {
            self.first_seen_at_ms = now_ms;
        }
        Action::Persist(raw.to_string(), kind)
    }
}

// Gate
//------------------------------------------------------------------------------

/// Decides what to do with one scan, using the default intervals.
pub fn on_scan(raw: &str, now_ms: i64, state: &mut DebounceState) -> Action {
    Intervals::default().on_scan(raw, now_ms, state)
}

impl Intervals {
    pub fn on_scan(&self, raw: &str, now_ms: i64, state: &mut DebounceState) -> Action {
        let kind = classify(raw);

        if !state.is_last_saved(raw) {
            state.reset(now_ms);
        } else {
            let since_first = now_ms.saturating_sub(state.first_seen_at_ms);
            let since_save = now_ms.saturating_sub(state.last_saved_at_ms);

            // A value that stays in view past the threshold gets one prompt
            // until the prompt is cleared or the value changes.
            if !state.rescan_prompt_shown && since_first > self.rescan_ms {
                state.rescan_prompt_shown = true;
                debug!(%kind, since_first, "Same value still in view, prompting rescan");
                return Action::PromptRescan(raw.to_string(), kind);
            }
            if since_save < self.debounce_ms {
                return Action::Suppress;
            }
        }

        debug!(%kind, "Persisting scan");
        state.record_save(raw, kind, now_ms)
    }

    /// Prompt accepted: forget the previous save and persist right away.
    pub fn force_persist(&self, raw: &str, now_ms: i64, state: &mut DebounceState) -> Action {
        *state = DebounceState::default();
        state.record_save(raw, classify(raw), now_ms)
    }
}

/// Prompt declined and its cooldown elapsed: allow the prompt to show again.
pub fn clear_prompt(state: &mut DebounceState) {
    state.rescan_prompt_shown = false;
}
