use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{
    self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::classify::{open_action, OpenAction};
use super::debounce::{clear_prompt, Action, DebounceState, Intervals};
use crate::common::{RawScanEvent, ScanError, ScanType};
use crate::store::{HistoryEntry, HistoryStore};

// Events
//------------------------------------------------------------------------------

/// What the session reports back to the screen driving it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SessionEvent {
    /// A scan that got past the gate, with what tapping it should do.
    Detected { content: String, kind: ScanType, open: OpenAction },
    Saved(HistoryEntry),
    SaveFailed { content: String, error: ScanError },
    /// Ask the user whether to save `content` again. Answer with
    /// [`SessionHandle::reply_rescan`].
    RescanPrompt { content: String, kind: ScanType },
}

enum Command {
    Scan(RawScanEvent),
    RescanReply { content: String, accept: bool, now_ms: i64 },
    CooldownElapsed(u64),
    Flush(oneshot::Sender<()>),
    Stop,
}

// Handle
//------------------------------------------------------------------------------

/// Cheap, cloneable sender side of a session, for frame callbacks running on
/// other tasks or threads. Sends after the session stopped are dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: UnboundedSender<Command>,
}

impl SessionHandle {
    pub fn submit(&self, event: RawScanEvent) -> bool {
        self.commands.send(Command::Scan(event)).is_ok()
    }

    /// Submits every result decoded from one frame, in order.
    pub fn submit_frame<I: IntoIterator<Item = String>>(&self, values: I, timestamp_ms: i64) {
        for value in values {
            self.submit(RawScanEvent::new(value, timestamp_ms));
        }
    }

    pub fn reply_rescan(&self, content: impl Into<String>, accept: bool, now_ms: i64) -> bool {
        let content = content.into();
        self.commands.send(Command::RescanReply { content, accept, now_ms }).is_ok()
    }
}

// Session
//------------------------------------------------------------------------------

/// One scanning screen. Owns the debounce state for its whole lifetime and
/// applies every scan and prompt reply in arrival order on a single task.
///
/// Must be started inside a tokio runtime. Dropping the session without
/// [`ScanSession::stop`] aborts it, including any pending cooldown.
pub struct ScanSession {
    handle: SessionHandle,
    events: UnboundedReceiver<SessionEvent>,
    task: Option<JoinHandle<DebounceState>>,
}

impl ScanSession {
    pub fn start(intervals: Intervals, store: Arc<dyn HistoryStore>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = Worker {
            intervals,
            state: DebounceState::new(),
            store,
            events: event_tx,
            commands: cmd_tx.downgrade(),
            cooldown: None,
            cooldown_gen: 0,
            open_prompt: None,
            pending: Vec::new(),
        };
        let task = tokio::spawn(worker.run(cmd_rx));
        Self { handle: SessionHandle { commands: cmd_tx }, events: event_rx, task: Some(task) }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn submit(&self, event: RawScanEvent) -> bool {
        self.handle.submit(event)
    }

    pub fn reply_rescan(&self, content: impl Into<String>, accept: bool, now_ms: i64) -> bool {
        self.handle.reply_rescan(content, accept, now_ms)
    }

    /// Waits until every command sent before this call has been applied, so
    /// the events they produce (except save results) can be read with
    /// [`ScanSession::try_next_event`]. `false` once the session has stopped.
    pub async fn flush(&self) -> bool {
        let (done, applied) = oneshot::channel();
        if self.handle.commands.send(Command::Flush(done)).is_err() {
            return false;
        }
        applied.await.is_ok()
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Ends the session after the queued commands and in-flight saves are done,
    /// and returns the final debounce state. Events already produced can still
    /// be drained afterwards.
    pub async fn stop(&mut self) -> Option<DebounceState> {
        let task = self.task.take()?;
        let _ = self.handle.commands.send(Command::Stop);
        task.await.inspect_err(|e| warn!("Scan session task failed: {e}")).ok()
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// Worker
//------------------------------------------------------------------------------

struct Worker {
    intervals: Intervals,
    state: DebounceState,
    store: Arc<dyn HistoryStore>,
    events: UnboundedSender<SessionEvent>,
    commands: WeakUnboundedSender<Command>,
    cooldown: Option<JoinHandle<()>>,
    cooldown_gen: u64,
    open_prompt: Option<String>,
    pending: Vec<JoinHandle<()>>,
}

impl Worker {
    async fn run(mut self, mut commands: UnboundedReceiver<Command>) -> DebounceState {
        info!("Scan session started");
        while let Some(cmd) = commands.recv().await {
            match cmd {
                Command::Scan(event) => self.on_scan(event),
                Command::RescanReply { content, accept, now_ms } => {
                    self.on_reply(content, accept, now_ms)
                }
                Command::CooldownElapsed(gen) if gen == self.cooldown_gen => {
                    debug!("Rescan cooldown elapsed");
                    self.cooldown = None;
                    clear_prompt(&mut self.state);
                }
                Command::CooldownElapsed(_) => {}
                Command::Flush(done) => {
                    let _ = done.send(());
                }
                Command::Stop => break,
            }
        }
        for save in self.pending.drain(..) {
            if let Err(e) = save.await {
                warn!("Scan save task failed: {e}");
            }
        }
        info!("Scan session ended");
        std::mem::take(&mut self.state)
    }

    fn on_scan(&mut self, event: RawScanEvent) {
        if self.open_prompt.as_ref().is_some_and(|p| *p != event.value) {
            debug!("Value changed, dropping open prompt");
            self.open_prompt = None;
        }
        let action = self.intervals.on_scan(&event.value, event.timestamp_ms, &mut self.state);
        self.dispatch(action);
    }

    /// Each prompt takes one answer. Replies for a value that is no longer the
    /// open prompt, or no longer the value in view, are dropped.
    fn on_reply(&mut self, content: String, accept: bool, now_ms: i64) {
        let open = self.open_prompt.as_deref() == Some(content.as_str())
            && self.state.last_saved_value.as_deref() == Some(content.as_str());
        if !open {
            debug!(accept, "Ignoring reply without an open prompt");
            return;
        }
        self.open_prompt = None;

        if accept {
            let action = self.intervals.force_persist(&content, now_ms, &mut self.state);
            self.dispatch(action);
            return;
        }

        self.cooldown_gen += 1;
        if let Some(prev) = self.cooldown.take() {
            prev.abort();
        }
        let gen = self.cooldown_gen;
        let commands = self.commands.clone();
        let delay = Duration::from_millis(self.intervals.rescan_ms.max(0) as u64);
        self.cooldown = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(Command::CooldownElapsed(gen));
            }
        }));
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::Suppress => {}
            Action::PromptRescan(content, kind) => {
                self.open_prompt = Some(content.clone());
                self.emit(SessionEvent::RescanPrompt { content, kind });
            }
            Action::Persist(content, kind) => {
                let open = open_action(&content, kind);
                self.emit(SessionEvent::Detected { content: content.clone(), kind, open });
                self.persist(content, kind);
            }
        }
    }

    fn persist(&mut self, content: String, kind: ScanType) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        self.pending.retain(|h| !h.is_finished());
        self.pending.push(tokio::task::spawn_blocking(move || {
            let event = match store.save(&content, kind) {
                Ok(entry) => SessionEvent::Saved(entry),
                Err(error) => {
                    warn!("{}", error.notice());
                    SessionEvent::SaveFailed { content, error }
                }
            };
            let _ = events.send(event);
        }));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Some(cooldown) = self.cooldown.take() {
            cooldown.abort();
        }
    }
}
