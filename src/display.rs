//! The text currently shown on the display, and how it gets there.
//!
//! [`DisplayState`] holds the one current [`DisplayText`] behind a
//! `tokio::sync::watch` channel. Every update swaps in a fresh immutable
//! `Arc<DisplayText>`, so a [`DisplayState::snapshot`] is always a whole
//! value from a single update and never blocks behind rendering.
//!
//! The editor never touches the state directly. It publishes whole-text
//! replacements through an [`UpdatePublisher`]; [`run_updates`] drains the
//! channel and is the only code that calls [`DisplayState::update`].
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use framed::display::{run_updates, update_channel, DisplayState};
//!
//! let state = DisplayState::new("Hello");
//! let (publisher, updates) = update_channel();
//! let consumer = tokio::spawn(run_updates(updates, state.clone()));
//!
//! publisher.publish("Line one\nLine two").await.unwrap();
//! drop(publisher);
//! consumer.await.unwrap();
//!
//! assert_eq!(state.snapshot().lines, vec!["Line one", "Line two"]);
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, watch};

/// How many unapplied updates the channel holds before the editor waits.
pub const UPDATE_QUEUE_DEPTH: usize = 16;

/// Text to display plus when it last changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayText {
    /// Lines in display order. Never empty.
    pub lines: Vec<String>,

    /// When this text was applied
    pub last_updated: DateTime<Local>,

    /// Incremented on every update, starting at 0 for the initial text
    pub revision: u64,
}

impl DisplayText {
    /// Split `text` into lines, stamped with the current time.
    pub fn new(text: &str, revision: u64) -> Self {
        Self {
            lines: split_lines(text),
            last_updated: Local::now(),
            revision,
        }
    }

    /// Identifier that changes whenever the content changes.
    pub fn version(&self) -> String {
        format!("{}-{}", self.last_updated.timestamp(), self.revision)
    }
}

/// Split on `\n`, dropping a trailing `\r` from each line.
///
/// Always yields at least one line; an empty string becomes one empty line.
fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}

/// Shared handle on the current display text.
///
/// Cloning is cheap; all clones see the same state.
#[derive(Debug, Clone)]
pub struct DisplayState {
    current: Arc<watch::Sender<Arc<DisplayText>>>,
}

impl DisplayState {
    /// Create state holding `initial` as revision 0.
    pub fn new(initial: &str) -> Self {
        let (current, _) = watch::channel(Arc::new(DisplayText::new(initial, 0)));
        Self {
            current: Arc::new(current),
        }
    }

    /// Replace the current text. Concurrent updates are serialized; the last
    /// one applied wins.
    pub fn update(&self, text: &str) {
        self.current.send_modify(|current| {
            *current = Arc::new(DisplayText::new(text, current.revision + 1));
        });
    }

    /// The current text. The returned value never changes, even if an update
    /// is applied while it is in use.
    pub fn snapshot(&self) -> Arc<DisplayText> {
        Arc::clone(&self.current.borrow())
    }
}

/// The channel has no consumer any more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("display update channel closed")]
pub struct UpdateClosed;

/// Editor side of the update channel.
#[derive(Debug, Clone)]
pub struct UpdatePublisher {
    tx: mpsc::Sender<String>,
}

impl UpdatePublisher {
    /// Queue a whole-text replacement, waiting if the queue is full.
    pub async fn publish(&self, text: impl Into<String>) -> Result<(), UpdateClosed> {
        self.tx.send(text.into()).await.map_err(|_| UpdateClosed)
    }

    /// Like [`publish`](Self::publish), for editors running on a plain thread.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_publish(&self, text: impl Into<String>) -> Result<(), UpdateClosed> {
        self.tx.blocking_send(text.into()).map_err(|_| UpdateClosed)
    }
}

/// Consumer side of the update channel. See [`run_updates`].
#[derive(Debug)]
pub struct UpdateReceiver {
    rx: mpsc::Receiver<String>,
}

/// Create the editor-to-state hand-off.
pub fn update_channel() -> (UpdatePublisher, UpdateReceiver) {
    let (tx, rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);
    (UpdatePublisher { tx }, UpdateReceiver { rx })
}

/// Apply every published text to `state`, in order.
///
/// Returns once every [`UpdatePublisher`] has been dropped.
pub async fn run_updates(mut updates: UpdateReceiver, state: DisplayState) {
    while let Some(text) = updates.rx.recv().await {
        state.update(&text);
        let snapshot = state.snapshot();
        tracing::info!(
            lines = snapshot.lines.len(),
            revision = snapshot.revision,
            "Display text updated"
        );
    }
    tracing::info!("Editor closed, no further display updates");
}
