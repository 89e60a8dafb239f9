//! Aggregate save status for the UI.
//!
//! ```text
//!            begin_save (active 0→1)
//!   Idle ─────────────────────────────▶ Saving
//!    ▲                                   │ last SaveActivity dropped
//!    │  hold elapsed                     ▼
//!    └──────────────────────────────── Indexing
//!                    begin_save during the hold cancels the revert
//! ```
//!
//! Only non-blank documents take a [`SaveActivity`], so saving an empty
//! note never flashes the indicator.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    /// Saves finished; the backend is still indexing them.
    Indexing,
}

/// Shared counter of in-flight saves. Cheap to clone.
#[derive(Clone)]
pub struct SaveStatusTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    tx: watch::Sender<SaveStatus>,
    hold: Duration,
}

#[derive(Default)]
struct TrackerState {
    active: usize,
    revert: Option<CancellationToken>,
}

/// Held for the duration of one counted save. Dropping it ends the save.
#[must_use = "the save ends as soon as the activity is dropped"]
pub struct SaveActivity {
    inner: Arc<TrackerInner>,
}

impl SaveStatusTracker {
    /// `hold` is how long `Indexing` is shown before returning to `Idle`.
    pub fn new(hold: Duration) -> Self {
        let (tx, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState::default()),
                tx,
                hold,
            }),
        }
    }

    pub fn status(&self) -> SaveStatus {
        *self.inner.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.tx.subscribe()
    }

    pub fn active_saves(&self) -> usize {
        self.inner.state.lock().active
    }

    pub fn begin_save(&self) -> SaveActivity {
        {
            let mut state = self.inner.state.lock();
            state.active += 1;
            if let Some(revert) = state.revert.take() {
                revert.cancel();
            }
            self.inner.tx.send_replace(SaveStatus::Saving);
        }
        SaveActivity {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Drop straight to `Idle`, cancelling any pending revert. In-flight
    /// activities still count down normally.
    pub fn force_idle(&self) {
        let mut state = self.inner.state.lock();
        if let Some(revert) = state.revert.take() {
            revert.cancel();
        }
        self.inner.tx.send_replace(SaveStatus::Idle);
    }
}

impl TrackerInner {
    fn end_save(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        if state.active > 0 {
            return;
        }

        self.tx.send_replace(SaveStatus::Indexing);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.tx.send_replace(SaveStatus::Idle);
            return;
        };

        let token = CancellationToken::new();
        state.revert = Some(token.clone());
        let weak: Weak<TrackerInner> = Arc::downgrade(self);
        let hold = self.hold;
        handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(hold) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.revert_to_idle(&token);
                    }
                }
            }
        });
    }

    fn revert_to_idle(&self, token: &CancellationToken) {
        let mut state = self.state.lock();
        // A begin_save since the spawn cancelled this token under the lock.
        if token.is_cancelled() || state.active > 0 {
            return;
        }
        state.revert = None;
        self.tx.send_replace(SaveStatus::Idle);
    }
}

impl Drop for SaveActivity {
    fn drop(&mut self) {
        self.inner.end_save();
    }
}
