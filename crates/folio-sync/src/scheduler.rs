//! Debounced, coalescing save scheduler.
//!
//! Each document has at most one save task, which is either waiting on a
//! debounce timer (`Pending`) or has a persistence call in flight (`Saving`).
//! Edits that arrive while a save is in flight are buffered into the task and
//! saved right after it completes, so at most one save per document is ever
//! outstanding and the last edit always lands.
//!
//! ```text
//!   SaveScheduler (Clone)        mpsc (id, generation)       worker task
//!   ┌──────────────────────┐   timer fires  ─────────▶   ┌──────────────────┐
//!   │ .schedule_auto_save()│                             │ spawn run(ticket)│
//!   │ .save_immediate()    │ ──── run(ticket) ────────▶  │ per fired timer  │
//!   │ .flush_save()        │                             └──────────────────┘
//!   └──────────────────────┘
//!
//!            schedule (debounce)          timer / flush
//!   (none) ─────────────────▶ Pending ───────────────────▶ Saving
//!      ▲                        ▲  │                         │
//!      │                        │  │ content == ledger       │ edits during save
//!      │                        │  ▼                         │ → Pending (0 delay)
//!      └────────────────────────┴─ removed ◀─────────────────┘ unchanged → removed
//! ```
//!
//! The ledger maps each document to the fingerprint of its last successful
//! save. Failed saves do not touch it; the task is parked as `Pending` with no
//! timer until the next edit or flush. A save that completes after its
//! document was forgotten or the scheduler reset updates neither the ledger
//! nor the graph.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use folio_types::{Document, DocumentId};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::fingerprint::Fingerprint;
use crate::graph::{GraphStore, SharedGraph};
use crate::persistence::Persistence;
use crate::status::{SaveStatus, SaveStatusTracker};

const EVENT_CAPACITY: usize = 64;

/// Outcome of a save, broadcast to subscribers.
///
/// Timer-driven saves have no caller to return an error to; hosts learn
/// about their failures here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveEvent {
    Saved { id: DocumentId },
    Failed { id: DocumentId, message: String },
}

// ============================================================================
// Task state (internal)
// ============================================================================

struct PendingTimer {
    generation: u64,
    cancel: CancellationToken,
}

enum Phase {
    Pending { timer: Option<PendingTimer> },
    Saving { run: u64, done: watch::Receiver<bool> },
}

struct SaveTask {
    /// Latest content to persist.
    document: Document,
    fingerprint: Fingerprint,
    phase: Phase,
}

impl SaveTask {
    fn pending(document: Document, fingerprint: Fingerprint, timer: Option<PendingTimer>) -> Self {
        Self {
            document,
            fingerprint,
            phase: Phase::Pending { timer },
        }
    }

    fn is_saving(&self) -> bool {
        matches!(self.phase, Phase::Saving { .. })
    }

    fn cancel_timer(&mut self) {
        if let Phase::Pending { timer } = &mut self.phase {
            if let Some(timer) = timer.take() {
                timer.cancel.cancel();
            }
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    tasks: HashMap<DocumentId, SaveTask>,
    /// Fingerprint of the last successful save per document.
    ledger: HashMap<DocumentId, Fingerprint>,
    next_generation: u64,
}

impl SchedulerState {
    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

#[derive(Clone, Copy, Debug)]
enum Trigger {
    /// Debounce timer fired with this generation.
    Timer(u64),
    Flush,
    /// Explicit save; runs even when content matches the ledger.
    Immediate,
}

/// Everything a started save needs, taken out of the lock.
struct RunTicket {
    id: DocumentId,
    run: u64,
    document: Document,
    fingerprint: Fingerprint,
    done: watch::Sender<bool>,
}

enum Begin {
    /// Nothing to save.
    Idle,
    /// A save is already in flight; wait on this.
    Busy(watch::Receiver<bool>),
    Run(RunTicket),
}

struct Fired {
    id: DocumentId,
    generation: u64,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Handle to the save scheduler. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SaveScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    persistence: Arc<dyn Persistence>,
    graph: SharedGraph,
    status: SaveStatusTracker,
    config: SyncConfig,
    state: Mutex<SchedulerState>,
    timer_tx: mpsc::UnboundedSender<Fired>,
    events: broadcast::Sender<SaveEvent>,
    runtime: Handle,
}

impl SaveScheduler {
    /// Create a scheduler with its own graph store and status tracker.
    ///
    /// Must be called from within a Tokio runtime; timers and saves are
    /// spawned onto it.
    pub fn new(persistence: Arc<dyn Persistence>, config: SyncConfig) -> Self {
        let status = SaveStatusTracker::new(config.indexing_hold());
        Self::with_parts(persistence, GraphStore::shared(), status, config)
    }

    /// Create a scheduler around an existing graph and status tracker.
    pub fn with_parts(
        persistence: Arc<dyn Persistence>,
        graph: SharedGraph,
        status: SaveStatusTracker,
        config: SyncConfig,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let runtime = Handle::current();
        let inner = Arc::new(Inner {
            persistence,
            graph,
            status,
            config,
            state: Mutex::new(SchedulerState::default()),
            timer_tx,
            events,
            runtime: runtime.clone(),
        });
        runtime.spawn(run_worker(Arc::downgrade(&inner), timer_rx));
        Self { inner }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn graph(&self) -> SharedGraph {
        Arc::clone(&self.inner.graph)
    }

    pub fn status_tracker(&self) -> &SaveStatusTracker {
        &self.inner.status
    }

    pub fn status(&self) -> SaveStatus {
        self.inner.status.status()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SaveEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.inner.persistence
    }

    /// Note that `document` changed. The save fires once edits have been
    /// quiet for the debounce window.
    pub fn schedule_auto_save(&self, document: &Document) {
        let id = document.id;
        let fingerprint = Fingerprint::of(document);

        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        if let Some(task) = state.tasks.get_mut(&id).filter(|t| t.is_saving()) {
            tracing::debug!(document = %id, "buffering edit behind in-flight save");
            task.document = document.clone();
            task.fingerprint = fingerprint;
            return;
        }

        if state.ledger.get(&id) == Some(&fingerprint) {
            if let Some(mut task) = state.tasks.remove(&id) {
                tracing::debug!(document = %id, "content back to saved state, dropping pending save");
                task.cancel_timer();
            }
            return;
        }

        let generation = state.generation();
        let timer = self.inner.arm_timer(id, generation, self.inner.config.debounce());
        match state.tasks.entry(id) {
            Entry::Occupied(mut entry) => {
                let task = entry.get_mut();
                task.cancel_timer();
                task.document = document.clone();
                task.fingerprint = fingerprint;
                task.phase = Phase::Pending { timer: Some(timer) };
                tracing::debug!(document = %id, generation, "debounce re-armed");
            }
            Entry::Vacant(entry) => {
                entry.insert(SaveTask::pending(document.clone(), fingerprint, Some(timer)));
                tracing::debug!(document = %id, generation, "debounce armed");
            }
        }
    }

    /// Persist `document` now, bypassing the debounce. Waits for any save of
    /// the same document that is already in flight.
    pub async fn save_immediate(&self, document: &Document) -> Result<(), SyncError> {
        let id = document.id;
        let fingerprint = Fingerprint::of(document);
        loop {
            let begin = {
                let mut guard = self.inner.state.lock();
                let state = &mut *guard;
                let in_flight = match state.tasks.get(&id).map(|t| &t.phase) {
                    Some(Phase::Saving { done, .. }) => Some(done.clone()),
                    _ => None,
                };
                match in_flight {
                    Some(done) => Begin::Busy(done),
                    None => {
                        let task = state.tasks.entry(id).or_insert_with(|| {
                            SaveTask::pending(document.clone(), fingerprint.clone(), None)
                        });
                        task.cancel_timer();
                        task.document = document.clone();
                        task.fingerprint = fingerprint.clone();
                        self.inner.begin(state, id, Trigger::Immediate)
                    }
                }
            };
            match begin {
                Begin::Busy(done) => wait_done(done).await,
                Begin::Run(ticket) => return self.inner.run(ticket).await,
                Begin::Idle => return Ok(()),
            }
        }
    }

    /// Save now whatever is outstanding.
    ///
    /// With `Some(id)`: a pending save runs immediately, an in-flight save is
    /// awaited, and any follow-up it leaves behind is run too. Returns once
    /// nothing unsaved remains for `id`, or on the first failure.
    ///
    /// With `None`: every pending task is flushed in parallel.
    pub async fn flush_save(&self, id: Option<DocumentId>) -> Result<(), SyncError> {
        match id {
            Some(id) => self.flush_one(id).await,
            None => {
                let ids: Vec<DocumentId> = {
                    let state = self.inner.state.lock();
                    state
                        .tasks
                        .iter()
                        .filter(|(_, t)| !t.is_saving())
                        .map(|(id, _)| *id)
                        .collect()
                };
                if ids.is_empty() {
                    return Ok(());
                }
                tracing::debug!(count = ids.len(), "flushing all pending saves");
                let results = futures::future::join_all(ids.into_iter().map(|id| self.flush_one(id))).await;
                results.into_iter().collect()
            }
        }
    }

    async fn flush_one(&self, id: DocumentId) -> Result<(), SyncError> {
        loop {
            let begin = {
                let mut guard = self.inner.state.lock();
                self.inner.begin(&mut guard, id, Trigger::Flush)
            };
            match begin {
                Begin::Idle => return Ok(()),
                Begin::Busy(done) => wait_done(done).await,
                Begin::Run(ticket) => self.inner.run(ticket).await?,
            }
        }
    }

    /// Drop every task and the ledger, cancel all timers, and force the
    /// status to idle. Saves already in flight complete but leave no trace.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        for task in state.tasks.values_mut() {
            task.cancel_timer();
        }
        state.tasks.clear();
        state.ledger.clear();
        drop(state);
        self.inner.status.force_idle();
        tracing::debug!("save scheduler reset");
    }

    /// Forget a document entirely (deleted elsewhere).
    pub(crate) fn forget(&self, id: DocumentId) {
        let mut state = self.inner.state.lock();
        if let Some(mut task) = state.tasks.remove(&id) {
            task.cancel_timer();
        }
        state.ledger.remove(&id);
    }

    /// Tasks waiting to save, including parked failures.
    pub fn pending_count(&self) -> usize {
        let state = self.inner.state.lock();
        state.tasks.values().filter(|t| !t.is_saving()).count()
    }

    pub fn is_saving(&self, id: DocumentId) -> bool {
        let state = self.inner.state.lock();
        state.tasks.get(&id).is_some_and(SaveTask::is_saving)
    }

    pub fn has_task(&self, id: DocumentId) -> bool {
        self.inner.state.lock().tasks.contains_key(&id)
    }
}

impl Inner {
    /// Spawn a cancellable delayed action that reports back to the worker.
    fn arm_timer(&self, id: DocumentId, generation: u64, delay: Duration) -> PendingTimer {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let tx = self.timer_tx.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Fired { id, generation });
                }
            }
        });
        PendingTimer { generation, cancel }
    }

    /// Decide whether a save can start and, if so, move the task to
    /// `Saving`. Called with the state lock held.
    fn begin(&self, state: &mut SchedulerState, id: DocumentId, trigger: Trigger) -> Begin {
        let run = state.generation();
        let Some(task) = state.tasks.get_mut(&id) else {
            return Begin::Idle;
        };

        let timer_generation = match &task.phase {
            Phase::Saving { done, .. } => return Begin::Busy(done.clone()),
            Phase::Pending { timer } => timer.as_ref().map(|t| t.generation),
        };
        if let Trigger::Timer(fired) = trigger {
            if timer_generation != Some(fired) {
                tracing::trace!(document = %id, fired, "stale timer ignored");
                return Begin::Idle;
            }
        }

        if !matches!(trigger, Trigger::Immediate) && state.ledger.get(&id) == Some(&task.fingerprint) {
            task.cancel_timer();
            state.tasks.remove(&id);
            tracing::debug!(document = %id, "already saved, nothing to do");
            return Begin::Idle;
        }

        task.cancel_timer();
        let (done_tx, done_rx) = watch::channel(false);
        task.phase = Phase::Saving { run, done: done_rx };
        Begin::Run(RunTicket {
            id,
            run,
            document: task.document.clone(),
            fingerprint: task.fingerprint.clone(),
            done: done_tx,
        })
    }

    /// Perform one persistence call and settle the task afterwards.
    #[tracing::instrument(name = "save.run", skip_all, fields(document = %ticket.id, run = ticket.run))]
    async fn run(&self, ticket: RunTicket) -> Result<(), SyncError> {
        let RunTicket {
            id,
            run,
            document,
            fingerprint,
            done,
        } = ticket;

        let activity = (!document.is_blank()).then(|| self.status.begin_save());

        let mut outcome = match self.persistence.save(&document).await {
            Ok(response) if response.success => Ok(response.data),
            Ok(response) => Err(SyncError::rejected(id, response.message)),
            Err(e) => Err(SyncError::from(e)),
        };

        // Settle under the state lock. The graph is merged before any
        // follow-up is armed so deltas land in save order.
        let ours = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let ours = state
                .tasks
                .get(&id)
                .is_some_and(|t| matches!(t.phase, Phase::Saving { run: r, .. } if r == run));
            if ours {
                if let Ok(delta) = &mut outcome {
                    state.ledger.insert(id, fingerprint.clone());
                    if let Some(delta) = delta.take() {
                        self.graph.write().upsert_document_graph(delta);
                    }
                }
                let follow_up = state.generation();
                let changed = state.tasks.get(&id).is_some_and(|t| t.fingerprint != fingerprint);
                if changed {
                    tracing::debug!(document = %id, "edits arrived during save, follow-up queued");
                    let timer = self.arm_timer(id, follow_up, Duration::ZERO);
                    if let Some(task) = state.tasks.get_mut(&id) {
                        task.phase = Phase::Pending { timer: Some(timer) };
                    }
                } else if outcome.is_ok() {
                    state.tasks.remove(&id);
                } else if let Some(task) = state.tasks.get_mut(&id) {
                    task.phase = Phase::Pending { timer: None };
                }
            }
            ours
        };

        let result = match outcome {
            Ok(_) if !ours => {
                tracing::debug!(document = %id, "document forgotten during save, result dropped");
                Ok(())
            }
            Ok(_) => {
                tracing::info!(document = %id, blocks = document.blocks.len(), "document saved");
                let _ = self.events.send(SaveEvent::Saved { id });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(document = %id, error = %e, "save failed");
                if ours {
                    let _ = self.events.send(SaveEvent::Failed {
                        id,
                        message: e.to_string(),
                    });
                }
                Err(e)
            }
        };

        drop(activity);
        done.send_replace(true);
        result
    }

    async fn on_timer(&self, fired: Fired) {
        let begin = {
            let mut guard = self.state.lock();
            self.begin(&mut guard, fired.id, Trigger::Timer(fired.generation))
        };
        if let Begin::Run(ticket) = begin {
            // Failure is already logged and broadcast by run().
            let _ = self.run(ticket).await;
        }
    }
}

/// Receives fired timers and starts their saves. Exits once every
/// scheduler handle is gone.
async fn run_worker(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Fired>) {
    while let Some(fired) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let runtime = inner.runtime.clone();
        runtime.spawn(async move {
            inner.on_timer(fired).await;
        });
    }
    tracing::trace!("save timer worker stopped");
}

async fn wait_done(mut done: watch::Receiver<bool>) {
    // A dropped sender also means the save is over.
    let _ = done.wait_for(|finished| *finished).await;
}
