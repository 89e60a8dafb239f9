//! Integration tests for the save scheduler against a backend whose saves
//! can be held in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use folio_doc::{CaretContext, EditingSession, Key, KeyEvent};
use folio_sync::{
    MemoryStore, Persistence, PersistenceError, SaveEvent, SaveScheduler, SaveStatus, SyncConfig,
    SyncError,
};
use folio_types::{Document, DocumentGraphDelta, DocumentId, GraphData, NodeId, Response};

const DEBOUNCE: Duration = Duration::from_millis(500);
const PAST_DEBOUNCE: Duration = Duration::from_millis(600);
const TICK: Duration = Duration::from_millis(10);

/// Saves block until a permit is released with [`GatedStore::release`].
struct GatedStore {
    store: MemoryStore,
    gate: Semaphore,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn release(&self, saves: usize) {
        self.gate.add_permits(saves);
    }

    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Persistence for GatedStore {
    async fn save(
        &self,
        document: &Document,
    ) -> Result<Response<DocumentGraphDelta>, PersistenceError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();

        let result = self.store.save(document).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, id: DocumentId) -> Result<Response<DocumentId>, PersistenceError> {
        self.store.delete(id).await
    }

    async fn load(&self, id: DocumentId) -> Result<Response<Document>, PersistenceError> {
        self.store.load(id).await
    }

    async fn load_graph(&self) -> Result<Response<GraphData>, PersistenceError> {
        self.store.load_graph().await
    }
}

fn gated() -> (SaveScheduler, Arc<GatedStore>) {
    let store = Arc::new(GatedStore::new());
    let scheduler = SaveScheduler::new(store.clone(), SyncConfig::default());
    (scheduler, store)
}

fn in_memory() -> (SaveScheduler, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let scheduler = SaveScheduler::new(store.clone(), SyncConfig::default());
    (scheduler, store)
}

fn with_text(doc: &Document, text: &str) -> Document {
    let mut doc = doc.clone();
    doc.blocks[0].content = Some(text.to_string());
    doc
}

fn texts(saves: &[Document]) -> Vec<&str> {
    saves.iter().map(|d| d.blocks[0].text()).collect()
}

#[tokio::test(start_paused = true)]
async fn edits_during_save_trigger_one_follow_up_with_latest_content() {
    let (scheduler, store) = gated();
    let base = Document::new();

    scheduler.schedule_auto_save(&with_text(&base, "v1"));
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert_eq!(store.started(), 1);
    assert!(scheduler.is_saving(base.id));

    scheduler.schedule_auto_save(&with_text(&base, "v2"));
    scheduler.schedule_auto_save(&with_text(&base, "v3"));
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(store.started(), 1, "no second save while the first is in flight");

    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(store.started(), 2);

    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(texts(&store.store.saves_of(base.id)), vec!["v1", "v3"]);
    assert!(!scheduler.has_task(base.id));
    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_waits_for_in_flight_save() {
    let (scheduler, store) = gated();
    let doc = with_text(&Document::new(), "draft");
    let id = doc.id;

    scheduler.schedule_auto_save(&doc);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert!(scheduler.is_saving(id));

    let flush = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.flush_save(Some(id)).await }
    });
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!flush.is_finished());

    store.release(1);
    flush.await.unwrap().unwrap();
    assert_eq!(store.store.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_drains_follow_up_save() {
    let (scheduler, store) = gated();
    let base = Document::new();
    let id = base.id;

    scheduler.schedule_auto_save(&with_text(&base, "first"));
    tokio::time::sleep(PAST_DEBOUNCE).await;
    scheduler.schedule_auto_save(&with_text(&base, "second"));

    let flush = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.flush_save(Some(id)).await }
    });
    store.release(2);
    flush.await.unwrap().unwrap();

    assert_eq!(texts(&store.store.saves_of(base.id)), vec!["first", "second"]);
    assert!(!scheduler.has_task(base.id));
}

#[tokio::test(start_paused = true)]
async fn save_immediate_waits_for_in_flight_save() {
    let (scheduler, store) = gated();
    let base = Document::new();

    scheduler.schedule_auto_save(&with_text(&base, "auto"));
    tokio::time::sleep(PAST_DEBOUNCE).await;

    let explicit = tokio::spawn({
        let scheduler = scheduler.clone();
        let doc = with_text(&base, "explicit");
        async move { scheduler.save_immediate(&doc).await }
    });
    tokio::time::sleep(TICK).await;
    assert_eq!(store.started(), 1);

    store.release(2);
    explicit.await.unwrap().unwrap();
    assert_eq!(texts(&store.store.saves_of(base.id)), vec!["auto", "explicit"]);
    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn different_documents_save_in_parallel() {
    let (scheduler, store) = gated();
    let a = with_text(&Document::new(), "a");
    let b = with_text(&Document::new(), "b");

    scheduler.schedule_auto_save(&a);
    scheduler.schedule_auto_save(&b);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert_eq!(store.started(), 2);
    assert!(scheduler.is_saving(a.id) && scheduler.is_saving(b.id));

    store.release(2);
    tokio::time::sleep(TICK).await;
    assert_eq!(store.store.save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn status_follows_save_lifecycle() {
    let (scheduler, store) = gated();
    let doc = with_text(&Document::new(), "words");

    scheduler.schedule_auto_save(&doc);
    assert_eq!(scheduler.status(), SaveStatus::Idle);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert_eq!(scheduler.status(), SaveStatus::Saving);

    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(scheduler.status(), SaveStatus::Indexing);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(scheduler.status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn failed_auto_save_is_broadcast_and_parked() {
    let (scheduler, store) = in_memory();
    let mut events = scheduler.subscribe_events();
    let doc = with_text(&Document::new(), "unsaved");

    store.fail_next_save(PersistenceError::Transport("connection reset".into()));
    scheduler.schedule_auto_save(&doc);
    tokio::time::sleep(PAST_DEBOUNCE).await;

    match events.recv().await.unwrap() {
        SaveEvent::Failed { id, message } => {
            assert_eq!(id, doc.id);
            assert!(message.contains("connection reset"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(scheduler.pending_count(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.save_count(), 0, "failures are not retried on a timer");

    scheduler.flush_save(Some(doc.id)).await.unwrap();
    assert_eq!(store.save_count(), 1);
    assert_eq!(events.recv().await.unwrap(), SaveEvent::Saved { id: doc.id });
    assert!(!scheduler.has_task(doc.id));
}

#[tokio::test(start_paused = true)]
async fn rejected_save_leaves_ledger_untouched() {
    let (scheduler, store) = in_memory();
    let doc = with_text(&Document::new(), "text");

    store.reject_next_save("read-only");
    let err = scheduler.save_immediate(&doc).await.unwrap_err();
    match err {
        SyncError::Rejected {
            document_id,
            message,
        } => {
            assert_eq!(document_id, doc.id);
            assert_eq!(message, "read-only");
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    // Same content again still counts as unsaved.
    scheduler.schedule_auto_save(&doc);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert_eq!(store.save_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn saves_merge_tags_into_graph() {
    let (scheduler, _store) = in_memory();
    scheduler.load_graph().await.unwrap();

    let mut doc = Document::new();
    doc.title = Some("Trip".into());
    doc.tags = Some(vec!["travel".into()]);
    scheduler.save_immediate(&doc).await.unwrap();

    let graph = scheduler.graph();
    assert!(graph.read().node(&NodeId::tag("travel")).is_some());
    assert_eq!(graph.read().node(&doc.id.into()).unwrap().label, "Trip");

    doc.tags = None;
    scheduler.schedule_auto_save(&doc);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert!(graph.read().node(&NodeId::tag("travel")).is_none());
    assert_eq!(graph.read().edge_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn editing_session_changes_are_saved_once() {
    let (scheduler, store) = in_memory();
    let doc = scheduler.create_document().await.unwrap();
    let first = doc.blocks[0].id;
    let mut session = EditingSession::new(doc);

    session.update_block_content(&first, "shopping").unwrap();
    scheduler.schedule_auto_save(session.document());

    let outcome = session
        .handle_key(
            &first,
            &KeyEvent::with_shift(Key::Enter),
            &CaretContext::from_text("shopping", 0, 8),
        )
        .unwrap();
    assert!(outcome.document_changed());
    scheduler.schedule_auto_save(session.document());

    let second = session.focus().unwrap().block_id;
    session.update_block_content(&second, "milk").unwrap();
    scheduler.schedule_auto_save(session.document());

    tokio::time::sleep(PAST_DEBOUNCE).await;
    // One save from create_document, one for the whole burst.
    assert_eq!(store.save_count(), 2);
    let stored = store.document(session.document().id).unwrap();
    let contents: Vec<&str> = stored.blocks.iter().map(|b| b.text()).collect();
    assert_eq!(contents, vec!["shopping", "milk"]);
}

#[tokio::test(start_paused = true)]
async fn deleted_document_is_not_restored_by_late_save() {
    let (scheduler, store) = gated();
    scheduler.load_graph().await.unwrap();
    let mut events = scheduler.subscribe_events();

    let mut doc = with_text(&Document::new(), "plans");
    doc.tags = Some(vec!["work".into()]);
    scheduler.schedule_auto_save(&doc);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert!(scheduler.is_saving(doc.id));

    scheduler.on_document_deleted(doc.id);
    store.release(1);
    tokio::time::sleep(TICK).await;

    let graph = scheduler.graph();
    assert!(graph.read().node(&doc.id.into()).is_none());
    assert!(graph.read().node(&NodeId::tag("work")).is_none());
    assert_eq!(graph.read().edge_count(), 0);
    assert!(!scheduler.has_task(doc.id));
    assert!(events.try_recv().is_err(), "no event for a forgotten document");
}

#[tokio::test(start_paused = true)]
async fn reset_during_save_leaves_no_ledger_entry() {
    let (scheduler, store) = gated();
    let doc = with_text(&Document::new(), "scratch");

    scheduler.schedule_auto_save(&doc);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert!(scheduler.is_saving(doc.id));

    scheduler.reset();
    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(store.store.save_count(), 1);

    // The late save was not recorded, so the same content is still unsaved.
    scheduler.schedule_auto_save(&doc);
    assert!(scheduler.has_task(doc.id));
    store.release(1);
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert_eq!(store.store.save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn follow_up_tags_win_over_earlier_save() {
    let (scheduler, store) = gated();
    scheduler.load_graph().await.unwrap();
    let base = Document::new();

    let mut first = with_text(&base, "note");
    first.tags = Some(vec!["draft".into()]);
    scheduler.schedule_auto_save(&first);
    tokio::time::sleep(PAST_DEBOUNCE).await;

    let mut second = first.clone();
    second.tags = Some(vec!["final".into()]);
    scheduler.schedule_auto_save(&second);

    store.release(2);
    scheduler.flush_save(Some(base.id)).await.unwrap();

    let graph = scheduler.graph();
    assert!(graph.read().node(&NodeId::tag("final")).is_some());
    assert!(graph.read().node(&NodeId::tag("draft")).is_none());
    assert_eq!(graph.read().edge_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_save_with_newer_edits_retries_with_latest_content() {
    let (scheduler, store) = gated();
    let mut events = scheduler.subscribe_events();
    let base = Document::new();

    scheduler.schedule_auto_save(&with_text(&base, "v1"));
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert!(scheduler.is_saving(base.id));

    store.store.fail_next_save(PersistenceError::Unavailable);
    scheduler.schedule_auto_save(&with_text(&base, "v2"));
    store.release(1);
    tokio::time::sleep(TICK).await;

    assert!(matches!(events.recv().await.unwrap(), SaveEvent::Failed { .. }));
    assert_eq!(store.started(), 2, "follow-up starts without another edit");

    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(events.recv().await.unwrap(), SaveEvent::Saved { id: base.id });
    assert_eq!(texts(&store.store.saves_of(base.id)), vec!["v2"]);
    assert!(!scheduler.has_task(base.id));
}

#[tokio::test(start_paused = true)]
async fn edits_during_save_immediate_get_follow_up() {
    let (scheduler, store) = gated();
    let base = Document::new();

    let explicit = tokio::spawn({
        let scheduler = scheduler.clone();
        let doc = with_text(&base, "explicit");
        async move { scheduler.save_immediate(&doc).await }
    });
    tokio::time::sleep(TICK).await;
    assert!(scheduler.is_saving(base.id));

    scheduler.schedule_auto_save(&with_text(&base, "typed after"));
    store.release(1);
    explicit.await.unwrap().unwrap();

    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(
        texts(&store.store.saves_of(base.id)),
        vec!["explicit", "typed after"]
    );
    assert!(!scheduler.has_task(base.id));
    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_all_skips_saves_in_flight() {
    let (scheduler, store) = gated();
    let a = Document::new();
    let b = with_text(&Document::new(), "b");

    scheduler.schedule_auto_save(&with_text(&a, "a1"));
    tokio::time::sleep(PAST_DEBOUNCE).await;
    assert!(scheduler.is_saving(a.id));
    scheduler.schedule_auto_save(&with_text(&a, "a2"));
    scheduler.schedule_auto_save(&b);

    let flush = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.flush_save(None).await }
    });
    tokio::time::sleep(TICK).await;
    assert_eq!(store.started(), 2, "b starts at once, a is not restarted");

    // a's first save completes and its follow-up queues behind b.
    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(store.started(), 3);
    store.release(1);
    tokio::time::sleep(TICK).await;

    assert!(flush.is_finished(), "flush did not wait for a's follow-up");
    flush.await.unwrap().unwrap();
    assert!(scheduler.is_saving(a.id));
    assert_eq!(texts(&store.store.saves_of(b.id)), vec!["b"]);

    store.release(1);
    tokio::time::sleep(TICK).await;
    assert_eq!(texts(&store.store.saves_of(a.id)), vec!["a1", "a2"]);
}
