//! Replay scripts and the runner that drives them.
//!
//! A script is a RON list of steps applied to one fresh document:
//!
//! ```ron
//! (
//!     steps: [
//!         Type(block: 0, text: "milk"),
//!         Key(block: 0, key: Enter, shift: true, line: 0, column: 4),
//!         Type(block: 1, text: "eggs"),
//!         Title("Groceries"),
//!         Tags(["home"]),
//!         Wait(600),
//!         Flush,
//!     ],
//! )
//! ```
//!
//! Blocks are addressed by their position in display order at the time the
//! step runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use folio_doc::{CaretContext, EditingSession, Key, KeyEvent, KeyOutcome};
use folio_sync::{CloseOutcome, MemoryStore, SaveScheduler, SaveStatus, SyncConfig};
use folio_types::{BlockId, Document, GraphData};

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub enum Step {
    /// Replace the text of a block.
    Type { block: usize, text: String },
    /// Press a key with the caret at `line`/`column` of the block.
    Key {
        block: usize,
        key: Key,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        line: usize,
        #[serde(default)]
        column: usize,
    },
    Title(String),
    Tags(Vec<String>),
    /// Let time pass, in milliseconds.
    Wait(u64),
    Flush,
    /// Close the document; later steps are skipped.
    Close,
}

impl Script {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).context("invalid replay script")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_ron_str(&source)
    }
}

/// What a replay left behind.
#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub saves: usize,
    pub status: SaveStatus,
    pub closed: Option<CloseOutcome>,
    /// Stored document, `None` when closing deleted it.
    pub document: Option<Document>,
    pub graph: Option<GraphData>,
}

impl ReplayReport {
    pub fn render_text(&self) -> String {
        let mut out = format!("saves: {}\nstatus: {}\n", self.saves, self.status);
        if let Some(closed) = self.closed {
            out.push_str(&format!("closed: {closed:?}\n"));
        }
        match &self.document {
            Some(doc) => {
                out.push_str(&format!(
                    "document {} \"{}\" ({} blocks)\n",
                    doc.id.short(),
                    doc.label(),
                    doc.blocks.len()
                ));
                for block in &doc.blocks {
                    out.push_str(&format!("  [{}] {}\n", block.order_key, block.text().replace('\n', "⏎")));
                }
            }
            None => out.push_str("document: (deleted)\n"),
        }
        if let Some(graph) = &self.graph {
            out.push_str(&format!("graph: {} nodes, {} edges\n", graph.nodes.len(), graph.edges.len()));
        }
        out
    }
}

/// Run `script` against an in-memory backend.
pub async fn run(script: &Script, config: SyncConfig) -> Result<ReplayReport> {
    let store = Arc::new(MemoryStore::new());
    let scheduler = SaveScheduler::new(store.clone(), config);
    scheduler.load_graph().await?;

    let document = scheduler.create_document().await?;
    let id = document.id;
    let mut session = EditingSession::new(document);
    let mut closed = None;

    for (index, step) in script.steps.iter().enumerate() {
        tracing::debug!(step = index, ?step, "replay step");
        let changed = match step {
            Step::Type { block, text } => {
                let block = block_at(&session, *block)?;
                session.update_block_content(&block, text.as_str())?
            }
            Step::Key {
                block,
                key,
                shift,
                line,
                column,
            } => {
                let block = block_at(&session, *block)?;
                let text = session
                    .document()
                    .block(&block)
                    .map(|b| b.text().to_string())
                    .unwrap_or_default();
                let caret = CaretContext::from_text(&text, *line, *column);
                let event = if *shift {
                    KeyEvent::with_shift(*key)
                } else {
                    KeyEvent::plain(*key)
                };
                let outcome = session.handle_key(&block, &event, &caret)?;
                if outcome == KeyOutcome::Native {
                    tracing::debug!(step = index, "key left to the widget");
                }
                outcome.document_changed()
            }
            Step::Title(title) => session.set_title(Some(title.clone())),
            Step::Tags(tags) => session.set_tags(Some(tags.clone())),
            Step::Wait(ms) => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                false
            }
            Step::Flush => {
                scheduler.flush_save(Some(id)).await?;
                false
            }
            Step::Close => {
                closed = Some(scheduler.close_document(id).await?);
                if index + 1 < script.steps.len() {
                    tracing::warn!(skipped = script.steps.len() - index - 1, "steps after Close ignored");
                }
                break;
            }
        };
        if changed {
            scheduler.schedule_auto_save(session.document());
        }
    }

    Ok(ReplayReport {
        saves: store.save_count(),
        status: scheduler.status(),
        closed,
        document: store.document(id),
        graph: scheduler.graph().read().snapshot(),
    })
}

fn block_at(session: &EditingSession, index: usize) -> Result<BlockId> {
    let blocks = &session.document().blocks;
    match blocks.get(index) {
        Some(block) => Ok(block.id),
        None => bail!("block {index} out of range ({} blocks)", blocks.len()),
    }
}
