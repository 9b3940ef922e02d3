//! View-state coordinator: live collections plus mediated writes.
//!
//! # Responsibility
//! - Publish four continuously-updated views: all notes (`id DESC`), notes
//!   filtered by the current query, all tags (by name) and all notes with
//!   their tags (`updated_at DESC`).
//! - Own the search query field (initially empty).
//! - Forward writes to the store worker without blocking the caller.
//!
//! # Invariants
//! - Views are re-derived after every committed store change; callers never
//!   re-fetch explicitly.
//! - A blank query makes the filtered view equal to the notes view, and
//!   clearing the query restores it synchronously.
//! - A filtered result computed for a query that is no longer current is
//!   discarded instead of published.
//! - Dropping the coordinator stops every read subscription; queued writes
//!   still complete.

use super::commands::{spawn_worker, StoreCommand};
use crate::model::note::{Note, NoteId};
use crate::model::note_with_tags::NoteWithTags;
use crate::model::tag::{NoteTagLink, Tag, TagId};
use crate::repo::note_repo::NoteOrder;
use crate::repo::tag_repo::TagOrder;
use crate::repo::{RepoError, RepoResult};
use crate::store::{NoteStore, StoreChange};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task;

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Failure of an awaited coordinator call.
#[derive(Debug)]
pub enum CoordinatorError {
    /// The store rejected the operation.
    Repo(RepoError),
    /// The worker stopped before answering.
    WorkerGone,
    /// A blocking store task panicked or was cancelled.
    TaskFailed(String),
}

impl CoordinatorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repo(err) if err.is_not_found())
    }
}

impl Display for CoordinatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::WorkerGone => write!(f, "store worker is no longer running"),
            Self::TaskFailed(message) => write!(f, "store task failed: {message}"),
        }
    }
}

impl Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CoordinatorError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

struct ViewSenders {
    notes: watch::Sender<Vec<Note>>,
    filtered_notes: watch::Sender<Vec<Note>>,
    tags: watch::Sender<Vec<Tag>>,
    notes_with_tags: watch::Sender<Vec<NoteWithTags>>,
}

/// Mediates between presentation code and the store.
///
/// Must be started inside a Tokio runtime.
pub struct ViewStateCoordinator {
    store: Arc<NoteStore>,
    commands: mpsc::UnboundedSender<StoreCommand>,
    query: watch::Sender<String>,
    views: Arc<ViewSenders>,
    shutdown: watch::Sender<()>,
}

impl ViewStateCoordinator {
    /// Spawns the store worker and the view refresher.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime.
    pub fn start(store: Arc<NoteStore>) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        spawn_worker(Arc::clone(&store), command_rx);

        let views = Arc::new(ViewSenders {
            notes: watch::channel(Vec::new()).0,
            filtered_notes: watch::channel(Vec::new()).0,
            tags: watch::channel(Vec::new()).0,
            notes_with_tags: watch::channel(Vec::new()).0,
        });
        let (query, query_rx) = watch::channel(String::new());
        let (shutdown, shutdown_rx) = watch::channel(());

        tokio::spawn(run_refresher(
            Arc::clone(&store),
            Arc::clone(&views),
            store.subscribe(),
            query_rx,
            shutdown_rx,
        ));
        info!("event=coordinator_start module=coordinator status=ok");

        Self {
            store,
            commands,
            query,
            views,
            shutdown,
        }
    }

    /// All notes, newest id first.
    pub fn notes(&self) -> watch::Receiver<Vec<Note>> {
        self.views.notes.subscribe()
    }

    /// Notes matching the current query (all notes when the query is blank).
    pub fn filtered_notes(&self) -> watch::Receiver<Vec<Note>> {
        self.views.filtered_notes.subscribe()
    }

    /// All tags ordered by name.
    pub fn tags(&self) -> watch::Receiver<Vec<Tag>> {
        self.views.tags.subscribe()
    }

    /// All notes with their tags, most recently edited first.
    pub fn notes_with_tags(&self) -> watch::Receiver<Vec<NoteWithTags>> {
        self.views.notes_with_tags.subscribe()
    }

    /// Live list of notes carrying `tag_id`. The subscription ends when the
    /// receiver or the coordinator is dropped.
    pub fn notes_with_tag(&self, tag_id: TagId) -> watch::Receiver<Vec<Note>> {
        let (tx, rx) = watch::channel(Vec::new());
        tokio::spawn(run_tag_subscription(
            Arc::clone(&self.store),
            tag_id,
            tx,
            self.store.subscribe(),
            self.shutdown.subscribe(),
        ));
        rx
    }

    /// Current query text.
    pub fn query(&self) -> String {
        self.query.borrow().clone()
    }

    /// Replaces the query. Never blocks; the filtered view converges
    /// asynchronously, except that a blank query applies immediately.
    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        let blank = query.trim().is_empty();
        self.query.send_replace(query);
        if blank {
            let all = self.views.notes.borrow().clone();
            self.views.filtered_notes.send_replace(all);
        }
    }

    pub fn clear_query(&self) {
        self.set_query(String::new());
    }

    pub fn create_note(&self, note: Note) {
        self.enqueue(StoreCommand::CreateNote(note));
    }

    pub fn update_note(&self, note: Note) {
        self.enqueue(StoreCommand::UpdateNote(note));
    }

    pub fn delete_note(&self, id: NoteId) {
        self.enqueue(StoreCommand::DeleteNote(id));
    }

    pub fn delete_all_notes(&self) {
        self.enqueue(StoreCommand::DeleteAllNotes);
    }

    /// Creates the tag unless one with the same name exists.
    pub fn create_tag(&self, name: impl Into<String>, color: Option<String>) {
        self.enqueue(StoreCommand::CreateTag {
            name: name.into(),
            color,
        });
    }

    pub fn update_tag(&self, tag: Tag) {
        self.enqueue(StoreCommand::UpdateTag(tag));
    }

    pub fn delete_tag(&self, id: TagId) {
        self.enqueue(StoreCommand::DeleteTag(id));
    }

    pub fn add_tag_to_note(&self, note_id: NoteId, tag_id: TagId) {
        self.enqueue(StoreCommand::Link(NoteTagLink::new(note_id, tag_id)));
    }

    pub fn remove_tag_from_note(&self, note_id: NoteId, tag_id: TagId) {
        self.enqueue(StoreCommand::Unlink(NoteTagLink::new(note_id, tag_id)));
    }

    /// Saves the note and replaces its tag set atomically; returns its id.
    ///
    /// Ordered after every write issued before it.
    pub async fn save_note_with_tags(
        &self,
        note: Note,
        tag_names: Vec<String>,
    ) -> CoordinatorResult<NoteId> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::SaveNoteWithTags {
            note,
            tag_names,
            reply,
        })?;
        await_reply(rx).await
    }

    pub async fn get_note(&self, id: NoteId) -> CoordinatorResult<Option<Note>> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::GetNote { id, reply })?;
        await_reply(rx).await
    }

    pub async fn get_note_with_tags(&self, id: NoteId) -> CoordinatorResult<Option<NoteWithTags>> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::GetNoteWithTags { id, reply })?;
        await_reply(rx).await
    }

    /// Resolves once every previously issued write has been applied.
    pub async fn flush(&self) -> CoordinatorResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Flush { reply })?;
        rx.await.map_err(|_| CoordinatorError::WorkerGone)
    }

    fn enqueue(&self, command: StoreCommand) {
        if self.send(command).is_err() {
            error!("event=coordinator_cmd module=coordinator status=error error_code=worker_gone");
        }
    }

    fn send(&self, command: StoreCommand) -> CoordinatorResult<()> {
        self.commands
            .send(command)
            .map_err(|_| CoordinatorError::WorkerGone)
    }
}

async fn await_reply<T>(rx: oneshot::Receiver<RepoResult<T>>) -> CoordinatorResult<T> {
    match rx.await {
        Ok(result) => result.map_err(CoordinatorError::from),
        Err(_) => Err(CoordinatorError::TaskFailed(
            "store task ended without a reply".to_string(),
        )),
    }
}

async fn load<T, F>(store: &Arc<NoteStore>, query: F) -> CoordinatorResult<T>
where
    T: Send + 'static,
    F: FnOnce(&NoteStore) -> RepoResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    task::spawn_blocking(move || query(&store))
        .await
        .map_err(|err| CoordinatorError::TaskFailed(err.to_string()))?
        .map_err(CoordinatorError::from)
}

fn log_refresh_failure(view: &'static str, err: &CoordinatorError) {
    warn!("event=view_refresh module=coordinator view={view} status=error error={err}");
}

async fn run_refresher(
    store: Arc<NoteStore>,
    views: Arc<ViewSenders>,
    mut changes: broadcast::Receiver<StoreChange>,
    mut query_rx: watch::Receiver<String>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    let mut pending = StoreChange::ALL;
    let mut query_dirty = true;

    loop {
        if !pending.is_empty() || query_dirty {
            refresh_views(&store, &views, pending, query_dirty, &mut query_rx).await;
            pending = StoreChange::NONE;
            query_dirty = false;
        }

        tokio::select! {
            _ = shutdown_rx.changed() => break,
            change = changes.recv() => match change {
                Ok(change) => pending = pending.union(change),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event=view_refresh module=coordinator status=lagged skipped={skipped}");
                    pending = StoreChange::ALL;
                }
                Err(RecvError::Closed) => break,
            },
            changed = query_rx.changed() => match changed {
                Ok(()) => query_dirty = true,
                Err(_) => break,
            },
        }

        // Coalesce a burst of writes into one refresh.
        loop {
            match changes.try_recv() {
                Ok(change) => pending = pending.union(change),
                Err(TryRecvError::Lagged(_)) => pending = StoreChange::ALL,
                Err(_) => break,
            }
        }
    }
    debug!("event=view_refresh module=coordinator status=stopped");
}

async fn refresh_views(
    store: &Arc<NoteStore>,
    views: &ViewSenders,
    pending: StoreChange,
    query_dirty: bool,
    query_rx: &mut watch::Receiver<String>,
) {
    if pending.notes {
        match load(store, |s| s.list_notes(NoteOrder::IdDesc)).await {
            Ok(notes) => {
                views.notes.send_replace(notes);
            }
            Err(err) => log_refresh_failure("notes", &err),
        }
    }

    if pending.tags {
        match load(store, |s| s.list_tags(TagOrder::NameAsc)).await {
            Ok(tags) => {
                views.tags.send_replace(tags);
            }
            Err(err) => log_refresh_failure("tags", &err),
        }
    }

    if pending.notes || pending.tags || pending.links {
        match load(store, |s| s.list_notes_with_tags(NoteOrder::UpdatedAtDesc)).await {
            Ok(composites) => {
                views.notes_with_tags.send_replace(composites);
            }
            Err(err) => log_refresh_failure("notes_with_tags", &err),
        }
    }

    if pending.notes || query_dirty {
        refresh_filtered(store, views, query_rx).await;
    }
}

async fn refresh_filtered(
    store: &Arc<NoteStore>,
    views: &ViewSenders,
    query_rx: &mut watch::Receiver<String>,
) {
    let query = query_rx.borrow_and_update().clone();
    if query.trim().is_empty() {
        let all = views.notes.borrow().clone();
        views.filtered_notes.send_replace(all);
        return;
    }

    let needle = query.clone();
    match load(store, move |s| s.search_notes(&needle)).await {
        Ok(matches) => {
            // A newer query will trigger its own refresh.
            if *query_rx.borrow() == query {
                views.filtered_notes.send_replace(matches);
            }
        }
        Err(err) => log_refresh_failure("filtered_notes", &err),
    }
}

async fn run_tag_subscription(
    store: Arc<NoteStore>,
    tag_id: TagId,
    tx: watch::Sender<Vec<Note>>,
    mut changes: broadcast::Receiver<StoreChange>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    let mut dirty = true;
    loop {
        if dirty {
            match load(&store, move |s| s.list_notes_by_tag(tag_id)).await {
                Ok(notes) => {
                    tx.send_replace(notes);
                }
                Err(err) => log_refresh_failure("notes_with_tag", &err),
            }
            dirty = false;
        }

        tokio::select! {
            _ = tx.closed() => break,
            _ = shutdown_rx.changed() => break,
            change = changes.recv() => match change {
                Ok(change) => dirty = change.notes || change.links,
                Err(RecvError::Lagged(_)) => dirty = true,
                Err(RecvError::Closed) => break,
            },
        }
    }
}
