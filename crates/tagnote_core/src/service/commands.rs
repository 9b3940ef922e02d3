//! Ordered command queue between the coordinator and the store.
//!
//! # Invariants
//! - Commands are applied strictly in enqueue order, one at a time, so two
//!   writes to the same note or tag are never reordered.
//! - The worker drains every queued command before exiting, even after the
//!   coordinator is dropped.

use crate::model::note::{Note, NoteId};
use crate::model::note_with_tags::NoteWithTags;
use crate::model::tag::{NoteTagLink, Tag, TagId};
use crate::repo::{RepoError, RepoResult};
use crate::store::NoteStore;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task;

pub(crate) type Reply<T> = oneshot::Sender<RepoResult<T>>;

/// Work item applied by the store worker.
pub(crate) enum StoreCommand {
    CreateNote(Note),
    UpdateNote(Note),
    DeleteNote(NoteId),
    DeleteAllNotes,
    CreateTag {
        name: String,
        color: Option<String>,
    },
    UpdateTag(Tag),
    DeleteTag(TagId),
    Link(NoteTagLink),
    Unlink(NoteTagLink),
    SaveNoteWithTags {
        note: Note,
        tag_names: Vec<String>,
        reply: Reply<NoteId>,
    },
    GetNote {
        id: NoteId,
        reply: Reply<Option<Note>>,
    },
    GetNoteWithTags {
        id: NoteId,
        reply: Reply<Option<NoteWithTags>>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

impl StoreCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::CreateNote(_) => "create_note",
            Self::UpdateNote(_) => "update_note",
            Self::DeleteNote(_) => "delete_note",
            Self::DeleteAllNotes => "delete_all_notes",
            Self::CreateTag { .. } => "create_tag",
            Self::UpdateTag(_) => "update_tag",
            Self::DeleteTag(_) => "delete_tag",
            Self::Link(_) => "link_note_tag",
            Self::Unlink(_) => "unlink_note_tag",
            Self::SaveNoteWithTags { .. } => "save_note_with_tags",
            Self::GetNote { .. } => "get_note",
            Self::GetNoteWithTags { .. } => "get_note_with_tags",
            Self::Flush { .. } => "flush",
        }
    }

    /// Runs the command on a blocking thread. Fire-and-forget failures are
    /// logged here; awaited commands hand their result to the caller.
    fn apply(self, store: &NoteStore) {
        let op = self.name();
        let outcome = match self {
            Self::CreateNote(note) => store.create_note(&note).map(drop),
            Self::UpdateNote(note) => store.update_note(&note),
            Self::DeleteNote(id) => store.delete_note(id),
            Self::DeleteAllNotes => store.delete_all_notes().map(drop),
            Self::CreateTag { name, color } => {
                store.upsert_tag_by_name(&name, color.as_deref()).map(drop)
            }
            Self::UpdateTag(tag) => store.update_tag(&tag),
            Self::DeleteTag(id) => store.delete_tag(id),
            Self::Link(link) => store.link_note_tag(link.note_id, link.tag_id).map(drop),
            Self::Unlink(link) => store.unlink_note_tag(link.note_id, link.tag_id).map(drop),
            Self::SaveNoteWithTags {
                note,
                tag_names,
                reply,
            } => {
                let _ = reply.send(store.replace_note_with_tags(&note, &tag_names));
                Ok(())
            }
            Self::GetNote { id, reply } => {
                let _ = reply.send(store.get_note(id));
                Ok(())
            }
            Self::GetNoteWithTags { id, reply } => {
                let _ = reply.send(store.get_note_with_tags(id));
                Ok(())
            }
            Self::Flush { reply } => {
                let _ = reply.send(());
                Ok(())
            }
        };
        if let Err(err) = outcome {
            log_dropped_failure(op, &err);
        }
    }
}

fn log_dropped_failure(op: &'static str, err: &RepoError) {
    if err.is_not_found() {
        warn!(
            "event=coordinator_cmd module=coordinator op={op} status=noop error_code={}",
            err.code()
        );
    } else {
        error!(
            "event=coordinator_cmd module=coordinator op={op} status=error error_code={} error={}",
            err.code(),
            err
        );
    }
}

/// Spawns the single worker that applies queued commands in order.
pub(crate) fn spawn_worker(
    store: Arc<NoteStore>,
    mut commands: mpsc::UnboundedReceiver<StoreCommand>,
) {
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let op = command.name();
            let store = Arc::clone(&store);
            if let Err(err) = task::spawn_blocking(move || command.apply(&store)).await {
                error!(
                    "event=coordinator_cmd module=coordinator op={op} status=error error_code=task_failed error={err}"
                );
            }
        }
        info!("event=coordinator_worker module=coordinator status=stopped");
    });
}
