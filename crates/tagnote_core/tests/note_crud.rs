use std::thread;
use std::time::Duration;
use tagnote_core::db::open_db_in_memory;
use tagnote_core::{
    bootstrap, CoreConfig, EntityKind, Note, NoteOrder, NoteRepository, NoteStore, RepoError,
    SqliteNoteRepository, ValidationError,
};

#[test]
fn create_assigns_identity_and_timestamps_ignoring_supplied_id() {
    let store = NoteStore::open_in_memory().unwrap();
    let mut note = Note::new("A", "B").with_category("work");
    note.id = 42;
    note.created_at = 7;

    let id = store.create_note(&note).unwrap();
    assert_ne!(id, 42);

    let loaded = store.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.title, "A");
    assert_eq!(loaded.content, "B");
    assert_eq!(loaded.category, "work");
    assert!(loaded.created_at > 1_600_000_000_000);
    assert_eq!(loaded.created_at, loaded.updated_at);
    assert!(store.get_note(42).unwrap().is_none());
}

#[test]
fn update_refreshes_updated_at_and_keeps_created_at() {
    let store = NoteStore::open_in_memory().unwrap();
    let id = store.create_note(&Note::new("draft", "body")).unwrap();
    let created = store.get_note(id).unwrap().unwrap();

    thread::sleep(Duration::from_millis(5));
    let mut edited = created.clone();
    edited.title = "final".to_string();
    edited.created_at = 0;
    store.update_note(&edited).unwrap();

    let loaded = store.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.title, "final");
    assert_eq!(loaded.created_at, created.created_at);
    assert!(loaded.updated_at > created.updated_at);
}

#[test]
fn update_missing_note_is_not_found_and_changes_nothing() {
    let store = NoteStore::open_in_memory().unwrap();
    let mut ghost = Note::new("ghost", "body");
    ghost.id = 99;

    let err = store.update_note(&ghost).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: EntityKind::Note,
            id: 99
        }
    ));
    assert!(store.list_notes(NoteOrder::IdDesc).unwrap().is_empty());
}

#[test]
fn create_rejects_blank_title_or_content() {
    let store = NoteStore::open_in_memory().unwrap();
    let err = store.create_note(&Note::new(" ", "body")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::EmptyTitle)
    ));
    let err = store.create_note(&Note::new("title", "")).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::EmptyContent)
    ));
}

#[test]
fn list_notes_defaults_to_newest_id_first() {
    let store = NoteStore::open_in_memory().unwrap();
    let first = store.create_note(&Note::new("first", "1")).unwrap();
    let second = store.create_note(&Note::new("second", "2")).unwrap();

    let ids: Vec<_> = store
        .list_notes(NoteOrder::default())
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(ids, vec![second, first]);
}

#[test]
fn search_matches_title_or_content_case_insensitively() {
    let store = NoteStore::open_in_memory().unwrap();
    let plan = store.create_note(&Note::new("Work plan", "q3")).unwrap();
    let shop = store
        .create_note(&Note::new("Notes", "went to a WORKSHOP today"))
        .unwrap();
    store.create_note(&Note::new("Play", "Fun")).unwrap();

    let ids: Vec<_> = store
        .search_notes("wor")
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(ids, vec![shop, plan]);
}

#[test]
fn empty_search_equals_list_notes() {
    let store = NoteStore::open_in_memory().unwrap();
    store.create_note(&Note::new("one", "1")).unwrap();
    store.create_note(&Note::new("two", "2")).unwrap();

    assert_eq!(
        store.search_notes("").unwrap(),
        store.list_notes(NoteOrder::IdDesc).unwrap()
    );
}

#[test]
fn search_treats_like_wildcards_literally() {
    let store = NoteStore::open_in_memory().unwrap();
    store.create_note(&Note::new("50% off", "sale")).unwrap();
    store.create_note(&Note::new("500 items", "stock")).unwrap();

    let hits = store.search_notes("0%").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "50% off");
}

#[test]
fn delete_all_notes_reports_removed_count() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteNoteRepository::try_new(&mut conn).unwrap();
    repo.create_note(&Note::new("a", "1")).unwrap();
    repo.create_note(&Note::new("b", "2")).unwrap();

    assert_eq!(repo.delete_all_notes().unwrap(), 2);
    assert!(repo.list_notes(NoteOrder::IdDesc).unwrap().is_empty());
}

#[test]
fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig::with_file(dir.path().join("notes.db"));

    let id = {
        let store = bootstrap(&config).unwrap();
        store.create_note(&Note::new("kept", "on disk")).unwrap()
    };

    let reopened = bootstrap(&config).unwrap();
    let loaded = reopened.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.title, "kept");
}
