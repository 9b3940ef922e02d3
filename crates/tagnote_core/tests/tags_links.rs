use std::sync::{Arc, Barrier};
use std::thread;
use tagnote_core::db::open_db_in_memory;
use tagnote_core::{
    EntityKind, Note, NoteStore, RepoError, SqliteTagRepository, Tag, TagOrder, TagRepository,
    ValidationError, DEFAULT_TAG_COLOR,
};

fn link_count(store: &NoteStore, note_id: i64) -> usize {
    store
        .get_note_with_tags(note_id)
        .unwrap()
        .map_or(0, |composite| composite.tags.len())
}

#[test]
fn upserting_same_name_twice_returns_same_identity() {
    let store = NoteStore::open_in_memory().unwrap();
    let before = store.list_tags(TagOrder::NameAsc).unwrap().len();

    let first = store.upsert_tag_by_name("Work", None).unwrap();
    let second = store.upsert_tag_by_name("Work", Some("#FF0000")).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.color, DEFAULT_TAG_COLOR);
    assert_eq!(store.list_tags(TagOrder::NameAsc).unwrap().len(), before + 1);
}

#[test]
fn tag_names_are_case_sensitive() {
    let store = NoteStore::open_in_memory().unwrap();
    let upper = store.upsert_tag_by_name("Work", None).unwrap();
    let lower = store.upsert_tag_by_name("work", None).unwrap();
    assert_ne!(upper.id, lower.id);
    assert!(store.find_tag_by_name("WORK").unwrap().is_none());
    assert_eq!(store.find_tag_by_name("work").unwrap(), Some(lower));
}

#[test]
fn upsert_rejects_blank_name_and_bad_color() {
    let store = NoteStore::open_in_memory().unwrap();
    assert!(matches!(
        store.upsert_tag_by_name("  ", None).unwrap_err(),
        RepoError::Validation(ValidationError::EmptyTagName)
    ));
    assert!(matches!(
        store.upsert_tag_by_name("x", Some("blue")).unwrap_err(),
        RepoError::Validation(ValidationError::InvalidColor(_))
    ));
}

#[test]
fn list_tags_orders_by_name() {
    let store = NoteStore::open_in_memory().unwrap();
    for name in ["gamma", "alpha", "beta"] {
        store.upsert_tag_by_name(name, None).unwrap();
    }
    let names: Vec<_> = store
        .list_tags(TagOrder::NameAsc)
        .unwrap()
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn update_tag_renames_and_rejects_duplicate_name() {
    let store = NoteStore::open_in_memory().unwrap();
    let work = store.upsert_tag_by_name("Work", None).unwrap();
    store.upsert_tag_by_name("Home", None).unwrap();

    let renamed = Tag {
        name: "Job".to_string(),
        color: "#00FF00".to_string(),
        ..work.clone()
    };
    store.update_tag(&renamed).unwrap();
    assert_eq!(store.get_tag(work.id).unwrap(), Some(renamed.clone()));

    let clash = Tag {
        name: "Home".to_string(),
        ..renamed
    };
    assert!(matches!(
        store.update_tag(&clash).unwrap_err(),
        RepoError::ConstraintViolation(_)
    ));
}

#[test]
fn update_missing_tag_is_not_found() {
    let store = NoteStore::open_in_memory().unwrap();
    let ghost = Tag {
        id: 5,
        ..Tag::new("ghost")
    };
    assert!(matches!(
        store.update_tag(&ghost).unwrap_err(),
        RepoError::NotFound {
            entity: EntityKind::Tag,
            id: 5
        }
    ));
}

#[test]
fn linking_is_idempotent_and_unlink_removes_pair() {
    let store = NoteStore::open_in_memory().unwrap();
    let note_id = store.create_note(&Note::new("n", "c")).unwrap();
    let tag = store.upsert_tag_by_name("t", None).unwrap();

    assert!(store.link_note_tag(note_id, tag.id).unwrap());
    assert!(!store.link_note_tag(note_id, tag.id).unwrap());
    assert_eq!(link_count(&store, note_id), 1);

    assert!(store.unlink_note_tag(note_id, tag.id).unwrap());
    assert!(!store.unlink_note_tag(note_id, tag.id).unwrap());
    assert_eq!(link_count(&store, note_id), 0);
}

#[test]
fn linking_missing_note_is_constraint_violation() {
    let store = NoteStore::open_in_memory().unwrap();
    let tag = store.upsert_tag_by_name("t", None).unwrap();
    assert!(matches!(
        store.link_note_tag(1234, tag.id).unwrap_err(),
        RepoError::ConstraintViolation(_)
    ));
}

#[test]
fn concurrent_links_of_same_pair_produce_one_row() {
    let store = Arc::new(NoteStore::open_in_memory().unwrap());
    let note_id = store.create_note(&Note::new("n", "c")).unwrap();
    store.upsert_tag_by_name("a", None).unwrap();
    let tag_id = store.upsert_tag_by_name("b", None).unwrap().id;

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.link_note_tag(note_id, tag_id).unwrap()
            })
        })
        .collect();
    let inserted: Vec<bool> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(inserted.iter().filter(|value| **value).count(), 1);
    assert_eq!(link_count(&store, note_id), 1);
}

#[test]
fn delete_tag_cascades_links_but_keeps_notes() {
    let store = NoteStore::open_in_memory().unwrap();
    let note_id = store.create_note(&Note::new("n", "c")).unwrap();
    let tag = store.upsert_tag_by_name("t", None).unwrap();
    store.link_note_tag(note_id, tag.id).unwrap();

    store.delete_tag(tag.id).unwrap();

    assert!(store.get_tag(tag.id).unwrap().is_none());
    assert!(store.get_note(note_id).unwrap().is_some());
    assert_eq!(link_count(&store, note_id), 0);
}

#[test]
fn clear_links_removes_every_link_of_one_note() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO notes (title, content, category, created_at, updated_at)
         VALUES ('n', 'c', '', 0, 0), ('m', 'd', '', 0, 0);",
        [],
    )
    .unwrap();
    let repo = SqliteTagRepository::try_new(&mut conn).unwrap();
    let a = repo.upsert_tag_by_name("a", None).unwrap();
    let b = repo.upsert_tag_by_name("b", None).unwrap();
    repo.link_note_tag(1, a.id).unwrap();
    repo.link_note_tag(1, b.id).unwrap();
    repo.link_note_tag(2, a.id).unwrap();

    assert_eq!(repo.clear_note_tag_links(1).unwrap(), 2);
    assert_eq!(repo.clear_note_tag_links(1).unwrap(), 0);
    assert_eq!(repo.clear_note_tag_links(2).unwrap(), 1);
}
