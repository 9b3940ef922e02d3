use std::sync::Arc;
use std::time::Duration;
use tagnote_core::{Note, NoteOrder, NoteStore, ViewStateCoordinator};
use tokio::sync::watch;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn wait_until<T: Clone>(rx: &mut watch::Receiver<T>, predicate: impl FnMut(&T) -> bool) -> T {
    timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("view did not converge in time")
        .expect("view sender dropped")
        .clone()
}

fn start() -> (Arc<NoteStore>, ViewStateCoordinator) {
    let store = Arc::new(NoteStore::open_in_memory().unwrap());
    let coordinator = ViewStateCoordinator::start(Arc::clone(&store));
    (store, coordinator)
}

fn tag_list(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fire_and_forget_create_is_pushed_to_notes_view() {
    let (_store, coordinator) = start();
    let mut notes = coordinator.notes();
    let mut filtered = coordinator.filtered_notes();

    coordinator.create_note(Note::new("first", "body"));
    coordinator.create_note(Note::new("second", "body"));

    let listed = wait_until(&mut notes, |list| list.len() == 2).await;
    assert_eq!(listed[0].title, "second");
    assert_eq!(listed[1].title, "first");
    let all = wait_until(&mut filtered, |list| list.len() == 2).await;
    assert_eq!(all, listed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn query_filters_and_clearing_restores_immediately() {
    let (_store, coordinator) = start();
    let mut notes = coordinator.notes();
    let mut filtered = coordinator.filtered_notes();
    coordinator.create_note(Note::new("Work plan", "q3"));
    coordinator.create_note(Note::new("Notes", "a workshop"));
    coordinator.create_note(Note::new("Play", "Fun"));
    let all = wait_until(&mut notes, |list| list.len() == 3).await;

    coordinator.set_query("wor");
    assert_eq!(coordinator.query(), "wor");
    let matches = wait_until(&mut filtered, |list| list.len() == 2).await;
    assert!(matches.iter().all(|note| note.title != "Play"));

    coordinator.clear_query();
    assert_eq!(*coordinator.filtered_notes().borrow(), all);
    assert_eq!(coordinator.query(), "");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn filtered_view_follows_data_changes_under_active_query() {
    let (_store, coordinator) = start();
    let mut filtered = coordinator.filtered_notes();
    coordinator.set_query("beta");

    coordinator.create_note(Note::new("alpha", "x"));
    coordinator.create_note(Note::new("beta", "y"));

    let matches = wait_until(&mut filtered, |list| list.len() == 1).await;
    assert_eq!(matches[0].title, "beta");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_with_tags_returns_id_and_updates_composite_and_tag_views() {
    let (_store, coordinator) = start();
    let mut tags = coordinator.tags();
    let mut composites = coordinator.notes_with_tags();

    let id = coordinator
        .save_note_with_tags(Note::new("A", "B"), tag_list(&["y", "x"]))
        .await
        .unwrap();

    let tag_names: Vec<_> = wait_until(&mut tags, |list| list.len() == 2)
        .await
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    assert_eq!(tag_names, vec!["x", "y"]);

    let listed = wait_until(&mut composites, |list| list.len() == 1).await;
    assert_eq!(listed[0].note.id, id);
    assert_eq!(listed[0].tag_names(), vec!["x", "y"]);

    let fetched = coordinator.get_note_with_tags(id).await.unwrap().unwrap();
    assert_eq!(fetched, listed[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_of_unknown_id_surfaces_not_found() {
    let (_store, coordinator) = start();
    let mut ghost = Note::new("A", "B");
    ghost.id = 404;

    let err = coordinator
        .save_note_with_tags(ghost, Vec::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writes_to_same_note_apply_in_issue_order() {
    let (_store, coordinator) = start();
    let id = coordinator
        .save_note_with_tags(Note::new("A", "B"), tag_list(&["x"]))
        .await
        .unwrap();

    let mut edited = coordinator.get_note(id).await.unwrap().unwrap();
    edited.title = "A2".to_string();
    coordinator.update_note(edited);
    coordinator.delete_note(id);
    coordinator.flush().await.unwrap();

    assert!(coordinator.get_note(id).await.unwrap().is_none());
    assert!(coordinator.get_note_with_tags(id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn creating_same_tag_twice_yields_one_tag() {
    let (_store, coordinator) = start();
    let mut tags = coordinator.tags();

    coordinator.create_tag("Work", None);
    coordinator.create_tag("Work", None);
    coordinator.flush().await.unwrap();

    let listed = wait_until(&mut tags, |list| !list.is_empty()).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Work");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notes_with_tag_subscription_tracks_links() {
    let (store, coordinator) = start();
    let id = coordinator
        .save_note_with_tags(Note::new("A", "B"), Vec::new())
        .await
        .unwrap();
    let tag = store.upsert_tag_by_name("work", None).unwrap();

    let mut tagged = coordinator.notes_with_tag(tag.id);
    coordinator.add_tag_to_note(id, tag.id);
    let listed = wait_until(&mut tagged, |list| list.len() == 1).await;
    assert_eq!(listed[0].id, id);

    coordinator.remove_tag_from_note(id, tag.id);
    wait_until(&mut tagged, |list| list.is_empty()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn queued_writes_complete_after_coordinator_is_dropped() {
    let (store, coordinator) = start();
    for idx in 0..3 {
        coordinator.create_note(Note::new(format!("note {idx}"), "body"));
    }
    drop(coordinator);

    timeout(WAIT, async {
        loop {
            if store.list_notes(NoteOrder::IdDesc).unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queued writes were not applied");
}
