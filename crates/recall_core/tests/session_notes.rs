use recall_core::{
    ActionError, InMemoryRemoteStore, RemoteErrorKind, RetryPolicy, Session, SessionConfig,
    StoreEvent,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::TryRecvError;

fn fast_config() -> SessionConfig {
    SessionConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        },
        ..SessionConfig::default()
    }
}

fn session_with(remote: &Arc<InMemoryRemoteStore>, config: SessionConfig) -> Session {
    Session::new(remote.clone(), config)
}

async fn seed(session: &Session, title: &str, content: &str) -> recall_core::Note {
    let created = session.add_note().await.unwrap();
    session
        .save_current_note(created.id, title, content)
        .await
        .unwrap()
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

#[tokio::test]
async fn add_note_prepends_selects_and_uses_default_title() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    let first = session.add_note().await.unwrap();
    let second = session.add_note().await.unwrap();

    assert_eq!(first.title, "Untitled Note");
    assert_eq!(first.content, "");
    assert_eq!(first.created_at, first.updated_at);
    assert!(!first.is_pinned && !first.is_archived);

    let store = session.store();
    let ids: Vec<_> = store.notes().iter().map(|note| note.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(store.selected_note_id(), Some(second.id));
    assert_eq!(store.selected_note().unwrap().id, second.id);
}

#[tokio::test]
async fn load_notes_never_caches_duplicate_ids() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    for _ in 0..3 {
        session.add_note().await.unwrap();
    }
    session.load_notes().await.unwrap();
    session.add_note().await.unwrap();
    session.load_notes().await.unwrap();

    let notes = session.store().notes();
    let unique: HashSet<_> = notes.iter().map(|note| note.id).collect();
    assert_eq!(notes.len(), 4);
    assert_eq!(unique.len(), 4);
}

#[tokio::test]
async fn blank_search_behaves_like_load_notes() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    seed(&session, "groceries", "milk").await;
    seed(&session, "travel", "passport").await;

    session.load_notes().await.unwrap();
    let loaded = session.store().notes();

    for query in ["", "   ", "\t\n"] {
        session.perform_search("travel").await.unwrap();
        assert_eq!(session.store().notes().len(), 1);

        session.perform_search(query).await.unwrap();
        assert_eq!(&*session.store().notes(), &*loaded);
        assert_eq!(&*session.store().search_query(), query);
    }
    assert_eq!(remote.call_count("search_notes"), 3);
}

#[tokio::test]
async fn search_matches_title_or_content_ignoring_case() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    let by_title = seed(&session, "Quarterly PLAN", "numbers").await;
    let by_content = seed(&session, "notes", "the plan is simple").await;
    seed(&session, "other", "nothing here").await;

    session.perform_search("plan").await.unwrap();
    let hits: HashSet<_> = session.store().notes().iter().map(|n| n.id).collect();
    assert_eq!(hits, HashSet::from([by_title.id, by_content.id]));
}

#[tokio::test]
async fn search_publishes_query_before_results() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    seed(&session, "alpha", "").await;

    let mut rx = session.store().subscribe();
    session.perform_search("alpha").await.unwrap();
    let events = drain(&mut rx);

    let query_at = events
        .iter()
        .position(|event| *event == StoreEvent::SearchQueryChanged)
        .unwrap();
    let notes_at = events
        .iter()
        .position(|event| *event == StoreEvent::NotesChanged)
        .unwrap();
    assert!(query_at < notes_at);
}

#[tokio::test]
async fn slower_earlier_search_never_overwrites_newer_one() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = Arc::new(session_with(&remote, fast_config()));
    seed(&session, "alpha report", "").await;
    seed(&session, "beta report", "").await;
    remote.set_search_latency("alpha", Duration::from_millis(100));
    remote.set_search_latency("beta", Duration::from_millis(10));

    let slow = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.perform_search("alpha").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.perform_search("beta").await.unwrap();
    slow.await.unwrap().unwrap();

    let store = session.store();
    assert_eq!(&*store.search_query(), "beta");
    let titles: Vec<_> = store.notes().iter().map(|n| n.title.clone()).collect();
    assert_eq!(titles, vec!["beta report".to_string()]);
}

#[tokio::test]
async fn failed_stale_search_is_discarded() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = Arc::new(session_with(
        &remote,
        SessionConfig {
            retry: RetryPolicy::none(),
            ..fast_config()
        },
    ));
    seed(&session, "alpha", "").await;
    seed(&session, "beta", "").await;
    remote.set_search_latency("alpha", Duration::from_millis(80));
    remote.fail_next("search_notes", RemoteErrorKind::Invalid, 1);

    let slow = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.perform_search("alpha").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    session.perform_search("beta").await.unwrap();

    assert!(slow.await.unwrap().is_ok());
    assert_eq!(&*session.store().search_query(), "beta");
    assert_eq!(session.store().notes().len(), 1);
}

#[tokio::test]
async fn save_replaces_cached_note_with_backend_copy() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    let created = session.add_note().await.unwrap();

    let saved = session
        .save_current_note(created.id, "Draft", "body")
        .await
        .unwrap();

    assert_eq!(saved.id, created.id);
    assert_eq!(saved.created_at, created.created_at);
    assert!(saved.updated_at >= created.updated_at);
    assert_eq!(session.store().note(created.id).unwrap(), saved);
    assert_eq!(session.store().selected_note().unwrap().title, "Draft");
}

#[tokio::test]
async fn saving_missing_note_reports_not_found_and_keeps_store() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    session.add_note().await.unwrap();
    let before = session.store().notes();

    let err = session
        .save_current_note(uuid::Uuid::new_v4(), "t", "c")
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Remote(ref remote) if remote.kind == RemoteErrorKind::NotFound));
    assert_eq!(&*session.store().notes(), &*before);
}

#[tokio::test]
async fn concurrent_saves_of_one_note_are_serialized() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = Arc::new(session_with(&remote, fast_config()));
    let id = session.add_note().await.unwrap().id;
    remote.set_latency("update_note", Duration::from_millis(40));

    let started_at = Instant::now();
    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.save_current_note(id, "one", "first").await })
    };
    let second = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.save_current_note(id, "two", "second").await })
    };
    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert!(started_at.elapsed() >= Duration::from_millis(80));
    let last = if second.updated_at >= first.updated_at {
        second
    } else {
        first
    };
    let cached = session.store().note(id).unwrap();
    session.load_notes().await.unwrap();
    let persisted = session.store().note(id).unwrap();
    assert_eq!(cached.content, persisted.content);
    assert_eq!(cached.content, last.content);
}

#[tokio::test]
async fn waiting_past_lock_timeout_is_a_concurrency_error() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = Arc::new(session_with(
        &remote,
        SessionConfig {
            mutation_lock_timeout_ms: 20,
            ..fast_config()
        },
    ));
    let id = session.add_note().await.unwrap().id;
    remote.set_latency("update_note", Duration::from_millis(150));

    let holder = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.save_current_note(id, "slow", "").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = session.remove_note(id).await.unwrap_err();
    assert!(matches!(err, ActionError::Concurrency { note_id, .. } if note_id == id));
    assert_eq!(err.kind_label(), "concurrency");

    holder.await.unwrap().unwrap();
    assert!(session.store().note(id).is_some());
}

#[tokio::test]
async fn remove_note_twice_is_idempotent_and_clears_selection() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    let note = session.add_note().await.unwrap();
    assert_eq!(session.store().selected_note_id(), Some(note.id));

    session.remove_note(note.id).await.unwrap();
    session.remove_note(note.id).await.unwrap();

    let store = session.store();
    assert!(store.notes().is_empty());
    assert_eq!(store.selected_note_id(), None);
    assert_eq!(store.selected_note(), None);
    assert_eq!(remote.call_count("delete_note"), 2);
}

#[tokio::test]
async fn selection_follows_note_changes() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    let a = session.add_note().await.unwrap();
    let b = session.add_note().await.unwrap();

    session.select_note(Some(a.id));
    assert_eq!(session.store().selected_note().unwrap().id, a.id);

    session.select_note(Some(uuid::Uuid::new_v4()));
    assert_eq!(session.store().selected_note(), None);

    session.select_note(None);
    assert_eq!(session.store().selected_note_id(), None);
    assert!(session.store().note(b.id).is_some());
}

#[tokio::test]
async fn unavailable_is_retried_and_conflict_is_not() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    let note = session.add_note().await.unwrap();

    remote.fail_next("get_all_notes", RemoteErrorKind::Unavailable, 2);
    session.load_notes().await.unwrap();
    assert_eq!(remote.call_count("get_all_notes"), 3);

    remote.fail_next("update_note", RemoteErrorKind::Conflict, 1);
    let err = session
        .save_current_note(note.id, "t", "c")
        .await
        .unwrap_err();
    assert_eq!(err.kind_label(), "conflict");
    assert_eq!(remote.call_count("update_note"), 1);
}

#[tokio::test]
async fn exhausted_retries_surface_unavailable_and_keep_store() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    session.add_note().await.unwrap();
    let before = session.store().notes();

    remote.fail_next("get_all_notes", RemoteErrorKind::Unavailable, 5);
    let err = session.load_notes().await.unwrap_err();

    assert!(matches!(err, ActionError::Remote(ref remote) if remote.kind == RemoteErrorKind::Unavailable));
    assert_eq!(remote.call_count("get_all_notes"), 3);
    assert_eq!(&*session.store().notes(), &*before);
}

#[tokio::test]
async fn pin_and_archive_flags_round_trip() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let session = session_with(&remote, fast_config());
    let note = session.add_note().await.unwrap();

    let pinned = session.toggle_pin(note.id).await.unwrap();
    assert!(pinned.is_pinned);
    let unpinned = session.toggle_pin(note.id).await.unwrap();
    assert!(!unpinned.is_pinned);

    let archived = session.set_note_archived(note.id, true).await.unwrap();
    assert!(archived.is_archived);
    let restored = session.toggle_archive(note.id).await.unwrap();
    assert!(!restored.is_archived);

    let pinned = session.set_note_pinned(note.id, true).await.unwrap();
    assert_eq!(session.store().note(note.id).unwrap(), pinned);
    assert!(pinned.updated_at >= note.updated_at);
}
