//! Integration tests for the data-access facade
//!
//! Runs the full facade against the embedded stores: in-memory for the
//! library rules, and a SQLite file in a temp directory for persistence.

use paradise_core::storage::local::keys;
use paradise_core::storage::KeyValueStore;
use paradise_core::{
    Api, AppConfig, ImageFile, ItemKey, ItemType, LibraryUpdate, LocalBackend, MemoryStore, NewBook, Notifier,
    ReadingStatus, SqliteStore, StatusSet,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Alerts(Mutex<Vec<String>>);

impl Alerts {
    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for Alerts {
    fn alert(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

fn memory_api() -> (Api, Arc<Alerts>) {
    let alerts = Arc::new(Alerts::default());
    let api = Api::new(Arc::new(LocalBackend::new(MemoryStore::new()))).with_notifier(alerts.clone());
    (api, alerts)
}

#[tokio::test]
async fn test_owned_then_want_is_one_entry() {
    let (api, _) = memory_api();
    let dune = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();

    api.add_to_user_library(1, dune.id, ReadingStatus::Owned).await.unwrap();
    api.add_to_user_library(1, dune.id, ReadingStatus::Want).await.unwrap();

    let library = api.list_user_books(1).await.unwrap();
    assert_eq!(library.len(), 1);
    assert_eq!(
        library[0].statuses().as_slice(),
        &[ReadingStatus::Owned, ReadingStatus::Want]
    );

    let stats = api.get_user_stats(1).await.unwrap();
    assert_eq!(stats.owned, 1);
    assert_eq!(stats.want_to_read, 1);
    assert_eq!(stats.total_books, 1);
}

#[tokio::test]
async fn test_want_then_owned_keeps_want_primary() {
    let (api, _) = memory_api();
    let dune = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();

    api.add_to_user_library(1, dune.id, ReadingStatus::Want).await.unwrap();
    api.add_to_user_library(1, dune.id, ReadingStatus::Owned).await.unwrap();

    let library = api.list_user_books(1).await.unwrap();
    assert_eq!(library.len(), 1);
    assert_eq!(library[0].status, Some(ReadingStatus::Want));
    assert_eq!(
        library[0].statuses().as_slice(),
        &[ReadingStatus::Want, ReadingStatus::Owned]
    );

    let stats = api.get_user_stats(1).await.unwrap();
    assert_eq!(stats.authors, 1);
    assert_eq!(stats.owned, 1);
    assert_eq!(stats.want_to_read, 1);
    assert_eq!(stats.total_books, 1);
}

#[tokio::test]
async fn test_statuses_accumulate_as_a_set() {
    let (api, _) = memory_api();
    let book = api.add_book(NewBook::new("Emma", "Jane Austen")).await.unwrap().unwrap();

    let sequence = [
        ReadingStatus::Want,
        ReadingStatus::Reading,
        ReadingStatus::Want,
        ReadingStatus::Read,
        ReadingStatus::Reading,
    ];
    for status in sequence {
        api.add_to_user_library(7, book.id, status).await.unwrap();
    }

    let entry = api.list_user_books(7).await.unwrap().remove(0);
    assert_eq!(
        entry.statuses(),
        StatusSet::from(vec![ReadingStatus::Want, ReadingStatus::Reading, ReadingStatus::Read])
    );
    assert_eq!(entry.status, Some(ReadingStatus::Want));
}

#[tokio::test]
async fn test_catalog_ids_are_unique() {
    let (api, _) = memory_api();
    for i in 0..25 {
        api.add_book(NewBook::new(format!("Book {}", i), "Author".to_string()))
            .await
            .unwrap();
    }

    let books = api.list_books().await.unwrap();
    let mut ids: Vec<i64> = books.iter().map(|b| b.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 25);
}

#[tokio::test]
async fn test_delete_book_leaves_library_snapshot() {
    let (api, _) = memory_api();
    let book = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();
    api.add_to_user_library(1, book.id, ReadingStatus::Owned).await.unwrap();

    assert!(api.delete_book(book.id).await.unwrap());
    assert!(api.get_book(book.id).await.unwrap().is_none());
    assert!(!api.delete_book(book.id).await.unwrap());

    let library = api.list_user_books(1).await.unwrap();
    assert_eq!(library.len(), 1);
    assert_eq!(library[0].book.title, "Dune");
}

#[tokio::test]
async fn test_empty_status_edit_is_rejected() {
    let (api, alerts) = memory_api();
    let book = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();
    api.add_to_user_library(1, book.id, ReadingStatus::Owned).await.unwrap();

    let update = LibraryUpdate {
        statuses: Some(StatusSet::new()),
        ..Default::default()
    };
    assert!(api.update_library_entry(1, book.id, update).await.unwrap().is_none());
    assert_eq!(alerts.all(), vec!["Please select at least one status!".to_string()]);
    assert!(api.list_user_books(1).await.unwrap()[0].has_status(ReadingStatus::Owned));
}

#[tokio::test]
async fn test_oversized_image_is_not_stored() {
    let (api, alerts) = memory_api();
    let image = ImageFile::new("huge.png", "image/png", vec![0; 5 * 1024 * 1024 + 1]);

    assert!(api.upload_image(&image, None).await.unwrap().is_none());
    assert_eq!(alerts.all().len(), 1);
    assert!(api.list_books().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_public_notes_never_leak_private_ones() {
    let (api, _) = memory_api();
    let key = ItemKey::Id(42);

    api.save_note(1, ItemType::Book, key.clone(), "loved it".to_string(), true)
        .await
        .unwrap();
    api.save_note(1, ItemType::Book, key.clone(), "spoilers".to_string(), false)
        .await
        .unwrap();
    api.save_note(2, ItemType::Book, key.clone(), "meh".to_string(), false)
        .await
        .unwrap();

    let public = api.get_public_notes(ItemType::Book, &key).await.unwrap();
    assert_eq!(public.len(), 1);
    assert!(public.iter().all(|n| n.is_public));
    assert_eq!(public[0].content, "loved it");

    let mine = api.get_notes(ItemType::Book, &key, 1).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(api
        .get_notes(ItemType::Author, &ItemKey::Name("Frank Herbert".to_string()), 1)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::builder().data_path(dir.path().join("paradise.db")).build();

    let book_id = {
        let api = Api::open(&config).await.unwrap();
        let book = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();
        api.add_to_user_library(1, book.id, ReadingStatus::Read).await.unwrap();
        book.id
    };

    let api = Api::open(&config).await.unwrap();
    assert_eq!(api.get_book(book_id).await.unwrap().unwrap().title, "Dune");
    assert!(api.list_user_books(1).await.unwrap()[0].has_status(ReadingStatus::Read));
    assert_eq!(api.reading_challenge(1).await.unwrap().completed, 1);
}

#[tokio::test]
async fn test_corrupt_catalog_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("paradise.db")).await.unwrap();
    store.set(keys::ALL_BOOKS, "{not json".to_string()).await.unwrap();

    let (alerts, api) = {
        let alerts = Arc::new(Alerts::default());
        let api = Api::new(Arc::new(LocalBackend::new(store))).with_notifier(alerts.clone());
        (alerts, api)
    };

    let err = api.list_books().await.unwrap_err();
    assert!(err.is_corruption());
    assert!(alerts.all().is_empty());
}

async fn sqlite_api(dir: &tempfile::TempDir) -> Arc<Api> {
    let store = SqliteStore::open(dir.path().join("paradise.db")).await.unwrap();
    Arc::new(Api::new(Arc::new(LocalBackend::new(store))))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_adds_make_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let api = sqlite_api(&dir).await;

    for round in 0..20 {
        let book_id = api
            .add_book(NewBook::new(format!("Book {}", round), "Author".to_string()))
            .await
            .unwrap()
            .unwrap()
            .id;

        let want = tokio::spawn({
            let api = api.clone();
            async move { api.add_to_user_library(1, book_id, ReadingStatus::Want).await }
        });
        let owned = tokio::spawn({
            let api = api.clone();
            async move { api.add_to_user_library(1, book_id, ReadingStatus::Owned).await }
        });
        want.await.unwrap().unwrap().unwrap();
        owned.await.unwrap().unwrap().unwrap();

        let entries: Vec<_> = api
            .list_user_books(1)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.book_id() == book_id)
            .collect();
        assert_eq!(entries.len(), 1, "round {}", round);
        assert_eq!(entries[0].statuses().len(), 2, "round {}", round);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_status_adds_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let api = sqlite_api(&dir).await;

    for round in 0..20 {
        let book_id = api
            .add_book(NewBook::new(format!("Book {}", round), "Author".to_string()))
            .await
            .unwrap()
            .unwrap()
            .id;
        api.add_to_user_library(1, book_id, ReadingStatus::Want).await.unwrap();

        let owned = tokio::spawn({
            let api = api.clone();
            async move { api.add_to_user_library(1, book_id, ReadingStatus::Owned).await }
        });
        let read = tokio::spawn({
            let api = api.clone();
            async move { api.add_to_user_library(1, book_id, ReadingStatus::Read).await }
        });
        owned.await.unwrap().unwrap().unwrap();
        read.await.unwrap().unwrap().unwrap();

        let entry = api
            .list_user_books(1)
            .await
            .unwrap()
            .into_iter()
            .find(|e| e.book_id() == book_id)
            .unwrap();
        let statuses = entry.statuses();
        assert_eq!(statuses.len(), 3, "round {}", round);
        assert_eq!(statuses.primary(), Some(ReadingStatus::Want));
        assert!(statuses.contains(ReadingStatus::Owned));
        assert!(statuses.contains(ReadingStatus::Read));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_edit_does_not_drop_concurrent_add() {
    let dir = tempfile::tempdir().unwrap();
    let api = sqlite_api(&dir).await;

    for round in 0..20 {
        let book_id = api
            .add_book(NewBook::new(format!("Book {}", round), "Author".to_string()))
            .await
            .unwrap()
            .unwrap()
            .id;
        api.add_to_user_library(1, book_id, ReadingStatus::Reading).await.unwrap();

        let progress = tokio::spawn({
            let api = api.clone();
            async move {
                let update = LibraryUpdate {
                    current_page: Some(10),
                    ..Default::default()
                };
                api.update_library_entry(1, book_id, update).await
            }
        });
        let owned = tokio::spawn({
            let api = api.clone();
            async move { api.add_to_user_library(1, book_id, ReadingStatus::Owned).await }
        });
        progress.await.unwrap().unwrap().unwrap();
        owned.await.unwrap().unwrap().unwrap();

        let entry = api
            .list_user_books(1)
            .await
            .unwrap()
            .into_iter()
            .find(|e| e.book_id() == book_id)
            .unwrap();
        assert_eq!(entry.current_page, Some(10), "round {}", round);
        assert!(entry.has_status(ReadingStatus::Owned), "round {}", round);
    }
}
