// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Local backend over a key/value store
//!
//! Every collection is one JSON array stored under a well-known key:
//!
//! | Key                | Contents                               |
//! |--------------------|----------------------------------------|
//! | `allBooks`         | shared catalog (`Vec<Book>`)           |
//! | `userBooks_<id>`   | one user's library (`Vec<LibraryEntry>`) |
//! | `authors`          | author rows (`Vec<AuthorRecord>`)      |
//! | `notes_<id>`       | one user's notes (`Vec<Note>`)         |
//! | `users`            | accounts (`Vec<User>`)                 |
//! | `userData_<id>`    | legacy per-user blob                   |
//! | `publicNoteIndex`  | `"type:id"` -> public note references  |
//!
//! Writes are read-modify-write of a whole collection. A missing key reads
//! as an empty collection; a value that no longer parses is reported as
//! [`ParadiseError::CorruptCollection`] and never silently replaced.

use crate::error::{ParadiseError, Result};
use crate::storage::kv::KeyValueStore;
use crate::storage::models::*;
use crate::storage::Backend;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use futures_util::future::try_join_all;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Storage keys used by the local backend
pub mod keys {
    use crate::storage::models::UserId;

    pub const ALL_BOOKS: &str = "allBooks";
    pub const AUTHORS: &str = "authors";
    pub const USERS: &str = "users";
    pub const PUBLIC_NOTE_INDEX: &str = "publicNoteIndex";

    pub const USER_BOOKS_PREFIX: &str = "userBooks_";
    pub const NOTES_PREFIX: &str = "notes_";
    pub const USER_DATA_PREFIX: &str = "userData_";

    pub fn user_books(user_id: UserId) -> String {
        format!("{}{}", USER_BOOKS_PREFIX, user_id)
    }

    pub fn notes(user_id: UserId) -> String {
        format!("{}{}", NOTES_PREFIX, user_id)
    }

    pub fn user_data(user_id: UserId) -> String {
        format!("{}{}", USER_DATA_PREFIX, user_id)
    }

    /// User id encoded in a per-user key, e.g. `notes_42` -> 42
    pub fn user_id_from(key: &str, prefix: &str) -> Option<UserId> {
        key.strip_prefix(prefix)?.parse().ok()
    }
}

/// Time-based id source
///
/// Ids are milliseconds since the epoch, bumped so that two ids handed out
/// by the same generator are always strictly increasing.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

/// Shared by every local backend in the process
static IDS: IdGenerator = IdGenerator::new();

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    pub fn next_id(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        now.max(prev + 1)
    }
}

/// Reference from the public note index into a user's notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteRef {
    pub user_id: UserId,
    pub note_id: NoteId,
}

/// `"type:id"` -> public notes about that item
pub type PublicNoteIndex = BTreeMap<String, Vec<NoteRef>>;

pub fn index_key(item_type: ItemType, item_id: &ItemKey) -> String {
    format!("{}:{}", item_type, item_id)
}

/// Backend storing JSON collections in a [`KeyValueStore`]
pub struct LocalBackend<S> {
    store: S,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> LocalBackend<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn next_id(&self) -> i64 {
        IDS.next_id()
    }

    /// Serialize read-modify-write cycles within this process
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Read a collection; a missing key yields the empty value
    pub(crate) async fn read<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.store.get(key).await? {
            None => Ok(T::default()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                tracing::warn!(key, error = %e, "stored collection does not parse");
                ParadiseError::corrupt(key, e)
            }),
        }
    }

    pub(crate) async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, raw).await?;
        tracing::debug!(key, "wrote collection");
        Ok(())
    }

    pub(crate) async fn remove_key(&self, key: &str) -> Result<()> {
        self.store.remove(key).await
    }

    /// User ids that have at least one key with `prefix`
    pub(crate) async fn user_ids_with(&self, prefix: &str) -> Result<Vec<UserId>> {
        Ok(self
            .store
            .keys_with_prefix(prefix)
            .await?
            .iter()
            .filter_map(|key| keys::user_id_from(key, prefix))
            .collect())
    }

    async fn usernames(&self) -> Result<HashMap<UserId, String>> {
        let users: Vec<User> = self.read(keys::USERS).await?;
        Ok(users.into_iter().map(|u| (u.id, u.username)).collect())
    }
}

#[async_trait]
impl<S: KeyValueStore> Backend for LocalBackend<S> {
    fn name(&self) -> &'static str {
        "local"
    }

    // === Catalog ===

    async fn list_books(&self) -> Result<Vec<Book>> {
        let mut books: Vec<Book> = self.read(keys::ALL_BOOKS).await?;
        books.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(books)
    }

    async fn get_book(&self, id: BookId) -> Result<Option<Book>> {
        let books: Vec<Book> = self.read(keys::ALL_BOOKS).await?;
        Ok(books.into_iter().find(|b| b.id == id))
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        let _guard = self.lock().await;
        let mut books: Vec<Book> = self.read(keys::ALL_BOOKS).await?;

        let book = book.into_book(self.next_id(), Utc::now());
        books.push(book.clone());
        self.write(keys::ALL_BOOKS, &books).await?;

        Ok(book)
    }

    async fn update_book(&self, id: BookId, update: &BookUpdate) -> Result<Option<Book>> {
        let _guard = self.lock().await;
        let mut books: Vec<Book> = self.read(keys::ALL_BOOKS).await?;

        let Some(book) = books.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        update.apply(book);
        let updated = book.clone();
        self.write(keys::ALL_BOOKS, &books).await?;

        Ok(Some(updated))
    }

    async fn delete_book(&self, id: BookId) -> Result<bool> {
        let _guard = self.lock().await;
        let mut books: Vec<Book> = self.read(keys::ALL_BOOKS).await?;

        let before = books.len();
        books.retain(|b| b.id != id);
        if books.len() == before {
            return Ok(false);
        }
        self.write(keys::ALL_BOOKS, &books).await?;

        Ok(true)
    }

    // === Library ===

    async fn list_library(&self, user_id: UserId) -> Result<Vec<LibraryEntry>> {
        let mut entries: Vec<LibraryEntry> = self.read(&keys::user_books(user_id)).await?;
        let catalog: Vec<Book> = self.read(keys::ALL_BOOKS).await?;
        let catalog: HashMap<BookId, Book> = catalog.into_iter().map(|b| (b.id, b)).collect();

        // Orphans keep the snapshot taken when they were added
        for entry in &mut entries {
            if let Some(book) = catalog.get(&entry.book.id) {
                entry.book = book.clone();
            }
        }

        Ok(entries)
    }

    async fn find_user_book(&self, user_id: UserId, book_id: BookId) -> Result<Option<UserBook>> {
        let entries: Vec<LibraryEntry> = self.read(&keys::user_books(user_id)).await?;
        Ok(entries
            .iter()
            .find(|e| e.book_id() == book_id)
            .map(|e| e.user_book(user_id)))
    }

    async fn add_user_book(&self, user_id: UserId, book: &Book, status: ReadingStatus) -> Result<UserBook> {
        let _guard = self.lock().await;
        let key = keys::user_books(user_id);
        let mut entries: Vec<LibraryEntry> = self.read(&key).await?;
        let now = Utc::now();

        let record = match entries.iter_mut().find(|e| e.book_id() == book.id) {
            Some(entry) => {
                let mut record = entry.user_book(user_id);
                if !record.record_status(status, now) {
                    return Ok(entry.user_book(user_id));
                }
                entry.set_membership(&record);
                record
            }
            None => {
                let new = NewUserBook::new(user_id, book.id, status);
                let record = UserBook {
                    id: self.next_id(),
                    user_id,
                    book_id: book.id,
                    status: new.status,
                    statuses: new.statuses,
                    rating: None,
                    review: None,
                    current_page: None,
                    added_at: now,
                    updated_at: None,
                };
                entries.push(LibraryEntry::from_parts(book.clone(), &record));
                record
            }
        };
        self.write(&key, &entries).await?;

        Ok(record)
    }

    async fn update_user_book(
        &self,
        user_id: UserId,
        book_id: BookId,
        update: &LibraryUpdate,
    ) -> Result<Option<UserBook>> {
        let _guard = self.lock().await;
        let key = keys::user_books(user_id);
        let mut entries: Vec<LibraryEntry> = self.read(&key).await?;

        let Some(entry) = entries.iter_mut().find(|e| e.book_id() == book_id) else {
            return Ok(None);
        };
        let mut record = entry.user_book(user_id);
        record.apply(update, Utc::now());
        entry.set_membership(&record);
        self.write(&key, &entries).await?;

        Ok(Some(record))
    }

    async fn remove_user_book(&self, user_id: UserId, book_id: BookId) -> Result<bool> {
        let _guard = self.lock().await;
        let key = keys::user_books(user_id);
        let mut entries: Vec<LibraryEntry> = self.read(&key).await?;

        let before = entries.len();
        entries.retain(|e| e.book_id() != book_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&key, &entries).await?;

        Ok(true)
    }

    // === Authors ===

    async fn list_authors(&self) -> Result<Vec<AuthorRecord>> {
        let mut authors: Vec<AuthorRecord> = self.read(keys::AUTHORS).await?;
        authors.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(authors)
    }

    async fn insert_author(&self, author: NewAuthor) -> Result<AuthorRecord> {
        let _guard = self.lock().await;
        let mut authors: Vec<AuthorRecord> = self.read(keys::AUTHORS).await?;

        let record = AuthorRecord {
            id: self.next_id(),
            name: author.name,
            bio: author.bio,
            created_at: Utc::now(),
        };
        authors.push(record.clone());
        self.write(keys::AUTHORS, &authors).await?;

        Ok(record)
    }

    async fn update_author(&self, id: AuthorId, update: &AuthorUpdate) -> Result<Option<AuthorRecord>> {
        let _guard = self.lock().await;
        let mut authors: Vec<AuthorRecord> = self.read(keys::AUTHORS).await?;

        let Some(author) = authors.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        update.apply(author);
        let updated = author.clone();
        self.write(keys::AUTHORS, &authors).await?;

        Ok(Some(updated))
    }

    // === Notes ===

    async fn list_notes(&self, user_id: UserId, item_type: ItemType, item_id: &ItemKey) -> Result<Vec<Note>> {
        let notes: Vec<Note> = self.read(&keys::notes(user_id)).await?;
        Ok(notes
            .into_iter()
            .filter(|n| n.is_about(item_type, item_id))
            .collect())
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note> {
        let _guard = self.lock().await;
        let key = keys::notes(note.user_id);
        let mut notes: Vec<Note> = self.read(&key).await?;

        let note = note.into_note(self.next_id(), Utc::now());
        notes.push(note.clone());
        self.write(&key, &notes).await?;

        if note.is_public {
            let mut index: PublicNoteIndex = self.read(keys::PUBLIC_NOTE_INDEX).await?;
            index
                .entry(index_key(note.item_type, &note.item_id))
                .or_default()
                .push(NoteRef {
                    user_id: note.user_id,
                    note_id: note.id,
                });
            self.write(keys::PUBLIC_NOTE_INDEX, &index).await?;
        }

        Ok(note)
    }

    async fn update_note(
        &self,
        user_id: UserId,
        note_id: NoteId,
        content: String,
        is_public: bool,
    ) -> Result<Option<Note>> {
        let _guard = self.lock().await;
        let key = keys::notes(user_id);
        let mut notes: Vec<Note> = self.read(&key).await?;

        let Some(note) = notes.iter_mut().find(|n| n.id == note_id) else {
            return Ok(None);
        };
        let was_public = note.is_public;
        note.content = content;
        note.is_public = is_public;
        note.updated_at = Some(Utc::now());
        let note = note.clone();
        self.write(&key, &notes).await?;

        if was_public != is_public {
            let mut index: PublicNoteIndex = self.read(keys::PUBLIC_NOTE_INDEX).await?;
            let item_key = index_key(note.item_type, &note.item_id);
            let note_ref = NoteRef { user_id, note_id };
            if is_public {
                index.entry(item_key).or_default().push(note_ref);
            } else if let Some(refs) = index.get_mut(&item_key) {
                refs.retain(|r| r != &note_ref);
                if refs.is_empty() {
                    index.remove(&item_key);
                }
            }
            self.write(keys::PUBLIC_NOTE_INDEX, &index).await?;
        }

        Ok(Some(note))
    }

    async fn list_public_notes(&self, item_type: ItemType, item_id: &ItemKey) -> Result<Vec<Note>> {
        let index: PublicNoteIndex = self.read(keys::PUBLIC_NOTE_INDEX).await?;
        let Some(refs) = index.get(&index_key(item_type, item_id)) else {
            return Ok(Vec::new());
        };

        let mut by_user: BTreeMap<UserId, HashSet<NoteId>> = BTreeMap::new();
        for note_ref in refs {
            by_user.entry(note_ref.user_id).or_default().insert(note_ref.note_id);
        }

        let usernames = self.usernames().await?;
        let collections = try_join_all(by_user.keys().map(|user_id| async move {
            self.read::<Vec<Note>>(&keys::notes(*user_id)).await
        }))
        .await?;

        let mut public = Vec::new();
        for ((_, note_ids), notes) in by_user.iter().zip(collections) {
            for mut note in notes {
                // The index may lag behind edits; re-check the note itself
                if note_ids.contains(&note.id) && note.is_public && note.is_about(item_type, item_id) {
                    note.author = usernames
                        .get(&note.user_id)
                        .map(|username| NoteAuthor { username: username.clone() });
                    public.push(note);
                }
            }
        }

        public.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(public)
    }

    // === Images ===

    async fn store_image(&self, image: &ImageFile, folder: &str) -> Result<String> {
        tracing::debug!(folder, name = %image.name, size = image.size(), "inlining image");
        Ok(format!(
            "data:{};base64,{}",
            image.mime_type,
            STANDARD.encode(&image.bytes)
        ))
    }

    // === Users ===

    async fn list_users(&self) -> Result<Vec<User>> {
        self.read(keys::USERS).await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let _guard = self.lock().await;
        let mut users: Vec<User> = self.read(keys::USERS).await?;

        let user = user.into_user(self.next_id(), Utc::now());
        users.push(user.clone());
        self.write(keys::USERS, &users).await?;

        Ok(user)
    }

    async fn save_user(&self, user: &User) -> Result<Option<User>> {
        let _guard = self.lock().await;
        let mut users: Vec<User> = self.read(keys::USERS).await?;

        let Some(stored) = users.iter_mut().find(|u| u.id == user.id) else {
            return Ok(None);
        };
        *stored = user.clone();
        self.write(keys::USERS, &users).await?;

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, user_id: UserId) -> Result<bool> {
        let _guard = self.lock().await;
        let mut users: Vec<User> = self.read(keys::USERS).await?;

        let before = users.len();
        users.retain(|u| u.id != user_id);
        if users.len() == before {
            return Ok(false);
        }
        self.write(keys::USERS, &users).await?;

        self.remove_key(&keys::user_books(user_id)).await?;
        self.remove_key(&keys::notes(user_id)).await?;
        self.remove_key(&keys::user_data(user_id)).await?;

        let mut index: PublicNoteIndex = self.read(keys::PUBLIC_NOTE_INDEX).await?;
        for refs in index.values_mut() {
            refs.retain(|r| r.user_id != user_id);
        }
        index.retain(|_, refs| !refs.is_empty());
        self.write(keys::PUBLIC_NOTE_INDEX, &index).await?;

        tracing::info!(user_id, "deleted user and their data");
        Ok(true)
    }

    // === Legacy per-user data ===

    async fn load_user_data(&self, user_id: UserId) -> Result<Option<LegacyUserData>> {
        self.read(&keys::user_data(user_id)).await
    }

    async fn save_user_data(&self, user_id: UserId, data: &LegacyUserData) -> Result<()> {
        let _guard = self.lock().await;
        self.write(&keys::user_data(user_id), data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryStore;

    fn backend() -> LocalBackend<MemoryStore> {
        LocalBackend::new(MemoryStore::new())
    }

    fn new_note(user_id: UserId, book_id: BookId, is_public: bool) -> NewNote {
        NewNote {
            user_id,
            item_type: ItemType::Book,
            item_id: ItemKey::Id(book_id),
            content: format!("note by {}", user_id),
            is_public,
        }
    }

    #[test]
    fn test_id_generator_strictly_increasing() {
        let ids = IdGenerator::new();
        let mut last = ids.next_id();
        for _ in 0..1000 {
            let next = ids.next_id();
            assert!(next > last);
            last = next;
        }
    }

    #[tokio::test]
    async fn test_ids_unique_across_backends() {
        let first = backend();
        let second = backend();
        let a = first.insert_book(NewBook::new("Dune", "Herbert")).await.unwrap();
        let b = second.insert_book(NewBook::new("Emma", "Austen")).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_user_id_from_key() {
        assert_eq!(keys::user_id_from("notes_42", keys::NOTES_PREFIX), Some(42));
        assert_eq!(keys::user_id_from("notes_x", keys::NOTES_PREFIX), None);
        assert_eq!(keys::user_id_from("users", keys::NOTES_PREFIX), None);
    }

    #[tokio::test]
    async fn test_missing_collections_are_empty() {
        let backend = backend();
        assert!(backend.list_books().await.unwrap().is_empty());
        assert!(backend.list_library(1).await.unwrap().is_empty());
        assert!(backend.load_user_data(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_collection_is_reported() {
        let backend = backend();
        backend.store().set(keys::ALL_BOOKS, "[{".to_string()).await.unwrap();

        let err = backend.list_books().await.unwrap_err();
        assert!(err.is_corruption());

        // Nothing may overwrite the unreadable value
        assert!(backend.insert_book(NewBook::new("Dune", "Herbert")).await.is_err());
        assert_eq!(
            backend.store().get(keys::ALL_BOOKS).await.unwrap().as_deref(),
            Some("[{")
        );
    }

    #[tokio::test]
    async fn test_list_books_newest_first() {
        let backend = backend();
        let first = backend.insert_book(NewBook::new("Emma", "Austen")).await.unwrap();
        let second = backend.insert_book(NewBook::new("Dune", "Herbert")).await.unwrap();

        let books = backend.list_books().await.unwrap();
        assert_eq!(books[0].id, second.id);
        assert_eq!(books[1].id, first.id);
    }

    #[tokio::test]
    async fn test_library_refreshes_from_catalog() {
        let backend = backend();
        let book = backend.insert_book(NewBook::new("Dune", "Herbert")).await.unwrap();
        backend.add_user_book(1, &book, ReadingStatus::Owned).await.unwrap();

        let update = BookUpdate {
            genre: Some("Sci-Fi".into()),
            ..Default::default()
        };
        backend.update_book(book.id, &update).await.unwrap();

        let entries = backend.list_library(1).await.unwrap();
        assert_eq!(entries[0].book.genre.as_deref(), Some("Sci-Fi"));

        // Orphaned entries keep their snapshot
        backend.delete_book(book.id).await.unwrap();
        let entries = backend.list_library(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].book.title, "Dune");
    }

    #[tokio::test]
    async fn test_add_user_book_merges_existing_entry() {
        let backend = backend();
        let book = backend.insert_book(NewBook::new("Dune", "Herbert")).await.unwrap();
        let first = backend.add_user_book(1, &book, ReadingStatus::Owned).await.unwrap();
        let second = backend.add_user_book(1, &book, ReadingStatus::Want).await.unwrap();
        assert_eq!(second.id, first.id);

        let found = backend.find_user_book(1, book.id).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(
            found.statuses.as_slice(),
            &[ReadingStatus::Owned, ReadingStatus::Want]
        );
        assert_eq!(backend.list_library(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_user_book_applies_in_place() {
        let backend = backend();
        let book = backend.insert_book(NewBook::new("Dune", "Herbert")).await.unwrap();
        backend.add_user_book(1, &book, ReadingStatus::Reading).await.unwrap();

        let update = LibraryUpdate {
            current_page: Some(120),
            rating: Some(4),
            ..Default::default()
        };
        let record = backend.update_user_book(1, book.id, &update).await.unwrap().unwrap();
        assert_eq!(record.current_page, Some(120));
        assert_eq!(record.statuses.as_slice(), &[ReadingStatus::Reading]);

        let entry = backend.list_library(1).await.unwrap().remove(0);
        assert_eq!(entry.current_page, Some(120));
        assert_eq!(entry.rating, Some(4));
        assert!(backend.update_user_book(1, 999, &update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_status_adds_are_merged() {
        let backend = std::sync::Arc::new(backend());
        let book = backend.insert_book(NewBook::new("Dune", "Herbert")).await.unwrap();
        backend.add_user_book(1, &book, ReadingStatus::Want).await.unwrap();

        let mut handles = Vec::new();
        for status in [ReadingStatus::Owned, ReadingStatus::Read, ReadingStatus::Reading] {
            let backend = backend.clone();
            let book = book.clone();
            handles.push(tokio::spawn(async move {
                backend.add_user_book(1, &book, status).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = backend.list_library(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].statuses().len(), 4);
        assert_eq!(entries[0].primary_status(), Some(ReadingStatus::Want));
    }

    #[tokio::test]
    async fn test_public_notes_use_index() {
        let backend = backend();
        let user = backend
            .insert_user(NewUser {
                username: "reader".into(),
                display_name: "Reader".into(),
                password: "cHc=".into(),
                is_admin: false,
                must_change_password: false,
            })
            .await
            .unwrap();

        backend.insert_note(new_note(user.id, 5, true)).await.unwrap();
        backend.insert_note(new_note(user.id, 5, false)).await.unwrap();
        backend.insert_note(new_note(user.id, 6, true)).await.unwrap();

        let index: PublicNoteIndex = backend.read(keys::PUBLIC_NOTE_INDEX).await.unwrap();
        assert_eq!(index.len(), 2);

        let public = backend
            .list_public_notes(ItemType::Book, &ItemKey::Id(5))
            .await
            .unwrap();
        assert_eq!(public.len(), 1);
        assert!(public[0].is_public);
        assert_eq!(
            public[0].author.as_ref().map(|a| a.username.as_str()),
            Some("reader")
        );
    }

    #[tokio::test]
    async fn test_notes_keep_insertion_order() {
        let backend = backend();
        let first = backend.insert_note(new_note(1, 5, true)).await.unwrap();
        let second = backend.insert_note(new_note(1, 5, false)).await.unwrap();

        let notes = backend.list_notes(1, ItemType::Book, &ItemKey::Id(5)).await.unwrap();
        let ids: Vec<NoteId> = notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_update_note_moves_index_entry() {
        let backend = backend();
        let note = backend.insert_note(new_note(1, 5, false)).await.unwrap();

        let edited = backend
            .update_note(1, note.id, "second thoughts".into(), true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.content, "second thoughts");
        assert_eq!(edited.created_at, note.created_at);
        assert!(edited.updated_at.is_some());
        assert_eq!(
            backend.list_public_notes(ItemType::Book, &ItemKey::Id(5)).await.unwrap().len(),
            1
        );

        backend.update_note(1, note.id, "private again".into(), false).await.unwrap();
        assert!(backend
            .list_public_notes(ItemType::Book, &ItemKey::Id(5))
            .await
            .unwrap()
            .is_empty());
        let index: PublicNoteIndex = backend.read(keys::PUBLIC_NOTE_INDEX).await.unwrap();
        assert!(index.is_empty());

        // Other users cannot edit it
        assert!(backend.update_note(2, note.id, "x".into(), false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let backend = backend();
        let user = backend
            .insert_user(NewUser {
                username: "gone".into(),
                display_name: "Gone".into(),
                password: String::new(),
                is_admin: false,
                must_change_password: true,
            })
            .await
            .unwrap();
        let book = backend.insert_book(NewBook::new("Dune", "Herbert")).await.unwrap();
        backend.add_user_book(user.id, &book, ReadingStatus::Read).await.unwrap();
        backend.insert_note(new_note(user.id, book.id, true)).await.unwrap();
        backend
            .save_user_data(user.id, &LegacyUserData::default())
            .await
            .unwrap();

        assert!(backend.delete_user(user.id).await.unwrap());
        assert!(!backend.delete_user(user.id).await.unwrap());

        let remaining = backend.store().keys().await.unwrap();
        assert!(remaining.iter().all(|k| !k.ends_with(&format!("_{}", user.id))));
        assert!(backend
            .list_public_notes(ItemType::Book, &ItemKey::Id(book.id))
            .await
            .unwrap()
            .is_empty());
        // Catalog is shared and survives
        assert!(backend.get_book(book.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_image_returns_data_uri() {
        let backend = backend();
        let image = ImageFile::new("cover.png", "image/png", vec![1, 2, 3]);
        let uri = backend.store_image(&image, "covers").await.unwrap();
        assert_eq!(uri, "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let backend = std::sync::Arc::new(backend());
        let mut handles = Vec::new();
        for i in 0..16 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend
                    .insert_book(NewBook::new(format!("Book {}", i), "Author".to_string()))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let books = backend.list_books().await.unwrap();
        let ids: HashSet<BookId> = books.iter().map(|b| b.id).collect();
        assert_eq!(books.len(), 16);
        assert_eq!(ids.len(), 16);
    }
}
