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


//! Storage backends and models
//!
//! One logical data model is stored on two physically different substrates:
//! - [`local::LocalBackend`] - JSON collections in a key/value store
//! - [`remote::RemoteBackend`] - named tables behind a REST endpoint
//!
//! Both implement [`Backend`]. The backend is chosen once by
//! [`open_backend`] and injected into [`crate::api::Api`].
//!
//! # Usage Example
//! ```no_run
//! use paradise_core::storage::{kv::MemoryStore, local::LocalBackend, Backend};
//! use paradise_core::storage::models::NewBook;
//!
//! # async fn example() -> paradise_core::error::Result<()> {
//! let backend = LocalBackend::new(MemoryStore::new());
//! let book = backend.insert_book(NewBook::new("Dune", "Frank Herbert")).await?;
//! assert!(backend.get_book(book.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod kv;
pub mod local;
pub mod migrations;
pub mod models;
pub mod remote;
pub mod repair;

use crate::config::{AppConfig, DbMode};
use crate::error::Result;
use async_trait::async_trait;
use models::*;
use std::sync::Arc;

// Re-export commonly used types
pub use database::{Database, DatabaseStats};
pub use kv::{KeyValueStore, MemoryStore, SqliteStore};
pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// Storage primitives shared by both backends
///
/// Backends report every failure as an error; turning failures into
/// empty results is the facade's job.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    // === Catalog ===

    /// All catalog books, newest first
    async fn list_books(&self) -> Result<Vec<Book>>;

    async fn get_book(&self, id: BookId) -> Result<Option<Book>>;

    /// Store a book, assigning its id and creation time
    async fn insert_book(&self, book: NewBook) -> Result<Book>;

    /// Merge `update` into the book; `None` if the id is unknown
    async fn update_book(&self, id: BookId, update: &BookUpdate) -> Result<Option<Book>>;

    /// Remove the catalog entry only; library entries and notes are untouched
    async fn delete_book(&self, id: BookId) -> Result<bool>;

    // === Library ===

    /// The user's library, merged with book fields
    async fn list_library(&self, user_id: UserId) -> Result<Vec<LibraryEntry>>;

    async fn find_user_book(&self, user_id: UserId, book_id: BookId) -> Result<Option<UserBook>>;

    /// Add `status` to the user's entry for `book`, creating the entry if absent
    ///
    /// The read, the merge and the write form one step: concurrent adds for
    /// the same book end in a single entry carrying every status.
    async fn add_user_book(&self, user_id: UserId, book: &Book, status: ReadingStatus) -> Result<UserBook>;

    /// Apply an edit to an existing entry; `None` if the book is not in the library
    async fn update_user_book(
        &self,
        user_id: UserId,
        book_id: BookId,
        update: &LibraryUpdate,
    ) -> Result<Option<UserBook>>;

    async fn remove_user_book(&self, user_id: UserId, book_id: BookId) -> Result<bool>;

    // === Authors ===

    async fn list_authors(&self) -> Result<Vec<AuthorRecord>>;

    async fn insert_author(&self, author: NewAuthor) -> Result<AuthorRecord>;

    async fn update_author(&self, id: AuthorId, update: &AuthorUpdate) -> Result<Option<AuthorRecord>>;

    // === Notes ===

    /// The user's own notes for one item, oldest first
    async fn list_notes(&self, user_id: UserId, item_type: ItemType, item_id: &ItemKey) -> Result<Vec<Note>>;

    async fn insert_note(&self, note: NewNote) -> Result<Note>;

    /// Replace content and visibility of one of the user's notes
    ///
    /// `None` if the user has no note with that id.
    async fn update_note(
        &self,
        user_id: UserId,
        note_id: NoteId,
        content: String,
        is_public: bool,
    ) -> Result<Option<Note>>;

    /// Public notes of every user for one item
    async fn list_public_notes(&self, item_type: ItemType, item_id: &ItemKey) -> Result<Vec<Note>>;

    // === Images ===

    /// Store an already validated image, returning a URL or data URI
    async fn store_image(&self, image: &ImageFile, folder: &str) -> Result<String>;

    // === Users ===

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Create a user; `user.password` is already encoded
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn save_user(&self, user: &User) -> Result<Option<User>>;

    /// Delete a user together with their library, notes and legacy data
    async fn delete_user(&self, user_id: UserId) -> Result<bool>;

    // === Legacy per-user data ===

    async fn load_user_data(&self, user_id: UserId) -> Result<Option<LegacyUserData>>;

    async fn save_user_data(&self, user_id: UserId, data: &LegacyUserData) -> Result<()>;
}

/// Open the backend selected by configuration
///
/// This is the only place that looks at the mode flag.
pub async fn open_backend(config: &AppConfig) -> Result<Arc<dyn Backend>> {
    if config.db_mode == DbMode::Remote && config.effective_mode() == DbMode::Local {
        tracing::warn!("remote mode requested without url and key, using local store");
    }

    match config.effective_mode() {
        DbMode::Local => {
            let store = SqliteStore::open(&config.data_path).await?;
            tracing::info!(path = %config.data_path.display(), "using local store");
            Ok(Arc::new(LocalBackend::new(store)))
        }
        DbMode::Remote => {
            let backend = RemoteBackend::new(&config.remote)?;
            tracing::info!(url = %config.remote.url, "using remote table store");
            Ok(Arc::new(backend))
        }
    }
}
