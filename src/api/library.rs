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


//! Per-user library
//!
//! A library entry ties a user to a catalog book and carries an ordered set
//! of reading statuses. Adding a book that is already in the library never
//! creates a second entry; the new status is merged into the existing set
//! instead.
//!
//! # Status Set Rules
//! - The set is duplicate-free and keeps insertion order
//! - `status` always mirrors the first element of the set
//! - Adding a status that is already present changes nothing
//! - Edits from the library screen may replace the set, but never with an
//!   empty one

use crate::api::client::check_rating;
use crate::api::Api;
use crate::error::{ParadiseError, Result};
use crate::storage::models::*;

impl Api {
    /// The user's library merged with book fields
    pub async fn list_user_books(&self, user_id: UserId) -> Result<Vec<LibraryEntry>> {
        self.recover("list_user_books", self.backend.list_library(user_id).await)
    }

    /// Add a book to a user's library, or record another status for it
    ///
    /// # Returns
    /// - `None` if the book is not in the catalog
    /// - The new membership record on first addition
    /// - The updated record if the book was already in the library
    pub async fn add_to_user_library(
        &self,
        user_id: UserId,
        book_id: BookId,
        status: ReadingStatus,
    ) -> Result<Option<UserBook>> {
        let result = self.upsert_membership(user_id, book_id, status).await;
        self.recover("add_to_user_library", result)
    }

    async fn upsert_membership(
        &self,
        user_id: UserId,
        book_id: BookId,
        status: ReadingStatus,
    ) -> Result<Option<UserBook>> {
        let Some(book) = self.backend.get_book(book_id).await? else {
            tracing::debug!(user_id, book_id, "book not in catalog");
            return Ok(None);
        };

        let record = self.backend.add_user_book(user_id, &book, status).await?;
        tracing::debug!(user_id, book_id, %status, statuses = record.statuses.len(), "library status recorded");
        Ok(Some(record))
    }

    /// Edit statuses, rating, review or current page of an existing entry
    ///
    /// An empty status set or a rating outside 1..=5 is rejected and shown
    /// to the user; nothing is written.
    pub async fn update_library_entry(
        &self,
        user_id: UserId,
        book_id: BookId,
        update: LibraryUpdate,
    ) -> Result<Option<UserBook>> {
        let result = self.edit_membership(user_id, book_id, &update).await;
        self.recover("update_library_entry", result)
    }

    async fn edit_membership(
        &self,
        user_id: UserId,
        book_id: BookId,
        update: &LibraryUpdate,
    ) -> Result<Option<UserBook>> {
        if matches!(&update.statuses, Some(statuses) if statuses.is_empty()) {
            return Err(ParadiseError::EmptyStatusSet);
        }
        check_rating(update.rating)?;

        self.backend.update_user_book(user_id, book_id, update).await
    }

    /// Remove a book from the user's library; the catalog is untouched
    pub async fn remove_from_user_library(&self, user_id: UserId, book_id: BookId) -> Result<bool> {
        self.recover(
            "remove_from_user_library",
            self.backend.remove_user_book(user_id, book_id).await,
        )
    }
}
