// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Notes on books and authors
//!
//! Notes are owned by one user. Private notes are only ever returned to
//! their owner; public notes are shared with everyone looking at the same
//! item.

use crate::api::Api;
use crate::error::Result;
use crate::storage::models::*;

impl Api {
    /// The user's own notes about an item, in the order they were written
    pub async fn get_notes(&self, item_type: ItemType, item_id: &ItemKey, user_id: UserId) -> Result<Vec<Note>> {
        self.recover(
            "get_notes",
            self.backend.list_notes(user_id, item_type, item_id).await,
        )
    }

    /// The note the editor opens for an item: the user's first one, public or not
    pub async fn personal_note(&self, item_type: ItemType, item_id: &ItemKey, user_id: UserId) -> Result<Option<Note>> {
        let notes = self.get_notes(item_type, item_id, user_id).await?;
        Ok(notes.into_iter().next())
    }

    /// Store a new note; existing notes are never overwritten
    pub async fn save_note(
        &self,
        user_id: UserId,
        item_type: ItemType,
        item_id: ItemKey,
        content: String,
        is_public: bool,
    ) -> Result<Option<Note>> {
        let note = NewNote {
            user_id,
            item_type,
            item_id,
            content,
            is_public,
        };
        self.recover("save_note", self.backend.insert_note(note).await.map(Some))
    }

    /// Edit one of the user's notes in place
    ///
    /// Keeps the id and `created_at`; `None` if the user owns no such note.
    pub async fn update_note(
        &self,
        user_id: UserId,
        note_id: NoteId,
        content: String,
        is_public: bool,
    ) -> Result<Option<Note>> {
        let result = self.backend.update_note(user_id, note_id, content, is_public).await;
        if matches!(&result, Ok(None)) {
            tracing::debug!(user_id, note_id, "no such note to edit");
        }
        self.recover("update_note", result)
    }

    /// Public notes of every user about an item
    pub async fn get_public_notes(&self, item_type: ItemType, item_id: &ItemKey) -> Result<Vec<Note>> {
        let notes = self.recover(
            "get_public_notes",
            self.backend.list_public_notes(item_type, item_id).await,
        )?;
        Ok(notes.into_iter().filter(|n| n.is_public).collect())
    }
}
