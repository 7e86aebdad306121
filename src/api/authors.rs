// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Authors

use crate::api::Api;
use crate::error::Result;
use crate::storage::models::*;

impl Api {
    /// Stored author rows, ordered by name
    pub async fn list_authors(&self) -> Result<Vec<AuthorRecord>> {
        self.recover("list_authors", self.backend.list_authors().await)
    }

    pub async fn add_author(&self, author: NewAuthor) -> Result<Option<AuthorRecord>> {
        self.recover("add_author", self.backend.insert_author(author).await.map(Some))
    }

    pub async fn update_author(&self, id: AuthorId, update: AuthorUpdate) -> Result<Option<AuthorRecord>> {
        self.recover("update_author", self.backend.update_author(id, &update).await)
    }

    /// Authors computed from the catalog, with their books
    pub async fn derived_authors(&self) -> Result<Vec<AuthorSummary>> {
        Ok(group_by_author(self.list_books().await?))
    }
}
