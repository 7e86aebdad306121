// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Shared book catalog

use crate::api::Api;
use crate::error::Result;
use crate::storage::models::{Book, BookId, BookUpdate, NewBook};

impl Api {
    /// All catalog books, newest first
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        self.recover("list_books", self.backend.list_books().await)
    }

    pub async fn get_book(&self, id: BookId) -> Result<Option<Book>> {
        self.recover("get_book", self.backend.get_book(id).await)
    }

    /// Add a book to the catalog
    ///
    /// The backend assigns the id and creation time.
    pub async fn add_book(&self, book: NewBook) -> Result<Option<Book>> {
        let result = self.backend.insert_book(book).await.map(Some);
        if let Ok(Some(book)) = &result {
            tracing::debug!(book_id = book.id, title = %book.title, "added book");
        }
        self.recover("add_book", result)
    }

    /// Merge `update` into an existing book; `None` if the id is unknown
    pub async fn update_book(&self, id: BookId, update: BookUpdate) -> Result<Option<Book>> {
        if update.is_empty() {
            return self.get_book(id).await;
        }
        self.recover("update_book", self.backend.update_book(id, &update).await)
    }

    /// Remove a book from the catalog
    ///
    /// Library entries and notes that reference the book are kept; libraries
    /// show the snapshot stored when the book was added.
    pub async fn delete_book(&self, id: BookId) -> Result<bool> {
        self.recover("delete_book", self.backend.delete_book(id).await)
    }

    /// Catalog book with the same title and author, ignoring case
    pub async fn find_duplicate(&self, title: &str, author: &str) -> Result<Option<Book>> {
        let books = self.list_books().await?;
        Ok(books.into_iter().find(|b| b.matches(title, author)))
    }
}

#[cfg(test)]
mod tests {
    use crate::api::client::test_support::local_api;
    use crate::storage::models::*;

    #[tokio::test]
    async fn test_add_then_list_has_unique_ids() {
        let (api, _) = local_api();
        let a = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();
        let b = api.add_book(NewBook::new("Emma", "Jane Austen")).await.unwrap().unwrap();
        assert_ne!(a.id, b.id);

        let books = api.list_books().await.unwrap();
        assert_eq!(books.iter().filter(|x| x.id == a.id).count(), 1);
        assert_eq!(books.iter().filter(|x| x.id == b.id).count(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_book_is_none() {
        let (api, _) = local_api();
        let update = BookUpdate {
            title: Some("Nothing".into()),
            ..Default::default()
        };
        assert!(api.update_book(404, update).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_then_absent() {
        let (api, _) = local_api();
        let book = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();

        assert!(api.delete_book(book.id).await.unwrap());
        assert!(!api.delete_book(book.id).await.unwrap());
        assert!(api.list_books().await.unwrap().iter().all(|b| b.id != book.id));
        assert!(api.get_book(book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_duplicate_ignores_case() {
        let (api, _) = local_api();
        api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap();

        assert!(api.find_duplicate(" dune ", "FRANK HERBERT").await.unwrap().is_some());
        assert!(api.find_duplicate("Dune", "Brian Herbert").await.unwrap().is_none());
    }
}
