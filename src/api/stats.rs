// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Dashboard statistics and the yearly reading challenge

use crate::api::Api;
use crate::error::{ParadiseError, Result};
use crate::storage::models::*;

impl Api {
    /// Counts over the user's library, recomputed on every call
    pub async fn get_user_stats(&self, user_id: UserId) -> Result<UserStats> {
        let entries = self.list_user_books(user_id).await?;
        Ok(UserStats::from_entries(&entries))
    }

    /// Challenge goal with `completed` counted from the library
    pub async fn reading_challenge(&self, user_id: UserId) -> Result<ReadingChallenge> {
        let stored = self.recover("reading_challenge", self.backend.load_user_data(user_id).await)?;
        let mut challenge = stored.map(|d| d.reading_challenge).unwrap_or_default();

        let entries = self.list_user_books(user_id).await?;
        challenge.completed = entries
            .iter()
            .filter(|e| e.has_status(ReadingStatus::Read))
            .count() as u32;

        Ok(challenge)
    }

    /// Change the yearly goal; `None` if the goal is invalid or cannot be stored
    pub async fn set_reading_challenge(&self, user_id: UserId, goal: u32) -> Result<Option<ReadingChallenge>> {
        let result = self.store_challenge_goal(user_id, goal).await;
        self.recover("set_reading_challenge", result)
    }

    async fn store_challenge_goal(&self, user_id: UserId, goal: u32) -> Result<Option<ReadingChallenge>> {
        if goal == 0 {
            return Err(ParadiseError::invalid_input("Reading goal must be at least 1"));
        }

        let mut data = self.backend.load_user_data(user_id).await?.unwrap_or_default();
        data.reading_challenge.goal = goal;
        self.backend.save_user_data(user_id, &data).await?;

        Ok(Some(data.reading_challenge))
    }
}

#[cfg(test)]
mod tests {
    use crate::api::client::test_support::local_api;
    use crate::storage::models::*;

    #[tokio::test]
    async fn test_stats_empty_library() {
        let (api, _) = local_api();
        assert_eq!(api.get_user_stats(1).await.unwrap(), UserStats::default());
    }

    #[tokio::test]
    async fn test_stats_count_statuses_and_authors() {
        let (api, _) = local_api();
        let dune = api.add_book(NewBook::new("Dune", "Frank Herbert")).await.unwrap().unwrap();
        let messiah = api.add_book(NewBook::new("Dune Messiah", "Frank Herbert")).await.unwrap().unwrap();
        let emma = api.add_book(NewBook::new("Emma", "Jane Austen")).await.unwrap().unwrap();

        api.add_to_user_library(1, dune.id, ReadingStatus::Owned).await.unwrap();
        api.add_to_user_library(1, messiah.id, ReadingStatus::Want).await.unwrap();
        api.add_to_user_library(1, emma.id, ReadingStatus::Read).await.unwrap();
        api.add_to_user_library(1, emma.id, ReadingStatus::Owned).await.unwrap();

        let stats = api.get_user_stats(1).await.unwrap();
        assert_eq!(stats.total_books, 3);
        assert_eq!(stats.owned, 2);
        assert_eq!(stats.want_to_read, 1);
        assert_eq!(stats.authors, 2);
    }

    #[tokio::test]
    async fn test_stats_reading_figures() {
        let (api, _) = local_api();
        let emma = NewBook {
            genre: Some("Romance".into()),
            pages: Some(474),
            ..NewBook::new("Emma", "Jane Austen")
        };
        let persuasion = NewBook {
            genre: Some("Romance".into()),
            pages: Some(249),
            ..NewBook::new("Persuasion", "Jane Austen")
        };
        let emma = api.add_book(emma).await.unwrap().unwrap();
        let persuasion = api.add_book(persuasion).await.unwrap().unwrap();

        api.add_to_user_library(1, emma.id, ReadingStatus::Read).await.unwrap();
        api.add_to_user_library(1, persuasion.id, ReadingStatus::Read).await.unwrap();
        let rating = LibraryUpdate {
            rating: Some(4),
            ..Default::default()
        };
        api.update_library_entry(1, emma.id, rating).await.unwrap().unwrap();

        let stats = api.get_user_stats(1).await.unwrap();
        assert_eq!(stats.books_read, 2);
        assert_eq!(stats.total_pages_read, 723);
        assert_eq!(stats.average_rating, Some(4.0));
        assert_eq!(stats.genres.get("Romance"), Some(&2));
    }

    #[tokio::test]
    async fn test_reading_challenge() {
        let (api, notifier) = local_api();
        let book = api.add_book(NewBook::new("Emma", "Jane Austen")).await.unwrap().unwrap();
        api.add_to_user_library(1, book.id, ReadingStatus::Read).await.unwrap();

        let challenge = api.reading_challenge(1).await.unwrap();
        assert_eq!(challenge.goal, 20);
        assert_eq!(challenge.completed, 1);

        assert!(api.set_reading_challenge(1, 0).await.unwrap().is_none());
        assert_eq!(notifier.messages().len(), 1);

        api.set_reading_challenge(1, 52).await.unwrap().unwrap();
        assert_eq!(api.reading_challenge(1).await.unwrap().goal, 52);
    }
}
