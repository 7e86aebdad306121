// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Repair utilities for the local store
//!
//! These rewrite whole collections and only exist for the local backend;
//! the remote store has its own constraints. A store backed by a SQLite
//! file additionally reports its physical health and can be compacted or
//! copied.

use crate::error::Result;
use crate::storage::database::DatabaseStats;
use crate::storage::kv::{KeyValueStore, SqliteStore};
use crate::storage::local::{index_key, keys, LocalBackend, NoteRef, PublicNoteIndex};
use crate::storage::models::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Size of each stored collection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DataStatus {
    pub catalog_books: usize,
    /// Library size per user, ordered by user id
    pub libraries: BTreeMap<UserId, usize>,
}

impl DataStatus {
    pub fn total_library_entries(&self) -> usize {
        self.libraries.values().sum()
    }
}

/// Outcome of [`LocalBackend::full_repair`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RepairReport {
    /// Library entries that picked up statuses from the legacy blob
    pub legacy_migrated: usize,
    pub catalog_books: usize,
    pub duplicates_removed: usize,
    pub public_notes_indexed: usize,
    pub status: DataStatus,
}

impl<S: KeyValueStore> LocalBackend<S> {
    /// Copy missing statuses from the legacy `userData_<id>` blob into the
    /// user's library
    ///
    /// Entries that only exist in the legacy blob are left where they are.
    /// Returns the number of library entries that changed.
    pub async fn migrate_legacy_user_data(&self, user_id: UserId) -> Result<usize> {
        let _guard = self.lock().await;
        let Some(legacy) = self.read::<Option<LegacyUserData>>(&keys::user_data(user_id)).await? else {
            return Ok(0);
        };

        let key = keys::user_books(user_id);
        let mut entries: Vec<LibraryEntry> = self.read(&key).await?;
        let legacy_by_id: HashMap<BookId, &LibraryEntry> =
            legacy.books.iter().map(|e| (e.book_id(), e)).collect();

        let mut updated = 0;
        for entry in &mut entries {
            let Some(old) = legacy_by_id.get(&entry.book_id()) else {
                continue;
            };

            let mut changed = false;
            if entry.status.is_none() && old.status.is_some() {
                entry.status = old.status;
                changed = true;
            }
            if entry.statuses.is_empty() && !old.statuses.is_empty() {
                entry.statuses = old.statuses.clone();
                changed = true;
            }
            if changed {
                updated += 1;
            }
        }

        if updated > 0 {
            self.write(&key, &entries).await?;
            tracing::info!(user_id, updated, "migrated legacy library statuses");
        }

        Ok(updated)
    }

    /// Rebuild the shared catalog from every user library
    ///
    /// The first entry seen for a book id wins. Books that are in no library
    /// do not survive the rebuild.
    pub async fn rebuild_catalog(&self) -> Result<usize> {
        let _guard = self.lock().await;
        let mut seen = HashSet::new();
        let mut books = Vec::new();

        for user_id in self.user_ids_with(keys::USER_BOOKS_PREFIX).await? {
            let entries: Vec<LibraryEntry> = self.read(&keys::user_books(user_id)).await?;
            tracing::debug!(user_id, entries = entries.len(), "scanning library");
            for entry in entries {
                if seen.insert(entry.book_id()) {
                    books.push(entry.book);
                }
            }
        }

        self.write(keys::ALL_BOOKS, &books).await?;
        tracing::info!(books = books.len(), "rebuilt catalog");
        Ok(books.len())
    }

    /// Drop duplicate library entries, keeping the most recently touched one
    ///
    /// Returns the number of entries removed.
    pub async fn remove_duplicates(&self, user_id: UserId) -> Result<usize> {
        let _guard = self.lock().await;
        let key = keys::user_books(user_id);
        let entries: Vec<LibraryEntry> = self.read(&key).await?;
        let before = entries.len();

        let mut order: Vec<BookId> = Vec::new();
        let mut newest: HashMap<BookId, LibraryEntry> = HashMap::new();
        for entry in entries {
            let book_id = entry.book_id();
            match newest.get(&book_id) {
                None => {
                    order.push(book_id);
                    newest.insert(book_id, entry);
                }
                // Ties go to the later entry
                Some(kept) if entry.last_touched() >= kept.last_touched() => {
                    newest.insert(book_id, entry);
                }
                Some(_) => {}
            }
        }

        let unique: Vec<LibraryEntry> = order
            .into_iter()
            .filter_map(|id| newest.remove(&id))
            .collect();
        let removed = before - unique.len();

        if removed > 0 {
            self.write(&key, &unique).await?;
            tracing::info!(user_id, removed, "removed duplicate library entries");
        }

        Ok(removed)
    }

    /// Recompute the public note index from every user's notes
    pub async fn rebuild_public_note_index(&self) -> Result<usize> {
        let _guard = self.lock().await;
        let mut index = PublicNoteIndex::new();
        let mut indexed = 0;

        for user_id in self.user_ids_with(keys::NOTES_PREFIX).await? {
            let notes: Vec<Note> = self.read(&keys::notes(user_id)).await?;
            for note in notes.iter().filter(|n| n.is_public) {
                index
                    .entry(index_key(note.item_type, &note.item_id))
                    .or_default()
                    .push(NoteRef {
                        user_id,
                        note_id: note.id,
                    });
                indexed += 1;
            }
        }

        self.write(keys::PUBLIC_NOTE_INDEX, &index).await?;
        tracing::info!(indexed, "rebuilt public note index");
        Ok(indexed)
    }

    /// Catalog size and per-user library sizes
    pub async fn status(&self) -> Result<DataStatus> {
        let books: Vec<Book> = self.read(keys::ALL_BOOKS).await?;
        let mut libraries = BTreeMap::new();

        for user_id in self.user_ids_with(keys::USER_BOOKS_PREFIX).await? {
            let entries: Vec<LibraryEntry> = self.read(&keys::user_books(user_id)).await?;
            libraries.insert(user_id, entries.len());
        }

        Ok(DataStatus {
            catalog_books: books.len(),
            libraries,
        })
    }

    /// Migrate one user's legacy statuses, rebuild the catalog and index,
    /// then dedupe that user's library
    pub async fn full_repair(&self, user_id: UserId) -> Result<RepairReport> {
        let legacy_migrated = self.migrate_legacy_user_data(user_id).await?;
        let catalog_books = self.rebuild_catalog().await?;
        let duplicates_removed = self.remove_duplicates(user_id).await?;
        let public_notes_indexed = self.rebuild_public_note_index().await?;

        Ok(RepairReport {
            legacy_migrated,
            catalog_books,
            duplicates_removed,
            public_notes_indexed,
            status: self.status().await?,
        })
    }
}

/// Physical state of the SQLite file behind a local store
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub integrity_ok: bool,
    pub stats: DatabaseStats,
    pub unused_percentage: f64,
    pub needs_vacuum: bool,
}

impl LocalBackend<SqliteStore> {
    pub async fn store_health(&self) -> Result<StoreHealth> {
        let db = self.store().database();
        let stats = db.get_stats().await?;

        Ok(StoreHealth {
            integrity_ok: db.check_integrity().await?,
            unused_percentage: stats.unused_percentage(),
            needs_vacuum: stats.should_vacuum(),
            stats,
        })
    }

    /// Reclaim free pages if enough of the file is unused, then fold the
    /// WAL back into the main file
    ///
    /// Returns whether a vacuum ran.
    pub async fn compact(&self) -> Result<bool> {
        let _guard = self.lock().await;
        let db = self.store().database();
        let stats = db.get_stats().await?;

        let vacuumed = stats.should_vacuum();
        if vacuumed {
            db.incremental_vacuum().await?;
            tracing::info!(
                unused = stats.unused_size,
                total = stats.total_size,
                "vacuumed local store"
            );
        }
        db.checkpoint().await?;

        Ok(vacuumed)
    }

    /// Write a consistent copy of the store file to `path`
    pub async fn backup<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let _guard = self.lock().await;
        self.store().database().export(path.as_ref()).await?;
        tracing::info!(path = %path.as_ref().display(), "backed up local store");
        Ok(())
    }
}
