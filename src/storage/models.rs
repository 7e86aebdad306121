// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Data models for Readers Paradise
//!
//! These types are backend-agnostic: the local backend stores them as JSON
//! collections, the remote backend exchanges them as table rows.
//!
//! # Wire Compatibility
//! - Numeric fields typed in by users (`pages`, `publish_year`) may arrive as
//!   strings in older collections and are parsed leniently
//! - Library entries are persisted locally as a book merged with its
//!   membership fields (`user_book_id`, `status`, `statuses`, ...)
//! - Entries written before multi-status support carry only `status`
//! - User records use camelCase keys (`displayName`, `isAdmin`)

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use crate::error::ParadiseError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

pub type BookId = i64;
pub type UserId = i64;
pub type NoteId = i64;
pub type AuthorId = i64;

// ============================================================================
// ENUMS
// ============================================================================

/// Reading status tag attached to a library entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Owned,
    Want,
    Reading,
    Read,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Owned => "owned",
            ReadingStatus::Want => "want",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Read => "read",
        }
    }

    /// Label used by the dashboard
    pub fn label(&self) -> &'static str {
        match self {
            ReadingStatus::Owned => "Owned",
            ReadingStatus::Want => "Want to Read",
            ReadingStatus::Reading => "Currently Reading",
            ReadingStatus::Read => "Read",
        }
    }
}

impl FromStr for ReadingStatus {
    type Err = ParadiseError;

    fn from_str(status: &str) -> Result<Self, Self::Err> {
        match status.trim().to_ascii_lowercase().as_str() {
            "owned" => Ok(ReadingStatus::Owned),
            "want" => Ok(ReadingStatus::Want),
            "reading" => Ok(ReadingStatus::Reading),
            "read" => Ok(ReadingStatus::Read),
            other => Err(ParadiseError::invalid_input(format!("Unknown status: {}", other))),
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of item a note is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Book,
    Author,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Book => "book",
            ItemType::Author => "author",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of the item a note is attached to
///
/// Books are referenced by numeric id, authors by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemKey {
    Id(i64),
    Name(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Id(id) => write!(f, "{}", id),
            ItemKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for ItemKey {
    fn from(id: i64) -> Self {
        ItemKey::Id(id)
    }
}

impl From<&str> for ItemKey {
    fn from(name: &str) -> Self {
        ItemKey::Name(name.to_string())
    }
}

impl From<String> for ItemKey {
    fn from(name: String) -> Self {
        ItemKey::Name(name)
    }
}

// ============================================================================
// STATUS SET
// ============================================================================

/// Ordered, duplicate-free set of reading statuses
///
/// Insertion order is preserved; the first element is the primary status.
/// A stored `null` reads as the empty set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Vec<ReadingStatus>>")]
pub struct StatusSet(Vec<ReadingStatus>);

impl StatusSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(status: ReadingStatus) -> Self {
        Self(vec![status])
    }

    /// Add a status; returns `false` if it was already present
    pub fn insert(&mut self, status: ReadingStatus) -> bool {
        if self.0.contains(&status) {
            return false;
        }
        self.0.push(status);
        true
    }

    /// Merge another set, keeping this set's order first
    pub fn union(&mut self, other: &StatusSet) {
        for status in other.iter() {
            self.insert(*status);
        }
    }

    pub fn primary(&self) -> Option<ReadingStatus> {
        self.0.first().copied()
    }

    pub fn contains(&self, status: ReadingStatus) -> bool {
        self.0.contains(&status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReadingStatus> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[ReadingStatus] {
        &self.0
    }
}

impl From<Vec<ReadingStatus>> for StatusSet {
    fn from(statuses: Vec<ReadingStatus>) -> Self {
        let mut set = StatusSet::new();
        for status in statuses {
            set.insert(status);
        }
        set
    }
}

impl From<Option<Vec<ReadingStatus>>> for StatusSet {
    fn from(statuses: Option<Vec<ReadingStatus>>) -> Self {
        statuses.map(StatusSet::from).unwrap_or_default()
    }
}

impl FromIterator<ReadingStatus> for StatusSet {
    fn from_iter<I: IntoIterator<Item = ReadingStatus>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

// ============================================================================
// BOOKS
// ============================================================================

/// Catalog entry shared by all users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Case-insensitive title and author match (duplicate detection)
    pub fn matches(&self, title: &str, author: &str) -> bool {
        self.title.trim().to_lowercase() == title.trim().to_lowercase()
            && self.author.trim().to_lowercase() == author.trim().to_lowercase()
    }
}

/// Fields supplied when adding a book to the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewBook {
    pub fn new<S: Into<String>>(title: S, author: S) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Default::default()
        }
    }

    /// Attach identity and creation time
    pub fn into_book(self, id: BookId, created_at: DateTime<Utc>) -> Book {
        Book {
            id,
            title: self.title,
            author: self.author,
            genre: self.genre,
            pages: self.pages,
            description: self.description,
            isbn: self.isbn,
            publish_year: self.publish_year,
            image_url: self.image_url,
            created_at,
        }
    }
}

/// Partial book edit; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl BookUpdate {
    pub fn apply(&self, book: &mut Book) {
        if let Some(title) = &self.title {
            book.title = title.clone();
        }
        if let Some(author) = &self.author {
            book.author = author.clone();
        }
        if self.genre.is_some() {
            book.genre = self.genre.clone();
        }
        if self.pages.is_some() {
            book.pages = self.pages;
        }
        if self.description.is_some() {
            book.description = self.description.clone();
        }
        if self.isbn.is_some() {
            book.isbn = self.isbn.clone();
        }
        if self.publish_year.is_some() {
            book.publish_year = self.publish_year;
        }
        if self.image_url.is_some() {
            book.image_url = self.image_url.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &BookUpdate::default()
    }
}

// ============================================================================
// LIBRARY MEMBERSHIP
// ============================================================================

/// A user's membership record for one book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBook {
    pub id: i64,
    pub user_id: UserId,
    pub book_id: BookId,
    /// Primary status, always the first element of `statuses`
    pub status: ReadingStatus,
    #[serde(default)]
    pub statuses: StatusSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(default = "Utc::now", alias = "created_at")]
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserBook {
    /// Record an additional status (idempotent) and refresh the primary one
    ///
    /// Returns `true` if the set changed.
    pub fn record_status(&mut self, status: ReadingStatus, now: DateTime<Utc>) -> bool {
        if self.statuses.is_empty() {
            self.statuses.insert(self.status);
        }
        let changed = self.statuses.insert(status);
        if let Some(primary) = self.statuses.primary() {
            self.status = primary;
        }
        self.updated_at = Some(now);
        changed
    }

    /// Apply an edit from the library screen
    pub fn apply(&mut self, update: &LibraryUpdate, now: DateTime<Utc>) {
        if let Some(statuses) = &update.statuses {
            self.statuses = statuses.clone();
            if let Some(primary) = self.statuses.primary() {
                self.status = primary;
            }
        }
        if update.rating.is_some() {
            self.rating = update.rating;
        }
        if update.review.is_some() {
            self.review = update.review.clone();
        }
        if update.current_page.is_some() {
            self.current_page = update.current_page;
        }
        self.updated_at = Some(now);
    }
}

/// Payload for a first-time library addition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserBook {
    pub user_id: UserId,
    pub book_id: BookId,
    pub status: ReadingStatus,
    pub statuses: StatusSet,
}

impl NewUserBook {
    pub fn new(user_id: UserId, book_id: BookId, status: ReadingStatus) -> Self {
        Self {
            user_id,
            book_id,
            status,
            statuses: StatusSet::single(status),
        }
    }
}

/// Edit of an existing library entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statuses: Option<StatusSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
}

/// Library entry merged with its book fields for display
///
/// This is also the shape the local backend persists under `userBooks_<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    #[serde(flatten)]
    pub book: Book,
    #[serde(default)]
    pub user_book_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReadingStatus>,
    #[serde(default)]
    pub statuses: StatusSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl LibraryEntry {
    /// Merge a membership record with its book
    pub fn from_parts(book: Book, user_book: &UserBook) -> Self {
        Self {
            book,
            user_book_id: user_book.id,
            status: Some(user_book.status),
            statuses: user_book.statuses.clone(),
            rating: user_book.rating,
            review: user_book.review.clone(),
            current_page: user_book.current_page,
            added_at: user_book.added_at,
            updated_at: user_book.updated_at,
        }
    }

    pub fn book_id(&self) -> BookId {
        self.book.id
    }

    /// Status set, falling back to the single legacy `status`
    pub fn statuses(&self) -> StatusSet {
        if !self.statuses.is_empty() {
            return self.statuses.clone();
        }
        self.status.map(StatusSet::single).unwrap_or_default()
    }

    pub fn primary_status(&self) -> Option<ReadingStatus> {
        self.statuses.primary().or(self.status)
    }

    pub fn has_status(&self, status: ReadingStatus) -> bool {
        self.statuses().contains(status)
    }

    /// Percent of the book read, capped at 100
    ///
    /// `None` unless both the current page and the page count are known.
    pub fn progress(&self) -> Option<u8> {
        let pages = self.book.pages.filter(|&p| p > 0)?;
        let current = self.current_page?;
        let percent = (f64::from(current) / f64::from(pages) * 100.0).round();
        Some(percent.min(100.0) as u8)
    }

    /// Latest of `updated_at` and `added_at`
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.added_at).max(self.added_at)
    }

    /// Membership view of this entry
    ///
    /// Entries without any status default to `owned`, the same status the
    /// add-book flow uses.
    pub fn user_book(&self, user_id: UserId) -> UserBook {
        let statuses = self.statuses();
        let status = statuses.primary().unwrap_or(ReadingStatus::Owned);
        UserBook {
            id: self.user_book_id,
            user_id,
            book_id: self.book.id,
            status,
            statuses: if statuses.is_empty() {
                StatusSet::single(status)
            } else {
                statuses
            },
            rating: self.rating,
            review: self.review.clone(),
            current_page: self.current_page,
            added_at: self.added_at,
            updated_at: self.updated_at,
        }
    }

    /// Copy membership fields from a record, keeping the book fields
    pub fn set_membership(&mut self, user_book: &UserBook) {
        self.user_book_id = user_book.id;
        self.status = Some(user_book.status);
        self.statuses = user_book.statuses.clone();
        self.rating = user_book.rating;
        self.review = user_book.review.clone();
        self.current_page = user_book.current_page;
        self.added_at = user_book.added_at;
        self.updated_at = user_book.updated_at;
    }
}

// ============================================================================
// AUTHORS
// ============================================================================

/// Stored author row (remote-first; the local `authors` collection mirrors it)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub id: AuthorId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl AuthorUpdate {
    pub fn apply(&self, author: &mut AuthorRecord) {
        if let Some(name) = &self.name {
            author.name = name.clone();
        }
        if self.bio.is_some() {
            author.bio = self.bio.clone();
        }
    }
}

/// Author computed by grouping catalog books by author name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorSummary {
    pub name: String,
    pub books: Vec<Book>,
    pub book_count: usize,
}

/// Group books by author name, sorted by name
pub fn group_by_author(books: Vec<Book>) -> Vec<AuthorSummary> {
    let mut by_name: HashMap<String, Vec<Book>> = HashMap::new();
    for book in books {
        by_name.entry(book.author.clone()).or_default().push(book);
    }

    let mut authors: Vec<AuthorSummary> = by_name
        .into_iter()
        .map(|(name, books)| AuthorSummary {
            book_count: books.len(),
            name,
            books,
        })
        .collect();
    authors.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    authors
}

// ============================================================================
// NOTES
// ============================================================================

/// Username attached to a public note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteAuthor {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub user_id: UserId,
    pub item_type: ItemType,
    pub item_id: ItemKey,
    /// Text or serialized drawing state
    pub content: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "users", skip_serializing_if = "Option::is_none")]
    pub author: Option<NoteAuthor>,
}

impl Note {
    pub fn is_about(&self, item_type: ItemType, item_id: &ItemKey) -> bool {
        self.item_type == item_type && &self.item_id == item_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNote {
    pub user_id: UserId,
    pub item_type: ItemType,
    pub item_id: ItemKey,
    pub content: String,
    pub is_public: bool,
}

impl NewNote {
    pub fn into_note(self, id: NoteId, created_at: DateTime<Utc>) -> Note {
        Note {
            id,
            user_id: self.user_id,
            item_type: self.item_type,
            item_id: self.item_id,
            content: self.content,
            is_public: self.is_public,
            created_at,
            updated_at: None,
            author: None,
        }
    }
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(alias = "display_name")]
    pub display_name: String,
    /// Reversibly encoded password
    pub password: String,
    #[serde(default, alias = "is_admin")]
    pub is_admin: bool,
    #[serde(default = "Utc::now", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "must_change_password")]
    pub must_change_password: bool,
}

/// Account creation request
///
/// `password` is plain text until the accounts layer encodes it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub is_admin: bool,
    pub must_change_password: bool,
}

impl NewUser {
    pub fn into_user(self, id: UserId, created_at: DateTime<Utc>) -> User {
        User {
            id,
            username: self.username,
            display_name: self.display_name,
            password: self.password,
            is_admin: self.is_admin,
            created_at,
            must_change_password: self.must_change_password,
        }
    }
}

/// Logged-in user, without the password
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub is_admin: bool,
    pub must_change_password: bool,
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            is_admin: user.is_admin,
            must_change_password: user.must_change_password,
        }
    }
}

// ============================================================================
// STATISTICS & LEGACY DATA
// ============================================================================

/// Dashboard numbers for one library
///
/// The reading figures (`books_read`, pages, rating, genres) only count
/// entries tagged `read`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_books: usize,
    pub owned: usize,
    pub want_to_read: usize,
    pub authors: usize,
    pub books_read: usize,
    pub total_pages_read: u64,
    /// Mean over rated read books, one decimal
    pub average_rating: Option<f64>,
    pub genres: BTreeMap<String, usize>,
}

impl UserStats {
    pub fn from_entries(entries: &[LibraryEntry]) -> Self {
        let authors: std::collections::HashSet<&str> =
            entries.iter().map(|e| e.book.author.as_str()).collect();
        let read: Vec<&LibraryEntry> = entries
            .iter()
            .filter(|e| e.has_status(ReadingStatus::Read))
            .collect();

        let ratings: Vec<u8> = read.iter().filter_map(|e| e.rating).collect();
        let average_rating = (!ratings.is_empty()).then(|| {
            let mean = ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64;
            (mean * 10.0).round() / 10.0
        });

        let mut genres = BTreeMap::new();
        for entry in &read {
            let genre = entry.book.genre.as_deref().unwrap_or("Other");
            *genres.entry(genre.to_string()).or_insert(0) += 1;
        }

        Self {
            total_books: entries.len(),
            owned: entries.iter().filter(|e| e.has_status(ReadingStatus::Owned)).count(),
            want_to_read: entries.iter().filter(|e| e.has_status(ReadingStatus::Want)).count(),
            authors: authors.len(),
            books_read: read.len(),
            total_pages_read: read.iter().filter_map(|e| e.book.pages).map(u64::from).sum(),
            average_rating,
            genres,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingChallenge {
    pub year: i32,
    pub goal: u32,
    pub completed: u32,
}

impl Default for ReadingChallenge {
    fn default() -> Self {
        Self {
            year: Utc::now().year(),
            goal: 20,
            completed: 0,
        }
    }
}

/// Per-user blob from before library entries had their own collection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyUserData {
    #[serde(default)]
    pub books: Vec<LibraryEntry>,
    #[serde(default)]
    pub authors: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub reading_challenge: ReadingChallenge,
}

// ============================================================================
// IMAGES
// ============================================================================

/// Image selected for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new<S: Into<String>>(name: S, mime_type: S, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

/// Accept a number, a numeric string, an empty string or null
fn lenient_number<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr + TryFrom<i64>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|n| T::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse::<T>().ok(),
        _ => None,
    })
}
