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


//! Remote table store backend
//!
//! Talks to a PostgREST-style endpoint (as exposed by Supabase) with one
//! HTTP request per storage primitive.
//!
//! # Protocol
//! - Tables live at `<url>/rest/v1/<table>`
//! - Equality filters are query pairs: `user_id=eq.42`
//! - Ordering: `order=created_at.desc`
//! - Embedding related rows: `select=*,books(*)`
//! - Writes send `Prefer: return=representation` and read back the rows
//! - Library additions insert with `on_conflict=user_id,book_id` and
//!   `resolution=ignore-duplicates`; merges into an existing row are
//!   conditional on its `updated_at`, so a lost race is retried instead
//!   of overwriting the other writer's statuses
//! - Every request carries the `apikey` header and a bearer token
//!
//! # Images
//! Objects are uploaded to `<url>/storage/v1/object/<bucket>/<path>` and
//! served from `<url>/storage/v1/object/public/<bucket>/<path>`.
//!
//! # Remote Schema
//! `books`, `user_books`, `authors`, `notes` and `users`, each with an `id`
//! primary key and a `created_at` column.
//!
//! Apart from those merge retries there is no retry and no backoff: a
//! failed request surfaces as [`ParadiseError::RemoteRequestFailed`] and
//! the facade decides what to do with it.

use crate::config::RemoteConfig;
use crate::error::{ParadiseError, Result};
use crate::storage::models::*;
use crate::storage::Backend;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Display;
use url::Url;

pub const BOOKS: &str = "books";
pub const USER_BOOKS: &str = "user_books";
pub const AUTHORS: &str = "authors";
pub const NOTES: &str = "notes";
pub const USERS: &str = "users";

/// Attempts at merging a status before giving up on a contended row
const MAX_MERGE_ATTEMPTS: usize = 5;

const RETURN_ROWS: &str = "return=representation";
const INSERT_IF_ABSENT: &str = "resolution=ignore-duplicates,return=representation";

/// Query pair for a PostgREST equality filter
fn eq<V: Display>(column: &'static str, value: V) -> (&'static str, String) {
    (column, format!("eq.{}", value))
}

fn newest_first() -> (&'static str, String) {
    ("order", "created_at.desc".to_string())
}

fn oldest_first() -> (&'static str, String) {
    ("order", "created_at.asc".to_string())
}

/// Match a row only if nobody touched it since it was read
fn unchanged_since(updated_at: Option<DateTime<Utc>>) -> (&'static str, String) {
    match updated_at {
        Some(at) => eq("updated_at", at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        None => ("updated_at", "is.null".to_string()),
    }
}

/// Library row with its embedded book
#[derive(Debug, Deserialize)]
struct LibraryRow {
    #[serde(flatten)]
    user_book: UserBook,
    #[serde(default)]
    books: Option<Book>,
}

/// Membership columns to change; unset fields are left alone
#[derive(Debug, Default, Serialize)]
struct MembershipPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<ReadingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statuses: Option<&'a StatusSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    review: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_page: Option<u32>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'a> MembershipPatch<'a> {
    fn statuses_of(record: &'a UserBook) -> Self {
        Self {
            status: Some(record.status),
            statuses: Some(&record.statuses),
            updated_at: record.updated_at,
            ..Default::default()
        }
    }

    fn from_update(update: &'a LibraryUpdate, now: DateTime<Utc>) -> Self {
        Self {
            status: update.statuses.as_ref().and_then(StatusSet::primary),
            statuses: update.statuses.as_ref(),
            rating: update.rating,
            review: update.review.as_deref(),
            current_page: update.current_page,
            updated_at: Some(now),
        }
    }
}

#[derive(Debug, Serialize)]
struct NotePatch<'a> {
    content: &'a str,
    is_public: bool,
    updated_at: DateTime<Utc>,
}

/// User columns as stored remotely (snake_case)
#[derive(Debug, Serialize)]
struct UserRow<'a> {
    username: &'a str,
    display_name: &'a str,
    password: &'a str,
    is_admin: bool,
    must_change_password: bool,
}

/// Backend speaking the PostgREST protocol over HTTP
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base_url: Url,
    anon_key: String,
    bucket: String,
}

impl RemoteBackend {
    /// Create a backend for the configured endpoint
    ///
    /// # Errors
    /// Returns error if the url or key is missing, the url does not parse,
    /// or the HTTP client cannot be built
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        if !config.is_complete() {
            return Err(ParadiseError::InvalidConfiguration(
                "remote backend needs both url and anon key".to_string(),
            ));
        }

        let mut base_url = Url::parse(config.url.trim())?;
        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            anon_key: config.anon_key.clone(),
            bucket: config.images_bucket.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<url>/rest/v1/<table>?<query>`
    pub fn table_url(&self, table: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.join(&format!("rest/v1/{}", table))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Object path for an uploaded image: `<folder>/<millis>_<name>`
    pub fn image_path(folder: &str, name: &str, millis: i64) -> String {
        format!("{}/{}_{}", folder.trim_matches('/'), millis, name)
    }

    fn storage_url(&self, area: &[&str], path: &str) -> Result<Url> {
        let mut url = self.base_url.join("storage/v1/object")?;
        url.path_segments_mut()
            .map_err(|_| ParadiseError::InvalidConfiguration("remote url cannot be a base".into()))?
            .extend(area)
            .push(&self.bucket)
            .extend(path.split('/'));
        Ok(url)
    }

    /// Upload endpoint for an object path
    pub fn upload_url(&self, path: &str) -> Result<Url> {
        self.storage_url(&[], path)
    }

    /// Publicly readable URL for an object path
    pub fn public_url(&self, path: &str) -> Result<Url> {
        self.storage_url(&["public"], path)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| ParadiseError::InvalidConfiguration(format!("invalid anon key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|e| ParadiseError::InvalidConfiguration(format!("invalid anon key: {}", e)))?;

        Ok(builder
            .header("apikey", key)
            .header(AUTHORIZATION, bearer)
            .header(ACCEPT, "application/json"))
    }

    /// Build a table request without sending it
    pub fn table_request(
        &self,
        method: Method,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<RequestBuilder> {
        let prefer = (method != Method::GET).then_some(RETURN_ROWS);
        self.request_with(method, table, query, prefer)
    }

    /// Insert request that skips rows conflicting on `columns`
    ///
    /// A conflicting row comes back as an empty array.
    pub fn insert_if_absent_request(&self, table: &str, columns: &str) -> Result<RequestBuilder> {
        self.request_with(
            Method::POST,
            table,
            &[("on_conflict", columns.to_string())],
            Some(INSERT_IF_ABSENT),
        )
    }

    fn request_with(
        &self,
        method: Method,
        table: &str,
        query: &[(&str, String)],
        prefer: Option<&'static str>,
    ) -> Result<RequestBuilder> {
        let builder = self.client.request(method, self.table_url(table, query)?);
        let builder = self.authorized(builder)?;

        Ok(match prefer {
            Some(prefer) => builder.header("Prefer", prefer),
            None => builder,
        })
    }

    async fn send<T>(&self, table: &str, builder: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await?;
        let response = Self::check(table, response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn check(table: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        tracing::warn!(table, status = status.as_u16(), "remote request failed");
        Err(ParadiseError::remote_failed(table, status.as_u16(), message))
    }

    async fn select<T>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let builder = self.table_request(Method::GET, table, query)?;
        self.send(table, builder).await
    }

    async fn insert_row<T, B>(&self, table: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.table_request(Method::POST, table, &[])?.json(body);
        let rows: Vec<T> = self.send(table, builder).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ParadiseError::EmptyRemoteResponse(table.to_string()))
    }

    async fn update_rows<T, B>(&self, table: &str, query: &[(&str, String)], body: &B) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.table_request(Method::PATCH, table, query)?.json(body);
        self.send(table, builder).await
    }

    /// Delete matching rows, returning how many were removed
    async fn delete_rows(&self, table: &str, query: &[(&str, String)]) -> Result<usize> {
        let builder = self.table_request(Method::DELETE, table, query)?;
        let rows: Vec<serde_json::Value> = self.send(table, builder).await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    // === Catalog ===

    async fn list_books(&self) -> Result<Vec<Book>> {
        self.select(BOOKS, &[("select", "*".to_string()), newest_first()]).await
    }

    async fn get_book(&self, id: BookId) -> Result<Option<Book>> {
        let books: Vec<Book> = self.select(BOOKS, &[eq("id", id)]).await?;
        Ok(books.into_iter().next())
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        self.insert_row(BOOKS, &[book]).await
    }

    async fn update_book(&self, id: BookId, update: &BookUpdate) -> Result<Option<Book>> {
        let books: Vec<Book> = self.update_rows(BOOKS, &[eq("id", id)], update).await?;
        Ok(books.into_iter().next())
    }

    async fn delete_book(&self, id: BookId) -> Result<bool> {
        Ok(self.delete_rows(BOOKS, &[eq("id", id)]).await? > 0)
    }

    // === Library ===

    async fn list_library(&self, user_id: UserId) -> Result<Vec<LibraryEntry>> {
        let rows: Vec<LibraryRow> = self
            .select(
                USER_BOOKS,
                &[("select", "*,books(*)".to_string()), eq("user_id", user_id)],
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.books {
                Some(book) => Some(LibraryEntry::from_parts(book, &row.user_book)),
                None => {
                    tracing::debug!(user_id, book_id = row.user_book.book_id, "library row without book");
                    None
                }
            })
            .collect())
    }

    async fn find_user_book(&self, user_id: UserId, book_id: BookId) -> Result<Option<UserBook>> {
        let rows: Vec<UserBook> = self
            .select(USER_BOOKS, &[eq("user_id", user_id), eq("book_id", book_id)])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn add_user_book(&self, user_id: UserId, book: &Book, status: ReadingStatus) -> Result<UserBook> {
        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let merged = match self.find_user_book(user_id, book.id).await? {
                None => {
                    let row = NewUserBook::new(user_id, book.id, status);
                    let builder = self
                        .insert_if_absent_request(USER_BOOKS, "user_id,book_id")?
                        .json(&[row]);
                    let rows: Vec<UserBook> = self.send(USER_BOOKS, builder).await?;
                    rows.into_iter().next()
                }
                Some(current) => {
                    let mut record = current.clone();
                    if !record.record_status(status, Utc::now()) {
                        return Ok(current);
                    }
                    let query = [eq("id", current.id), unchanged_since(current.updated_at)];
                    let rows: Vec<UserBook> = self
                        .update_rows(USER_BOOKS, &query, &MembershipPatch::statuses_of(&record))
                        .await?;
                    rows.into_iter().next()
                }
            };

            if let Some(record) = merged {
                return Ok(record);
            }
            tracing::debug!(user_id, book_id = book.id, attempt, "library entry changed underneath, retrying");
        }

        Err(ParadiseError::remote_failed(
            USER_BOOKS,
            409,
            "library entry kept changing while adding a status",
        ))
    }

    async fn update_user_book(
        &self,
        user_id: UserId,
        book_id: BookId,
        update: &LibraryUpdate,
    ) -> Result<Option<UserBook>> {
        let patch = MembershipPatch::from_update(update, Utc::now());
        let rows: Vec<UserBook> = self
            .update_rows(USER_BOOKS, &[eq("user_id", user_id), eq("book_id", book_id)], &patch)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn remove_user_book(&self, user_id: UserId, book_id: BookId) -> Result<bool> {
        let removed = self
            .delete_rows(USER_BOOKS, &[eq("user_id", user_id), eq("book_id", book_id)])
            .await?;
        Ok(removed > 0)
    }

    // === Authors ===

    async fn list_authors(&self) -> Result<Vec<AuthorRecord>> {
        self.select(AUTHORS, &[("select", "*".to_string()), ("order", "name".to_string())])
            .await
    }

    async fn insert_author(&self, author: NewAuthor) -> Result<AuthorRecord> {
        self.insert_row(AUTHORS, &[author]).await
    }

    async fn update_author(&self, id: AuthorId, update: &AuthorUpdate) -> Result<Option<AuthorRecord>> {
        let rows: Vec<AuthorRecord> = self.update_rows(AUTHORS, &[eq("id", id)], update).await?;
        Ok(rows.into_iter().next())
    }

    // === Notes ===

    async fn list_notes(&self, user_id: UserId, item_type: ItemType, item_id: &ItemKey) -> Result<Vec<Note>> {
        self.select(
            NOTES,
            &[
                ("select", "*".to_string()),
                eq("item_type", item_type),
                eq("item_id", item_id),
                eq("user_id", user_id),
                oldest_first(),
            ],
        )
        .await
    }

    async fn insert_note(&self, note: NewNote) -> Result<Note> {
        self.insert_row(NOTES, &[note]).await
    }

    async fn update_note(
        &self,
        user_id: UserId,
        note_id: NoteId,
        content: String,
        is_public: bool,
    ) -> Result<Option<Note>> {
        let patch = NotePatch {
            content: &content,
            is_public,
            updated_at: Utc::now(),
        };
        let rows: Vec<Note> = self
            .update_rows(NOTES, &[eq("id", note_id), eq("user_id", user_id)], &patch)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_public_notes(&self, item_type: ItemType, item_id: &ItemKey) -> Result<Vec<Note>> {
        let notes: Vec<Note> = self
            .select(
                NOTES,
                &[
                    ("select", "*,users(username)".to_string()),
                    eq("item_type", item_type),
                    eq("item_id", item_id),
                    eq("is_public", true),
                    newest_first(),
                ],
            )
            .await?;

        // The filter runs server-side; drop anything it let through
        Ok(notes.into_iter().filter(|n| n.is_public).collect())
    }

    // === Images ===

    async fn store_image(&self, image: &ImageFile, folder: &str) -> Result<String> {
        let path = Self::image_path(folder, &image.name, Utc::now().timestamp_millis());
        let builder = self
            .authorized(self.client.post(self.upload_url(&path)?))?
            .header(CONTENT_TYPE, image.mime_type.as_str())
            .body(image.bytes.clone());

        let response = builder.send().await?;
        Self::check("storage", response).await?;

        tracing::debug!(path = %path, "uploaded image");
        Ok(self.public_url(&path)?.to_string())
    }

    // === Users ===

    async fn list_users(&self) -> Result<Vec<User>> {
        self.select(USERS, &[("select", "*".to_string()), ("order", "created_at".to_string())])
            .await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let row = UserRow {
            username: &user.username,
            display_name: &user.display_name,
            password: &user.password,
            is_admin: user.is_admin,
            must_change_password: user.must_change_password,
        };
        self.insert_row(USERS, &[row]).await
    }

    async fn save_user(&self, user: &User) -> Result<Option<User>> {
        let row = UserRow {
            username: &user.username,
            display_name: &user.display_name,
            password: &user.password,
            is_admin: user.is_admin,
            must_change_password: user.must_change_password,
        };
        let rows: Vec<User> = self.update_rows(USERS, &[eq("id", user.id)], &row).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_user(&self, user_id: UserId) -> Result<bool> {
        self.delete_rows(USER_BOOKS, &[eq("user_id", user_id)]).await?;
        self.delete_rows(NOTES, &[eq("user_id", user_id)]).await?;
        Ok(self.delete_rows(USERS, &[eq("id", user_id)]).await? > 0)
    }

    // === Legacy per-user data ===

    async fn load_user_data(&self, _user_id: UserId) -> Result<Option<LegacyUserData>> {
        Ok(None)
    }

    async fn save_user_data(&self, _user_id: UserId, _data: &LegacyUserData) -> Result<()> {
        Err(ParadiseError::unsupported(self.name(), "save_user_data"))
    }
}
