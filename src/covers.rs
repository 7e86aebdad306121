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


//! Open Library lookup
//!
//! Used by the add-book flow to prefill a [`NewBook`] from a search and to
//! fetch cover art.
//!
//! # Endpoints
//! - Search: `https://openlibrary.org/search.json?q=<query>&limit=<n>&fields=...`
//! - Covers: `https://covers.openlibrary.org/b/id/<cover_id>-<M|L>.jpg`

use crate::error::{ParadiseError, Result};
use crate::storage::models::{ImageFile, NewBook};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const SEARCH_URL: &str = "https://openlibrary.org/search.json";
pub const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";

/// Fields requested from the search endpoint
const SEARCH_FIELDS: &str = "key,title,author_name,first_publish_year,isbn,subject,edition_count,publisher,number_of_pages_median,cover_i,first_sentence";

const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Cover image size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSize {
    /// Thumbnails in search results
    Medium,
    /// Stored with the book
    Large,
}

impl CoverSize {
    pub fn suffix(&self) -> &'static str {
        match self {
            CoverSize::Medium => "M",
            CoverSize::Large => "L",
        }
    }
}

/// URL of a cover image by Open Library cover id
pub fn cover_url(cover_id: i64, size: CoverSize) -> String {
    format!("{}/{}-{}.jpg", COVERS_URL, cover_id, size.suffix())
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author_name: Vec<String>,
    #[serde(default)]
    pub first_publish_year: Option<i32>,
    #[serde(default)]
    pub isbn: Vec<String>,
    #[serde(default)]
    pub subject: Vec<String>,
    #[serde(default)]
    pub edition_count: Option<u32>,
    #[serde(default)]
    pub publisher: Vec<String>,
    #[serde(default)]
    pub number_of_pages_median: Option<u32>,
    #[serde(default)]
    pub cover_i: Option<i64>,
    /// String or list of strings depending on the record
    #[serde(default)]
    pub first_sentence: Option<serde_json::Value>,
}

impl SearchResult {
    pub fn first_author(&self) -> &str {
        self.author_name
            .first()
            .map(String::as_str)
            .unwrap_or("Unknown Author")
    }

    pub fn description(&self) -> Option<String> {
        match self.first_sentence.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => items.first()?.as_str().map(str::to_string),
            _ => None,
        }
    }

    pub fn cover_url(&self, size: CoverSize) -> Option<String> {
        self.cover_i.map(|id| cover_url(id, size))
    }

    /// Prefill for the add-book form; the cover is fetched separately
    pub fn into_new_book(self) -> NewBook {
        let genre = guess_genre(&self.subject).to_string();
        NewBook {
            author: self.first_author().to_string(),
            description: self.description(),
            title: self.title.unwrap_or_else(|| "Unknown Title".to_string()),
            genre: Some(genre),
            pages: self.number_of_pages_median,
            isbn: self.isbn.into_iter().next(),
            publish_year: self.first_publish_year,
            image_url: None,
        }
    }
}

impl From<SearchResult> for NewBook {
    fn from(result: SearchResult) -> Self {
        result.into_new_book()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchResult>,
}

/// Pick a shelf genre from Open Library subjects
///
/// Specific genres are tried first, then the broad fiction/non-fiction
/// split; anything else is `Other`.
pub fn guess_genre(subjects: &[String]) -> &'static str {
    const SPECIFIC: &[(&str, &[&str])] = &[
        ("Fantasy", &["fantasy", "magic", "wizards"]),
        ("Science Fiction", &["science fiction", "sci-fi", "space"]),
        ("Mystery", &["mystery", "detective", "crime"]),
        ("Thriller", &["thriller", "suspense"]),
        ("Romance", &["romance", "love"]),
        ("Biography", &["biography", "autobiography", "memoir"]),
        ("History", &["history", "historical"]),
        ("Horror", &["horror", "scary"]),
        ("Poetry", &["poetry", "poem", "verse"]),
        ("Drama", &["drama", "play", "theatre"]),
        ("Self-Help", &["self-help", "self help", "self improvement"]),
    ];
    const BROAD: &[(&str, &[&str])] = &[
        ("Fiction", &["fiction", "novel", "story"]),
        (
            "Non-Fiction",
            &["nonfiction", "non-fiction", "politics", "philosophy", "economics", "science"],
        ),
    ];

    let joined = subjects.join(", ").to_lowercase();
    SPECIFIC
        .iter()
        .chain(BROAD)
        .find(|(_, words)| words.iter().any(|w| joined.contains(w)))
        .map(|(genre, _)| *genre)
        .unwrap_or("Other")
}

/// Client for the public Open Library API
#[derive(Debug, Clone)]
pub struct OpenLibraryClient {
    client: Client,
    search_url: Url,
}

impl OpenLibraryClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            search_url: Url::parse(SEARCH_URL)?,
        })
    }

    /// Search URL for a query
    pub fn search_url(&self, query: &str, limit: usize) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string())
            .append_pair("fields", SEARCH_FIELDS);
        url
    }

    /// Search by free text
    ///
    /// An empty query is rejected without a request.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ParadiseError::invalid_input("Please enter a search term"));
        }

        let url = self.search_url(query, limit.unwrap_or(DEFAULT_SEARCH_LIMIT));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ParadiseError::remote_failed("openlibrary", status.as_u16(), "search failed"));
        }

        let body: SearchResponse = response.json().await?;
        tracing::debug!(query, hits = body.docs.len(), "open library search");
        Ok(body.docs)
    }

    /// Download a large cover as an upload-ready JPEG
    pub async fn download_cover(&self, cover_id: i64) -> Result<ImageFile> {
        let url = cover_url(cover_id, CoverSize::Large);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ParadiseError::remote_failed("covers", status.as_u16(), "cover download failed"));
        }

        let bytes = response.bytes().await?;
        Ok(ImageFile::new("cover.jpg", "image/jpeg", bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cover_urls() {
        assert_eq!(
            cover_url(8231856, CoverSize::Medium),
            "https://covers.openlibrary.org/b/id/8231856-M.jpg"
        );
        assert_eq!(
            cover_url(8231856, CoverSize::Large),
            "https://covers.openlibrary.org/b/id/8231856-L.jpg"
        );
    }

    #[test]
    fn test_search_url() {
        let client = OpenLibraryClient::new().unwrap();
        let url = client.search_url("the hobbit", 5);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("openlibrary.org"));
        assert_eq!(pairs[0], ("q".to_string(), "the hobbit".to_string()));
        assert_eq!(pairs[1], ("limit".to_string(), "5".to_string()));
        assert!(pairs[2].1.contains("number_of_pages_median"));
    }

    #[test]
    fn test_search_result_to_new_book() {
        let result: SearchResult = serde_json::from_value(json!({
            "key": "/works/OL27482W",
            "title": "The Hobbit",
            "author_name": ["J.R.R. Tolkien", "Someone Else"],
            "first_publish_year": 1937,
            "isbn": ["9780547928227", "0547928221"],
            "subject": ["Fantasy fiction", "Dragons"],
            "number_of_pages_median": 310,
            "cover_i": 6979861,
            "first_sentence": ["In a hole in the ground there lived a hobbit."]
        }))
        .unwrap();

        assert_eq!(
            result.cover_url(CoverSize::Medium).as_deref(),
            Some("https://covers.openlibrary.org/b/id/6979861-M.jpg")
        );

        let book: NewBook = result.into();
        assert_eq!(book.title, "The Hobbit");
        assert_eq!(book.author, "J.R.R. Tolkien");
        assert_eq!(book.genre.as_deref(), Some("Fantasy"));
        assert_eq!(book.pages, Some(310));
        assert_eq!(book.isbn.as_deref(), Some("9780547928227"));
        assert_eq!(book.publish_year, Some(1937));
        assert!(book.description.unwrap().starts_with("In a hole"));
    }

    #[test]
    fn test_sparse_result_defaults() {
        let result: SearchResult = serde_json::from_value(json!({ "key": "/works/X" })).unwrap();
        let book = result.into_new_book();
        assert_eq!(book.title, "Unknown Title");
        assert_eq!(book.author, "Unknown Author");
        assert_eq!(book.genre.as_deref(), Some("Other"));
    }

    #[test]
    fn test_guess_genre_prefers_specific() {
        let subjects = vec!["Fiction".to_string(), "Detective and mystery stories".to_string()];
        assert_eq!(guess_genre(&subjects), "Mystery");
        assert_eq!(guess_genre(&["Economics".to_string()]), "Non-Fiction");
        assert_eq!(guess_genre(&[]), "Other");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let client = OpenLibraryClient::new().unwrap();
        assert!(matches!(
            client.search("   ", None).await,
            Err(ParadiseError::InvalidInput(_))
        ));
    }
}
