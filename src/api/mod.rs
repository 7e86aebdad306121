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


//! Data-access facade
//!
//! [`Api`] is the single entry point the screens use. It forwards to the
//! configured [`Backend`](crate::storage::Backend) and applies one failure
//! policy everywhere:
//! - Validation problems are shown to the user through the [`Notifier`] and
//!   the operation returns an empty value
//! - Backend failures are logged and the operation returns an empty value
//! - Corrupt local collections are returned as errors
//!
//! Account operations are the exception and return every error.

pub mod accounts;
pub mod authors;
pub mod books;
pub mod client;
pub mod images;
pub mod library;
pub mod notes;
pub mod stats;

// Re-export commonly used types
pub use accounts::{normalize_username, DEFAULT_ADMIN_USERNAME};
pub use client::{Api, LogNotifier, Notifier};
pub use images::{validate_image, DEFAULT_IMAGE_FOLDER};
