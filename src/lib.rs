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


//! Readers Paradise core
//!
//! Book catalog, personal libraries, notes and accounts behind one facade
//! that runs against an embedded store or a hosted table service.

pub mod api;
pub mod config;
pub mod covers;
pub mod error;
pub mod storage;

pub use api::{Api, LogNotifier, Notifier};
pub use config::{AppConfig, DbMode, ImagePolicy, RemoteConfig};
pub use error::{ParadiseError, Result};
pub use storage::models::*;
pub use storage::{open_backend, Backend, LocalBackend, MemoryStore, RemoteBackend, SqliteStore};
