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


//! Data access facade
//!
//! [`Api`] is the single entry point the presentation layer uses. It holds
//! one [`Backend`] chosen at startup and never branches on the storage mode
//! itself.
//!
//! # Failure Policy
//! Every operation returns `Result<T>` where `T` is already the
//! "nothing found" form (`Option`, empty `Vec`, `false`):
//! - Backend and network failures are logged and become that empty form
//! - Validation failures are shown to the user through the [`Notifier`]
//!   and also become the empty form
//! - Corrupt persisted data is the only error returned to the caller
//!
//! Account operations are the exception: login and user management return
//! their errors so the caller can show the exact reason.

use crate::config::{AppConfig, ImagePolicy};
use crate::error::{ParadiseError, Result};
use crate::storage::{open_backend, Backend};
use std::fmt;
use std::sync::Arc;

/// Channel for user-facing alerts
///
/// The facade never talks to a UI directly; the host injects a notifier.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!(message, "user alert");
    }
}

/// Data access facade over the configured backend
///
/// Cheap to clone; clones share the backend.
///
/// # Example
/// ```no_run
/// use paradise_core::api::Api;
/// use paradise_core::config::AppConfig;
/// use paradise_core::storage::models::ReadingStatus;
///
/// # async fn example() -> paradise_core::error::Result<()> {
/// let api = Api::open(&AppConfig::load::<&str>(None)?).await?;
///
/// if let Some(book) = api.add_book(paradise_core::storage::models::NewBook::new("Dune", "Frank Herbert")).await? {
///     api.add_to_user_library(1, book.id, ReadingStatus::Owned).await?;
/// }
/// println!("{:?}", api.get_user_stats(1).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Api {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) images: ImagePolicy,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("backend", &self.backend.name())
            .field("images", &self.images)
            .finish()
    }
}

impl Api {
    /// Wrap a backend with default image rules and a logging notifier
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            images: ImagePolicy::default(),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Open the configured backend
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let backend = open_backend(config).await?;
        Ok(Self::new(backend).with_image_policy(config.images.clone()))
    }

    pub fn with_image_policy(mut self, images: ImagePolicy) -> Self {
        self.images = images;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn image_policy(&self) -> &ImagePolicy {
        &self.images
    }

    pub(crate) fn notify(&self, message: &str) {
        self.notifier.alert(message);
    }

    /// Apply the failure policy to a backend result
    pub(crate) fn recover<T: Default>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_corruption() => Err(e),
            Err(e) if e.is_validation_error() => {
                tracing::debug!(operation, error = %e, "rejected input");
                self.notify(&e.user_message());
                Ok(T::default())
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    backend = self.backend.name(),
                    error = %e,
                    "backend call failed"
                );
                Ok(T::default())
            }
        }
    }
}

/// Reject ratings outside 1..=5
pub(crate) fn check_rating(rating: Option<u8>) -> Result<()> {
    match rating {
        Some(r) if !(1..=5).contains(&r) => Err(ParadiseError::InvalidRating(r)),
        _ => Ok(()),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_recover_swallows_backend_errors() {
        let (api, notifier) = local_api();
        let result: Result<Vec<i32>> =
            api.recover("list", Err(ParadiseError::remote_failed("books", 500, "boom")));
        assert_eq!(result.unwrap(), Vec::<i32>::new());
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_recover_alerts_on_validation() {
        let (api, notifier) = local_api();
        let result: Result<Option<i32>> = api.recover("update", Err(ParadiseError::EmptyStatusSet));
        assert_eq!(result.unwrap(), None);
        assert_eq!(notifier.messages(), vec!["Please select at least one status!".to_string()]);
    }

    #[test]
    fn test_recover_propagates_corruption() {
        let (api, _) = local_api();
        let source = serde_json::from_str::<Vec<i32>>("[").unwrap_err();
        let result: Result<Vec<i32>> = api.recover("list", Err(ParadiseError::corrupt("allBooks", source)));
        assert!(result.unwrap_err().is_corruption());
    }

    #[test]
    fn test_check_rating() {
        assert!(check_rating(None).is_ok());
        assert!(check_rating(Some(5)).is_ok());
        assert!(matches!(check_rating(Some(0)), Err(ParadiseError::InvalidRating(0))));
        assert!(matches!(check_rating(Some(6)), Err(ParadiseError::InvalidRating(6))));
    }
}
