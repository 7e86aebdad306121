// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Image uploads
//!
//! Size and type are checked against the configured [`ImagePolicy`] before
//! the backend sees the file, so a rejected upload never writes anything.

use crate::api::Api;
use crate::config::ImagePolicy;
use crate::error::{ParadiseError, Result};
use crate::storage::models::ImageFile;

/// Folder used when the caller does not name one
pub const DEFAULT_IMAGE_FOLDER: &str = "books";

/// Check an upload against the policy
pub fn validate_image(policy: &ImagePolicy, image: &ImageFile) -> Result<()> {
    if image.size() > policy.max_size {
        return Err(ParadiseError::ImageTooLarge {
            size: image.size(),
            max_size: policy.max_size,
        });
    }
    if !policy.allows(&image.mime_type) {
        return Err(ParadiseError::UnsupportedImageType(image.mime_type.clone()));
    }
    Ok(())
}

impl Api {
    /// Store an image and return a URL (remote) or data URI (local)
    ///
    /// Returns `None` after alerting the user if the image is too large or
    /// of a disallowed type.
    pub async fn upload_image(&self, image: &ImageFile, folder: Option<&str>) -> Result<Option<String>> {
        if let Err(e) = validate_image(&self.images, image) {
            return self.recover("upload_image", Err(e));
        }

        let folder = folder.unwrap_or(DEFAULT_IMAGE_FOLDER);
        self.recover(
            "upload_image",
            self.backend.store_image(image, folder).await.map(Some),
        )
    }
}
