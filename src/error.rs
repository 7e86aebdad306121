// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Error types for Readers Paradise
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by the layer that raises them (validation, storage,
//! remote backend, accounts) so the facade can decide which ones to swallow.
//!
//! ## Error Taxonomy
//!
//! - **Validation** (`ImageTooLarge`, `UnsupportedImageType`, `InvalidUsername`,
//!   `EmptyStatusSet`, ...) - reported to the user, nothing is written
//! - **Not found** - represented as `None` by the facade, never as an error
//! - **Backend** (`RemoteRequestFailed`, `ReqwestError`, `SqlxError`, ...) -
//!   logged and converted to an empty/null result at the facade boundary
//! - **Corruption** (`CorruptCollection`) - persisted JSON that no longer
//!   parses; always propagated to the caller

use thiserror::Error;

/// Result type alias using our ParadiseError type
pub type Result<T> = std::result::Result<T, ParadiseError>;

/// Human-readable size for messages: `5MB`, `1.5MB`, `512KB`, `300 bytes`
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    let (value, unit) = if bytes >= MB {
        (bytes as f64 / MB as f64, "MB")
    } else if bytes >= KB {
        (bytes as f64 / KB as f64, "KB")
    } else {
        return format!("{} bytes", bytes);
    };

    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}{}", rounded as u64, unit)
    } else {
        format!("{:.1}{}", rounded, unit)
    }
}

/// Main error type for Readers Paradise
#[derive(Error, Debug)]
pub enum ParadiseError {
    // ===== Validation Errors =====

    /// Uploaded image exceeds the configured size ceiling
    #[error("Image is {size} bytes, limit is {max_size} bytes")]
    ImageTooLarge { size: u64, max_size: u64 },

    /// Uploaded image MIME type is not on the allow-list
    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    /// Username contains characters outside [a-z0-9_]
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    /// Username is already taken
    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    /// A library entry must keep at least one status
    #[error("A library entry needs at least one status")]
    EmptyStatusSet,

    /// Rating outside 1..=5
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    /// New password and confirmation differ
    #[error("New passwords do not match")]
    PasswordMismatch,

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== Account Errors =====

    /// No user with the given username or id
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Password did not match the stored one
    #[error("Incorrect password")]
    IncorrectPassword,

    /// The bootstrap administrator cannot be removed
    #[error("The default administrator account cannot be deleted")]
    ProtectedAccount,

    // ===== Storage Errors =====

    /// A persisted collection no longer parses as JSON
    #[error("Corrupt collection '{key}': {source}")]
    CorruptCollection {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// File or directory could not be created or read
    #[error("File I/O error: {0}")]
    FileIoError(String),

    /// Operation only exists on one backend
    #[error("Not supported by the {backend} backend: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: String,
    },

    // ===== Remote Backend Errors =====

    /// Remote table or bucket returned a non-success status
    #[error("Remote request to '{table}' failed with status {status}: {message}")]
    RemoteRequestFailed {
        table: String,
        status: u16,
        message: String,
    },

    /// Remote write returned no representation row
    #[error("Remote '{0}' returned an empty result")]
    EmptyRemoteResponse(String),

    // ===== Configuration Errors =====

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

impl From<base64::DecodeError> for ParadiseError {
    fn from(err: base64::DecodeError) -> Self {
        ParadiseError::InvalidInput(format!("Invalid base64 data: {}", err))
    }
}

// Helper methods for creating common errors
impl ParadiseError {
    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        ParadiseError::InvalidInput(message.into())
    }

    /// Create a CorruptCollection error for a storage key
    pub fn corrupt<S: Into<String>>(key: S, source: serde_json::Error) -> Self {
        ParadiseError::CorruptCollection {
            key: key.into(),
            source,
        }
    }

    /// Create a RemoteRequestFailed error
    pub fn remote_failed<S: Into<String>, M: Into<String>>(table: S, status: u16, message: M) -> Self {
        ParadiseError::RemoteRequestFailed {
            table: table.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an Unsupported error for a backend operation
    pub fn unsupported<S: Into<String>>(backend: &'static str, operation: S) -> Self {
        ParadiseError::Unsupported {
            backend,
            operation: operation.into(),
        }
    }

    /// Check if error was caused by bad user input
    ///
    /// Validation errors abort the operation before anything is written and
    /// are shown to the user.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            ParadiseError::ImageTooLarge { .. }
                | ParadiseError::UnsupportedImageType(_)
                | ParadiseError::InvalidUsername(_)
                | ParadiseError::UsernameTaken(_)
                | ParadiseError::EmptyStatusSet
                | ParadiseError::InvalidRating(_)
                | ParadiseError::PasswordMismatch
                | ParadiseError::InvalidInput(_)
        )
    }

    /// Check if error means persisted data can no longer be read
    pub fn is_corruption(&self) -> bool {
        matches!(self, ParadiseError::CorruptCollection { .. })
    }

    /// Check if error is related to login or account management
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ParadiseError::UserNotFound(_)
                | ParadiseError::IncorrectPassword
                | ParadiseError::ProtectedAccount
        )
    }

    /// Get user-friendly error message suitable for display
    ///
    /// Backend diagnostics (status codes, SQL errors, response bodies) are
    /// never included.
    pub fn user_message(&self) -> String {
        match self {
            ParadiseError::ImageTooLarge { max_size, .. } => {
                format!("Image size must be less than {}", format_size(*max_size))
            }
            ParadiseError::UnsupportedImageType(_) => {
                "Only JPEG, PNG, and WebP images are allowed".to_string()
            }
            ParadiseError::InvalidUsername(_) => {
                "Username can only contain lowercase letters, numbers, and underscores".to_string()
            }
            ParadiseError::UsernameTaken(_) => "Username already exists".to_string(),
            ParadiseError::EmptyStatusSet => "Please select at least one status!".to_string(),
            ParadiseError::UserNotFound(_) => "User not found".to_string(),
            ParadiseError::IncorrectPassword => "Incorrect password".to_string(),
            ParadiseError::PasswordMismatch => "New passwords do not match".to_string(),
            ParadiseError::ProtectedAccount => {
                "The administrator account cannot be deleted".to_string()
            }
            ParadiseError::CorruptCollection { .. } => {
                "Saved data could not be read. Try running a data repair.".to_string()
            }
            e if e.is_validation_error() => self.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}
