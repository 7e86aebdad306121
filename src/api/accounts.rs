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


//! User accounts
//!
//! Accounts are a lightweight gate for a household install, not a security
//! boundary: passwords are stored base64-encoded and compared in plain
//! text.
//!
//! # Rules
//! - Usernames are trimmed, lowercased and limited to `[a-z0-9_]`
//! - The first start creates `admin` / `admin123`
//! - Accounts created by an administrator must change their password on
//!   first login
//! - The `admin` account cannot be deleted
//!
//! Unlike the rest of the facade these operations return their errors, so
//! the login screen can tell "user not found" from "incorrect password".

use crate::api::Api;
use crate::error::{ParadiseError, Result};
use crate::storage::models::*;
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_DISPLAY_NAME: &str = "Administrator";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

lazy_static::lazy_static! {
    static ref USERNAME_PATTERN: Regex = Regex::new(r"^[a-z0-9_]+$").expect("username pattern is valid");
}

/// Trim and lowercase a username, rejecting anything outside `[a-z0-9_]`
pub fn normalize_username(username: &str) -> Result<String> {
    let normalized = username.trim().to_lowercase();
    if !USERNAME_PATTERN.is_match(&normalized) {
        return Err(ParadiseError::InvalidUsername(normalized));
    }
    Ok(normalized)
}

pub fn encode_password(password: &str) -> String {
    STANDARD.encode(password.as_bytes())
}

pub fn decode_password(encoded: &str) -> Result<String> {
    let bytes = STANDARD.decode(encoded)?;
    String::from_utf8(bytes).map_err(|_| ParadiseError::invalid_input("Stored password is not UTF-8"))
}

fn password_matches(user: &User, password: &str) -> bool {
    user.password == encode_password(password)
}

impl Api {
    /// Create the default administrator if there are no users yet
    ///
    /// Returns the new account, or `None` if users already exist.
    pub async fn ensure_default_admin(&self) -> Result<Option<User>> {
        if !self.backend.list_users().await?.is_empty() {
            return Ok(None);
        }

        let admin = self
            .backend
            .insert_user(NewUser {
                username: DEFAULT_ADMIN_USERNAME.to_string(),
                display_name: DEFAULT_ADMIN_DISPLAY_NAME.to_string(),
                password: encode_password(DEFAULT_ADMIN_PASSWORD),
                is_admin: true,
                must_change_password: false,
            })
            .await?;

        tracing::info!(username = DEFAULT_ADMIN_USERNAME, "created default administrator");
        Ok(Some(admin))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.backend.list_users().await
    }

    async fn find_user(&self, user_id: UserId) -> Result<User> {
        self.backend
            .list_users()
            .await?
            .into_iter()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ParadiseError::UserNotFound(user_id.to_string()))
    }

    /// Check credentials and open a session
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim().to_lowercase();
        let user = self
            .backend
            .list_users()
            .await?
            .into_iter()
            .find(|u| u.username == username)
            .ok_or_else(|| ParadiseError::UserNotFound(username.clone()))?;

        if !password_matches(&user, password) {
            tracing::info!(username = %user.username, "login rejected");
            return Err(ParadiseError::IncorrectPassword);
        }

        tracing::info!(user_id = user.id, "logged in");
        Ok(Session::from(&user))
    }

    /// Create an account with a temporary password
    ///
    /// The account starts with an empty legacy data blob and must change its
    /// password on first login.
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        let username = normalize_username(&user.username)?;
        let users = self.backend.list_users().await?;
        if users.iter().any(|u| u.username == username) {
            return Err(ParadiseError::UsernameTaken(username));
        }

        let created = self
            .backend
            .insert_user(NewUser {
                username,
                display_name: user.display_name.trim().to_string(),
                password: encode_password(&user.password),
                is_admin: user.is_admin,
                must_change_password: true,
            })
            .await?;

        match self
            .backend
            .save_user_data(created.id, &LegacyUserData::default())
            .await
        {
            Ok(()) => {}
            Err(ParadiseError::Unsupported { .. }) => {}
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = created.id, username = %created.username, "created user");
        Ok(created)
    }

    /// Delete an account and everything it owns
    pub async fn delete_user(&self, user_id: UserId) -> Result<bool> {
        let user = match self.find_user(user_id).await {
            Ok(user) => user,
            Err(ParadiseError::UserNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if user.username == DEFAULT_ADMIN_USERNAME {
            return Err(ParadiseError::ProtectedAccount);
        }

        self.backend.delete_user(user_id).await
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new_password: &str,
        confirm: &str,
    ) -> Result<Session> {
        let mut user = self.find_user(user_id).await?;
        if !password_matches(&user, current) {
            return Err(ParadiseError::IncorrectPassword);
        }
        if new_password != confirm {
            return Err(ParadiseError::PasswordMismatch);
        }
        if new_password.is_empty() {
            return Err(ParadiseError::invalid_input("Password cannot be empty"));
        }

        user.password = encode_password(new_password);
        user.must_change_password = false;
        let saved = self
            .backend
            .save_user(&user)
            .await?
            .ok_or_else(|| ParadiseError::UserNotFound(user_id.to_string()))?;

        tracing::info!(user_id, "password changed");
        Ok(Session::from(&saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::test_support::local_api;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            display_name: "Reader".to_string(),
            password: "temp-pass".to_string(),
            is_admin: false,
            must_change_password: false,
        }
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  Book_Worm42 ").unwrap(), "book_worm42");
        assert!(matches!(
            normalize_username("book worm"),
            Err(ParadiseError::InvalidUsername(_))
        ));
        assert!(normalize_username("").is_err());
    }

    #[test]
    fn test_password_encoding() {
        assert_eq!(encode_password("admin123"), "YWRtaW4xMjM=");
        assert_eq!(decode_password("YWRtaW4xMjM=").unwrap(), "admin123");
    }

    #[tokio::test]
    async fn test_default_admin_created_once() {
        let (api, _) = local_api();
        let admin = api.ensure_default_admin().await.unwrap().unwrap();
        assert!(admin.is_admin);
        assert_eq!(admin.display_name, "Administrator");
        assert!(api.ensure_default_admin().await.unwrap().is_none());

        let session = api.login("admin", "admin123").await.unwrap();
        assert!(session.is_admin);
        assert!(!session.must_change_password);
    }

    #[tokio::test]
    async fn test_login_errors() {
        let (api, _) = local_api();
        api.ensure_default_admin().await.unwrap();

        assert!(matches!(
            api.login("nobody", "x").await,
            Err(ParadiseError::UserNotFound(_))
        ));
        assert!(matches!(
            api.login("admin", "wrong").await,
            Err(ParadiseError::IncorrectPassword)
        ));
    }

    #[tokio::test]
    async fn test_create_user_rules() {
        let (api, _) = local_api();
        let user = api.create_user(new_user(" Reader ")).await.unwrap();
        assert_eq!(user.username, "reader");
        assert!(user.must_change_password);
        assert!(api.backend.load_user_data(user.id).await.unwrap().is_some());

        assert!(matches!(
            api.create_user(new_user("READER")).await,
            Err(ParadiseError::UsernameTaken(_))
        ));
        assert!(matches!(
            api.create_user(new_user("re-ader")).await,
            Err(ParadiseError::InvalidUsername(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (api, _) = local_api();
        let user = api.create_user(new_user("reader")).await.unwrap();

        assert!(matches!(
            api.change_password(user.id, "wrong", "new", "new").await,
            Err(ParadiseError::IncorrectPassword)
        ));
        assert!(matches!(
            api.change_password(user.id, "temp-pass", "new", "other").await,
            Err(ParadiseError::PasswordMismatch)
        ));

        let session = api
            .change_password(user.id, "temp-pass", "s3cret", "s3cret")
            .await
            .unwrap();
        assert!(!session.must_change_password);
        assert!(api.login("reader", "s3cret").await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_cannot_be_deleted() {
        let (api, _) = local_api();
        let admin = api.ensure_default_admin().await.unwrap().unwrap();
        assert!(matches!(
            api.delete_user(admin.id).await,
            Err(ParadiseError::ProtectedAccount)
        ));

        let user = api.create_user(new_user("reader")).await.unwrap();
        assert!(api.delete_user(user.id).await.unwrap());
        assert!(!api.delete_user(user.id).await.unwrap());
    }
}
