// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the `/users` endpoints. All types derive
//! `Serialize`, `Deserialize`, and `ToSchema` for JSON handling and OpenAPI
//! documentation.
//!
//! Every identifier in these types is **plaintext**. Encryption happens
//! behind the repository boundary; the API never sees ciphertext.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::repository::users::{NewUser, UserFilter, UserUpdate};

// =============================================================================
// User Models
// =============================================================================

/// A user record with identifying fields decrypted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct User {
    /// Store-assigned unique identifier (UUID).
    pub id: String,
    /// Username, if the record has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Phone number, if the record has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Request to create a user. At least one field must be non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(request: CreateUserRequest) -> Self {
        NewUser {
            username: request.username,
            phone: request.phone,
        }
    }
}

/// Request to update a user.
///
/// The target is selected by `username` if non-empty, otherwise by `phone`.
/// `newUsername` / `newPhone` carry the replacement values; at least one
/// must be non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub new_username: Option<String>,
    #[serde(default)]
    pub new_phone: Option<String>,
}

impl UpdateUserRequest {
    pub fn filter(&self) -> Option<UserFilter> {
        UserFilter::from_identifiers(self.username.as_deref(), self.phone.as_deref())
    }

    pub fn update(&self) -> UserUpdate {
        let mut update = UserUpdate::new();
        if let Some(username) = &self.new_username {
            update = update.username(username.as_str());
        }
        if let Some(phone) = &self.new_phone {
            update = update.phone(phone.as_str());
        }
        update
    }
}

/// Request to delete a user, selected by `username` if non-empty, otherwise
/// by `phone`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DeleteUserRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl DeleteUserRequest {
    pub fn filter(&self) -> Option<UserFilter> {
        UserFilter::from_identifiers(self.username.as_deref(), self.phone.as_deref())
    }
}

/// Confirmation body for mutations without a resource to return.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_uses_camel_case_fields() {
        let request: UpdateUserRequest =
            serde_json::from_str(r#"{"username":"alice","newPhone":"555-2"}"#).unwrap();
        assert_eq!(request.filter(), Some(UserFilter::username("alice")));
        assert_eq!(request.update(), UserUpdate::new().phone("555-2"));
    }

    #[test]
    fn update_request_with_blank_values_is_empty() {
        let request: UpdateUserRequest =
            serde_json::from_str(r#"{"phone":"555-1","newUsername":"","newPhone":""}"#).unwrap();
        assert_eq!(request.filter(), Some(UserFilter::phone("555-1")));
        assert!(request.update().is_empty());
    }

    #[test]
    fn delete_request_without_identifiers_has_no_filter() {
        let request: DeleteUserRequest = serde_json::from_str("{}").unwrap();
        assert!(request.filter().is_none());
    }

    #[test]
    fn user_omits_absent_fields() {
        let user = User {
            id: "u-1".to_string(),
            username: None,
            phone: Some("555".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&user).unwrap(),
            r#"{"id":"u-1","phone":"555"}"#
        );
    }
}
