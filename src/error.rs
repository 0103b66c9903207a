// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::UserStoreError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "duplicate_identifier", message)
    }
}

impl From<UserStoreError> for ApiError {
    fn from(err: UserStoreError) -> Self {
        let message = err.to_string();
        match err {
            UserStoreError::InvalidRequest(_) => Self::bad_request(message),
            UserStoreError::NotFound => Self::not_found("User not found"),
            UserStoreError::DuplicateIdentifier { .. } => Self::conflict(message),
            UserStoreError::InvalidKey(_) => {
                tracing::error!(error = %message, "Field cipher rejected the configured key");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "invalid_key", message)
            }
            UserStoreError::MalformedCiphertext(_) => {
                tracing::error!(error = %message, "Stored user data failed to decrypt");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "malformed_ciphertext",
                    message,
                )
            }
            UserStoreError::StoreUnavailable(_) => {
                tracing::error!(error = %message, "Document store unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message)
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::bad_request("Invalid input")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}
