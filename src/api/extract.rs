// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::FromRequest, Json};

use crate::error::ApiError;

/// JSON body extractor whose rejections use the [`ApiError`] envelope.
///
/// Unparseable bodies, type mismatches and a missing
/// `Content-Type: application/json` all become 400 `invalid_request`.
#[derive(Debug, Clone, Default, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);
