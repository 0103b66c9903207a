// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted Users - User directory with searchable field encryption
//!
//! Usernames and phone numbers are encrypted deterministically before they
//! reach the document store, so records remain addressable by exact-match
//! lookup on their plaintext values while the store only sees ciphertext.
//!
//! ## Modules
//!
//! - `cipher` - Deterministic AES field cipher (hex-encoded output)
//! - `storage` - Document store backends and the encrypted user repository
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment-driven runtime configuration

pub mod api;
pub mod cipher;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
