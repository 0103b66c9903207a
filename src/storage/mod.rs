// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for user records with field-level encryption.
//!
//! ## Layers
//!
//! - [`document`]: the document store contract (exact-match filters, sparse
//!   unique indexes). Values are opaque; the store never sees plaintext.
//! - [`database`]: redb-backed implementation used in production.
//! - [`memory`]: in-memory implementation for tests and throwaway runs.
//! - [`repository`]: typed access that encrypts on the way in and decrypts
//!   on the way out.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   {DB_NAME}.redb
//!     users               id -> {"id", "username"?: hex, "phone"?: hex}
//!     users_by_username   hex -> id
//!     users_by_phone      hex -> id
//! ```

pub mod database;
pub mod document;
pub mod memory;
pub mod repository;

pub use database::{UserDatabase, UserDbError, UserDbResult};
pub use document::{
    DocumentError, DocumentResult, DocumentStore, FieldFilter, FieldValue, UserDocument,
    UserField,
};
pub use memory::MemoryDocumentStore;
pub use repository::{
    NewUser, UserFilter, UserRepository, UserStoreError, UserStoreResult, UserUpdate,
};
