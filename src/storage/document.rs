// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Document store contract for the `users` collection.
//!
//! A document store persists [`UserDocument`]s and answers exact-match
//! queries on a single field. It knows nothing about encryption: the values
//! it sees are whatever the caller stored (ciphertext, in practice).
//!
//! Both identifying fields carry a **sparse unique index**: uniqueness only
//! applies to documents where the field is present.

use serde::{Deserialize, Serialize};

/// Identifying fields of a user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserField {
    Username,
    Phone,
}

impl UserField {
    pub const ALL: [UserField; 2] = [UserField::Username, UserField::Phone];

    /// Stored field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::Username => "username",
            UserField::Phone => "phone",
        }
    }
}

impl std::fmt::Display for UserField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user document as persisted. Field values are opaque to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserDocument {
    pub fn field(&self, field: UserField) -> Option<&str> {
        match field {
            UserField::Username => self.username.as_deref(),
            UserField::Phone => self.phone.as_deref(),
        }
    }

    pub fn set_field(&mut self, field: UserField, value: String) {
        match field {
            UserField::Username => self.username = Some(value),
            UserField::Phone => self.phone = Some(value),
        }
    }
}

/// Exact-match filter on one stored field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: UserField,
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: UserField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &UserDocument) -> bool {
        doc.field(self.field) == Some(self.value.as_str())
    }
}

/// One `$set`-style replacement in a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub field: UserField,
    pub value: String,
}

/// Errors from a document store backend.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// A unique index rejected the write.
    #[error("duplicate value for unique field `{field}`")]
    Duplicate { field: UserField },

    /// Stored bytes could not be decoded as a document.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The backing store failed (I/O, lock poisoning, closed database...).
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Collection-oriented store for user documents.
///
/// Every method is atomic for a single document. Implementations block;
/// async callers run them on the blocking pool.
pub trait DocumentStore: Send + Sync {
    /// Establish the sparse unique indexes on `username` and `phone`.
    /// Idempotent.
    fn ensure_indexes(&self) -> DocumentResult<()>;

    /// Insert a new document. Fails with [`DocumentError::Duplicate`] if any
    /// present identifying field collides with another document.
    fn insert_one(&self, doc: &UserDocument) -> DocumentResult<()>;

    /// Return a document whose field equals the filter value exactly.
    fn find_one(&self, filter: &FieldFilter) -> DocumentResult<Option<UserDocument>>;

    /// Return every document in the collection.
    fn find_all(&self) -> DocumentResult<Vec<UserDocument>>;

    /// Replace the given fields on the document matching `filter`.
    ///
    /// Returns the number of matched documents (0 or 1).
    fn update_one(&self, filter: &FieldFilter, set: &[FieldValue]) -> DocumentResult<u64>;

    /// Remove the document matching `filter`. Returns the number removed.
    fn delete_one(&self, filter: &FieldFilter) -> DocumentResult<u64>;

    /// Check that the backing store is reachable.
    fn ping(&self) -> DocumentResult<()>;
}
