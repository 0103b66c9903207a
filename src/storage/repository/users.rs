// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User repository with transparent field-level encryption.
//!
//! Callers only ever handle plaintext. Identifying fields are encrypted with
//! the deterministic [`FieldCipher`] before they reach the document store,
//! and every filter value goes through [`UserRepository::encrypt_filter_field`]
//! so lookups compare ciphertext to ciphertext. Results are decrypted before
//! they are returned.
//!
//! Uniqueness is enforced by the store's unique indexes on the encrypted
//! values. There is no check-then-insert: a `DuplicateIdentifier` from the
//! insert itself is the authoritative answer when two inserts race.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::cipher::{CipherError, FieldCipher};
use crate::models::User;
use crate::storage::document::{
    DocumentError, DocumentResult, DocumentStore, FieldFilter, FieldValue, UserDocument,
    UserField,
};

/// Default bound on a single document store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserStoreError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("a user with this {field} already exists")]
    DuplicateIdentifier { field: UserField },

    #[error("no user matched the filter")]
    NotFound,

    #[error("document store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type UserStoreResult<T> = Result<T, UserStoreError>;

impl From<CipherError> for UserStoreError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::InvalidKey(_) => UserStoreError::InvalidKey(e.to_string()),
            CipherError::MalformedCiphertext(msg) => UserStoreError::MalformedCiphertext(msg),
        }
    }
}

impl From<DocumentError> for UserStoreError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::Duplicate { field } => UserStoreError::DuplicateIdentifier { field },
            other => UserStoreError::StoreUnavailable(other.to_string()),
        }
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Insert payload. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: Option<String>,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            phone: Some(phone.into()),
        }
    }

    fn fields(&self) -> impl Iterator<Item = (UserField, &str)> {
        [
            (UserField::Username, self.username.as_deref()),
            (UserField::Phone, self.phone.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.filter(|v| !v.is_empty()).map(|v| (field, v)))
    }
}

/// Plaintext equality filter on one identifying field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub field: UserField,
    pub value: String,
}

impl UserFilter {
    pub fn new(field: UserField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn username(value: impl Into<String>) -> Self {
        Self::new(UserField::Username, value)
    }

    pub fn phone(value: impl Into<String>) -> Self {
        Self::new(UserField::Phone, value)
    }

    /// Pick the filter from request identifiers: username if non-empty,
    /// otherwise phone if non-empty.
    pub fn from_identifiers(username: Option<&str>, phone: Option<&str>) -> Option<Self> {
        match (username, phone) {
            (Some(u), _) if !u.is_empty() => Some(Self::username(u)),
            (_, Some(p)) if !p.is_empty() => Some(Self::phone(p)),
            _ => None,
        }
    }
}

/// Explicit set of field replacements for a partial update.
///
/// Empty values are ignored, so an update built only from empty strings is
/// empty and will be rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    changes: BTreeMap<UserField, String>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: UserField, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.changes.insert(field, value);
        }
        self
    }

    pub fn username(self, value: impl Into<String>) -> Self {
        self.set(UserField::Username, value)
    }

    pub fn phone(self, value: impl Into<String>) -> Self {
        self.set(UserField::Phone, value)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (UserField, &str)> {
        self.changes.iter().map(|(field, value)| (*field, value.as_str()))
    }
}

// =============================================================================
// UserRepository
// =============================================================================

/// CRUD over user records with transparent field encryption.
///
/// Owns the key (through the cipher) and a handle to the document store.
/// Cheap to clone; holds no per-call state.
#[derive(Clone)]
pub struct UserRepository {
    cipher: Arc<FieldCipher>,
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl UserRepository {
    pub fn new(cipher: FieldCipher, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            cipher: Arc::new(cipher),
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Override the per-call store timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Encrypt a caller's plaintext filter value into a store filter.
    ///
    /// This is the only place filter values are turned into ciphertext.
    pub fn encrypt_filter_field(&self, field: UserField, plaintext: &str) -> FieldFilter {
        FieldFilter::new(field, self.cipher.encrypt(plaintext))
    }

    /// Insert a new user. At least one identifying field must be non-empty.
    pub async fn insert(&self, user: NewUser) -> UserStoreResult<User> {
        let mut doc = UserDocument {
            id: Uuid::new_v4().to_string(),
            username: None,
            phone: None,
        };
        for (field, value) in user.fields() {
            doc.set_field(field, self.cipher.encrypt(value));
        }
        if doc.username.is_none() && doc.phone.is_none() {
            return Err(UserStoreError::InvalidRequest(
                "username or phone is required".to_string(),
            ));
        }

        let id = doc.id.clone();
        let stored = doc.clone();
        self.run("insert_one", move |store| store.insert_one(&stored))
            .await
            .inspect_err(|e| {
                tracing::warn!(user_id = %id, error = %e, "User insert rejected");
            })?;

        tracing::info!(user_id = %id, "User created");
        self.decrypt_document(doc)
    }

    /// Look up a user by the plaintext value of one field.
    ///
    /// Returns `Ok(None)` when nothing matches.
    pub async fn find_by_field(
        &self,
        field: UserField,
        plaintext: &str,
    ) -> UserStoreResult<Option<User>> {
        let filter = self.encrypt_filter_field(field, plaintext);
        let found = self.run("find_one", move |store| store.find_one(&filter)).await?;

        tracing::debug!(field = %field, found = found.is_some(), "User lookup");
        found.map(|doc| self.decrypt_document(doc)).transpose()
    }

    pub async fn find_by_username(&self, username: &str) -> UserStoreResult<Option<User>> {
        self.find_by_field(UserField::Username, username).await
    }

    pub async fn find_by_phone(&self, phone: &str) -> UserStoreResult<Option<User>> {
        self.find_by_field(UserField::Phone, phone).await
    }

    /// Replace the fields in `update` on the user matching `filter`.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `update` is empty or the filter value is empty
    ///   (the store is not touched).
    /// - `NotFound` if no user matches.
    /// - `DuplicateIdentifier` if a new value belongs to another user.
    pub async fn update(&self, filter: UserFilter, update: UserUpdate) -> UserStoreResult<()> {
        if update.is_empty() {
            return Err(UserStoreError::InvalidRequest(
                "newUsername or newPhone is required".to_string(),
            ));
        }
        let filter = self.checked_filter(filter)?;

        let set: Vec<FieldValue> = update
            .fields()
            .map(|(field, value)| FieldValue {
                field,
                value: self.cipher.encrypt(value),
            })
            .collect();
        let fields: Vec<&'static str> = set.iter().map(|change| change.field.as_str()).collect();

        let matched = self
            .run("update_one", move |store| store.update_one(&filter, &set))
            .await?;
        if matched == 0 {
            return Err(UserStoreError::NotFound);
        }

        tracing::info!(fields = ?fields, "User updated");
        Ok(())
    }

    /// Delete the user matching `filter`.
    pub async fn delete(&self, filter: UserFilter) -> UserStoreResult<()> {
        let filter = self.checked_filter(filter)?;

        let deleted = self
            .run("delete_one", move |store| store.delete_one(&filter))
            .await?;
        if deleted == 0 {
            return Err(UserStoreError::NotFound);
        }

        tracing::info!("User deleted");
        Ok(())
    }

    /// Every user, decrypted. A fresh scan on each call.
    ///
    /// A record that fails to decrypt aborts the whole listing.
    pub async fn list_all(&self) -> UserStoreResult<Vec<User>> {
        let docs = self.run("find_all", |store| store.find_all()).await?;
        docs.into_iter()
            .map(|doc| {
                let id = doc.id.clone();
                self.decrypt_document(doc).inspect_err(|e| {
                    tracing::error!(user_id = %id, error = %e, "Stored user failed to decrypt");
                })
            })
            .collect()
    }

    /// Check the document store is reachable within the timeout.
    pub async fn ping(&self) -> UserStoreResult<()> {
        self.run("ping", |store| store.ping()).await
    }

    fn checked_filter(&self, filter: UserFilter) -> UserStoreResult<FieldFilter> {
        if filter.value.is_empty() {
            return Err(UserStoreError::InvalidRequest(format!(
                "{} filter must not be empty",
                filter.field
            )));
        }
        Ok(self.encrypt_filter_field(filter.field, &filter.value))
    }

    fn decrypt_document(&self, doc: UserDocument) -> UserStoreResult<User> {
        let decrypt = |value: Option<String>| {
            value
                .map(|ciphertext| self.cipher.decrypt(&ciphertext))
                .transpose()
        };
        Ok(User {
            username: decrypt(doc.username)?,
            phone: decrypt(doc.phone)?,
            id: doc.id,
        })
    }

    /// Run a blocking store call on the blocking pool, bounded by the timeout.
    ///
    /// On expiry the call is abandoned, not cancelled: a write may still land.
    async fn run<T, F>(&self, operation: &'static str, f: F) -> UserStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DocumentStore) -> DocumentResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result.map_err(UserStoreError::from),
            Ok(Err(join_error)) => {
                tracing::error!(operation, error = %join_error, "Document store task failed");
                Err(UserStoreError::StoreUnavailable(format!(
                    "{operation} failed: {join_error}"
                )))
            }
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Document store call timed out"
                );
                Err(UserStoreError::StoreUnavailable(format!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
