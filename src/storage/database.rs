// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded user document database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: id → serialized [`UserDocument`] (JSON bytes)
//! - `users_by_username`: stored username value → id
//! - `users_by_phone`: stored phone value → id
//!
//! The two index tables are the sparse unique indexes: a document without a
//! field has no entry, and a value maps to at most one id. Every mutation
//! runs in a single write transaction, so index checks and writes are atomic
//! with respect to concurrent writers.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};

use super::document::{
    DocumentError, DocumentResult, DocumentStore, FieldFilter, FieldValue, UserDocument,
    UserField,
};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: id → serialized UserDocument (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Unique index: stored username → id.
const USERS_BY_USERNAME: TableDefinition<&str, &str> = TableDefinition::new("users_by_username");

/// Unique index: stored phone → id.
const USERS_BY_PHONE: TableDefinition<&str, &str> = TableDefinition::new("users_by_phone");

fn index_table(field: UserField) -> TableDefinition<'static, &'static str, &'static str> {
    match field {
        UserField::Username => USERS_BY_USERNAME,
        UserField::Phone => USERS_BY_PHONE,
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UserDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("duplicate value for unique field `{0}`")]
    Duplicate(UserField),

    #[error("index entry points at missing document {0}")]
    DanglingIndex(String),

    #[error("document id already exists: {0}")]
    IdCollision(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type UserDbResult<T> = Result<T, UserDbError>;

impl From<UserDbError> for DocumentError {
    fn from(e: UserDbError) -> Self {
        match e {
            UserDbError::Duplicate(field) => DocumentError::Duplicate { field },
            UserDbError::Serde(e) => DocumentError::Serde(e),
            other => DocumentError::Unavailable(other.to_string()),
        }
    }
}

// =============================================================================
// UserDatabase
// =============================================================================

/// Embedded ACID store for the `users` collection.
pub struct UserDatabase {
    db: Database,
}

impl UserDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> UserDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_USERNAME)?;
            let _ = write_txn.open_table(USERS_BY_PHONE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    /// Rebuild both unique indexes from the stored documents.
    ///
    /// Fails with [`UserDbError::Duplicate`] if two documents share a value,
    /// leaving the existing indexes untouched.
    pub fn rebuild_indexes(&self) -> UserDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let users = write_txn.open_table(USERS)?;
            let mut by_username = write_txn.open_table(USERS_BY_USERNAME)?;
            let mut by_phone = write_txn.open_table(USERS_BY_PHONE)?;

            by_username.retain(|_, _| false)?;
            by_phone.retain(|_, _| false)?;

            for entry in users.iter()? {
                let (_, value) = entry?;
                let doc: UserDocument = serde_json::from_slice(value.value())?;
                for (field, index) in [
                    (UserField::Username, &mut by_username),
                    (UserField::Phone, &mut by_phone),
                ] {
                    if let Some(v) = doc.field(field) {
                        if index.insert(v, doc.id.as_str())?.is_some() {
                            return Err(UserDbError::Duplicate(field));
                        }
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    // =========================================================================
    // Document CRUD
    // =========================================================================

    pub fn insert(&self, doc: &UserDocument) -> UserDbResult<()> {
        let json = serde_json::to_vec(doc)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            if users.get(doc.id.as_str())?.is_some() {
                return Err(UserDbError::IdCollision(doc.id.clone()));
            }

            for field in UserField::ALL {
                if let Some(value) = doc.field(field) {
                    let mut index = write_txn.open_table(index_table(field))?;
                    if index.get(value)?.is_some() {
                        return Err(UserDbError::Duplicate(field));
                    }
                    index.insert(value, doc.id.as_str())?;
                }
            }

            users.insert(doc.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn find(&self, filter: &FieldFilter) -> UserDbResult<Option<UserDocument>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(index_table(filter.field))?;
        let Some(id) = index.get(filter.value.as_str())? else {
            return Ok(None);
        };

        let users = read_txn.open_table(USERS)?;
        let id = id.value();
        let doc = match users.get(id)? {
            Some(value) => serde_json::from_slice(value.value())?,
            None => return Err(UserDbError::DanglingIndex(id.to_string())),
        };
        Ok(Some(doc))
    }

    pub fn list(&self) -> UserDbResult<Vec<UserDocument>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;

        let mut docs = Vec::new();
        for entry in users.iter()? {
            let (_, value) = entry?;
            docs.push(serde_json::from_slice(value.value())?);
        }
        Ok(docs)
    }

    /// Apply `set` to the document matching `filter`. Returns matched count.
    pub fn update(&self, filter: &FieldFilter, set: &[FieldValue]) -> UserDbResult<u64> {
        let write_txn = self.db.begin_write()?;
        {
            let Some(mut doc) = load_matching(&write_txn, filter)? else {
                return Ok(0);
            };

            for change in set {
                if doc.field(change.field) == Some(change.value.as_str()) {
                    continue;
                }

                let mut index = write_txn.open_table(index_table(change.field))?;
                let owner = index.get(change.value.as_str())?.map(|g| g.value().to_string());
                if owner.is_some_and(|owner| owner != doc.id) {
                    return Err(UserDbError::Duplicate(change.field));
                }

                if let Some(old) = doc.field(change.field) {
                    index.remove(old)?;
                }
                index.insert(change.value.as_str(), doc.id.as_str())?;
                doc.set_field(change.field, change.value.clone());
            }

            let json = serde_json::to_vec(&doc)?;
            let mut users = write_txn.open_table(USERS)?;
            users.insert(doc.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    /// Remove the document matching `filter`. Returns deleted count.
    pub fn delete(&self, filter: &FieldFilter) -> UserDbResult<u64> {
        let write_txn = self.db.begin_write()?;
        {
            let Some(doc) = load_matching(&write_txn, filter)? else {
                return Ok(0);
            };

            for field in UserField::ALL {
                if let Some(value) = doc.field(field) {
                    let mut index = write_txn.open_table(index_table(field))?;
                    index.remove(value)?;
                }
            }

            let mut users = write_txn.open_table(USERS)?;
            users.remove(doc.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(1)
    }

    /// Open a read transaction against the primary table.
    pub fn check(&self) -> UserDbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }
}

/// Resolve `filter` through its index and load the document inside a write
/// transaction.
fn load_matching(
    write_txn: &WriteTransaction,
    filter: &FieldFilter,
) -> UserDbResult<Option<UserDocument>> {
    let index = write_txn.open_table(index_table(filter.field))?;
    let id = match index.get(filter.value.as_str())? {
        Some(guard) => guard.value().to_string(),
        None => return Ok(None),
    };
    drop(index);

    let users = write_txn.open_table(USERS)?;
    let bytes = users
        .get(id.as_str())?
        .map(|v| v.value().to_vec())
        .ok_or_else(|| UserDbError::DanglingIndex(id.clone()))?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

impl DocumentStore for UserDatabase {
    fn ensure_indexes(&self) -> DocumentResult<()> {
        self.rebuild_indexes()?;
        tracing::info!("Unique sparse indexes established on users.username and users.phone");
        Ok(())
    }

    fn insert_one(&self, doc: &UserDocument) -> DocumentResult<()> {
        Ok(self.insert(doc)?)
    }

    fn find_one(&self, filter: &FieldFilter) -> DocumentResult<Option<UserDocument>> {
        Ok(self.find(filter)?)
    }

    fn find_all(&self) -> DocumentResult<Vec<UserDocument>> {
        Ok(self.list()?)
    }

    fn update_one(&self, filter: &FieldFilter, set: &[FieldValue]) -> DocumentResult<u64> {
        Ok(self.update(filter, set)?)
    }

    fn delete_one(&self, filter: &FieldFilter) -> DocumentResult<u64> {
        Ok(self.delete(filter)?)
    }

    fn ping(&self) -> DocumentResult<()> {
        Ok(self.check()?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (UserDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = UserDatabase::open(&dir.path().join("users.redb")).unwrap();
        (db, dir)
    }

    fn doc(id: &str, username: Option<&str>, phone: Option<&str>) -> UserDocument {
        UserDocument {
            id: id.to_string(),
            username: username.map(str::to_string),
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn insert_and_find_by_either_field() {
        let (db, _dir) = temp_db();
        let d = doc("u-1", Some("enc-alice"), Some("enc-555"));
        db.insert(&d).unwrap();

        let by_name = db
            .find(&FieldFilter::new(UserField::Username, "enc-alice"))
            .unwrap();
        assert_eq!(by_name, Some(d.clone()));

        let by_phone = db
            .find(&FieldFilter::new(UserField::Phone, "enc-555"))
            .unwrap();
        assert_eq!(by_phone, Some(d));

        let missing = db
            .find(&FieldFilter::new(UserField::Phone, "enc-alice"))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected_and_rolled_back() {
        let (db, _dir) = temp_db();
        db.insert(&doc("u-1", Some("enc-alice"), None)).unwrap();

        let err = db
            .insert(&doc("u-2", Some("enc-bob"), Some("enc-555")))
            .and_then(|_| db.insert(&doc("u-3", Some("enc-carol"), Some("enc-555"))))
            .unwrap_err();
        assert!(matches!(err, UserDbError::Duplicate(UserField::Phone)));

        // The failed insert must not leave a `enc-carol` index entry behind.
        assert!(db
            .find(&FieldFilter::new(UserField::Username, "enc-carol"))
            .unwrap()
            .is_none());
        assert_eq!(db.list().unwrap().len(), 2);
    }

    #[test]
    fn absent_fields_do_not_collide() {
        let (db, _dir) = temp_db();
        db.insert(&doc("u-1", Some("enc-alice"), None)).unwrap();
        db.insert(&doc("u-2", Some("enc-bob"), None)).unwrap();
        db.insert(&doc("u-3", None, Some("enc-555"))).unwrap();
        assert_eq!(db.list().unwrap().len(), 3);
    }

    #[test]
    fn update_moves_index_entries() {
        let (db, _dir) = temp_db();
        db.insert(&doc("u-1", Some("enc-alice"), Some("enc-555-1")))
            .unwrap();

        let matched = db
            .update(
                &FieldFilter::new(UserField::Username, "enc-alice"),
                &[FieldValue {
                    field: UserField::Phone,
                    value: "enc-555-2".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(matched, 1);

        assert!(db
            .find(&FieldFilter::new(UserField::Phone, "enc-555-1"))
            .unwrap()
            .is_none());
        let updated = db
            .find(&FieldFilter::new(UserField::Phone, "enc-555-2"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, "u-1");
        assert_eq!(updated.username.as_deref(), Some("enc-alice"));
    }

    #[test]
    fn update_rejects_value_owned_by_another_document() {
        let (db, _dir) = temp_db();
        db.insert(&doc("u-1", Some("enc-alice"), None)).unwrap();
        db.insert(&doc("u-2", Some("enc-bob"), None)).unwrap();

        let err = db
            .update(
                &FieldFilter::new(UserField::Username, "enc-bob"),
                &[FieldValue {
                    field: UserField::Username,
                    value: "enc-alice".to_string(),
                }],
            )
            .unwrap_err();
        assert!(matches!(err, UserDbError::Duplicate(UserField::Username)));

        let bob = db
            .find(&FieldFilter::new(UserField::Username, "enc-bob"))
            .unwrap();
        assert!(bob.is_some());
    }

    #[test]
    fn update_and_delete_report_zero_when_nothing_matches() {
        let (db, _dir) = temp_db();
        let filter = FieldFilter::new(UserField::Username, "enc-nobody");
        assert_eq!(db.update(&filter, &[]).unwrap(), 0);
        assert_eq!(db.delete(&filter).unwrap(), 0);
    }

    #[test]
    fn delete_removes_document_and_index_entries() {
        let (db, _dir) = temp_db();
        db.insert(&doc("u-1", Some("enc-alice"), Some("enc-555")))
            .unwrap();

        let deleted = db
            .delete(&FieldFilter::new(UserField::Phone, "enc-555"))
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(db.list().unwrap().is_empty());

        // Both values are free again.
        db.insert(&doc("u-2", Some("enc-alice"), Some("enc-555")))
            .unwrap();
    }

    #[test]
    fn rebuild_indexes_is_idempotent() {
        let (db, _dir) = temp_db();
        db.insert(&doc("u-1", Some("enc-alice"), Some("enc-555")))
            .unwrap();
        db.rebuild_indexes().unwrap();
        db.rebuild_indexes().unwrap();

        let found = db
            .find(&FieldFilter::new(UserField::Phone, "enc-555"))
            .unwrap();
        assert_eq!(found.map(|d| d.id), Some("u-1".to_string()));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.redb");
        {
            let db = UserDatabase::open(&path).unwrap();
            db.insert(&doc("u-1", Some("enc-alice"), None)).unwrap();
        }

        let db = UserDatabase::open(&path).unwrap();
        db.ensure_indexes().unwrap();
        assert_eq!(db.list().unwrap().len(), 1);
        db.check().unwrap();
    }

    #[test]
    fn duplicate_maps_to_document_error() {
        let err: DocumentError = UserDbError::Duplicate(UserField::Username).into();
        assert!(matches!(
            err,
            DocumentError::Duplicate {
                field: UserField::Username
            }
        ));
    }
}
