// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory document store.
//!
//! Same semantics as the redb-backed [`super::UserDatabase`], without
//! persistence. Used by tests and by `STORE_BACKEND=memory` for throwaway
//! runs.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::document::{
    DocumentError, DocumentResult, DocumentStore, FieldFilter, FieldValue, UserDocument,
    UserField,
};

#[derive(Default)]
struct Collection {
    users: HashMap<String, UserDocument>,
    /// (field, stored value) → id
    index: HashMap<(UserField, String), String>,
}

impl Collection {
    fn id_for(&self, filter: &FieldFilter) -> Option<String> {
        self.index.get(&(filter.field, filter.value.clone())).cloned()
    }

    fn owner_of(&self, field: UserField, value: &str) -> Option<&str> {
        self.index
            .get(&(field, value.to_string()))
            .map(String::as_str)
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Collection>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> DocumentResult<usize> {
        Ok(self.read()?.users.len())
    }

    pub fn is_empty(&self) -> DocumentResult<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> DocumentResult<RwLockReadGuard<'_, Collection>> {
        self.inner
            .read()
            .map_err(|_| DocumentError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> DocumentResult<RwLockWriteGuard<'_, Collection>> {
        self.inner
            .write()
            .map_err(|_| DocumentError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn ensure_indexes(&self) -> DocumentResult<()> {
        let mut collection = self.write()?;
        let mut index = HashMap::new();
        for doc in collection.users.values() {
            for field in UserField::ALL {
                if let Some(value) = doc.field(field) {
                    if index
                        .insert((field, value.to_string()), doc.id.clone())
                        .is_some()
                    {
                        return Err(DocumentError::Duplicate { field });
                    }
                }
            }
        }
        collection.index = index;
        Ok(())
    }

    fn insert_one(&self, doc: &UserDocument) -> DocumentResult<()> {
        let mut collection = self.write()?;
        if collection.users.contains_key(&doc.id) {
            return Err(DocumentError::Unavailable(format!(
                "document id already exists: {}",
                doc.id
            )));
        }
        for field in UserField::ALL {
            if let Some(value) = doc.field(field) {
                if collection.owner_of(field, value).is_some() {
                    return Err(DocumentError::Duplicate { field });
                }
            }
        }

        for field in UserField::ALL {
            if let Some(value) = doc.field(field) {
                collection
                    .index
                    .insert((field, value.to_string()), doc.id.clone());
            }
        }
        collection.users.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    fn find_one(&self, filter: &FieldFilter) -> DocumentResult<Option<UserDocument>> {
        let collection = self.read()?;
        Ok(collection
            .id_for(filter)
            .and_then(|id| collection.users.get(&id).cloned()))
    }

    fn find_all(&self) -> DocumentResult<Vec<UserDocument>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    fn update_one(&self, filter: &FieldFilter, set: &[FieldValue]) -> DocumentResult<u64> {
        let mut collection = self.write()?;
        let Some(id) = collection.id_for(filter) else {
            return Ok(0);
        };
        let Some(mut doc) = collection.users.get(&id).cloned() else {
            return Ok(0);
        };

        // Validate every change before touching the index.
        for change in set {
            if let Some(owner) = collection.owner_of(change.field, &change.value) {
                if owner != id {
                    return Err(DocumentError::Duplicate {
                        field: change.field,
                    });
                }
            }
        }

        for change in set {
            if let Some(old) = doc.field(change.field) {
                collection.index.remove(&(change.field, old.to_string()));
            }
            collection
                .index
                .insert((change.field, change.value.clone()), id.clone());
            doc.set_field(change.field, change.value.clone());
        }
        collection.users.insert(id, doc);
        Ok(1)
    }

    fn delete_one(&self, filter: &FieldFilter) -> DocumentResult<u64> {
        let mut collection = self.write()?;
        let Some(id) = collection.id_for(filter) else {
            return Ok(0);
        };
        let Some(doc) = collection.users.remove(&id) else {
            return Ok(0);
        };
        for field in UserField::ALL {
            if let Some(value) = doc.field(field) {
                collection.index.remove(&(field, value.to_string()));
            }
        }
        Ok(1)
    }

    fn ping(&self) -> DocumentResult<()> {
        self.read().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, username: Option<&str>, phone: Option<&str>) -> UserDocument {
        UserDocument {
            id: id.to_string(),
            username: username.map(str::to_string),
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn insert_find_delete() {
        let store = MemoryDocumentStore::new();
        store
            .insert_one(&doc("u-1", Some("enc-a"), Some("enc-1")))
            .unwrap();

        let found = store
            .find_one(&FieldFilter::new(UserField::Phone, "enc-1"))
            .unwrap();
        assert_eq!(found.map(|d| d.id), Some("u-1".to_string()));

        let deleted = store
            .delete_one(&FieldFilter::new(UserField::Username, "enc-a"))
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty().unwrap());
        assert!(store
            .find_one(&FieldFilter::new(UserField::Phone, "enc-1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn unique_index_is_sparse() {
        let store = MemoryDocumentStore::new();
        store.insert_one(&doc("u-1", Some("enc-a"), None)).unwrap();
        store.insert_one(&doc("u-2", Some("enc-b"), None)).unwrap();

        let err = store
            .insert_one(&doc("u-3", Some("enc-a"), Some("enc-9")))
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Duplicate {
                field: UserField::Username
            }
        ));
        assert_eq!(store.len().unwrap(), 2);
        assert!(store
            .find_one(&FieldFilter::new(UserField::Phone, "enc-9"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn update_same_value_is_a_match_not_a_conflict() {
        let store = MemoryDocumentStore::new();
        store.insert_one(&doc("u-1", Some("enc-a"), None)).unwrap();

        let matched = store
            .update_one(
                &FieldFilter::new(UserField::Username, "enc-a"),
                &[FieldValue {
                    field: UserField::Username,
                    value: "enc-a".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(matched, 1);
    }

    #[test]
    fn ensure_indexes_detects_existing_duplicates() {
        let store = MemoryDocumentStore::new();
        store.insert_one(&doc("u-1", Some("enc-a"), None)).unwrap();
        store.ensure_indexes().unwrap();

        store
            .write()
            .unwrap()
            .users
            .insert("u-2".to_string(), doc("u-2", Some("enc-a"), None));
        assert!(matches!(
            store.ensure_indexes(),
            Err(DocumentError::Duplicate { .. })
        ));
    }

    #[test]
    fn poisoned_lock_reports_unavailable() {
        let store = MemoryDocumentStore::new();
        store.insert_one(&doc("u-1", Some("enc-a"), None)).unwrap();

        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = store.inner.write().unwrap();
                    panic!("writer panicked while holding the lock");
                })
                .join()
        });

        assert!(matches!(store.len(), Err(DocumentError::Unavailable(_))));
        assert!(matches!(store.is_empty(), Err(DocumentError::Unavailable(_))));
        assert!(matches!(store.ping(), Err(DocumentError::Unavailable(_))));
    }
}
