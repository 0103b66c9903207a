// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::cipher::FieldCipher;
use crate::storage::{MemoryDocumentStore, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub users: UserRepository,
}

impl AppState {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// State backed by a fresh in-memory document store.
    pub fn in_memory(cipher: FieldCipher) -> Self {
        Self::new(UserRepository::new(
            cipher,
            Arc::new(MemoryDocumentStore::new()),
        ))
    }
}
