// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed, decrypted access to the document store.

pub mod users;

pub use users::{NewUser, UserFilter, UserRepository, UserStoreError, UserStoreResult, UserUpdate};
