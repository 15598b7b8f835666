// AccessGraph
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Persistence seam for permissions, grants, overrides and assignments
//!
//! The engine issues row-level operations through [`AccessStore`]. Every
//! method is a single durable step: when it returns `Ok`, the write has
//! committed and the caller may invalidate caches.

pub mod memory;

pub use memory::{MemoryStore, StoreSnapshot};

use crate::error::AccessResult;
use crate::model::{AssignmentEdge, EdgeId, OverrideKind, Permission, RoleGrant, UserId, UserOverride, UserRecord};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};

/// Outcome of an atomic override upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideWrite {
    /// No row existed for the pair; one was inserted
    Inserted,
    /// The existing row changed kind
    Flipped { previous: OverrideKind },
    /// The existing row already had the requested kind; nothing was written
    AlreadyPresent,
}

/// Row-level storage operations used by the engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Get a user by ID
    async fn get_user(&self, user_id: UserId) -> AccessResult<Option<UserRecord>>;

    /// Get a user by username
    async fn get_user_by_username(&self, username: &str) -> AccessResult<Option<UserRecord>>;

    /// List every user in the directory
    async fn list_users(&self) -> AccessResult<Vec<UserRecord>>;

    /// Insert or replace a user
    async fn upsert_user(&self, user: UserRecord) -> AccessResult<()>;

    /// Insert a catalog entry; returns false when the code already exists
    async fn insert_permission(&self, permission: Permission) -> AccessResult<bool>;

    /// Get a catalog entry regardless of its active flag
    async fn get_permission(&self, code: &str) -> AccessResult<Option<Permission>>;

    /// List the whole catalog, active or not
    async fn list_permissions(&self) -> AccessResult<Vec<Permission>>;

    /// Set the active flag; returns false when the code is unknown
    async fn set_permission_active(&self, code: &str, active: bool) -> AccessResult<bool>;

    /// Codes granted to a role, restricted to active permissions
    async fn role_permission_codes(&self, role: &str) -> AccessResult<HashSet<String>>;

    /// List every role grant
    async fn list_role_grants(&self) -> AccessResult<Vec<RoleGrant>>;

    /// Insert a role grant; returns false when it already exists
    async fn insert_role_grant(&self, grant: RoleGrant) -> AccessResult<bool>;

    /// Delete a role grant; returns false when it did not exist
    async fn delete_role_grant(&self, role: &str, code: &str) -> AccessResult<bool>;

    /// Overrides of one user, restricted to active permissions
    async fn overrides_for_user(&self, user_id: UserId) -> AccessResult<Vec<UserOverride>>;

    /// Every stored override row
    async fn list_overrides(&self) -> AccessResult<Vec<UserOverride>>;

    /// Atomically insert the row or flip the kind of the existing one
    async fn apply_override(&self, row: UserOverride) -> AccessResult<OverrideWrite>;

    /// Insert the row only if no override exists for the pair
    async fn insert_override_if_absent(&self, row: UserOverride) -> AccessResult<bool>;

    /// Delete the override for a pair; returns false when none existed
    async fn delete_override(&self, user_id: UserId, code: &str) -> AccessResult<bool>;

    /// Delete several overrides in one step; returns the number deleted
    async fn delete_overrides(&self, keys: Vec<(UserId, String)>) -> AccessResult<usize>;

    /// Insert the edge or reactivate the existing one for the pair
    async fn upsert_edge(&self, manager: &str, member: &str) -> AccessResult<AssignmentEdge>;

    /// Soft-remove an edge; returns false when missing or already inactive
    async fn deactivate_edge(&self, id: EdgeId) -> AccessResult<bool>;

    /// Soft-remove the edge for a pair; returns false when missing or already inactive
    async fn deactivate_edge_pair(&self, manager: &str, member: &str) -> AccessResult<bool>;

    /// Members reachable from `manager` through one active edge
    async fn active_members(&self, manager: &str) -> AccessResult<BTreeSet<String>>;

    /// Every stored edge, active or not
    async fn list_edges(&self) -> AccessResult<Vec<AssignmentEdge>>;
}
