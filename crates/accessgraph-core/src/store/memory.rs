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

//! In-memory implementation of [`AccessStore`]

use super::{AccessStore, OverrideWrite};
use crate::error::AccessResult;
use crate::model::{AssignmentEdge, EdgeId, Permission, RoleGrant, UserId, UserOverride, UserRecord};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::RwLock;

/// Serializable image of every table, used to seed and persist the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub users: Vec<UserRecord>,
    pub permissions: Vec<Permission>,
    pub role_grants: Vec<RoleGrant>,
    pub overrides: Vec<UserOverride>,
    pub assignments: Vec<AssignmentEdge>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    permissions: BTreeMap<String, Permission>,
    role_grants: BTreeSet<(String, String)>,
    overrides: BTreeMap<(UserId, String), UserOverride>,
    edges: BTreeMap<EdgeId, AssignmentEdge>,
    next_edge_id: EdgeId,
}

impl Tables {
    fn is_active_permission(&self, code: &str) -> bool {
        self.permissions.get(code).map(|p| p.active).unwrap_or(false)
    }

    fn find_edge_mut(&mut self, manager: &str, member: &str) -> Option<&mut AssignmentEdge> {
        self.edges.values_mut().find(|e| e.manager_username == manager && e.member_username == member)
    }

    fn allocate_edge_id(&mut self) -> EdgeId {
        self.next_edge_id += 1;
        self.next_edge_id
    }
}

/// Store keeping every table behind a single lock, so each trait method
/// commits atomically
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot. Edges without an ID, or with a
    /// duplicate one, are given fresh IDs; duplicate pairs keep the last row.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut tables = Tables::default();

        for user in snapshot.users {
            tables.users.insert(user.id, user);
        }
        for permission in snapshot.permissions {
            tables.permissions.insert(permission.code.clone(), permission);
        }
        for grant in snapshot.role_grants {
            tables.role_grants.insert((grant.role, grant.permission_code));
        }
        for row in snapshot.overrides {
            tables.overrides.insert((row.user_id, row.permission_code.clone()), row);
        }

        tables.next_edge_id = snapshot.assignments.iter().map(|e| e.id).max().unwrap_or(0);
        for mut edge in snapshot.assignments {
            if let Some(existing) = tables.find_edge_mut(&edge.manager_username, &edge.member_username) {
                let id = existing.id;
                edge.id = id;
                tables.edges.insert(id, edge);
                continue;
            }
            if edge.id == 0 || tables.edges.contains_key(&edge.id) {
                edge.id = tables.allocate_edge_id();
            }
            tables.edges.insert(edge.id, edge);
        }

        Self { tables: RwLock::new(tables) }
    }

    /// Capture every table
    pub async fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read().await;

        StoreSnapshot {
            users: tables.users.values().cloned().collect(),
            permissions: tables.permissions.values().cloned().collect(),
            role_grants: tables.role_grants.iter().map(|(role, code)| RoleGrant::new(role.clone(), code.clone())).collect(),
            overrides: tables.overrides.values().cloned().collect(),
            assignments: tables.edges.values().cloned().collect(),
        }
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn get_user(&self, user_id: UserId) -> AccessResult<Option<UserRecord>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> AccessResult<Option<UserRecord>> {
        Ok(self.tables.read().await.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> AccessResult<Vec<UserRecord>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn upsert_user(&self, user: UserRecord) -> AccessResult<()> {
        self.tables.write().await.users.insert(user.id, user);
        Ok(())
    }

    async fn insert_permission(&self, permission: Permission) -> AccessResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.permissions.contains_key(&permission.code) {
            return Ok(false);
        }
        tables.permissions.insert(permission.code.clone(), permission);
        Ok(true)
    }

    async fn get_permission(&self, code: &str) -> AccessResult<Option<Permission>> {
        Ok(self.tables.read().await.permissions.get(code).cloned())
    }

    async fn list_permissions(&self) -> AccessResult<Vec<Permission>> {
        Ok(self.tables.read().await.permissions.values().cloned().collect())
    }

    async fn set_permission_active(&self, code: &str, active: bool) -> AccessResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.permissions.get_mut(code) {
            Some(permission) => {
                permission.active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn role_permission_codes(&self, role: &str) -> AccessResult<HashSet<String>> {
        let tables = self.tables.read().await;

        Ok(tables
            .role_grants
            .iter()
            .filter(|(r, code)| r == role && tables.is_active_permission(code))
            .map(|(_, code)| code.clone())
            .collect())
    }

    async fn list_role_grants(&self) -> AccessResult<Vec<RoleGrant>> {
        let tables = self.tables.read().await;
        Ok(tables.role_grants.iter().map(|(role, code)| RoleGrant::new(role.clone(), code.clone())).collect())
    }

    async fn insert_role_grant(&self, grant: RoleGrant) -> AccessResult<bool> {
        Ok(self.tables.write().await.role_grants.insert((grant.role, grant.permission_code)))
    }

    async fn delete_role_grant(&self, role: &str, code: &str) -> AccessResult<bool> {
        Ok(self.tables.write().await.role_grants.remove(&(role.to_string(), code.to_string())))
    }

    async fn overrides_for_user(&self, user_id: UserId) -> AccessResult<Vec<UserOverride>> {
        let tables = self.tables.read().await;

        Ok(tables
            .overrides
            .values()
            .filter(|row| row.user_id == user_id && tables.is_active_permission(&row.permission_code))
            .cloned()
            .collect())
    }

    async fn list_overrides(&self) -> AccessResult<Vec<UserOverride>> {
        Ok(self.tables.read().await.overrides.values().cloned().collect())
    }

    async fn apply_override(&self, row: UserOverride) -> AccessResult<OverrideWrite> {
        let mut tables = self.tables.write().await;
        let key = (row.user_id, row.permission_code.clone());

        match tables.overrides.get_mut(&key) {
            Some(existing) if existing.kind == row.kind => Ok(OverrideWrite::AlreadyPresent),
            Some(existing) => {
                let previous = existing.kind;
                *existing = row;
                Ok(OverrideWrite::Flipped { previous })
            }
            None => {
                tables.overrides.insert(key, row);
                Ok(OverrideWrite::Inserted)
            }
        }
    }

    async fn insert_override_if_absent(&self, row: UserOverride) -> AccessResult<bool> {
        let mut tables = self.tables.write().await;
        let key = (row.user_id, row.permission_code.clone());
        if tables.overrides.contains_key(&key) {
            return Ok(false);
        }
        tables.overrides.insert(key, row);
        Ok(true)
    }

    async fn delete_override(&self, user_id: UserId, code: &str) -> AccessResult<bool> {
        Ok(self.tables.write().await.overrides.remove(&(user_id, code.to_string())).is_some())
    }

    async fn delete_overrides(&self, keys: Vec<(UserId, String)>) -> AccessResult<usize> {
        let mut tables = self.tables.write().await;
        Ok(keys.into_iter().filter(|key| tables.overrides.remove(key).is_some()).count())
    }

    async fn upsert_edge(&self, manager: &str, member: &str) -> AccessResult<AssignmentEdge> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.find_edge_mut(manager, member) {
            existing.active = true;
            existing.created_at = Utc::now();
            return Ok(existing.clone());
        }

        let id = tables.allocate_edge_id();
        let edge = AssignmentEdge::new(id, manager, member);
        tables.edges.insert(id, edge.clone());
        Ok(edge)
    }

    async fn deactivate_edge(&self, id: EdgeId) -> AccessResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.edges.get_mut(&id) {
            Some(edge) if edge.active => {
                edge.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_edge_pair(&self, manager: &str, member: &str) -> AccessResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.find_edge_mut(manager, member) {
            Some(edge) if edge.active => {
                edge.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn active_members(&self, manager: &str) -> AccessResult<BTreeSet<String>> {
        let tables = self.tables.read().await;

        Ok(tables
            .edges
            .values()
            .filter(|e| e.active && e.manager_username == manager)
            .map(|e| e.member_username.clone())
            .collect())
    }

    async fn list_edges(&self) -> AccessResult<Vec<AssignmentEdge>> {
        Ok(self.tables.read().await.edges.values().cloned().collect())
    }
}
