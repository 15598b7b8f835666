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

//! Manager -> member assignment graph
//!
//! Edges are soft-removed and may form cycles. Expansion is a breadth-first
//! walk over one snapshot of the active edges, with a visited set and a
//! depth bound.

use crate::audit::{self, AuditAction, AuditSink};
use crate::error::{AccessError, AccessResult};
use crate::model::{Actor, AssignmentEdge, EdgeId, MANAGER_ROLES, UserRecord};
use crate::store::AccessStore;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Adjacency of the active edges at one point in time
#[derive(Debug, Default, Clone)]
pub struct EdgeSnapshot {
    adjacency: HashMap<String, BTreeSet<String>>,
}

impl EdgeSnapshot {
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a AssignmentEdge>) -> Self {
        let mut adjacency: HashMap<String, BTreeSet<String>> = HashMap::new();
        for edge in edges.into_iter().filter(|e| e.active) {
            adjacency.entry(edge.manager_username.clone()).or_default().insert(edge.member_username.clone());
        }
        Self { adjacency }
    }

    pub fn members_of(&self, manager: &str) -> impl Iterator<Item = &String> {
        self.adjacency.get(manager).into_iter().flatten()
    }

    pub fn managers(&self) -> impl Iterator<Item = &String> {
        self.adjacency.keys()
    }

    /// Usernames reachable from `root` within `max_depth` levels. `root`
    /// itself is never part of the result, even through a cycle.
    pub fn reachable(&self, root: &str, max_depth: usize) -> BTreeSet<String> {
        let mut visited: BTreeSet<&str> = BTreeSet::from([root]);
        let mut result = BTreeSet::new();
        let mut frontier = vec![root];
        let mut depth = 0;

        while !frontier.is_empty() && depth < max_depth {
            let mut next_frontier = Vec::new();
            for manager in frontier {
                for member in self.members_of(manager) {
                    if visited.insert(member.as_str()) {
                        result.insert(member.clone());
                        next_frontier.push(member.as_str());
                    }
                }
            }
            frontier = next_frontier;
            depth += 1;
        }

        result
    }
}

pub struct AssignmentGraph {
    store: Arc<dyn AccessStore>,
    audit: Arc<dyn AuditSink>,
}

impl AssignmentGraph {
    pub fn new(store: Arc<dyn AccessStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Create the edge, or reactivate the existing one for the pair
    pub async fn add_edge(&self, actor: &Actor, manager: &str, member: &str) -> AccessResult<AssignmentEdge> {
        if manager == member {
            warn!(manager = %manager, "Rejected self-assignment");
            return Err(AccessError::invalid_assignment(format!("'{}' cannot be assigned to themselves", manager)));
        }
        self.require_active_user(manager).await?;
        self.require_active_user(member).await?;

        let edge = self.store.upsert_edge(manager, member).await?;

        info!(edge_id = edge.id, manager = %manager, member = %member, actor = %actor.username, "Assignment added");
        audit::emit(
            self.audit.as_ref(),
            &actor.username,
            AuditAction::AssignmentAdded,
            audit::details([("edge_id", json!(edge.id)), ("manager", json!(manager)), ("member", json!(member))]),
        )
        .await;

        Ok(edge)
    }

    /// Soft-remove by ID; false when missing or already inactive
    pub async fn remove_edge_by_id(&self, actor: &Actor, id: EdgeId) -> AccessResult<bool> {
        let removed = self.store.deactivate_edge(id).await?;
        if removed {
            info!(edge_id = id, actor = %actor.username, "Assignment removed");
            audit::emit(self.audit.as_ref(), &actor.username, AuditAction::AssignmentRemoved, audit::details([("edge_id", json!(id))])).await;
        }
        Ok(removed)
    }

    /// Soft-remove by pair; false when missing or already inactive
    pub async fn remove_edge(&self, actor: &Actor, manager: &str, member: &str) -> AccessResult<bool> {
        let removed = self.store.deactivate_edge_pair(manager, member).await?;
        if removed {
            info!(manager = %manager, member = %member, actor = %actor.username, "Assignment removed");
            audit::emit(
                self.audit.as_ref(),
                &actor.username,
                AuditAction::AssignmentRemoved,
                audit::details([("manager", json!(manager)), ("member", json!(member))]),
            )
            .await;
        }
        Ok(removed)
    }

    pub async fn direct_members(&self, manager: &str) -> AccessResult<BTreeSet<String>> {
        self.store.active_members(manager).await
    }

    pub async fn transitive_members(&self, root: &str, max_depth: usize) -> AccessResult<BTreeSet<String>> {
        let snapshot = self.snapshot().await?;
        let members = snapshot.reachable(root, max_depth);
        debug!(root = %root, max_depth = max_depth, count = members.len(), "Expanded team");
        Ok(members)
    }

    pub async fn snapshot(&self) -> AccessResult<EdgeSnapshot> {
        let edges = self.store.list_edges().await?;
        Ok(EdgeSnapshot::from_edges(&edges))
    }

    /// Active edges ordered by manager, then member
    pub async fn list_active_edges(&self) -> AccessResult<Vec<AssignmentEdge>> {
        let mut edges: Vec<AssignmentEdge> = self.store.list_edges().await?.into_iter().filter(|e| e.active).collect();
        edges.sort_by(|a, b| a.manager_username.cmp(&b.manager_username).then_with(|| a.member_username.cmp(&b.member_username)));
        Ok(edges)
    }

    /// Active users whose role may own assignments, ordered by username
    pub async fn assignable_managers(&self) -> AccessResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.store.list_users().await?.into_iter().filter(|u| u.active && MANAGER_ROLES.contains(&u.role.as_str())).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn require_active_user(&self, username: &str) -> AccessResult<()> {
        match self.store.get_user_by_username(username).await? {
            Some(user) if user.active => Ok(()),
            _ => Err(AccessError::invalid_assignment(format!("'{}' is not an active user", username))),
        }
    }
}
