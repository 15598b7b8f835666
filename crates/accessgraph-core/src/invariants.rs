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

//! Read-only consistency checks over stored data
//!
//! Nothing here repairs data. Ineffective protected overrides are removed by
//! [`OverrideManager::purge_ineffective_overrides`]; the other findings need
//! an operator decision.

use crate::error::AccessResult;
use crate::hierarchy::EdgeSnapshot;
use crate::model::{AssignmentEdge, UserId, UserOverride};
use crate::rbac::overrides::{OverrideManager, PurgedOverride};
use crate::store::AccessStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Active edge whose endpoints are not both active users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingEdge {
    pub edge: AssignmentEdge,
    pub invalid_usernames: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub ineffective_protected_overrides: Vec<PurgedOverride>,
    pub self_edges: Vec<AssignmentEdge>,
    pub dangling_edges: Vec<DanglingEdge>,
    /// Overrides on inactive permissions, excluding ineffective protected ones
    pub inactive_permission_overrides: Vec<UserOverride>,
    /// Each cycle once, as its sorted member list
    pub cycles: Vec<Vec<String>>,
}

impl InvariantReport {
    pub fn is_clean(&self) -> bool {
        self.ineffective_protected_overrides.is_empty()
            && self.self_edges.is_empty()
            && self.dangling_edges.is_empty()
            && self.inactive_permission_overrides.is_empty()
            && self.cycles.is_empty()
    }

    pub fn finding_count(&self) -> usize {
        self.ineffective_protected_overrides.len() + self.self_edges.len() + self.dangling_edges.len() + self.inactive_permission_overrides.len() + self.cycles.len()
    }
}

pub struct InvariantChecker {
    store: Arc<dyn AccessStore>,
    overrides: Arc<OverrideManager>,
}

impl InvariantChecker {
    pub fn new(store: Arc<dyn AccessStore>, overrides: Arc<OverrideManager>) -> Self {
        Self { store, overrides }
    }

    pub async fn check_invariants(&self) -> AccessResult<InvariantReport> {
        let edges = self.store.list_edges().await?;
        let users: HashMap<String, bool> = self.store.list_users().await?.into_iter().map(|u| (u.username, u.active)).collect();
        let active_codes: HashSet<String> = self.store.list_permissions().await?.into_iter().filter(|p| p.active).map(|p| p.code).collect();

        let self_edges: Vec<AssignmentEdge> = edges.iter().filter(|e| e.is_self_edge()).cloned().collect();

        let dangling_edges = edges
            .iter()
            .filter(|e| e.active)
            .filter_map(|edge| {
                let invalid_usernames: Vec<String> = [&edge.manager_username, &edge.member_username]
                    .into_iter()
                    .filter(|name| !users.get(*name).copied().unwrap_or(false))
                    .cloned()
                    .collect();
                (!invalid_usernames.is_empty()).then(|| DanglingEdge {
                    edge: edge.clone(),
                    invalid_usernames,
                })
            })
            .collect();

        // Rows already reported as ineffective are not counted again
        let ineffective_protected_overrides = self.overrides.ineffective_overrides().await?;
        let ineffective_keys: HashSet<(UserId, &str)> = ineffective_protected_overrides.iter().map(|row| (row.user_id, row.permission_code.as_str())).collect();

        let inactive_permission_overrides = self
            .store
            .list_overrides()
            .await?
            .into_iter()
            .filter(|row| !active_codes.contains(&row.permission_code))
            .filter(|row| !ineffective_keys.contains(&(row.user_id, row.permission_code.as_str())))
            .collect();

        let report = InvariantReport {
            ineffective_protected_overrides,
            self_edges,
            dangling_edges,
            inactive_permission_overrides,
            cycles: find_cycles(&edges),
        };

        if report.is_clean() {
            info!("Invariant check found no issues");
        } else {
            warn!(findings = report.finding_count(), "Invariant check found inconsistent data");
        }

        Ok(report)
    }
}

/// Strongly connected groups of two or more users among the active edges
pub fn find_cycles(edges: &[AssignmentEdge]) -> Vec<Vec<String>> {
    let snapshot = EdgeSnapshot::from_edges(edges.iter().filter(|e| !e.is_self_edge()));
    let reach: BTreeMap<&String, BTreeSet<String>> = snapshot.managers().map(|m| (m, snapshot.reachable(m, usize::MAX))).collect();

    let mut assigned: BTreeSet<&str> = BTreeSet::new();
    let mut cycles = Vec::new();

    for (node, reachable) in &reach {
        if assigned.contains(node.as_str()) {
            continue;
        }

        let mut component: Vec<String> = reachable
            .iter()
            .filter(|other| reach.get(*other).map(|back| back.contains(node.as_str())).unwrap_or(false))
            .cloned()
            .collect();
        if component.is_empty() {
            continue;
        }

        component.push((*node).clone());
        component.sort();
        for member in &component {
            if let Some((key, _)) = reach.get_key_value(member) {
                assigned.insert(key.as_str());
            }
        }
        cycles.push(component);
    }

    cycles
}
