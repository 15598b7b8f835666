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

//! Property tests for team expansion and effective-permission composition

use accessgraph_core::hierarchy::EdgeSnapshot;
use accessgraph_core::invariants::find_cycles;
use accessgraph_core::rbac::PROTECTED_PERMISSIONS;
use accessgraph_core::{AccessEngine, Actor, AssignmentEdge, AuditLogger, EngineConfig, MemoryStore, OverrideKind, StoreSnapshot, UserOverride, UserRecord};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const NODES: &[&str] = &["a", "b", "c", "d", "e", "f", "g", "h"];

fn edges_strategy() -> impl Strategy<Value = Vec<AssignmentEdge>> {
    prop::collection::vec((0..NODES.len(), 0..NODES.len(), any::<bool>()), 0..24).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .map(|(i, (from, to, active))| {
                let mut edge = AssignmentEdge::new(i as u64 + 1, NODES[from], NODES[to]);
                edge.active = active;
                edge
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_root_never_in_own_team(edges in edges_strategy(), root in 0..NODES.len(), depth in 0usize..8) {
        let snapshot = EdgeSnapshot::from_edges(&edges);
        prop_assert!(!snapshot.reachable(NODES[root], depth).contains(NODES[root]));
    }

    #[test]
    fn prop_team_grows_with_depth(edges in edges_strategy(), root in 0..NODES.len(), depth in 0usize..8) {
        let snapshot = EdgeSnapshot::from_edges(&edges);
        let shallow = snapshot.reachable(NODES[root], depth);
        let deep = snapshot.reachable(NODES[root], depth + 1);
        prop_assert!(shallow.is_subset(&deep));
    }

    #[test]
    fn prop_team_uses_only_active_edges(edges in edges_strategy(), root in 0..NODES.len()) {
        let snapshot = EdgeSnapshot::from_edges(&edges);
        let reachable_members: BTreeSet<&str> = edges.iter().filter(|e| e.active).map(|e| e.member_username.as_str()).collect();

        for member in snapshot.reachable(NODES[root], usize::MAX) {
            prop_assert!(reachable_members.contains(member.as_str()));
        }
    }

    #[test]
    fn prop_cycle_members_reach_each_other(edges in edges_strategy()) {
        let snapshot = EdgeSnapshot::from_edges(edges.iter().filter(|e| !e.is_self_edge()));

        for cycle in find_cycles(&edges) {
            prop_assert!(cycle.len() >= 2);
            for a in &cycle {
                let reach = snapshot.reachable(a, usize::MAX);
                for b in cycle.iter().filter(|b| *b != a) {
                    prop_assert!(reach.contains(b));
                }
            }
        }
    }

    #[test]
    fn prop_protected_set_survives_any_overrides(mask in prop::collection::vec(any::<bool>(), PROTECTED_PERMISSIONS.len())) {
        let overrides = PROTECTED_PERMISSIONS
            .iter()
            .zip(mask)
            .filter(|(_, removed)| *removed)
            .map(|(code, _)| UserOverride::new(1, *code, OverrideKind::Remove, "legacy"))
            .collect();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let effective = runtime.block_on(async {
            let store = MemoryStore::from_snapshot(StoreSnapshot {
                users: vec![UserRecord::new(1, "ana", "admin")],
                overrides,
                ..Default::default()
            });
            let engine = AccessEngine::new(Arc::new(store), Arc::new(AuditLogger::new()), EngineConfig::default());
            engine.seed_default_catalog().await.unwrap();
            engine.effective_permissions(&Actor::new(1, "ana", "admin")).await.unwrap()
        });

        for code in PROTECTED_PERMISSIONS {
            prop_assert!(effective.contains(*code));
        }
    }
}
