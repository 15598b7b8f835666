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

//! End-to-end scenarios over the engine with the default catalog

use accessgraph_core::rbac::PROTECTED_PERMISSIONS;
use accessgraph_core::{AccessEngine, AccessError, Actor, AuditAction, AuditLogger, EngineConfig, MemoryStore, Scope, StoreSnapshot, UserRecord, VisibilityContext};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

struct Harness {
    engine: AccessEngine,
    audit: Arc<AuditLogger>,
}

async fn harness() -> Harness {
    let store = MemoryStore::from_snapshot(StoreSnapshot {
        users: vec![
            UserRecord::new(1, "ana", "admin"),
            UserRecord::new(2, "root", "admin"),
            UserRecord::new(3, "gerente", "gerente"),
            UserRecord::new(4, "supervisor", "supervisor"),
            UserRecord::new(5, "asesor1", "asesor"),
            UserRecord::new(6, "asesor2", "asesor"),
            UserRecord::new(7, "auditor", "auditor"),
        ],
        ..Default::default()
    });
    let audit = Arc::new(AuditLogger::new());
    let engine = AccessEngine::new(Arc::new(store), audit.clone(), EngineConfig::default());
    engine.seed_default_catalog().await.unwrap();
    Harness { engine, audit }
}

fn ana() -> Actor {
    Actor::new(1, "ana", "admin")
}

fn root() -> Actor {
    Actor::new(2, "root", "admin")
}

fn asesor1() -> Actor {
    Actor::new(5, "asesor1", "asesor")
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_grant_then_restore_round_trip() {
    let h = harness().await;
    let user = asesor1();

    assert!(!h.engine.has_permission(&user, "com_ver").await.unwrap());

    h.engine.grant_override(&ana(), user.user_id, "com_ver", Some("committee rotation".to_string())).await.unwrap();
    assert!(h.engine.has_permission(&user, "com_ver").await.unwrap());

    h.engine.restore_override(&ana(), user.user_id, "com_ver").await.unwrap();
    assert!(!h.engine.has_permission(&user, "com_ver").await.unwrap());
}

#[tokio::test]
async fn test_protected_permissions_cannot_be_revoked() {
    let h = harness().await;

    for code in PROTECTED_PERMISSIONS {
        let err = h.engine.revoke_override(&ana(), root().user_id, code, None).await.unwrap_err();
        assert!(matches!(err, AccessError::ProtectedPermission { .. }), "{} was not protected", code);
        assert!(h.engine.has_permission(&root(), code).await.unwrap());
    }

    let detail = h.engine.permission_detail(root().user_id).await.unwrap();
    assert!(detail.removed.is_empty());
    assert!(detail.ineffective_removals.is_empty());
}

#[tokio::test]
async fn test_self_modification_is_always_rejected() {
    let h = harness().await;
    let user = asesor1();

    for code in ["sim_usar", "com_ver", "usr_ver"] {
        let grant = h.engine.grant_override(&user, user.user_id, code, None).await.unwrap_err();
        assert!(matches!(grant, AccessError::SelfModification { .. }));

        let revoke = h.engine.revoke_override(&user, user.user_id, code, None).await.unwrap_err();
        assert!(matches!(revoke, AccessError::SelfModification { .. }));
    }

    let own_admin = h.engine.revoke_override(&ana(), ana().user_id, "sim_usar", None).await.unwrap_err();
    assert!(matches!(own_admin, AccessError::SelfModification { .. }));
}

#[tokio::test]
async fn test_second_grant_is_noop() {
    let h = harness().await;
    let user = asesor1();

    h.engine.grant_override(&ana(), user.user_id, "com_ver", None).await.unwrap();
    let before = h.engine.effective_permissions(&user).await.unwrap();

    let err = h.engine.grant_override(&root(), user.user_id, "com_ver", None).await.unwrap_err();
    assert!(matches!(err, AccessError::NoOp { .. }));
    assert_eq!(h.engine.effective_permissions(&user).await.unwrap(), before);

    let added = h.audit.get_events_by_action(AuditAction::PermissionAdded, None).await;
    assert_eq!(added.len(), 1);
}

#[tokio::test]
async fn test_transitive_team_expansion() {
    let h = harness().await;

    h.engine.add_edge(&ana(), "gerente", "supervisor").await.unwrap();
    h.engine.add_edge(&ana(), "supervisor", "asesor1").await.unwrap();
    h.engine.add_edge(&ana(), "supervisor", "asesor2").await.unwrap();

    assert_eq!(h.engine.transitive_members("gerente", 5).await.unwrap(), names(&["supervisor", "asesor1", "asesor2"]));
    assert_eq!(h.engine.transitive_members("supervisor", 5).await.unwrap(), names(&["asesor1", "asesor2"]));
    assert_eq!(h.engine.transitive_members("gerente", 1).await.unwrap(), names(&["supervisor"]));
}

#[tokio::test]
async fn test_cycle_terminates_without_root() {
    let h = harness().await;

    h.engine.add_edge(&ana(), "supervisor", "gerente").await.unwrap();
    h.engine.add_edge(&ana(), "gerente", "supervisor").await.unwrap();

    assert_eq!(h.engine.transitive_members("supervisor", 5).await.unwrap(), names(&["gerente"]));

    let report = h.engine.check_invariants().await.unwrap();
    assert_eq!(report.cycles, vec![vec!["gerente".to_string(), "supervisor".to_string()]]);
}

#[tokio::test]
async fn test_all_scope_wins_over_team() {
    let h = harness().await;
    let supervisor = Actor::new(4, "supervisor", "supervisor");

    h.engine.grant_override(&ana(), supervisor.user_id, "sim_hist_todos", None).await.unwrap();

    let result = h.engine.resolve_visible_actors(&supervisor, VisibilityContext::Simulations).await.unwrap();
    assert_eq!(result.scope, Scope::All);
    assert_eq!(result.usernames, None);
}

#[tokio::test]
async fn test_team_scope_without_edges_is_empty() {
    let h = harness().await;
    let supervisor = Actor::new(4, "supervisor", "supervisor");

    let result = h.engine.resolve_visible_actors(&supervisor, VisibilityContext::Evaluations).await.unwrap();
    assert_eq!(result.scope, Scope::Team);
    assert_eq!(result.usernames, Some(BTreeSet::new()));
    assert!(!result.allows("supervisor"));
}

#[tokio::test]
async fn test_own_and_none_scopes() {
    let h = harness().await;

    let own = h.engine.resolve_visible_actors(&asesor1(), VisibilityContext::Metrics).await.unwrap();
    assert_eq!(own.scope, Scope::Own);
    assert_eq!(own.usernames, Some(names(&["asesor1"])));

    h.engine.revoke_override(&ana(), asesor1().user_id, "rep_metricas_propio", None).await.unwrap();
    let none = h.engine.resolve_visible_actors(&asesor1(), VisibilityContext::Metrics).await.unwrap();
    assert_eq!(none.scope, Scope::None);
    assert_eq!(none.usernames, Some(BTreeSet::new()));
}

#[tokio::test]
async fn test_override_is_visible_after_cached_read() {
    let h = harness().await;
    let user = asesor1();

    // Warm the cache first
    assert!(!h.engine.has_permission(&user, "sco_hist_todos").await.unwrap());
    assert!(h.engine.cache_stats().current_size > 0);

    h.engine.grant_override(&ana(), user.user_id, "sco_hist_todos", None).await.unwrap();
    assert!(h.engine.effective_permissions(&user).await.unwrap().contains("sco_hist_todos"));
}

#[tokio::test]
async fn test_role_policy_change_reaches_role_members() {
    let h = harness().await;
    let user = asesor1();

    assert!(!h.engine.has_permission(&user, "com_ver").await.unwrap());
    h.engine.grant_to_role(&ana(), "asesor", "com_ver").await.unwrap();
    assert!(h.engine.has_permission(&user, "com_ver").await.unwrap());

    let err = h.engine.grant_to_role(&ana(), "admin", "com_ver").await.unwrap_err();
    assert!(matches!(err, AccessError::ProtectedPermission { .. }));
}

#[tokio::test]
async fn test_concurrent_reads_agree() {
    let h = harness().await;
    let user = asesor1();

    let reads = join_all((0..32).map(|_| h.engine.effective_permissions(&user))).await;
    let first = reads[0].as_ref().unwrap().clone();
    assert!(reads.iter().all(|r| r.as_ref().unwrap() == &first));
}

#[tokio::test]
async fn test_denied_access_is_audited_with_role() {
    let h = harness().await;

    let err = h.engine.require_permission(&asesor1(), "usr_permisos").await.unwrap_err();
    assert_eq!(err.error_code(), "permission_denied");

    let denied = h.audit.get_events_by_action(AuditAction::AccessDenied, None).await;
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].actor, "asesor1");
    assert_eq!(denied[0].details.get("user_role").and_then(|v| v.as_str()), Some("asesor"));
}
