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

//! Effective-permission resolution
//!
//! `effective = (base ∪ added) − removed`, where `base` is the role policy,
//! or every active catalog code for the protected role. The protected role
//! then gets the protected set back regardless of its overrides.

use crate::error::AccessResult;
use crate::model::Actor;
use crate::rbac::catalog::PermissionCatalog;
use crate::rbac::guard::PROTECTED_PERMISSIONS;
use crate::rbac::overrides::OverrideManager;
use crate::rbac::policy::RolePolicy;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct PermissionResolver {
    catalog: Arc<PermissionCatalog>,
    policy: Arc<RolePolicy>,
    overrides: Arc<OverrideManager>,
    slow_check_threshold: Duration,
}

impl PermissionResolver {
    pub fn new(catalog: Arc<PermissionCatalog>, policy: Arc<RolePolicy>, overrides: Arc<OverrideManager>, slow_check_threshold: Duration) -> Self {
        Self {
            catalog,
            policy,
            overrides,
            slow_check_threshold,
        }
    }

    /// Final permission set of `actor`
    pub async fn effective_permissions(&self, actor: &Actor) -> AccessResult<BTreeSet<String>> {
        let protected = actor.is_protected_role();

        let base = if protected { self.catalog.active_codes().await? } else { self.policy.permissions_for_role(&actor.role).await? };
        let overrides = self.overrides.overrides_for(actor.user_id).await?;

        let mut effective: BTreeSet<String> = base.into_iter().chain(overrides.added).filter(|code| !overrides.removed.contains(code)).collect();

        if protected {
            effective.extend(PROTECTED_PERMISSIONS.iter().map(|c| c.to_string()));
        }

        debug!(user_id = actor.user_id, role = %actor.role, count = effective.len(), "Resolved effective permissions");
        Ok(effective)
    }

    pub async fn has_permission(&self, actor: &Actor, code: &str) -> AccessResult<bool> {
        let start_time = Instant::now();
        let granted = self.effective_permissions(actor).await?.contains(code);
        self.observe(actor, code, granted, start_time);
        Ok(granted)
    }

    /// True when at least one of `codes` is held; false for an empty list
    pub async fn has_any(&self, actor: &Actor, codes: &[&str]) -> AccessResult<bool> {
        let effective = self.effective_permissions(actor).await?;
        Ok(codes.iter().any(|code| effective.contains(*code)))
    }

    /// True when every one of `codes` is held; true for an empty list
    pub async fn has_all(&self, actor: &Actor, codes: &[&str]) -> AccessResult<bool> {
        let effective = self.effective_permissions(actor).await?;
        Ok(codes.iter().all(|code| effective.contains(*code)))
    }

    fn observe(&self, actor: &Actor, code: &str, granted: bool, start_time: Instant) {
        let duration = start_time.elapsed();

        if duration > self.slow_check_threshold {
            warn!(
                user_id = actor.user_id,
                code = %code,
                duration_ms = %duration.as_millis(),
                "Slow permission check detected"
            );
        }

        debug!(
            user_id = actor.user_id,
            code = %code,
            granted = granted,
            duration_ms = %duration.as_millis(),
            "Permission check completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::error::AccessError;
    use crate::model::{OverrideKind, Permission, RoleGrant, UserOverride, UserRecord};
    use crate::rbac::cache::PermissionCache;
    use crate::store::{AccessStore, MemoryStore, MockAccessStore, StoreSnapshot};
    use std::collections::HashSet;

    fn resolver_over(store: Arc<dyn AccessStore>) -> PermissionResolver {
        let cache = Arc::new(PermissionCache::new(Duration::from_secs(60)));
        let audit = Arc::new(AuditLogger::new());
        PermissionResolver::new(
            Arc::new(PermissionCatalog::new(store.clone(), cache.clone(), audit.clone())),
            Arc::new(RolePolicy::new(store.clone(), cache.clone(), audit.clone())),
            Arc::new(OverrideManager::new(store, cache, audit)),
            Duration::from_millis(5),
        )
    }

    fn seeded() -> PermissionResolver {
        let mut inactive = Permission::new("legacy", "Legacy", "reportes");
        inactive.active = false;

        let store = MemoryStore::from_snapshot(StoreSnapshot {
            users: vec![UserRecord::new(1, "ana", "admin"), UserRecord::new(2, "luis", "asesor")],
            permissions: vec![
                Permission::new("sim_usar", "Use simulator", "simulador"),
                Permission::new("com_ver", "View committee", "comite"),
                Permission::new("usr_ver", "View users", "usuarios"),
                inactive,
            ],
            role_grants: vec![RoleGrant::new("asesor", "sim_usar"), RoleGrant::new("asesor", "legacy")],
            overrides: vec![
                UserOverride::new(1, "usr_ver", OverrideKind::Remove, "legacy"),
                UserOverride::new(1, "com_ver", OverrideKind::Remove, "legacy"),
                UserOverride::new(2, "com_ver", OverrideKind::Add, "ana"),
            ],
            ..Default::default()
        });
        resolver_over(Arc::new(store))
    }

    #[tokio::test]
    async fn test_role_plus_added() {
        let resolver = seeded();
        let luis = Actor::new(2, "luis", "asesor");

        let effective = resolver.effective_permissions(&luis).await.unwrap();
        assert!(effective.contains("sim_usar"));
        assert!(effective.contains("com_ver"));
        assert!(!effective.contains("legacy"));

        assert!(resolver.has_any(&luis, &["usr_ver", "sim_usar"]).await.unwrap());
        assert!(!resolver.has_all(&luis, &["usr_ver", "sim_usar"]).await.unwrap());
        assert!(!resolver.has_any(&luis, &[]).await.unwrap());
        assert!(resolver.has_all(&luis, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_protected_role_keeps_protected_set() {
        let resolver = seeded();
        let ana = Actor::new(1, "ana", "admin");

        let effective = resolver.effective_permissions(&ana).await.unwrap();
        for code in PROTECTED_PERMISSIONS {
            assert!(effective.contains(*code), "missing {}", code);
        }
        // Non-protected removals still apply
        assert!(!effective.contains("com_ver"));
        assert!(effective.contains("sim_usar"));
    }

    #[tokio::test]
    async fn test_unrecognized_role_holds_only_added() {
        let resolver = seeded();
        let ghost = Actor::new(2, "luis", "intern");

        let effective = resolver.effective_permissions(&ghost).await.unwrap();
        assert_eq!(effective.into_iter().collect::<Vec<_>>(), vec!["com_ver".to_string()]);
    }

    #[tokio::test]
    async fn test_storage_failure_never_grants() {
        let mut store = MockAccessStore::new();
        store.expect_role_permission_codes().returning(|_| Ok(HashSet::from(["sim_usar".to_string()])));
        store.expect_overrides_for_user().returning(|_| Err(AccessError::Storage { message: "connection lost".to_string() }));

        let resolver = resolver_over(Arc::new(store));
        let result = resolver.has_permission(&Actor::new(2, "luis", "asesor"), "sim_usar").await;

        assert!(matches!(result, Err(AccessError::Storage { .. })));
    }
}
