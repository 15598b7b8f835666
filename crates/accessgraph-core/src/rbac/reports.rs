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

//! Read-only permission reports for administration screens

use crate::error::{AccessError, AccessResult};
use crate::model::{Actor, RECOGNIZED_ROLES, UserId};
use crate::rbac::catalog::PermissionCatalog;
use crate::rbac::guard::{self, PROTECTED_PERMISSIONS};
use crate::rbac::overrides::OverrideManager;
use crate::rbac::policy::RolePolicy;
use crate::rbac::resolver::PermissionResolver;
use crate::store::AccessStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Breakdown of how a user's effective set is composed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDetail {
    pub user_id: UserId,
    pub username: String,
    pub role: String,
    pub role_permissions: BTreeSet<String>,
    pub added: BTreeSet<String>,
    /// Removals that take effect
    pub removed: BTreeSet<String>,
    /// Removals neutralized by the protected-permission guard
    pub ineffective_removals: BTreeSet<String>,
    pub effective: BTreeSet<String>,
    pub protected: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixPermission {
    pub code: String,
    pub label: String,
    pub module: String,
}

/// Active catalog against recognized roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMatrix {
    /// Ordered by module, then label
    pub permissions: Vec<MatrixPermission>,
    pub roles: Vec<String>,
    /// role -> code -> granted by the role policy
    pub matrix: BTreeMap<String, BTreeMap<String, bool>>,
    pub protected_permissions: Vec<String>,
}

impl PermissionMatrix {
    pub fn is_granted(&self, role: &str, code: &str) -> bool {
        self.matrix.get(role).and_then(|row| row.get(code)).copied().unwrap_or(false)
    }
}

pub struct PermissionReports {
    store: Arc<dyn AccessStore>,
    catalog: Arc<PermissionCatalog>,
    policy: Arc<RolePolicy>,
    overrides: Arc<OverrideManager>,
    resolver: Arc<PermissionResolver>,
}

impl PermissionReports {
    pub fn new(
        store: Arc<dyn AccessStore>,
        catalog: Arc<PermissionCatalog>,
        policy: Arc<RolePolicy>,
        overrides: Arc<OverrideManager>,
        resolver: Arc<PermissionResolver>,
    ) -> Self {
        Self {
            store,
            catalog,
            policy,
            overrides,
            resolver,
        }
    }

    pub async fn permission_detail(&self, user_id: UserId) -> AccessResult<PermissionDetail> {
        let user = self.store.get_user(user_id).await?.ok_or_else(|| AccessError::not_found(format!("user {} does not exist", user_id)))?;

        let role_permissions: BTreeSet<String> = self.policy.permissions_for_role(&user.role).await?.into_iter().collect();
        let overrides = self.overrides.overrides_for(user.id).await?;
        let (ineffective_removals, removed): (BTreeSet<String>, BTreeSet<String>) = overrides.removed.into_iter().partition(|code| guard::is_protected(&user.role, code));
        let effective = self.resolver.effective_permissions(&user.actor()).await?;

        Ok(PermissionDetail {
            user_id: user.id,
            username: user.username,
            role_permissions,
            added: overrides.added.into_iter().collect(),
            removed,
            ineffective_removals,
            effective,
            protected: guard::locked_for_role(&user.role),
            role: user.role,
        })
    }

    pub async fn permission_matrix(&self) -> AccessResult<PermissionMatrix> {
        let mut active = self.catalog.list_active().await?;
        active.sort_by(|a, b| a.module.cmp(&b.module).then_with(|| a.label.cmp(&b.label)));

        let mut matrix: BTreeMap<String, BTreeMap<String, bool>> = BTreeMap::new();
        for role in RECOGNIZED_ROLES {
            let granted = self.policy.permissions_for_role(role).await?;
            let row = active.iter().map(|p| (p.code.clone(), granted.contains(&p.code))).collect();
            matrix.insert(role.to_string(), row);
        }

        Ok(PermissionMatrix {
            permissions: active
                .into_iter()
                .map(|p| MatrixPermission {
                    code: p.code,
                    label: p.label,
                    module: p.module,
                })
                .collect(),
            roles: RECOGNIZED_ROLES.iter().map(|r| r.to_string()).collect(),
            matrix,
            protected_permissions: PROTECTED_PERMISSIONS.iter().map(|c| c.to_string()).collect(),
        })
    }

    /// Codes that cannot be removed from `actor`
    pub fn locked_permissions(&self, actor: &Actor) -> BTreeSet<String> {
        guard::locked_for_role(&actor.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::model::{OverrideKind, Permission, RoleGrant, UserOverride, UserRecord};
    use crate::rbac::cache::PermissionCache;
    use crate::store::{MemoryStore, StoreSnapshot};
    use std::time::Duration;

    fn reports() -> PermissionReports {
        let store: Arc<dyn AccessStore> = Arc::new(MemoryStore::from_snapshot(StoreSnapshot {
            users: vec![UserRecord::new(1, "ana", "admin"), UserRecord::new(2, "luis", "asesor")],
            permissions: vec![
                Permission::new("sim_usar", "Use simulator", "simulador"),
                Permission::new("usr_ver", "View users", "usuarios"),
                Permission::new("com_ver", "View committee", "comite"),
            ],
            role_grants: vec![RoleGrant::new("asesor", "sim_usar")],
            overrides: vec![UserOverride::new(1, "usr_ver", OverrideKind::Remove, "legacy"), UserOverride::new(1, "com_ver", OverrideKind::Remove, "legacy")],
            ..Default::default()
        }));
        let cache = Arc::new(PermissionCache::new(Duration::from_secs(60)));
        let audit = Arc::new(AuditLogger::new());
        let catalog = Arc::new(PermissionCatalog::new(store.clone(), cache.clone(), audit.clone()));
        let policy = Arc::new(RolePolicy::new(store.clone(), cache.clone(), audit.clone()));
        let overrides = Arc::new(OverrideManager::new(store.clone(), cache, audit));
        let resolver = Arc::new(PermissionResolver::new(catalog.clone(), policy.clone(), overrides.clone(), Duration::from_millis(5)));
        PermissionReports::new(store, catalog, policy, overrides, resolver)
    }

    #[tokio::test]
    async fn test_detail_splits_removals() {
        let detail = reports().permission_detail(1).await.unwrap();

        assert!(detail.ineffective_removals.contains("usr_ver"));
        assert!(detail.removed.contains("com_ver"));
        assert!(detail.effective.contains("usr_ver"));
        assert!(!detail.effective.contains("com_ver"));
        assert_eq!(detail.protected.len(), PROTECTED_PERMISSIONS.len());
    }

    #[tokio::test]
    async fn test_detail_unknown_user() {
        assert!(matches!(reports().permission_detail(42).await, Err(AccessError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_matrix_covers_recognized_roles() {
        let matrix = reports().permission_matrix().await.unwrap();

        assert_eq!(matrix.roles.len(), RECOGNIZED_ROLES.len());
        assert_eq!(matrix.permissions[0].module, "comite");
        assert!(matrix.is_granted("asesor", "sim_usar"));
        assert!(!matrix.is_granted("supervisor", "sim_usar"));
    }

    #[test]
    fn test_locked_permissions() {
        let reports = reports();
        assert!(reports.locked_permissions(&Actor::new(2, "luis", "asesor")).is_empty());
        assert!(reports.locked_permissions(&Actor::new(1, "ana", "admin")).contains("cfg_sco_editar"));
    }
}
