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

//! Role policy store: default permission codes per role

use crate::audit::{self, AuditAction, AuditSink};
use crate::error::{AccessError, AccessResult};
use crate::model::{Actor, PROTECTED_ROLE, RoleGrant, is_recognized_role};
use crate::rbac::cache::{CacheKey, PermissionCache};
use crate::rbac::catalog;
use crate::store::AccessStore;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RolePolicy {
    store: Arc<dyn AccessStore>,
    cache: Arc<PermissionCache>,
    audit: Arc<dyn AuditSink>,
}

impl RolePolicy {
    pub fn new(store: Arc<dyn AccessStore>, cache: Arc<PermissionCache>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, cache, audit }
    }

    /// Active codes granted to `role` by default. Unrecognized roles hold nothing.
    pub async fn permissions_for_role(&self, role: &str) -> AccessResult<HashSet<String>> {
        if !is_recognized_role(role) {
            debug!(role = %role, "Unrecognized role resolves to an empty policy");
            return Ok(HashSet::new());
        }

        self.cache.role_codes(role, || self.store.role_permission_codes(role)).await
    }

    pub async fn grant_to_role(&self, actor: &Actor, role: &str, code: &str) -> AccessResult<()> {
        self.check_mutable_role(actor, role, code)?;

        catalog::active_permission(self.store.as_ref(), code).await?;

        if !self.store.insert_role_grant(RoleGrant::new(role, code)).await? {
            return Err(AccessError::no_op(format!("role '{}' already has permission '{}'", role, code)));
        }

        self.cache.invalidate(&CacheKey::Role(role.to_string()));
        info!(role = %role, code = %code, actor = %actor.username, "Permission granted to role");
        audit::emit(self.audit.as_ref(), &actor.username, AuditAction::RolePermissionAdded, audit::details([("role", json!(role)), ("permission", json!(code))])).await;

        Ok(())
    }

    pub async fn revoke_from_role(&self, actor: &Actor, role: &str, code: &str) -> AccessResult<()> {
        self.check_mutable_role(actor, role, code)?;

        if self.store.get_permission(code).await?.is_none() {
            return Err(AccessError::not_found(format!("permission '{}' does not exist", code)));
        }

        if !self.store.delete_role_grant(role, code).await? {
            return Err(AccessError::no_op(format!("role '{}' does not have permission '{}'", role, code)));
        }

        self.cache.invalidate(&CacheKey::Role(role.to_string()));
        info!(role = %role, code = %code, actor = %actor.username, "Permission revoked from role");
        audit::emit(self.audit.as_ref(), &actor.username, AuditAction::RolePermissionRemoved, audit::details([("role", json!(role)), ("permission", json!(code))])).await;

        Ok(())
    }

    fn check_mutable_role(&self, actor: &Actor, role: &str, code: &str) -> AccessResult<()> {
        if role == PROTECTED_ROLE {
            warn!(role = %role, code = %code, actor = %actor.username, "Rejected policy change on protected role");
            return Err(AccessError::ProtectedPermission {
                message: format!("the '{}' role policy cannot be modified", PROTECTED_ROLE),
            });
        }
        if !is_recognized_role(role) {
            return Err(AccessError::not_found(format!("role '{}' is not recognized", role)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::model::Permission;
    use crate::store::{MemoryStore, StoreSnapshot};
    use std::time::Duration;

    fn policy() -> RolePolicy {
        let store = MemoryStore::from_snapshot(StoreSnapshot {
            permissions: vec![Permission::new("sim_usar", "Use simulator", "simulador"), Permission::new("com_ver", "View committee", "comite")],
            role_grants: vec![RoleGrant::new("asesor", "sim_usar")],
            ..Default::default()
        });
        RolePolicy::new(Arc::new(store), Arc::new(PermissionCache::new(Duration::from_secs(60))), Arc::new(AuditLogger::new()))
    }

    fn admin() -> Actor {
        Actor::new(1, "ana", PROTECTED_ROLE)
    }

    #[tokio::test]
    async fn test_grant_is_visible_after_invalidation() {
        let policy = policy();

        assert!(!policy.permissions_for_role("asesor").await.unwrap().contains("com_ver"));
        policy.grant_to_role(&admin(), "asesor", "com_ver").await.unwrap();
        assert!(policy.permissions_for_role("asesor").await.unwrap().contains("com_ver"));

        policy.revoke_from_role(&admin(), "asesor", "com_ver").await.unwrap();
        assert!(!policy.permissions_for_role("asesor").await.unwrap().contains("com_ver"));
    }

    #[tokio::test]
    async fn test_rejections() {
        let policy = policy();

        let protected = policy.grant_to_role(&admin(), PROTECTED_ROLE, "com_ver").await.unwrap_err();
        assert_eq!(protected.error_code(), "protected_permission");

        let unknown_role = policy.grant_to_role(&admin(), "intern", "com_ver").await.unwrap_err();
        assert_eq!(unknown_role.error_code(), "not_found");

        let unknown_code = policy.grant_to_role(&admin(), "asesor", "nope").await.unwrap_err();
        assert_eq!(unknown_code.error_code(), "not_found");

        let duplicate = policy.grant_to_role(&admin(), "asesor", "sim_usar").await.unwrap_err();
        assert_eq!(duplicate.error_code(), "no_op");

        let missing = policy.revoke_from_role(&admin(), "asesor", "com_ver").await.unwrap_err();
        assert_eq!(missing.error_code(), "no_op");
    }

    #[tokio::test]
    async fn test_inactive_permission_cannot_be_granted() {
        let mut retired = Permission::new("legacy", "Legacy report", "reportes");
        retired.active = false;
        let store = MemoryStore::from_snapshot(StoreSnapshot {
            permissions: vec![retired],
            ..Default::default()
        });
        let policy = RolePolicy::new(Arc::new(store), Arc::new(PermissionCache::new(Duration::from_secs(60))), Arc::new(AuditLogger::new()));

        let err = policy.grant_to_role(&admin(), "asesor", "legacy").await.unwrap_err();
        assert_eq!(err.error_code(), "not_found");
        assert!(policy.permissions_for_role("asesor").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_role_is_empty() {
        assert!(policy().permissions_for_role("intern").await.unwrap().is_empty());
    }
}
