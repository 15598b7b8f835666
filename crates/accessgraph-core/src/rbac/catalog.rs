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

//! Permission catalog

use crate::audit::{self, AuditAction, AuditSink};
use crate::error::{AccessError, AccessResult};
use crate::model::{Actor, Permission};
use crate::rbac::cache::PermissionCache;
use crate::store::AccessStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Permissions of one functional module, ordered by label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGroup {
    pub module: String,
    pub permissions: Vec<Permission>,
}

/// Registry of permission codes
pub struct PermissionCatalog {
    store: Arc<dyn AccessStore>,
    cache: Arc<PermissionCache>,
    audit: Arc<dyn AuditSink>,
}

impl PermissionCatalog {
    pub fn new(store: Arc<dyn AccessStore>, cache: Arc<PermissionCache>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, cache, audit }
    }

    /// Add a catalog entry. A code that already exists is left untouched.
    pub async fn register_permission(&self, permission: Permission) -> AccessResult<()> {
        let code = permission.code.clone();
        if !self.store.insert_permission(permission).await? {
            return Err(AccessError::no_op(format!("permission '{}' is already registered", code)));
        }
        info!(code = %code, "Permission registered");
        Ok(())
    }

    pub async fn get(&self, code: &str) -> AccessResult<Option<Permission>> {
        self.store.get_permission(code).await
    }

    /// Fetch an active permission, treating inactive ones as unknown
    pub async fn require_active(&self, code: &str) -> AccessResult<Permission> {
        active_permission(self.store.as_ref(), code).await
    }

    pub async fn active_codes(&self) -> AccessResult<HashSet<String>> {
        Ok(self.store.list_permissions().await?.into_iter().filter(|p| p.active).map(|p| p.code).collect())
    }

    pub async fn list_active(&self) -> AccessResult<Vec<Permission>> {
        Ok(self.store.list_permissions().await?.into_iter().filter(|p| p.active).collect())
    }

    /// Every permission grouped by module, ordered by module then label
    pub async fn catalog_by_module(&self) -> AccessResult<Vec<ModuleGroup>> {
        let mut modules: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
        for permission in self.store.list_permissions().await? {
            modules.entry(permission.module.clone()).or_default().push(permission);
        }

        Ok(modules
            .into_iter()
            .map(|(module, mut permissions)| {
                permissions.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.code.cmp(&b.code)));
                ModuleGroup { module, permissions }
            })
            .collect())
    }

    pub async fn deactivate_permission(&self, actor: &Actor, code: &str) -> AccessResult<()> {
        self.set_active(actor, code, false).await
    }

    pub async fn reactivate_permission(&self, actor: &Actor, code: &str) -> AccessResult<()> {
        self.set_active(actor, code, true).await
    }

    async fn set_active(&self, actor: &Actor, code: &str, active: bool) -> AccessResult<()> {
        let permission = self.store.get_permission(code).await?.ok_or_else(|| AccessError::not_found(format!("permission '{}' does not exist", code)))?;

        if permission.active == active {
            let state = if active { "active" } else { "inactive" };
            return Err(AccessError::no_op(format!("permission '{}' is already {}", code, state)));
        }

        self.store.set_permission_active(code, active).await?;
        // Role policies and override sets both filter on the active flag
        self.cache.invalidate_all();

        let action = if active { AuditAction::PermissionReactivated } else { AuditAction::PermissionDeactivated };
        info!(code = %code, active = active, actor = %actor.username, "Permission active flag changed");
        audit::emit(self.audit.as_ref(), &actor.username, action, audit::details([("permission", json!(code))])).await;

        Ok(())
    }
}

/// Look up `code` as an active permission; inactive entries count as unknown
pub(crate) async fn active_permission(store: &dyn AccessStore, code: &str) -> AccessResult<Permission> {
    match store.get_permission(code).await? {
        Some(permission) if permission.active => Ok(permission),
        _ => Err(AccessError::not_found(format!("permission '{}' does not exist or is inactive", code))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn catalog() -> (PermissionCatalog, Arc<AuditLogger>) {
        let audit = Arc::new(AuditLogger::new());
        let catalog = PermissionCatalog::new(Arc::new(MemoryStore::new()), Arc::new(PermissionCache::new(Duration::from_secs(60))), audit.clone());
        (catalog, audit)
    }

    #[tokio::test]
    async fn test_register_duplicate_is_noop() {
        let (catalog, _) = catalog();

        catalog.register_permission(Permission::new("sim_usar", "Use simulator", "simulador")).await.unwrap();
        let err = catalog.register_permission(Permission::new("sim_usar", "Other label", "simulador")).await.unwrap_err();

        assert_eq!(err.error_code(), "no_op");
        assert_eq!(catalog.get("sim_usar").await.unwrap().unwrap().label, "Use simulator");
    }

    #[tokio::test]
    async fn test_deactivation_is_logical() {
        let (catalog, audit) = catalog();
        let actor = Actor::new(1, "ana", "admin");

        catalog.register_permission(Permission::new("com_ver", "View committee", "comite")).await.unwrap();
        catalog.deactivate_permission(&actor, "com_ver").await.unwrap();

        assert!(catalog.get("com_ver").await.unwrap().is_some());
        assert!(catalog.active_codes().await.unwrap().is_empty());
        assert!(matches!(catalog.require_active("com_ver").await, Err(AccessError::NotFound { .. })));
        assert!(matches!(catalog.deactivate_permission(&actor, "com_ver").await, Err(AccessError::NoOp { .. })));

        catalog.reactivate_permission(&actor, "com_ver").await.unwrap();
        assert!(catalog.require_active("com_ver").await.is_ok());
        assert_eq!(audit.get_events(None).await.len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_by_module_ordering() {
        let (catalog, _) = catalog();

        catalog.register_permission(Permission::new("usr_ver", "View users", "usuarios")).await.unwrap();
        catalog.register_permission(Permission::new("usr_crear", "Create users", "usuarios")).await.unwrap();
        catalog.register_permission(Permission::new("com_ver", "View committee", "comite")).await.unwrap();

        let groups = catalog.catalog_by_module().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].module, "comite");
        assert_eq!(groups[1].permissions[0].code, "usr_crear");
    }
}
