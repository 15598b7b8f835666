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

//! Route guards: permission and role requirements with denial auditing

use crate::audit::{self, AuditAction, AuditSink};
use crate::error::{AccessError, AccessResult};
use crate::model::Actor;
use crate::rbac::resolver::PermissionResolver;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a guarded operation demands of the actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Permission(String),
    AnyOf(Vec<String>),
    AllOf(Vec<String>),
    Role(Vec<String>),
}

impl Requirement {
    fn kind(&self) -> &'static str {
        match self {
            Requirement::Permission(_) => "permission",
            Requirement::AnyOf(_) => "any",
            Requirement::AllOf(_) => "all",
            Requirement::Role(_) => "role",
        }
    }

    fn required(&self) -> Vec<String> {
        match self {
            Requirement::Permission(code) => vec![code.clone()],
            Requirement::AnyOf(items) | Requirement::AllOf(items) | Requirement::Role(items) => items.clone(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.required().join(","))
    }
}

pub struct AccessEnforcer {
    resolver: Arc<PermissionResolver>,
    audit: Arc<dyn AuditSink>,
}

impl AccessEnforcer {
    pub fn new(resolver: Arc<PermissionResolver>, audit: Arc<dyn AuditSink>) -> Self {
        Self { resolver, audit }
    }

    pub async fn require_permission(&self, actor: &Actor, code: &str) -> AccessResult<()> {
        let granted = self.resolver.has_permission(actor, code).await?;
        self.conclude(actor, Requirement::Permission(code.to_string()), granted).await
    }

    pub async fn require_any(&self, actor: &Actor, codes: &[&str]) -> AccessResult<()> {
        let granted = self.resolver.has_any(actor, codes).await?;
        self.conclude(actor, Requirement::AnyOf(owned(codes)), granted).await
    }

    pub async fn require_all(&self, actor: &Actor, codes: &[&str]) -> AccessResult<()> {
        let granted = self.resolver.has_all(actor, codes).await?;
        self.conclude(actor, Requirement::AllOf(owned(codes)), granted).await
    }

    /// Role check against the actor's role tag only; overrides play no part
    pub async fn require_role(&self, actor: &Actor, roles: &[&str]) -> AccessResult<()> {
        let granted = roles.contains(&actor.role.as_str());
        self.conclude(actor, Requirement::Role(owned(roles)), granted).await
    }

    async fn conclude(&self, actor: &Actor, requirement: Requirement, granted: bool) -> AccessResult<()> {
        if granted {
            debug!(user_id = actor.user_id, requirement = %requirement, "Access granted");
            return Ok(());
        }

        warn!(user_id = actor.user_id, role = %actor.role, requirement = %requirement, "Access denied");
        let details = audit::details([
            ("requirement", json!(requirement.kind())),
            ("required", json!(requirement.required())),
            ("user_role", json!(actor.role)),
        ]);
        audit::emit(self.audit.as_ref(), &actor.username, AuditAction::AccessDenied, details).await;

        Err(AccessError::PermissionDenied {
            message: format!("'{}' does not satisfy {}", actor.username, requirement),
        })
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::model::{Permission, RoleGrant};
    use crate::rbac::cache::PermissionCache;
    use crate::rbac::catalog::PermissionCatalog;
    use crate::rbac::overrides::OverrideManager;
    use crate::rbac::policy::RolePolicy;
    use crate::store::{AccessStore, MemoryStore, StoreSnapshot};
    use std::time::Duration;

    fn enforcer() -> (AccessEnforcer, Arc<AuditLogger>) {
        let store: Arc<dyn AccessStore> = Arc::new(MemoryStore::from_snapshot(StoreSnapshot {
            permissions: vec![Permission::new("sim_usar", "Use simulator", "simulador"), Permission::new("com_ver", "View committee", "comite")],
            role_grants: vec![RoleGrant::new("asesor", "sim_usar")],
            ..Default::default()
        }));
        let cache = Arc::new(PermissionCache::new(Duration::from_secs(60)));
        let audit = Arc::new(AuditLogger::new());
        let resolver = PermissionResolver::new(
            Arc::new(PermissionCatalog::new(store.clone(), cache.clone(), audit.clone())),
            Arc::new(RolePolicy::new(store.clone(), cache.clone(), audit.clone())),
            Arc::new(OverrideManager::new(store, cache, audit.clone())),
            Duration::from_millis(5),
        );
        (AccessEnforcer::new(Arc::new(resolver), audit.clone()), audit)
    }

    #[tokio::test]
    async fn test_granted_requirements_are_silent() {
        let (enforcer, audit) = enforcer();
        let luis = Actor::new(2, "luis", "asesor");

        enforcer.require_permission(&luis, "sim_usar").await.unwrap();
        enforcer.require_any(&luis, &["com_ver", "sim_usar"]).await.unwrap();
        enforcer.require_role(&luis, &["asesor", "supervisor"]).await.unwrap();

        assert!(audit.get_events(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_denial_is_audited() {
        let (enforcer, audit) = enforcer();
        let luis = Actor::new(2, "luis", "asesor");

        let err = enforcer.require_all(&luis, &["com_ver", "sim_usar"]).await.unwrap_err();
        assert_eq!(err.error_code(), "permission_denied");

        let err = enforcer.require_role(&luis, &["comite_credito", "admin"]).await.unwrap_err();
        assert!(matches!(err, AccessError::PermissionDenied { .. }));

        let events = audit.get_events_by_action(AuditAction::AccessDenied, None).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].details.get("requirement"), Some(&json!("role")));
        assert_eq!(events[1].details.get("user_role"), Some(&json!("asesor")));
    }
}
