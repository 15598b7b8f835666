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

//! Administrative endpoints returning structured mutation outcomes
//!
//! Every endpoint first checks that the caller holds the administrative
//! permission for the area, then runs the mutation. Errors never escape as
//! `Err`; they are folded into [`MutationOutcome`].

use crate::engine::AccessEngine;
use crate::error::{AccessError, AccessResult};
use crate::model::{Actor, EdgeId, UserId};
use crate::store::OverrideWrite;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// Permission required for override and role-policy administration
pub const MANAGE_PERMISSIONS: &str = "usr_permisos";

/// Permission required for assignment administration
pub const MANAGE_ASSIGNMENTS: &str = "usr_asignaciones_equipo";

/// Result of an administrative mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl MutationOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
        }
    }

    pub fn failed(error: &AccessError) -> Self {
        Self {
            success: false,
            message: error.message().to_string(),
            error_code: Some(error.error_code().to_string()),
        }
    }

    fn from_result<T>(result: AccessResult<T>, describe: impl FnOnce(T) -> String) -> Self {
        match result {
            Ok(value) => Self::ok(describe(value)),
            Err(e) => Self::failed(&e),
        }
    }
}

pub struct AdminService {
    engine: Arc<AccessEngine>,
}

impl AdminService {
    pub fn new(engine: Arc<AccessEngine>) -> Self {
        Self { engine }
    }

    pub async fn grant_override(&self, actor: &Actor, target: UserId, code: &str, reason: Option<String>) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_PERMISSIONS, self.engine.grant_override(actor, target, code, reason)).await;
        MutationOutcome::from_result(result, |write| match write {
            OverrideWrite::Flipped { .. } => format!("Removal of '{}' reverted for user {}", code, target),
            _ => format!("Permission '{}' added for user {}", code, target),
        })
    }

    pub async fn revoke_override(&self, actor: &Actor, target: UserId, code: &str, reason: Option<String>) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_PERMISSIONS, self.engine.revoke_override(actor, target, code, reason)).await;
        MutationOutcome::from_result(result, |write| match write {
            OverrideWrite::Flipped { .. } => format!("Addition of '{}' reverted for user {}", code, target),
            _ => format!("Permission '{}' removed for user {}", code, target),
        })
    }

    pub async fn restore_override(&self, actor: &Actor, target: UserId, code: &str) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_PERMISSIONS, self.engine.restore_override(actor, target, code)).await;
        MutationOutcome::from_result(result, |_| format!("Permission '{}' restored to the role default for user {}", code, target))
    }

    pub async fn purge_ineffective_overrides(&self, actor: &Actor) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_PERMISSIONS, self.engine.purge_ineffective_overrides(actor)).await;
        MutationOutcome::from_result(result, |report| format!("{} ineffective override(s) purged", report.count))
    }

    pub async fn grant_to_role(&self, actor: &Actor, role: &str, code: &str) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_PERMISSIONS, self.engine.grant_to_role(actor, role, code)).await;
        MutationOutcome::from_result(result, |_| format!("Permission '{}' granted to role '{}'", code, role))
    }

    pub async fn revoke_from_role(&self, actor: &Actor, role: &str, code: &str) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_PERMISSIONS, self.engine.revoke_from_role(actor, role, code)).await;
        MutationOutcome::from_result(result, |_| format!("Permission '{}' revoked from role '{}'", code, role))
    }

    pub async fn add_assignment(&self, actor: &Actor, manager: &str, member: &str) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_ASSIGNMENTS, self.engine.add_edge(actor, manager, member)).await;
        MutationOutcome::from_result(result, |edge| format!("'{}' assigned to '{}' (edge {})", member, manager, edge.id))
    }

    pub async fn remove_assignment(&self, actor: &Actor, id: EdgeId) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_ASSIGNMENTS, self.engine.remove_edge_by_id(actor, id)).await;
        Self::removal_outcome(result, format!("edge {}", id))
    }

    pub async fn remove_assignment_pair(&self, actor: &Actor, manager: &str, member: &str) -> MutationOutcome {
        let result = self.authorized(actor, MANAGE_ASSIGNMENTS, self.engine.remove_edge(actor, manager, member)).await;
        Self::removal_outcome(result, format!("'{}' -> '{}'", manager, member))
    }

    fn removal_outcome(result: AccessResult<bool>, what: String) -> MutationOutcome {
        match result {
            Ok(true) => MutationOutcome::ok(format!("Assignment {} removed", what)),
            Ok(false) => MutationOutcome::failed(&AccessError::not_found(format!("no active assignment {}", what))),
            Err(e) => MutationOutcome::failed(&e),
        }
    }

    /// Run `operation` only if `actor` holds `required`
    async fn authorized<T>(&self, actor: &Actor, required: &str, operation: impl Future<Output = AccessResult<T>>) -> AccessResult<T> {
        self.engine.require_permission(actor, required).await?;
        operation.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLogger;
    use crate::config::EngineConfig;
    use crate::model::{Permission, RoleGrant, UserRecord};
    use crate::store::{MemoryStore, StoreSnapshot};

    fn service() -> AdminService {
        let store = MemoryStore::from_snapshot(StoreSnapshot {
            users: vec![UserRecord::new(1, "ana", "admin"), UserRecord::new(2, "luis", "asesor"), UserRecord::new(3, "marta", "supervisor")],
            permissions: vec![
                Permission::new("sim_usar", "Use loan simulator", "simulador"),
                Permission::new(MANAGE_PERMISSIONS, "Manage permissions", "usuarios"),
                Permission::new(MANAGE_ASSIGNMENTS, "Manage team assignments", "usuarios"),
            ],
            role_grants: vec![RoleGrant::new("asesor", "sim_usar")],
            ..Default::default()
        });
        let engine = AccessEngine::new(Arc::new(store), Arc::new(AuditLogger::new()), EngineConfig::default());
        AdminService::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn test_outcomes_carry_error_codes() {
        let service = service();
        let ana = Actor::new(1, "ana", "admin");

        let ok = service.revoke_override(&ana, 2, "sim_usar", Some("training".to_string())).await;
        assert!(ok.success);
        assert_eq!(ok.error_code, None);

        let again = service.revoke_override(&ana, 2, "sim_usar", None).await;
        assert!(!again.success);
        assert_eq!(again.error_code.as_deref(), Some("no_op"));

        let own = service.grant_override(&ana, 1, "sim_usar", None).await;
        assert_eq!(own.error_code.as_deref(), Some("self_modification"));
    }

    #[tokio::test]
    async fn test_caller_needs_admin_permission() {
        let service = service();
        let luis = Actor::new(2, "luis", "asesor");

        let denied = service.grant_to_role(&luis, "asesor", MANAGE_PERMISSIONS).await;
        assert!(!denied.success);
        assert_eq!(denied.error_code.as_deref(), Some("permission_denied"));
    }

    #[tokio::test]
    async fn test_assignment_endpoints() {
        let service = service();
        let ana = Actor::new(1, "ana", "admin");

        assert!(service.add_assignment(&ana, "marta", "luis").await.success);
        assert!(service.remove_assignment_pair(&ana, "marta", "luis").await.success);

        let missing = service.remove_assignment(&ana, 99).await;
        assert_eq!(missing.error_code.as_deref(), Some("not_found"));
    }
}
