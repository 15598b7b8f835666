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

//! Per-user override store and its mutation operations
//!
//! Every mutation follows the same order: the durable write commits, the
//! user's cache entry is invalidated, then the audit record is appended.

use crate::audit::{self, AuditAction, AuditSink};
use crate::error::{AccessError, AccessResult};
use crate::model::{Actor, OverrideKind, PROTECTED_ROLE, UserId, UserOverride, UserRecord};
use crate::rbac::cache::{CacheKey, PermissionCache};
use crate::rbac::catalog;
use crate::rbac::guard;
use crate::store::{AccessStore, OverrideWrite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// A user's overrides partitioned by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    pub added: HashSet<String>,
    pub removed: HashSet<String>,
}

impl OverrideSet {
    pub fn from_rows(rows: &[UserOverride]) -> Self {
        let mut set = Self::default();
        for row in rows {
            match row.kind {
                OverrideKind::Add => set.added.insert(row.permission_code.clone()),
                OverrideKind::Remove => set.removed.insert(row.permission_code.clone()),
            };
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Rows deleted by [`OverrideManager::purge_ineffective_overrides`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub count: usize,
    pub purged: Vec<PurgedOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgedOverride {
    pub user_id: UserId,
    pub username: String,
    pub permission_code: String,
}

pub struct OverrideManager {
    store: Arc<dyn AccessStore>,
    cache: Arc<PermissionCache>,
    audit: Arc<dyn AuditSink>,
}

impl OverrideManager {
    pub fn new(store: Arc<dyn AccessStore>, cache: Arc<PermissionCache>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, cache, audit }
    }

    /// Overrides of `user_id` on active permissions, served from the cache
    pub async fn overrides_for(&self, user_id: UserId) -> AccessResult<OverrideSet> {
        self.cache
            .user_overrides(user_id, || async move {
                let rows = self.store.overrides_for_user(user_id).await?;
                Ok(OverrideSet::from_rows(&rows))
            })
            .await
    }

    /// Give `target` a permission their role does not grant, or undo a removal
    pub async fn grant_override(&self, actor: &Actor, target: UserId, code: &str, reason: Option<String>) -> AccessResult<OverrideWrite> {
        reject_self_modification(actor, target)?;
        let target_user = self.require_user(target).await?;
        catalog::active_permission(self.store.as_ref(), code).await?;

        let row = UserOverride::new(target, code, OverrideKind::Add, actor.username.clone()).with_reason(reason.clone());
        let write = self.store.apply_override(row).await?;
        if write == OverrideWrite::AlreadyPresent {
            return Err(AccessError::no_op(format!("user '{}' already has an add override for '{}'", target_user.username, code)));
        }

        self.cache.invalidate(&CacheKey::UserOverrides(target));
        info!(target_user = %target_user.username, code = %code, actor = %actor.username, write = ?write, "Permission override added");
        self.record(actor, AuditAction::PermissionAdded, &target_user, code, reason).await;

        Ok(write)
    }

    /// Take a permission away from `target`, or undo an addition
    pub async fn revoke_override(&self, actor: &Actor, target: UserId, code: &str, reason: Option<String>) -> AccessResult<OverrideWrite> {
        reject_self_modification(actor, target)?;
        let target_user = self.require_user(target).await?;

        if guard::is_protected(&target_user.role, code) {
            warn!(target_user = %target_user.username, code = %code, actor = %actor.username, "Rejected removal of protected permission");
            return Err(AccessError::ProtectedPermission {
                message: format!("'{}' cannot be removed from users with the '{}' role", code, PROTECTED_ROLE),
            });
        }

        catalog::active_permission(self.store.as_ref(), code).await?;

        let row = UserOverride::new(target, code, OverrideKind::Remove, actor.username.clone()).with_reason(reason.clone());
        let write = self.store.apply_override(row).await?;
        if write == OverrideWrite::AlreadyPresent {
            return Err(AccessError::no_op(format!("user '{}' already has a remove override for '{}'", target_user.username, code)));
        }

        self.cache.invalidate(&CacheKey::UserOverrides(target));
        info!(target_user = %target_user.username, code = %code, actor = %actor.username, write = ?write, "Permission override removed");
        self.record(actor, AuditAction::PermissionRemoved, &target_user, code, reason).await;

        Ok(write)
    }

    /// Delete the override so the role default applies again
    pub async fn restore_override(&self, actor: &Actor, target: UserId, code: &str) -> AccessResult<()> {
        reject_self_modification(actor, target)?;

        if !self.store.delete_override(target, code).await? {
            return Err(AccessError::no_op(format!("user {} has no override for '{}'", target, code)));
        }

        self.cache.invalidate(&CacheKey::UserOverrides(target));
        info!(target_user_id = target, code = %code, actor = %actor.username, "Permission override restored");

        let mut details = audit::details([("target_user_id", json!(target)), ("permission", json!(code))]);
        if let Ok(Some(user)) = self.store.get_user(target).await {
            details.insert("target_username".to_string(), json!(user.username));
        }
        audit::emit(self.audit.as_ref(), &actor.username, AuditAction::PermissionRestored, details).await;

        Ok(())
    }

    /// Delete removal overrides that the guard already neutralizes
    pub async fn purge_ineffective_overrides(&self, actor: &Actor) -> AccessResult<PurgeReport> {
        let purged = self.ineffective_overrides().await?;
        if purged.is_empty() {
            return Ok(PurgeReport::default());
        }

        let keys = purged.iter().map(|p| (p.user_id, p.permission_code.clone())).collect();
        let count = self.store.delete_overrides(keys).await?;

        self.cache.invalidate_all();
        info!(count = count, actor = %actor.username, "Ineffective overrides purged");
        audit::emit(
            self.audit.as_ref(),
            &actor.username,
            AuditAction::OverridesPurged,
            audit::details([("count", json!(count)), ("purged", json!(purged))]),
        )
        .await;

        Ok(PurgeReport { count, purged })
    }

    /// Removal overrides held by protected-role users on protected codes
    pub async fn ineffective_overrides(&self) -> AccessResult<Vec<PurgedOverride>> {
        let protected_users: Vec<UserRecord> = self.store.list_users().await?.into_iter().filter(|u| u.role == PROTECTED_ROLE).collect();
        if protected_users.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .store
            .list_overrides()
            .await?
            .into_iter()
            .filter(|row| row.kind == OverrideKind::Remove && guard::is_protected_code(&row.permission_code))
            .filter_map(|row| {
                protected_users.iter().find(|u| u.id == row.user_id).map(|user| PurgedOverride {
                    user_id: user.id,
                    username: user.username.clone(),
                    permission_code: row.permission_code,
                })
            })
            .collect())
    }

    async fn require_user(&self, user_id: UserId) -> AccessResult<UserRecord> {
        self.store.get_user(user_id).await?.ok_or_else(|| AccessError::not_found(format!("user {} does not exist", user_id)))
    }

    async fn record(&self, actor: &Actor, action: AuditAction, target: &UserRecord, code: &str, reason: Option<String>) {
        let details = audit::details([
            ("target_user_id", json!(target.id)),
            ("target_username", json!(target.username)),
            ("permission", json!(code)),
            ("reason", json!(reason)),
        ]);
        audit::emit(self.audit.as_ref(), &actor.username, action, details).await;
    }
}

fn reject_self_modification(actor: &Actor, target: UserId) -> AccessResult<()> {
    if actor.user_id == target {
        warn!(actor = %actor.username, "Rejected override on own account");
        return Err(AccessError::SelfModification {
            message: "users cannot modify their own permissions".to_string(),
        });
    }
    Ok(())
}
