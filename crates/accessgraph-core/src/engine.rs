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

//! Access engine facade that wires every component over one store

use crate::audit::{self, AuditAction, AuditSink};
use crate::bootstrap::{self, MinimumReport, SeedReport};
use crate::config::EngineConfig;
use crate::error::AccessResult;
use crate::hierarchy::{AssignmentGraph, ScopeResult, VisibilityContext, VisibilityResolver};
use crate::invariants::{InvariantChecker, InvariantReport};
use crate::model::{Actor, AssignmentEdge, EdgeId, Permission, UserId, UserRecord};
use crate::rbac::{
    AccessEnforcer, CacheStats, ModuleGroup, OverrideManager, PermissionCache, PermissionCatalog, PermissionDetail, PermissionMatrix, PermissionReports,
    PermissionResolver, PurgeReport, RolePolicy,
};
use crate::store::{AccessStore, OverrideWrite};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::info;

/// Main access engine that coordinates all components
#[derive(Clone)]
pub struct AccessEngine {
    config: EngineConfig,
    store: Arc<dyn AccessStore>,
    audit: Arc<dyn AuditSink>,
    cache: Arc<PermissionCache>,
    catalog: Arc<PermissionCatalog>,
    policy: Arc<RolePolicy>,
    overrides: Arc<OverrideManager>,
    resolver: Arc<PermissionResolver>,
    enforcer: Arc<AccessEnforcer>,
    graph: Arc<AssignmentGraph>,
    visibility: Arc<VisibilityResolver>,
    reports: Arc<PermissionReports>,
    invariants: Arc<InvariantChecker>,
}

impl AccessEngine {
    pub fn new(store: Arc<dyn AccessStore>, audit: Arc<dyn AuditSink>, config: EngineConfig) -> Self {
        let cache = Arc::new(PermissionCache::new(config.cache_ttl()));
        let catalog = Arc::new(PermissionCatalog::new(store.clone(), cache.clone(), audit.clone()));
        let policy = Arc::new(RolePolicy::new(store.clone(), cache.clone(), audit.clone()));
        let overrides = Arc::new(OverrideManager::new(store.clone(), cache.clone(), audit.clone()));
        let resolver = Arc::new(PermissionResolver::new(catalog.clone(), policy.clone(), overrides.clone(), config.slow_check_threshold()));
        let enforcer = Arc::new(AccessEnforcer::new(resolver.clone(), audit.clone()));
        let graph = Arc::new(AssignmentGraph::new(store.clone(), audit.clone()));
        let visibility = Arc::new(VisibilityResolver::new(resolver.clone(), graph.clone(), config.max_team_depth));
        let reports = Arc::new(PermissionReports::new(store.clone(), catalog.clone(), policy.clone(), overrides.clone(), resolver.clone()));
        let invariants = Arc::new(InvariantChecker::new(store.clone(), overrides.clone()));

        info!(cache_ttl_secs = config.cache_ttl_secs, max_team_depth = config.max_team_depth, "Access engine initialized");

        Self {
            config,
            store,
            audit,
            cache,
            catalog,
            policy,
            overrides,
            resolver,
            enforcer,
            graph,
            visibility,
            reports,
            invariants,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AccessStore> {
        &self.store
    }

    // Resolution

    pub async fn effective_permissions(&self, actor: &Actor) -> AccessResult<BTreeSet<String>> {
        self.resolver.effective_permissions(actor).await
    }

    pub async fn has_permission(&self, actor: &Actor, code: &str) -> AccessResult<bool> {
        self.resolver.has_permission(actor, code).await
    }

    pub async fn has_any(&self, actor: &Actor, codes: &[&str]) -> AccessResult<bool> {
        self.resolver.has_any(actor, codes).await
    }

    pub async fn has_all(&self, actor: &Actor, codes: &[&str]) -> AccessResult<bool> {
        self.resolver.has_all(actor, codes).await
    }

    pub async fn resolve_visible_actors(&self, actor: &Actor, context: VisibilityContext) -> AccessResult<ScopeResult> {
        self.visibility.resolve_visible_actors(actor, context).await
    }

    pub async fn permissions_for_role(&self, role: &str) -> AccessResult<HashSet<String>> {
        self.policy.permissions_for_role(role).await
    }

    // Route guards

    pub async fn require_permission(&self, actor: &Actor, code: &str) -> AccessResult<()> {
        self.enforcer.require_permission(actor, code).await
    }

    pub async fn require_any(&self, actor: &Actor, codes: &[&str]) -> AccessResult<()> {
        self.enforcer.require_any(actor, codes).await
    }

    pub async fn require_all(&self, actor: &Actor, codes: &[&str]) -> AccessResult<()> {
        self.enforcer.require_all(actor, codes).await
    }

    pub async fn require_role(&self, actor: &Actor, roles: &[&str]) -> AccessResult<()> {
        self.enforcer.require_role(actor, roles).await
    }

    // Overrides

    pub async fn grant_override(&self, actor: &Actor, target: UserId, code: &str, reason: Option<String>) -> AccessResult<OverrideWrite> {
        self.overrides.grant_override(actor, target, code, reason).await
    }

    pub async fn revoke_override(&self, actor: &Actor, target: UserId, code: &str, reason: Option<String>) -> AccessResult<OverrideWrite> {
        self.overrides.revoke_override(actor, target, code, reason).await
    }

    pub async fn restore_override(&self, actor: &Actor, target: UserId, code: &str) -> AccessResult<()> {
        self.overrides.restore_override(actor, target, code).await
    }

    pub async fn purge_ineffective_overrides(&self, actor: &Actor) -> AccessResult<PurgeReport> {
        self.overrides.purge_ineffective_overrides(actor).await
    }

    // Role policy

    pub async fn grant_to_role(&self, actor: &Actor, role: &str, code: &str) -> AccessResult<()> {
        self.policy.grant_to_role(actor, role, code).await
    }

    pub async fn revoke_from_role(&self, actor: &Actor, role: &str, code: &str) -> AccessResult<()> {
        self.policy.revoke_from_role(actor, role, code).await
    }

    // Catalog

    pub async fn register_permission(&self, permission: Permission) -> AccessResult<()> {
        self.catalog.register_permission(permission).await
    }

    pub async fn deactivate_permission(&self, actor: &Actor, code: &str) -> AccessResult<()> {
        self.catalog.deactivate_permission(actor, code).await
    }

    pub async fn reactivate_permission(&self, actor: &Actor, code: &str) -> AccessResult<()> {
        self.catalog.reactivate_permission(actor, code).await
    }

    pub async fn catalog_by_module(&self) -> AccessResult<Vec<ModuleGroup>> {
        self.catalog.catalog_by_module().await
    }

    // Assignment graph

    pub async fn add_edge(&self, actor: &Actor, manager: &str, member: &str) -> AccessResult<AssignmentEdge> {
        self.graph.add_edge(actor, manager, member).await
    }

    pub async fn remove_edge_by_id(&self, actor: &Actor, id: EdgeId) -> AccessResult<bool> {
        self.graph.remove_edge_by_id(actor, id).await
    }

    pub async fn remove_edge(&self, actor: &Actor, manager: &str, member: &str) -> AccessResult<bool> {
        self.graph.remove_edge(actor, manager, member).await
    }

    pub async fn direct_members(&self, manager: &str) -> AccessResult<BTreeSet<String>> {
        self.graph.direct_members(manager).await
    }

    pub async fn transitive_members(&self, root: &str, max_depth: usize) -> AccessResult<BTreeSet<String>> {
        self.graph.transitive_members(root, max_depth).await
    }

    pub async fn list_active_edges(&self) -> AccessResult<Vec<AssignmentEdge>> {
        self.graph.list_active_edges().await
    }

    pub async fn assignable_managers(&self) -> AccessResult<Vec<UserRecord>> {
        self.graph.assignable_managers().await
    }

    // Reports

    pub async fn permission_detail(&self, user_id: UserId) -> AccessResult<PermissionDetail> {
        self.reports.permission_detail(user_id).await
    }

    pub async fn permission_matrix(&self) -> AccessResult<PermissionMatrix> {
        self.reports.permission_matrix().await
    }

    pub fn locked_permissions(&self, actor: &Actor) -> BTreeSet<String> {
        self.reports.locked_permissions(actor)
    }

    pub async fn check_invariants(&self) -> AccessResult<InvariantReport> {
        self.invariants.check_invariants().await
    }

    // Bootstrap

    pub async fn seed_default_catalog(&self) -> AccessResult<SeedReport> {
        let report = bootstrap::seed_default_catalog(self.store.as_ref()).await?;
        if report.permissions_added > 0 || report.grants_added > 0 {
            self.cache.invalidate_all();
        }
        Ok(report)
    }

    pub async fn ensure_minimum_permissions(&self, actor: &Actor) -> AccessResult<MinimumReport> {
        let report = bootstrap::ensure_minimum_permissions(self.store.as_ref()).await?;
        self.cache.invalidate_all();

        if report.changed() {
            audit::emit(
                self.audit.as_ref(),
                &actor.username,
                AuditAction::MinimumPermissionsEnsured,
                audit::details([
                    ("permissions_added", json!(report.permissions_added)),
                    ("grants_cloned", json!(report.grants_cloned)),
                    ("overrides_cloned", json!(report.overrides_cloned)),
                ]),
            )
            .await;
        }

        Ok(report)
    }

    // Cache

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
