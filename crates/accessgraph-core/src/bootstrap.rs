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

//! Default catalog, default role policies and the minimum-permission upgrade
//!
//! Both entry points are idempotent: existing rows are never modified.

use crate::error::AccessResult;
use crate::model::{PROTECTED_ROLE, Permission, RoleGrant, UserOverride};
use crate::store::AccessStore;
use serde::{Deserialize, Serialize};
use tracing::info;

/// `(code, label, module, description)`
type CatalogRow = (&'static str, &'static str, &'static str, &'static str);

const DEFAULT_CATALOG: &[CatalogRow] = &[
    ("sim_usar", "Use loan simulator", "simulador", "Run loan simulations"),
    ("sim_hist_propio", "Own simulation history", "simulador", "See simulations you created"),
    ("sim_hist_equipo", "Team simulation history", "simulador", "See simulations created by your team"),
    ("sim_hist_todos", "All simulation history", "simulador", "See every simulation"),
    ("sco_evaluar", "Run credit evaluation", "scoring", "Score loan applications"),
    ("sco_hist_propio", "Own evaluation history", "scoring", "See evaluations you ran"),
    ("sco_hist_equipo", "Team evaluation history", "scoring", "See evaluations run by your team"),
    ("sco_hist_todos", "All evaluation history", "scoring", "See every evaluation"),
    ("com_ver", "View credit committee", "comite", "See cases sent to the credit committee"),
    ("com_aprobar", "Decide committee cases", "comite", "Approve or reject committee cases"),
    ("rep_metricas_propio", "Own metrics", "reportes", "Metrics over your own work"),
    ("rep_metricas_equipo", "Team metrics", "reportes", "Metrics over your team's work"),
    ("rep_metricas_global", "Global metrics", "reportes", "Metrics over the whole organization"),
    ("usr_ver", "View users", "usuarios", "List user accounts"),
    ("usr_crear", "Create users", "usuarios", "Create user accounts"),
    ("usr_editar", "Edit users", "usuarios", "Edit user accounts"),
    ("usr_eliminar", "Delete users", "usuarios", "Deactivate user accounts"),
    ("usr_password", "Reset passwords", "usuarios", "Reset other users' passwords"),
    ("usr_permisos", "Manage permissions", "usuarios", "Change role policies and user overrides"),
    ("cfg_sco_ver", "View scoring configuration", "config", "Read scoring parameters"),
    ("cfg_sco_editar", "Edit scoring configuration", "config", "Change scoring parameters"),
];

/// Entries the minimum upgrade guarantees
const MINIMUM_CATALOG: &[CatalogRow] = &[
    ("admin_panel_acceso", "Admin panel access", "admin", "Enter the administration panel"),
    ("usr_asignaciones_equipo", "Manage team assignments", "usuarios", "Edit manager to member assignments"),
    ("cap_usar", "Use payment capacity", "simulador", "Run payment capacity analysis"),
    ("cfg_comite_ver", "View committee configuration", "config", "Read credit committee settings"),
    ("cfg_comite_editar", "Edit committee configuration", "config", "Change credit committee settings"),
];

const DEFAULT_GRANTS: &[(&str, &[&str])] = &[
    ("asesor", &["sim_usar", "cap_usar", "sim_hist_propio", "sco_evaluar", "sco_hist_propio", "rep_metricas_propio"]),
    (
        "supervisor",
        &["sim_usar", "cap_usar", "sim_hist_equipo", "sco_evaluar", "sco_hist_equipo", "rep_metricas_equipo", "com_ver", "usr_ver"],
    ),
    ("auditor", &["sim_hist_todos", "sco_hist_todos", "rep_metricas_global", "com_ver"]),
    ("gerente", &["sim_hist_equipo", "sco_hist_equipo", "rep_metricas_equipo", "rep_metricas_global", "com_ver", "usr_ver"]),
    ("admin_tecnico", &["cfg_sco_ver", "cfg_comite_ver", "usr_ver", "admin_panel_acceso"]),
    ("comite_credito", &["com_ver", "com_aprobar", "sco_hist_todos", "cfg_comite_ver"]),
];

/// Code whose grants and overrides are mirrored onto [`CLONE_TARGET`]
const CLONE_SOURCE: &str = "sim_usar";
const CLONE_TARGET: &str = "cap_usar";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    pub permissions_added: usize,
    pub grants_added: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumReport {
    pub permissions_added: Vec<String>,
    pub grants_cloned: usize,
    pub overrides_cloned: usize,
}

impl MinimumReport {
    pub fn changed(&self) -> bool {
        !self.permissions_added.is_empty() || self.grants_cloned > 0 || self.overrides_cloned > 0
    }
}

fn to_permission(row: &CatalogRow) -> Permission {
    let (code, label, module, description) = *row;
    Permission::new(code, label, module).with_description(description)
}

/// Install the default catalog and role grants
pub async fn seed_default_catalog(store: &dyn AccessStore) -> AccessResult<SeedReport> {
    let mut report = SeedReport::default();

    for row in DEFAULT_CATALOG.iter().chain(MINIMUM_CATALOG) {
        if store.insert_permission(to_permission(row)).await? {
            report.permissions_added += 1;
        }
    }

    for (role, codes) in DEFAULT_GRANTS {
        for code in codes.iter() {
            if store.insert_role_grant(RoleGrant::new(*role, *code)).await? {
                report.grants_added += 1;
            }
        }
    }

    info!(permissions_added = report.permissions_added, grants_added = report.grants_added, "Default catalog seeded");
    Ok(report)
}

/// Add the minimum catalog entries and mirror `sim_usar` onto `cap_usar`.
/// The caller is responsible for invalidating caches when anything changed.
pub async fn ensure_minimum_permissions(store: &dyn AccessStore) -> AccessResult<MinimumReport> {
    let mut report = MinimumReport::default();

    for row in MINIMUM_CATALOG {
        let permission = to_permission(row);
        let code = permission.code.clone();
        if store.insert_permission(permission).await? {
            report.permissions_added.push(code);
        }
    }

    if store.get_permission(CLONE_SOURCE).await?.is_none() {
        return Ok(report);
    }

    let source_roles: Vec<String> = store
        .list_role_grants()
        .await?
        .into_iter()
        .filter(|g| g.permission_code == CLONE_SOURCE && g.role != PROTECTED_ROLE)
        .map(|g| g.role)
        .collect();
    for role in source_roles {
        if store.insert_role_grant(RoleGrant::new(role, CLONE_TARGET)).await? {
            report.grants_cloned += 1;
        }
    }

    let source_overrides: Vec<UserOverride> = store.list_overrides().await?.into_iter().filter(|row| row.permission_code == CLONE_SOURCE).collect();
    for row in source_overrides {
        let reason = row.reason.clone().or_else(|| Some(format!("Cloned from {}", CLONE_SOURCE)));
        let clone = UserOverride::new(row.user_id, CLONE_TARGET, row.kind, row.granted_by).with_reason(reason);
        if store.insert_override_if_absent(clone).await? {
            report.overrides_cloned += 1;
        }
    }

    info!(
        permissions_added = report.permissions_added.len(),
        grants_cloned = report.grants_cloned,
        overrides_cloned = report.overrides_cloned,
        "Minimum permissions ensured"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OverrideKind;
    use crate::store::{MemoryStore, StoreSnapshot};

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();

        let first = seed_default_catalog(&store).await.unwrap();
        assert_eq!(first.permissions_added, DEFAULT_CATALOG.len() + MINIMUM_CATALOG.len());
        assert!(first.grants_added > 0);

        let second = seed_default_catalog(&store).await.unwrap();
        assert_eq!(second, SeedReport::default());
    }

    #[test]
    fn test_default_grants_reference_catalog_codes() {
        let codes: Vec<&str> = DEFAULT_CATALOG.iter().chain(MINIMUM_CATALOG).map(|row| row.0).collect();
        for (role, granted) in DEFAULT_GRANTS {
            assert!(crate::model::is_recognized_role(role));
            for code in granted.iter() {
                assert!(codes.contains(code), "{} grants unknown code {}", role, code);
            }
        }
    }

    #[tokio::test]
    async fn test_minimum_clones_simulator_access() {
        let store = MemoryStore::from_snapshot(StoreSnapshot {
            permissions: vec![Permission::new("sim_usar", "Use loan simulator", "simulador")],
            role_grants: vec![RoleGrant::new("asesor", "sim_usar"), RoleGrant::new(PROTECTED_ROLE, "sim_usar")],
            overrides: vec![UserOverride::new(7, "sim_usar", OverrideKind::Remove, "ana")],
            ..Default::default()
        });

        let report = ensure_minimum_permissions(&store).await.unwrap();
        assert_eq!(report.permissions_added.len(), MINIMUM_CATALOG.len());
        assert_eq!(report.grants_cloned, 1);
        assert_eq!(report.overrides_cloned, 1);

        let cloned = store.overrides_for_user(7).await.unwrap();
        assert!(cloned.iter().any(|o| o.permission_code == "cap_usar" && o.kind == OverrideKind::Remove));
        assert!(!store.role_permission_codes(PROTECTED_ROLE).await.unwrap().contains("cap_usar"));

        let again = ensure_minimum_permissions(&store).await.unwrap();
        assert!(!again.changed());
    }
}
