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

//! Records shared by the permission and hierarchy layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric user identifier issued by the identity collaborator
pub type UserId = i64;

/// The role that can never lose its protected permissions
pub const PROTECTED_ROLE: &str = "admin";

/// Roles recognized by the policy store
pub const RECOGNIZED_ROLES: &[&str] = &["asesor", "supervisor", "auditor", "gerente", "admin_tecnico", "comite_credito", PROTECTED_ROLE];

/// Roles that may own team assignments
pub const MANAGER_ROLES: &[&str] = &["supervisor", "auditor", "gerente"];

/// Check whether a role tag is one of the recognized roles
pub fn is_recognized_role(role: &str) -> bool {
    RECOGNIZED_ROLES.contains(&role)
}

/// Authenticated actor as supplied by the session layer. Trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub username: String,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: UserId, username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            role: role.into(),
        }
    }

    /// Whether this actor holds the protected role
    pub fn is_protected_role(&self) -> bool {
        self.role == PROTECTED_ROLE
    }
}

/// User directory row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub role: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl UserRecord {
    pub fn new(id: UserId, username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            role: role.into(),
            active: true,
        }
    }

    /// Identity context for this user
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.username.clone(), self.role.clone())
    }
}

/// Catalog entry for a permission code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique code, e.g. `usr_permisos`
    pub code: String,

    /// Human-readable label
    pub label: String,

    /// Functional module the permission belongs to
    pub module: String,

    #[serde(default)]
    pub description: String,

    /// Deactivation is logical; rows are never deleted
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Permission {
    pub fn new(code: impl Into<String>, label: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            module: module.into(),
            description: String::new(),
            active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Default grant of a permission to a role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: String,
    pub permission_code: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, permission_code: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            permission_code: permission_code.into(),
        }
    }
}

/// Direction of a per-user override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    Add,
    Remove,
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideKind::Add => write!(f, "add"),
            OverrideKind::Remove => write!(f, "remove"),
        }
    }
}

/// Per-user exception layered over the role policy. At most one row exists
/// per `(user_id, permission_code)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOverride {
    pub user_id: UserId,
    pub permission_code: String,
    pub kind: OverrideKind,
    #[serde(default = "default_granted_by")]
    pub granted_by: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default = "Utc::now")]
    pub granted_at: DateTime<Utc>,
}

impl UserOverride {
    pub fn new(user_id: UserId, permission_code: impl Into<String>, kind: OverrideKind, granted_by: impl Into<String>) -> Self {
        Self {
            user_id,
            permission_code: permission_code.into(),
            kind,
            granted_by: granted_by.into(),
            reason: None,
            granted_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// Identifier of an assignment edge
pub type EdgeId = u64;

/// Directed manager -> member delegation edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEdge {
    #[serde(default)]
    pub id: EdgeId,
    pub manager_username: String,
    pub member_username: String,
    /// Soft-removal flag; edges are never deleted
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl AssignmentEdge {
    pub fn new(id: EdgeId, manager_username: impl Into<String>, member_username: impl Into<String>) -> Self {
        Self {
            id,
            manager_username: manager_username.into(),
            member_username: member_username.into(),
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn is_self_edge(&self) -> bool {
        self.manager_username == self.member_username
    }
}

fn default_true() -> bool {
    true
}

fn default_granted_by() -> String {
    "system".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_roles() {
        assert!(is_recognized_role("asesor"));
        assert!(is_recognized_role(PROTECTED_ROLE));
        assert!(!is_recognized_role("intern"));
    }

    #[test]
    fn test_actor_from_record() {
        let record = UserRecord::new(7, "lucia", "supervisor");
        let actor = record.actor();

        assert_eq!(actor.user_id, 7);
        assert_eq!(actor.username, "lucia");
        assert!(!actor.is_protected_role());
    }

    #[test]
    fn test_override_kind_serde() {
        let json = serde_json::to_string(&OverrideKind::Remove).unwrap();
        assert_eq!(json, "\"remove\"");
        assert_eq!(OverrideKind::Add.to_string(), "add");
    }

    #[test]
    fn test_self_edge_detection() {
        assert!(AssignmentEdge::new(1, "ana", "ana").is_self_edge());
        assert!(!AssignmentEdge::new(2, "ana", "luis").is_self_edge());
    }
}
