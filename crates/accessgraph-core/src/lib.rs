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

//! AccessGraph: role-based access control with hierarchical visibility
//!
//! The engine answers two questions for an authenticated actor: which
//! permission codes they hold, and whose records they may see. Permissions
//! combine a role policy with per-user overrides under a protected-permission
//! guard; visibility expands a manager -> member graph for team scope.

pub mod admin;
pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod invariants;
pub mod model;
pub mod rbac;
pub mod store;

pub use admin::{AdminService, MutationOutcome};
pub use audit::{AuditAction, AuditError, AuditEvent, AuditLogger, AuditSink};
pub use config::EngineConfig;
pub use engine::AccessEngine;
pub use error::{AccessError, AccessResult};
pub use hierarchy::{Scope, ScopeResult, VisibilityContext};
pub use model::{Actor, AssignmentEdge, OverrideKind, Permission, RoleGrant, UserId, UserOverride, UserRecord};
pub use store::{AccessStore, MemoryStore, StoreSnapshot};
