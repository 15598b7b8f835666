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

//! Audit trail for permission mutations and denied access

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Audited actions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PermissionAdded,
    PermissionRemoved,
    PermissionRestored,
    OverridesPurged,
    RolePermissionAdded,
    RolePermissionRemoved,
    PermissionDeactivated,
    PermissionReactivated,
    MinimumPermissionsEnsured,
    AssignmentAdded,
    AssignmentRemoved,
    AccessDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PermissionAdded => "PERMISSION_ADDED",
            AuditAction::PermissionRemoved => "PERMISSION_REMOVED",
            AuditAction::PermissionRestored => "PERMISSION_RESTORED",
            AuditAction::OverridesPurged => "OVERRIDES_PURGED",
            AuditAction::RolePermissionAdded => "ROLE_PERMISSION_ADDED",
            AuditAction::RolePermissionRemoved => "ROLE_PERMISSION_REMOVED",
            AuditAction::PermissionDeactivated => "PERMISSION_DEACTIVATED",
            AuditAction::PermissionReactivated => "PERMISSION_REACTIVATED",
            AuditAction::MinimumPermissionsEnsured => "MINIMUM_PERMISSIONS_ENSURED",
            AuditAction::AssignmentAdded => "ASSIGNMENT_ADDED",
            AuditAction::AssignmentRemoved => "ASSIGNMENT_REMOVED",
            AuditAction::AccessDenied => "ACCESS_DENIED",
        }
    }

    /// Whether the action records a rejection rather than a change
    pub fn is_denial(&self) -> bool {
        matches!(self, AuditAction::AccessDenied)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit sink failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Audit sink unavailable: {message}")]
    Unavailable { message: String },
}

/// Write-only destination for audit records
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, actor_username: &str, action: AuditAction, details: HashMap<String, Value>) -> Result<(), AuditError>;
}

/// Build a details map from key/value pairs
pub fn details<I, K>(pairs: I) -> HashMap<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Append to the sink without letting a failure reach the caller
pub(crate) async fn emit(sink: &dyn AuditSink, actor_username: &str, action: AuditAction, details: HashMap<String, Value>) {
    if let Err(e) = sink.append(actor_username, action, details).await {
        warn!(actor = %actor_username, action = %action, error = %e, "Failed to append audit record");
    }
}

/// Stored audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub action: AuditAction,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub details: HashMap<String, Value>,
}

impl AuditEvent {
    pub fn new(actor: impl Into<String>, action: AuditAction, details: HashMap<String, Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action,
            timestamp: Utc::now(),
            actor: actor.into(),
            details,
        }
    }

    /// Username of the user the event is about, when recorded
    pub fn target_username(&self) -> Option<&str> {
        self.details.get("target_username").and_then(Value::as_str)
    }
}

/// In-memory audit log keeping the most recent events
#[derive(Debug)]
pub struct AuditLogger {
    events: Arc<RwLock<Vec<AuditEvent>>>,
    max_events: usize,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::with_max_events(10_000)
    }

    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events,
        }
    }

    /// Most recent events first
    pub async fn get_events(&self, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        events.iter().rev().take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    /// Events performed by or targeting a username, most recent first
    pub async fn get_user_events(&self, username: &str, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;

        events
            .iter()
            .filter(|event| event.actor == username || event.target_username() == Some(username))
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub async fn get_events_by_action(&self, action: AuditAction, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        events.iter().filter(|event| event.action == action).rev().take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    pub async fn clear_events(&self) {
        self.events.write().await.clear();
        info!("Audit log cleared");
    }

    pub async fn get_statistics(&self) -> AuditStatistics {
        let events = self.events.read().await;

        let mut stats = AuditStatistics {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter() {
            if event.action.is_denial() {
                stats.denied_events += 1;
            }
            *stats.events_by_action.entry(event.action).or_insert(0) += 1;
        }

        stats
    }
}

#[async_trait]
impl AuditSink for AuditLogger {
    async fn append(&self, actor_username: &str, action: AuditAction, details: HashMap<String, Value>) -> Result<(), AuditError> {
        let event = AuditEvent::new(actor_username, action, details);

        if action.is_denial() {
            warn!(actor = %event.actor, action = %event.action, details = ?event.details, "Audit event");
        } else {
            info!(actor = %event.actor, action = %event.action, details = ?event.details, "Audit event");
        }

        let mut events = self.events.write().await;
        events.push(event);

        if events.len() > self.max_events {
            let excess = events.len() - self.max_events;
            events.drain(0..excess);
        }

        Ok(())
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit statistics
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total_events: usize,
    pub denied_events: usize,
    pub events_by_action: HashMap<AuditAction, usize>,
}
