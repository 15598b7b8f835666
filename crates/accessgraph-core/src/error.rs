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

//! Error taxonomy for the access engine

use thiserror::Error;

/// Errors produced by permission resolution, override mutation and the
/// assignment graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Unknown user, permission or role
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Attempt to remove a protected permission from the protected role
    #[error("Protected permission: {message}")]
    ProtectedPermission { message: String },

    /// An actor targeted their own overrides
    #[error("Self modification: {message}")]
    SelfModification { message: String },

    /// Self-edge or edge referencing an unknown username
    #[error("Invalid assignment: {message}")]
    InvalidAssignment { message: String },

    /// The mutation would not change anything
    #[error("No-op: {message}")]
    NoOp { message: String },

    /// A route guard rejected the actor
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The persistence layer failed
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl AccessError {
    /// Stable machine-readable identifier for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AccessError::NotFound { .. } => "not_found",
            AccessError::ProtectedPermission { .. } => "protected_permission",
            AccessError::SelfModification { .. } => "self_modification",
            AccessError::InvalidAssignment { .. } => "invalid_assignment",
            AccessError::NoOp { .. } => "no_op",
            AccessError::PermissionDenied { .. } => "permission_denied",
            AccessError::Storage { .. } => "storage_error",
        }
    }

    /// Human-readable message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            AccessError::NotFound { message }
            | AccessError::ProtectedPermission { message }
            | AccessError::SelfModification { message }
            | AccessError::InvalidAssignment { message }
            | AccessError::NoOp { message }
            | AccessError::PermissionDenied { message }
            | AccessError::Storage { message } => message,
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        AccessError::NotFound { message: message.into() }
    }

    pub(crate) fn no_op(message: impl Into<String>) -> Self {
        AccessError::NoOp { message: message.into() }
    }

    pub(crate) fn invalid_assignment(message: impl Into<String>) -> Self {
        AccessError::InvalidAssignment { message: message.into() }
    }
}

/// Result type for access engine operations
pub type AccessResult<T> = Result<T, AccessError>;
