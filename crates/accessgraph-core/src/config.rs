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

//! Configuration management for the access engine

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default cache lifetime for role policies and user overrides
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default number of levels explored when expanding a team
pub const DEFAULT_MAX_TEAM_DEPTH: usize = 5;

/// Configuration for the access engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds a cached role policy or override set stays fresh
    pub cache_ttl_secs: u64,

    /// Levels explored by team-scope expansion
    pub max_team_depth: usize,

    /// Maximum number of audit events kept by the in-memory audit log
    pub audit_max_events: usize,

    /// Permission checks slower than this are logged as warnings
    pub slow_check_threshold_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_team_depth: DEFAULT_MAX_TEAM_DEPTH,
            audit_max_events: 10_000,
            slow_check_threshold_ms: 5,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_ttl_secs: env::var("ACCESSGRAPH_CACHE_TTL_SECS").map(|v| v.parse().unwrap_or(defaults.cache_ttl_secs)).unwrap_or(defaults.cache_ttl_secs),

            max_team_depth: env::var("ACCESSGRAPH_MAX_TEAM_DEPTH").map(|v| v.parse().unwrap_or(defaults.max_team_depth)).unwrap_or(defaults.max_team_depth),

            audit_max_events: env::var("ACCESSGRAPH_AUDIT_MAX_EVENTS").map(|v| v.parse().unwrap_or(defaults.audit_max_events)).unwrap_or(defaults.audit_max_events),

            slow_check_threshold_ms: env::var("ACCESSGRAPH_SLOW_CHECK_MS")
                .map(|v| v.parse().unwrap_or(defaults.slow_check_threshold_ms))
                .unwrap_or(defaults.slow_check_threshold_ms),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn slow_check_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_check_threshold_ms)
    }
}
