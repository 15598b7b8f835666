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

//! Visibility scope resolution

use crate::error::{AccessError, AccessResult};
use crate::hierarchy::graph::AssignmentGraph;
use crate::model::Actor;
use crate::rbac::resolver::PermissionResolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Permission codes granting each scope tier of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeCodes {
    pub own: &'static str,
    pub team: &'static str,
    pub all: &'static str,
}

/// Named data domain whose visibility is tiered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityContext {
    Simulations,
    Evaluations,
    Metrics,
}

impl VisibilityContext {
    pub const ALL: [VisibilityContext; 3] = [VisibilityContext::Simulations, VisibilityContext::Evaluations, VisibilityContext::Metrics];

    pub fn codes(&self) -> ScopeCodes {
        match self {
            VisibilityContext::Simulations => ScopeCodes {
                own: "sim_hist_propio",
                team: "sim_hist_equipo",
                all: "sim_hist_todos",
            },
            VisibilityContext::Evaluations => ScopeCodes {
                own: "sco_hist_propio",
                team: "sco_hist_equipo",
                all: "sco_hist_todos",
            },
            VisibilityContext::Metrics => ScopeCodes {
                own: "rep_metricas_propio",
                team: "rep_metricas_equipo",
                all: "rep_metricas_global",
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityContext::Simulations => "simulations",
            VisibilityContext::Evaluations => "evaluations",
            VisibilityContext::Metrics => "metrics",
        }
    }
}

impl fmt::Display for VisibilityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisibilityContext {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisibilityContext::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AccessError::not_found(format!("unknown visibility context '{}'", s)))
    }
}

/// Scope tier, ordered from narrowest to widest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    None,
    Own,
    Team,
    All,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::None => write!(f, "none"),
            Scope::Own => write!(f, "own"),
            Scope::Team => write!(f, "team"),
            Scope::All => write!(f, "all"),
        }
    }
}

/// Outcome of visibility resolution. `usernames` is `None` only for
/// [`Scope::All`], meaning no restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeResult {
    pub scope: Scope,
    pub usernames: Option<BTreeSet<String>>,
}

impl ScopeResult {
    pub fn all() -> Self {
        Self { scope: Scope::All, usernames: None }
    }

    pub fn none() -> Self {
        Self {
            scope: Scope::None,
            usernames: Some(BTreeSet::new()),
        }
    }

    /// Whether records owned by `username` are visible
    pub fn allows(&self, username: &str) -> bool {
        match &self.usernames {
            None => true,
            Some(usernames) => usernames.contains(username),
        }
    }
}

/// Pick the widest tier granted by `effective` for `context`
pub fn scope_for(effective: &BTreeSet<String>, context: VisibilityContext) -> Scope {
    let codes = context.codes();
    if effective.contains(codes.all) {
        Scope::All
    } else if effective.contains(codes.team) {
        Scope::Team
    } else if effective.contains(codes.own) {
        Scope::Own
    } else {
        Scope::None
    }
}

pub struct VisibilityResolver {
    resolver: Arc<PermissionResolver>,
    graph: Arc<AssignmentGraph>,
    max_team_depth: usize,
}

impl VisibilityResolver {
    pub fn new(resolver: Arc<PermissionResolver>, graph: Arc<AssignmentGraph>, max_team_depth: usize) -> Self {
        Self { resolver, graph, max_team_depth }
    }

    pub async fn resolve_visible_actors(&self, actor: &Actor, context: VisibilityContext) -> AccessResult<ScopeResult> {
        let effective = self.resolver.effective_permissions(actor).await?;
        let scope = scope_for(&effective, context);

        let result = match scope {
            Scope::All => ScopeResult::all(),
            // An empty team stays empty; the actor is not added implicitly
            Scope::Team => ScopeResult {
                scope,
                usernames: Some(self.graph.transitive_members(&actor.username, self.max_team_depth).await?),
            },
            Scope::Own => ScopeResult {
                scope,
                usernames: Some(BTreeSet::from([actor.username.clone()])),
            },
            Scope::None => ScopeResult::none(),
        };

        debug!(
            user_id = actor.user_id,
            context = %context,
            scope = %result.scope,
            visible = ?result.usernames.as_ref().map(|u| u.len()),
            "Resolved visibility scope"
        );

        Ok(result)
    }
}
