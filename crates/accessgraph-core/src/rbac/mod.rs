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

//! Role-based access control
//!
//! This module provides:
//! - A permission catalog with logical deactivation
//! - Role policies and per-user add/remove overrides
//! - A protected-permission guard for the protected role
//! - TTL caching of role policies and override sets
//! - Route guards and administration reports

pub mod cache;
pub mod catalog;
pub mod enforce;
pub mod guard;
pub mod overrides;
pub mod policy;
pub mod reports;
pub mod resolver;

pub use cache::*;
pub use catalog::*;
pub use enforce::*;
pub use guard::*;
pub use overrides::*;
pub use policy::*;
pub use reports::*;
pub use resolver::*;
