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

//! Protected-permission guard
//!
//! Holders of the protected role can never lose the codes in
//! [`PROTECTED_PERMISSIONS`]: removals are rejected when written and ignored
//! when resolved.

use crate::model::PROTECTED_ROLE;
use std::collections::BTreeSet;

/// Codes the protected role always holds
pub const PROTECTED_PERMISSIONS: &[&str] = &["usr_permisos", "usr_ver", "usr_crear", "usr_editar", "usr_eliminar", "usr_password", "cfg_sco_ver", "cfg_sco_editar"];

/// True iff `role` is the protected role and `code` is in the protected set
pub fn is_protected(role: &str, code: &str) -> bool {
    role == PROTECTED_ROLE && is_protected_code(code)
}

pub fn is_protected_code(code: &str) -> bool {
    PROTECTED_PERMISSIONS.contains(&code)
}

/// Codes locked for a user holding `role`; empty for every other role
pub fn locked_for_role(role: &str) -> BTreeSet<String> {
    if role == PROTECTED_ROLE {
        PROTECTED_PERMISSIONS.iter().map(|c| c.to_string()).collect()
    } else {
        BTreeSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_protected_role_is_guarded() {
        for code in PROTECTED_PERMISSIONS {
            assert!(is_protected(PROTECTED_ROLE, code));
            assert!(!is_protected("supervisor", code));
        }
        assert!(!is_protected(PROTECTED_ROLE, "sim_usar"));
    }

    #[test]
    fn test_locked_for_role() {
        assert_eq!(locked_for_role(PROTECTED_ROLE).len(), PROTECTED_PERMISSIONS.len());
        assert!(locked_for_role("gerente").is_empty());
    }
}
