use accessgraph_core::{EngineConfig, StoreSnapshot};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// On-disk state: engine settings plus every table of the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateFile {
    /// Install the default catalog and role grants before running a command
    pub seed_defaults: bool,
    pub engine: EngineConfig,
    pub store: StoreSnapshot,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            seed_defaults: true,
            engine: EngineConfig::from_env(),
            store: StoreSnapshot::default(),
        }
    }
}

impl StateFile {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("reading state file {}", path.display()))?;
        let state: Self = toml::from_str(&content).with_context(|| format!("parsing state file {}", path.display()))?;
        Ok(state)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// State file location: `--config`, then `$ACCESSGRAPH_CONFIG`
    pub fn resolve_path(cli_config: Option<PathBuf>) -> Option<PathBuf> {
        cli_config.or_else(|| std::env::var_os("ACCESSGRAPH_CONFIG").map(PathBuf::from))
    }

    pub fn resolve_config(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessgraph_core::{AssignmentEdge, UserRecord};

    #[test]
    fn test_state_survives_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");

        let mut state = StateFile::default();
        state.seed_defaults = false;
        state.store.users.push(UserRecord::new(1, "ana", "admin"));
        state.store.assignments.push(AssignmentEdge::new(1, "ana", "luis"));
        state.save_to_file(&path).unwrap();

        let loaded = StateFile::load_from_file(&path).unwrap();
        assert!(!loaded.seed_defaults);
        assert_eq!(loaded.store.users, state.store.users);
        assert_eq!(loaded.store.assignments.len(), 1);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let state: StateFile = toml::from_str("[[store.users]]\nid = 7\nusername = \"luis\"\nrole = \"asesor\"\n").unwrap();
        assert!(state.seed_defaults);
        assert_eq!(state.engine.max_team_depth, 5);
        assert!(state.store.users[0].active);
    }
}
