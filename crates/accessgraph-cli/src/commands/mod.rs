pub mod manage;
pub mod query;

use crate::config::StateFile;
use accessgraph_core::{AccessEngine, AccessStore, Actor, AdminService, AuditLogger, MemoryStore, MutationOutcome, UserRecord};
use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

pub struct CommandContext {
    pub engine: Arc<AccessEngine>,
    pub admin: AdminService,
    pub json: bool,
    store: Arc<MemoryStore>,
    state: StateFile,
    state_path: Option<PathBuf>,
    acting_as: Option<String>,
}

impl CommandContext {
    pub async fn new(state: StateFile, state_path: Option<PathBuf>, acting_as: Option<String>, json: bool) -> Result<Self> {
        let store = Arc::new(MemoryStore::from_snapshot(state.store.clone()));
        let audit = Arc::new(AuditLogger::with_max_events(state.engine.audit_max_events));
        let engine = Arc::new(AccessEngine::new(store.clone(), audit, state.engine.clone()));

        if state.seed_defaults {
            let report = engine.seed_default_catalog().await?;
            tracing::debug!(permissions_added = report.permissions_added, grants_added = report.grants_added, "Seeded default catalog");
        }

        Ok(Self {
            admin: AdminService::new(engine.clone()),
            engine,
            json,
            store,
            state,
            state_path,
            acting_as,
        })
    }

    /// The user selected with `--as`
    pub async fn actor(&self) -> Result<Actor> {
        let username = self.acting_as.as_deref().ok_or_else(|| anyhow!("this command needs an acting user (--as <username>)"))?;
        let user = self.user(username).await?;
        if !user.active {
            bail!("acting user '{}' is inactive", username);
        }
        Ok(user.actor())
    }

    /// `username` when given, otherwise the acting user
    pub async fn subject(&self, username: Option<&str>) -> Result<Actor> {
        match username {
            Some(username) => Ok(self.user(username).await?.actor()),
            None => self.actor().await,
        }
    }

    pub async fn user(&self, username: &str) -> Result<UserRecord> {
        self.store
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| anyhow!("unknown user '{}'", username))
    }

    /// Write the current store back to the state file
    pub async fn save(&self) -> Result<PathBuf> {
        let path = self.state_path.clone().context("--save needs a state file (--config or ACCESSGRAPH_CONFIG)")?;
        let state = StateFile {
            // The catalog now lives in the snapshot; reseeding would undo role revocations
            seed_defaults: false,
            engine: self.state.engine.clone(),
            store: self.store.snapshot().await,
        };
        state.save_to_file(&path)?;
        Ok(path)
    }

    /// Print `value` as JSON under `--json`, otherwise run `human`
    pub fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }

    /// Print a mutation outcome, persisting the store on success when asked to
    pub async fn finish(&self, outcome: MutationOutcome, save: bool) -> Result<ExitCode> {
        self.emit(&outcome, |outcome| match &outcome.error_code {
            None => println!("{}", outcome.message),
            Some(code) => println!("Error [{}]: {}", code, outcome.message),
        })?;

        if !outcome.success {
            return Ok(ExitCode::FAILURE);
        }
        if save {
            let path = self.save().await?;
            tracing::info!(path = %path.display(), "State saved");
        }
        Ok(ExitCode::SUCCESS)
    }
}
