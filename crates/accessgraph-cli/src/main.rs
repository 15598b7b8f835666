use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod config;

use crate::commands::CommandContext;
use crate::config::StateFile;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Permission and team-visibility administration
#[derive(Parser, Debug)]
#[command(name = "accessgraph", about = "AccessGraph permission administration")]
pub struct Cli {
    /// Path to the state file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Username of the acting user
    #[arg(long = "as", value_name = "USERNAME", global = true)]
    pub acting_as: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Write the updated state back to the state file after a successful mutation
    #[arg(long, global = true)]
    pub save: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the effective permissions of a user
    Effective {
        /// Defaults to the acting user
        #[arg(long)]
        user: Option<String>,
    },

    /// Check a single permission code
    Check {
        code: String,
        #[arg(long)]
        user: Option<String>,
    },

    /// Show whose records a user may see in a context (simulations, evaluations, metrics)
    Visible {
        context: String,
        #[arg(long)]
        user: Option<String>,
    },

    /// Role, overrides and effective permissions of a user
    Detail { user: String },

    /// Permission x role grant matrix
    Matrix,

    /// Add a permission to a user
    Grant {
        user: String,
        code: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Remove a permission from a user
    Revoke {
        user: String,
        code: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Drop a user's override so the role default applies again
    Restore { user: String, code: String },

    /// Add a permission to a role's default policy
    RoleGrant { role: String, code: String },

    /// Remove a permission from a role's default policy
    RoleRevoke { role: String, code: String },

    /// Put a member under a manager
    Assign { manager: String, member: String },

    /// Remove an assignment by id or by manager and member
    Unassign {
        #[arg(long, conflicts_with_all = ["manager", "member"])]
        id: Option<u64>,
        manager: Option<String>,
        member: Option<String>,
    },

    /// Report data that breaks the access model
    Invariants,

    /// Delete removal overrides that target protected admin permissions
    Purge,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load state
    let state_path = StateFile::resolve_path(cli.config);
    let state = StateFile::resolve_config(state_path.as_deref())?;

    let ctx = CommandContext::new(state, state_path, cli.acting_as, cli.json).await?;
    let save = cli.save;

    // Dispatch commands
    let status = match cli.command {
        Commands::Effective { user } => {
            commands::query::show_effective(&ctx, user.as_deref()).await?;
            ExitCode::SUCCESS
        }
        Commands::Check { code, user } => commands::query::check_permission(&ctx, &code, user.as_deref()).await?,
        Commands::Visible { context, user } => {
            commands::query::show_visible(&ctx, &context, user.as_deref()).await?;
            ExitCode::SUCCESS
        }
        Commands::Detail { user } => {
            commands::query::show_detail(&ctx, &user).await?;
            ExitCode::SUCCESS
        }
        Commands::Matrix => {
            commands::query::show_matrix(&ctx).await?;
            ExitCode::SUCCESS
        }
        Commands::Invariants => commands::query::show_invariants(&ctx).await?,
        Commands::Grant { user, code, reason } => commands::manage::grant(&ctx, save, &user, &code, reason).await?,
        Commands::Revoke { user, code, reason } => commands::manage::revoke(&ctx, save, &user, &code, reason).await?,
        Commands::Restore { user, code } => commands::manage::restore(&ctx, save, &user, &code).await?,
        Commands::RoleGrant { role, code } => commands::manage::role_grant(&ctx, save, &role, &code).await?,
        Commands::RoleRevoke { role, code } => commands::manage::role_revoke(&ctx, save, &role, &code).await?,
        Commands::Assign { manager, member } => commands::manage::assign(&ctx, save, &manager, &member).await?,
        Commands::Unassign { id, manager, member } => commands::manage::unassign(&ctx, save, id, manager.as_deref(), member.as_deref()).await?,
        Commands::Purge => commands::manage::purge(&ctx, save).await?,
    };

    Ok(status)
}
