use super::CommandContext;
use anyhow::{Result, bail};
use std::process::ExitCode;

pub async fn grant(ctx: &CommandContext, save: bool, user: &str, code: &str, reason: Option<String>) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let target = ctx.user(user).await?;
    let outcome = ctx.admin.grant_override(&actor, target.id, code, reason).await;
    ctx.finish(outcome, save).await
}

pub async fn revoke(ctx: &CommandContext, save: bool, user: &str, code: &str, reason: Option<String>) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let target = ctx.user(user).await?;
    let outcome = ctx.admin.revoke_override(&actor, target.id, code, reason).await;
    ctx.finish(outcome, save).await
}

pub async fn restore(ctx: &CommandContext, save: bool, user: &str, code: &str) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let target = ctx.user(user).await?;
    let outcome = ctx.admin.restore_override(&actor, target.id, code).await;
    ctx.finish(outcome, save).await
}

pub async fn role_grant(ctx: &CommandContext, save: bool, role: &str, code: &str) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let outcome = ctx.admin.grant_to_role(&actor, role, code).await;
    ctx.finish(outcome, save).await
}

pub async fn role_revoke(ctx: &CommandContext, save: bool, role: &str, code: &str) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let outcome = ctx.admin.revoke_from_role(&actor, role, code).await;
    ctx.finish(outcome, save).await
}

pub async fn assign(ctx: &CommandContext, save: bool, manager: &str, member: &str) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let outcome = ctx.admin.add_assignment(&actor, manager, member).await;
    ctx.finish(outcome, save).await
}

/// Remove by edge id, or by the manager/member pair
pub async fn unassign(ctx: &CommandContext, save: bool, id: Option<u64>, manager: Option<&str>, member: Option<&str>) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let outcome = match (id, manager, member) {
        (Some(id), _, _) => ctx.admin.remove_assignment(&actor, id).await,
        (None, Some(manager), Some(member)) => ctx.admin.remove_assignment_pair(&actor, manager, member).await,
        _ => bail!("unassign needs either --id <edge> or <manager> <member>"),
    };
    ctx.finish(outcome, save).await
}

pub async fn purge(ctx: &CommandContext, save: bool) -> Result<ExitCode> {
    let actor = ctx.actor().await?;
    let outcome = ctx.admin.purge_ineffective_overrides(&actor).await;
    ctx.finish(outcome, save).await
}
