use super::CommandContext;
use accessgraph_core::VisibilityContext;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::process::ExitCode;

#[derive(Serialize)]
struct EffectiveView {
    username: String,
    role: String,
    permissions: BTreeSet<String>,
}

#[derive(Serialize)]
struct CheckView {
    username: String,
    code: String,
    granted: bool,
}

pub async fn show_effective(ctx: &CommandContext, user: Option<&str>) -> Result<()> {
    let subject = ctx.subject(user).await?;
    let permissions = ctx.engine.effective_permissions(&subject).await?;

    let view = EffectiveView {
        username: subject.username,
        role: subject.role,
        permissions,
    };
    ctx.emit(&view, |view| {
        println!("Effective permissions for {} ({}):", view.username, view.role);
        for code in &view.permissions {
            println!("  {}", code);
        }
    })
}

/// Exit status reflects the decision so scripts can branch on it
pub async fn check_permission(ctx: &CommandContext, code: &str, user: Option<&str>) -> Result<ExitCode> {
    let subject = ctx.subject(user).await?;
    let granted = ctx.engine.has_permission(&subject, code).await?;

    let view = CheckView {
        username: subject.username,
        code: code.to_string(),
        granted,
    };
    ctx.emit(&view, |view| {
        let verdict = if view.granted { "granted" } else { "denied" };
        println!("{} -> {}: {}", view.username, view.code, verdict);
    })?;

    Ok(if granted { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

pub async fn show_visible(ctx: &CommandContext, context: &str, user: Option<&str>) -> Result<()> {
    let context: VisibilityContext = context.parse()?;
    let subject = ctx.subject(user).await?;
    let result = ctx.engine.resolve_visible_actors(&subject, context).await?;

    ctx.emit(&result, |result| {
        println!("Scope for {} in {}: {}", subject.username, context, result.scope);
        match &result.usernames {
            None => println!("  (unrestricted)"),
            Some(usernames) if usernames.is_empty() => println!("  (nobody)"),
            Some(usernames) => {
                for username in usernames {
                    println!("  {}", username);
                }
            }
        }
    })
}

pub async fn show_detail(ctx: &CommandContext, user: &str) -> Result<()> {
    let record = ctx.user(user).await?;
    let detail = ctx.engine.permission_detail(record.id).await?;

    ctx.emit(&detail, |detail| {
        println!("User: {} (id {}, role {})", detail.username, detail.user_id, detail.role);
        print_codes("Role permissions", &detail.role_permissions);
        print_codes("Added", &detail.added);
        print_codes("Removed", &detail.removed);
        print_codes("Ineffective removals", &detail.ineffective_removals);
        print_codes("Protected", &detail.protected);
        print_codes("Effective", &detail.effective);
    })
}

pub async fn show_matrix(ctx: &CommandContext) -> Result<()> {
    let matrix = ctx.engine.permission_matrix().await?;

    ctx.emit(&matrix, |matrix| {
        let mut header = format!("{:<28}", "Permission");
        for role in &matrix.roles {
            header.push_str(&format!(" {:<14}", role));
        }
        println!("{}", header);
        println!("{}", "-".repeat(header.len()));

        for permission in &matrix.permissions {
            let mut row = format!("{:<28}", permission.code);
            for role in &matrix.roles {
                let cell = if matrix.is_granted(role, &permission.code) { "x" } else { "." };
                row.push_str(&format!(" {:<14}", cell));
            }
            println!("{}", row);
        }
        println!("Protected for admin: {}", matrix.protected_permissions.join(", "));
    })
}

/// Exit status is non-zero when any finding is reported
pub async fn show_invariants(ctx: &CommandContext) -> Result<ExitCode> {
    let report = ctx.engine.check_invariants().await?;

    ctx.emit(&report, |report| {
        if report.is_clean() {
            println!("No invariant violations found.");
            return;
        }
        println!("{} finding(s):", report.finding_count());
        for row in &report.ineffective_protected_overrides {
            println!("  ineffective protected override: {} (id {}) -> {}", row.username, row.user_id, row.permission_code);
        }
        for edge in &report.self_edges {
            println!("  self assignment: {} (edge {})", edge.manager_username, edge.id);
        }
        for dangling in &report.dangling_edges {
            println!("  dangling assignment {}: {}", dangling.edge.id, dangling.invalid_usernames.join(", "));
        }
        for row in &report.inactive_permission_overrides {
            println!("  override on inactive permission: user {} -> {}", row.user_id, row.permission_code);
        }
        for cycle in &report.cycles {
            println!("  assignment cycle: {}", cycle.join(" <-> "));
        }
    })?;

    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_codes(title: &str, codes: &BTreeSet<String>) {
    if codes.is_empty() {
        println!("{}: -", title);
    } else {
        println!("{}: {}", title, codes.iter().map(String::as_str).collect::<Vec<_>>().join(", "));
    }
}
