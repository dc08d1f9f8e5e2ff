use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use portal_sdk::{
    AggregateFilter, Fetched, FieldMap, Fixture, Portal, RequestKind, Resolution, SyncResult,
    UserId,
};
use portal_server::{PortalServer, ServerConfig};
use serde::Serialize;
use serde_json::Value;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ServerConfig::default(),
    };
    let fixture = match &cli.fixture {
        Some(path) => Fixture::load(path)
            .with_context(|| format!("loading fixture {}", path.display()))?,
        None => Fixture::sample()?,
    };
    tracing::debug!(users = fixture.users.len(), "fixture loaded");
    let portal = Portal::from_fixture(&fixture, config.portal.clone())?;
    let out = Output(cli.format);

    match cli.command {
        Command::Instances(args) => cmd_instances(&portal, args, &out).await,
        Command::Route(args) => cmd_route(&portal, args, &out),
        Command::Profile(args) => cmd_profile(&portal, args, &out).await,
        Command::Payslips(args) => cmd_list(&portal, RequestKind::GetPayslips, args, &out).await,
        Command::Documents(args) => {
            let kind = listing_kind(args.kind.as_deref())?;
            cmd_list(&portal, kind, args.list, &out).await
        }
        Command::Sync(args) => cmd_sync(&portal, args, &out).await,
        Command::Serve(args) => cmd_serve(portal, config, args).await,
    }
}

struct Output(OutputFormat);

impl Output {
    /// Print `value` as JSON and return `true`, or return `false` for text mode.
    fn json<T: Serialize>(&self, value: &T) -> anyhow::Result<bool> {
        if self.0 != OutputFormat::Json {
            return Ok(false);
        }
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(true)
    }
}

fn listing_kind(kind: Option<&str>) -> anyhow::Result<RequestKind> {
    Ok(match kind {
        None => RequestKind::GetDocuments,
        Some("certificate") => RequestKind::GetCertificates,
        Some("contract") => RequestKind::GetContracts,
        Some("payslip") => RequestKind::GetPayslips,
        Some(other) => bail!("unsupported document type: {other}"),
    })
}

async fn cmd_instances(portal: &Portal, args: UserArgs, out: &Output) -> anyhow::Result<()> {
    let statuses = portal.instance_status(&UserId::from(args.user)).await?;
    if out.json(&statuses)? {
        return Ok(());
    }
    for s in &statuses {
        let marker = if s.is_active { "*".green().bold() } else { " ".normal() };
        let primary = if s.is_primary { " (primary)".yellow().to_string() } else { String::new() };
        let state = if !s.has_access {
            "no access".dimmed()
        } else if s.reachable {
            "reachable".green()
        } else {
            "unreachable".red()
        };
        print!("{marker} {} {}{primary}  {state}", s.name.bold(), s.instance_id.to_string().dimmed());
        if let Some(count) = s.document_count {
            print!("  {count} document(s)");
        }
        if let Some(err) = &s.error {
            print!("  {}", err.red());
        }
        println!();
    }
    Ok(())
}

fn cmd_route(portal: &Portal, args: RouteArgs, out: &Output) -> anyhow::Result<()> {
    let instance = portal.resolve_named(&args.kind, &UserId::from(args.user))?;
    if out.json(&serde_json::json!({ "kind": &args.kind, "instanceId": &instance }))? {
        return Ok(());
    }
    println!("{} → {}", args.kind.bold(), instance.to_string().cyan());
    Ok(())
}

async fn cmd_profile(portal: &Portal, args: UserArgs, out: &Output) -> anyhow::Result<()> {
    let routed = portal.get_personal_info(&UserId::from(args.user)).await?;
    if out.json(&routed)? {
        return Ok(());
    }
    let info = &routed.value;
    println!("{} (from {})", info.full_name.bold(), routed.instance.to_string().cyan());
    println!("  Staff ID: {}", info.staff_id);
    println!("  School: {}", info.school_assignment);
    println!("  Email: {}", info.contact_details.email);
    println!("  Phone: {}", info.contact_details.phone);
    println!("  Civil status: {}", info.civil_status);
    Ok(())
}

async fn cmd_list(
    portal: &Portal,
    kind: RequestKind,
    args: ListArgs,
    out: &Output,
) -> anyhow::Result<()> {
    let filter = AggregateFilter {
        instance: args.instance.map(Into::into),
        from: args.from,
        to: args.to,
    };
    let mut fetched = portal
        .aggregate_fetch(kind, &UserId::from(args.user), Some(filter))
        .await?;
    if args.newest_first {
        match &mut fetched {
            Fetched::Payslips(agg) => agg.items.sort_by(|a, b| b.document.date.cmp(&a.document.date)),
            Fetched::Documents(agg) => agg.items.sort_by(|a, b| b.date.cmp(&a.date)),
        }
    }
    if out.json(&fetched)? {
        return Ok(());
    }

    let errors = match &fetched {
        Fetched::Payslips(agg) => {
            for p in &agg.items {
                println!(
                    "{}  {:<14} {:<16} net {:>9.2}  gross {:>9.2}",
                    p.document.date.to_string().dimmed(),
                    p.document.instance_id.to_string().cyan(),
                    p.document.title,
                    p.net_pay,
                    p.gross_pay,
                );
            }
            &agg.per_instance_errors
        }
        Fetched::Documents(agg) => {
            for d in &agg.items {
                println!(
                    "{}  {:<14} {:<12} {}",
                    d.date.to_string().dimmed(),
                    d.instance_id.to_string().cyan(),
                    d.kind.to_string().yellow(),
                    d.title,
                );
            }
            &agg.per_instance_errors
        }
    };
    for (instance, reason) in errors {
        println!("{} {}: {}", "✗".red().bold(), instance, reason.red());
    }
    println!("{}", fetched.summary().dimmed());
    Ok(())
}

/// Parse `dotted.path=value` assignments. Values are taken as strings.
fn parse_assignments(assignments: &[String]) -> anyhow::Result<FieldMap> {
    let mut fields = FieldMap::new();
    for raw in assignments {
        let Some((path, value)) = raw.split_once('=') else {
            bail!("expected FIELD=VALUE, got {raw:?}");
        };
        if path.is_empty() {
            bail!("empty field path in {raw:?}");
        }
        fields.insert(path.to_string(), Value::String(value.to_string()));
    }
    Ok(fields)
}

async fn cmd_sync(portal: &Portal, args: SyncArgs, out: &Output) -> anyhow::Result<()> {
    let user = UserId::from(args.user);
    let candidate = parse_assignments(&args.assignments)?;
    let result = portal.sync(&user, &args.entity, candidate).await?;

    let resolved = match args.resolve {
        Some(choice) if result.has_conflicts() => {
            let resolution = match choice {
                ResolveChoice::Current => Resolution::Current,
                ResolveChoice::New => Resolution::New,
            };
            let ids: Vec<_> = result.conflicts().iter().map(|c| c.id).collect();
            let session = portal.open_conflict_session(&user, &args.entity, &ids).await?;
            portal.resolve_all(&session.id, resolution).await?;
            Some(portal.commit(&session.id).await?)
        }
        _ => None,
    };

    if out.json(&serde_json::json!({ "sync": &result, "resolution": &resolved }))? {
        return Ok(());
    }
    print_sync(&result);
    if let Some(resolved) = resolved {
        let mark = if resolved.success { "✓".green().bold() } else { "✗".red().bold() };
        println!("{mark} Resolved {} conflict(s)", resolved.resolved_conflicts);
        for failed in resolved.failed_resolutions.iter().flatten() {
            println!(
                "  {} {} {}: {}",
                "✗".red(),
                failed.instance_id,
                failed.field.bold(),
                failed.reason.red()
            );
        }
    }
    Ok(())
}

fn print_sync(result: &SyncResult) {
    if result.success {
        println!(
            "{} In sync on {} instance(s)",
            "✓".green().bold(),
            result.instances_updated.len()
        );
    } else {
        println!("{} Sync incomplete", "!".yellow().bold());
    }
    for write in &result.applied {
        println!("  {} {}: {}", "updated".green(), write.instance_id, write.fields.join(", "));
    }
    for c in result.conflicts() {
        println!(
            "  {} {} {}: {} → {}  [{}]",
            "conflict".yellow(),
            c.instance_id,
            c.field.bold(),
            c.current_value,
            c.new_value,
            c.id.short_id().dimmed(),
        );
    }
    for (instance, reason) in &result.failures {
        println!("  {} {}: {}", "failed".red(), instance, reason.red());
    }
}

async fn cmd_serve(portal: Portal, mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    println!("Portal server on {}", config.bind_addr.to_string().bold());
    PortalServer::new(config, Arc::new(portal)).serve().await?;
    Ok(())
}
