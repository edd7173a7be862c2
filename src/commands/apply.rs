//! Apply a rules file across the inventory
//!
//! Hosts are connected and converged in parallel on a bounded pool; output
//! follows inventory order regardless of completion order.

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::RulesFile;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use declarative::rules::Multi;
use declarative::{ApplyContext, ApplySummary, Inventory, Status, Target, TreeReport, tree_indent};
use rayon::prelude::*;
use serde::Serialize;

/// Outcome of converging one host
#[derive(Debug, Serialize)]
pub struct HostOutcome {
    pub host: String,
    /// `user@address`, absent when the connection failed
    pub target: Option<String>,
    pub status: Status,
    pub error: Option<String>,
    pub report: TreeReport,
}

impl HostOutcome {
    fn unreachable(host: &str, error: &anyhow::Error) -> Self {
        Self {
            host: host.to_string(),
            target: None,
            status: Status::Failed,
            error: Some(format!("{error:#}")),
            report: TreeReport::new(),
        }
    }
}

#[derive(Serialize)]
struct ApplyOutput<'a> {
    summary: ApplySummary,
    /// Statuses of the rules file entries across every host
    rules: ApplySummary,
    hosts: &'a [HostOutcome],
}

/// Apply `rule` to one target, recording the tree
pub fn converge_host(host: &str, target: &dyn Target, name: &str, rule: &Multi) -> HostOutcome {
    let mut report = TreeReport::new();
    let result = declarative::apply(target, name, rule, &mut ApplyContext::new(&mut report));
    let (status, error) = match result {
        Ok(status) => {
            if status.is_change() {
                log::info!("{host}: {status}");
            } else {
                log::debug!("{host}: {status}");
            }
            (status, None)
        }
        Err(e) => {
            log::warn!("{host}: {e:#}");
            (Status::Failed, Some(format!("{e:#}")))
        }
    };
    HostOutcome {
        host: host.to_string(),
        target: Some(target.to_string()),
        status,
        error,
        report,
    }
}

/// Count host-level statuses
pub fn summarize(outcomes: &[HostOutcome]) -> ApplySummary {
    let mut summary = ApplySummary::default();
    for outcome in outcomes {
        summary.add(outcome.status);
    }
    summary
}

/// Count the rules file entries across hosts
pub fn summarize_rules(outcomes: &[HostOutcome]) -> ApplySummary {
    let mut rules = ApplySummary::default();
    for outcome in outcomes {
        rules.merge(&outcome.report.summary_at(1));
    }
    rules
}

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let rules = RulesFile::load(&args.rules)?;
    let rule = rules.to_rule();
    let name = args
        .rules
        .file_stem()
        .map_or_else(|| "rules".to_string(), |s| s.to_string_lossy().into_owned());

    let inventory_file = ctx.load_inventory()?;
    let hosts = inventory_file.select(args.host.as_deref())?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(usize::from(args.jobs.max(1)))
        .build()
        .context("Failed to build thread pool")?;

    let connected: Vec<_> = pool.install(|| {
        hosts
            .par_iter()
            .map(|host| (host.name.clone(), host.connect()))
            .collect()
    });

    let mut inventory = Inventory::new();
    let mut reachable = Vec::new();
    let mut outcomes = Vec::new();
    for (idx, (host, result)) in connected.into_iter().enumerate() {
        match result {
            Ok(target) => {
                inventory.add_boxed(target);
                reachable.push((idx, host));
            }
            Err(e) => outcomes.push((idx, HostOutcome::unreachable(&host, &e))),
        }
    }

    let targets: Vec<&dyn Target> = inventory.iter().collect();
    let applied: Vec<_> = pool.install(|| {
        targets
            .par_iter()
            .zip(reachable.par_iter())
            .map(|(target, (idx, host))| (*idx, converge_host(host, *target, &name, &rule)))
            .collect()
    });
    outcomes.extend(applied);
    outcomes.sort_by_key(|(idx, _)| *idx);
    let outcomes: Vec<HostOutcome> = outcomes.into_iter().map(|(_, o)| o).collect();

    if let Err(e) = inventory.close() {
        log::warn!("Failed to close connections: {e:#}");
    }

    let summary = summarize(&outcomes);
    let rules = summarize_rules(&outcomes);
    if args.json {
        let output = ApplyOutput {
            summary: summary.clone(),
            rules,
            hosts: &outcomes,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_outcomes(ctx, &outcomes);
        print_summary(&summary, &rules);
    }

    if !summary.is_success() {
        bail!("{} of {} hosts failed", summary.failed, summary.total());
    }
    Ok(())
}

fn print_outcomes(ctx: &Context, outcomes: &[HostOutcome]) {
    for outcome in outcomes {
        let title = match &outcome.target {
            Some(target) => format!("{} ({target})", outcome.host),
            None => outcome.host.clone(),
        };
        ui::section(&title);

        if outcome.report.lines().is_empty() {
            if let Some(e) = &outcome.error {
                ui::error(e);
            }
            continue;
        }
        if ctx.quiet {
            println!("  {}", ui::status(outcome.status));
            continue;
        }

        let lines = outcome.report.lines();
        for (i, line) in lines.iter().enumerate() {
            let status = line
                .status
                .map_or_else(|| "pending".dimmed(), ui::status);
            println!(
                "  {}{}: {}",
                tree_indent(line.depth as i64 * 2),
                line.name,
                status
            );
            // Only the deepest failure carries a distinct message
            let innermost = lines.get(i + 1).is_none_or(|next| next.depth <= line.depth);
            if innermost {
                if let Some(e) = &line.error {
                    ui::dim(&format!("{}{e}", tree_indent(line.depth as i64 * 2)));
                }
            }
        }
    }
}

fn print_summary(summary: &ApplySummary, rules: &ApplySummary) {
    println!();
    let text = format!(
        "{} hosts: {} applied, {} satisfied, {} failed ({} of {} rules changed)",
        summary.total(),
        summary.applied,
        summary.satisfied,
        summary.failed,
        rules.applied,
        rules.total()
    );
    if summary.is_success() {
        ui::success(&text);
    } else {
        ui::warn(&text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::rules::Cmd;
    use hostkit::{Local, LocalTransport};
    use tempfile::TempDir;

    fn local() -> Local {
        Local::from_transport(LocalTransport::with_user("tester"), "")
    }

    #[test]
    fn test_converge_host_records_tree() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("m");
        let mut rule = Multi::new();
        rule.add_named(
            "touch",
            Cmd::new(
                format!("test -e {}", marker.display()),
                format!("touch {}", marker.display()),
            ),
        );

        let host = local();
        let first = converge_host("box", &host, "site", &rule);
        assert_eq!(first.status, Status::Applied);
        assert_eq!(first.target.as_deref(), Some("tester@localhost"));
        assert_eq!(first.report.render(), "site: applied\n │touch: applied\n");

        let second = converge_host("box", &host, "site", &rule);
        assert_eq!(second.status, Status::Satisfied);

        let outcomes = [first, second];
        assert_eq!(summarize(&outcomes).total(), 2);
        // The satisfied run only checks the composite, so its children are not listed
        let rules = summarize_rules(&outcomes);
        assert_eq!((rules.applied, rules.total()), (1, 1));
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let mut rule = Multi::new();
        rule.add_named("broken", Cmd::always("exit 3"));

        let outcome = converge_host("box", &local(), "site", &rule);
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.error.unwrap().contains("exited with status 3"));

        let json = serde_json::to_value(&outcome.report).unwrap();
        assert_eq!(json["lines"][1]["status"], "failed");
    }

    #[test]
    fn test_unreachable_outcome() {
        let err = anyhow::anyhow!("refused");
        let outcome = HostOutcome::unreachable("db", &err);
        assert_eq!(outcome.status, Status::Failed);
        assert!(outcome.target.is_none());
        assert!(!summarize(&[outcome]).is_success());
    }
}
