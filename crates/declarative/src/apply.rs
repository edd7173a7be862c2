//! Apply engine - drives a rule to a terminal status on one target

use crate::context::ApplyContext;
use crate::rule::Rule;
use crate::target::Target;
use crate::types::Status;
use anyhow::Result;

/// Apply `rule` to `target`, reporting the outcome under `name`
///
/// Check first; if the desired state already holds the rule is
/// [`Status::Satisfied`] and nothing is changed. Otherwise ensure it and
/// return [`Status::Applied`]. Any error from either step ends the apply
/// as [`Status::Failed`] and is returned as `Err`. Nothing is retried.
pub fn apply(
    target: &dyn Target,
    name: &str,
    rule: &dyn Rule,
    ctx: &mut ApplyContext<'_>,
) -> Result<Status> {
    ctx.reporter.on_rule_start(name, ctx.depth);

    let result = match rule.converge(target, ctx) {
        Ok(Status::Failed) => Err(anyhow::anyhow!(
            "rule '{name}' reported failure without an error"
        )),
        other => other,
    };

    match &result {
        Ok(status) => ctx.reporter.on_rule_complete(name, ctx.depth, *status, None),
        Err(e) => ctx
            .reporter
            .on_rule_complete(name, ctx.depth, Status::Failed, Some(e)),
    }

    result
}
