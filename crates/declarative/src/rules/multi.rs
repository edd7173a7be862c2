//! Composite rule - an ordered tree of named child rules

use crate::apply::apply;
use crate::context::{ApplyContext, NoReport};
use crate::rule::{BoxedRule, Rule};
use crate::target::Target;
use crate::types::{FailurePolicy, Status};
use anyhow::{Context, Result};

/// Rule made of an ordered list of named rules
///
/// Satisfied iff every child is satisfied, checked in order and stopping
/// at the first child that is not. When unsatisfied, every child is applied
/// in order, each reported one level deeper than the composite. What
/// happens on a failed child is set by the [`FailurePolicy`].
#[derive(Default)]
pub struct Multi {
    rules: Vec<(String, BoxedRule)>,
    policy: FailurePolicy,
}

impl Multi {
    /// Create an empty composite that stops at the first failure
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty composite with an explicit failure policy
    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            rules: Vec::new(),
            policy,
        }
    }

    /// Add a rule, named after its description
    pub fn add(&mut self, rule: impl Rule + 'static) -> &mut Self {
        let name = rule.describe();
        self.add_named(name, rule)
    }

    /// Add a rule under an explicit name
    pub fn add_named(&mut self, name: impl Into<String>, rule: impl Rule + 'static) -> &mut Self {
        self.rules.push((name.into(), Box::new(rule)));
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Child names in application order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(name, _)| name.as_str())
    }
}

impl Rule for Multi {
    fn describe(&self) -> String {
        format!("{} rules", self.len())
    }

    fn check(&self, target: &dyn Target) -> Result<bool> {
        for (name, rule) in &self.rules {
            let satisfied = rule
                .check(target)
                .with_context(|| format!("Failed to check '{name}'"))?;
            if !satisfied {
                log::debug!("{target} '{name}' is not satisfied");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn ensure(&self, target: &dyn Target) -> Result<()> {
        self.converge(target, &mut ApplyContext::new(&mut NoReport))
            .map(|_| ())
    }

    fn converge(&self, target: &dyn Target, ctx: &mut ApplyContext<'_>) -> Result<Status> {
        if self.check(target)? {
            return Ok(Status::Satisfied);
        }

        let mut ctx = ctx.descend();
        let mut first_error = None;
        let mut failed = 0;

        for (name, rule) in &self.rules {
            let Err(e) = apply(target, name, rule.as_ref(), &mut ctx) else {
                continue;
            };
            log::debug!("{target} '{name}' failed: {e:#}");
            match self.policy {
                // The report already names the child; its error passes through as is
                FailurePolicy::FailFast => return Err(e),
                FailurePolicy::Continue => {
                    failed += 1;
                    first_error.get_or_insert_with(|| e.context(format!("rule '{name}' failed")));
                }
            }
        }

        match first_error {
            Some(e) => Err(e.context(format!("{failed} of {} rules failed", self.len()))),
            None => Ok(Status::Applied),
        }
    }
}
