//! Apply context and reporter traits
//!
//! Reporters receive the outcome of every rule as it is applied, keeping
//! the engine free of any particular output format.

use crate::report::tree_indent;
use crate::types::Status;

/// Receiver of per-rule progress during apply
///
/// `depth` is 0 for the rule passed to apply and grows by one for each
/// composite level below it.
pub trait Reporter: Send {
    /// Called before a rule is checked
    fn on_rule_start(&mut self, name: &str, depth: usize);

    /// Called once a rule reached its terminal status
    ///
    /// `error` is set exactly when `status` is [`Status::Failed`].
    fn on_rule_complete(
        &mut self,
        name: &str,
        depth: usize,
        status: Status,
        error: Option<&anyhow::Error>,
    );
}

/// No-op reporter
pub struct NoReport;

impl Reporter for NoReport {
    fn on_rule_start(&mut self, _name: &str, _depth: usize) {}
    fn on_rule_complete(
        &mut self,
        _name: &str,
        _depth: usize,
        _status: Status,
        _error: Option<&anyhow::Error>,
    ) {
    }
}

/// Reporter writing each outcome to the `log` facade
pub struct LogReport {
    target: String,
}

impl LogReport {
    /// Create a reporter that prefixes lines with the target name
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Reporter for LogReport {
    fn on_rule_start(&mut self, name: &str, depth: usize) {
        log::debug!("{} {}{}: checking", self.target, tree_indent(depth as i64 * 2), name);
    }

    fn on_rule_complete(
        &mut self,
        name: &str,
        depth: usize,
        status: Status,
        error: Option<&anyhow::Error>,
    ) {
        let indent = tree_indent(depth as i64 * 2);
        match error {
            Some(e) => log::warn!("{} {indent}{name}: {status}: {e:#}", self.target),
            None => log::info!("{} {indent}{name}: {status}", self.target),
        }
    }
}

/// Context passed down while applying rules
pub struct ApplyContext<'a> {
    /// Nesting depth of the rule being applied
    pub depth: usize,
    /// Where outcomes are reported
    pub reporter: &'a mut dyn Reporter,
}

impl<'a> ApplyContext<'a> {
    /// Create a top-level context
    pub fn new(reporter: &'a mut dyn Reporter) -> Self {
        Self { depth: 0, reporter }
    }

    /// Context for the children of the rule currently being applied
    pub fn descend(&mut self) -> ApplyContext<'_> {
        ApplyContext {
            depth: self.depth + 1,
            reporter: &mut *self.reporter,
        }
    }
}
