//! Tree rendering of nested apply outcomes

use crate::context::Reporter;
use crate::types::{ApplySummary, Status};
use serde::Serialize;

/// Indentation for a tree column `n` characters wide
///
/// Built from the two-character unit ` │`, with a trailing space when
/// `n` is odd. Non-positive widths give no indent.
pub fn tree_indent(n: i64) -> String {
    if n <= 0 {
        return String::new();
    }
    let mut s = " │".repeat((n / 2) as usize);
    if n % 2 == 1 {
        s.push(' ');
    }
    s
}

/// One rule outcome in a report
#[derive(Debug, Clone, Serialize)]
pub struct ReportLine {
    pub depth: usize,
    pub name: String,
    /// `None` while the rule is still being applied
    pub status: Option<Status>,
    pub error: Option<String>,
}

/// Reporter that records the whole outcome tree
///
/// Lines are kept in start order, so a composite precedes its children.
#[derive(Debug, Default, Serialize)]
pub struct TreeReport {
    lines: Vec<ReportLine>,
    #[serde(skip)]
    open: Vec<usize>,
}

impl TreeReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded lines in tree order
    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Count the statuses of the top-level rules
    pub fn summary(&self) -> ApplySummary {
        self.summary_at(0)
    }

    /// Count the statuses of the rules `depth` levels down
    pub fn summary_at(&self, depth: usize) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for line in self.lines.iter().filter(|l| l.depth == depth) {
            if let Some(status) = line.status {
                summary.add(status);
            }
        }
        summary
    }

    /// Render the tree, one rule per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let status = line
                .status
                .map_or_else(|| "pending".to_string(), |s| s.to_string());
            out.push_str(&tree_indent(line.depth as i64 * 2));
            out.push_str(&line.name);
            out.push_str(": ");
            out.push_str(&status);
            if let Some(e) = &line.error {
                out.push_str(" (");
                out.push_str(e);
                out.push(')');
            }
            out.push('\n');
        }
        out
    }
}

impl Reporter for TreeReport {
    fn on_rule_start(&mut self, name: &str, depth: usize) {
        self.open.push(self.lines.len());
        self.lines.push(ReportLine {
            depth,
            name: name.to_string(),
            status: None,
            error: None,
        });
    }

    fn on_rule_complete(
        &mut self,
        name: &str,
        depth: usize,
        status: Status,
        error: Option<&anyhow::Error>,
    ) {
        let error = error.map(|e| format!("{e:#}"));
        match self.open.pop() {
            Some(idx) => {
                let line = &mut self.lines[idx];
                line.status = Some(status);
                line.error = error;
            }
            None => self.lines.push(ReportLine {
                depth,
                name: name.to_string(),
                status: Some(status),
                error,
            }),
        }
    }
}
