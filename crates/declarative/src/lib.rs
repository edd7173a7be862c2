//! # Declarative
//!
//! Idempotent check-then-ensure rules, applied to local or remote targets.
//!
//! ## Core Concepts
//!
//! - **Target**: A machine commands and file operations run against, as an
//!   active user that can be switched with [`Target::as_user`]
//! - **Rule**: A desired state with a `check` and an `ensure`
//! - **Apply**: Check a rule and ensure it if needed, yielding a [`Status`]
//! - **Multi**: A composite rule applying ordered children as a tree
//!
//! ## Example
//!
//! ```ignore
//! use declarative::rules::{file, Cmd, Multi};
//! use declarative::TargetExt;
//!
//! let mut bootstrap = Multi::new();
//! bootstrap.add(file::Exists::new("/tmp/hello"));
//! bootstrap.add(Cmd::always("ls"));
//!
//! // `host` is any Target, local or remote
//! let status = host.apply("bootstrap", &bootstrap)?;
//! ```
//!
//! ## Reporter Trait
//!
//! Outcomes are pushed to a [`Reporter`] as rules complete. [`LogReport`]
//! writes them to the `log` facade, [`TreeReport`] records the tree for
//! printing and [`NoReport`] discards them.

pub mod apply;
pub mod context;
pub mod inventory;
pub mod report;
pub mod rule;
pub mod rules;
pub mod target;
pub mod types;

#[cfg(test)]
mod mock;

// Re-export main types at crate root
pub use apply::apply;
pub use context::{ApplyContext, LogReport, NoReport, Reporter};
pub use inventory::Inventory;
pub use report::{ReportLine, TreeReport, tree_indent};
pub use rule::{BoxedRule, Rule};
pub use target::{Target, TargetExt};
pub use types::{ApplySummary, EXIT_MISSING, FailurePolicy, Response, Status};
