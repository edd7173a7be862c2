//! Target contract shared by local and remote machines
//!
//! Rules only ever see a `&dyn Target`, so the same rule code runs
//! unchanged against the local machine or an SSH host.

use crate::context::{ApplyContext, LogReport};
use crate::rule::Rule;
use crate::types::{Response, Status};
use anyhow::Result;
use std::fmt;
use std::io::{Read, Write};

/// A machine that commands and rules run against
///
/// Every operation runs as the *active* user of the target. When that
/// differs from the user the connection authenticated as, implementations
/// escalate privileges transparently.
///
/// `Display` renders the target as `<connection-user>@<address>`.
pub trait Target: Send + Sync + fmt::Display {
    /// The user operations currently run as
    fn user(&self) -> &str;

    /// Run a command as the active user, feeding `stdin` to it
    ///
    /// A non-zero exit status is not an error; it is reported in the
    /// [`Response`]. Errors are reserved for failures to run at all.
    fn run(&self, command: &str, stdin: &str) -> Result<Response>;

    /// Run a read-only check command
    ///
    /// Same mechanism as [`Target::run`]. Rule authors use it for check
    /// commands, which must not change the target.
    fn run_check(&self, command: &str, stdin: &str) -> Result<Response> {
        self.run(command, stdin)
    }

    /// Create a directory
    fn mkdir(&self, path: &str) -> Result<()>;

    /// Create or truncate a file for writing
    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>>;

    /// Open a file for reading
    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Open a file for writing at its end, creating it if missing
    fn append(&self, path: &str) -> Result<Box<dyn Write + Send>>;

    /// A target sharing this one's connection, acting as `user`
    ///
    /// The receiver is left untouched. Nothing is checked here: a missing
    /// user or missing sudo rights only show up on first use.
    fn as_user(&self, user: &str) -> Box<dyn Target>;

    /// Release the connection and every cached file session
    fn close(&self) -> Result<()>;
}

/// Rule application on any target
pub trait TargetExt {
    /// Apply `rule` under `name`, logging the outcome tree
    ///
    /// `Err` is exactly the [`Status::Failed`] outcome.
    fn apply(&self, name: &str, rule: &dyn Rule) -> Result<Status>;
}

impl<T: Target> TargetExt for T {
    fn apply(&self, name: &str, rule: &dyn Rule) -> Result<Status> {
        let mut reporter = LogReport::new(self.to_string());
        crate::apply::apply(self, name, rule, &mut ApplyContext::new(&mut reporter))
    }
}

impl TargetExt for dyn Target + '_ {
    fn apply(&self, name: &str, rule: &dyn Rule) -> Result<Status> {
        let mut reporter = LogReport::new(self.to_string());
        crate::apply::apply(self, name, rule, &mut ApplyContext::new(&mut reporter))
    }
}
