//! Rule defined by a check command and an ensure command

use crate::rule::Rule;
use crate::target::Target;
use anyhow::{Context, Result, bail};

/// Rule built from two shell commands
///
/// Satisfied when `check` exits 0. Ensuring runs `ensure`, which must exit
/// 0 as well. A check that always fails (`false`) makes the ensure command
/// run on every apply.
#[derive(Debug, Clone)]
pub struct Cmd {
    pub check: String,
    pub ensure: String,
}

impl Cmd {
    pub fn new(check: impl Into<String>, ensure: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            ensure: ensure.into(),
        }
    }

    /// Rule that runs `ensure` on every apply
    pub fn always(ensure: impl Into<String>) -> Self {
        Self::new("false", ensure)
    }
}

impl Rule for Cmd {
    fn describe(&self) -> String {
        format!("cmd: {}", self.ensure)
    }

    fn check(&self, target: &dyn Target) -> Result<bool> {
        let response = target
            .run_check(&self.check, "")
            .with_context(|| format!("Failed to run check `{}`", self.check))?;
        Ok(response.success())
    }

    fn ensure(&self, target: &dyn Target) -> Result<()> {
        let response = target
            .run(&self.ensure, "")
            .with_context(|| format!("Failed to run `{}`", self.ensure))?;

        if !response.success() {
            bail!(
                "`{}` exited with status {}: {}",
                self.ensure,
                response.exit_status,
                response.stderr.trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use crate::context::{ApplyContext, NoReport};
    use crate::mock::MockTarget;
    use crate::types::Status;

    fn run(target: &MockTarget, rule: &Cmd) -> Result<Status> {
        apply(target, "cmd", rule, &mut ApplyContext::new(&mut NoReport))
    }

    #[test]
    fn test_always_run() {
        let target = MockTarget::new("alice");
        target.script("false", 1);
        let rule = Cmd::always("ls");

        for _ in 0..3 {
            assert_eq!(run(&target, &rule).unwrap(), Status::Applied);
        }
        assert_eq!(target.count("ls"), 3);
    }

    #[test]
    fn test_satisfied_skips_ensure() {
        let target = MockTarget::new("alice");
        let rule = Cmd::new("true", "touch /x");

        assert_eq!(run(&target, &rule).unwrap(), Status::Satisfied);
        assert_eq!(target.count("touch /x"), 0);
    }

    #[test]
    fn test_ensure_failure() {
        let target = MockTarget::new("alice");
        target.script("check", 1);
        target.script("fix", 3);
        let rule = Cmd::new("check", "fix");

        let err = run(&target, &rule).unwrap_err();
        assert!(err.to_string().contains("exited with status 3"));
    }
}
