//! Rule defined by a caller-supplied function

use crate::context::ApplyContext;
use crate::rule::Rule;
use crate::target::Target;
use crate::types::Status;
use anyhow::{Result, bail};

type EnsureFn = dyn Fn(&dyn Target) -> Result<Status> + Send + Sync;

/// Ad-hoc rule wrapping a function of the target
///
/// The function decides everything itself: it may inspect the target, run
/// commands, or apply other rules, and returns the resulting status. It
/// is never preceded by a check, so it must not assume one ran.
///
/// ```ignore
/// let rule = Meta::new("somefile", |t| {
///     let r = t.run_check("ls -1 /tmp | grep somefile", "")?;
///     if r.success() {
///         return Ok(Status::Satisfied);
///     }
///     t.apply("file exists", &file::Exists::new("/tmp/somefile"))
/// });
/// ```
pub struct Meta {
    name: String,
    ensure: Box<EnsureFn>,
}

impl Meta {
    pub fn new<F>(name: impl Into<String>, ensure: F) -> Self
    where
        F: Fn(&dyn Target) -> Result<Status> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ensure: Box::new(ensure),
        }
    }
}

impl std::fmt::Debug for Meta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meta").field("name", &self.name).finish()
    }
}

impl Rule for Meta {
    fn describe(&self) -> String {
        self.name.clone()
    }

    /// Never satisfied, so apply always calls the function
    fn check(&self, _target: &dyn Target) -> Result<bool> {
        Ok(false)
    }

    fn ensure(&self, target: &dyn Target) -> Result<()> {
        match (self.ensure)(target)? {
            Status::Failed => bail!("{} failed", self.name),
            _ => Ok(()),
        }
    }

    fn converge(&self, target: &dyn Target, _ctx: &mut ApplyContext<'_>) -> Result<Status> {
        (self.ensure)(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use crate::context::NoReport;
    use crate::mock::MockTarget;
    use crate::rules::file::Exists;
    use crate::target::TargetExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_called_once_per_apply() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let rule = Meta::new("count", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Status::Satisfied)
        });

        let target = MockTarget::new("alice");
        let status = apply(&target, "count", &rule, &mut ApplyContext::new(&mut NoReport)).unwrap();

        assert_eq!(status, Status::Satisfied);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delegates_to_other_rule() {
        let rule = Meta::new("somefile", |t| {
            let r = t.run_check("test -e /tmp/somefile", "")?;
            if r.success() {
                return Ok(Status::Satisfied);
            }
            t.apply("file exists", &Exists::new("/tmp/somefile"))
        });

        let target = MockTarget::new("alice");
        assert_eq!(target.apply("meta", &rule).unwrap(), Status::Applied);
        assert!(target.exists("/tmp/somefile"));
        assert_eq!(target.apply("meta", &rule).unwrap(), Status::Satisfied);
    }

    #[test]
    fn test_failed_without_error() {
        let rule = Meta::new("liar", |_| Ok(Status::Failed));
        let target = MockTarget::new("alice");

        assert!(target.apply("liar", &rule).is_err());
    }
}
