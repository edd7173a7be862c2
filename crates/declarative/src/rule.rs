//! Rule trait for check-then-ensure convergence
//!
//! A Rule describes a desired state. `check` tells whether it already
//! holds on a target; `ensure` brings it about.

use crate::context::ApplyContext;
use crate::target::Target;
use crate::types::Status;
use anyhow::Result;

/// Core trait for declarative rules
///
/// Rules are stateless descriptors: they own nothing of the target and
/// can be applied to any number of targets.
///
/// # Example
///
/// ```ignore
/// use declarative::{Rule, Target};
///
/// struct Motd(String);
///
/// impl Rule for Motd {
///     fn describe(&self) -> String {
///         "motd".into()
///     }
///
///     fn check(&self, target: &dyn Target) -> anyhow::Result<bool> {
///         let r = target.run_check("cat /etc/motd", "")?;
///         Ok(r.stdout == self.0)
///     }
///
///     fn ensure(&self, target: &dyn Target) -> anyhow::Result<()> {
///         let mut f = target.as_user("root").create("/etc/motd")?;
///         f.write_all(self.0.as_bytes())?;
///         Ok(())
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Short human-readable description, used as the default report name
    fn describe(&self) -> String;

    /// Report whether the desired state already holds
    ///
    /// Must not change the target.
    fn check(&self, target: &dyn Target) -> Result<bool>;

    /// Bring the target to the desired state
    fn ensure(&self, target: &dyn Target) -> Result<()>;

    /// Drive this rule to a terminal status
    ///
    /// The default is the plain check-then-ensure state machine. Composite
    /// and function rules override it; they need the context to report
    /// nested results or to return their own status.
    fn converge(&self, target: &dyn Target, ctx: &mut ApplyContext<'_>) -> Result<Status> {
        let _ = ctx;
        if self.check(target)? {
            return Ok(Status::Satisfied);
        }
        self.ensure(target)?;
        Ok(Status::Applied)
    }
}

/// A boxed rule for type-erased storage
pub type BoxedRule = Box<dyn Rule>;

impl<R: Rule + ?Sized> Rule for Box<R> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn check(&self, target: &dyn Target) -> Result<bool> {
        (**self).check(target)
    }

    fn ensure(&self, target: &dyn Target) -> Result<()> {
        (**self).ensure(target)
    }

    fn converge(&self, target: &dyn Target, ctx: &mut ApplyContext<'_>) -> Result<Status> {
        (**self).converge(target, ctx)
    }
}
