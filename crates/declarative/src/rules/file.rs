//! File presence rules

use super::quote;
use crate::rule::Rule;
use crate::target::Target;
use anyhow::{Context, Result, bail};
use std::io::Write;

/// Ensure a path exists, creating an empty file if it does not
#[derive(Debug, Clone)]
pub struct Exists {
    pub path: String,
}

impl Exists {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Rule for Exists {
    fn describe(&self) -> String {
        format!("file exists: {}", self.path)
    }

    fn check(&self, target: &dyn Target) -> Result<bool> {
        let response = target.run_check(&format!("test -e {}", quote(&self.path)), "")?;
        Ok(response.success())
    }

    fn ensure(&self, target: &dyn Target) -> Result<()> {
        let mut file = target
            .create(&self.path)
            .with_context(|| format!("Failed to create {}", self.path))?;
        file.flush()?;
        Ok(())
    }
}

/// Ensure nothing exists at a path
#[derive(Debug, Clone)]
pub struct Absent {
    pub path: String,
}

impl Absent {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Rule for Absent {
    fn describe(&self) -> String {
        format!("file absent: {}", self.path)
    }

    fn check(&self, target: &dyn Target) -> Result<bool> {
        let response = target.run_check(&format!("test -e {}", quote(&self.path)), "")?;
        Ok(!response.success())
    }

    fn ensure(&self, target: &dyn Target) -> Result<()> {
        let response = target.run(&format!("rm -f {}", quote(&self.path)), "")?;
        if !response.success() {
            bail!("Failed to remove {}: {}", self.path, response.stderr);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTarget;
    use crate::target::TargetExt;
    use crate::types::Status;

    #[test]
    fn test_exists_creates_empty_file() {
        let target = MockTarget::new("alice");
        let rule = Exists::new("/tmp/hello");

        assert_eq!(target.apply("exists", &rule).unwrap(), Status::Applied);
        assert_eq!(target.file("/tmp/hello"), Some(Vec::new()));
        assert_eq!(target.apply("exists", &rule).unwrap(), Status::Satisfied);
    }

    #[test]
    fn test_absent_removes() {
        let target = MockTarget::new("alice");
        target.create("/tmp/old").unwrap();
        let rule = Absent::new("/tmp/old");

        assert_eq!(target.apply("absent", &rule).unwrap(), Status::Applied);
        assert!(!target.exists("/tmp/old"));
        assert_eq!(target.apply("absent", &rule).unwrap(), Status::Satisfied);
    }

    #[test]
    fn test_path_is_quoted() {
        let target = MockTarget::new("alice");
        let rule = Exists::new("/tmp/with space");
        rule.check(&target).unwrap();

        assert_eq!(target.commands()[0].1, "test -e '/tmp/with space'");
    }
}
