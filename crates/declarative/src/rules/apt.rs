//! Debian package rule

use super::quote;
use crate::rule::Rule;
use crate::target::Target;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Desired package state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    #[default]
    Installed,
    Absent,
}

/// Install or remove an apt package
///
/// Checking runs as the active user; installing and removing run as root.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub state: PackageState,
}

impl Package {
    pub fn installed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: PackageState::Installed,
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: PackageState::Absent,
        }
    }

    fn is_installed(&self, target: &dyn Target) -> Result<bool> {
        let command = format!("dpkg-query -W -f='${{Status}}' {}", quote(&self.name));
        let response = target.run_check(&command, "")?;
        Ok(response.success() && response.stdout.ends_with("install ok installed"))
    }
}

impl Rule for Package {
    fn describe(&self) -> String {
        let verb = match self.state {
            PackageState::Installed => "installed",
            PackageState::Absent => "absent",
        };
        format!("apt package {}: {verb}", self.name)
    }

    fn check(&self, target: &dyn Target) -> Result<bool> {
        let installed = self.is_installed(target)?;
        Ok(installed == (self.state == PackageState::Installed))
    }

    fn ensure(&self, target: &dyn Target) -> Result<()> {
        let action = match self.state {
            PackageState::Installed => "install",
            PackageState::Absent => "remove",
        };
        let command = format!(
            "DEBIAN_FRONTEND=noninteractive apt-get {action} -y -q {}",
            quote(&self.name)
        );

        let response = target.as_user("root").run(&command, "")?;
        if !response.success() {
            bail!(
                "apt-get {action} {} exited with status {}: {}",
                self.name,
                response.exit_status,
                response.stderr
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTarget;

    #[test]
    fn test_ensure_runs_as_root() {
        let target = MockTarget::new("alice");
        Package::installed("curl").ensure(&target).unwrap();

        let commands = target.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].0, "root");
        assert_eq!(
            commands[0].1,
            "DEBIAN_FRONTEND=noninteractive apt-get install -y -q curl"
        );
    }

    #[test]
    fn test_absent_when_query_fails() {
        let target = MockTarget::new("alice");
        target.script("dpkg-query -W -f='${Status}' nope", 1);

        assert!(!Package::installed("nope").check(&target).unwrap());
        assert!(Package::absent("nope").check(&target).unwrap());
    }
}
