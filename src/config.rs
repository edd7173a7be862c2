use anyhow::{Context, Result, bail};
use declarative::rules::apt::{Package, PackageState};
use declarative::rules::file::{Absent, Exists};
use declarative::rules::{Cmd, Multi};
use declarative::{BoxedRule, FailurePolicy, Rule};
use hostkit::HostConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

// ============================================================================
// Inventory
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct InventoryFile {
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl InventoryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid inventory {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let inventory: Self = toml::from_str(content)?;
        for (i, host) in inventory.hosts.iter().enumerate() {
            if inventory.hosts[..i].iter().any(|h| h.name == host.name) {
                bail!("Duplicate host name '{}'", host.name);
            }
        }
        Ok(inventory)
    }

    /// Hosts to act on: the named one, or all of them in file order
    pub fn select(&self, name: Option<&str>) -> Result<Vec<&HostConfig>> {
        match name {
            Some(name) => match self.hosts.iter().find(|h| h.name == name) {
                Some(host) => Ok(vec![host]),
                None => bail!("No host named '{name}' in inventory"),
            },
            None if self.hosts.is_empty() => bail!("Inventory has no hosts"),
            None => Ok(self.hosts.iter().collect()),
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

fn default_true() -> bool {
    true
}

fn always_false() -> String {
    "false".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RulesFile {
    /// Stop at the first failed rule
    #[serde(default = "default_true")]
    pub fail_fast: bool,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct RuleEntry {
    /// Name in reports; defaults to the rule's description
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub spec: RuleSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleSpec {
    Cmd {
        /// Omitted check means the ensure command always runs
        #[serde(default = "always_false")]
        check: String,
        ensure: String,
    },
    Exists {
        path: String,
    },
    Absent {
        path: String,
    },
    Package {
        package: String,
        #[serde(default)]
        state: PackageState,
    },
}

impl RuleSpec {
    fn build(&self) -> BoxedRule {
        match self {
            Self::Cmd { check, ensure } => Box::new(Cmd::new(check, ensure)),
            Self::Exists { path } => Box::new(Exists::new(path)),
            Self::Absent { path } => Box::new(Absent::new(path)),
            Self::Package { package, state } => Box::new(Package {
                name: package.clone(),
                state: *state,
            }),
        }
    }
}

impl RulesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid rules file {}", path.display()))
    }

    /// Build the composite rule for every entry, in file order
    pub fn to_rule(&self) -> Multi {
        let policy = if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Continue
        };
        let mut multi = Multi::with_policy(policy);
        for entry in &self.rules {
            let rule = entry.spec.build();
            let name = entry.name.clone().unwrap_or_else(|| rule.describe());
            multi.add_named(name, rule);
        }
        multi
    }
}
