//! Host entries as written in an inventory file

use crate::host::{Host, Local, Remote};
use crate::transport::{Auth, HostKeyPolicy, Transport};
use anyhow::{Context, Result, bail};
use declarative::Target;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    #[default]
    Local,
    Remote,
}

/// An authentication method; secrets are named by environment variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthConfig {
    Password {
        password_env: String,
    },
    Key {
        path: String,
        #[serde(default)]
        passphrase_env: Option<String>,
    },
    Agent,
}

fn env_secret(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("Environment variable {var} is not set"))
}

impl AuthConfig {
    /// Read the referenced secrets and build the transport auth method
    pub fn resolve(&self) -> Result<Auth> {
        Ok(match self {
            Self::Password { password_env } => Auth::Password {
                password: env_secret(password_env)?,
            },
            Self::Key {
                path,
                passphrase_env,
            } => Auth::Key {
                path: PathBuf::from(shellexpand::tilde(path).as_ref()),
                passphrase: passphrase_env.as_deref().map(env_secret).transpose()?,
            },
            Self::Agent => Auth::Agent,
        })
    }
}

/// One `[[hosts]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,

    #[serde(default)]
    pub kind: HostKind,

    /// `host[:port]`, remote only
    #[serde(default)]
    pub address: Option<String>,

    /// Login user for remote hosts; for local hosts, the user to act as
    #[serde(default)]
    pub user: Option<String>,

    /// Environment variable holding the sudo secret
    #[serde(default)]
    pub secret_env: Option<String>,

    /// Tried in order; defaults to the SSH agent
    #[serde(default)]
    pub auth: Vec<AuthConfig>,

    #[serde(default)]
    pub host_key: HostKeyPolicy,

    #[serde(default)]
    pub sftp_server: Option<String>,

    /// Seconds sudo gets to start an escalated file session
    #[serde(default)]
    pub ready_timeout_secs: Option<u64>,
}

impl HostConfig {
    fn secret(&self) -> Result<String> {
        match &self.secret_env {
            Some(var) => env_secret(var),
            None => Ok(String::new()),
        }
    }

    /// `user@address` or `local`, for listings
    pub fn describe(&self) -> String {
        match self.kind {
            HostKind::Local => match &self.user {
                Some(user) => format!("local as {user}"),
                None => "local".to_string(),
            },
            HostKind::Remote => format!(
                "{}@{}",
                self.user.as_deref().unwrap_or("?"),
                self.address.as_deref().unwrap_or("?")
            ),
        }
    }

    fn tune<T: Transport + 'static>(&self, mut host: Host<T>) -> Host<T> {
        if let Some(server) = &self.sftp_server {
            host = host.with_sftp_server(server);
        }
        if let Some(secs) = self.ready_timeout_secs {
            host = host.with_ready_timeout(Duration::from_secs(secs));
        }
        host
    }

    fn local(&self) -> Result<Local> {
        let host = Local::new(self.secret()?).context("Failed to open local host")?;
        let mut host = self.tune(host);
        if let Some(user) = &self.user {
            host = host.as_user(user);
        }
        Ok(host)
    }

    fn remote(&self) -> Result<Remote> {
        let Some(address) = &self.address else {
            bail!("Host '{}' is remote but has no address", self.name);
        };
        let Some(user) = &self.user else {
            bail!("Host '{}' is remote but has no user", self.name);
        };
        let auths = if self.auth.is_empty() {
            vec![Auth::Agent]
        } else {
            self.auth
                .iter()
                .map(AuthConfig::resolve)
                .collect::<Result<Vec<_>>>()?
        };
        let host = Remote::connect(address, user, self.secret()?, &self.host_key, &auths)
            .with_context(|| format!("Failed to connect to '{}'", self.name))?;
        Ok(self.tune(host))
    }

    /// Open the host this entry describes
    pub fn connect(&self) -> Result<Box<dyn Target>> {
        Ok(match self.kind {
            HostKind::Local => Box::new(self.local()?),
            HostKind::Remote => Box::new(self.remote()?),
        })
    }

    /// Push `content` to `path` on this host with the scp sink protocol
    ///
    /// Opens its own connection and closes it afterwards.
    pub fn put(&self, content: &[u8], path: &str, mode: u32) -> Result<()> {
        match self.kind {
            HostKind::Local => {
                let host = self.local()?;
                host.put(content, path, mode)?;
                host.close()
            }
            HostKind::Remote => {
                let host = self.remote()?;
                host.put(content, path, mode)?;
                host.close()
            }
        }
    }
}
