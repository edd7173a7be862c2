//! The [`Target`] implementation shared by local and remote machines

use crate::error::Result;
use crate::files::Files;
use crate::scp;
use crate::sftp::{self, READY_TIMEOUT};
use crate::sudo;
use crate::transport::{Auth, HostKeyPolicy, LocalTransport, SshTransport, Transport};
use anyhow::Context;
use declarative::{Response, Target};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Where `sftp-server` lives on Debian-family systems
pub const DEFAULT_SFTP_SERVER: &str = "/usr/lib/openssh/sftp-server";

struct Shared<T> {
    transport: T,
    secret: String,
    /// One file session per acting user
    files: Mutex<HashMap<String, Arc<dyn Files>>>,
}

/// A machine reached through transport `T`
///
/// Clones and [`Host::as_user`] results share the connection and the file
/// session cache; only the acting user differs.
pub struct Host<T> {
    shared: Arc<Shared<T>>,
    active: String,
    sftp_server: String,
    ready_timeout: Duration,
}

/// This machine
pub type Local = Host<LocalTransport>;

/// A machine reached over SSH
pub type Remote = Host<SshTransport>;

impl<T> Clone for Host<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            active: self.active.clone(),
            sftp_server: self.sftp_server.clone(),
            ready_timeout: self.ready_timeout,
        }
    }
}

impl Local {
    /// The local machine, acting as the current user
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        Ok(Self::from_transport(LocalTransport::new()?, secret))
    }
}

impl Remote {
    /// Connect and authenticate to `address` as `user`
    pub fn connect(
        address: &str,
        user: &str,
        secret: impl Into<String>,
        host_key: &HostKeyPolicy,
        auths: &[Auth],
    ) -> Result<Self> {
        let transport = SshTransport::connect(address, user, host_key, auths)?;
        Ok(Self::from_transport(transport, secret))
    }
}

impl<T: Transport + 'static> Host<T> {
    /// Wrap an open transport; `secret` is the connection user's sudo password
    pub fn from_transport(transport: T, secret: impl Into<String>) -> Self {
        let active = transport.user().to_string();
        Self {
            shared: Arc::new(Shared {
                transport,
                secret: secret.into(),
                files: Mutex::new(HashMap::new()),
            }),
            active,
            sftp_server: DEFAULT_SFTP_SERVER.to_string(),
            ready_timeout: READY_TIMEOUT,
        }
    }

    /// Use a different `sftp-server` binary for escalated file sessions
    pub fn with_sftp_server(mut self, path: impl Into<String>) -> Self {
        self.sftp_server = path.into();
        self
    }

    /// How long sudo gets to start an escalated file session
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// The user the connection authenticated as
    pub fn connection_user(&self) -> &str {
        self.shared.transport.user()
    }

    /// A host sharing this connection, acting as `user`
    ///
    /// An empty user or `-` means `root`. The receiver is not changed.
    pub fn as_user(&self, user: &str) -> Self {
        Self {
            active: sudo::resolve_user(user).to_string(),
            ..self.clone()
        }
    }

    /// Push `content` to `path` with the scp sink protocol
    ///
    /// Always writes as the connection user.
    pub fn put(&self, content: &[u8], path: &str, mode: u32) -> Result<()> {
        scp::push(&self.shared.transport, content, path, mode)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn Files>>> {
        match self.shared.files.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// File session for the acting user, opened on first use
    fn files(&self) -> Result<Arc<dyn Files>> {
        let mut cache = self.cache();
        if let Some(files) = cache.get(&self.active) {
            return Ok(Arc::clone(files));
        }

        let transport = &self.shared.transport;
        let files: Arc<dyn Files> = if self.active == self.connection_user() {
            transport.files()?
        } else {
            debug!("{self}: opening sftp session as {}", self.active);
            let bootstrap = sftp::bootstrap_command(&self.sftp_server);
            let stream = transport.stream(&sudo::wrap(&bootstrap, &self.active))?;
            Arc::new(sftp::escalate(
                stream,
                &self.active,
                &self.shared.secret,
                self.ready_timeout,
            )?)
        };
        cache.insert(self.active.clone(), Arc::clone(&files));
        Ok(files)
    }
}

impl<T: Transport + 'static> fmt::Display for Host<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}",
            self.connection_user(),
            self.shared.transport.address()
        )
    }
}

impl<T: Transport + 'static> Target for Host<T> {
    fn user(&self) -> &str {
        &self.active
    }

    fn run(&self, command: &str, stdin: &str) -> anyhow::Result<Response> {
        debug!("{self} [{}]: {command}", self.active);
        let response = sudo::run(
            &self.shared.transport,
            command,
            stdin,
            &self.active,
            &self.shared.secret,
        )
        .with_context(|| format!("Failed to run `{command}` on {self}"))?;
        Ok(response)
    }

    fn mkdir(&self, path: &str) -> anyhow::Result<()> {
        self.files()
            .and_then(|files| files.mkdir(path))
            .with_context(|| format!("Failed to create directory {path} on {self}"))
    }

    fn create(&self, path: &str) -> anyhow::Result<Box<dyn Write + Send>> {
        self.files()
            .and_then(|files| files.create(path))
            .with_context(|| format!("Failed to create {path} on {self}"))
    }

    fn open(&self, path: &str) -> anyhow::Result<Box<dyn Read + Send>> {
        self.files()
            .and_then(|files| files.open(path))
            .with_context(|| format!("Failed to open {path} on {self}"))
    }

    fn append(&self, path: &str) -> anyhow::Result<Box<dyn Write + Send>> {
        self.files()
            .and_then(|files| files.append(path))
            .with_context(|| format!("Failed to open {path} for append on {self}"))
    }

    fn as_user(&self, user: &str) -> Box<dyn Target> {
        Box::new(Self::as_user(self, user))
    }

    fn close(&self) -> anyhow::Result<()> {
        let sessions: Vec<_> = self.cache().drain().collect();
        let mut first = None;
        for (user, files) in sessions {
            if let Err(e) = files.close() {
                warn!("{self}: closing file session for {user}: {e}");
                first.get_or_insert(e);
            }
        }
        self.shared.transport.close()?;
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
