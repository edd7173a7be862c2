//! Connections to a machine
//!
//! A [`Transport`] owns one authenticated connection. Commands either run
//! to completion through [`Transport::exec`], or stay open as a duplex
//! [`Stream`] for protocols spoken over a command's stdin and stdout. The
//! local and SSH variants only differ in how a command comes to be: a
//! spawned process or an SSH exec channel.

pub mod local;
pub mod ssh;

pub use local::LocalTransport;
pub use ssh::{Auth, HostKeyPolicy, SshTransport};

use crate::error::Result;
use crate::files::Files;
use declarative::EXIT_MISSING;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The process reported this exit code
    Code(i32),
    /// The process ended without reporting a code
    Missing,
}

impl Exit {
    /// Exit code, with [`EXIT_MISSING`] standing in for a missing one
    pub fn code(self) -> i32 {
        match self {
            Exit::Code(code) => code,
            Exit::Missing => EXIT_MISSING,
        }
    }

    pub fn success(self) -> bool {
        self == Exit::Code(0)
    }
}

/// Everything a finished command produced
#[derive(Debug, Clone)]
pub struct Output {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit: Exit,
}

impl Output {
    /// Stdout followed by stderr, lossily decoded
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

/// A running command's stdout (read side) and stdin (write side)
pub trait Duplex: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Duplex for T {}

/// An open command; dropping it ends the command
pub type Stream = Box<dyn Duplex>;

/// One authenticated connection to a machine
pub trait Transport: Send + Sync {
    /// Address of the machine, for diagnostics
    fn address(&self) -> &str;

    /// The user the connection authenticated as
    fn user(&self) -> &str;

    /// Run `command` through a shell to completion
    ///
    /// `stdin` is fed while stdout and stderr are drained, so a command
    /// producing more output than a pipe or window holds cannot stall.
    /// Fails with [`Error::Session`](crate::Error::Session) when the
    /// command could not be started at all.
    fn exec(&self, command: &str, stdin: &[u8]) -> Result<Output>;

    /// Start `command` and keep it open as a [`Stream`]
    ///
    /// Its stderr is discarded.
    fn stream(&self, command: &str) -> Result<Stream>;

    /// File operations as the connection user, without escalation
    fn files(&self) -> Result<Arc<dyn Files>>;

    /// Close the connection
    fn close(&self) -> Result<()>;
}
