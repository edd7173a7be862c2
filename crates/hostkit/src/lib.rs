//! # Hostkit
//!
//! Local and SSH hosts implementing [`declarative::Target`].
//!
//! A [`Host`] owns one [`Transport`]: a local process spawner or an
//! authenticated SSH session. Commands for a user other than the one that
//! logged in run through `sudo -S` with the host's secret ([`sudo`]). File
//! operations go through one cached session per acting user: the plain
//! filesystem or the SSH `sftp` subsystem for the login user, and an
//! `sftp-server` started through sudo for anyone else ([`sftp`]). [`scp`]
//! pushes whole files with the scp sink protocol.
//!
//! The SSH and SFTP clients (russh and russh-sftp) are async. The API here
//! stays blocking and drives them on one shared runtime.
//!
//! ```ignore
//! use declarative::{Target, TargetExt};
//! use declarative::rules::file::Exists;
//! use hostkit::{Auth, HostKeyPolicy, Remote};
//!
//! let web = Remote::connect("10.0.0.5:22", "deploy", secret, &HostKeyPolicy::Insecure, &[Auth::Agent])?;
//! let root = web.as_user("root");
//! root.apply("marker", &Exists::new("/etc/provisioned"))?;
//! web.close()?;
//! ```

pub mod config;
pub mod error;
pub mod files;
pub mod host;
mod runtime;
pub mod scp;
pub mod scrub;
pub mod sftp;
pub mod sudo;
pub mod transport;

pub use config::{AuthConfig, HostConfig, HostKind};
pub use error::{Error, Result};
pub use files::Files;
pub use host::{DEFAULT_SFTP_SERVER, Host, Local, Remote};
pub use scrub::scrub;
pub use transport::{Auth, HostKeyPolicy, LocalTransport, SshTransport, Stream, Transport};
