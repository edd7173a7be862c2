//! SSH transport built on russh
//!
//! Every command gets its own session channel. Stdin is fed while the
//! channel's messages are drained, and the exit status is taken from the
//! server's `exit-status` message: a channel that closes without one, or
//! reports a signal instead, ends as [`Exit::Missing`].

use super::{Exit, Output, Stream, Transport};
use crate::error::{Error, Result};
use crate::files::Files;
use crate::runtime;
use crate::sftp::SftpFiles;
use log::{debug, warn};
use russh::client::{self, Handle};
use russh::keys::agent::client::AgentClient;
use russh::keys::ssh_key::{Fingerprint, HashAlg, PrivateKey, PublicKey};
use russh::keys::{PrivateKeyWithHashAlg, check_known_hosts_path, decode_secret_key, load_secret_key};
use russh::{ChannelMsg, Disconnect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpStream;

/// Environment variable pointing at the running agent's socket
pub const AGENT_SOCKET_ENV: &str = "SSH_AUTH_SOCK";

/// Extended data stream number carrying stderr
const STDERR: u32 = 1;

/// One way of proving the connection identity
#[derive(Clone)]
pub enum Auth {
    Password {
        password: String,
    },
    /// Private key on disk
    Key {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// Private key held in memory, OpenSSH or PEM encoded
    KeyData {
        private_key: String,
        passphrase: Option<String>,
    },
    /// Every identity the running agent offers
    Agent,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password { .. } => f.write_str("Password"),
            Auth::Key { path, .. } => write!(f, "Key({})", path.display()),
            Auth::KeyData { .. } => f.write_str("KeyData"),
            Auth::Agent => f.write_str("Agent"),
        }
    }
}

/// How the server's host key is verified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Accept any key
    #[default]
    Insecure,
    /// Key's SHA-256 fingerprint, as hex or in `SHA256:<base64>` form
    Fingerprint { sha256: String },
    /// Key must be listed in an OpenSSH known_hosts file
    KnownHosts { path: String },
}

/// Client handler checking the host key against a [`HostKeyPolicy`]
struct Verifier {
    address: String,
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl Verifier {
    fn verify(&self, key: &PublicKey) -> Result<()> {
        let mismatch = |message: String| Error::HostKey {
            address: self.address.clone(),
            message,
        };

        match &self.policy {
            HostKeyPolicy::Insecure => Ok(()),
            HostKeyPolicy::Fingerprint { sha256 } => {
                let actual = key.fingerprint(HashAlg::Sha256);
                if fingerprint_matches(sha256, &actual) {
                    Ok(())
                } else {
                    Err(mismatch(format!("expected {sha256}, got {actual}")))
                }
            }
            HostKeyPolicy::KnownHosts { path } => {
                let file = shellexpand::tilde(path);
                match check_known_hosts_path(&self.host, self.port, key, file.as_ref()) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(mismatch(format!("host not listed in {path}"))),
                    Err(e) => Err(mismatch(format!("{path}: {e}"))),
                }
            }
        }
    }
}

impl client::Handler for Verifier {
    type Error = Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool> {
        self.verify(server_public_key)?;
        Ok(true)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Lowercase hex without the `:` separators some tools print
fn normalize_hex(digest: &str) -> String {
    digest.trim().to_ascii_lowercase().replace(':', "")
}

fn fingerprint_matches(expected: &str, actual: &Fingerprint) -> bool {
    expected.trim() == actual.to_string() || normalize_hex(expected) == hex(actual.as_bytes())
}

/// An authenticated SSH connection
pub struct SshTransport {
    session: Handle<Verifier>,
    address: String,
    user: String,
}

impl SshTransport {
    /// Dial `address`, verify the host key and authenticate as `user`
    ///
    /// `auths` are tried in order until one is accepted.
    pub fn connect(
        address: &str,
        user: &str,
        host_key: &HostKeyPolicy,
        auths: &[Auth],
    ) -> Result<Self> {
        let session = runtime::get()?.block_on(open(address, user, host_key, auths))?;
        debug!("connected to {user}@{address}");
        Ok(Self {
            session,
            address: address.to_string(),
            user: user.to_string(),
        })
    }

    async fn run(&self, command: &str, stdin: &[u8]) -> Result<Output> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(|e| Error::session(command, e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::session(command, e))?;

        let (mut reader, writer) = channel.split();
        let feed = async {
            writer.data(stdin).await?;
            writer.eof().await
        };
        let drain = async {
            let mut collected = Collected::default();
            while let Some(msg) = reader.wait().await {
                collected.push(msg);
            }
            collected
        };
        let (fed, collected) = tokio::join!(feed, drain);

        // A command may exit without reading its input
        if let Err(e) = fed {
            debug!("{}@{}: stdin for {command:?} not delivered: {e}", self.user, self.address);
        }
        Ok(collected.into_output())
    }
}

/// Split `host:port`, defaulting to port 22
fn split_address(address: &str) -> (&str, u16) {
    match address.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, port),
            Err(_) => (address, 22),
        },
        None => (address, 22),
    }
}

async fn open(
    address: &str,
    user: &str,
    host_key: &HostKeyPolicy,
    auths: &[Auth],
) -> Result<Handle<Verifier>> {
    let (host, port) = split_address(address);
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(|source| Error::Connect {
            address: address.to_string(),
            source,
        })?;

    let verifier = Verifier {
        address: address.to_string(),
        host: host.to_string(),
        port,
        policy: host_key.clone(),
    };
    let config = Arc::new(client::Config::default());
    let mut session = client::connect_stream(config, tcp, verifier).await?;

    for auth in auths {
        debug!("{user}@{address}: trying {auth:?}");
        if authenticate(&mut session, user, auth).await? {
            return Ok(session);
        }
    }
    Err(Error::Auth {
        user: user.to_string(),
        address: address.to_string(),
    })
}

async fn authenticate(session: &mut Handle<Verifier>, user: &str, auth: &Auth) -> Result<bool> {
    let key = match auth {
        Auth::Password { password } => {
            return Ok(session.authenticate_password(user, password).await?.success());
        }
        Auth::Agent => return Ok(agent_auth(session, user).await),
        Auth::Key { path, passphrase } => load_secret_key(path, passphrase.as_deref()),
        Auth::KeyData {
            private_key,
            passphrase,
        } => decode_secret_key(private_key, passphrase.as_deref()),
    };
    match key {
        Ok(key) => key_auth(session, user, key).await,
        Err(e) => {
            warn!("skipping {auth:?}: {e}");
            Ok(false)
        }
    }
}

async fn key_auth(session: &mut Handle<Verifier>, user: &str, key: PrivateKey) -> Result<bool> {
    let hash = session.best_supported_rsa_hash().await?.flatten();
    let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash);
    Ok(session.authenticate_publickey(user, key).await?.success())
}

/// Try every agent identity; an absent or unreachable agent offers none
async fn agent_auth(session: &mut Handle<Verifier>, user: &str) -> bool {
    if std::env::var_os(AGENT_SOCKET_ENV).is_none() {
        debug!("{AGENT_SOCKET_ENV} not set, agent offers no keys");
        return false;
    }
    let mut agent = match AgentClient::connect_env().await {
        Ok(agent) => agent,
        Err(e) => {
            warn!("ssh agent unreachable: {e}");
            return false;
        }
    };
    let identities = match agent.request_identities().await {
        Ok(identities) => identities,
        Err(e) => {
            warn!("ssh agent listed no identities: {e}");
            return false;
        }
    };
    let hash = session.best_supported_rsa_hash().await.ok().flatten().flatten();
    for key in identities {
        match session
            .authenticate_publickey_with(user, key, hash, &mut agent)
            .await
        {
            Ok(result) if result.success() => return true,
            Ok(_) => {}
            Err(e) => debug!("agent key refused: {e}"),
        }
    }
    false
}

/// What one exec channel produced, gathered message by message
#[derive(Debug, Default)]
struct Collected {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    status: Option<u32>,
    signal: Option<String>,
}

impl Collected {
    fn push(&mut self, msg: ChannelMsg) {
        match msg {
            ChannelMsg::Data { data } => self.stdout.extend_from_slice(&data),
            ChannelMsg::ExtendedData { data, ext } if ext == STDERR => {
                self.stderr.extend_from_slice(&data);
            }
            ChannelMsg::ExitStatus { exit_status } => self.status = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                self.signal = Some(format!("{signal_name:?}"));
            }
            _ => {}
        }
    }

    fn into_output(self) -> Output {
        if let Some(signal) = &self.signal {
            debug!("remote process ended by signal {signal}");
        }
        Output {
            exit: exit_of(self.status, self.signal.is_some()),
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Only a reported status without a signal is an exit code
fn exit_of(status: Option<u32>, signalled: bool) -> Exit {
    match status {
        Some(code) if !signalled => Exit::Code(code as i32),
        _ => Exit::Missing,
    }
}

impl Transport for SshTransport {
    fn address(&self) -> &str {
        &self.address
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn exec(&self, command: &str, stdin: &[u8]) -> Result<Output> {
        debug!("{}@{}: exec {command:?}", self.user, self.address);
        runtime::get()?.block_on(self.run(command, stdin))
    }

    fn stream(&self, command: &str) -> Result<Stream> {
        debug!("{}@{}: stream {command:?}", self.user, self.address);
        runtime::get()?.block_on(async {
            let channel = self
                .session
                .channel_open_session()
                .await
                .map_err(|e| Error::session(command, e))?;
            channel
                .exec(true, command)
                .await
                .map_err(|e| Error::session(command, e))?;
            Ok(Box::new(channel.into_stream()) as Stream)
        })
    }

    fn files(&self) -> Result<Arc<dyn Files>> {
        let stream = runtime::get()?.block_on(async {
            let channel = self.session.channel_open_session().await?;
            channel.request_subsystem(true, "sftp").await?;
            Ok::<_, Error>(channel.into_stream())
        })?;
        Ok(Arc::new(SftpFiles::connect(stream)?))
    }

    fn close(&self) -> Result<()> {
        runtime::get()?.block_on(self.session.disconnect(
            Disconnect::ByApplication,
            "closing",
            "en",
        ))?;
        Ok(())
    }
}
