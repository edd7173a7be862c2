//! File sessions over SFTP
//!
//! [`SftpFiles`] runs a russh-sftp client over any duplex byte stream: the
//! SSH `sftp` subsystem for the login user, or an `sftp-server` started
//! through sudo for anyone else. The blocking [`Files`] calls are driven on
//! the crate's shared runtime.
//!
//! An escalated session is only handed to the client once the bootstrap
//! has printed [`READY_MARKER`]. Until then sudo may still be waiting for a
//! password line, which an SFTP handshake would never supply.

#[cfg(test)]
pub(crate) mod memory;

use crate::error::{Error, Result};
use crate::files::Files;
use crate::runtime;
use crate::transport::Stream;
use log::debug;
use russh_sftp::client::SftpSession;
use russh_sftp::client::fs::File;
use russh_sftp::protocol::OpenFlags;
use std::borrow::Cow;
use std::io::{self, Read, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::runtime::Runtime;

/// Line the escalated bootstrap prints once sudo has let it through
pub const READY_MARKER: &str = "converge-sftp-ready";

/// How long an escalated bootstrap may take to print [`READY_MARKER`]
pub const READY_TIMEOUT: Duration = Duration::from_secs(20);

/// Longest bootstrap line read while waiting for the marker
const MAX_LINE: usize = 4096;

/// Shell command announcing readiness, then becoming `server`
pub fn bootstrap_command(server: &str) -> String {
    format!(
        "echo {READY_MARKER} && exec {}",
        shell_escape::unix::escape(Cow::Borrowed(server))
    )
}

/// Read one line without its newline, never reading past it
pub(crate) async fn read_line<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<String> {
    let mut line = Vec::new();
    loop {
        let byte = stream.read_u8().await?;
        if byte == b'\n' {
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        if line.len() == MAX_LINE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bootstrap line too long",
            ));
        }
        line.push(byte);
    }
}

/// Send the secret line and wait for the readiness marker
async fn unlock<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S, secret: &str) -> Result<()> {
    stream.write_all(format!("{secret}\n").as_bytes()).await?;
    stream.flush().await?;
    let line = read_line(stream).await?;
    if line == READY_MARKER {
        Ok(())
    } else {
        Err(Error::Protocol(format!("unexpected bootstrap output {line:?}")))
    }
}

/// Open a file session on a stream started with [`bootstrap_command`]
/// under sudo
///
/// Fails with [`Error::Escalation`] when the marker does not show up
/// within `timeout`, which is what a wrong secret looks like.
pub fn escalate(
    mut stream: Stream,
    user: &str,
    secret: &str,
    timeout: Duration,
) -> Result<SftpFiles> {
    let escalation = |message: String| Error::Escalation {
        user: user.to_string(),
        message,
    };
    let unlocked = runtime::get()?.block_on(async {
        tokio::time::timeout(timeout, unlock(&mut stream, secret)).await
    });
    match unlocked {
        Ok(Ok(())) => SftpFiles::connect(stream),
        Ok(Err(e)) => Err(escalation(e.to_string())),
        Err(_) => Err(escalation(format!(
            "sudo did not start the sftp server within {}s, check the secret",
            timeout.as_secs_f32()
        ))),
    }
}

/// A client session, shared by every file it opens
pub struct SftpFiles {
    session: Option<SftpSession>,
    runtime: &'static Runtime,
    closed: AtomicBool,
}

impl SftpFiles {
    /// Run the SFTP handshake over `stream`
    pub fn connect<S>(stream: S) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let runtime = runtime::get()?;
        let session = runtime
            .block_on(SftpSession::new(stream))
            .map_err(|e| Error::Protocol(format!("sftp handshake failed: {e}")))?;
        debug!("sftp session established");
        Ok(Self {
            session: Some(session),
            runtime,
            closed: AtomicBool::new(false),
        })
    }

    fn session(&self) -> Result<&SftpSession> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        self.session.as_ref().ok_or(Error::Closed)
    }

    fn open_with(
        &self,
        operation: &'static str,
        path: &str,
        flags: OpenFlags,
    ) -> Result<BlockingFile> {
        let session = self.session()?;
        let file = self
            .runtime
            .block_on(session.open_with_flags(path, flags))
            .map_err(|source| Error::Sftp {
                operation,
                path: path.to_string(),
                source,
            })?;
        Ok(BlockingFile {
            file: Some(file),
            runtime: self.runtime,
        })
    }
}

impl Files for SftpFiles {
    fn mkdir(&self, path: &str) -> Result<()> {
        let session = self.session()?;
        self.runtime
            .block_on(session.create_dir(path))
            .map_err(|source| Error::Sftp {
                operation: "mkdir",
                path: path.to_string(),
                source,
            })
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let flags = OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE;
        Ok(Box::new(self.open_with("create", path, flags)?))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.open_with("open", path, OpenFlags::READ)?))
    }

    fn append(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let flags = OpenFlags::CREATE | OpenFlags::APPEND | OpenFlags::WRITE;
        let mut file = self.open_with("append", path, flags)?;
        file.seek_to_end()?;
        Ok(Box::new(file))
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(session) = &self.session {
            self.runtime
                .block_on(session.close())
                .map_err(|e| Error::Protocol(format!("closing sftp session: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for SftpFiles {
    fn drop(&mut self) {
        // The session's background task belongs to the runtime
        let _guard = self.runtime.enter();
        drop(self.session.take());
    }
}

/// An open remote file, read or written from blocking code
struct BlockingFile {
    file: Option<File>,
    runtime: &'static Runtime,
}

impl BlockingFile {
    fn file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "file closed"))
    }

    /// Move the write offset to the current end of the file
    fn seek_to_end(&mut self) -> io::Result<()> {
        let runtime = self.runtime;
        let file = self.file()?;
        runtime.block_on(async {
            let size = file
                .metadata()
                .await
                .map_err(|e| io::Error::other(e.to_string()))?
                .size
                .unwrap_or(0);
            file.seek(SeekFrom::Start(size)).await.map(|_| ())
        })
    }
}

impl Read for BlockingFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let runtime = self.runtime;
        let file = self.file()?;
        runtime.block_on(file.read(buf))
    }
}

impl Write for BlockingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let runtime = self.runtime;
        let file = self.file()?;
        runtime.block_on(file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let runtime = self.runtime;
        let file = self.file()?;
        runtime.block_on(file.flush())
    }
}

impl Drop for BlockingFile {
    fn drop(&mut self) {
        let Some(mut file) = self.file.take() else {
            return;
        };
        if let Err(e) = self.runtime.block_on(file.shutdown()) {
            debug!("closing remote file: {e}");
        }
        let _guard = self.runtime.enter();
        drop(file);
    }
}
