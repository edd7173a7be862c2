//! Local process transport

use super::{Exit, Output, Stream, Transport};
use crate::error::{Error, Result};
use crate::files::{Files, LocalFiles};
use crate::runtime;
use log::debug;
use std::io::{self, Write};
use std::pin::Pin;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout};

/// Runs commands as child processes of this one
#[derive(Debug, Clone)]
pub struct LocalTransport {
    user: String,
}

impl LocalTransport {
    /// Transport for the user running this process
    pub fn new() -> Result<Self> {
        let output = Command::new("id").arg("-un").output();
        let user = match output {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).trim().to_string()
            }
            _ => std::env::var("USER").map_err(|_| {
                Error::Protocol("cannot determine the current user".to_string())
            })?,
        };
        Ok(Self { user })
    }

    /// Transport that claims to be `user` without asking the system
    pub fn with_user(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

fn exit_of(status: ExitStatus) -> Exit {
    status.code().map_or(Exit::Missing, Exit::Code)
}

impl Transport for LocalTransport {
    fn address(&self) -> &str {
        "localhost"
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn exec(&self, command: &str, stdin: &[u8]) -> Result<Output> {
        debug!("local: bash -c {command:?}");
        let mut child = Command::new("bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::session(command, e))?;

        // Fed from its own thread while wait_with_output drains both pipes
        let writer = child.stdin.take().map(|mut pipe| {
            let input = stdin.to_vec();
            thread::spawn(move || match pipe.write_all(&input) {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            writer
                .join()
                .map_err(|_| Error::Protocol("stdin writer panicked".to_string()))??;
        }
        Ok(Output {
            stdout: output.stdout,
            stderr: output.stderr,
            exit: exit_of(output.status),
        })
    }

    fn stream(&self, command: &str) -> Result<Stream> {
        debug!("local: streaming bash -c {command:?}");
        let _guard = runtime::get()?.enter();
        let mut child = tokio::process::Command::new("bash")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::session(command, e))?;
        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(Error::session(command, "process pipes unavailable"));
        };
        Ok(Box::new(ProcessStream {
            _child: child,
            stdin,
            stdout,
        }))
    }

    fn files(&self) -> Result<Arc<dyn Files>> {
        Ok(Arc::new(LocalFiles))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A spawned process seen through its stdin and stdout
///
/// The process is killed when the stream is dropped.
struct ProcessStream {
    _child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl AsyncRead for ProcessStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ProcessStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stdin).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stdin).poll_shutdown(cx)
    }
}
