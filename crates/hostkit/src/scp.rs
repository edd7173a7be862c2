//! Push-only scp sink protocol
//!
//! Drives a remote `scp -t` directly: one `C` header, the content, and a
//! NUL. The sink's per-step acknowledgements are not awaited while
//! writing. They are only checked after the transfer, so a large file
//! that fails part way is still written out in full before the error
//! shows up.

use crate::error::{Error, Result};
use crate::transport::Transport;
use log::debug;
use std::borrow::Cow;
use std::path::Path;

/// Remote receiver command
pub const SCP_SINK: &str = "/usr/bin/scp -tr";

/// The `C` header line announcing one file
pub fn header(mode: u32, len: usize, path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map_or(Cow::Borrowed(path), |n| n.to_string_lossy());
    format!("C{:04o} {} {}\n", mode & 0o7777, len, name)
}

/// Find a warning (`0x01`) or error (`0x02`) ack and return its message
fn rejection(acks: &[u8]) -> Option<String> {
    let at = acks.iter().position(|&b| b == 1 || b == 2)?;
    let rest = &acks[at + 1..];
    let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    Some(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Write `content` to `path` with permission bits `mode`
///
/// Runs as the transport's connection user.
pub fn push(transport: &dyn Transport, content: &[u8], path: &str, mode: u32) -> Result<()> {
    let command = format!(
        "{SCP_SINK} {}",
        shell_escape::unix::escape(Cow::Borrowed(path))
    );
    debug!(
        "scp {} bytes to {}:{path} (mode {mode:04o})",
        content.len(),
        transport.address()
    );

    let mut payload = header(mode, content.len(), path).into_bytes();
    payload.extend_from_slice(content);
    payload.push(0);
    let output = transport.exec(&command, &payload)?;

    if !output.exit.success() {
        return Err(Error::Transfer {
            path: path.to_string(),
            output: output.combined(),
        });
    }
    if let Some(message) = rejection(&output.stdout) {
        return Err(Error::Transfer {
            path: path.to_string(),
            output: message,
        });
    }
    Ok(())
}
