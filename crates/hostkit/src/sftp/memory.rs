//! An SFTP server backed by a map, for exercising [`SftpFiles`](super::SftpFiles)

use super::{READY_MARKER, read_line};
use russh_sftp::protocol::{
    Attrs, Data, FileAttributes, Handle, OpenFlags, Status, StatusCode, Version,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Default)]
pub struct FsState {
    pub files: HashMap<String, Vec<u8>>,
    pub dirs: HashSet<String>,
    /// Line received before the server started, when escalated
    pub preamble: Option<String>,
}

pub type SharedFs = Arc<Mutex<FsState>>;

struct MemoryServer {
    fs: SharedFs,
    handles: HashMap<String, String>,
    next: u32,
}

fn ok(id: u32) -> Status {
    Status {
        id,
        status_code: StatusCode::Ok,
        error_message: "Ok".to_string(),
        language_tag: "en-US".to_string(),
    }
}

impl MemoryServer {
    fn path(&self, handle: &str) -> Result<String, StatusCode> {
        self.handles.get(handle).cloned().ok_or(StatusCode::Failure)
    }
}

impl russh_sftp::server::Handler for MemoryServer {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn init(
        &mut self,
        _version: u32,
        _extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        Ok(Version::new())
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        {
            let mut fs = self.fs.lock().unwrap();
            let exists = fs.files.contains_key(&filename);
            if !exists && !pflags.contains(OpenFlags::CREATE) {
                return Err(StatusCode::NoSuchFile);
            }
            if !exists || pflags.contains(OpenFlags::TRUNCATE) {
                fs.files.insert(filename.clone(), Vec::new());
            }
        }
        self.next += 1;
        let handle = self.next.to_string();
        self.handles.insert(handle.clone(), filename);
        Ok(Handle { id, handle })
    }

    async fn close(&mut self, id: u32, handle: String) -> Result<Status, Self::Error> {
        self.handles.remove(&handle);
        Ok(ok(id))
    }

    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        let path = self.path(&handle)?;
        let fs = self.fs.lock().unwrap();
        let content = fs.files.get(&path).ok_or(StatusCode::NoSuchFile)?;
        let start = offset as usize;
        if start >= content.len() {
            return Err(StatusCode::Eof);
        }
        let end = content.len().min(start + len as usize);
        Ok(Data {
            id,
            data: content[start..end].to_vec(),
        })
    }

    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        let path = self.path(&handle)?;
        let mut fs = self.fs.lock().unwrap();
        let content = fs.files.entry(path).or_default();
        let start = offset as usize;
        if content.len() < start + data.len() {
            content.resize(start + data.len(), 0);
        }
        content[start..start + data.len()].copy_from_slice(&data);
        Ok(ok(id))
    }

    async fn fstat(&mut self, id: u32, handle: String) -> Result<Attrs, Self::Error> {
        let path = self.path(&handle)?;
        let fs = self.fs.lock().unwrap();
        let size = fs.files.get(&path).map_or(0, |c| c.len() as u64);
        let attrs = FileAttributes {
            size: Some(size),
            ..FileAttributes::default()
        };
        Ok(Attrs { id, attrs })
    }

    async fn mkdir(
        &mut self,
        id: u32,
        path: String,
        _attrs: FileAttributes,
    ) -> Result<Status, Self::Error> {
        if self.fs.lock().unwrap().dirs.insert(path) {
            Ok(ok(id))
        } else {
            Err(StatusCode::Failure)
        }
    }
}

/// Serve `fs` over `stream` as a plain subsystem would
pub async fn serve<S>(stream: S, fs: SharedFs)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let server = MemoryServer {
        fs,
        handles: HashMap::new(),
        next: 0,
    };
    russh_sftp::server::run(stream, server).await;
}

/// Behave like the escalated bootstrap: take the secret line, then either
/// announce readiness and serve, or sit silent the way sudo does on a
/// rejected password
pub async fn serve_escalated<S>(mut stream: S, fs: SharedFs, ready: bool)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Ok(secret) = read_line(&mut stream).await else {
        return;
    };
    fs.lock().unwrap().preamble = Some(secret);
    if ready {
        let marker = format!("{READY_MARKER}\n");
        if stream.write_all(marker.as_bytes()).await.is_ok() {
            serve(stream, fs).await;
        }
    } else {
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    }
}
