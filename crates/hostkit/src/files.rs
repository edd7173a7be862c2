//! File operation backends
//!
//! Every identity on a host gets one [`Files`] session: the plain filesystem
//! for the local connection identity, and an
//! [`SftpFiles`](crate::sftp::SftpFiles) session for everything else.

use crate::error::Result;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};

/// File operations for one acting identity
pub trait Files: Send + Sync {
    fn mkdir(&self, path: &str) -> Result<()>;

    /// Open for writing, creating or truncating
    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>>;

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Open for writing at the end, creating if missing
    fn append(&self, path: &str) -> Result<Box<dyn Write + Send>>;

    /// Release the session
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Direct access to this machine's filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

impl Files for LocalFiles {
    fn mkdir(&self, path: &str) -> Result<()> {
        fs::create_dir(path)?;
        Ok(())
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(fs::File::create(path)?))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn append(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Box::new(file))
    }
}
