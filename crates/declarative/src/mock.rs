//! In-memory target for unit tests

use crate::target::Target;
use crate::types::Response;
use anyhow::{Result, bail};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    files: HashMap<String, Vec<u8>>,
    exit_codes: HashMap<String, i32>,
    commands: Vec<(String, String)>,
}

/// Target whose filesystem is a map and whose commands are scripted
///
/// `test -e <path>` and `rm -f <path>` act on the map; every other
/// command exits with its scripted code, 0 by default.
#[derive(Clone)]
pub struct MockTarget {
    user: String,
    state: Arc<Mutex<State>>,
}

impl MockTarget {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            state: Arc::default(),
        }
    }

    pub fn script(&self, command: &str, exit_status: i32) {
        let mut state = self.state.lock().unwrap();
        state.exit_codes.insert(command.to_string(), exit_status);
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    /// Commands run so far, with the user they ran as
    pub fn commands(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|(_, c)| c == command).count()
    }
}

impl fmt::Display for MockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@mock", self.user)
    }
}

struct MockFile {
    path: String,
    state: Arc<Mutex<State>>,
}

impl Write for MockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.files.entry(self.path.clone()).or_default().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Target for MockTarget {
    fn user(&self) -> &str {
        &self.user
    }

    fn run(&self, command: &str, _stdin: &str) -> Result<Response> {
        let mut state = self.state.lock().unwrap();
        state.commands.push((self.user.clone(), command.to_string()));

        let exit_status = if let Some(path) = command.strip_prefix("test -e ") {
            i32::from(!state.files.contains_key(path))
        } else if let Some(path) = command.strip_prefix("rm -f ") {
            state.files.remove(path);
            0
        } else {
            state.exit_codes.get(command).copied().unwrap_or(0)
        };

        Ok(Response {
            exit_status,
            ..Default::default()
        })
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.files.contains_key(path) {
            bail!("{path} already exists");
        }
        state.files.insert(path.to_string(), Vec::new());
        Ok(())
    }

    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), Vec::new());
        Ok(Box::new(MockFile {
            path: path.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        match self.file(path) {
            Some(content) => Ok(Box::new(io::Cursor::new(content))),
            None => bail!("{path}: no such file"),
        }
    }

    fn append(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(MockFile {
            path: path.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn as_user(&self, user: &str) -> Box<dyn Target> {
        Box::new(Self {
            user: user.to_string(),
            state: Arc::clone(&self.state),
        })
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
