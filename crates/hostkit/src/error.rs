//! Error types for target operations.
//!
//! Errors are split the way callers need to react to them: connection
//! problems surface once at construction, session problems fail a single
//! call, and transfer problems carry the remote diagnostic text.

use thiserror::Error;

/// Errors that can occur while talking to a target.
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connection to the target could not be established
    #[error("unable to connect to {address}: {source}")]
    Connect {
        /// Address that was dialled
        address: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// No authentication method was accepted
    #[error("authentication as {user} on {address} failed")]
    Auth {
        /// User that tried to authenticate
        user: String,
        /// Address of the target
        address: String,
    },

    /// Host key did not match the configured policy
    #[error("host key verification for {address} failed: {message}")]
    HostKey {
        /// Address of the target
        address: String,
        /// What did not match
        message: String,
    },

    /// A process or channel could not be started
    #[error("unable to start session for `{command}`: {message}")]
    Session {
        /// Command that was about to run
        command: String,
        /// Why it could not start
        message: String,
    },

    /// A push or file operation was rejected by the target
    #[error("unable to copy content to {path}: {output}")]
    Transfer {
        /// Destination on the target
        path: String,
        /// Captured remote output
        output: String,
    },

    /// SFTP request was refused or could not be completed
    #[error("sftp {operation} {path}: {source}")]
    Sftp {
        /// Request that failed
        operation: &'static str,
        /// Path the request was about
        path: String,
        /// Client-side error, carrying the server status when there is one
        #[source]
        source: russh_sftp::client::error::Error,
    },

    /// An escalated file session never came up
    #[error("unable to open a file session as {user}: {message}")]
    Escalation {
        /// User the session was for
        user: String,
        /// What went wrong
        message: String,
    },

    /// Malformed or unexpected data on a protocol stream
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session was already closed
    #[error("session closed")]
    Closed,

    /// SSH protocol error
    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),

    /// Private key could not be read or decoded
    #[error("ssh key error: {0}")]
    Key(#[from] russh::keys::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error happened before any command could run.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Error::Connect { .. } | Error::Auth { .. } | Error::HostKey { .. }
        )
    }

    pub(crate) fn session(command: &str, message: impl std::fmt::Display) -> Self {
        Error::Session {
            command: command.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors() {
        let err = Error::Auth {
            user: "deploy".into(),
            address: "10.0.0.1:22".into(),
        };
        assert!(err.is_connection());
        assert_eq!(err.to_string(), "authentication as deploy on 10.0.0.1:22 failed");

        assert!(!Error::Closed.is_connection());
    }

    #[test]
    fn test_escalation_message() {
        let err = Error::Escalation {
            user: "root".into(),
            message: "no readiness line within 20s".into(),
        };
        assert!(!err.is_connection());
        assert_eq!(
            err.to_string(),
            "unable to open a file session as root: no readiness line within 20s"
        );
    }

    #[test]
    fn test_transfer_inlines_output() {
        let err = Error::Transfer {
            path: "/etc/motd".into(),
            output: "scp: /etc/motd: Permission denied".into(),
        };
        assert_eq!(
            err.to_string(),
            "unable to copy content to /etc/motd: scp: /etc/motd: Permission denied"
        );
    }
}
