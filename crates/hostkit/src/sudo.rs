//! Running commands as another user through `sudo -S`
//!
//! The secret is the first line on stdin, ahead of whatever the caller
//! feeds the command. `-k` drops any cached credential so the secret is
//! always consumed and never leaks through to the command itself.

use crate::error::Result;
use crate::scrub::scrub_bytes;
use crate::transport::Transport;
use declarative::Response;
use log::debug;
use std::borrow::Cow;

/// User that an empty or `-` identity stands for
pub const DEFAULT_USER: &str = "root";

/// Map the placeholder identities to [`DEFAULT_USER`]
pub fn resolve_user(user: &str) -> &str {
    match user {
        "" | "-" => DEFAULT_USER,
        other => other,
    }
}

fn quote(word: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(word))
}

/// Wrap `command` to run under `bash -c` as `user`
pub fn wrap(command: &str, user: &str) -> String {
    format!(
        "sudo -k -S -u {} bash -c {}",
        quote(resolve_user(user)),
        quote(command)
    )
}

/// Stdin for an escalated command: secret line, then caller input line
pub fn frame_stdin(secret: &str, stdin: &str) -> String {
    format!("{secret}\n{stdin}\n")
}

/// Run `command` as `as_user` over `transport`
///
/// Commands for the connection user run unmodified. Any other user goes
/// through [`wrap`] with `secret` on the first stdin line. The sudo prompt
/// is scrubbed from both output streams.
pub fn run(
    transport: &dyn Transport,
    command: &str,
    stdin: &str,
    as_user: &str,
    secret: &str,
) -> Result<Response> {
    let as_user = resolve_user(as_user);
    let output = if as_user == transport.user() {
        transport.exec(command, format!("{stdin}\n").as_bytes())?
    } else {
        debug!("escalating to {as_user} on {}", transport.address());
        transport.exec(&wrap(command, as_user), frame_stdin(secret, stdin).as_bytes())?
    };

    Ok(Response {
        stdout: scrub_bytes(&output.stdout),
        stderr: scrub_bytes(&output.stderr),
        exit_status: output.exit.code(),
    })
}


#[cfg(test)]
mod tests {
    use super::testing::{RecordingTransport, Reply};
    use super::*;
    use crate::error::Error;
    use crate::transport::Exit;

    #[test]
    fn test_resolve_user() {
        assert_eq!(resolve_user(""), "root");
        assert_eq!(resolve_user("-"), "root");
        assert_eq!(resolve_user("postgres"), "postgres");
    }

    #[test]
    fn test_wrap_quotes_command() {
        assert_eq!(wrap("id -u", "-"), "sudo -k -S -u root bash -c 'id -u'");
        assert_eq!(
            wrap("echo 'hi'", "www-data"),
            r"sudo -k -S -u www-data bash -c 'echo '\''hi'\'''"
        );
    }

    #[test]
    fn test_frame_stdin() {
        assert_eq!(frame_stdin("s3cret", "input"), "s3cret\ninput\n");
        assert_eq!(frame_stdin("s3cret", ""), "s3cret\n\n");
    }

    #[test]
    fn test_same_user_runs_unmodified() {
        let t = RecordingTransport::new("deploy");
        run(&t, "uptime", "in", "deploy", "s3cret").unwrap();
        assert_eq!(t.calls(), vec![("uptime".to_string(), b"in\n".to_vec())]);
    }

    #[test]
    fn test_other_user_escalates() {
        let t = RecordingTransport::new("deploy");
        run(&t, "whoami", "", "", "s3cret").unwrap();
        assert_eq!(
            t.calls(),
            vec![(
                "sudo -k -S -u root bash -c whoami".to_string(),
                b"s3cret\n\n".to_vec()
            )]
        );
    }

    #[test]
    fn test_root_connection_needs_no_escalation() {
        let t = RecordingTransport::new("root");
        run(&t, "whoami", "", "-", "unused").unwrap();
        assert_eq!(t.calls()[0].0, "whoami");
    }

    #[test]
    fn test_response_is_scrubbed() {
        let t = RecordingTransport::new("deploy").reply(Reply {
            stdout: b"root\n".to_vec(),
            stderr: b"[sudo] password for deploy: ".to_vec(),
            exit: Exit::Code(0),
        });
        let resp = run(&t, "whoami", "", "root", "s3cret").unwrap();
        assert_eq!(resp.stdout, "root");
        assert_eq!(resp.stderr, "");
        assert!(resp.success());
    }

    #[test]
    fn test_exit_mapping() {
        let t = RecordingTransport::new("deploy").reply(Reply {
            exit: Exit::Code(42),
            ..Reply::default()
        });
        assert_eq!(run(&t, "x", "", "deploy", "").unwrap().exit_status, 42);

        let t = RecordingTransport::new("deploy").reply(Reply {
            exit: Exit::Missing,
            ..Reply::default()
        });
        assert!(run(&t, "x", "", "deploy", "").unwrap().exit_missing());
    }

    #[test]
    fn test_session_failure_is_error() {
        let mut t = RecordingTransport::new("deploy");
        t.fail_start = true;
        let err = run(&t, "x", "", "deploy", "").unwrap_err();
        assert!(matches!(err, Error::Session { .. }));
    }
}
