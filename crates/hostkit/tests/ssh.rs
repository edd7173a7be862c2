//! Runs against a real SSH server, when one is configured
//!
//! `CONVERGE_TEST_SSH_ADDRESS` (`host:port`) and `CONVERGE_TEST_SSH_USER`
//! select the server. `CONVERGE_TEST_SSH_KEY` names a private key; without
//! it the running agent is used. Every test skips when the address is
//! unset.

use declarative::rules::Cmd;
use declarative::{Rule, Target};
use hostkit::{Auth, HostKeyPolicy, Remote, Transport};
use std::io::{Read, Write};
use std::path::PathBuf;

struct Fixture {
    address: String,
    user: String,
    auth: Auth,
    secret: String,
}

impl Fixture {
    fn from_env() -> Option<Self> {
        let Ok(address) = std::env::var("CONVERGE_TEST_SSH_ADDRESS") else {
            eprintln!("skipping: CONVERGE_TEST_SSH_ADDRESS not set");
            return None;
        };
        let auth = match std::env::var("CONVERGE_TEST_SSH_KEY") {
            Ok(path) => Auth::Key {
                path: PathBuf::from(path),
                passphrase: None,
            },
            Err(_) => Auth::Agent,
        };
        Some(Self {
            address,
            user: std::env::var("CONVERGE_TEST_SSH_USER").unwrap_or_else(|_| "root".into()),
            auth,
            secret: std::env::var("CONVERGE_TEST_SUDO_SECRET").unwrap_or_default(),
        })
    }

    fn connect(&self) -> Remote {
        Remote::connect(
            &self.address,
            &self.user,
            self.secret.clone(),
            &HostKeyPolicy::Insecure,
            std::slice::from_ref(&self.auth),
        )
        .unwrap()
    }
}

#[test]
fn exit_status_is_reported() {
    let Some(fixture) = Fixture::from_env() else {
        return;
    };
    let host = fixture.connect();
    let response = host.run("echo out; echo err >&2; exit 3", "").unwrap();
    assert_eq!(response.exit_status, 3);
    assert_eq!(response.stdout, "out");
    assert_eq!(response.stderr, "err");
    host.close().unwrap();
}

#[test]
fn killed_command_has_no_exit_status() {
    let Some(fixture) = Fixture::from_env() else {
        return;
    };
    let host = fixture.connect();
    let response = host.run("kill -9 $$", "").unwrap();
    assert_eq!(response.exit_status, -1);
    assert!(response.exit_missing());

    // A check whose command vanished is not satisfied
    let rule = Cmd::new("kill -9 $$", "true");
    assert!(!rule.check(&host).unwrap());
    host.close().unwrap();
}

#[test]
fn large_output_while_feeding_stdin() {
    let Some(fixture) = Fixture::from_env() else {
        return;
    };
    let transport = hostkit::SshTransport::connect(
        &fixture.address,
        &fixture.user,
        &HostKeyPolicy::Insecure,
        std::slice::from_ref(&fixture.auth),
    )
    .unwrap();
    // Both streams exceed the channel window while stdin is still arriving
    let input = vec![b'y'; 4 << 20];
    let out = transport
        .exec("head -c 3000000 /dev/zero >&2; cat", &input)
        .unwrap();
    assert_eq!(out.stderr.len(), 3_000_000);
    assert_eq!(out.stdout.len(), input.len());
    assert!(out.exit.success());
    transport.close().unwrap();
}

#[test]
fn files_over_the_sftp_subsystem() {
    let Some(fixture) = Fixture::from_env() else {
        return;
    };
    let host = fixture.connect();
    let dir = host.run("mktemp -d", "").unwrap().stdout;
    let path = format!("{dir}/app.conf");

    host.create(&path).unwrap().write_all(b"a=1\n").unwrap();
    host.append(&path).unwrap().write_all(b"b=2\n").unwrap();
    let mut text = String::new();
    host.open(&path).unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text, "a=1\nb=2\n");

    host.run(&format!("rm -rf {dir}"), "").unwrap();
    host.close().unwrap();
}
