//! Cleanup of captured command output

use regex::Regex;
use std::sync::LazyLock;

/// The prompt `sudo -S` writes before reading the secret.
static SUDO_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\[sudo\] password for [^:]+: ").expect("valid regex")
});

/// Clean captured stdout/stderr text.
///
/// Trims one leading and one trailing newline, then removes the sudo
/// password prompt if present.
pub fn scrub(text: &str) -> String {
    let text = text.strip_prefix('\n').unwrap_or(text);
    let text = text.strip_suffix('\n').unwrap_or(text);
    SUDO_PROMPT.replace(text, "").into_owned()
}

/// Lossy-decode captured bytes and [`scrub`] them.
pub fn scrub_bytes(bytes: &[u8]) -> String {
    scrub(&String::from_utf8_lossy(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_prompt() {
        assert_eq!(scrub("[sudo] password for alice: done\n"), "done");
        assert_eq!(scrub("[sudo] password for svc-01.x: done"), "done");
    }

    #[test]
    fn test_scrub_newlines() {
        assert_eq!(scrub("hello\n"), "hello");
        assert_eq!(scrub("\nhello\n"), "hello");
        assert_eq!(scrub("hello\n\n"), "hello\n");
        assert_eq!(scrub("a\nb"), "a\nb");
        assert_eq!(scrub(""), "");
    }

    #[test]
    fn test_scrub_single_prompt() {
        let twice = "[sudo] password for bob: [sudo] password for bob: x";
        assert_eq!(scrub(twice), "[sudo] password for bob: x");
    }

    #[test]
    fn test_scrub_leaves_other_output() {
        assert_eq!(
            scrub("cat: nope: No such file or directory\n"),
            "cat: nope: No such file or directory"
        );
    }
}
