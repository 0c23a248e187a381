//! One-shot command execution for exec-channel devices.

use std::future::Future;

use log::{debug, warn};

use crate::error::{Result, SessionError};
use crate::platform::vendors::mikrotik;
use crate::transport::ExecOutput;

/// Runs a single command on a fresh exec channel per call.
pub trait CommandRunner: Send {
    /// Execute `command` and collect its output and exit status.
    fn run(&mut self, command: &str) -> impl Future<Output = Result<ExecOutput>> + Send;
}

/// Try each command in order and return the stdout of the first accepted one.
///
/// A variant is accepted when it exits with status 0, prints something, and
/// the output does not open with a RouterOS rejection message. A variant
/// whose exec itself fails (timeout, channel fault) counts as rejected and
/// the next one is tried. When every variant is rejected the error reports
/// the last command, its exit status and its stderr.
pub async fn run_first_accepted<R: CommandRunner>(
    runner: &mut R,
    device: &str,
    commands: &[&str],
) -> Result<String> {
    let mut last: Option<(&str, Option<u32>, String)> = None;

    for &command in commands {
        debug!("device={} executing command='{}'", device, command);
        let output = match runner.run(command).await {
            Ok(output) => output,
            Err(e) => {
                warn!("device={} command='{}' failed: {}", device, command, e);
                last = Some((command, None, e.to_string()));
                continue;
            }
        };

        let rejected = mikrotik::detect_failure(&output.stdout);
        if output.is_success() && rejected.is_none() {
            debug!(
                "device={} command='{}' accepted bytes={}",
                device,
                command,
                output.stdout.len()
            );
            return Ok(output.stdout);
        }

        warn!(
            "device={} command='{}' rejected exit_status={:?} reason={}",
            device,
            command,
            output.exit_status,
            rejected.unwrap_or("non-zero exit or empty output")
        );
        let stderr = if output.stderr.trim().is_empty() {
            output.stdout.trim()
        } else {
            output.stderr.trim()
        };
        last = Some((command, output.exit_status, stderr.to_string()));
    }

    let (command, exit_status, stderr) = last.unwrap_or_default();
    Err(SessionError::CommandFailed {
        command: command.to_string(),
        exit_status,
        stderr,
    }
    .into())
}

/// Retrieve the text export, falling back through the export variants.
pub async fn fetch_export<R: CommandRunner>(runner: &mut R, device: &str) -> Result<String> {
    run_first_accepted(runner, device, mikrotik::EXPORT_COMMANDS).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::session::testing::FakeRunner;

    fn ok(stdout: &str) -> ExecOutput {
        ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_status: Some(0),
        }
    }

    fn failed(status: u32, stderr: &str) -> ExecOutput {
        ExecOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_status: Some(status),
        }
    }

    #[tokio::test]
    async fn test_first_variant_accepted() {
        let mut runner =
            FakeRunner::new().respond("/export hide-sensitive", ok("/interface bridge\n"));

        let export = fetch_export(&mut runner, "r1").await.unwrap();
        assert_eq!(export, "/interface bridge\n");
        assert_eq!(runner.commands(), vec!["/export hide-sensitive"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_plain_export() {
        let mut runner = FakeRunner::new()
            .respond("/export hide-sensitive", failed(1, "expected end of command"))
            .respond("/export", ok("# by RouterOS 6.49\n/ip address\n"));

        let export = fetch_export(&mut runner, "r1").await.unwrap();
        assert!(export.contains("/ip address"));
        assert_eq!(runner.commands(), vec!["/export hide-sensitive", "/export"]);
    }

    #[tokio::test]
    async fn test_rejection_on_stdout_falls_back() {
        let mut runner = FakeRunner::new()
            .respond(
                "/export hide-sensitive",
                ok("expected end of command (line 1 column 9)"),
            )
            .respond("/export", ok("/ip address\n"));

        assert_eq!(fetch_export(&mut runner, "r1").await.unwrap(), "/ip address\n");
    }

    #[tokio::test]
    async fn test_empty_stdout_is_not_accepted() {
        let mut runner = FakeRunner::new()
            .respond("/export hide-sensitive", ok("   \n"))
            .respond("/export", ok("/ip address\n"));

        assert_eq!(fetch_export(&mut runner, "r1").await.unwrap(), "/ip address\n");
    }

    #[tokio::test]
    async fn test_export_quoting_failure_text_is_accepted() {
        let body = "# by RouterOS 7.19\n/system script\n\
            add name=check source=\":log warning \\\"failure: uplink down\\\"\"\n";
        let mut runner = FakeRunner::new().respond("/export hide-sensitive", ok(body));

        assert_eq!(fetch_export(&mut runner, "r1").await.unwrap(), body);
        assert_eq!(runner.commands(), vec!["/export hide-sensitive"]);
    }

    #[tokio::test]
    async fn test_exec_error_falls_back() {
        let mut runner = FakeRunner::new()
            .time_out("/export hide-sensitive")
            .respond("/export", ok("/ip address\n"));

        assert_eq!(fetch_export(&mut runner, "r1").await.unwrap(), "/ip address\n");
        assert_eq!(runner.commands(), vec!["/export hide-sensitive", "/export"]);
    }

    #[tokio::test]
    async fn test_exec_error_on_every_variant() {
        let mut runner = FakeRunner::new()
            .time_out("/export hide-sensitive")
            .time_out("/export");

        let err = fetch_export(&mut runner, "r1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        match err {
            Error::Session(SessionError::CommandFailed {
                command,
                exit_status,
                stderr,
            }) => {
                assert_eq!(command, "/export");
                assert_eq!(exit_status, None);
                assert!(stderr.contains("Timed out"), "{stderr}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_all_variants_rejected() {
        let mut runner = FakeRunner::new()
            .respond("/export hide-sensitive", failed(1, "bad command name"))
            .respond("/export", failed(2, "not permitted"));

        let err = fetch_export(&mut runner, "r1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailed);
        match err {
            Error::Session(SessionError::CommandFailed {
                command,
                exit_status,
                stderr,
            }) => {
                assert_eq!(command, "/export");
                assert_eq!(exit_status, Some(2));
                assert_eq!(stderr, "not permitted");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
