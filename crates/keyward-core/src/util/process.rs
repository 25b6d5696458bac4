//! Process execution utilities.
//!
//! Commands are run to completion; stdout and stderr are captured as lines
//! with stderr appended after stdout. Waiting for the exit status retries
//! when the wait is interrupted.

use keyward_types::{Result, SecretBuffer, ToolOutput};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use tracing::debug;

/// Execute a command and capture its exit code and output lines.
pub fn run(program: &str, args: &[String]) -> Result<ToolOutput> {
    run_with_password(program, args, None)
}

/// Execute a command, writing `password` and a newline to its stdin.
///
/// The password buffer is consumed and wiped when this function returns,
/// whether or not the command could be started.
pub fn run_with_password(
    program: &str,
    args: &[String],
    password: Option<SecretBuffer>,
) -> Result<ToolOutput> {
    debug!("Running: {} ({} arguments)", program, args.len());

    let mut child = Command::new(program)
        .args(args)
        .stdin(if password.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let (Some(password), Some(stdin)) = (password, child.stdin.take()) {
        match feed_password(stdin, &password) {
            // The child stopped reading; its exit status tells the rest.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("{} closed stdin before reading the password", program);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = wait_for_exit(&mut child);
                return Err(e.into());
            }
            Ok(()) => {}
        }
    }

    let stderr = child.stderr.take();
    let stderr_reader = thread::spawn(move || -> io::Result<Vec<String>> {
        match stderr {
            Some(stream) => read_lines(stream),
            None => Ok(Vec::new()),
        }
    });

    let mut output = match child.stdout.take() {
        Some(stream) => read_lines(stream)?,
        None => Vec::new(),
    };
    let status = wait_for_exit(&mut child)?;

    match stderr_reader.join() {
        Ok(lines) => output.extend(lines?),
        Err(_) => keyward_types::bug!("stderr reader for {} panicked", program),
    }

    let code = status.code().unwrap_or(-1);
    debug!("{} exited with code {}", program, code);
    Ok(ToolOutput { code, output })
}

/// Wait for a child to exit, retrying interrupted waits.
pub fn wait_for_exit(child: &mut Child) -> io::Result<ExitStatus> {
    loop {
        match child.wait() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

fn feed_password(mut stdin: impl Write, password: &SecretBuffer) -> io::Result<()> {
    stdin.write_all(password.expose().as_bytes())?;
    stdin.write_all(b"\n")?;
    stdin.flush()
}

fn read_lines(stream: impl Read) -> io::Result<Vec<String>> {
    BufReader::new(stream).lines().collect()
}

/// Redact secrets from command output.
pub fn redact_secrets(output: &str, secrets: &[&str]) -> String {
    let mut redacted = output.to_string();
    for secret in secrets {
        if !secret.is_empty() {
            redacted = redacted.replace(secret, "***REDACTED***");
        }
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_secrets() {
        let line = "keytool -storepass hunter2 -keypass hunter2";
        assert_eq!(
            redact_secrets(line, &["hunter2", ""]),
            "keytool -storepass ***REDACTED*** -keypass ***REDACTED***"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_output_and_code() {
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];
        let result = run("sh", &args).unwrap();
        assert_eq!(result.code, 3);
        assert_eq!(result.output, vec!["out".to_string(), "err".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_feeds_password_on_stdin() {
        let args = vec!["-c".to_string(), "read line; echo got:$line".to_string()];
        let result = run_with_password("sh", &args, Some(SecretBuffer::from("s3cret"))).unwrap();
        assert!(result.success());
        assert_eq!(result.output, vec!["got:s3cret".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_child_ignoring_stdin_is_reaped() {
        let args = vec!["-c".to_string(), "exec 0<&-; echo closed; exit 4".to_string()];
        let password = SecretBuffer::new("x".repeat(1 << 20));
        let result = run_with_password("sh", &args, Some(password)).unwrap();
        assert_eq!(result.code, 4);
        assert_eq!(result.output, vec!["closed".to_string()]);
    }

    #[test]
    fn test_missing_program_is_error() {
        assert!(run("/nonexistent/keyward-test-tool", &[]).is_err());
    }
}
