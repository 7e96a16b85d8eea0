//! Encoder process execution.
//!
//! The encoder is spawned directly (never through a shell) with an explicit
//! argument list. Stdio is piped so the encoder's chatter never reaches the
//! host terminal; stderr is kept for error reports.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::encoder::get_encoder_executable;
use crate::error::{Error, Result};

/// Bytes of stderr kept in [`Error::Exited`].
const STDERR_TAIL: usize = 2048;

/// Captured output of a successful encoder run.
#[derive(Debug, Clone, Default)]
pub struct EncoderOutput {
	pub stdout: String,
	pub stderr: String,
}

/// A single encoder invocation.
#[derive(Debug, Clone)]
pub struct EncoderProcess {
	program: PathBuf,
	args: Vec<OsString>,
	timeout: Duration,
}

impl EncoderProcess {
	/// Prepares an invocation of `program`.
	pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			timeout,
		}
	}

	/// Prepares an invocation of the discovered encoder binary.
	///
	/// # Errors
	///
	/// Returns [`Error::EncoderNotFound`] if no encoder is installed.
	pub fn discover(timeout: Duration) -> Result<Self> {
		Ok(Self::new(get_encoder_executable()?, timeout))
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn program(&self) -> &Path {
		&self.program
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Runs the encoder to completion.
	///
	/// The child is killed if it is still running after the timeout, and also
	/// if the returned future is dropped.
	///
	/// # Errors
	///
	/// - [`Error::LaunchFailed`] if the process cannot be spawned
	/// - [`Error::Timeout`] if it exceeded the timeout and was killed
	/// - [`Error::Exited`] if it exited with a non-zero status
	pub async fn run(self) -> Result<EncoderOutput> {
		debug!(
			target = "pwio",
			program = %self.program.display(),
			args = ?self.args,
			timeout_ms = self.timeout.as_millis() as u64,
			"spawning encoder"
		);

		let child = Command::new(&self.program)
			.args(&self.args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|source| Error::LaunchFailed {
				path: self.program.clone(),
				source,
			})?;

		// wait_with_output owns the child; dropping the future on timeout drops
		// the child and kill_on_drop sends SIGKILL.
		let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
			Ok(result) => result?,
			Err(_) => {
				warn!(
					target = "pwio",
					program = %self.program.display(),
					timeout_ms = self.timeout.as_millis() as u64,
					"encoder timed out, killed"
				);
				return Err(Error::Timeout {
					timeout: self.timeout,
				});
			}
		};

		let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
		let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

		if !output.status.success() {
			return Err(Error::Exited {
				code: output.status.code(),
				stderr: tail(&stderr, STDERR_TAIL).to_string(),
			});
		}

		Ok(EncoderOutput { stdout, stderr })
	}
}

fn tail(text: &str, max: usize) -> &str {
	if text.len() <= max {
		return text;
	}
	let mut start = text.len() - max;
	while !text.is_char_boundary(start) {
		start += 1;
	}
	&text[start..]
}

#[cfg(test)]
mod tests {
	use std::fs;
	#[cfg(unix)]
	use std::os::unix::fs::PermissionsExt;

	use tempfile::TempDir;

	use super::*;

	#[cfg(unix)]
	fn write_mock_encoder(path: &Path, body: &str) {
		fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
		let mut perms = fs::metadata(path).unwrap().permissions();
		perms.set_mode(0o755);
		fs::set_permissions(path, perms).unwrap();
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn passes_arguments_without_shell_expansion() {
		let temp = TempDir::new().unwrap();
		let encoder = temp.path().join("encoder");
		write_mock_encoder(&encoder, "for a in \"$@\"; do echo \"$a\"; done");

		let output = EncoderProcess::new(&encoder, Duration::from_secs(5))
			.args(["-i", "frames/%04d.png", "out file.mp4"])
			.run()
			.await
			.unwrap();

		let lines: Vec<&str> = output.stdout.lines().collect();
		assert_eq!(lines, vec!["-i", "frames/%04d.png", "out file.mp4"]);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn non_zero_exit_reports_stderr() {
		let temp = TempDir::new().unwrap();
		let encoder = temp.path().join("encoder");
		write_mock_encoder(&encoder, "echo 'bad codec' >&2\nexit 3");

		let err = EncoderProcess::new(&encoder, Duration::from_secs(5))
			.run()
			.await
			.unwrap_err();

		match err {
			Error::Exited { code, stderr } => {
				assert_eq!(code, Some(3));
				assert!(stderr.contains("bad codec"));
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn slow_encoder_is_killed_on_timeout() {
		let temp = TempDir::new().unwrap();
		let encoder = temp.path().join("encoder");
		write_mock_encoder(&encoder, "exec sleep 30");

		let started = std::time::Instant::now();
		let err = EncoderProcess::new(&encoder, Duration::from_millis(200))
			.run()
			.await
			.unwrap_err();

		assert!(err.is_timeout());
		assert!(started.elapsed() < Duration::from_secs(10));
	}

	#[tokio::test]
	async fn missing_program_is_launch_failure() {
		let temp = TempDir::new().unwrap();
		let err = EncoderProcess::new(temp.path().join("missing"), Duration::from_secs(1))
			.run()
			.await
			.unwrap_err();

		assert!(matches!(err, Error::LaunchFailed { .. }));
	}

	#[test]
	fn tail_respects_char_boundaries() {
		assert_eq!(tail("abc", 10), "abc");
		assert_eq!(tail("abcdef", 3), "def");
		assert_eq!(tail("aé", 1), "");
	}
}
