//! Error types for the encoder runtime.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while locating or running the encoder.
#[derive(Debug, Error)]
pub enum Error {
	/// Encoder binary was not found.
	#[error("Encoder not found. Install ffmpeg or set PWIO_FFMPEG_PATH")]
	EncoderNotFound,

	/// Failed to spawn the encoder process.
	#[error("Failed to launch encoder {path}: {source}")]
	LaunchFailed {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Encoder exited with a non-zero status.
	#[error("Encoder exited with {}: {stderr}", code.map(|c| format!("code {c}")).unwrap_or_else(|| "signal".to_string()))]
	Exited {
		/// Exit code, `None` when terminated by a signal
		code: Option<i32>,
		/// Tail of the captured stderr
		stderr: String,
	},

	/// Encoder exceeded its wall-clock budget and was killed.
	#[error("Encoder timeout after {} ms", timeout.as_millis())]
	Timeout { timeout: Duration },

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns true if the process was killed for exceeding its timeout.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}
}
