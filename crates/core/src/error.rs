// Error types for the pwio engine

use pwio_protocol::HookName;
use thiserror::Error;

use crate::session::SessionState;

/// Result type alias for pwio operations
pub type Result<T> = std::result::Result<T, Error>;

/// One plugin's failure while running a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
	/// Identifier of the failing service
	pub service: String,
	pub message: String,
}

impl std::fmt::Display for HookFailure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}: {}", self.service, self.message)
	}
}

/// Errors that can occur while orchestrating a session
#[derive(Debug, Error)]
pub enum Error {
	/// A configured service identifier has no definition in the catalog
	#[error("Unknown service '{0}'. Register it in the ServiceCatalog before starting the worker.")]
	UnknownService(String),

	/// Service construction or a service hook body failed
	#[error("Service error: {0}")]
	Service(String),

	/// One or more plugins failed while running a hook
	///
	/// Every plugin still ran; `failures` lists each one that returned an error,
	/// in registration order.
	#[error("Hook '{hook}' failed for {} service(s): {}", failures.len(), join_failures(failures))]
	Hook {
		hook: HookName,
		failures: Vec<HookFailure>,
	},

	/// The remote session could not be opened
	#[error("Failed to open remote session: {0}")]
	SessionOpen(String),

	/// A command sent to the remote session failed
	#[error("Remote error: {0}")]
	Remote(String),

	/// Session manager operation called in the wrong state
	#[error("Invalid session transition from {from:?} to {to:?}")]
	InvalidState { from: SessionState, to: SessionState },

	/// Recording could not be started, stopped, or attached
	#[error("Recording error: {0}")]
	Recording(String),

	/// The encoder exceeded the recording's maximum duration and was killed
	#[error("Encoder timeout after {secs} seconds")]
	EncodeTimeout { secs: u64 },

	/// Host network replay failed
	#[error("Network error: {0}")]
	Network(String),

	/// Project options could not be loaded
	#[error("Configuration error: {0}")]
	Config(String),

	/// Encoder runtime error
	#[error(transparent)]
	Runtime(#[from] pwio_runtime::Error),

	/// I/O error
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// Base64 payload from the remote session was malformed
	#[error("Invalid base64 payload: {0}")]
	Base64(#[from] base64::DecodeError),
}

impl Error {
	/// Shorthand for plugin bodies reporting a failure.
	pub fn service(message: impl Into<String>) -> Self {
		Error::Service(message.into())
	}

	/// Returns true if this error is contained by the orchestrator rather than
	/// failing the test.
	pub fn is_contained(&self) -> bool {
		matches!(
			self,
			Error::Hook { .. } | Error::Recording(_) | Error::EncodeTimeout { .. } | Error::Network(_)
		)
	}
}

fn join_failures(failures: &[HookFailure]) -> String {
	failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hook_error_lists_every_failure() {
		let err = Error::Hook {
			hook: HookName::BeforeTest,
			failures: vec![
				HookFailure {
					service: "a".into(),
					message: "boom".into(),
				},
				HookFailure {
					service: "b".into(),
					message: "bang".into(),
				},
			],
		};

		let text = err.to_string();
		assert!(text.contains("beforeTest"));
		assert!(text.contains("2 service(s)"));
		assert!(text.contains("a: boom; b: bang"));
		assert!(err.is_contained());
	}

	#[test]
	fn session_open_is_not_contained() {
		assert!(!Error::SessionOpen("refused".into()).is_contained());
	}
}
