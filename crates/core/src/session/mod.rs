//! Remote session lifecycle.
//!
//! A [`SessionManager`] walks one test's session through
//! `Idle → Configuring → Opening → Active → Closing → Closed`, or straight
//! from `Idle` to `Skipped` when no capabilities are configured.

mod manager;
mod mobile;

pub use manager::SessionManager;
pub use mobile::{
	CONTROL_PORT_BASE, DEFAULT_HOSTNAME, DEFAULT_PORT, DEFAULT_PROTOCOL, LIVE_PREVIEW_PORT_BASE, configure_remote,
};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
	#[default]
	Idle,
	Configuring,
	Opening,
	Active,
	Closing,
	Closed,
	/// No capabilities were configured; nothing downstream runs.
	Skipped,
}

impl SessionState {
	pub fn can_transition(self, to: SessionState) -> bool {
		use SessionState::*;
		matches!(
			(self, to),
			(Idle, Configuring)
				| (Idle, Skipped)
				| (Configuring, Opening)
				| (Opening, Active)
				| (Opening, Closed)
				| (Active, Closing)
				| (Closing, Closed)
		)
	}

	/// `Closed` and `Skipped` accept no further transitions.
	pub fn is_terminal(self) -> bool {
		matches!(self, SessionState::Closed | SessionState::Skipped)
	}
}
