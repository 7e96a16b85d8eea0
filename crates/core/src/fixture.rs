//! Per-test setup and teardown around a test body.
//!
//! A [`Fixture`] owns the test's [`SessionManager`] and, when the host has a
//! network layer, its [`NetworkBridge`]. The body receives a [`TestContext`]
//! instead of reaching for a global session.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use pwio_protocol::{TestError, TestInfo, TestStatus};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::network::{HostNetwork, NetworkBridge};
use crate::remote::RemoteSession;
use crate::report::Reporter;
use crate::session::SessionManager;

/// What a test body gets to work with.
#[derive(Clone)]
pub struct TestContext {
	session: Option<Arc<dyn RemoteSession>>,
	reporter: Arc<dyn Reporter>,
}

impl TestContext {
	pub fn new(session: Option<Arc<dyn RemoteSession>>, reporter: Arc<dyn Reporter>) -> Self {
		Self { session, reporter }
	}

	/// The instrumented session.
	///
	/// # Errors
	///
	/// Returns [`Error::Remote`] when the session was skipped.
	pub fn session(&self) -> Result<Arc<dyn RemoteSession>> {
		self.session
			.clone()
			.ok_or_else(|| Error::Remote("no active session: no capabilities were configured".into()))
	}

	pub fn has_session(&self) -> bool {
		self.session.is_some()
	}

	pub fn reporter(&self) -> &Arc<dyn Reporter> {
		&self.reporter
	}
}

/// Status implied by a body's result.
pub fn derive_status<T>(outcome: &Result<T>) -> TestStatus {
	match outcome {
		Ok(_) => TestStatus::Passed,
		Err(_) => TestStatus::Failed,
	}
}

/// Host-shaped error for a failed body.
pub fn test_error(err: &Error) -> TestError {
	TestError {
		name: Some("Error".to_string()),
		message: Some(err.to_string()),
		stack: None,
		cause: std::error::Error::source(err).map(ToString::to_string),
	}
}

/// One test's session and network bridge.
pub struct Fixture {
	manager: SessionManager,
	reporter: Arc<dyn Reporter>,
	bridge: Option<NetworkBridge>,
}

impl Fixture {
	pub fn new(manager: SessionManager, reporter: Arc<dyn Reporter>, network: Option<Arc<dyn HostNetwork>>) -> Self {
		Self {
			manager,
			reporter,
			bridge: network.map(NetworkBridge::new),
		}
	}

	pub fn manager(&self) -> &SessionManager {
		&self.manager
	}

	/// Opens the session (or skips it) and starts network capture.
	pub async fn setup(&mut self, info: &TestInfo) -> Result<TestContext> {
		let session = self.manager.start(info).await?;
		if let (Some(bridge), Some(session)) = (self.bridge.as_mut(), session.as_ref()) {
			bridge.start_capturing(session.as_ref());
		}
		Ok(TestContext::new(session, Arc::clone(&self.reporter)))
	}

	/// Replays captured traffic, then closes the session.
	pub async fn teardown(&mut self, info: &TestInfo) -> Result<()> {
		if let Some(bridge) = self.bridge.as_mut() {
			bridge.stop_capturing().await;
		}
		self.manager.close(info).await
	}

	/// Runs `body` between setup and teardown.
	///
	/// The final status is the one the host already put in `info`, if any,
	/// else derived from the body's result. Teardown always runs once setup
	/// succeeded, and its failures never change the status. A panicking body
	/// fails the test, is torn down, and the panic then resumes.
	///
	/// # Errors
	///
	/// Only setup failures are returned; `info` is marked failed first.
	pub async fn run<F, Fut>(self, info: &mut TestInfo, body: F) -> Result<TestStatus>
	where
		F: FnOnce(TestContext) -> Fut,
		Fut: Future<Output = Result<()>>,
	{
		match self.run_unwinding(info, body).await {
			Ok(result) => result,
			Err(payload) => panic::resume_unwind(payload),
		}
	}

	/// Like [`run`](Self::run), but hands a body panic back as `Err` after
	/// teardown instead of resuming it.
	pub async fn run_unwinding<F, Fut>(
		mut self,
		info: &mut TestInfo,
		body: F,
	) -> std::result::Result<Result<TestStatus>, PanicPayload>
	where
		F: FnOnce(TestContext) -> Fut,
		Fut: Future<Output = Result<()>>,
	{
		let context = match self.setup(info).await {
			Ok(context) => context,
			Err(err) => {
				info.status = Some(TestStatus::Failed);
				info.error = Some(test_error(&err));
				return Ok(Err(err));
			}
		};

		let started = Instant::now();
		let caught = AssertUnwindSafe(async move { body(context).await })
			.catch_unwind()
			.await;
		if info.duration.is_zero() {
			info.duration = started.elapsed();
		}

		let (status, panicked) = match caught {
			Ok(outcome) => {
				let status = *info.status.get_or_insert(derive_status(&outcome));
				if let Err(err) = &outcome {
					debug!(target = "pwio", test = %info.title, error = %err, "test body failed");
					if info.error.is_none() {
						info.error = Some(test_error(err));
					}
				}
				(status, None)
			}
			Err(payload) => {
				let message = panic_message(payload.as_ref());
				warn!(target = "pwio", test = %info.title, panic = %message, "test body panicked");
				info.status = Some(TestStatus::Failed);
				info.error = Some(TestError {
					name: Some("Panic".to_string()),
					message: Some(message),
					stack: None,
					cause: None,
				});
				(TestStatus::Failed, Some(payload))
			}
		};

		if let Err(err) = self.teardown(info).await {
			warn!(target = "pwio", test = %info.title, error = %err, "teardown failed");
		}
		match panicked {
			Some(payload) => Err(payload),
			None => Ok(Ok(status)),
		}
	}
}

/// Panic payload of a test body.
pub type PanicPayload = Box<dyn Any + Send>;

/// Text of a panic payload, as passed to `panic!` or an assertion.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(text) = payload.downcast_ref::<&str>() {
		(*text).to_string()
	} else if let Some(text) = payload.downcast_ref::<String>() {
		text.clone()
	} else {
		"test body panicked".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::report::MemoryReporter;

	#[test]
	fn status_follows_body_result() {
		assert_eq!(derive_status(&Ok::<(), Error>(())), TestStatus::Passed);
		assert_eq!(derive_status::<()>(&Err(Error::service("x"))), TestStatus::Failed);
	}

	#[test]
	fn error_message_is_kept() {
		let error = test_error(&Error::Remote("element not found".into()));
		assert_eq!(error.message.as_deref(), Some("Remote error: element not found"));
		assert_eq!(error.name.as_deref(), Some("Error"));
	}

	#[test]
	fn skipped_context_has_no_session() {
		let context = TestContext::new(None, Arc::new(MemoryReporter::new()));
		assert!(!context.has_session());
		assert!(matches!(context.session().err(), Some(Error::Remote(_))));
	}

	#[test]
	fn panic_message_reads_str_and_string_payloads() {
		let text: PanicPayload = Box::new("assertion failed");
		assert_eq!(panic_message(text.as_ref()), "assertion failed");

		let owned: PanicPayload = Box::new(String::from("left != right"));
		assert_eq!(panic_message(owned.as_ref()), "left != right");

		let other: PanicPayload = Box::new(7_u32);
		assert_eq!(panic_message(other.as_ref()), "test body panicked");
	}
}
