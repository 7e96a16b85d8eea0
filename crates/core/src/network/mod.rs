//! Replays remote-protocol traffic into the host framework's network layer.
//!
//! While a test runs, the bridge collects the session's command events. When
//! capture stops, each event becomes a mocked route answering with the
//! recorded result, followed by a simulated request against that route, so
//! the traffic shows up in the host's network log.

mod route_table;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use pwio_protocol::CommandEvent;
use serde_json::Value;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use route_table::{RouteMatcher, RouteTable};

use crate::error::Result;
use crate::remote::RemoteSession;

/// Host used in simulated request URLs.
pub const MOCK_ORIGIN: &str = "https://playwrightio";

/// Session id used when the remote end did not report one.
pub const UNKNOWN_SESSION: &str = "unknown";

const CAPTURE_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Canned response served by a mocked route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
	pub status: u16,
	pub content_type: String,
	pub headers: IndexMap<String, String>,
	pub body: String,
}

impl MockResponse {
	/// `200 application/json` with `body`.
	pub fn json(body: impl Into<String>) -> Self {
		Self {
			status: 200,
			content_type: "application/json".to_string(),
			headers: IndexMap::new(),
			body: body.into(),
		}
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());
		self
	}
}

/// A request issued inside the host's network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedRequest {
	pub url: String,
	pub method: String,
	pub headers: IndexMap<String, String>,
	pub body: Option<String>,
}

impl SimulatedRequest {
	pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			method: method.into(),
			headers: IndexMap::new(),
			body: None,
		}
	}
}

/// The host framework's network layer.
#[async_trait]
pub trait HostNetwork: Send + Sync {
	/// Registers a route answering every URL matching `pattern`.
	async fn route(&self, pattern: &str, response: MockResponse) -> Result<()>;

	/// Issues a request through the host's network stack.
	async fn fetch(&self, request: SimulatedRequest) -> Result<MockResponse>;
}

/// A command event with its session placeholder resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedNetworkEvent {
	pub endpoint: String,
	pub command: Option<String>,
	pub method: String,
	pub body: Option<Value>,
	pub result: Option<Value>,
}

impl CapturedNetworkEvent {
	/// Resolves `event`, or `None` for events that are not replayed.
	pub fn from_event(event: CommandEvent, session_id: &str) -> Option<Self> {
		let endpoint = event.endpoint.filter(|e| !e.is_empty())?;
		if event.command.as_deref() == Some("deleteSession") {
			return None;
		}
		Some(Self {
			endpoint: endpoint.replace(":sessionId", session_id),
			command: event.command,
			method: event.method,
			body: event.body,
			result: event.result,
		})
	}

	/// `**/<endpoint without leading slash>`
	pub fn route_pattern(&self) -> String {
		format!("**/{}", self.endpoint.trim_start_matches('/'))
	}

	pub fn mock_response(&self, session_id: &str) -> Result<MockResponse> {
		let body = match &self.result {
			Some(result) if !result.is_null() => serde_json::to_string(result)?,
			_ => "{}".to_string(),
		};
		Ok(MockResponse::json(body)
			.with_header("Content-Type", "application/json")
			.with_header("webdriver-command", self.command.as_deref().unwrap_or("unknown"))
			.with_header("webdriver-method", self.method.as_str())
			.with_header("webdriver-session-id", session_id))
	}

	pub fn request(&self) -> Result<SimulatedRequest> {
		let path = if self.endpoint.starts_with('/') {
			self.endpoint.clone()
		} else {
			format!("/{}", self.endpoint)
		};
		let mut request = SimulatedRequest::new(self.method.clone(), format!("{MOCK_ORIGIN}{path}"));
		request
			.headers
			.insert("Content-Type".to_string(), "application/json".to_string());

		let sends_body = !matches!(self.method.to_ascii_uppercase().as_str(), "GET" | "HEAD");
		if let (true, Some(body)) = (sends_body, &self.body) {
			request.body = Some(serde_json::to_string(body)?);
		}
		Ok(request)
	}
}

/// Captures one test's command events and replays them at the end.
pub struct NetworkBridge {
	network: Arc<dyn HostNetwork>,
	session_id: String,
	captured: Arc<Mutex<Vec<CapturedNetworkEvent>>>,
	stop: Option<oneshot::Sender<()>>,
	task: Option<JoinHandle<()>>,
}

impl NetworkBridge {
	pub fn new(network: Arc<dyn HostNetwork>) -> Self {
		Self {
			network,
			session_id: UNKNOWN_SESSION.to_string(),
			captured: Arc::new(Mutex::new(Vec::new())),
			stop: None,
			task: None,
		}
	}

	pub fn is_capturing(&self) -> bool {
		self.task.is_some()
	}

	/// Events collected so far.
	pub fn captured(&self) -> Vec<CapturedNetworkEvent> {
		self.captured.lock().clone()
	}

	/// Subscribes to the session's command events.
	///
	/// Returns `false` when the session does not report events. Calling it
	/// again while capturing is a no-op.
	pub fn start_capturing(&mut self, session: &dyn RemoteSession) -> bool {
		if self.is_capturing() {
			return true;
		}
		let Some(events) = session.command_events() else {
			debug!(target = "pwio", "session reports no command events, network capture disabled");
			return false;
		};

		self.session_id = session
			.session_id()
			.filter(|id| !id.is_empty())
			.unwrap_or_else(|| UNKNOWN_SESSION.to_string());

		let (stop_tx, stop_rx) = oneshot::channel();
		self.stop = Some(stop_tx);
		self.task = Some(tokio::spawn(collect_events(
			events,
			self.session_id.clone(),
			Arc::clone(&self.captured),
			stop_rx,
		)));
		debug!(target = "pwio", session = %self.session_id, "network capture started");
		true
	}

	/// Stops capturing and replays every collected event.
	///
	/// Returns the number of events replayed without error. Replay failures
	/// are logged and skipped. Collected events are discarded either way.
	pub async fn stop_capturing(&mut self) -> usize {
		if let Some(stop) = self.stop.take() {
			let _ = stop.send(());
		}
		if let Some(mut task) = self.task.take() {
			if tokio::time::timeout(CAPTURE_SHUTDOWN_GRACE, &mut task).await.is_err() {
				warn!(target = "pwio", "network capture did not stop in time, aborting");
				task.abort();
			}
		}

		let events = std::mem::take(&mut *self.captured.lock());
		let mut replayed = 0;
		for event in &events {
			match self.replay(event).await {
				Ok(()) => replayed += 1,
				Err(err) => {
					warn!(target = "pwio", endpoint = %event.endpoint, error = %err, "network replay failed");
				}
			}
		}
		debug!(target = "pwio", replayed, total = events.len(), "network replay finished");
		replayed
	}

	async fn replay(&self, event: &CapturedNetworkEvent) -> Result<()> {
		self.network
			.route(&event.route_pattern(), event.mock_response(&self.session_id)?)
			.await?;
		self.network.fetch(event.request()?).await?;
		Ok(())
	}
}

impl Drop for NetworkBridge {
	fn drop(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}
}

async fn collect_events(
	mut events: broadcast::Receiver<CommandEvent>,
	session_id: String,
	captured: Arc<Mutex<Vec<CapturedNetworkEvent>>>,
	mut stop: oneshot::Receiver<()>,
) {
	let push = |event: CommandEvent| {
		if let Some(event) = CapturedNetworkEvent::from_event(event, &session_id) {
			captured.lock().push(event);
		}
	};

	loop {
		tokio::select! {
			biased;
			_ = &mut stop => {
				// Drain what was sent before the stop signal.
				loop {
					match events.try_recv() {
						Ok(event) => push(event),
						Err(TryRecvError::Lagged(skipped)) => {
							warn!(target = "pwio", skipped, "network capture lagged");
						}
						Err(_) => break,
					}
				}
				break;
			}
			received = events.recv() => match received {
				Ok(event) => push(event),
				Err(RecvError::Lagged(skipped)) => {
					warn!(target = "pwio", skipped, "network capture lagged");
				}
				Err(RecvError::Closed) => break,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::testing::MockSession;

	#[test]
	fn events_without_endpoint_or_delete_are_skipped() {
		let mut no_endpoint = CommandEvent::new("GET", "");
		no_endpoint.endpoint = None;
		assert!(CapturedNetworkEvent::from_event(no_endpoint, "s").is_none());

		let delete = CommandEvent::new("DELETE", "/session/:sessionId").with_command("deleteSession");
		assert!(CapturedNetworkEvent::from_event(delete, "s").is_none());

		let url = CommandEvent::new("POST", "/session/:sessionId/url").with_command("navigateTo");
		let captured = CapturedNetworkEvent::from_event(url, "abc").unwrap();
		assert_eq!(captured.endpoint, "/session/abc/url");
		assert_eq!(captured.route_pattern(), "**/session/abc/url");
	}

	#[test]
	fn mock_response_carries_webdriver_headers() {
		let event = CapturedNetworkEvent::from_event(
			CommandEvent::new("GET", "/session/:sessionId/title").with_result(json!("Home")),
			"abc",
		)
		.unwrap();

		let response = event.mock_response("abc").unwrap();
		assert_eq!(response.status, 200);
		assert_eq!(response.body, "\"Home\"");
		assert_eq!(response.headers["webdriver-command"], "unknown");
		assert_eq!(response.headers["webdriver-method"], "GET");
		assert_eq!(response.headers["webdriver-session-id"], "abc");

		let empty = CapturedNetworkEvent::from_event(CommandEvent::new("GET", "/status"), "abc").unwrap();
		assert_eq!(empty.mock_response("abc").unwrap().body, "{}");
	}

	#[test]
	fn request_body_only_for_methods_that_send_one() {
		let post = CapturedNetworkEvent::from_event(
			CommandEvent::new("POST", "/session/:sessionId/url").with_body(json!({"url": "https://a.test"})),
			"abc",
		)
		.unwrap();
		let request = post.request().unwrap();
		assert_eq!(request.url, "https://playwrightio/session/abc/url");
		assert_eq!(request.body.as_deref(), Some("{\"url\":\"https://a.test\"}"));

		let get = CapturedNetworkEvent::from_event(
			CommandEvent::new("GET", "/session/:sessionId/url").with_body(json!({})),
			"abc",
		)
		.unwrap();
		assert!(get.request().unwrap().body.is_none());
	}

	#[tokio::test]
	async fn captured_events_are_replayed_and_discarded() {
		let session = MockSession::browser("s-9");
		let table = Arc::new(RouteTable::new());
		let mut bridge = NetworkBridge::new(table.clone());

		assert!(bridge.start_capturing(&session));
		session.emit(CommandEvent::new("POST", "/session/:sessionId/url").with_command("navigateTo"));
		session.emit(CommandEvent::new("DELETE", "/session/:sessionId").with_command("deleteSession"));
		session.emit(
			CommandEvent::new("GET", "/session/:sessionId/title")
				.with_command("getTitle")
				.with_result(json!("Home")),
		);

		assert_eq!(bridge.stop_capturing().await, 2);
		assert!(bridge.captured().is_empty());
		assert_eq!(table.patterns(), vec!["**/session/s-9/url", "**/session/s-9/title"]);

		let urls: Vec<String> = table.requests().into_iter().map(|r| r.url).collect();
		assert_eq!(
			urls,
			vec!["https://playwrightio/session/s-9/url", "https://playwrightio/session/s-9/title"]
		);
	}

	#[tokio::test]
	async fn sessions_without_events_are_not_captured() {
		let session = MockSession::browser("s-1").without_events();
		let mut bridge = NetworkBridge::new(Arc::new(RouteTable::new()));
		assert!(!bridge.start_capturing(&session));
		assert_eq!(bridge.stop_capturing().await, 0);
	}
}
