//! Remote session client seam.
//!
//! The engine never speaks the remote automation protocol itself. A client
//! implementation (WebDriver, Appium, a cloud grid) plugs in through
//! [`RemoteClient`], and every command flows through [`RemoteSession`] and
//! [`RemoteElement`]. Convenience commands are provided methods that route
//! through [`RemoteSession::execute`] / [`RemoteElement::execute`], so a
//! decorator only has to intercept those.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pwio_protocol::{Capabilities, CommandEvent, RemoteConfig};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::error::Result;

/// Opens and closes remote sessions.
#[async_trait]
pub trait RemoteClient: Send + Sync {
	/// Opens a session for `config`.
	///
	/// # Errors
	///
	/// Any error is reported to the caller as a session-open failure.
	async fn open(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteSession>>;

	/// Ends the session on the remote end.
	async fn close(&self, session: &dyn RemoteSession) -> Result<()>;
}

/// A script sent for remote execution.
///
/// Carries a callable-style descriptor so instrumentation can label it the
/// way the plugin ecosystem does (`Function (name)`, `AsyncFunction (anonymous)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
	pub source: String,
	pub name: Option<String>,
	pub is_async: bool,
}

impl Script {
	pub fn new(source: impl Into<String>) -> Self {
		Self {
			source: source.into(),
			name: None,
			is_async: false,
		}
	}

	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn asynchronous(mut self) -> Self {
		self.is_async = true;
		self
	}
}

impl fmt::Display for Script {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = if self.is_async { "AsyncFunction" } else { "Function" };
		match &self.name {
			Some(name) => write!(f, "{kind} ({name})"),
			None => write!(f, "{kind} (anonymous)"),
		}
	}
}

/// Options for on-device screen recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeRecordingOptions {
	/// Container extension (`mp4`, `mov`, `webm`)
	pub video_type: String,
	/// Preset name or raw quality factor
	pub video_quality: String,
	/// Seconds, within `[1, 1800]`
	pub time_limit: u32,
}

/// An open remote automation session.
#[async_trait]
pub trait RemoteSession: Send + Sync {
	/// Session id assigned by the remote end.
	fn session_id(&self) -> Option<String>;

	/// Capabilities the session was opened with.
	fn capabilities(&self) -> &Capabilities;

	fn is_android(&self) -> bool {
		self.capabilities().is_android()
	}

	fn is_ios(&self) -> bool {
		self.capabilities().is_ios()
	}

	fn is_mobile(&self) -> bool {
		self.is_android() || self.is_ios()
	}

	/// Desktop browser sessions are recorded by local frame capture.
	fn is_desktop_browser(&self) -> bool {
		!self.is_mobile()
	}

	/// Runs a named protocol command.
	async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Value>;

	async fn execute_script(&self, script: &Script, args: Vec<Value>) -> Result<Value>;

	/// Finds the first element matching `selector` (`$`).
	async fn find_element(&self, selector: &str) -> Result<Arc<dyn RemoteElement>>;

	/// Finds every element matching `selector` (`$$`).
	async fn find_elements(&self, selector: &str) -> Result<Vec<Arc<dyn RemoteElement>>>;

	/// Base64-encoded PNG of the current viewport.
	async fn take_screenshot(&self) -> Result<String>;

	async fn start_recording_screen(&self, options: &NativeRecordingOptions) -> Result<()>;

	/// Stops on-device recording, returning the base64-encoded video.
	async fn stop_recording_screen(&self) -> Result<String>;

	/// Stream of request/response pairs, if the client reports them.
	fn command_events(&self) -> Option<broadcast::Receiver<CommandEvent>> {
		None
	}

	async fn url(&self, url: &str) -> Result<()> {
		self.execute("url", vec![json!(url)]).await.map(|_| ())
	}

	async fn get_url(&self) -> Result<String> {
		let value = self.execute("getUrl", Vec::new()).await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn get_title(&self) -> Result<String> {
		let value = self.execute("getTitle", Vec::new()).await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn pause(&self, millis: u64) -> Result<()> {
		self.execute("pause", vec![json!(millis)]).await.map(|_| ())
	}
}

/// An element handle returned by `$` / `$$`.
#[async_trait]
pub trait RemoteElement: Send + Sync {
	fn selector(&self) -> &str;

	/// Runs a command on this element.
	async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Value>;

	async fn click(&self) -> Result<()> {
		self.execute("click", Vec::new()).await.map(|_| ())
	}

	async fn set_value(&self, value: &str) -> Result<()> {
		self.execute("setValue", vec![json!(value)]).await.map(|_| ())
	}

	async fn get_text(&self) -> Result<String> {
		let value = self.execute("getText", Vec::new()).await?;
		Ok(value.as_str().unwrap_or_default().to_string())
	}

	async fn is_displayed(&self) -> Result<bool> {
		let value = self.execute("isDisplayed", Vec::new()).await?;
		Ok(value.as_bool().unwrap_or(false))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn script_descriptor() {
		assert_eq!(Script::new("return 1").to_string(), "Function (anonymous)");
		assert_eq!(Script::new("x").named("scroll").to_string(), "Function (scroll)");
		assert_eq!(Script::new("x").asynchronous().to_string(), "AsyncFunction (anonymous)");
	}

	#[test]
	fn native_options_serialize_camel_case() {
		let options = NativeRecordingOptions {
			video_type: "mp4".into(),
			video_quality: "medium".into(),
			time_limit: 180,
		};
		let value = serde_json::to_value(&options).unwrap();
		assert_eq!(value, json!({"videoType": "mp4", "videoQuality": "medium", "timeLimit": 180}));
	}
}
