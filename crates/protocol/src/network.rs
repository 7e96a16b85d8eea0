//! Command events emitted by the remote session client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One remote-protocol request/response pair, as reported by the client.
///
/// `endpoint` still contains the `:sessionId` placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandEvent {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub command: Option<String>,
	pub method: String,
	/// Request body
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
	/// Response value
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
}

impl CommandEvent {
	pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
		Self {
			method: method.into(),
			endpoint: Some(endpoint.into()),
			..Default::default()
		}
	}

	pub fn with_command(mut self, command: impl Into<String>) -> Self {
		self.command = Some(command.into());
		self
	}

	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);
		self
	}

	pub fn with_result(mut self, result: Value) -> Self {
		self.result = Some(result);
		self
	}
}
