//! Connection settings for the remote session client.

use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;

/// Remote client log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	Debug,
	Info,
	Warn,
	Error,
	/// No client output at all
	#[default]
	Silent,
}

impl LogLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			LogLevel::Error => "error",
			LogLevel::Silent => "silent",
		}
	}
}

/// Connection parameters for the remote automation server.
///
/// Every field is optional so project and test scopes can be merged field by
/// field; unset fields are filled in during session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
	/// URL scheme (`http` / `https`)
	#[serde(skip_serializing_if = "Option::is_none")]
	pub protocol: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub hostname: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	/// Base path of the WebDriver endpoint
	#[serde(skip_serializing_if = "Option::is_none")]
	pub path: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub log_level: Option<LogLevel>,
	/// Cloud provider user name
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user: Option<String>,
	/// Cloud provider access key
	#[serde(skip_serializing_if = "Option::is_none")]
	pub key: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub base_url: Option<String>,
}

impl ConnectionConfig {
	/// Returns `self` with every field set in `overrides` replaced.
	pub fn merged(&self, overrides: &ConnectionConfig) -> ConnectionConfig {
		ConnectionConfig {
			protocol: overrides.protocol.clone().or_else(|| self.protocol.clone()),
			hostname: overrides.hostname.clone().or_else(|| self.hostname.clone()),
			port: overrides.port.or(self.port),
			path: overrides.path.clone().or_else(|| self.path.clone()),
			log_level: overrides.log_level.or(self.log_level),
			user: overrides.user.clone().or_else(|| self.user.clone()),
			key: overrides.key.clone().or_else(|| self.key.clone()),
			base_url: overrides.base_url.clone().or_else(|| self.base_url.clone()),
		}
	}
}

/// Everything the remote client needs to open a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
	#[serde(flatten)]
	pub connection: ConnectionConfig,
	pub capabilities: Capabilities,
}

impl RemoteConfig {
	pub fn new(connection: ConnectionConfig, capabilities: Capabilities) -> Self {
		Self {
			connection,
			capabilities,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_prefers_override_fields() {
		let project = ConnectionConfig {
			hostname: Some("hub.example.com".to_string()),
			port: Some(4444),
			log_level: Some(LogLevel::Info),
			..Default::default()
		};
		let test = ConnectionConfig {
			port: Some(4723),
			..Default::default()
		};

		let merged = project.merged(&test);
		assert_eq!(merged.hostname.as_deref(), Some("hub.example.com"));
		assert_eq!(merged.port, Some(4723));
		assert_eq!(merged.log_level, Some(LogLevel::Info));
	}

	#[test]
	fn remote_config_flattens_connection() {
		let config = RemoteConfig::new(
			ConnectionConfig {
				log_level: Some(LogLevel::Silent),
				..Default::default()
			},
			Capabilities::new().with("browserName", "chrome"),
		);

		let value = serde_json::to_value(&config).unwrap();
		assert_eq!(value["logLevel"], "silent");
		assert_eq!(value["capabilities"]["browserName"], "chrome");
	}
}
