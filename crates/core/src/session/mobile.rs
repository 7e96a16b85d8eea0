//! Device session configuration.

use pwio_protocol::{LogLevel, RemoteConfig};
use tracing::debug;

/// Base of the per-worker device control port (`appium:systemPort` / `appium:wdaLocalPort`).
pub const CONTROL_PORT_BASE: u16 = 8210;
/// Base of the per-worker live preview port (`appium:mjpegServerPort`).
pub const LIVE_PREVIEW_PORT_BASE: u16 = 9110;

pub const DEFAULT_PROTOCOL: &str = "http";
pub const DEFAULT_HOSTNAME: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4723;

/// Applies per-worker ports and connection defaults.
///
/// Device sessions get ports offset by `worker_index` so parallel workers do
/// not collide on one host, and unset connection fields point at a local
/// server. All sessions default to a silent client log.
pub fn configure_remote(mut config: RemoteConfig, worker_index: u32, live_preview: bool) -> RemoteConfig {
	if !config.capabilities.is_browser() {
		let control_port = port_for(CONTROL_PORT_BASE, worker_index);
		let preview_port = port_for(LIVE_PREVIEW_PORT_BASE, worker_index);

		let connection = &mut config.connection;
		connection.protocol.get_or_insert_with(|| DEFAULT_PROTOCOL.to_string());
		connection.hostname.get_or_insert_with(|| DEFAULT_HOSTNAME.to_string());
		connection.port.get_or_insert(DEFAULT_PORT);

		let capabilities = &mut config.capabilities;
		if capabilities.is_android() {
			capabilities.insert("appium:systemPort", control_port);
		}
		if capabilities.is_ios() {
			capabilities.insert("appium:wdaLocalPort", control_port);
		}
		if live_preview {
			capabilities.insert("appium:mjpegServerPort", preview_port);
		}
		debug!(target = "pwio", worker_index, control_port, live_preview, "configured device session");
	}

	config.connection.log_level.get_or_insert(LogLevel::Silent);
	config
}

fn port_for(base: u16, worker_index: u32) -> u16 {
	u16::try_from(u32::from(base) + worker_index).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
	use pwio_protocol::{Capabilities, ConnectionConfig};
	use serde_json::json;

	use super::*;

	fn remote(capabilities: Capabilities) -> RemoteConfig {
		RemoteConfig::new(ConnectionConfig::default(), capabilities)
	}

	#[test]
	fn android_gets_system_port_and_local_server() {
		let config = configure_remote(remote(Capabilities::new().with("platformName", "Android")), 2, false);

		assert_eq!(config.capabilities.get("appium:systemPort"), Some(&json!(8212)));
		assert!(!config.capabilities.contains("appium:mjpegServerPort"));
		assert_eq!(config.connection.protocol.as_deref(), Some("http"));
		assert_eq!(config.connection.hostname.as_deref(), Some("127.0.0.1"));
		assert_eq!(config.connection.port, Some(4723));
		assert_eq!(config.connection.log_level, Some(LogLevel::Silent));
	}

	#[test]
	fn ios_with_trace_gets_wda_and_preview_ports() {
		let config = configure_remote(remote(Capabilities::new().with("platformName", "iOS")), 1, true);

		assert_eq!(config.capabilities.get("appium:wdaLocalPort"), Some(&json!(8211)));
		assert_eq!(config.capabilities.get("appium:mjpegServerPort"), Some(&json!(9111)));
		assert!(!config.capabilities.contains("appium:systemPort"));
	}

	#[test]
	fn explicit_connection_fields_are_kept() {
		let mut config = remote(Capabilities::new().with("platformName", "Android"));
		config.connection.hostname = Some("device-farm".into());
		config.connection.log_level = Some(LogLevel::Debug);

		let config = configure_remote(config, 0, false);
		assert_eq!(config.connection.hostname.as_deref(), Some("device-farm"));
		assert_eq!(config.connection.port, Some(4723));
		assert_eq!(config.connection.log_level, Some(LogLevel::Debug));
	}

	#[test]
	fn browsers_only_get_log_level() {
		let caps = Capabilities::new().with("browserName", "chrome");
		let config = configure_remote(remote(caps.clone()), 5, true);

		assert_eq!(config.capabilities, caps);
		assert!(config.connection.hostname.is_none());
		assert_eq!(config.connection.log_level, Some(LogLevel::Silent));
	}

	#[test]
	fn mobile_browser_is_a_device_session() {
		let caps = Capabilities::new()
			.with("platformName", "Android")
			.with("browserName", "chrome")
			.with("appium:browserName", "chrome");
		let config = configure_remote(remote(caps), 0, false);
		assert_eq!(config.capabilities.get("appium:systemPort"), Some(&json!(8210)));
	}
}
