//! Project and test options, and their resolution into one session config.
//!
//! Options come from two scopes: project-level defaults (loaded once per
//! worker) and per-test overrides. Test values win; objects are replaced at
//! their top-level key rather than deep-merged. Connection settings are the one
//! exception and merge field by field.

use std::path::Path;

use pwio_protocol::{Capabilities, ConnectionConfig, RecordingMode, RemoteConfig, ServiceEntry};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Framework name reported to plugins.
pub const FRAMEWORK: &str = "mocha";

/// Project-scoped defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectOptions {
	#[serde(default)]
	pub config: ConnectionConfig,
	#[serde(default)]
	pub capabilities: Capabilities,
	#[serde(default)]
	pub services: Vec<ServiceEntry>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub recording_screen: Option<RecordingMode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub take_screenshot: Option<bool>,
}

impl ProjectOptions {
	/// Loads project options from a JSON file.
	///
	/// # Errors
	///
	/// Returns [`Error::Config`] if the file cannot be read or parsed.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path)
			.map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
		let options: ProjectOptions = serde_json::from_str(&text)
			.map_err(|e| Error::Config(format!("invalid options in {}: {e}", path.display())))?;
		debug!(
			target = "pwio",
			path = %path.display(),
			services = options.services.len(),
			"loaded project options"
		);
		Ok(options)
	}
}

/// Test-scoped overrides. Absent fields inherit the project value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOptions {
	#[serde(default)]
	pub config: ConnectionConfig,
	#[serde(default)]
	pub capabilities: Capabilities,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub services: Option<Vec<ServiceEntry>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub recording_screen: Option<RecordingMode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub take_screenshot: Option<bool>,
	/// Host framework base URL; wins over `config.baseUrl`.
	#[serde(default, rename = "baseURL", skip_serializing_if = "Option::is_none")]
	pub base_url: Option<String>,
}

/// Options after project and test scopes are merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOptions {
	pub connection: ConnectionConfig,
	pub capabilities: Capabilities,
	pub services: Vec<ServiceEntry>,
	pub recording: RecordingMode,
	pub take_screenshot: bool,
}

impl ResolvedOptions {
	pub fn remote_config(&self) -> RemoteConfig {
		RemoteConfig::new(self.connection.clone(), self.capabilities.clone())
	}
}

/// Merges project defaults with test overrides.
pub fn resolve(project: &ProjectOptions, test: &TestOptions) -> ResolvedOptions {
	let mut connection = project.config.merged(&test.config);
	if test.base_url.is_some() {
		connection.base_url = test.base_url.clone();
	}

	ResolvedOptions {
		connection,
		capabilities: project.capabilities.merged(&test.capabilities),
		services: test.services.clone().unwrap_or_else(|| project.services.clone()),
		recording: merge_recording(project.recording_screen.as_ref(), test.recording_screen.as_ref()),
		take_screenshot: test.take_screenshot.or(project.take_screenshot).unwrap_or(false),
	}
}

/// Three-way merge of the recording setting.
///
/// | project          | test      | result          |
/// |------------------|-----------|-----------------|
/// | any              | absent    | project or Off  |
/// | absent / Off     | present   | test            |
/// | Custom(a)        | Custom(b) | Custom(a + b)   |
/// | other            | present   | test            |
pub fn merge_recording(project: Option<&RecordingMode>, test: Option<&RecordingMode>) -> RecordingMode {
	match (project, test) {
		(project, None) => project.cloned().unwrap_or_default(),
		(Some(RecordingMode::Custom(base)), Some(RecordingMode::Custom(overrides))) => {
			RecordingMode::Custom(base.merged(overrides))
		}
		(_, Some(test)) => test.clone(),
	}
}

/// Configuration handed to plugins as the `config` hook argument.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
	#[serde(flatten)]
	pub connection: ConnectionConfig,
	pub capabilities: Vec<Capabilities>,
	pub services: Vec<ServiceEntry>,
	pub framework: String,
	pub specs: Vec<String>,
}

impl RunnerConfig {
	/// Worker-level config built from project options.
	pub fn for_project(project: &ProjectOptions, specs: Vec<String>) -> Self {
		Self {
			connection: project.config.clone(),
			capabilities: vec![project.capabilities.clone()],
			services: project.services.clone(),
			framework: FRAMEWORK.to_string(),
			specs,
		}
	}

	/// Worker config with a test's resolved options spread over it.
	pub fn with_test(&self, resolved: &ResolvedOptions) -> Self {
		Self {
			connection: self.connection.merged(&resolved.connection),
			capabilities: vec![resolved.capabilities.clone()],
			services: resolved.services.clone(),
			framework: self.framework.clone(),
			specs: self.specs.clone(),
		}
	}

	/// First capability set, or an empty map.
	pub fn primary_capabilities(&self) -> Capabilities {
		self.capabilities.first().cloned().unwrap_or_default()
	}
}
