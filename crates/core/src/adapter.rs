//! Builds the suite/test/result shapes plugins expect from host test info.
//!
//! The host framework has no suite object and reports results differently
//! from the Mocha-style model the plugin ecosystem was written against, so
//! each hook call gets freshly synthesized descriptors.

use pwio_protocol::{
	ErrorDescriptor, ParentRef, ResultDescriptor, Retries, SuiteDescriptor, TestDescriptor, TestInfo, TestStatus,
};

/// Title used when nothing better is known.
pub const DEFAULT_SUITE: &str = "Default Suite";

/// Resolves the suite title for a test.
///
/// Order: enclosing describe block, project name, file stem before the first
/// `.`, then [`DEFAULT_SUITE`].
pub fn suite_title(info: &TestInfo) -> String {
	if let Some(parent) = info.parent_title() {
		return parent.to_string();
	}
	if let Some(project) = info.project_name.as_deref().filter(|p| !p.trim().is_empty()) {
		return project.to_string();
	}
	if let Some(stem) = file_stem(info) {
		return stem;
	}
	DEFAULT_SUITE.to_string()
}

fn file_stem(info: &TestInfo) -> Option<String> {
	let name = info.file.as_ref()?.file_name()?.to_str()?;
	let stem = name.split('.').next()?;
	(!stem.is_empty()).then(|| stem.to_string())
}

fn file_string(info: &TestInfo) -> String {
	info.file
		.as_ref()
		.map(|f| f.display().to_string())
		.unwrap_or_default()
}

fn duration_ms(info: &TestInfo) -> u64 {
	info.duration.as_millis() as u64
}

fn is_pending(info: &TestInfo) -> bool {
	info.status == Some(TestStatus::Skipped)
}

pub fn suite(info: &TestInfo) -> SuiteDescriptor {
	let title = suite_title(info);
	SuiteDescriptor {
		full_title: title.clone(),
		title,
		parent: None,
		file: file_string(info),
		duration: duration_ms(info),
		pending: is_pending(info),
	}
}

pub fn test(info: &TestInfo) -> TestDescriptor {
	let suite = suite_title(info);
	let title = info.title.clone();
	let state = match info.status {
		Some(TestStatus::Passed) => "passed",
		Some(TestStatus::Skipped) => "pending",
		Some(_) => "failed",
		None => "unknown",
	};

	TestDescriptor {
		full_title: format!("{suite} - {title}"),
		// The ecosystem's fullName repeats the test title.
		full_name: format!("{suite} {title} {title}"),
		description: title.clone(),
		parent: ParentRef { title: suite },
		title,
		file: file_string(info),
		duration: duration_ms(info),
		pending: is_pending(info),
		state: state.to_string(),
	}
}

pub fn result(info: &TestInfo) -> ResultDescriptor {
	let status = info
		.status
		.map(|s| s.as_str().to_uppercase())
		.unwrap_or_else(|| "UNKNOWN".to_string());

	let error = info.error.as_ref().map(|e| ErrorDescriptor {
		name: e.name.clone().unwrap_or_else(|| "Error".to_string()),
		message: e.message.clone().unwrap_or_else(|| "Unknown error".to_string()),
		stack: e.stack.clone().unwrap_or_default(),
	});
	let exception = info
		.error
		.as_ref()
		.and_then(|e| e.cause.clone())
		.unwrap_or_default();

	ResultDescriptor {
		passed: info.status == Some(TestStatus::Passed),
		status,
		duration: duration_ms(info),
		error,
		exception,
		retries: Retries {
			attempts: info.retry,
			limit: info.retries,
		},
	}
}
