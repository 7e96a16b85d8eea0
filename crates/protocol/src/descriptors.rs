//! Suite, test and result shapes expected by service plugins.
//!
//! The plugin ecosystem was written against a Mocha-style object model. These
//! descriptors reproduce that field set; they are built fresh for every hook
//! call and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Reference to an enclosing suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
	pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteDescriptor {
	pub title: String,
	pub full_title: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parent: Option<ParentRef>,
	pub file: String,
	/// Milliseconds
	pub duration: u64,
	pub pending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDescriptor {
	pub title: String,
	pub parent: ParentRef,
	/// `"<suite> - <test>"`
	pub full_title: String,
	/// `"<suite> <test> <test>"`
	pub full_name: String,
	pub description: String,
	pub file: String,
	/// Milliseconds
	pub duration: u64,
	pub pending: bool,
	pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retries {
	pub attempts: u32,
	pub limit: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
	pub name: String,
	pub message: String,
	pub stack: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDescriptor {
	pub passed: bool,
	/// Uppercased host status, `UNKNOWN` when absent.
	pub status: String,
	/// Milliseconds
	pub duration: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ErrorDescriptor>,
	/// Stringified error cause, empty when there is none.
	pub exception: String,
	pub retries: Retries,
}
