//! Fixed hook vocabulary of the service-plugin ecosystem.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which plugin instance set a hook is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookScope {
	/// One instance per worker process
	Launcher,
	/// One instance per test session
	Worker,
}

/// Lifecycle hook names, declared in session-phase order.
///
/// The derived `Ord` follows declaration order, so sorting a list of hook
/// names yields the order in which they fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookName {
	OnPrepare,
	OnWorkerStart,
	BeforeSession,
	Before,
	BeforeSuite,
	BeforeTest,
	BeforeHook,
	AfterHook,
	AfterTest,
	AfterSuite,
	After,
	AfterSession,
	OnWorkerEnd,
	OnComplete,
}

impl HookName {
	/// Every hook, in phase order.
	pub const ALL: [HookName; 14] = [
		HookName::OnPrepare,
		HookName::OnWorkerStart,
		HookName::BeforeSession,
		HookName::Before,
		HookName::BeforeSuite,
		HookName::BeforeTest,
		HookName::BeforeHook,
		HookName::AfterHook,
		HookName::AfterTest,
		HookName::AfterSuite,
		HookName::After,
		HookName::AfterSession,
		HookName::OnWorkerEnd,
		HookName::OnComplete,
	];

	/// Name as spelled by the plugin ecosystem.
	pub fn as_str(self) -> &'static str {
		match self {
			HookName::OnPrepare => "onPrepare",
			HookName::OnWorkerStart => "onWorkerStart",
			HookName::BeforeSession => "beforeSession",
			HookName::Before => "before",
			HookName::BeforeSuite => "beforeSuite",
			HookName::BeforeTest => "beforeTest",
			HookName::BeforeHook => "beforeHook",
			HookName::AfterHook => "afterHook",
			HookName::AfterTest => "afterTest",
			HookName::AfterSuite => "afterSuite",
			HookName::After => "after",
			HookName::AfterSession => "afterSession",
			HookName::OnWorkerEnd => "onWorkerEnd",
			HookName::OnComplete => "onComplete",
		}
	}

	pub fn scope(self) -> HookScope {
		match self {
			HookName::OnPrepare | HookName::OnWorkerStart | HookName::OnWorkerEnd | HookName::OnComplete => {
				HookScope::Launcher
			}
			_ => HookScope::Worker,
		}
	}

	pub fn parse(name: &str) -> Option<HookName> {
		HookName::ALL.into_iter().find(|hook| hook.as_str() == name)
	}
}

impl fmt::Display for HookName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn all_is_sorted_by_phase() {
		let mut sorted = HookName::ALL;
		sorted.sort();
		assert_eq!(sorted, HookName::ALL);
	}

	#[test]
	fn launcher_hooks_bracket_worker_hooks() {
		let scopes: Vec<HookScope> = HookName::ALL.iter().map(|h| h.scope()).collect();
		assert_eq!(scopes[..2], [HookScope::Launcher, HookScope::Launcher]);
		assert_eq!(scopes[12..], [HookScope::Launcher, HookScope::Launcher]);
		assert!(scopes[2..12].iter().all(|s| *s == HookScope::Worker));
	}

	#[test]
	fn parse_round_trips_ecosystem_names() {
		assert_eq!(HookName::parse("beforeTest"), Some(HookName::BeforeTest));
		assert_eq!(HookName::parse("onComplete"), Some(HookName::OnComplete));
		assert_eq!(HookName::parse("beforeCommand"), None);
		assert_eq!(serde_json::to_value(HookName::AfterSession).unwrap(), "afterSession");
	}
}
