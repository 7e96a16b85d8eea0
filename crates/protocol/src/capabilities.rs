//! Capability map describing what kind of remote session to open.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Capability key that marks a desktop browser session.
pub const BROWSER_NAME: &str = "browserName";
/// Capability key that marks a mobile browser driven through Appium.
pub const APPIUM_BROWSER_NAME: &str = "appium:browserName";
/// Capability key naming the target platform.
pub const PLATFORM_NAME: &str = "platformName";

/// Flat map of session capabilities (`platformName`, `appium:*`, vendor options).
///
/// Merging is top-level only: a key present in the override replaces the
/// whole value, nested objects included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
	/// Creates an empty capability map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true when no capability has been set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Inserts or replaces a capability.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.0.insert(key.into(), value.into());
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	/// Iterates capabilities in insertion-independent key order.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.0.iter()
	}

	/// Returns a new map with `overrides` spread over `self`.
	pub fn merged(&self, overrides: &Capabilities) -> Capabilities {
		let mut merged = self.0.clone();
		for (key, value) in &overrides.0 {
			merged.insert(key.clone(), value.clone());
		}
		Capabilities(merged)
	}

	/// Returns `platformName` as written, if it is a string.
	pub fn platform_name(&self) -> Option<&str> {
		self.0.get(PLATFORM_NAME).and_then(Value::as_str)
	}

	/// Desktop browser: `browserName` set and no Appium browser override.
	pub fn is_browser(&self) -> bool {
		self.contains(BROWSER_NAME) && !self.contains(APPIUM_BROWSER_NAME)
	}

	pub fn is_android(&self) -> bool {
		self.platform_name().is_some_and(|name| name.eq_ignore_ascii_case("android"))
	}

	pub fn is_ios(&self) -> bool {
		self.platform_name().is_some_and(|name| name.eq_ignore_ascii_case("ios"))
	}

	pub fn into_inner(self) -> Map<String, Value> {
		self.0
	}
}

impl From<Map<String, Value>> for Capabilities {
	fn from(map: Map<String, Value>) -> Self {
		Self(map)
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Capabilities {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
