//! In-memory host network with glob route matching.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::{HostNetwork, MockResponse, SimulatedRequest};
use crate::error::{Error, Result};

/// Compiled URL glob.
///
/// Invalid patterns fall back to literal matching.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
	pattern: glob::Pattern,
}

impl RouteMatcher {
	pub fn new(pattern: &str) -> Self {
		let pattern = glob::Pattern::new(pattern).unwrap_or_else(|_| {
			glob::Pattern::new(&glob::Pattern::escape(pattern)).expect("escaped pattern is always valid")
		});
		Self { pattern }
	}

	pub fn is_match(&self, url: &str) -> bool {
		self.pattern.matches(url)
	}

	pub fn as_str(&self) -> &str {
		self.pattern.as_str()
	}
}

/// Routes and the requests answered by them.
///
/// When several routes match a URL the most recently registered one answers.
#[derive(Debug, Default)]
pub struct RouteTable {
	routes: Mutex<Vec<(RouteMatcher, MockResponse)>>,
	requests: Mutex<Vec<SimulatedRequest>>,
}

impl RouteTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registered patterns, oldest first.
	pub fn patterns(&self) -> Vec<String> {
		self.routes
			.lock()
			.iter()
			.map(|(matcher, _)| matcher.as_str().to_string())
			.collect()
	}

	/// Requests received so far, including unmatched ones.
	pub fn requests(&self) -> Vec<SimulatedRequest> {
		self.requests.lock().clone()
	}

	/// Response the table would give for `url`.
	pub fn lookup(&self, url: &str) -> Option<MockResponse> {
		self.routes
			.lock()
			.iter()
			.rev()
			.find(|(matcher, _)| matcher.is_match(url))
			.map(|(_, response)| response.clone())
	}
}

#[async_trait]
impl HostNetwork for RouteTable {
	async fn route(&self, pattern: &str, response: MockResponse) -> Result<()> {
		debug!(target = "pwio", pattern, "route registered");
		self.routes.lock().push((RouteMatcher::new(pattern), response));
		Ok(())
	}

	async fn fetch(&self, request: SimulatedRequest) -> Result<MockResponse> {
		let url = request.url.clone();
		self.requests.lock().push(request);
		self.lookup(&url)
			.ok_or_else(|| Error::Network(format!("no route matches {url}")))
	}
}
