//! pwio - remote automation sessions inside a host test runner
//!
//! Drives a WebDriver/Appium-style session from each test of a host test
//! framework while keeping service plugins written for another lifecycle
//! working. Per test, the engine:
//!
//! - resolves project and test options into one session config ([`config`])
//! - dispatches lifecycle hooks to service plugins, reshaping host test info
//!   into the suite/test/result descriptors they expect ([`services`],
//!   [`hooks`], [`adapter`])
//! - opens, instruments and closes the remote session ([`session`],
//!   [`instrument`])
//! - records the screen natively or by frame capture ([`recording`])
//! - replays remote-protocol traffic into the host's network log ([`network`])
//!
//! # Architecture
//!
//! ```text
//! Worker ──────────────► ServiceHookRegistry (launcher + worker services)
//!   │ run_test                  ▲
//!   ▼                           │ Hooks
//! Fixture ─► SessionManager ────┤
//!   │            │ open/close   │
//!   │            ▼              │
//!   │        RemoteClient ──► InstrumentedSession ──► test body (TestContext)
//!   │            │
//!   │            └──► RecordingSession (native | frames + encoder)
//!   └──► NetworkBridge ──► HostNetwork
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod fixture;
pub mod hooks;
pub mod instrument;
pub mod logging;
pub mod network;
pub mod recording;
pub mod remote;
pub mod report;
pub mod services;
pub mod session;
pub mod testing;
pub mod worker;

pub use config::{ProjectOptions, ResolvedOptions, RunnerConfig, TestOptions, resolve};
pub use error::{Error, HookFailure, Result};
pub use fixture::{Fixture, TestContext};
pub use hooks::Hooks;
pub use instrument::{InstrumentedElement, InstrumentedSession};
pub use logging::init_logging;
pub use network::{HostNetwork, MockResponse, NetworkBridge, RouteTable, SimulatedRequest};
pub use recording::{RecorderSettings, RecordingSession};
pub use remote::{RemoteClient, RemoteElement, RemoteSession, Script};
pub use report::{Annotation, Attachment, MemoryReporter, Reporter};
pub use services::{Service, ServiceCatalog, ServiceDefinition, ServiceHookRegistry};
pub use session::{SessionManager, SessionState};
pub use worker::{Worker, WorkerResults};
// Shared data shapes
pub use pwio_protocol::{
	Capabilities, ConnectionConfig, HookName, HookScope, LogLevel, Quality, RecorderOptions, RecordingMode,
	RemoteConfig, ServiceEntry, TestError, TestInfo, TestStatus, TraceMode, VideoType,
};
