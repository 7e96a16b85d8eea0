//! Data shapes for the pwio orchestration engine.
//!
//! This crate contains the serde-serializable types that cross component
//! boundaries: capability maps and connection settings handed to the remote
//! session client, the hook vocabulary and descriptor shapes consumed by
//! service plugins, and the host framework's test info.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No I/O, no async, behavior limited to small predicates and merges
//! - **Wire-shaped**: Field names serialize the way the plugin ecosystem expects them
//! - **Stable**: Changes only when a consumer's expected shape changes
//!
//! Orchestration lives in `pwio`.

pub mod capabilities;
pub mod config;
pub mod descriptors;
pub mod hooks;
pub mod network;
pub mod recording;
pub mod service;
pub mod test_info;

pub use capabilities::*;
pub use config::*;
pub use descriptors::*;
pub use hooks::*;
pub use network::*;
pub use recording::*;
pub use service::*;
pub use test_info::*;
