//! pwio runtime - external encoder process lifecycle
//!
//! Screen recordings captured as frame sequences are turned into a video by an
//! external encoder (ffmpeg). This crate owns everything about that process:
//!
//! - **Discovery**: Locating the encoder binary ([`encoder`])
//! - **Execution**: Spawning it without a shell, capturing stdio, and killing
//!   it when it exceeds its wall-clock budget ([`process`])
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │    pwio     │  Recording engine builds the argument list
//! └──────┬──────┘
//!        │ EncoderProcess::run
//! ┌──────▼───────┐
//! │ pwio-runtime │  This crate
//! │  ┌────────┐  │
//! │  │ Locate │  │  env override, PATH, common locations
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Spawn  │  │  piped stdio, timeout, SIGKILL
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod encoder;
pub mod error;
pub mod process;

pub use encoder::{ENCODER_PATH_ENV, get_encoder_executable};
pub use error::{Error, Result};
pub use process::{EncoderOutput, EncoderProcess};
