//! Tracing subscriber setup for hosts that do not install their own.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter directives for a verbosity level.
///
/// - 0: errors only, engine chatter off
/// - 1: engine progress (`info`), encoder and plugin noise at `warn`
/// - 2+: everything at `debug`
pub fn filter_for(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "error,pwio=off,pwio_runtime=off",
		1 => "warn,pwio=info",
		_ => "debug",
	}
}

/// Installs a compact stderr subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(verbosity: u8) {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	let _ = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.try_init();
}
