use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const QUIET_DEPS: &str = "lance=warn,lancedb=warn,tantivy=warn";

/// `RUST_LOG` wins; otherwise `-v` raises the level from info.
pub fn init(verbose: u8, logfile: Option<&Path>) -> Result<()> {
	let level = match verbose {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{level},{QUIET_DEPS}")));
	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
	let installed = match logfile {
		Some(path) => {
			let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
			builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
		}
		None => builder.with_writer(std::io::stderr).try_init(),
	};
	installed.map_err(|e| anyhow!("installing log subscriber: {e}"))
}
