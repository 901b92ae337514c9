//! Helpers shared by commands.

use std::path::Path;

use anyhow::Context;
use rivulet_config::{OperatorRegistry, SetupFile};

/// Loads and validates a setup file.
pub fn load_setup(path: &Path, registry: &OperatorRegistry) -> anyhow::Result<SetupFile> {
    let file = SetupFile::load(path).with_context(|| format!("loading {}", path.display()))?;
    file.validate(registry)
        .with_context(|| format!("checking {}", path.display()))?;
    Ok(file)
}

/// Formats seconds as `m:ss.mmm`.
pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor();
    format!("{}:{:06.3}", minutes as u64, seconds - minutes * 60.0)
}
