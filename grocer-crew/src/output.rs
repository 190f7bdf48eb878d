//! Output files

use std::path::Path;

use serde::Serialize;
use tracing::info;

use grocer_error::{Error, Result};

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value).map_err(|e| {
        Error::serialization_failed(e.to_string())
            .with_operation("output::write_json")
            .with_context("path", path.display().to_string())
            .set_source(e)
    })?;
    text.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::io_at(parent, e).with_operation("output::write_json"))?;
    }
    std::fs::write(path, text).map_err(|e| Error::io_at(path, e).with_operation("output::write_json"))?;

    info!(path = %path.display(), "wrote output");
    Ok(())
}
