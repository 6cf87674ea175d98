use std::fs::{self, OpenOptions};

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};

use crate::config::LogConfig;

/// Routes `log` output to the configured file; the terminal belongs to the
/// UI. `RUST_LOG` overrides the configured level. Without a file, logging
/// stays off.
pub fn init(cfg: &LogConfig) -> Result<()> {
    let Some(path) = cfg.file.as_ref() else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("log: create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("log: open {}", path.display()))?;

    let level = if cfg.level.trim().is_empty() {
        "info"
    } else {
        cfg.level.as_str()
    };
    let _ = Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init();
    Ok(())
}
