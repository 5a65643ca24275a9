//! Operator subcommands. Each opens the stores itself, so they also work
//! while no server is running.

pub mod cat;
pub mod doctor;
pub mod ls;
pub mod rebuild;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use relfs::config::RelfsConfig;
use relfs::engine::Engine;

/// Open the engine for a one-shot command.
fn open_engine(config: &RelfsConfig) -> Result<Engine> {
    Engine::open(config.clone()).with_context(|| {
        format!(
            "failed to open relfs data in {}",
            config.resolved_data_dir().display()
        )
    })
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
