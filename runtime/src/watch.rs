//! Reload the runtime when its config file changes.

use crate::Runtime;
use parajit_config::hot_reload::{ConfigReloadEvent, watch_config};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Watch `dir` and call [`Runtime::reload`] on every config file change.
///
/// Returns once the watcher is installed. Reload failures are logged and the
/// task keeps watching; it ends when the watcher stops.
pub async fn reload_on_change(
    runtime: Arc<Runtime>,
    dir: &Path,
) -> Result<JoinHandle<()>, Box<dyn std::error::Error + Send + Sync>> {
    let (_tx, mut rx) = watch_config(dir).await?;

    match rx.recv().await {
        Some(ConfigReloadEvent::Ready) => {}
        Some(ConfigReloadEvent::Error { path, error }) => {
            return Err(format!("Failed to watch {:?}: {}", path, error).into());
        }
        other => {
            return Err(format!("Unexpected first watch event: {:?}", other).into());
        }
    }

    Ok(tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ConfigReloadEvent::Changed(path) | ConfigReloadEvent::Removed(path) => {
                    match runtime.reload() {
                        Ok(report) if report.applied => {
                            info!("Reloaded configuration after change to {:?}", path);
                        }
                        Ok(_) => debug!("Config file {:?} touched without changes", path),
                        Err(e) => error!("Configuration reload failed: {}", e),
                    }
                }
                ConfigReloadEvent::Error { path, error } => {
                    error!("Config watcher error on {:?}: {}", path, error);
                }
                ConfigReloadEvent::Ready => {}
            }
        }
    }))
}
