//! # Configuration Hot Reload
//!
//! Watches the config file directory and reports changes to the well-known
//! config file names, so the owner can call `reload()` on its store.

use crate::file_loader::CONFIG_FILE_NAMES;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing::{error, info, warn};

/// Configuration reload event.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigReloadEvent {
    /// The watcher is installed; later changes will be reported.
    Ready,

    /// A config file was created or modified
    Changed(PathBuf),

    /// A config file was removed
    Removed(PathBuf),

    /// Watching failed
    Error {
        path: PathBuf,
        error: String,
    },
}

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| CONFIG_FILE_NAMES.contains(&name))
}

/// Watch `dir` for changes to the config file and emit reload events.
///
/// ## Usage
/// ```rust,no_run
/// use parajit_config::hot_reload::{ConfigReloadEvent, watch_config};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///     let (_tx, mut rx) = watch_config(std::path::Path::new(".")).await?;
///
///     while let Some(event) = rx.recv().await {
///         if let ConfigReloadEvent::Changed(path) = event {
///             println!("Config changed: {:?}", path);
///         }
///     }
///     Ok(())
/// }
/// ```
///
/// ## Event Types
/// - `Ready`: watcher installed
/// - `Changed`: config file created or modified
/// - `Removed`: config file deleted
/// - `Error`: the watcher could not be installed
///
/// Changes to any other file in `dir` are ignored. The watcher stops when the
/// receiver is dropped.
pub async fn watch_config(
    dir: &Path,
) -> Result<
    (
        tokio::sync::mpsc::Sender<ConfigReloadEvent>,
        tokio::sync::mpsc::Receiver<ConfigReloadEvent>,
    ),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let dir = dir.to_path_buf();

    if !dir.is_dir() {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Config directory not found: {:?}", dir),
        )));
    }

    let (tx, rx) = tokio::sync::mpsc::channel(100);
    let tx_task = tx.clone();
    let dir_task = dir.clone();

    tokio::spawn(async move {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(100);
        let mut watcher = match RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.blocking_send(res);
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(e) => {
                let error_msg = format!("Failed to create file watcher: {}", e);
                error!("{}", error_msg);

                let _ = tx_task
                    .send(ConfigReloadEvent::Error {
                        path: dir_task,
                        error: error_msg,
                    })
                    .await;

                return;
            }
        };

        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            let error_msg = format!("Failed to watch config directory: {}", e);
            error!("{}", error_msg);

            let _ = tx_task
                .send(ConfigReloadEvent::Error {
                    path: dir_task,
                    error: error_msg,
                })
                .await;

            return;
        }

        info!("Watching config directory: {:?}", dir);

        let _ = tx_task.send(ConfigReloadEvent::Ready).await;

        loop {
            tokio::select! {
                _ = tx_task.closed() => {
                    debug!("Receiver dropped, stopping watcher for {:?}", dir);
                    break;
                }
                event_result = event_rx.recv() => {
                    let Some(event_result) = event_result else {
                        break;
                    };

                    match event_result {
                        Ok(event) => {
                            let Some(path) = event.paths.iter().find(|p| is_config_file(p)).cloned()
                            else {
                                continue;
                            };
                            let reload_event = match event.kind {
                                EventKind::Create(_) | EventKind::Modify(_) => {
                                    info!("Config file updated: {:?}", path);
                                    ConfigReloadEvent::Changed(path)
                                }
                                EventKind::Remove(_) => {
                                    warn!("Config file removed: {:?}", path);
                                    ConfigReloadEvent::Removed(path)
                                }
                                _ => {
                                    debug!("Ignoring event: {:?}", event.kind);
                                    continue;
                                }
                            };

                            if let Err(e) = tx_task.send(reload_event).await {
                                error!("Failed to send config reload event: {}", e);
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("Watch error: {}", e);
                        }
                    }
                }
            }
        }
    });

    Ok((tx, rx))
}
