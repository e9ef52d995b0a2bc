//! Config file watcher.
//!
//! Watches the directory holding the config file (the file itself may not
//! exist yet, and editors often replace it on save) and emits
//! `HostEvent::ConfigChanged` for create/modify events naming the file.

use core_events::{AsyncEventSource, Event, HostEvent};
use notify::{EventKind, RecursiveMode, Watcher as _};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

pub struct ConfigWatchSource {
    path: PathBuf,
}

impl ConfigWatchSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn touches_config(event: &notify::Event, target: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == target.file_name())
}

impl AsyncEventSource for ConfigWatchSource {
    fn name(&self) -> &'static str {
        "config_watch"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let target = self.path.clone();
            let cb_tx = tx.clone();
            let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                match res {
                    Ok(ev) if touches_config(&ev, &target) => {
                        // Runs on the watcher's own thread.
                        if cb_tx
                            .blocking_send(Event::Host(HostEvent::ConfigChanged))
                            .is_err()
                        {
                            trace!(target: "runtime.watch", "config_change_after_close");
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(target: "runtime.watch", %err, "watch_error"),
                }
            });
            let mut watcher = match watcher {
                Ok(w) => w,
                Err(err) => {
                    warn!(target: "runtime.watch", %err, "watcher_unavailable");
                    return;
                }
            };
            let dir = self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            if let Err(err) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                warn!(target: "runtime.watch", dir = %dir.display(), %err, "watch_failed");
                return;
            }
            info!(target: "runtime.watch", path = %self.path.display(), "config_watch_started");
            tx.closed().await;
            drop(watcher);
            trace!(target: "runtime.watch", "config_watch_stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_writes_to_the_config_file_count() {
        let target = Path::new("/home/u/.config/symconv/symconv.toml");
        assert!(touches_config(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.config/symconv/symconv.toml"),
            target
        ));
        assert!(touches_config(
            &event(EventKind::Create(CreateKind::File), "/home/u/.config/symconv/symconv.toml"),
            target
        ));
        assert!(!touches_config(
            &event(EventKind::Remove(RemoveKind::File), "/home/u/.config/symconv/symconv.toml"),
            target
        ));
        assert!(!touches_config(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.config/symconv/other.toml"),
            target
        ));
    }
}
