use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),

    #[error("Watch error: {0}")]
    WatchError(String),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Watch a directory, non-recursively
    pub fn new(path: &Path) -> WatcherResult<Self> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Blocks until the next event; `None` once the watcher is gone
    pub fn next_event(&self) -> Option<Event> {
        loop {
            match self.receiver.recv() {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(e)) => tracing::warn!(error = %e, "Watch error"),
                Err(_) => return None,
            }
        }
    }
}

/// Last content the service itself wrote to the devfile, so the watcher can
/// tell its own writes from external ones
#[derive(Debug, Clone, Default)]
pub struct EchoGuard {
    last_written: Arc<Mutex<Option<String>>>,
}

impl EchoGuard {
    pub fn record(&self, content: &str) {
        *self
            .last_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(content.to_string());
    }

    pub fn is_echo(&self, content: &str) -> bool {
        self.last_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            == Some(content)
    }
}

/// Watch the devfile at `path` on a dedicated thread and call `on_change`
/// with its new content after every external modification.
///
/// Writes recorded in `guard` and repeated identical contents are skipped.
/// Unreadable, emptied or removed files are skipped.
pub fn watch_devfile<F>(path: PathBuf, guard: EchoGuard, on_change: F) -> WatcherResult<()>
where
    F: Fn(String) + Send + 'static,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .ok_or_else(|| WatcherError::WatchError(format!("{} is not a file path", path.display())))?
        .to_os_string();

    let watcher = FileWatcher::new(&dir)?;
    tracing::info!(path = %path.display(), "Watching devfile");

    std::thread::spawn(move || {
        let mut last_seen = std::fs::read_to_string(&path).ok();

        while let Some(event) = watcher.next_event() {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                continue;
            }
            if !event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                continue;
            }

            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::debug!(error = %e, "Devfile not readable after change");
                    continue;
                }
            };

            // truncated mid-write
            if content.trim().is_empty() || last_seen.as_deref() == Some(content.as_str()) {
                continue;
            }
            last_seen = Some(content.clone());

            if guard.is_echo(&content) {
                tracing::debug!("Skipping own write");
                continue;
            }

            tracing::info!(path = %path.display(), "Devfile changed on disk");
            on_change(content);
        }
    });

    Ok(())
}
