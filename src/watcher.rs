use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::ConfigStore;
use crate::error::WatchError;
use crate::events::{EventSink, MoveEvent};
use crate::mover::MoveExecutor;
use crate::router;

type SinkSlot = Arc<Mutex<Option<Arc<dyn EventSink>>>>;

enum WorkerMessage {
    Fs(notify::Result<Event>),
    Shutdown,
}

/// Turns one filesystem notification into zero or more moves.
///
/// Reads a fresh config snapshot per notification, so rule edits apply to the
/// next file without restarting the session.
#[derive(Clone)]
pub struct Dispatcher {
    store: ConfigStore,
    executor: MoveExecutor,
    sink: SinkSlot,
}

impl Dispatcher {
    pub fn new(store: ConfigStore, executor: MoveExecutor) -> Self {
        Self {
            store,
            executor,
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_sink(&self, sink: Option<Arc<dyn EventSink>>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Handles a notification for files under `root`, returning what happened.
    pub fn handle(&self, root: &Path, event: &Event) -> Vec<MoveEvent> {
        match event.kind {
            EventKind::Create(CreateKind::Folder) => return Vec::new(),
            EventKind::Create(_) => {}
            _ => return Vec::new(),
        }

        let mut results = Vec::new();
        for path in &event.paths {
            if path.is_dir() {
                tracing::debug!("Ignoring new directory {}", path.display());
                continue;
            }
            if let Some(moved) = self.handle_file(root, path) {
                self.emit(&moved);
                results.push(moved);
            }
        }
        results
    }

    fn handle_file(&self, root: &Path, path: &Path) -> Option<MoveEvent> {
        let snapshot = self.store.snapshot();
        let Some(destination) = router::route(path, &snapshot.rules) else {
            tracing::debug!("No rule for {}", path.display());
            return None;
        };
        Some(self.executor.execute(path, root, destination))
    }

    fn emit(&self, event: &MoveEvent) {
        // Clone the sink out so the slot is not locked while it runs.
        let sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(sink) = sink {
            sink.on_move(event);
        }
    }
}

struct ActiveWatch {
    root: PathBuf,
    watcher: RecommendedWatcher,
    control: Sender<WorkerMessage>,
    worker: JoinHandle<()>,
}

/// One filesystem subscription bound to one root folder.
///
/// Creation notifications are routed and moved on a dedicated worker thread.
/// [`stop`](Self::stop) waits for that thread to finish, so once it returns no
/// notification from the old subscription can still be in flight.
pub struct WatchSession {
    dispatcher: Dispatcher,
    active: Option<ActiveWatch>,
}

impl WatchSession {
    pub fn new(store: ConfigStore, executor: MoveExecutor) -> Self {
        Self {
            dispatcher: Dispatcher::new(store, executor),
            active: None,
        }
    }

    pub fn with_sink<S: EventSink + 'static>(self, sink: S) -> Self {
        self.set_sink(sink);
        self
    }

    /// Registers the sink that receives every [`MoveEvent`]; applies immediately.
    pub fn set_sink<S: EventSink + 'static>(&self, sink: S) {
        self.dispatcher.set_sink(Some(Arc::new(sink)));
    }

    pub fn clear_sink(&self) {
        self.dispatcher.set_sink(None);
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.root.as_path())
    }

    /// Starts watching the folder currently stored as `watch_folder`.
    pub fn start_configured(&mut self) -> Result<(), WatchError> {
        let root = self.dispatcher.store.snapshot().watch_folder;
        self.start(root)
    }

    /// Begins recursive delivery of creation notifications under `root`.
    ///
    /// # Errors
    ///
    /// [`WatchError::InvalidRoot`] if `root` is empty or not an existing
    /// directory, [`WatchError::AlreadyActive`] if this session is already
    /// running, [`WatchError::Subscribe`] if the OS refuses the watch.
    pub fn start<P: AsRef<Path>>(&mut self, root: P) -> Result<(), WatchError> {
        let root = root.as_ref();
        if let Some(active) = &self.active {
            return Err(WatchError::AlreadyActive(active.root.clone()));
        }
        if root.as_os_str().is_empty() || !root.is_dir() {
            tracing::warn!("Invalid or non-existent watch folder: {:?}", root);
            return Err(WatchError::InvalidRoot(root.to_path_buf()));
        }

        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        let fs_tx = tx.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Fails only once the worker is gone, i.e. during shutdown.
            let _ = fs_tx.send(WorkerMessage::Fs(res));
        })
        .map_err(|source| WatchError::Subscribe {
            path: root.to_path_buf(),
            source,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Subscribe {
                path: root.to_path_buf(),
                source,
            })?;

        let dispatcher = self.dispatcher.clone();
        let worker_root = root.to_path_buf();
        let worker = thread::Builder::new()
            .name("xfolder-watch".to_string())
            .spawn(move || run_worker(dispatcher, worker_root, rx))
            .map_err(|e| WatchError::Subscribe {
                path: root.to_path_buf(),
                source: notify::Error::io(e),
            })?;

        tracing::info!("Monitoring started on {}", root.display());
        self.active = Some(ActiveWatch {
            root: root.to_path_buf(),
            watcher,
            control: tx,
            worker,
        });
        Ok(())
    }

    /// Ends the subscription and blocks until the worker has drained and exited.
    ///
    /// Notifications queued before the call are still processed. Calling this
    /// on an inactive session does nothing.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        // Drop the OS subscription first so nothing new is queued behind the shutdown marker.
        drop(active.watcher);
        let _ = active.control.send(WorkerMessage::Shutdown);
        if active.worker.join().is_err() {
            tracing::error!("Watch worker for {} panicked", active.root.display());
        }
        tracing::info!("Monitoring stopped on {}", active.root.display());
    }

    /// Stops the current subscription, if any, and starts a new one on `root`.
    pub fn restart<P: AsRef<Path>>(&mut self, root: P) -> Result<(), WatchError> {
        self.stop();
        self.start(root)
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(dispatcher: Dispatcher, root: PathBuf, rx: Receiver<WorkerMessage>) {
    while let Ok(message) = rx.recv() {
        match message {
            WorkerMessage::Fs(Ok(event)) => {
                dispatcher.handle(&root, &event);
            }
            WorkerMessage::Fs(Err(err)) => {
                tracing::error!("File watcher error: {}", err);
            }
            WorkerMessage::Shutdown => break,
        }
    }
}
