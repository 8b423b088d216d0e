use crate::config::WatchConfig;
use crate::pipeline::{self, BuildError, BuildSettings};
use crate::scanner::{self, GlobMatcher, ScanError};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub debounce: Duration,
    pub stability_threshold: Duration,
    pub stability_poll: Duration,
    /// Use a polling watcher with this interval instead of native events.
    pub poll: Option<Duration>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::from(&WatchConfig::default())
    }
}

impl From<&WatchConfig> for WatchOptions {
    fn from(config: &WatchConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            stability_threshold: Duration::from_millis(config.stability_threshold_ms),
            stability_poll: Duration::from_millis(config.stability_poll_ms.max(1)),
            poll: config
                .poll
                .then(|| Duration::from_millis(config.poll_interval_ms.max(1))),
        }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("failed to start watcher: {0}")]
    Start(#[source] notify::Error),
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Builds once, then rebuilds on every debounced change until `shutdown`
/// resolves. Only the initial build can fail the call; later failures are
/// logged and watching continues.
pub async fn run_watch_until<F>(
    settings: BuildSettings,
    options: WatchOptions,
    shutdown: F,
) -> Result<(), WatchError>
where
    F: Future<Output = ()>,
{
    pipeline::build_once(&settings).await?;

    let mut session = WatchSession::open(&settings, &options)?;
    log::info!("watching for changes (press Ctrl+C to stop)...");

    let settings = Arc::new(settings);
    let mut debouncer = Debouncer::new(options.debounce);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            change = session.next_change() => {
                let Some(change) = change else {
                    log::warn!("file watcher closed, stopping");
                    break;
                };
                log::debug!("{:?} {}", change.kind, change.path.display());
                let settings = Arc::clone(&settings);
                debouncer.schedule(move || rebuild(settings));
            }
        }
    }

    debouncer.cancel();
    drop(session);
    log::info!("stopped watching");
    Ok(())
}

async fn rebuild(settings: Arc<BuildSettings>) {
    log::info!("change detected, rebuilding...");
    if let Err(err) = pipeline::build_once(&settings).await {
        log::error!("rebuild failed: {}", err);
    }
}

/// Single-slot delayed task. Scheduling again before the delay elapses
/// replaces the pending task; once the delay has elapsed the action runs as
/// its own task and is no longer affected by the debouncer.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F, Fut>(&mut self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(action());
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// An open file-system subscription for the content globs.
///
/// Add and change events are held back until the file has been quiet for
/// the stability threshold. Dropping the session releases the watcher and
/// aborts any pending stability checks.
pub struct WatchSession {
    _watcher: Box<dyn Watcher + Send>,
    raw_events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    stable_tx: mpsc::UnboundedSender<ChangeEvent>,
    stable_rx: mpsc::UnboundedReceiver<ChangeEvent>,
    matcher: GlobMatcher,
    gates: HashMap<PathBuf, JoinHandle<()>>,
    stability_threshold: Duration,
    stability_poll: Duration,
}

enum Incoming {
    Stable(Option<ChangeEvent>),
    Raw(Option<notify::Result<Event>>),
}

impl WatchSession {
    pub fn open(settings: &BuildSettings, options: &WatchOptions) -> Result<Self, WatchError> {
        let matcher = GlobMatcher::new(&settings.content, &settings.base_dir)?;
        let (raw_tx, raw_events) = mpsc::unbounded_channel();
        let handler = move |result: notify::Result<Event>| {
            let _ = raw_tx.send(result);
        };

        let mut watcher: Box<dyn Watcher + Send> = match options.poll {
            Some(interval) => Box::new(
                notify::PollWatcher::new(
                    handler,
                    notify::Config::default().with_poll_interval(interval),
                )
                .map_err(WatchError::Start)?,
            ),
            None => Box::new(notify::recommended_watcher(handler).map_err(WatchError::Start)?),
        };

        let mut roots = Vec::new();
        for root in scanner::glob_roots(&settings.content) {
            let mut root = settings.base_dir.join(root);
            if !root.exists() {
                log::warn!(
                    "{} does not exist yet, watching {} instead",
                    root.display(),
                    settings.base_dir.display()
                );
                root = settings.base_dir.clone();
            }
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        for root in &roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|source| WatchError::Watch {
                    path: root.clone(),
                    source,
                })?;
        }

        let (stable_tx, stable_rx) = mpsc::unbounded_channel();
        Ok(Self {
            _watcher: watcher,
            raw_events,
            stable_tx,
            stable_rx,
            matcher,
            gates: HashMap::new(),
            stability_threshold: options.stability_threshold,
            stability_poll: options.stability_poll,
        })
    }

    /// Waits for the next settled change to a matching file. Returns `None`
    /// once the underlying watcher has shut down.
    pub async fn next_change(&mut self) -> Option<ChangeEvent> {
        loop {
            let incoming = tokio::select! {
                biased;
                change = self.stable_rx.recv() => Incoming::Stable(change),
                raw = self.raw_events.recv() => Incoming::Raw(raw),
            };
            match incoming {
                Incoming::Stable(change) => return change,
                Incoming::Raw(Some(Ok(event))) => self.accept(&event),
                Incoming::Raw(Some(Err(err))) => log::warn!("watch error: {}", err),
                Incoming::Raw(None) => return None,
            }
        }
    }

    fn accept(&mut self, event: &Event) {
        self.gates.retain(|_, gate| !gate.is_finished());

        for change in changes_from_event(event) {
            if !self.matcher.is_match(&change.path) {
                continue;
            }
            if let Some(previous) = self.gates.remove(&change.path) {
                previous.abort();
            }
            if change.kind == ChangeKind::Unlink {
                let _ = self.stable_tx.send(change);
                continue;
            }

            let tx = self.stable_tx.clone();
            let threshold = self.stability_threshold;
            let poll = self.stability_poll;
            let path = change.path.clone();
            let gate = tokio::spawn(async move {
                await_write_finish(&change.path, threshold, poll).await;
                let _ = tx.send(change);
            });
            self.gates.insert(path, gate);
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        for (_, gate) in self.gates.drain() {
            gate.abort();
        }
    }
}

/// Maps a raw notification to per-path add/change/unlink events. Access
/// events are dropped.
pub fn changes_from_event(event: &Event) -> Vec<ChangeEvent> {
    let change = |kind: ChangeKind, path: &PathBuf| ChangeEvent {
        kind,
        path: path.clone(),
    };

    match event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|path| change(ChangeKind::Add, path))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|path| change(ChangeKind::Unlink, path))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|path| change(ChangeKind::Unlink, path))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|path| change(ChangeKind::Add, path))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(idx, path)| {
                let kind = if idx == 0 {
                    ChangeKind::Unlink
                } else {
                    ChangeKind::Add
                };
                change(kind, path)
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let kind = if path.exists() {
                    ChangeKind::Add
                } else {
                    ChangeKind::Unlink
                };
                change(kind, path)
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => event
            .paths
            .iter()
            .map(|path| change(ChangeKind::Change, path))
            .collect(),
    }
}

type Fingerprint = Option<(u64, Option<SystemTime>)>;

async fn fingerprint(path: &Path) -> Fingerprint {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    Some((metadata.len(), metadata.modified().ok()))
}

/// Resolves once `path` has kept the same size and mtime for `threshold`,
/// sampling every `poll`.
pub async fn await_write_finish(path: &Path, threshold: Duration, poll: Duration) {
    let mut last = fingerprint(path).await;
    let mut quiet_since = Instant::now();
    loop {
        tokio::time::sleep(poll).await;
        let current = fingerprint(path).await;
        if current != last {
            last = current;
            quiet_since = Instant::now();
        } else if quiet_since.elapsed() >= threshold {
            return;
        }
    }
}
