//! Ingestion Watcher.
//!
//! A polling scanner walks the drop folder and feeds a [`StabilityTracker`]; files that
//! stop changing are queued on a bounded channel and ingested one at a time by a single
//! worker. Each file produces exactly one [`IngestionEvent`] and a failure never stops
//! the loop.

use chrono::Utc;
use scandesk_core::config::ScanFolderConfig;
use scandesk_core::models::ScanTarget;
use scandesk_core::validation::file_extension;
use scandesk_core::AppError;
use scandesk_services::DocumentLifecycleManager;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::stability::{FileFingerprint, StabilityTracker};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub root: PathBuf,
    /// Failed files are moved here; left in place when unset.
    pub quarantine: Option<PathBuf>,
    /// Lowercase extensions without the dot.
    pub allowed_extensions: Vec<String>,
    pub stability_window: Duration,
    pub poll_interval: Duration,
    pub queue_capacity: usize,
    /// Ingest files already present when the watch starts.
    pub ingest_existing: bool,
    /// How long a target registered by a scan request waits for its file.
    pub target_ttl: Duration,
    pub default_target: ScanTarget,
}

impl WatcherConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quarantine: None,
            allowed_extensions: ["pdf", "jpg", "jpeg", "png", "tif", "tiff"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            stability_window: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
            queue_capacity: 64,
            ingest_existing: false,
            target_ttl: Duration::from_secs(300),
            default_target: ScanTarget::unassigned(),
        }
    }

    pub fn allows(&self, path: &Path) -> bool {
        extension_allowed(&self.allowed_extensions, path)
    }
}

impl From<&ScanFolderConfig> for WatcherConfig {
    fn from(config: &ScanFolderConfig) -> Self {
        Self {
            root: PathBuf::from(&config.scan_folder),
            quarantine: config.quarantine_path.as_ref().map(PathBuf::from),
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .collect(),
            stability_window: Duration::from_millis(config.stability_window_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            queue_capacity: config.queue_capacity,
            ingest_existing: config.ingest_existing,
            target_ttl: Duration::from_secs(config.target_ttl_secs),
            default_target: ScanTarget::unassigned(),
        }
    }
}

fn extension_allowed(allowed: &[String], path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(file_extension)
        .map(|ext| allowed.contains(&ext))
        .unwrap_or(false)
}

/// Outcome of processing one stabilized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionEvent {
    Ingested {
        path: PathBuf,
        document_id: Uuid,
        content_hash: String,
    },
    Skipped {
        path: PathBuf,
        reason: String,
    },
    Failed {
        path: PathBuf,
        error: String,
        quarantined_to: Option<PathBuf>,
    },
}

impl IngestionEvent {
    pub fn path(&self) -> &Path {
        match self {
            IngestionEvent::Ingested { path, .. }
            | IngestionEvent::Skipped { path, .. }
            | IngestionEvent::Failed { path, .. } => path,
        }
    }
}

#[derive(Debug)]
struct Pending {
    ticket: u64,
    target: ScanTarget,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct PendingSlot {
    next_ticket: u64,
    pending: Option<Pending>,
}

/// Target registered by the latest accepted scan request.
#[derive(Debug)]
struct PendingTarget {
    ttl: Duration,
    slot: Mutex<PendingSlot>,
}

impl PendingTarget {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(PendingSlot::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingSlot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, target: ScanTarget) {
        let mut slot = self.lock();
        slot.next_ticket += 1;
        slot.pending = Some(Pending {
            ticket: slot.next_ticket,
            target,
            expires_at: Instant::now() + self.ttl,
        });
    }

    /// Live target and its ticket; an expired target is dropped.
    fn current(&self) -> Option<(u64, ScanTarget)> {
        let mut slot = self.lock();
        if slot
            .pending
            .as_ref()
            .is_some_and(|p| p.expires_at <= Instant::now())
        {
            tracing::info!("Pending scan target expired without a file");
            slot.pending = None;
        }
        slot.pending.as_ref().map(|p| (p.ticket, p.target.clone()))
    }

    fn consume(&self, ticket: u64) {
        let mut slot = self.lock();
        if slot.pending.as_ref().is_some_and(|p| p.ticket == ticket) {
            slot.pending = None;
        }
    }
}

struct Running {
    cancel: CancellationToken,
    scanner: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl Running {
    /// Stop scanning, then let the worker finish what is already queued.
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.scanner.await {
            tracing::warn!(error = %e, "Folder scanner task ended abnormally");
        }
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "Ingestion worker task ended abnormally");
        }
    }
}

struct WatcherInner {
    config: WatcherConfig,
    running: Option<Running>,
}

pub struct IngestionWatcher {
    manager: DocumentLifecycleManager,
    pending: Arc<PendingTarget>,
    events: broadcast::Sender<IngestionEvent>,
    inner: tokio::sync::Mutex<WatcherInner>,
}

impl IngestionWatcher {
    pub fn new(manager: DocumentLifecycleManager, config: WatcherConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            manager,
            pending: Arc::new(PendingTarget::new(config.target_ttl)),
            events,
            inner: tokio::sync::Mutex::new(WatcherInner {
                config,
                running: None,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestionEvent> {
        self.events.subscribe()
    }

    /// Classify the next file ingested, until the target's time to live runs out.
    pub fn register_target(&self, target: ScanTarget) {
        tracing::debug!(
            origin = %target.origin.kind(),
            document_type = %target.document_type,
            "Scan target registered"
        );
        self.pending.register(target);
    }

    pub fn pending_target(&self) -> Option<ScanTarget> {
        self.pending.current().map(|(_, target)| target)
    }

    pub async fn root(&self) -> PathBuf {
        self.inner.lock().await.config.root.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.running.is_some()
    }

    /// Create the drop folder if needed, take the baseline and start the loop.
    pub async fn start(&self) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if inner.running.is_none() {
            let running = self.launch(&inner.config).await?;
            inner.running = Some(running);
        }
        Ok(())
    }

    pub async fn stop(&self) {
        let running = self.inner.lock().await.running.take();
        if let Some(running) = running {
            running.shutdown().await;
            tracing::info!("Ingestion watcher stopped");
        }
    }

    /// Restart the watch on `new_root`.
    ///
    /// Files that land in the new root before its baseline is taken count as
    /// pre-existing and are not ingested unless `ingest_existing` is set.
    pub async fn reconfigure(&self, new_root: impl Into<PathBuf>) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if let Some(running) = inner.running.take() {
            running.shutdown().await;
        }
        inner.config.root = new_root.into();
        let running = self.launch(&inner.config).await?;
        inner.running = Some(running);
        Ok(())
    }

    async fn launch(&self, config: &WatcherConfig) -> Result<Running, AppError> {
        tokio::fs::create_dir_all(&config.root).await.map_err(|e| {
            tracing::error!(error = %e, root = %config.root.display(), "Cannot create scan folder");
            AppError::Io(e)
        })?;
        if let Some(quarantine) = &config.quarantine {
            tokio::fs::create_dir_all(quarantine).await?;
        }

        let mut tracker = StabilityTracker::new(config.stability_window);
        let mut baselined = 0usize;
        if !config.ingest_existing {
            for (path, fingerprint) in
                list_files(config.root.clone(), config.quarantine.clone()).await?
            {
                tracker.baseline(path, fingerprint);
                baselined += 1;
            }
        }

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let cancel = CancellationToken::new();

        let scanner = tokio::spawn(scan_loop(
            config.root.clone(),
            config.quarantine.clone(),
            config.poll_interval,
            tracker,
            tx,
            cancel.clone(),
        ));

        let worker = IngestWorker {
            manager: self.manager.clone(),
            allowed_extensions: config.allowed_extensions.clone(),
            quarantine: config.quarantine.clone(),
            default_target: config.default_target.clone(),
            pending: Arc::clone(&self.pending),
            events: self.events.clone(),
        };
        let worker = tokio::spawn(worker.run(rx));

        tracing::info!(
            root = %config.root.display(),
            baselined,
            stability_window_ms = config.stability_window.as_millis() as u64,
            "Ingestion watcher started"
        );

        Ok(Running {
            cancel,
            scanner,
            worker,
        })
    }
}

/// Regular files under `root`, skipping hidden entries and the quarantine folder.
async fn list_files(
    root: PathBuf,
    exclude: Option<PathBuf>,
) -> Result<Vec<(PathBuf, FileFingerprint)>, AppError> {
    tokio::task::spawn_blocking(move || {
        let walker = WalkDir::new(&root).follow_links(false).into_iter();
        let mut files = Vec::new();

        for entry in walker.filter_entry(|entry| {
            let hidden = entry.depth() > 0
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with('.'));
            let excluded = exclude.as_deref().is_some_and(|dir| entry.path() == dir);
            !hidden && !excluded
        }) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(AppError::Io(std::io::Error::from(e))),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry in scan folder");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) => {
                    let fingerprint = FileFingerprint::from_metadata(&metadata);
                    files.push((entry.into_path(), fingerprint));
                }
                Err(e) => tracing::debug!(error = %e, "File vanished during scan"),
            }
        }

        Ok(files)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Folder scan task failed: {}", e)))?
}

async fn scan_loop(
    root: PathBuf,
    quarantine: Option<PathBuf>,
    poll_interval: Duration,
    mut tracker: StabilityTracker,
    tx: mpsc::Sender<PathBuf>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let listing = match list_files(root.clone(), quarantine.clone()).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(error = %e, root = %root.display(), "Scan folder listing failed");
                continue;
            }
        };

        for path in tracker.sweep(listing, Instant::now()) {
            tracing::debug!(path = %path.display(), "File stabilized");
            tokio::select! {
                biased;

                () = cancel.cancelled() => return,
                sent = tx.send(path) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

struct IngestWorker {
    manager: DocumentLifecycleManager,
    allowed_extensions: Vec<String>,
    quarantine: Option<PathBuf>,
    default_target: ScanTarget,
    pending: Arc<PendingTarget>,
    events: broadcast::Sender<IngestionEvent>,
}

impl IngestWorker {
    async fn run(self, mut rx: mpsc::Receiver<PathBuf>) {
        while let Some(path) = rx.recv().await {
            let event = self.process(path).await;
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
        tracing::debug!("Ingestion queue drained");
    }

    async fn process(&self, path: PathBuf) -> IngestionEvent {
        if !extension_allowed(&self.allowed_extensions, &path) {
            tracing::info!(path = %path.display(), "Skipping file with disallowed extension");
            return IngestionEvent::Skipped {
                path,
                reason: "extension not allowed".to_string(),
            };
        }

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return IngestionEvent::Skipped {
                path,
                reason: "file no longer present".to_string(),
            };
        }

        let (ticket, target) = match self.pending.current() {
            Some((ticket, target)) => (Some(ticket), target),
            None => (None, self.default_target.clone()),
        };

        match self.manager.ingest_file(&path, &target).await {
            Ok(document) => {
                if let Some(ticket) = ticket {
                    self.pending.consume(ticket);
                }
                IngestionEvent::Ingested {
                    path,
                    document_id: document.id,
                    content_hash: document.content_hash,
                }
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    document_type = %target.document_type,
                    "Scan ingestion failed"
                );
                let quarantined_to = match &self.quarantine {
                    Some(dir) => match quarantine_file(&path, dir).await {
                        Ok(dest) => {
                            tracing::info!(
                                path = %path.display(),
                                quarantined_to = %dest.display(),
                                "Failed scan moved to quarantine"
                            );
                            Some(dest)
                        }
                        Err(qe) => {
                            tracing::error!(error = %qe, path = %path.display(), "Failed to quarantine scan");
                            None
                        }
                    },
                    None => None,
                };
                IngestionEvent::Failed {
                    path,
                    error: e.to_string(),
                    quarantined_to,
                }
            }
        }
    }
}

async fn quarantine_file(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string());

    let mut dest = dir.join(&name);
    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        dest = dir.join(format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S%3f"), name));
    }

    if tokio::fs::rename(path, &dest).await.is_err() {
        tokio::fs::copy(path, &dest).await?;
        tokio::fs::remove_file(path).await?;
    }
    Ok(dest)
}
