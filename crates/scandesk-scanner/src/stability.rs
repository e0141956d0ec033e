//! Detection of files that have finished being written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Observable facts about a file used to decide whether it is still changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileFingerprint {
    pub fn new(size: u64, modified: Option<SystemTime>) -> Self {
        Self { size, modified }
    }

    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tracked {
    /// Changing, or unchanged for less than the window.
    Settling { fingerprint: FileFingerprint, since: Instant },
    /// Already reported stable, or present before the watch began.
    Settled { fingerprint: FileFingerprint },
}

/// Tracks file fingerprints across polling passes and reports each file once, when it
/// has kept the same size and modification time for the whole window.
#[derive(Debug)]
pub struct StabilityTracker {
    window: Duration,
    files: HashMap<PathBuf, Tracked>,
}

impl StabilityTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            files: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Mark a file as pre-existing so it is never reported unless it changes.
    pub fn baseline(&mut self, path: PathBuf, fingerprint: FileFingerprint) {
        self.files.insert(path, Tracked::Settled { fingerprint });
    }

    /// Record one observation. Returns `true` the moment the file becomes stable.
    pub fn observe(&mut self, path: &Path, fingerprint: FileFingerprint, now: Instant) -> bool {
        match self.files.get_mut(path) {
            None => {
                self.files.insert(
                    path.to_path_buf(),
                    Tracked::Settling {
                        fingerprint,
                        since: now,
                    },
                );
                self.window.is_zero() && self.settle(path, fingerprint)
            }
            Some(Tracked::Settled { fingerprint: seen }) => {
                if *seen != fingerprint {
                    // Rewritten after it settled; watch it again.
                    self.files.insert(
                        path.to_path_buf(),
                        Tracked::Settling {
                            fingerprint,
                            since: now,
                        },
                    );
                }
                false
            }
            Some(Tracked::Settling {
                fingerprint: seen,
                since,
            }) => {
                if *seen != fingerprint {
                    *seen = fingerprint;
                    *since = now;
                    false
                } else if now.saturating_duration_since(*since) >= self.window {
                    self.settle(path, fingerprint)
                } else {
                    false
                }
            }
        }
    }

    fn settle(&mut self, path: &Path, fingerprint: FileFingerprint) -> bool {
        self.files
            .insert(path.to_path_buf(), Tracked::Settled { fingerprint });
        true
    }

    /// Observe a full directory listing and forget files that disappeared.
    ///
    /// Returns the paths that became stable during this pass, in listing order.
    pub fn sweep(&mut self, listing: Vec<(PathBuf, FileFingerprint)>, now: Instant) -> Vec<PathBuf> {
        let mut stable = Vec::new();
        let mut present = std::collections::HashSet::with_capacity(listing.len());

        for (path, fingerprint) in listing {
            if self.observe(&path, fingerprint, now) {
                stable.push(path.clone());
            }
            present.insert(path);
        }

        self.files.retain(|path, _| present.contains(path));
        stable
    }

    pub fn tracked(&self) -> usize {
        self.files.len()
    }
}
