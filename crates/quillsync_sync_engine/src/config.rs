//! Configuration for the sync engine.

use quillsync_remote::ServiceLimits;
use std::path::PathBuf;
use std::time::Duration;

/// Interval used when none is configured.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Millisecond setting meaning "only sync on demand".
pub const SYNC_MANUAL: i64 = -1;

/// How often the orchestrator runs a cycle on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncInterval {
    /// Never on a timer; only `trigger_sync` / `force_sync`.
    Manual,
    /// Every period.
    Every(Duration),
}

impl SyncInterval {
    /// Interprets a stored millisecond setting.
    ///
    /// `SYNC_MANUAL` (and any other negative value) means manual, zero means
    /// the default interval.
    pub fn from_millis(millis: i64) -> Self {
        match u64::try_from(millis) {
            Ok(0) => Self::default(),
            Ok(millis) => Self::Every(Duration::from_millis(millis)),
            Err(_) => Self::Manual,
        }
    }

    /// Returns the timer period, or `None` when manual.
    pub fn period(self) -> Option<Duration> {
        match self {
            Self::Manual => None,
            Self::Every(period) => Some(period),
        }
    }
}

impl Default for SyncInterval {
    fn default() -> Self {
        Self::Every(DEFAULT_SYNC_INTERVAL)
    }
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Periodic schedule.
    pub interval: SyncInterval,
    /// Limits of the remote service; used for truncation and paging.
    pub limits: ServiceLimits,
    /// How many times a conflicting notebook name is renamed before the
    /// cycle gives up.
    pub rename_attempts: u32,
    /// Appended to a notebook name on each rename.
    pub conflict_marker: char,
    /// Whether pending notebook deletes are sent to the service.
    pub notebook_deletes: bool,
    /// Whether attachments are uploaded when a note is first created.
    pub attach_resources_on_create: bool,
    /// Directory that receives pulled resource bodies.
    pub resource_dir: PathBuf,
}

impl SyncConfig {
    /// Creates a configuration storing resource bodies under `resource_dir`.
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            interval: SyncInterval::default(),
            limits: ServiceLimits::default(),
            rename_attempts: 10,
            conflict_marker: '*',
            notebook_deletes: false,
            attach_resources_on_create: false,
            resource_dir: resource_dir.into(),
        }
    }

    /// Sets the periodic schedule.
    pub fn with_interval(mut self, interval: SyncInterval) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the service limits.
    pub fn with_limits(mut self, limits: ServiceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the rename retry bound.
    pub fn with_rename_attempts(mut self, attempts: u32) -> Self {
        self.rename_attempts = attempts;
        self
    }

    /// Sets the rename marker.
    pub fn with_conflict_marker(mut self, marker: char) -> Self {
        self.conflict_marker = marker;
        self
    }

    /// Enables or disables remote notebook deletes.
    pub fn with_notebook_deletes(mut self, enabled: bool) -> Self {
        self.notebook_deletes = enabled;
        self
    }

    /// Enables or disables uploading attachments on note creation.
    pub fn with_resources_on_create(mut self, enabled: bool) -> Self {
        self.attach_resources_on_create = enabled;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("quillsync-resources"))
    }
}
