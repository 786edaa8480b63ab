//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use photosync_protocol::DEFAULT_GRANULARITY_MS;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of remote items requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the remote catalog accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default number of concurrent per-item actions.
pub const DEFAULT_PARALLEL_TRANSFERS: usize = 4;

/// Configuration for sync passes.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local folder mirrored against the remote catalog.
    pub sync_folder: PathBuf,
    /// Remote listing page size.
    pub page_size: u32,
    /// Worker threads for per-item actions. 1 runs items sequentially.
    pub max_parallel_transfers: usize,
    /// Timestamp comparison granularity in milliseconds.
    pub granularity_ms: u64,
    /// Retry policy for remote listing.
    pub retry: RetryConfig,
    /// Request timeout handed to the HTTP client.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration for the given folder.
    pub fn new(sync_folder: impl Into<PathBuf>) -> Self {
        Self {
            sync_folder: sync_folder.into(),
            page_size: DEFAULT_PAGE_SIZE,
            max_parallel_transfers: DEFAULT_PARALLEL_TRANSFERS,
            granularity_ms: DEFAULT_GRANULARITY_MS,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the remote page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the number of worker threads for per-item actions.
    pub fn with_max_parallel_transfers(mut self, workers: usize) -> Self {
        self.max_parallel_transfers = workers;
        self
    }

    /// Sets the timestamp comparison granularity.
    pub fn with_granularity_ms(mut self, granularity_ms: u64) -> Self {
        self.granularity_ms = granularity_ms;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the sync folder.
    pub fn sync_folder(&self) -> &Path {
        &self.sync_folder
    }

    /// Checks the configuration without touching the folder's contents.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the folder is unset, missing or not a
    /// directory, or if a numeric setting is out of range.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync_folder.as_os_str().is_empty() {
            return Err(SyncError::config("sync folder is not set"));
        }
        if !self.sync_folder.exists() {
            return Err(SyncError::config(format!(
                "sync folder {} does not exist",
                self.sync_folder.display()
            )));
        }
        if !self.sync_folder.is_dir() {
            return Err(SyncError::config(format!(
                "sync folder {} is not a directory",
                self.sync_folder.display()
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SyncError::config(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.max_parallel_transfers == 0 {
            return Err(SyncError::config("max_parallel_transfers must be at least 1"));
        }
        if self.granularity_ms == 0 {
            return Err(SyncError::config("timestamp granularity must be at least 1 ms"));
        }
        if self.timeout.is_zero() {
            return Err(SyncError::config("request timeout must be non-zero"));
        }
        Ok(())
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a configuration with `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Returns true if another attempt is allowed after `attempt` (0-indexed)
    /// failed.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts.max(1)
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            Duration::from_secs_f64(delay_secs + delay_secs * 0.25 * jitter_fraction())
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// A value in `[0, 1)` derived from the clock's sub-second nanos.
fn jitter_fraction() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}
