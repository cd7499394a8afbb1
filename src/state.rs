//! # Application State Management
//!
//! Shared state handed to every HTTP request handler through `web::Data`.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: actix runs one app instance per worker thread, and all of them
//!   must see the same metrics
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time
//! - Only the metrics are behind a lock; configuration is fixed after startup
//!   and shared read-only through `Arc<AppConfig>`

use crate::config::AppConfig;
use crate::transcoder::FfmpegTranscoder;
use crate::workspace::UploadWorkspace;
use std::collections::HashMap;       // For storing per-endpoint metrics
use std::sync::{Arc, RwLock};        // Thread-safe shared ownership and locking
use std::time::Instant;              // For tracking server uptime

/// The main application state that's shared across all HTTP request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Startup configuration (never mutated)
    pub config: Arc<AppConfig>,

    /// Where job files are written
    pub workspace: UploadWorkspace,

    /// ffmpeg runner built from `config.transcoder`
    pub transcoder: FfmpegTranscoder,

    /// Request and job counters, updated by middleware and handlers
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (Instant is Copy, so no lock needed)
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Transcodes currently running
    pub active_jobs: u32,

    /// Transcodes that produced a download
    pub completed_jobs: u64,

    /// Transcodes that reached ffmpeg and failed
    pub failed_jobs: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

impl AppState {
    /// Create a new AppState, deriving the workspace and transcoder from `config`.
    pub fn new(config: AppConfig) -> Self {
        let workspace = UploadWorkspace::new(config.uploads.dir.clone());
        let transcoder = FfmpegTranscoder::new(
            config.transcoder.ffmpeg_path.clone(),
            config.transcoder_timeout(),
        );
        Self {
            config: Arc::new(config),
            workspace,
            transcoder,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Lock the metrics for writing.
    ///
    /// A poisoned lock only means another thread panicked mid-update; the
    /// counters are still usable, so the guard is recovered instead of panicking.
    fn metrics_mut(&self) -> std::sync::RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.metrics_mut().request_count += 1;
    }

    /// Increment the total error counter (called for 4xx/5xx responses).
    pub fn increment_error_count(&self) {
        self.metrics_mut().error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// The first time an endpoint is seen a zeroed `EndpointMetric` is created.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_mut();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Mark a transcode as started. The returned guard marks it finished on drop,
    /// so early returns and panics inside the handler still decrement the count.
    pub fn begin_job(&self) -> JobGuard {
        self.metrics_mut().active_jobs += 1;
        JobGuard {
            metrics: Arc::clone(&self.metrics),
            succeeded: false,
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Tracks one running transcode; see `AppState::begin_job`.
#[derive(Debug)]
pub struct JobGuard {
    metrics: Arc<RwLock<AppMetrics>>,
    succeeded: bool,
}

impl JobGuard {
    /// Record the job as completed instead of failed when the guard drops.
    pub fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        metrics.active_jobs = metrics.active_jobs.saturating_sub(1);
        if self.succeeded {
            metrics.completed_jobs += 1;
        } else {
            metrics.failed_jobs += 1;
        }
    }
}

impl EndpointMetric {
    /// Average response time for this endpoint, 0.0 before the first request.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Error rate for this endpoint as a fraction (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
