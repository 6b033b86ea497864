//! Process health and usage counters for the admin metrics view.
//!
//! Provides:
//! - [`UsageMetrics`] for lock-free per-request counters
//! - [`get_rss_bytes`] for the process's resident memory

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

// ============================================================================
// Platform RSS helper
// ============================================================================

/// Return the current process RSS (Resident Set Size) in bytes, or `None`
/// on unsupported platforms.
///
/// On Linux reads `/proc/self/statm`, takes the 2nd field (RSS pages) and
/// multiplies by the kernel page size from `sysconf(_SC_PAGESIZE)`.
pub fn get_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        // Format: size resident shared text lib data dt
        let content = std::fs::read_to_string("/proc/self/statm").ok()?;
        let resident_pages: u64 = content.split_whitespace().nth(1)?.parse().ok()?;

        extern "C" {
            fn sysconf(name: i32) -> i64;
        }
        // _SC_PAGESIZE = 30 on Linux
        const SC_PAGESIZE: i32 = 30;
        let page_size = unsafe { sysconf(SC_PAGESIZE) };
        if page_size <= 0 {
            return None;
        }
        Some(resident_pages * (page_size as u64))
    }

    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

// ============================================================================
// UsageMetrics
// ============================================================================

/// Lock-free per-request counters for the portal.
#[derive(Debug)]
pub struct UsageMetrics {
    /// Chat requests received.
    pub requests: AtomicU64,
    /// Chat requests answered from the response cache.
    pub cached_responses: AtomicU64,
    /// Chat requests that failed.
    pub errors: AtomicU64,
    /// Whether the portal is accepting requests.
    pub ready: AtomicBool,
    started_at: Instant,
}

impl UsageMetrics {
    /// Create zeroed counters with `ready = false`.
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            cached_responses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            ready: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cached_response(&self) {
        self.cached_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Emit current counters as a structured log line.
    pub fn emit_usage(&self, reason: &str) {
        info!(
            event = "usage_summary",
            reason = reason,
            requests = self.requests.load(Ordering::Relaxed),
            cached_responses = self.cached_responses.load(Ordering::Relaxed),
            errors = self.errors.load(Ordering::Relaxed),
            uptime_secs = self.uptime().as_secs(),
            "Usage metrics"
        );
    }
}

impl Default for UsageMetrics {
    fn default() -> Self {
        Self::new()
    }
}
