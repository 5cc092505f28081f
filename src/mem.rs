//! Process-memory governor: measure resident memory and reclaim on pressure.
//!
//! Extraction engines and chunk writers leave sizeable freed allocations in
//! the allocator between batches; on glibc those pages are not returned to
//! the OS on their own. The governor gives the pipeline two levers:
//!
//! * [`MemoryGovernor::usage`] — current resident set size.
//! * [`MemoryGovernor::check_and_reclaim`] — if usage exceeds a threshold,
//!   force the allocator to hand freed pages back to the OS.
//!
//! Both are advisory and best-effort. On platforms without `/proc` or
//! `malloc_trim`, usage reads as zero and reclamation degrades to a no-op;
//! neither ever fails the pipeline.

use tracing::debug;

/// Memory measurement and reclamation, injected into each pipeline stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryGovernor;

impl MemoryGovernor {
    pub fn new() -> Self {
        Self
    }

    /// Current resident set size in bytes; zero where unsupported.
    pub fn usage(&self) -> u64 {
        resident_bytes()
    }

    /// Trigger a reclamation pass if usage exceeds `threshold` bytes.
    ///
    /// Returns whether reclamation was triggered.
    pub fn check_and_reclaim(&self, threshold: u64) -> bool {
        let usage = self.usage();
        if usage <= threshold {
            return false;
        }
        debug!(
            usage_mib = usage / (1024 * 1024),
            threshold_mib = threshold / (1024 * 1024),
            "memory above threshold, reclaiming"
        );
        self.reclaim();
        true
    }

    /// Return freed allocator pages to the OS where the platform supports
    /// it; a no-op elsewhere.
    pub fn reclaim(&self) {
        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        unsafe {
            libc::malloc_trim(0);
        }
    }
}

#[cfg(target_os = "linux")]
fn resident_bytes() -> u64 {
    // Second field of /proc/self/statm is the resident page count.
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return 0;
    };
    let Some(pages) = statm
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse::<u64>().ok())
    else {
        return 0;
    };
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return 0;
    }
    pages * page_size as u64
}

#[cfg(not(target_os = "linux"))]
fn resident_bytes() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_a_noop() {
        let governor = MemoryGovernor::new();
        assert!(!governor.check_and_reclaim(u64::MAX));
    }

    #[test]
    fn reclaim_never_panics() {
        MemoryGovernor::new().reclaim();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn usage_is_nonzero_on_linux() {
        assert!(MemoryGovernor::new().usage() > 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn zero_threshold_triggers_reclaim() {
        assert!(MemoryGovernor::new().check_and_reclaim(0));
    }
}
