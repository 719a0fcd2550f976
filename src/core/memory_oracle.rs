// src/core/memory_oracle.rs

//! Supplies the memory-pressure controller with a byte budget and the node's
//! current memory usage.

use async_trait::async_trait;
use std::fs;
use sysinfo::{Pid, System};

#[async_trait]
pub trait MemoryOracle: Send + Sync {
    /// The raw memory budget in bytes, or `None` if no ceiling is known (the
    /// controller then falls back to `VMM_DEFAULT`).
    fn raw_limit_bytes(&self) -> Option<u64>;

    /// Bytes currently in use by this node (its own process's resident set, by
    /// convention).
    fn used_bytes(&self) -> u64;
}

/// Reads a cgroup-aware system memory ceiling and this process's RSS via
/// `sysinfo`. On Linux, prefers a cgroup v2 `memory.max` limit, falling back to
/// cgroup v1's `memory.limit_in_bytes`, then to total system memory. Mirrors
/// `config::get_available_memory`'s preference order.
pub struct SysinfoMemoryOracle {
    system: std::sync::Mutex<System>,
    pid: Pid,
}

impl SysinfoMemoryOracle {
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_all();
        Self {
            system: std::sync::Mutex::new(system),
            pid: Pid::from_u32(std::process::id()),
        }
    }
}

impl Default for SysinfoMemoryOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOracle for SysinfoMemoryOracle {
    fn raw_limit_bytes(&self) -> Option<u64> {
        cgroup_limit_bytes().or_else(|| {
            let mut system = self.system.lock().unwrap();
            system.refresh_memory();
            Some(system.total_memory())
        })
    }

    fn used_bytes(&self) -> u64 {
        let mut system = self.system.lock().unwrap();
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
        system
            .process(self.pid)
            .map(|p| p.memory())
            .unwrap_or_default()
    }
}

#[cfg(target_os = "linux")]
fn cgroup_limit_bytes() -> Option<u64> {
    if let Ok(raw) = fs::read_to_string("/sys/fs/cgroup/memory.max") {
        let trimmed = raw.trim();
        if trimmed != "max"
            && let Ok(bytes) = trimmed.parse::<u64>()
        {
            return Some(bytes);
        }
    }
    if let Ok(raw) = fs::read_to_string("/sys/fs/cgroup/memory/memory.limit_in_bytes")
        && let Ok(bytes) = raw.trim().parse::<u64>()
    {
        const NEAR_UNLIMITED: u64 = 1 << 62;
        if bytes < NEAR_UNLIMITED {
            return Some(bytes);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn cgroup_limit_bytes() -> Option<u64> {
    None
}

/// A fixed-value oracle for tests: reports a constant limit and a constant usage
/// that the test can mutate to simulate pressure changes over time.
pub struct FixedMemoryOracle {
    limit: std::sync::atomic::AtomicU64,
    used: std::sync::atomic::AtomicU64,
}

impl FixedMemoryOracle {
    pub fn new(limit: u64, used: u64) -> Self {
        Self {
            limit: std::sync::atomic::AtomicU64::new(limit),
            used: std::sync::atomic::AtomicU64::new(used),
        }
    }

    pub fn set_used(&self, used: u64) {
        self.used.store(used, std::sync::atomic::Ordering::SeqCst);
    }
}

impl MemoryOracle for FixedMemoryOracle {
    fn raw_limit_bytes(&self) -> Option<u64> {
        Some(self.limit.load(std::sync::atomic::Ordering::SeqCst))
    }

    fn used_bytes(&self) -> u64 {
        self.used.load(std::sync::atomic::Ordering::SeqCst)
    }
}
