use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::cache::CacheStats;
use crate::wrapper::DispatchWrapper;

pub const DEFAULT_LAUNCH_LOG_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub count: u64,
    pub total_wall_time_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelAttrTelemetry {
    pub key: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelLaunchRecord {
    pub kernel: String,
    pub key: String,
    pub grid: Vec<u32>,
    pub block: Vec<u32>,
    pub out_size: u64,
    pub wall_time_ns: u64,
    pub attributes: Vec<KernelAttrTelemetry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackTelemetrySnapshot {
    pub pack: DispatchStats,
    pub packed_bytes: u64,
    pub cache: CacheStats,
    /// Recent kernel launches (bounded log; newest last)
    pub kernel_launches: Vec<KernelLaunchRecord>,
}

pub struct PackTelemetry {
    pack_count: AtomicU64,
    pack_wall_ns: AtomicU64,
    packed_bytes: AtomicU64,
    launches: Mutex<VecDeque<KernelLaunchRecord>>,
    capacity: usize,
}

impl Default for PackTelemetry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LAUNCH_LOG_CAPACITY)
    }
}

impl PackTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pack_count: AtomicU64::new(0),
            pack_wall_ns: AtomicU64::new(0),
            packed_bytes: AtomicU64::new(0),
            launches: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record_pack(&self, wrapper: &DispatchWrapper, out_size: usize, elapsed: Duration) {
        let wall_ns = saturating_duration_ns(elapsed);
        self.pack_count.fetch_add(1, Ordering::Relaxed);
        if wall_ns > 0 {
            self.pack_wall_ns.fetch_add(wall_ns, Ordering::Relaxed);
        }
        if out_size > 0 {
            self.packed_bytes
                .fetch_add(out_size as u64, Ordering::Relaxed);
        }
        self.record_launch(wrapper, out_size as u64, wall_ns);
    }

    fn record_launch(&self, wrapper: &DispatchWrapper, out_size: u64, wall_time_ns: u64) {
        if self.capacity == 0 {
            return;
        }
        let record = KernelLaunchRecord {
            kernel: wrapper.kernel_name().to_string(),
            key: wrapper.key().to_string(),
            grid: wrapper.grid().as_slice().to_vec(),
            block: wrapper.block().as_slice().to_vec(),
            out_size,
            wall_time_ns,
            attributes: wrapper
                .attributes()
                .known()
                .into_iter()
                .map(|(key, value)| KernelAttrTelemetry {
                    key: key.to_string(),
                    value,
                })
                .collect(),
        };
        let mut log = self.launches.lock().unwrap_or_else(PoisonError::into_inner);
        while log.len() >= self.capacity {
            log.pop_front();
        }
        log.push_back(record);
    }

    pub fn reset(&self) {
        self.pack_count.store(0, Ordering::Relaxed);
        self.pack_wall_ns.store(0, Ordering::Relaxed);
        self.packed_bytes.store(0, Ordering::Relaxed);
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn snapshot(&self, cache: CacheStats) -> PackTelemetrySnapshot {
        PackTelemetrySnapshot {
            pack: DispatchStats {
                count: self.pack_count.load(Ordering::Relaxed),
                total_wall_time_ns: self.pack_wall_ns.load(Ordering::Relaxed),
            },
            packed_bytes: self.packed_bytes.load(Ordering::Relaxed),
            cache,
            kernel_launches: self
                .launches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .cloned()
                .collect(),
        }
    }
}

fn saturating_duration_ns(duration: Duration) -> u64 {
    duration.as_nanos().min(u64::MAX as u128) as u64
}
