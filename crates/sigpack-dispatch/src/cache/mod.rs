//! Kernel cache: one compiled kernel per (element type, operation kind).

mod key;
mod metrics;
mod registry;

pub use key::{KernelKey, KernelNaming, DEFAULT_ARTIFACT_DIR, DEFAULT_SYMBOL_PREFIX};
pub use metrics::{CacheMetrics, CacheStats};
pub use registry::KernelCache;
