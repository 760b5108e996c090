use sigpack_kernel_api::{DeviceBuffer, ElementType, LaunchShape, OpKind, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::KernelCache;
use crate::diagnostics::{DiagnosticsSink, LogDiagnostics};
use crate::launch::LaunchPolicy;
use crate::telemetry::{PackTelemetry, PackTelemetrySnapshot};

/// Element type of every packed output buffer.
pub const PACKED_DTYPE: ElementType = ElementType::UInt8;

/// Owns the kernel cache and the collaborators the packing operation needs.
pub struct Packer {
    cache: KernelCache,
    policy: Arc<dyn LaunchPolicy>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    telemetry: PackTelemetry,
}

impl Packer {
    pub fn new(cache: KernelCache, policy: Arc<dyn LaunchPolicy>) -> Self {
        Self {
            cache,
            policy,
            diagnostics: Arc::new(LogDiagnostics::default()),
            telemetry: PackTelemetry::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_launch_log_capacity(mut self, capacity: usize) -> Self {
        self.telemetry = PackTelemetry::with_capacity(capacity);
        self
    }

    pub fn cache(&self) -> &KernelCache {
        &self.cache
    }

    pub fn launch_geometry(&self) -> (u32, u32) {
        self.policy.default_launch_geometry()
    }

    /// Pack `input` into a raw byte buffer of `dtype width * len` bytes, stored
    /// in the same storage class as the input.
    pub fn pack(&self, input: &DeviceBuffer) -> Result<DeviceBuffer> {
        let (threads_per_block, blocks_per_grid) = self.policy.default_launch_geometry();
        self.pack_with(input, blocks_per_grid, threads_per_block)
    }

    /// [`pack`](Self::pack) with an explicit launch geometry.
    pub fn pack_with(
        &self,
        input: &DeviceBuffer,
        grid: impl Into<LaunchShape>,
        block: impl Into<LaunchShape>,
    ) -> Result<DeviceBuffer> {
        let data_size = input.dtype().byte_width() * input.len();
        let out_size = data_size;
        let mut out = DeviceBuffer::zeroed(PACKED_DTYPE, out_size, input.storage());

        self.cache.ensure_loaded(out.dtype(), OpKind::PACK)?;
        let kernel = self
            .cache
            .resolve(out.dtype(), OpKind::PACK, grid, block)?;

        let started = Instant::now();
        kernel.invoke(out_size, input, &mut out)?;
        self.telemetry
            .record_pack(&kernel, out_size, started.elapsed());
        self.diagnostics.report_launch_attributes(&kernel);

        Ok(out)
    }

    pub fn telemetry_snapshot(&self) -> PackTelemetrySnapshot {
        self.telemetry.snapshot(self.cache.stats())
    }

    pub fn reset_telemetry(&self) {
        self.telemetry.reset();
        self.cache.reset_stats();
    }
}

impl std::fmt::Debug for Packer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packer")
            .field("cache", &self.cache)
            .field("launch_geometry", &self.launch_geometry())
            .finish()
    }
}
