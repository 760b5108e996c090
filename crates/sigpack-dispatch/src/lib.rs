//! sigpack dispatch: kernel cache and packing operation.
//!
//! A [`Packer`] owns a [`KernelCache`] that loads one compiled kernel per
//! (element type, operation kind) and hands out [`DispatchWrapper`]s bound to a
//! launch geometry. [`Packer::pack`] flattens a typed buffer into its raw byte
//! image on the same storage class.
//!
//! Kernels come from a [`KernelLoader`]: in-process host kernels
//! ([`backend::host`]) or shared-library artifacts (`backend::dylib`, behind the
//! `dylib` feature). [`initialize_packer_with`] picks one from a [`PackerConfig`].

use std::sync::Arc;

pub mod backend;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod launch;
pub mod pack;
pub mod telemetry;
pub mod wrapper;

pub use cache::{CacheStats, KernelCache, KernelKey, KernelNaming};
pub use config::{BackendPreference, ConfigLoader, PackerConfig};
pub use diagnostics::{DiagnosticsSink, LogDiagnostics, NullDiagnostics};
pub use launch::{DefaultLaunchPolicy, FixedLaunchPolicy, LaunchPolicy};
pub use pack::{Packer, PACKED_DTYPE};
pub use telemetry::{KernelLaunchRecord, PackTelemetrySnapshot};
pub use wrapper::DispatchWrapper;

pub use sigpack_kernel_api::{
    DeviceBuffer, DispatchError, ElementType, KernelArgs, KernelAttributes, KernelHandle,
    KernelLoader, LaunchDims, LaunchShape, OpKind, PackElement, Result, StorageClass,
};

use backend::host::{host_multiprocessor_count, HostKernelLoader};

/// Build a [`Packer`] from configuration loaded with [`ConfigLoader::load`].
pub fn initialize_packer() -> anyhow::Result<Packer> {
    let config = ConfigLoader::load()?;
    initialize_packer_with(&config)
}

/// Select a kernel backend for `config` and wire the cache, launch policy and
/// diagnostics together.
pub fn initialize_packer_with(config: &PackerConfig) -> anyhow::Result<Packer> {
    let naming = KernelNaming::new(config.artifact_dir.clone(), config.symbol_prefix.clone());
    let (loader, multiprocessor_count) = select_loader(config, &naming)?;

    let policy = DefaultLaunchPolicy::new(
        config.threads_per_block,
        config.blocks_per_multiprocessor,
        config.multiprocessor_count.unwrap_or(multiprocessor_count),
    );
    let (threads_per_block, blocks_per_grid) = policy.default_launch_geometry();
    log::info!(
        "sigpack: using {} kernels from {} (threads_per_block={}, blocks_per_grid={})",
        loader.backend_name(),
        naming.artifact_dir().display(),
        threads_per_block,
        blocks_per_grid
    );

    let cache = KernelCache::new(loader, naming);
    Ok(Packer::new(cache, Arc::new(policy))
        .with_diagnostics(Arc::new(LogDiagnostics::new(
            config.debug_kernel_attributes,
        )))
        .with_launch_log_capacity(config.launch_log_capacity))
}

fn select_loader(
    config: &PackerConfig,
    naming: &KernelNaming,
) -> anyhow::Result<(Arc<dyn KernelLoader>, u32)> {
    let host = || -> (Arc<dyn KernelLoader>, u32) {
        let loader: Arc<dyn KernelLoader> = Arc::new(HostKernelLoader::new(naming.clone()));
        (loader, host_multiprocessor_count())
    };

    if config.backend == BackendPreference::Host {
        return Ok(host());
    }

    #[cfg(feature = "dylib")]
    {
        if naming.artifact_dir().is_dir() {
            let loader: Arc<dyn KernelLoader> = Arc::new(backend::dylib::DylibKernelLoader::new());
            return Ok((loader, host_multiprocessor_count()));
        }
    }

    let reason = if cfg!(feature = "dylib") {
        format!(
            "artifact directory {} not found",
            naming.artifact_dir().display()
        )
    } else {
        "built without the dylib feature".to_string()
    };

    match config.backend {
        BackendPreference::Auto => {
            log::debug!("sigpack: no shared-library kernels ({reason}); using host kernels");
            Ok(host())
        }
        _ if config.allow_host_fallback => {
            log::warn!("sigpack: shared-library kernels unavailable ({reason}); falling back to host kernels");
            Ok(host())
        }
        _ => Err(anyhow::anyhow!(
            "sigpack: shared-library kernels unavailable ({reason}) and host fallback is disabled"
        )),
    }
}
