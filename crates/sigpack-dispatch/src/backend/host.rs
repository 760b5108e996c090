use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use sigpack_kernel_api::{
    ElementType, KernelArgs, KernelAttributes, KernelHandle, KernelLoader, LaunchDims, OpKind,
    StorageClass,
};
use std::path::Path;
use std::sync::Arc;

use crate::cache::KernelNaming;

const HOST_MAX_THREADS_PER_BLOCK: u32 = 1024;

static HOST_PARALLELISM: Lazy<u32> = Lazy::new(|| {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
});

/// Worker threads available to host kernels; used as the multiprocessor count.
pub fn host_multiprocessor_count() -> u32 {
    *HOST_PARALLELISM
}

/// Resolves pack symbols to in-process kernels. The artifact path is accepted
/// but not read: host kernels are built into the crate.
#[derive(Debug, Clone, Default)]
pub struct HostKernelLoader {
    naming: KernelNaming,
}

impl HostKernelLoader {
    pub fn new(naming: KernelNaming) -> Self {
        Self { naming }
    }
}

impl KernelLoader for HostKernelLoader {
    fn load(&self, artifact: &Path, symbol: &str) -> Result<Arc<dyn KernelHandle>> {
        let (op, dtype) = self.naming.parse_symbol(symbol).ok_or_else(|| {
            anyhow!(
                "host backend: symbol '{symbol}' not found in {}",
                artifact.display()
            )
        })?;
        if op != OpKind::PACK.as_str() {
            bail!("host backend: no '{op}' kernels (requested {symbol})");
        }
        Ok(Arc::new(HostPackKernel::new(symbol, dtype)))
    }

    fn backend_name(&self) -> &'static str {
        "host"
    }
}

/// Copies the input's byte image into the output with a grid-stride loop,
/// one stride per lane of the launch.
#[derive(Debug, Clone)]
pub struct HostPackKernel {
    name: String,
    dtype: ElementType,
}

impl HostPackKernel {
    pub fn new(name: impl Into<String>, dtype: ElementType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

impl KernelHandle for HostPackKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> KernelAttributes {
        KernelAttributes {
            max_threads_per_block: Some(HOST_MAX_THREADS_PER_BLOCK),
            num_regs: Some(0),
            shared_size_bytes: Some(0),
            const_size_bytes: Some(0),
            local_size_bytes: Some(0),
            ..KernelAttributes::named(self.name.as_str())
        }
    }

    fn launch(&self, dims: &LaunchDims, args: KernelArgs<'_>) -> Result<()> {
        let KernelArgs {
            out_size,
            input,
            output,
        } = args;

        if input.storage() != StorageClass::Host || output.storage() != StorageClass::Host {
            bail!(
                "{}: host kernels need host buffers (input {:?}, output {:?})",
                self.name,
                input.storage(),
                output.storage()
            );
        }
        if output.dtype() != self.dtype {
            bail!(
                "{}: compiled for {} output, got {}",
                self.name,
                self.dtype,
                output.dtype()
            );
        }
        if dims.block.volume() > HOST_MAX_THREADS_PER_BLOCK as u64 {
            bail!(
                "{}: block {} exceeds {} threads",
                self.name,
                dims.block,
                HOST_MAX_THREADS_PER_BLOCK
            );
        }
        let lanes = dims.total_lanes();
        if lanes == 0 {
            bail!("{}: empty launch geometry {}", self.name, dims);
        }
        if out_size > input.byte_len() || out_size > output.byte_len() {
            bail!(
                "{}: out_size {} exceeds buffers (input {} bytes, output {} bytes)",
                self.name,
                out_size,
                input.byte_len(),
                output.byte_len()
            );
        }

        let src = &input.as_bytes()[..out_size];
        let dst = &mut output.as_bytes_mut()[..out_size];
        let stride = usize::try_from(lanes).unwrap_or(usize::MAX);
        for lane in 0..stride.min(out_size) {
            let mut i = lane;
            while i < out_size {
                dst[i] = src[i];
                i += stride;
            }
        }
        Ok(())
    }
}
