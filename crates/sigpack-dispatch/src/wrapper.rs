use sigpack_kernel_api::{
    DeviceBuffer, KernelArgs, KernelAttributes, KernelHandle, LaunchDims, LaunchShape, Result,
};
use std::sync::Arc;

use crate::cache::KernelKey;

/// A resolved kernel bound to its launch geometry. Built fresh by
/// [`KernelCache::resolve`](crate::KernelCache::resolve) for every call.
#[derive(Clone)]
pub struct DispatchWrapper {
    key: KernelKey,
    dims: LaunchDims,
    kernel: Arc<dyn KernelHandle>,
}

impl DispatchWrapper {
    pub(crate) fn new(key: KernelKey, dims: LaunchDims, kernel: Arc<dyn KernelHandle>) -> Self {
        Self { key, dims, kernel }
    }

    pub fn key(&self) -> KernelKey {
        self.key
    }

    pub fn dims(&self) -> &LaunchDims {
        &self.dims
    }

    pub fn grid(&self) -> LaunchShape {
        self.dims.grid
    }

    pub fn block(&self) -> LaunchShape {
        self.dims.block
    }

    pub fn kernel_name(&self) -> &str {
        self.kernel.name()
    }

    pub fn attributes(&self) -> KernelAttributes {
        self.kernel.attributes()
    }

    /// True when both wrappers are bound to the same cached kernel handle.
    pub fn same_kernel(&self, other: &DispatchWrapper) -> bool {
        Arc::ptr_eq(&self.kernel, &other.kernel)
    }

    /// Launch with `(out_size, input, output)`. The output is populated in place.
    pub fn invoke(
        &self,
        out_size: usize,
        input: &DeviceBuffer,
        output: &mut DeviceBuffer,
    ) -> Result<()> {
        let args = KernelArgs {
            out_size,
            input,
            output,
        };
        self.kernel.launch(&self.dims, args)?;
        Ok(())
    }
}

impl std::fmt::Debug for DispatchWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchWrapper")
            .field("key", &self.key)
            .field("kernel", &self.kernel.name())
            .field("grid", &self.dims.grid.as_slice())
            .field("block", &self.dims.block.as_slice())
            .finish()
    }
}
