//! sigpack kernel API: the contract between the dispatch cache and kernel backends.
//!
//! - Closed set of element types kernels are compiled for ([`ElementType`]).
//! - Launch geometry ([`LaunchShape`], [`LaunchDims`]) and kernel buffers ([`DeviceBuffer`]).
//! - Capability traits implemented by platform adapters ([`KernelHandle`], [`KernelLoader`]).
//! - The error taxonomy surfaced to callers of the packing operation ([`DispatchError`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

mod buffer;
mod dtype;
mod launch;

pub use buffer::{DeviceBuffer, StorageClass};
pub use dtype::{ElementType, PackElement};
pub use launch::{LaunchDims, LaunchShape};

/// Tag naming a family of kernels, e.g. `"pack"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpKind(&'static str);

impl OpKind {
    pub const PACK: OpKind = OpKind("pack");

    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Arguments of one packing launch: `(out_size, input, output)`.
pub struct KernelArgs<'a> {
    pub out_size: usize,
    pub input: &'a DeviceBuffer,
    pub output: &'a mut DeviceBuffer,
}

/// Static attributes a backend can report about a loaded kernel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelAttributes {
    pub name: String,
    pub max_threads_per_block: Option<u32>,
    pub num_regs: Option<u32>,
    pub max_dynamic_shared_size_bytes: Option<u32>,
    pub shared_size_bytes: Option<u32>,
    pub const_size_bytes: Option<u32>,
    pub local_size_bytes: Option<u32>,
    pub ptx_version: Option<u32>,
    pub binary_version: Option<u32>,
}

impl KernelAttributes {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The attributes that are known, as `(key, value)` pairs.
    pub fn known(&self) -> Vec<(&'static str, u64)> {
        [
            ("max_threads_per_block", self.max_threads_per_block),
            ("num_regs", self.num_regs),
            (
                "max_dynamic_shared_size_bytes",
                self.max_dynamic_shared_size_bytes,
            ),
            ("shared_size_bytes", self.shared_size_bytes),
            ("const_size_bytes", self.const_size_bytes),
            ("local_size_bytes", self.local_size_bytes),
            ("ptx_version", self.ptx_version),
            ("binary_version", self.binary_version),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v as u64)))
        .collect()
    }
}

/// A compiled kernel that can be launched with a given geometry.
///
/// Handles are owned by the dispatch cache; callers reach them only through
/// dispatch wrappers.
pub trait KernelHandle: Send + Sync {
    fn name(&self) -> &str;

    fn attributes(&self) -> KernelAttributes {
        KernelAttributes::named(self.name())
    }

    /// Run the kernel over `dims`, populating `args.output` in place.
    fn launch(&self, dims: &LaunchDims, args: KernelArgs<'_>) -> anyhow::Result<()>;
}

/// Loads a kernel symbol out of a compiled artifact.
pub trait KernelLoader: Send + Sync {
    fn load(&self, artifact: &Path, symbol: &str) -> anyhow::Result<Arc<dyn KernelHandle>>;

    /// Short backend label used in logs.
    fn backend_name(&self) -> &'static str {
        "unknown"
    }
}

/// Errors returned by the kernel cache and the packing operation.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The element type is outside the set kernels are compiled for.
    #[error("Datatype {type_name} not found for '{op_kind}'")]
    UnsupportedType { type_name: String, op_kind: OpKind },

    /// `resolve` was called for a key that was never loaded.
    #[error("Kernel '{op_kind}' for datatype {type_name} not found in kernel cache")]
    KernelNotFound {
        type_name: ElementType,
        op_kind: OpKind,
    },

    /// Loader or launch failure, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, DispatchError::UnsupportedType { .. })
    }

    pub fn is_kernel_not_found(&self) -> bool {
        matches!(self, DispatchError::KernelNotFound { .. })
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, DispatchError::Backend(_))
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
