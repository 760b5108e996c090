//! Platform adapters satisfying the kernel loader/handle contract.

pub mod host;
#[cfg(feature = "dylib")]
pub mod dylib;
