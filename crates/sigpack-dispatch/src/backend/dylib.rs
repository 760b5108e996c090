use anyhow::{anyhow, bail, Context, Result};
use libloading::{Library, Symbol};
use sigpack_kernel_api::{KernelArgs, KernelHandle, KernelLoader, LaunchDims, StorageClass};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Entry point exported by shared-library pack kernels.
///
/// `fn(grid, grid_rank, block, block_rank, out_size, input, output) -> status`,
/// a non-zero status is a launch failure.
type PackKernelFn =
    unsafe extern "C" fn(*const u32, u32, *const u32, u32, u64, *const u8, *mut u8) -> i32;

/// Loads kernels from shared libraries. Each artifact is opened once and kept
/// open for as long as any kernel from it is alive.
#[derive(Default)]
pub struct DylibKernelLoader {
    libraries: Mutex<HashMap<PathBuf, Arc<Library>>>,
}

impl DylibKernelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// The artifact as named, or the platform library filename next to it
    /// (`libpack_kernel_artifact.so` on Linux) when the bare name is missing.
    pub fn resolve_artifact(artifact: &Path) -> PathBuf {
        if artifact.exists() {
            return artifact.to_path_buf();
        }
        match artifact.file_name() {
            Some(name) => artifact.with_file_name(libloading::library_filename(name)),
            None => artifact.to_path_buf(),
        }
    }

    fn open(&self, artifact: &Path) -> Result<Arc<Library>> {
        let path = Self::resolve_artifact(artifact);
        let mut libraries = self
            .libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(lib) = libraries.get(&path) {
            return Ok(lib.clone());
        }
        // SAFETY: kernel artifacts are trusted shared objects; their initialisers
        // are expected to be side-effect free.
        let lib = unsafe { Library::new(&path) }
            .with_context(|| format!("failed to load kernel artifact {}", path.display()))?;
        let lib = Arc::new(lib);
        libraries.insert(path, lib.clone());
        Ok(lib)
    }
}

impl KernelLoader for DylibKernelLoader {
    fn load(&self, artifact: &Path, symbol: &str) -> Result<Arc<dyn KernelHandle>> {
        let library = self.open(artifact)?;
        // SAFETY: the symbol is declared with the `PackKernelFn` ABI by the
        // artifact's build.
        let entry = unsafe {
            let sym: Symbol<PackKernelFn> = library.get(symbol.as_bytes()).map_err(|e| {
                anyhow!(
                    "kernel function '{symbol}' not found in {}: {e}",
                    artifact.display()
                )
            })?;
            *sym
        };
        Ok(Arc::new(DylibKernel {
            name: symbol.to_string(),
            entry,
            _library: library,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "dylib"
    }
}

pub struct DylibKernel {
    name: String,
    entry: PackKernelFn,
    // Keeps `entry` valid.
    _library: Arc<Library>,
}

impl KernelHandle for DylibKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch(&self, dims: &LaunchDims, args: KernelArgs<'_>) -> Result<()> {
        let KernelArgs {
            out_size,
            input,
            output,
        } = args;
        if input.storage() != StorageClass::Host || output.storage() != StorageClass::Host {
            bail!("{}: shared-library kernels need host buffers", self.name);
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

        let grid = dims.grid.as_slice();
        let block = dims.block.as_slice();
        // SAFETY: both buffers hold at least `out_size` bytes and outlive the call.
        let status = unsafe {
            (self.entry)(
                grid.as_ptr(),
                grid.len() as u32,
                block.as_ptr(),
                block.len() as u32,
                out_size as u64,
                input.as_bytes().as_ptr(),
                output.as_bytes_mut().as_mut_ptr(),
            )
        };
        if status != 0 {
            bail!("{}: kernel returned status {status} ({dims})", self.name);
        }
        Ok(())
    }
}
