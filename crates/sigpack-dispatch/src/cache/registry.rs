use sigpack_kernel_api::{
    DispatchError, ElementType, KernelHandle, KernelLoader, LaunchDims, LaunchShape, OpKind,
    Result,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::key::{KernelKey, KernelNaming};
use super::metrics::{CacheMetrics, CacheStats};
use crate::wrapper::DispatchWrapper;

/// Memoizes compiled kernels per (element type, operation kind).
///
/// Each key is loaded at most once and never evicted. Loading happens outside
/// the lock; when two threads race on the same key the first handle installed
/// wins and the other is dropped.
pub struct KernelCache {
    entries: RwLock<HashMap<KernelKey, Arc<dyn KernelHandle>>>,
    loader: Arc<dyn KernelLoader>,
    naming: KernelNaming,
    metrics: CacheMetrics,
}

impl KernelCache {
    pub fn new(loader: Arc<dyn KernelLoader>, naming: KernelNaming) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            loader,
            naming,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn naming(&self) -> &KernelNaming {
        &self.naming
    }

    pub fn backend_name(&self) -> &'static str {
        self.loader.backend_name()
    }

    // Entries are immutable once inserted, so a poisoned map is still consistent.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<KernelKey, Arc<dyn KernelHandle>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<KernelKey, Arc<dyn KernelHandle>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make sure the kernel for `(dtype, op_kind)` is loaded. No-op on a hit.
    pub fn ensure_loaded(&self, dtype: ElementType, op_kind: OpKind) -> Result<()> {
        let key = KernelKey::new(dtype, op_kind);
        if self.read_entries().contains_key(&key) {
            self.metrics.inc_hit();
            return Ok(());
        }
        self.metrics.inc_miss();

        let artifact = self.naming.artifact_path(op_kind);
        let symbol = self.naming.symbol_name(op_kind, dtype);
        log::debug!(
            "sigpack: loading kernel {symbol} from {} ({} backend)",
            artifact.display(),
            self.loader.backend_name()
        );
        let kernel = self.loader.load(&artifact, &symbol)?;

        match self.write_entries().entry(key) {
            Entry::Occupied(_) => {
                log::debug!("sigpack: kernel {key} installed concurrently; dropping duplicate load");
            }
            Entry::Vacant(slot) => {
                slot.insert(kernel);
                self.metrics.inc_load();
            }
        }
        Ok(())
    }

    /// String-typed variant of [`ensure_loaded`](Self::ensure_loaded). Names outside
    /// the supported set fail with [`DispatchError::UnsupportedType`] and leave the
    /// cache untouched.
    pub fn ensure_loaded_named(&self, type_name: &str, op_kind: OpKind) -> Result<ElementType> {
        let dtype = ElementType::for_kernel(type_name, op_kind)?;
        self.ensure_loaded(dtype, op_kind)?;
        Ok(dtype)
    }

    /// Load several kernels of one family, stopping at the first failure.
    pub fn warm(&self, op_kind: OpKind, dtypes: &[ElementType]) -> Result<()> {
        for &dtype in dtypes {
            self.ensure_loaded(dtype, op_kind)?;
        }
        Ok(())
    }

    /// Bind the cached kernel to a launch geometry. The key must have been loaded
    /// with [`ensure_loaded`](Self::ensure_loaded) first.
    pub fn resolve(
        &self,
        dtype: ElementType,
        op_kind: OpKind,
        grid: impl Into<LaunchShape>,
        block: impl Into<LaunchShape>,
    ) -> Result<DispatchWrapper> {
        let key = KernelKey::new(dtype, op_kind);
        let kernel = self
            .read_entries()
            .get(&key)
            .cloned()
            .ok_or(DispatchError::KernelNotFound {
                type_name: dtype,
                op_kind,
            })?;
        Ok(DispatchWrapper::new(key, LaunchDims::new(grid, block), kernel))
    }

    pub fn contains(&self, dtype: ElementType, op_kind: OpKind) -> bool {
        self.read_entries()
            .contains_key(&KernelKey::new(dtype, op_kind))
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached keys in sorted order.
    pub fn keys(&self) -> Vec<KernelKey> {
        let mut keys: Vec<KernelKey> = self.read_entries().keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }

    pub fn reset_stats(&self) {
        self.metrics.reset();
    }
}

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache")
            .field("backend", &self.loader.backend_name())
            .field("naming", &self.naming)
            .field("keys", &self.keys())
            .finish()
    }
}
