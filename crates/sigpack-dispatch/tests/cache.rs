use sigpack_dispatch::backend::host::HostKernelLoader;
use sigpack_dispatch::{
    DispatchError, ElementType, KernelArgs, KernelCache, KernelHandle, KernelLoader, KernelNaming,
    LaunchDims, LaunchShape, OpKind,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

struct NoopKernel(String);

impl KernelHandle for NoopKernel {
    fn name(&self) -> &str {
        &self.0
    }

    fn launch(&self, _dims: &LaunchDims, _args: KernelArgs<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Counts every load request and hands out a fresh handle each time.
#[derive(Default)]
struct CountingLoader {
    loads: AtomicUsize,
}

impl CountingLoader {
    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl KernelLoader for CountingLoader {
    fn load(&self, _artifact: &Path, symbol: &str) -> anyhow::Result<Arc<dyn KernelHandle>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(NoopKernel(symbol.to_string())))
    }
}

struct FailingLoader;

impl KernelLoader for FailingLoader {
    fn load(&self, artifact: &Path, _symbol: &str) -> anyhow::Result<Arc<dyn KernelHandle>> {
        Err(anyhow::anyhow!("cannot open {}", artifact.display()))
    }
}

fn counting_cache() -> (Arc<CountingLoader>, KernelCache) {
    let loader = Arc::new(CountingLoader::default());
    let cache = KernelCache::new(loader.clone(), KernelNaming::default());
    (loader, cache)
}

#[test]
fn every_supported_type_loads_once_and_resolves_repeatedly() {
    let (loader, cache) = counting_cache();
    for dtype in ElementType::ALL {
        cache.ensure_loaded(dtype, OpKind::PACK).unwrap();
        let first = cache.resolve(dtype, OpKind::PACK, 160u32, 512u32).unwrap();
        cache.ensure_loaded(dtype, OpKind::PACK).unwrap();
        let second = cache.resolve(dtype, OpKind::PACK, 160u32, 512u32).unwrap();

        assert!(first.same_kernel(&second), "{dtype}: handle changed");
        assert_eq!(first.kernel_name(), format!("_sigpack_pack_{dtype}"));
    }
    assert_eq!(loader.loads(), ElementType::ALL.len());
    assert_eq!(cache.len(), ElementType::ALL.len());
}

#[test]
fn resolve_normalizes_scalar_geometry() {
    let (_, cache) = counting_cache();
    cache.ensure_loaded(ElementType::UInt8, OpKind::PACK).unwrap();
    let wrapper = cache
        .resolve(ElementType::UInt8, OpKind::PACK, 160u32, (8u32, 8u32))
        .unwrap();
    assert_eq!(wrapper.grid(), LaunchShape::from([160u32]));
    assert_eq!(wrapper.grid().as_slice(), &[160]);
    assert_eq!(wrapper.block().as_slice(), &[8, 8]);
}

#[test]
fn unsupported_type_names_type_and_op_and_leaves_cache_unchanged() {
    let (loader, cache) = counting_cache();
    cache.ensure_loaded(ElementType::UInt8, OpKind::PACK).unwrap();

    let err = cache
        .ensure_loaded_named("float16", OpKind::PACK)
        .unwrap_err();
    assert!(err.is_unsupported_type());
    let msg = err.to_string();
    assert!(msg.contains("float16"), "{msg}");
    assert!(msg.contains("pack"), "{msg}");

    assert_eq!(cache.len(), 1);
    assert_eq!(loader.loads(), 1);
}

#[test]
fn named_loading_accepts_supported_names() {
    let (_, cache) = counting_cache();
    let dtype = cache
        .ensure_loaded_named("complex128", OpKind::PACK)
        .unwrap();
    assert_eq!(dtype, ElementType::Complex128);
    assert!(cache.contains(ElementType::Complex128, OpKind::PACK));
}

#[test]
fn resolve_without_load_is_kernel_not_found() {
    let (loader, cache) = counting_cache();
    let err = cache
        .resolve(ElementType::Float32, OpKind::PACK, 1u32, 1u32)
        .err()
        .expect("resolve should not auto-load");
    assert!(matches!(
        err,
        DispatchError::KernelNotFound {
            type_name: ElementType::Float32,
            ..
        }
    ));
    assert_eq!(loader.loads(), 0);
    assert!(cache.is_empty());
}

#[test]
fn loader_failures_pass_through_as_backend_errors() {
    let cache = KernelCache::new(Arc::new(FailingLoader), KernelNaming::new("/nowhere", "_p"));
    let err = cache
        .ensure_loaded(ElementType::UInt8, OpKind::PACK)
        .unwrap_err();
    assert!(err.is_backend());
    assert_eq!(err.to_string(), "cannot open /nowhere/pack_kernel_artifact");
    assert!(cache.is_empty());
}

#[test]
fn concurrent_loads_install_exactly_one_handle() {
    let (loader, cache) = counting_cache();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let wrappers: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    cache.ensure_loaded(ElementType::Int32, OpKind::PACK).unwrap();
                    cache
                        .resolve(ElementType::Int32, OpKind::PACK, 1u32, 1u32)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(cache.len(), 1);
    assert!(loader.loads() >= 1);
    assert_eq!(cache.stats().loads, 1);
    for wrapper in &wrappers[1..] {
        assert!(wrapper.same_kernel(&wrappers[0]));
    }
}

#[test]
fn host_loader_backs_the_cache() {
    let cache = KernelCache::new(
        Arc::new(HostKernelLoader::new(KernelNaming::default())),
        KernelNaming::default(),
    );
    cache
        .warm(OpKind::PACK, &[ElementType::UInt8, ElementType::Float64])
        .unwrap();
    assert_eq!(cache.backend_name(), "host");

    let err = cache
        .ensure_loaded(ElementType::UInt8, OpKind::new("unpack"))
        .unwrap_err();
    assert!(err.is_backend());
    assert_eq!(cache.len(), 2);
}
