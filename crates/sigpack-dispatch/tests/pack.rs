use num_complex::Complex;
use sigpack_dispatch::backend::host::HostKernelLoader;
use sigpack_dispatch::{
    DeviceBuffer, DiagnosticsSink, DispatchWrapper, ElementType, FixedLaunchPolicy, KernelArgs,
    KernelCache, KernelHandle, KernelLoader, KernelNaming, LaunchDims, NullDiagnostics, Packer,
    StorageClass, PACKED_DTYPE,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

fn host_packer() -> Packer {
    let naming = KernelNaming::default();
    let cache = KernelCache::new(Arc::new(HostKernelLoader::new(naming.clone())), naming);
    Packer::new(
        cache,
        Arc::new(FixedLaunchPolicy {
            threads_per_block: 512,
            blocks_per_grid: 160,
        }),
    )
    .with_diagnostics(Arc::new(NullDiagnostics))
}

#[derive(Default)]
struct RecordingSink {
    launches: Mutex<Vec<(String, Vec<u32>, Vec<u32>)>>,
}

impl DiagnosticsSink for RecordingSink {
    fn report_launch_attributes(&self, wrapper: &DispatchWrapper) {
        self.launches.lock().unwrap().push((
            wrapper.kernel_name().to_string(),
            wrapper.grid().as_slice().to_vec(),
            wrapper.block().as_slice().to_vec(),
        ));
    }
}

struct FailingKernel;

impl KernelHandle for FailingKernel {
    fn name(&self) -> &str {
        "failing"
    }

    fn launch(&self, _dims: &LaunchDims, _args: KernelArgs<'_>) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("device lost during launch"))
    }
}

struct FailingKernelLoader;

impl KernelLoader for FailingKernelLoader {
    fn load(&self, _artifact: &Path, _symbol: &str) -> anyhow::Result<Arc<dyn KernelHandle>> {
        Ok(Arc::new(FailingKernel))
    }
}

#[test]
fn four_float32_values_pack_into_sixteen_bytes() {
    let packer = host_packer();
    let input = DeviceBuffer::from_slice(&[1.0f32, 2.0, 3.0, 4.0]);
    let out = packer.pack(&input).unwrap();

    assert_eq!(out.dtype(), PACKED_DTYPE);
    assert_eq!(out.len(), 16);
    assert_eq!(out.byte_len(), 16);
    assert_eq!(out.as_bytes(), input.as_bytes());
    assert_eq!(out.to_vec::<u8>().unwrap().len(), 16);
}

#[test]
fn packed_size_is_element_count_times_width_for_every_type() {
    let packer = host_packer();
    for dtype in ElementType::ALL {
        for count in [0usize, 1, 7, 1000] {
            let input = DeviceBuffer::zeroed(dtype, count, StorageClass::Host);
            let out = packer.pack(&input).unwrap();
            assert_eq!(out.len(), count * dtype.byte_width(), "{dtype} x {count}");
        }
    }
    // Only the byte kernel is ever needed.
    assert_eq!(packer.cache().len(), 1);
}

#[test]
fn complex_values_keep_their_native_byte_image() {
    let packer = host_packer();
    let values = [Complex::new(1.5f64, -2.0), Complex::new(0.0, 3.25)];
    let input = DeviceBuffer::from_slice(&values);
    let out = packer.pack(&input).unwrap();

    let mut expected = Vec::new();
    for v in &values {
        expected.extend_from_slice(&v.re.to_ne_bytes());
        expected.extend_from_slice(&v.im.to_ne_bytes());
    }
    assert_eq!(out.as_bytes(), expected.as_slice());
}

#[test]
fn explicit_geometry_reaches_the_wrapper() {
    let sink = Arc::new(RecordingSink::default());
    let packer = host_packer().with_diagnostics(sink.clone());
    let input = DeviceBuffer::from_slice(&(0i16..300).collect::<Vec<_>>());

    packer.pack_with(&input, (2u32, 2u32), 64u32).unwrap();
    packer.pack(&input).unwrap();

    let launches = sink.launches.lock().unwrap();
    assert_eq!(launches.len(), 2);
    assert_eq!(launches[0].0, "_sigpack_pack_uint8");
    assert_eq!(launches[0].1, vec![2, 2]);
    assert_eq!(launches[0].2, vec![64]);
    assert_eq!(launches[1].1, vec![160]);
    assert_eq!(launches[1].2, vec![512]);
}

#[test]
fn device_input_fails_on_host_backend() {
    let packer = host_packer();
    let input =
        DeviceBuffer::from_slice(&[1u32, 2, 3]).with_storage(StorageClass::Device { device_id: 0 });
    let err = packer.pack(&input).unwrap_err();
    assert!(err.is_backend());
    assert!(err.to_string().contains("host buffers"));
}

#[test]
fn launch_failures_propagate_unchanged() {
    let cache = KernelCache::new(Arc::new(FailingKernelLoader), KernelNaming::default());
    let sink = Arc::new(RecordingSink::default());
    let packer = Packer::new(
        cache,
        Arc::new(FixedLaunchPolicy {
            threads_per_block: 1,
            blocks_per_grid: 1,
        }),
    )
    .with_diagnostics(sink.clone());

    let err = packer
        .pack(&DeviceBuffer::from_slice(&[1u8]))
        .unwrap_err();
    assert!(err.is_backend());
    assert_eq!(err.to_string(), "device lost during launch");
    assert!(sink.launches.lock().unwrap().is_empty());
    assert_eq!(packer.telemetry_snapshot().pack.count, 0);
}

#[test]
fn telemetry_counts_packs_and_bounds_the_launch_log() {
    let packer = host_packer().with_launch_log_capacity(2);
    let input = DeviceBuffer::from_slice(&[0u16; 8]);
    for _ in 0..5 {
        packer.pack(&input).unwrap();
    }

    let snapshot = packer.telemetry_snapshot();
    assert_eq!(snapshot.pack.count, 5);
    assert_eq!(snapshot.packed_bytes, 80);
    assert_eq!(snapshot.kernel_launches.len(), 2);
    assert_eq!(snapshot.kernel_launches[1].out_size, 16);
    assert_eq!(snapshot.kernel_launches[1].key, "(uint8, 'pack')");
    assert_eq!(snapshot.cache.loads, 1);
    assert_eq!(snapshot.cache.hits, 4);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["pack"]["count"], 5);

    packer.reset_telemetry();
    let cleared = packer.telemetry_snapshot();
    assert_eq!(cleared.pack.count, 0);
    assert!(cleared.kernel_launches.is_empty());
    assert_eq!(cleared.cache.entries, 1);
}
