use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::dtype::{ElementType, PackElement};

/// Where a buffer's storage is expected to live when a kernel touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageClass {
    Host,
    Device { device_id: u32 },
}

impl Default for StorageClass {
    fn default() -> Self {
        StorageClass::Host
    }
}

/// A typed, one-dimensional buffer handed to packing kernels.
///
/// The bytes are the native-endian image of `len` elements of `dtype`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBuffer {
    dtype: ElementType,
    len: usize,
    storage: StorageClass,
    bytes: Vec<u8>,
}

impl DeviceBuffer {
    pub fn from_slice<T: PackElement>(data: &[T]) -> Self {
        Self {
            dtype: T::DTYPE,
            len: data.len(),
            storage: StorageClass::Host,
            bytes: bytemuck::cast_slice(data).to_vec(),
        }
    }

    /// Wrap raw bytes. The byte count must be a whole number of elements.
    pub fn from_bytes(dtype: ElementType, bytes: Vec<u8>, storage: StorageClass) -> Result<Self> {
        let width = dtype.byte_width();
        if bytes.len() % width != 0 {
            return Err(anyhow!(
                "buffer of {} bytes is not a whole number of {} elements ({} bytes each)",
                bytes.len(),
                dtype,
                width
            ));
        }
        Ok(Self {
            dtype,
            len: bytes.len() / width,
            storage,
            bytes,
        })
    }

    /// Allocate `len` zeroed elements of `dtype`.
    pub fn zeroed(dtype: ElementType, len: usize, storage: StorageClass) -> Self {
        Self {
            dtype,
            len,
            storage,
            bytes: vec![0u8; len * dtype.byte_width()],
        }
    }

    pub fn with_storage(mut self, storage: StorageClass) -> Self {
        self.storage = storage;
        self
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn storage(&self) -> StorageClass {
        self.storage
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Copy the elements out as `T`. Returns `None` when `T` does not match the
    /// buffer's element type.
    pub fn to_vec<T: PackElement>(&self) -> Option<Vec<T>> {
        if T::DTYPE != self.dtype {
            return None;
        }
        Some(
            self.bytes
                .chunks_exact(self.dtype.byte_width())
                .map(bytemuck::pod_read_unaligned::<T>)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn from_slice_records_dtype_and_byte_image() {
        let buf = DeviceBuffer::from_slice(&[1.0f32, 2.0, 3.0, 4.0]);
        assert_eq!(buf.dtype(), ElementType::Float32);
        assert_eq!(buf.len(), 4);
        assert_eq!(buf.byte_len(), 16);
        assert_eq!(&buf.as_bytes()[..4], &1.0f32.to_ne_bytes());
        assert_eq!(buf.storage(), StorageClass::Host);
    }

    #[test]
    fn to_vec_checks_element_type() {
        let data = [Complex::new(1.0f64, -1.0), Complex::new(0.5, 2.0)];
        let buf = DeviceBuffer::from_slice(&data);
        assert_eq!(buf.to_vec::<Complex<f64>>().unwrap(), data.to_vec());
        assert!(buf.to_vec::<f64>().is_none());
    }

    #[test]
    fn from_bytes_rejects_partial_elements() {
        let err = DeviceBuffer::from_bytes(ElementType::Int32, vec![0; 6], StorageClass::Host)
            .unwrap_err();
        assert!(err.to_string().contains("int32"));

        let ok = DeviceBuffer::from_bytes(
            ElementType::Int16,
            vec![0; 6],
            StorageClass::Device { device_id: 1 },
        )
        .unwrap();
        assert_eq!(ok.len(), 3);
        assert_eq!(ok.storage(), StorageClass::Device { device_id: 1 });
    }

    #[test]
    fn zeroed_allocates_width_times_len() {
        let buf = DeviceBuffer::zeroed(ElementType::Complex64, 3, StorageClass::Host);
        assert_eq!(buf.byte_len(), 24);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }
}
