use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DispatchError, OpKind};

/// Element types a packing kernel can be compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl ElementType {
    pub const ALL: [ElementType; 10] = [
        ElementType::Int8,
        ElementType::UInt8,
        ElementType::Int16,
        ElementType::UInt16,
        ElementType::Int32,
        ElementType::UInt32,
        ElementType::Float32,
        ElementType::Float64,
        ElementType::Complex64,
        ElementType::Complex128,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::UInt8 => "uint8",
            ElementType::Int16 => "int16",
            ElementType::UInt16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::UInt32 => "uint32",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Complex64 => "complex64",
            ElementType::Complex128 => "complex128",
        }
    }

    /// Size of one element in bytes.
    pub fn byte_width(self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float32 => 4,
            ElementType::Float64 | ElementType::Complex64 => 8,
            ElementType::Complex128 => 16,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == name)
    }

    /// Parse a type name at a kernel boundary, reporting the operation it was
    /// requested for when the name is outside the supported set.
    pub fn for_kernel(name: &str, op_kind: OpKind) -> Result<Self, DispatchError> {
        Self::from_name(name).ok_or_else(|| DispatchError::UnsupportedType {
            type_name: name.to_string(),
            op_kind,
        })
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host scalar types with a fixed [`ElementType`] and a plain byte image.
pub trait PackElement: bytemuck::Pod {
    const DTYPE: ElementType;
}

macro_rules! impl_pack_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl PackElement for $ty {
                const DTYPE: ElementType = ElementType::$dtype;
            }
        )*
    };
}

impl_pack_element! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    f32 => Float32,
    f64 => Float64,
    Complex<f32> => Complex64,
    Complex<f64> => Complex128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_name() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_name(ty.as_str()), Some(ty));
        }
        assert_eq!(ElementType::from_name("float16"), None);
        assert_eq!(ElementType::from_name("Float32"), None);
    }

    #[test]
    fn widths_match_host_types() {
        assert_eq!(ElementType::Int8.byte_width(), std::mem::size_of::<i8>());
        assert_eq!(ElementType::UInt16.byte_width(), std::mem::size_of::<u16>());
        assert_eq!(ElementType::Float32.byte_width(), std::mem::size_of::<f32>());
        assert_eq!(
            ElementType::Complex64.byte_width(),
            std::mem::size_of::<Complex<f32>>()
        );
        assert_eq!(
            ElementType::Complex128.byte_width(),
            std::mem::size_of::<Complex<f64>>()
        );
    }

    #[test]
    fn unsupported_name_reports_type_and_op() {
        let err = ElementType::for_kernel("float16", OpKind::PACK).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("float16"), "{msg}");
        assert!(msg.contains("pack"), "{msg}");
        assert!(err.is_unsupported_type());
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&ElementType::Complex128).unwrap();
        assert_eq!(json, "\"complex128\"");
        let parsed: ElementType = serde_json::from_str("\"uint16\"").unwrap();
        assert_eq!(parsed, ElementType::UInt16);
    }
}
