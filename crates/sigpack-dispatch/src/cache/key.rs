use sigpack_kernel_api::{ElementType, OpKind};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_SYMBOL_PREFIX: &str = "_sigpack";
pub const DEFAULT_ARTIFACT_DIR: &str = "kernels";

/// Cache key: one compiled kernel per (element type, operation kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelKey {
    pub dtype: ElementType,
    pub op_kind: OpKind,
}

impl KernelKey {
    pub fn new(dtype: ElementType, op_kind: OpKind) -> Self {
        Self { dtype, op_kind }
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, '{}')", self.dtype, self.op_kind)
    }
}

/// Naming convention mapping a key to its artifact file and entry symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelNaming {
    artifact_dir: PathBuf,
    symbol_prefix: String,
}

impl Default for KernelNaming {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_DIR, DEFAULT_SYMBOL_PREFIX)
    }
}

impl KernelNaming {
    pub fn new(artifact_dir: impl Into<PathBuf>, symbol_prefix: impl Into<String>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            symbol_prefix: symbol_prefix.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn symbol_prefix(&self) -> &str {
        &self.symbol_prefix
    }

    /// `<artifact_dir>/<op_kind>_kernel_artifact`
    pub fn artifact_path(&self, op_kind: OpKind) -> PathBuf {
        self.artifact_dir
            .join(format!("{}_kernel_artifact", op_kind.as_str()))
    }

    /// `<prefix>_<op_kind>_<type_name>`
    pub fn symbol_name(&self, op_kind: OpKind, dtype: ElementType) -> String {
        format!("{}_{}_{}", self.symbol_prefix, op_kind.as_str(), dtype.as_str())
    }

    /// Inverse of [`symbol_name`](Self::symbol_name). Returns `None` when the
    /// symbol does not follow this naming.
    pub fn parse_symbol<'a>(&self, symbol: &'a str) -> Option<(&'a str, ElementType)> {
        let rest = symbol
            .strip_prefix(self.symbol_prefix.as_str())?
            .strip_prefix('_')?;
        let (op, ty) = rest.rsplit_once('_')?;
        if op.is_empty() {
            return None;
        }
        Some((op, ElementType::from_name(ty)?))
    }
}
