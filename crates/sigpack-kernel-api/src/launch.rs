use std::fmt;

/// One side of a launch descriptor: a grid or block shape of rank 1 to 3.
///
/// A scalar dimension becomes a rank-1 shape, so `LaunchShape::from(512)` and
/// `LaunchShape::from([512])` are the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchShape {
    dims: [u32; 3],
    rank: u8,
}

impl LaunchShape {
    pub const fn scalar(x: u32) -> Self {
        Self {
            dims: [x, 1, 1],
            rank: 1,
        }
    }

    /// Build a shape from 1 to 3 extents. Returns `None` for any other rank.
    pub fn new(extents: &[u32]) -> Option<Self> {
        if extents.is_empty() || extents.len() > 3 {
            return None;
        }
        let mut dims = [1u32; 3];
        dims[..extents.len()].copy_from_slice(extents);
        Some(Self {
            dims,
            rank: extents.len() as u8,
        })
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.dims[..self.rank as usize]
    }

    pub fn rank(&self) -> usize {
        self.rank as usize
    }

    /// Extents padded to three dimensions with 1.
    pub fn xyz(&self) -> (u32, u32, u32) {
        (self.dims[0], self.dims[1], self.dims[2])
    }

    /// Number of lanes (blocks or threads) the shape covers.
    pub fn volume(&self) -> u64 {
        self.as_slice().iter().map(|&d| d as u64).product()
    }
}

impl From<u32> for LaunchShape {
    fn from(x: u32) -> Self {
        Self::scalar(x)
    }
}

impl From<(u32, u32)> for LaunchShape {
    fn from((x, y): (u32, u32)) -> Self {
        Self {
            dims: [x, y, 1],
            rank: 2,
        }
    }
}

impl From<(u32, u32, u32)> for LaunchShape {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self {
            dims: [x, y, z],
            rank: 3,
        }
    }
}

impl From<[u32; 1]> for LaunchShape {
    fn from([x]: [u32; 1]) -> Self {
        Self::scalar(x)
    }
}

impl From<[u32; 2]> for LaunchShape {
    fn from([x, y]: [u32; 2]) -> Self {
        (x, y).into()
    }
}

impl From<[u32; 3]> for LaunchShape {
    fn from([x, y, z]: [u32; 3]) -> Self {
        (x, y, z).into()
    }
}

impl fmt::Display for LaunchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_slice() {
            [x] => write!(f, "({x},)"),
            [x, y] => write!(f, "({x}, {y})"),
            [x, y, z] => write!(f, "({x}, {y}, {z})"),
            _ => unreachable!("launch shapes have rank 1..=3"),
        }
    }
}

/// Grid and block geometry for a single kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchDims {
    pub grid: LaunchShape,
    pub block: LaunchShape,
}

impl LaunchDims {
    pub fn new(grid: impl Into<LaunchShape>, block: impl Into<LaunchShape>) -> Self {
        Self {
            grid: grid.into(),
            block: block.into(),
        }
    }

    /// Total number of parallel lanes (blocks x threads per block).
    pub fn total_lanes(&self) -> u64 {
        self.grid.volume().saturating_mul(self.block.volume())
    }
}

impl fmt::Display for LaunchDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid={} block={}", self.grid, self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_dimension_becomes_single_element_shape() {
        let shape = LaunchShape::from(512u32);
        assert_eq!(shape.as_slice(), &[512]);
        assert_eq!(shape.rank(), 1);
        assert_eq!(shape, LaunchShape::from([512u32]));
        assert_eq!(shape.to_string(), "(512,)");
    }

    #[test]
    fn tuple_shapes_keep_their_rank() {
        let grid = LaunchShape::from((4u32, 2u32));
        assert_eq!(grid.as_slice(), &[4, 2]);
        assert_eq!(grid.xyz(), (4, 2, 1));
        assert_eq!(grid.volume(), 8);

        let block = LaunchShape::from([8u32, 4, 2]);
        assert_eq!(block.rank(), 3);
        assert_eq!(block.volume(), 64);
    }

    #[test]
    fn new_rejects_out_of_range_ranks() {
        assert!(LaunchShape::new(&[]).is_none());
        assert!(LaunchShape::new(&[1, 2, 3, 4]).is_none());
        assert_eq!(LaunchShape::new(&[7]), Some(LaunchShape::scalar(7)));
    }

    #[test]
    fn total_lanes_multiplies_grid_and_block() {
        let dims = LaunchDims::new(160u32, 512u32);
        assert_eq!(dims.total_lanes(), 160 * 512);
        assert_eq!(dims.to_string(), "grid=(160,) block=(512,)");
    }
}
