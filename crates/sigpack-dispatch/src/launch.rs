pub const DEFAULT_THREADS_PER_BLOCK: u32 = 512;
pub const DEFAULT_BLOCKS_PER_MULTIPROCESSOR: u32 = 20;

/// Supplies the launch geometry used by the packing operation.
pub trait LaunchPolicy: Send + Sync {
    /// `(threads_per_block, blocks_per_grid)`, independent of the data size.
    fn default_launch_geometry(&self) -> (u32, u32);
}

/// Fixed threads per block and a grid sized from the device's multiprocessor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultLaunchPolicy {
    threads_per_block: u32,
    blocks_per_multiprocessor: u32,
    multiprocessor_count: u32,
}

impl DefaultLaunchPolicy {
    /// Zero arguments fall back to the defaults (and one multiprocessor).
    pub fn new(
        threads_per_block: u32,
        blocks_per_multiprocessor: u32,
        multiprocessor_count: u32,
    ) -> Self {
        Self {
            threads_per_block: nonzero_or(threads_per_block, DEFAULT_THREADS_PER_BLOCK),
            blocks_per_multiprocessor: nonzero_or(
                blocks_per_multiprocessor,
                DEFAULT_BLOCKS_PER_MULTIPROCESSOR,
            ),
            multiprocessor_count: nonzero_or(multiprocessor_count, 1),
        }
    }

    pub fn for_multiprocessors(multiprocessor_count: u32) -> Self {
        Self::new(
            DEFAULT_THREADS_PER_BLOCK,
            DEFAULT_BLOCKS_PER_MULTIPROCESSOR,
            multiprocessor_count,
        )
    }

    pub fn threads_per_block(&self) -> u32 {
        self.threads_per_block
    }

    pub fn blocks_per_grid(&self) -> u32 {
        self.multiprocessor_count
            .saturating_mul(self.blocks_per_multiprocessor)
    }
}

impl LaunchPolicy for DefaultLaunchPolicy {
    fn default_launch_geometry(&self) -> (u32, u32) {
        (self.threads_per_block(), self.blocks_per_grid())
    }
}

/// A policy that always returns the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLaunchPolicy {
    pub threads_per_block: u32,
    pub blocks_per_grid: u32,
}

impl LaunchPolicy for FixedLaunchPolicy {
    fn default_launch_geometry(&self) -> (u32, u32) {
        (self.threads_per_block, self.blocks_per_grid)
    }
}

fn nonzero_or(value: u32, fallback: u32) -> u32 {
    if value == 0 {
        fallback
    } else {
        value
    }
}
