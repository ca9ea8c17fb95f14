//! Engine-wide configuration.

use crate::error::{EngineResult, MatchError};

/// How the engine picks a `wgpu` adapter when more than one is available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceSelection {
    /// Pick the first adapter the backend reports.
    FirstSuitable,
    /// Pick the adapter advertising the most compute units.
    MostComputeUnits,
    /// Pick the adapter advertising the most concurrently schedulable
    /// GPU threads.
    MostGpuThreads,
}

/// The anchor a reported match position refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultOrigin {
    /// The position names the kernel's upper-left corner in texture space.
    UpperLeft,
    /// The position names the kernel's center in texture space.
    Center,
}

/// Tunables for the matching engine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub device_selection: DeviceSelection,
    pub result_origin: ResultOrigin,
    /// Upper bound on the workgroup tile side. Must be a power of two.
    pub local_block_size: u32,
    /// Kernel pixel count above which constant-memory packing is disabled.
    pub constant_kernel_max_pixels: u32,
    /// Input-window pixel count (including kernel overlap) above which
    /// scratchpad prefetch is disabled.
    pub local_buffer_max_pixels: u32,
    pub use_local_for_matching: bool,
    pub use_local_for_erode: bool,
    /// Advisory upper bound on cached texture memory. Currently unused by
    /// the resource cache, which is grow-only (see `DESIGN.md`).
    pub max_texture_cache_memory: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            device_selection: DeviceSelection::MostComputeUnits,
            result_origin: ResultOrigin::UpperLeft,
            local_block_size: 16,
            constant_kernel_max_pixels: 500 * 500,
            local_buffer_max_pixels: 4096,
            use_local_for_matching: false,
            use_local_for_erode: true,
            max_texture_cache_memory: 512 * 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration. `InvalidConfiguration` is fatal at
    /// construction.
    pub fn validate(&self) -> EngineResult<()> {
        if self.local_block_size == 0 || !self.local_block_size.is_power_of_two() {
            return Err(MatchError::InvalidConfiguration(
                "local_block_size must be a positive power of two",
            ));
        }
        Ok(())
    }
}
