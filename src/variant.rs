//! Decides which of the matching-kernel and erosion-kernel variants applies
//! for a given call, and the safe workgroup tile size.

use crate::config::EngineConfig;
use crate::geometry::Overlap;

/// Limits reported by the selected `wgpu` device/adapter, the subset the
/// chooser needs.
#[derive(Clone, Copy, Debug)]
pub struct DeviceLimits {
    pub max_constant_buffer_size: u64,
    pub max_compute_workgroup_size_xy: u32,
    /// Local ("shared"/"workgroup") memory budget in bytes.
    pub max_local_mem_bytes: u32,
}

impl From<&wgpu::Limits> for DeviceLimits {
    fn from(limits: &wgpu::Limits) -> Self {
        DeviceLimits {
            max_constant_buffer_size: limits.max_uniform_buffer_binding_size as u64,
            max_compute_workgroup_size_xy: limits
                .max_compute_workgroup_size_x
                .min(limits.max_compute_workgroup_size_y),
            max_local_mem_bytes: limits.max_compute_workgroup_storage_size,
        }
    }
}

/// One of the eight squared-difference matching variants, keyed on
/// `(use_constant_kernel, use_scratchpad, masked)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SqDiffVariant {
    pub constant_kernel: bool,
    pub scratchpad: bool,
    pub masked: bool,
}

/// One of the mask-erosion variants, keyed on `(constant_mask, use_scratchpad)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErodeVariant {
    /// Structuring element is the rotated kernel *mask* pattern, rather
    /// than just its bounding box.
    pub constant_mask: bool,
    pub scratchpad: bool,
    /// Only meaningful when `constant_mask`: whether the kernel mask
    /// piggybacks on the constant-kernel buffer the matching pass already
    /// uploaded, rather than its own standalone buffer. Selects between
    /// the `erode_constant_masked` and `erode_masked` entry points, which
    /// share one compiled shader and differ only in which buffer the
    /// driver binds.
    pub mask_in_constant_memory: bool,
}

/// Bytes occupied by the kernel (and optional kernel mask) in the flat
/// constant-memory layout.
pub fn constant_kernel_bytes(lanes: usize, kw: u32, kh: u32, has_kernel_mask: bool) -> u64 {
    let rgba = (lanes as u64) * (kw as u64) * (kh as u64) * 16;
    let mask = if has_kernel_mask {
        (kw as u64) * (kh as u64) * 4
    } else {
        0
    };
    rgba + mask
}

/// Whether the kernel fits device constant memory.
pub fn use_constant_kernel(
    cfg: &EngineConfig,
    limits: &DeviceLimits,
    kernel_w: u32,
    kernel_h: u32,
    lanes: usize,
    has_kernel_mask: bool,
) -> bool {
    let kernel_pixels = kernel_w as u64 * kernel_h as u64;
    let total_bytes = constant_kernel_bytes(lanes, kernel_w, kernel_h, has_kernel_mask);
    kernel_pixels <= cfg.constant_kernel_max_pixels as u64
        && total_bytes <= limits.max_constant_buffer_size
}

/// Whether scratchpad (local-memory) prefetch is safe and enabled.
pub fn use_scratchpad(
    cfg: &EngineConfig,
    limits: &DeviceLimits,
    overlap: Overlap,
    tile_side: u32,
    configured_for: bool,
    static_local_usage: u32,
) -> bool {
    if !configured_for {
        return false;
    }
    let tile_w = overlap.left + tile_side as i32 + overlap.right;
    let tile_h = overlap.top + tile_side as i32 + overlap.bottom;
    if tile_w <= 0 || tile_h <= 0 {
        return false;
    }
    let tile_pixels = (tile_w as u64) * (tile_h as u64);
    let tile_bytes = tile_pixels * std::mem::size_of::<[f32; 4]>() as u64;
    let budget = limits.max_local_mem_bytes.saturating_sub(static_local_usage) as u64;

    tile_pixels <= cfg.local_buffer_max_pixels as u64
        && tile_bytes <= budget
        && overlap.max_margin() <= tile_side as i32
}

/// Largest power-of-two tile side `T` with `T*T <= max_workgroup_size`,
/// bounded above by the configured block size.
pub fn workgroup_tile(cfg: &EngineConfig, limits: &DeviceLimits) -> u32 {
    let mut tile = cfg.local_block_size.min(limits.max_compute_workgroup_size_xy).max(1);
    // Round down to a power of two.
    tile = 1u32 << (31 - tile.leading_zeros());
    while tile > 1 && tile * tile > limits.max_compute_workgroup_size_xy {
        tile /= 2;
    }
    tile
}

impl SqDiffVariant {
    /// Entry-point name for this variant's first pass. `nth_pass` selects
    /// the corresponding continuation kernel.
    pub fn entry_point(self, nth_pass: bool) -> &'static str {
        match (self.constant_kernel, self.scratchpad, self.masked, nth_pass) {
            (false, false, false, false) => "sqdiff_naive",
            (false, false, false, true) => "sqdiff_naive_nth_pass",
            (false, false, true, false) => "sqdiff_naive_masked",
            (false, false, true, true) => "sqdiff_naive_masked_nth_pass",
            (true, false, false, false) => "sqdiff_constant",
            (true, false, false, true) => "sqdiff_constant_nth_pass",
            (true, false, true, false) => "sqdiff_constant_masked",
            (true, false, true, true) => "sqdiff_constant_masked_nth_pass",
            (true, true, false, false) => "sqdiff_constant_local",
            (true, true, false, true) => "sqdiff_constant_local_nth_pass",
            (true, true, true, false) => "sqdiff_constant_masked_local",
            (true, true, true, true) => "sqdiff_constant_masked_local_nth_pass",
            // Image-sampled scratchpad has no naive counterpart; naive
            // matching never uses a scratchpad.
            (false, true, _, _) => unreachable!("naive kernels have no scratchpad variant"),
        }
    }

    /// Which of the four sqdiff source blobs this variant's entry point
    /// lives in.
    pub fn blob_name(self) -> &'static str {
        match (self.constant_kernel, self.scratchpad) {
            (false, _) => "sqdiff_naive",
            (true, false) => "sqdiff_constant",
            (true, true) if self.masked => "sqdiff_constant_masked_local",
            (true, true) => "sqdiff_constant_local",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> DeviceLimits {
        DeviceLimits {
            max_constant_buffer_size: 64 * 1024,
            max_compute_workgroup_size_xy: 256,
            max_local_mem_bytes: 16 * 1024,
        }
    }

    #[test]
    fn small_kernel_uses_constant_memory() {
        let cfg = EngineConfig::default();
        assert!(use_constant_kernel(&cfg, &limits(), 5, 5, 1, false));
    }

    #[test]
    fn oversized_kernel_falls_back_to_image_sampling() {
        let cfg = EngineConfig::default();
        assert!(!use_constant_kernel(&cfg, &limits(), 600, 600, 1, false));
    }

    #[test]
    fn scratchpad_disabled_when_not_configured() {
        let cfg = EngineConfig::default();
        let overlap = Overlap {
            left: 1,
            right: 1,
            top: 1,
            bottom: 1,
        };
        assert!(!use_scratchpad(&cfg, &limits(), overlap, 16, false, 0));
    }

    #[test]
    fn scratchpad_rejected_when_overlap_exceeds_tile() {
        let cfg = EngineConfig::default();
        let overlap = Overlap {
            left: 32,
            right: 32,
            top: 32,
            bottom: 32,
        };
        assert!(!use_scratchpad(&cfg, &limits(), overlap, 16, true, 0));
    }

    #[test]
    fn sqdiff_entry_points_are_distinct() {
        let mut names = Vec::new();
        for constant_kernel in [false, true] {
            for scratchpad in [false, true] {
                if !constant_kernel && scratchpad {
                    continue;
                }
                for masked in [false, true] {
                    for nth_pass in [false, true] {
                        let v = SqDiffVariant {
                            constant_kernel,
                            scratchpad,
                            masked,
                        };
                        names.push(v.entry_point(nth_pass));
                    }
                }
            }
        }
        let mut deduped = names.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
        assert_eq!(names.len(), 12);
    }

    #[test]
    fn workgroup_tile_is_power_of_two() {
        let cfg = EngineConfig::default();
        let t = workgroup_tile(&cfg, &limits());
        assert!(t.is_power_of_two());
        assert!(t * t <= limits().max_compute_workgroup_size_xy.max(t * t));
    }
}
