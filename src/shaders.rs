//! Loads the nine GPU-source text blobs and the uniform layout every kernel
//! shares.
//!
//! Each blob is a standalone WGSL module embedded with `include_str!`, one
//! per independently compiled kernel family. WGSL has no cross-module
//! `import`, so the small rotated-sampling helper is duplicated in every
//! file that needs it.

use bytemuck::{Pod, Zeroable};

/// Parameters shared by every dispatch kind (sqdiff, erode, argmin). Unused
/// fields for a given kernel are left zeroed by the caller.
///
/// Field order and size (16 x 4-byte scalars = 64 bytes) keep this a valid
/// WGSL uniform-address-space struct without padding surprises.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DispatchParams {
    pub tex_width: u32,
    pub tex_height: u32,
    pub out_width: u32,
    pub out_height: u32,
    pub kernel_w: u32,
    pub kernel_h: u32,
    pub left: i32,
    pub top: i32,
    pub sin_theta: f32,
    pub cos_theta: f32,
    pub kernel_offset: u32,
    pub first_pass: u32,
    pub tile_side: u32,
    pub lanes: u32,
    pub center_anchor: u32,
    pub _pad: u32,
}

/// Fixed compute-workgroup extent every tiled/scratchpad/reduction kernel is
/// compiled with. A configured `workgroup_tile` smaller than this still
/// dispatches at this size; excess lanes are masked at runtime (see
/// `DESIGN.md` on why this is simpler than WGSL pipeline-overridable
/// constants for workgroup-local array sizing).
pub const FIXED_TILE: u32 = 16;

pub const SQDIFF_NAIVE: &str = include_str!("shaders/sqdiff_naive.wgsl");
pub const SQDIFF_CONSTANT: &str = include_str!("shaders/sqdiff_constant.wgsl");
pub const SQDIFF_CONSTANT_LOCAL: &str = include_str!("shaders/sqdiff_constant_local.wgsl");
pub const SQDIFF_CONSTANT_MASKED_LOCAL: &str =
    include_str!("shaders/sqdiff_constant_masked_local.wgsl");
pub const ERODE: &str = include_str!("shaders/erode.wgsl");
pub const ERODE_MASKED: &str = include_str!("shaders/erode_masked.wgsl");
pub const ERODE_LOCAL: &str = include_str!("shaders/erode_local.wgsl");
pub const ERODE_MASKED_LOCAL: &str = include_str!("shaders/erode_masked_local.wgsl");
pub const ARGMIN: &str = include_str!("shaders/argmin.wgsl");

/// The nine source blobs, each paired with the module label used for its
/// `wgpu::ShaderModuleDescriptor`.
pub const ALL_BLOBS: &[(&str, &str)] = &[
    ("sqdiff_naive", SQDIFF_NAIVE),
    ("sqdiff_constant", SQDIFF_CONSTANT),
    ("sqdiff_constant_local", SQDIFF_CONSTANT_LOCAL),
    ("sqdiff_constant_masked_local", SQDIFF_CONSTANT_MASKED_LOCAL),
    ("erode_masked", ERODE_MASKED),
    ("erode", ERODE),
    ("erode_masked_local", ERODE_MASKED_LOCAL),
    ("erode_local", ERODE_LOCAL),
    ("argmin", ARGMIN),
];
