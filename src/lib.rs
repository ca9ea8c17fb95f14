//! GPU-accelerated rotated multi-channel template matching.
//!
//! `Engine` owns the device/queue, the compiled shader library, and the
//! resource cache, and drives one match call at a time; it is not
//! reentrant. See `DESIGN.md` for how each module is grounded.

mod argmin;
mod cache;
mod config;
mod erode;
mod error;
mod geometry;
mod gpu;
mod normalize;
mod pack;
mod pipeline;
mod result;
mod shaders;
mod variant;

pub use config::{DeviceSelection, EngineConfig, ResultOrigin};
pub use error::{EngineResult, MatchError};
pub use normalize::Dtype;
pub use pipeline::InputPlane;
pub use result::{Match, MatchResult, OutputDtype};

use pipeline::{MatchRequest, PipelineDriver};

/// A stable string identity for an input texture. The engine keys its
/// resource cache on this.
pub type TextureId = String;

/// The GPU matching engine.
///
/// Construction selects and opens a device; everything after that is one
/// driver thread issuing match calls. Not reentrant: only one host-side
/// driver thread should use a given instance at a time.
pub struct Engine {
    driver: PipelineDriver<TextureId>,
    cfg: EngineConfig,
}

impl Engine {
    /// Open a device per `cfg.device_selection` and build the engine.
    /// Fails with [`MatchError::InvalidConfiguration`] or
    /// [`MatchError::DeviceFailure`], both fatal at construction.
    pub async fn new(cfg: EngineConfig) -> EngineResult<Engine> {
        cfg.validate()?;
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let gpu = gpu::GpuContext::new(&instance, cfg.device_selection).await?;
        let driver = PipelineDriver::new(gpu)?;
        Ok(Engine { driver, cfg })
    }

    /// Match entry point 1: no masks.
    pub fn match_plain(
        &mut self,
        texture_id: TextureId,
        texture_planes: &[InputPlane<'_>],
        texture_width: u32,
        texture_height: u32,
        kernel_planes: &[InputPlane<'_>],
        kernel_width: u32,
        kernel_height: u32,
        theta: f64,
    ) -> EngineResult<MatchResult> {
        self.driver.run(
            &self.cfg,
            MatchRequest {
                texture_id,
                texture_planes,
                texture_width,
                texture_height,
                texture_mask: None,
                texture_mask_dtype: Dtype::F32,
                kernel_planes,
                kernel_width,
                kernel_height,
                kernel_mask: None,
                kernel_mask_dtype: Dtype::F32,
                theta,
                erode_texture_mask: false,
            },
        )
    }

    /// Match entry point 2: texture mask, with optional erosion. `mask_dtype`
    /// normalizes `texture_mask` the same way a feature plane's dtype would.
    #[allow(clippy::too_many_arguments)]
    pub fn match_with_texture_mask(
        &mut self,
        texture_id: TextureId,
        texture_planes: &[InputPlane<'_>],
        texture_width: u32,
        texture_height: u32,
        texture_mask: &[f32],
        mask_dtype: Dtype,
        kernel_planes: &[InputPlane<'_>],
        kernel_width: u32,
        kernel_height: u32,
        theta: f64,
        erode: bool,
    ) -> EngineResult<MatchResult> {
        self.driver.run(
            &self.cfg,
            MatchRequest {
                texture_id,
                texture_planes,
                texture_width,
                texture_height,
                texture_mask: Some(texture_mask),
                texture_mask_dtype: mask_dtype,
                kernel_planes,
                kernel_width,
                kernel_height,
                kernel_mask: None,
                kernel_mask_dtype: Dtype::F32,
                theta,
                erode_texture_mask: erode,
            },
        )
    }

    /// Match entry point 3: kernel mask, no texture mask.
    #[allow(clippy::too_many_arguments)]
    pub fn match_with_kernel_mask(
        &mut self,
        texture_id: TextureId,
        texture_planes: &[InputPlane<'_>],
        texture_width: u32,
        texture_height: u32,
        kernel_planes: &[InputPlane<'_>],
        kernel_width: u32,
        kernel_height: u32,
        kernel_mask: &[f32],
        mask_dtype: Dtype,
        theta: f64,
    ) -> EngineResult<MatchResult> {
        self.driver.run(
            &self.cfg,
            MatchRequest {
                texture_id,
                texture_planes,
                texture_width,
                texture_height,
                texture_mask: None,
                texture_mask_dtype: Dtype::F32,
                kernel_planes,
                kernel_width,
                kernel_height,
                kernel_mask: Some(kernel_mask),
                kernel_mask_dtype: mask_dtype,
                theta,
                erode_texture_mask: false,
            },
        )
    }

    /// Match entry point 4: both masks, with optional texture erosion.
    #[allow(clippy::too_many_arguments)]
    pub fn match_with_masks(
        &mut self,
        texture_id: TextureId,
        texture_planes: &[InputPlane<'_>],
        texture_width: u32,
        texture_height: u32,
        texture_mask: &[f32],
        texture_mask_dtype: Dtype,
        kernel_planes: &[InputPlane<'_>],
        kernel_width: u32,
        kernel_height: u32,
        kernel_mask: &[f32],
        kernel_mask_dtype: Dtype,
        theta: f64,
        erode: bool,
    ) -> EngineResult<MatchResult> {
        self.driver.run(
            &self.cfg,
            MatchRequest {
                texture_id,
                texture_planes,
                texture_width,
                texture_height,
                texture_mask: Some(texture_mask),
                texture_mask_dtype,
                kernel_planes,
                kernel_width,
                kernel_height,
                kernel_mask: Some(kernel_mask),
                kernel_mask_dtype,
                theta,
                erode_texture_mask: erode,
            },
        )
    }

    /// The `(w, h, 1)` cost-surface shape a call with these dimensions and
    /// rotation would produce, without running it.
    pub fn output_shape(
        &self,
        texture_width: u32,
        texture_height: u32,
        kernel_width: u32,
        kernel_height: u32,
        theta: f64,
    ) -> EngineResult<(u32, u32, u32)> {
        let rk = geometry::compute(kernel_width, kernel_height, theta, self.cfg.result_origin);
        let (w, h) = geometry::output_shape(texture_width, texture_height, rk.overlap)?;
        Ok((w, h, 1))
    }

    /// The cost surface's scalar dtype. Always single-channel float32.
    pub fn output_dtype(&self) -> OutputDtype {
        OutputDtype
    }

    /// Drop a cached texture identity, freeing its device-side slot for
    /// reuse. Fails with [`MatchError::UnknownId`] if `texture_id` has no
    /// live slot.
    pub fn invalidate(&mut self, texture_id: &TextureId) -> EngineResult<()> {
        self.driver.invalidate(texture_id)
    }
}
