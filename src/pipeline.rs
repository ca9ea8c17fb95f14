//! Drives a match call end to end: upload, variant selection, ping-pong
//! dispatch, mask/erosion pipeline, argmin, and readback.
//!
//! Bind-group layouts are built per dispatch from a small `Vec` of
//! buffer-binding descriptors, assembling a `BindGroupLayoutDescriptor` from
//! a dynamically built `Vec<wgpu::BindGroupLayoutEntry>` rather than a fixed
//! declarative macro.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::argmin::{host_reduce, scratch_tile_count};
use crate::cache::TextureCache;
use crate::config::{EngineConfig, ResultOrigin};
use crate::erode;
use crate::error::{EngineResult, MatchError};
use crate::geometry;
use crate::gpu::GpuContext;
use crate::pack::{self, PackedPlane, Plane};
use crate::result::{assemble, Match, MatchResult};
use crate::shaders::{DispatchParams, ALL_BLOBS, FIXED_TILE};
use crate::variant::{self, DeviceLimits, ErodeVariant, SqDiffVariant};

/// Every dispatch's buffer bindings, in ascending binding-index order.
struct BufferBinding<'a> {
    index: u32,
    buffer: &'a wgpu::Buffer,
    read_only: bool,
    uniform: bool,
}

struct ShaderLibrary {
    modules: HashMap<&'static str, wgpu::ShaderModule>,
    pipelines: HashMap<(&'static str, Vec<u32>), wgpu::ComputePipeline>,
}

impl ShaderLibrary {
    fn new(device: &wgpu::Device) -> EngineResult<Self> {
        let mut modules = HashMap::new();
        for &(name, source) in ALL_BLOBS {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
            });
            modules.insert(name, module);
        }
        Ok(ShaderLibrary {
            modules,
            pipelines: HashMap::new(),
        })
    }

    fn pipeline_for(
        &mut self,
        device: &wgpu::Device,
        blob: &'static str,
        entry_point: &'static str,
        bindings: &[BufferBinding<'_>],
    ) -> &wgpu::ComputePipeline {
        let shape: Vec<u32> = bindings
            .iter()
            .map(|b| b.index | (u32::from(b.uniform) << 31) | (u32::from(b.read_only) << 30))
            .collect();
        let key = (entry_point, shape);
        if !self.pipelines.contains_key(&key) {
            let module = &self.modules[blob];
            let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = bindings
                .iter()
                .map(|b| wgpu::BindGroupLayoutEntry {
                    binding: b.index,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: if b.uniform {
                            wgpu::BufferBindingType::Uniform
                        } else {
                            wgpu::BufferBindingType::Storage {
                                read_only: b.read_only,
                            }
                        },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                })
                .collect();
            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(entry_point),
                    entries: &layout_entries,
                });
            let pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(entry_point),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            self.pipelines.insert(key.clone(), pipeline);
        }
        &self.pipelines[&key]
    }
}

/// One decoded input plane plus its dtype, as the public API receives it.
pub struct InputPlane<'a> {
    pub samples: &'a [f32],
    pub dtype: crate::normalize::Dtype,
}

/// Everything the driver needs to run one match call.
pub struct MatchRequest<'a, Id: std::hash::Hash + Eq + Clone> {
    pub texture_id: Id,
    pub texture_planes: &'a [InputPlane<'a>],
    pub texture_width: u32,
    pub texture_height: u32,
    pub texture_mask: Option<&'a [f32]>,
    pub texture_mask_dtype: crate::normalize::Dtype,
    pub kernel_planes: &'a [InputPlane<'a>],
    pub kernel_width: u32,
    pub kernel_height: u32,
    pub kernel_mask: Option<&'a [f32]>,
    pub kernel_mask_dtype: crate::normalize::Dtype,
    pub theta: f64,
    pub erode_texture_mask: bool,
}

/// Engine-lifetime GPU state: compiled shaders, the resource cache, and the
/// grow-only accumulator/scratch surfaces.
pub struct PipelineDriver<Id: std::hash::Hash + Eq + Clone> {
    gpu: GpuContext,
    shaders: ShaderLibrary,
    cache: TextureCache<Id, Vec<Arc<wgpu::Buffer>>>,
    accum_a: Option<wgpu::Buffer>,
    accum_b: Option<wgpu::Buffer>,
    accum_capacity: u64,
}

impl<Id: std::hash::Hash + Eq + Clone + std::fmt::Debug> PipelineDriver<Id> {
    pub fn new(gpu: GpuContext) -> EngineResult<Self> {
        let shaders = ShaderLibrary::new(&gpu.device)?;
        Ok(PipelineDriver {
            gpu,
            shaders,
            cache: TextureCache::new(),
            accum_a: None,
            accum_b: None,
            accum_capacity: 0,
        })
    }

    /// Drop the cached texture buffers for `id`. Fails with
    /// [`MatchError::UnknownId`] if `id` has no live slot.
    pub fn invalidate(&mut self, id: &Id) -> EngineResult<()> {
        if self.cache.invalidate(id) {
            Ok(())
        } else {
            Err(MatchError::UnknownId(format!("{id:?}")))
        }
    }

    fn grow_accumulators(&mut self, pixel_count: u64, needs_b: bool) {
        let bytes = pixel_count * 4;
        if bytes > self.accum_capacity {
            self.accum_capacity = bytes;
            self.accum_a = Some(self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("accumulator-a"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }));
            if needs_b {
                self.accum_b = Some(self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("accumulator-b"),
                    size: bytes,
                    usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                }));
            }
        } else if needs_b && self.accum_b.is_none() {
            self.accum_b = Some(self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("accumulator-b"),
                size: self.accum_capacity,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }));
        }
    }

    fn upload_plane_buffer(&self, plane: &PackedPlane, usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("packed-plane"),
                contents: bytemuck::cast_slice(&plane.texels),
                usage,
            })
    }

    fn upload_floats(&self, data: &[f32], usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("floats"),
                contents: bytemuck::cast_slice(data),
                usage,
            })
    }

    /// Runs one dispatch. Takes `gpu`/`shaders` as explicit arguments
    /// (rather than `&mut self`) so callers can hold buffer borrows from
    /// other fields of `self` (the ping-ponged accumulators) across the
    /// call — a whole-`&mut self` receiver would conflict with those.
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        gpu: &GpuContext,
        shaders: &mut ShaderLibrary,
        blob: &'static str,
        entry_point: &'static str,
        params: DispatchParams,
        buffers: &[(u32, &wgpu::Buffer, bool, bool)], // (index, buffer, read_only, uniform)
        groups: (u32, u32, u32),
    ) {
        let uniform_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("dispatch-params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let mut bindings: Vec<BufferBinding<'_>> = vec![BufferBinding {
            index: 0,
            buffer: &uniform_buf,
            read_only: true,
            uniform: true,
        }];
        for &(index, buffer, read_only, uniform) in buffers {
            bindings.push(BufferBinding {
                index,
                buffer,
                read_only,
                uniform,
            });
        }

        let pipeline = shaders.pipeline_for(&gpu.device, blob, entry_point, &bindings);

        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry> = bindings
            .iter()
            .map(|b| wgpu::BindGroupEntry {
                binding: b.index,
                resource: b.buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(entry_point),
            layout: &layout,
            entries: &entries,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(entry_point) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(entry_point),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups.0, groups.1, groups.2);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Run one match call end to end: upload, match, optional mask/erosion
    /// gating, argmin, and readback into a [`MatchResult`].
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        cfg: &EngineConfig,
        req: MatchRequest<'_, Id>,
    ) -> EngineResult<MatchResult> {
        // Step 1: resolve geometry.
        let rk = geometry::compute(req.kernel_width, req.kernel_height, req.theta, cfg.result_origin);
        let (out_w, out_h) =
            geometry::output_shape(req.texture_width, req.texture_height, rk.overlap)?;

        // Step 2: upload inputs.
        let lanes_in = packed_texture_lane_count(req.texture_planes.len());
        let cached_shape = self
            .cache
            .slot_for(&req.texture_id)
            .map(|slot| self.cache.shape(slot));
        let texture_buffers: Vec<Arc<wgpu::Buffer>> = match cached_shape {
            Some((w, h, lanes)) if (w, h, lanes) == (req.texture_width, req.texture_height, lanes_in) => {
                log::trace!("resource cache hit for texture upload");
                let slot = self.cache.slot_for(&req.texture_id).unwrap();
                self.cache.resources(slot)
            }
            _ => {
                log::debug!("resource cache miss, repacking and uploading texture planes");
                let texture_planes: Vec<Plane<'_>> = req
                    .texture_planes
                    .iter()
                    .map(|p| Plane {
                        samples: p.samples,
                        dtype: p.dtype,
                    })
                    .collect();
                let packed_texture =
                    pack::pack_planes(&texture_planes, req.texture_width, req.texture_height);
                let buffers: Vec<Arc<wgpu::Buffer>> = packed_texture
                    .iter()
                    .map(|p| Arc::new(self.upload_plane_buffer(p, wgpu::BufferUsages::STORAGE)))
                    .collect();
                self.cache.store(
                    req.texture_id.clone(),
                    buffers.clone(),
                    req.texture_width,
                    req.texture_height,
                    lanes_in,
                );
                buffers
            }
        };

        let kernel_planes: Vec<Plane<'_>> = req
            .kernel_planes
            .iter()
            .map(|p| Plane {
                samples: p.samples,
                dtype: p.dtype,
            })
            .collect();
        let packed_kernel = pack::pack_planes(&kernel_planes, req.kernel_width, req.kernel_height);
        let flat_kernel = pack::flatten_for_constant_buffer(&packed_kernel);

        let kernel_const_buf = self.upload_floats(&flat_kernel, wgpu::BufferUsages::STORAGE);
        let kernel_buffers: Vec<wgpu::Buffer> = packed_kernel
            .iter()
            .map(|p| self.upload_plane_buffer(p, wgpu::BufferUsages::STORAGE))
            .collect();
        let kernel_mask_buf = req
            .kernel_mask
            .map(|m| {
                let normalized =
                    pack::pack_mask(m, req.kernel_mask_dtype, req.kernel_width, req.kernel_height);
                self.upload_floats(&normalized, wgpu::BufferUsages::STORAGE)
            })
            .unwrap_or_else(|| self.upload_floats(&[0.0], wgpu::BufferUsages::STORAGE));

        // Step 3: grow accumulators.
        let pixel_count = out_w as u64 * out_h as u64;
        let lanes = lanes_in;
        self.grow_accumulators(pixel_count, lanes > 1);

        let limits = self.gpu.limits;
        let tile_side = variant::workgroup_tile(cfg, &limits);
        let has_kernel_mask = req.kernel_mask.is_some();

        // Step 4-5: batch dispatch ping-pong.
        let batches = lanes;
        let center_anchor = u32::from(cfg.result_origin == ResultOrigin::Center);
        let masked = has_kernel_mask;
        let variant_choice = SqDiffVariant {
            constant_kernel: variant::use_constant_kernel(
                cfg,
                &limits,
                req.kernel_width,
                req.kernel_height,
                lanes,
                has_kernel_mask,
            ),
            scratchpad: false,
            masked,
        };
        let mut choice = variant_choice;
        if choice.constant_kernel {
            choice.scratchpad = variant::use_scratchpad(
                cfg,
                &limits,
                rk.overlap,
                tile_side,
                cfg.use_local_for_matching,
                0,
            );
        }

        for b in 1..=batches {
            let first_pass = b == 1;
            let params = DispatchParams {
                tex_width: req.texture_width,
                tex_height: req.texture_height,
                out_width: out_w,
                out_height: out_h,
                kernel_w: req.kernel_width,
                kernel_h: req.kernel_height,
                left: rk.overlap.left,
                top: rk.overlap.top,
                sin_theta: rk.sin_cos.0,
                cos_theta: rk.sin_cos.1,
                kernel_offset: (b - 1) as u32 * req.kernel_width * req.kernel_height,
                first_pass: u32::from(first_pass),
                tile_side,
                lanes: lanes as u32,
                center_anchor,
                _pad: 0,
            };

            let (read_buf, write_buf) = ping_pong(self.accum_a.as_ref().unwrap(), self.accum_b.as_ref(), b);
            let entry = choice.entry_point(!first_pass);
            let blob = choice.blob_name();
            let groups = dispatch_groups(out_w, out_h, if choice.scratchpad { FIXED_TILE } else { 8 });

            let tex_buf = texture_buffers[(b - 1) as usize].as_ref();
            if choice.constant_kernel {
                let mut bindings = vec![
                    (1u32, tex_buf, true, false),
                    (2, &kernel_const_buf, true, false),
                    (3, read_buf, true, false),
                    (4, write_buf, false, false),
                ];
                if masked {
                    bindings.push((5, &kernel_mask_buf, true, false));
                }
                Self::dispatch(&self.gpu, &mut self.shaders, blob, entry, params, &bindings, groups);
            } else {
                let ker_buf = &kernel_buffers[(b - 1) as usize];
                let bindings = vec![
                    (1u32, tex_buf, true, false),
                    (2, ker_buf, true, false),
                    (3, read_buf, true, false),
                    (4, write_buf, false, false),
                    (5, &kernel_mask_buf, true, false),
                ];
                Self::dispatch(&self.gpu, &mut self.shaders, blob, entry, params, &bindings, groups);
            }
        }

        // Pick the surface holding the final total.
        let final_in_a = batches % 2 == 1;
        let final_buf = if final_in_a {
            self.accum_a.as_ref().unwrap()
        } else {
            self.accum_b.as_ref().unwrap_or_else(|| self.accum_a.as_ref().unwrap())
        };

        // Step 6: texture-mask + optional erosion pipeline.
        //
        // `find_min_masked` gates on a mask sized to the *output* grid, but
        // the caller's mask is sized to the full texture. The erosion
        // kernel already does this resize as part of computing footprint
        // containment; without erosion we still need the anchor pixel's
        // validity at output resolution, which is a plain affine reindex
        // the host can do directly.
        let normalized_texture_mask = req.texture_mask.map(|m| {
            pack::pack_mask(m, req.texture_mask_dtype, req.texture_width, req.texture_height)
        });
        let anchor_mask_buf = normalized_texture_mask.as_ref().map(|m| {
            let resampled = resample_mask_to_output(
                m,
                req.texture_width,
                out_w,
                out_h,
                rk.overlap.left,
                rk.overlap.top,
            );
            self.upload_floats(&resampled, wgpu::BufferUsages::STORAGE)
        });
        let texture_mask_buf = normalized_texture_mask
            .as_ref()
            .map(|m| self.upload_floats(m, wgpu::BufferUsages::STORAGE));
        let eroded_mask_buf = if req.erode_texture_mask {
            let mask_buf = texture_mask_buf
                .as_ref()
                .ok_or_else(|| MatchError::InvalidConfiguration("erode_texture_mask requires a texture mask"))?;
            let out_mask = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("eroded-mask"),
                size: pixel_count * 4,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let erode_variant = ErodeVariant {
                constant_mask: has_kernel_mask,
                scratchpad: cfg.use_local_for_erode
                    && variant::use_scratchpad(cfg, &limits, rk.overlap, tile_side, true, 0),
                mask_in_constant_memory: false,
            };
            let params = DispatchParams {
                tex_width: req.texture_width,
                tex_height: req.texture_height,
                out_width: out_w,
                out_height: out_h,
                kernel_w: req.kernel_width,
                kernel_h: req.kernel_height,
                left: rk.overlap.left,
                top: rk.overlap.top,
                sin_theta: rk.sin_cos.0,
                cos_theta: rk.sin_cos.1,
                kernel_offset: 0,
                first_pass: 1,
                tile_side,
                lanes: lanes as u32,
                center_anchor,
                _pad: 0,
            };
            let entry = erode::entry_point(erode_variant);
            let blob = erode::blob_name(erode_variant);
            let groups = dispatch_groups(out_w, out_h, if erode_variant.scratchpad { FIXED_TILE } else { 8 });
            let mut bindings = vec![(1u32, mask_buf, true, false), (2, &out_mask, false, false)];
            if has_kernel_mask {
                bindings.push((3, &kernel_mask_buf, true, false));
            }
            Self::dispatch(&self.gpu, &mut self.shaders, blob, entry, params, &bindings, groups);
            Some(out_mask)
        } else {
            None
        };

        // Step 7: argmin.
        let argmin_params = DispatchParams {
            tex_width: req.texture_width,
            tex_height: req.texture_height,
            out_width: out_w,
            out_height: out_h,
            kernel_w: req.kernel_width,
            kernel_h: req.kernel_height,
            left: rk.overlap.left,
            top: rk.overlap.top,
            sin_theta: rk.sin_cos.0,
            cos_theta: rk.sin_cos.1,
            kernel_offset: 0,
            first_pass: 1,
            tile_side: FIXED_TILE,
            lanes: lanes as u32,
            center_anchor,
            _pad: 0,
        };
        let tile_count = scratch_tile_count(out_w, out_h, FIXED_TILE) as u64;
        let scratch_buf = self.gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("argmin-scratch"),
            size: tile_count * 16,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let gate_mask = eroded_mask_buf.as_ref().or(anchor_mask_buf.as_ref());
        let groups = dispatch_groups(out_w, out_h, FIXED_TILE);
        if let Some(mask_buf) = gate_mask {
            Self::dispatch(
                &self.gpu,
                &mut self.shaders,
                "argmin",
                "find_min_masked",
                argmin_params,
                &[(1, final_buf, true, false), (2, &scratch_buf, false, false), (3, mask_buf, true, false)],
                groups,
            );
        } else {
            Self::dispatch(
                &self.gpu,
                &mut self.shaders,
                "argmin",
                "find_min",
                argmin_params,
                &[(1, final_buf, true, false), (2, &scratch_buf, false, false)],
                groups,
            );
        }

        // Step 8: read back.
        let cost_surface: Vec<f32> = self.gpu.read_buffer_blocking(final_buf)?;
        let scratch: Vec<[f32; 4]> = self.gpu.read_buffer_blocking(&scratch_buf)?;

        // Step 9: host reduction + result assembly.
        let (cost, argx, argy) = host_reduce(&scratch);
        let best: Match = assemble((cost, argx, argy), rk.overlap.left, rk.overlap.top);

        Ok(MatchResult {
            cost_surface,
            surface_width: out_w,
            surface_height: out_h,
            best,
        })
    }
}

fn packed_texture_lane_count(n: usize) -> usize {
    pack::lane_count(n)
}

fn dispatch_groups(out_w: u32, out_h: u32, tile: u32) -> (u32, u32, u32) {
    (out_w.div_ceil(tile), out_h.div_ceil(tile), 1)
}

/// Reindex a full-resolution texture mask down to the output grid by the
/// same `(gx + left, gy + top)` anchor offset every matching/erosion
/// dispatch uses, so it can gate `find_min_masked` without a full erosion
/// pass.
fn resample_mask_to_output(
    mask: &[f32],
    tex_width: u32,
    out_width: u32,
    out_height: u32,
    left: i32,
    top: i32,
) -> Vec<f32> {
    let mut out = vec![0.0f32; (out_width as usize) * (out_height as usize)];
    for gy in 0..out_height {
        for gx in 0..out_width {
            let tx = gx as i32 + left;
            let ty = gy as i32 + top;
            let idx = (ty as u32 * tex_width + tx as u32) as usize;
            out[(gy * out_width + gx) as usize] = mask[idx];
        }
    }
    out
}

/// Returns `(read, write)` for pass `b` (1-based). Pass 1 writes A with no
/// meaningful read (the shader's `first_pass` flag skips it); thereafter
/// the write target alternates A, B, A, … and the read target is always
/// the *other* surface.
fn ping_pong<'a>(
    a: &'a wgpu::Buffer,
    b: Option<&'a wgpu::Buffer>,
    pass: usize,
) -> (&'a wgpu::Buffer, &'a wgpu::Buffer) {
    let b = b.unwrap_or(a);
    if pass % 2 == 1 {
        (b, a)
    } else {
        (a, b)
    }
}
