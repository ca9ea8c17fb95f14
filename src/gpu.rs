//! Thin `wgpu` device/queue holder plus the manual readback helper used by
//! every dispatch stage.
//!
//! Buffer readback avoids a `pollster` dependency: just `map_async` plus
//! `device.poll(Maintain::Wait)`.

use crate::config::DeviceSelection;
use crate::error::{EngineResult, MatchError};
use crate::variant::DeviceLimits;

/// A selected adapter, its device and queue, and the limits the kernel
/// chooser needs.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub limits: DeviceLimits,
}

/// wgpu exposes no direct "compute unit" or "shader core" count; we
/// approximate the `MostComputeUnits` / `MostGpuThreads` device-selection
/// policies with the two limits that correlate with parallel capacity
/// across backends (see `DESIGN.md`).
fn score(limits: &wgpu::Limits, selection: DeviceSelection) -> u64 {
    match selection {
        DeviceSelection::FirstSuitable => 0,
        DeviceSelection::MostComputeUnits => limits.max_compute_workgroups_per_dimension as u64,
        DeviceSelection::MostGpuThreads => {
            (limits.max_compute_workgroup_size_x as u64)
                * (limits.max_compute_workgroup_size_y as u64)
                * (limits.max_compute_invocations_per_workgroup as u64)
        }
    }
}

impl GpuContext {
    /// Enumerate adapters on `instance` and select one per `selection`.
    /// Blocks on device request, matching native-target launch paths that
    /// never run this inside an already-async executor.
    pub async fn new(
        instance: &wgpu::Instance,
        selection: DeviceSelection,
    ) -> EngineResult<GpuContext> {
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let adapter = if selection == DeviceSelection::FirstSuitable {
            adapters.into_iter().next()
        } else {
            adapters
                .into_iter()
                .max_by_key(|a| score(&a.limits(), selection))
        }
        .ok_or_else(|| MatchError::DeviceFailure("no suitable GPU adapter found".into()))?;

        log::debug!("selected adapter {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("rotmatch-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|err| MatchError::DeviceFailure(err.to_string()))?;

        let limits = DeviceLimits::from(&device.limits());
        Ok(GpuContext {
            device,
            queue,
            limits,
        })
    }

    /// Read `buffer`'s full contents back to the host, blocking on the
    /// device's poll loop. Any lost device or failed mapping surfaces as
    /// `MatchError::DeviceFailure` rather than panicking.
    pub fn read_buffer_blocking<T: bytemuck::Pod>(
        &self,
        buffer: &wgpu::Buffer,
    ) -> EngineResult<Vec<T>> {
        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| MatchError::DeviceFailure("device lost before buffer map completed".into()))?
            .map_err(|err| MatchError::DeviceFailure(format!("buffer mapping failed: {err}")))?;

        let data = slice.get_mapped_range();
        let out = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        buffer.unmap();
        Ok(out)
    }
}
