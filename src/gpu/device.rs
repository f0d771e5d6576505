// gpu/device.rs — wgpu device with f64 shader support.
//
// Responsibilities:
//   - Enumerate adapters and pick one that can run f64 compute shaders.
//   - Request a device with `SHADER_F64` enabled.
//   - Provide `WorkgroupSize` and the ceiling-division dispatch helper
//     shared by every 2D kernel.
//
// ADAPTER SELECTION:
// The convolution must match the CPU reference to round-off, so f32 is
// not an option and adapters without `SHADER_F64` are skipped outright.
// Among the f64-capable ones we prefer real hardware (discrete, then
// integrated) over virtual/other devices, and only fall back to a CPU
// (software) adapter when nothing else qualifies.
//
// Backends default to all; `TIGHTBIND_WGPU_BACKEND` = vulkan | metal | dx12
// narrows the search.
//
// `pollster::block_on` runs wgpu's async adapter/device requests to
// completion on the calling thread.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

/// Environment variable that narrows the wgpu backend search.
pub const BACKEND_ENV: &str = "TIGHTBIND_WGPU_BACKEND";

/// A workgroup size configuration for 2D compute dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// 16×8 = 128 invocations: four 32-wide warps, two 64-wide wavefronts.
    pub const DEFAULT: WorkgroupSize = WorkgroupSize { x: 16, y: 8 };

    /// Total invocations per workgroup (x * y).
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Template substitutions for `{{WG_X}}` / `{{WG_Y}}` in shader source.
    pub fn substitutions(&self) -> HashMap<&'static str, String> {
        HashMap::from([("{{WG_X}}", self.x.to_string()), ("{{WG_Y}}", self.y.to_string())])
    }
}

impl Default for WorkgroupSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub driver: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
    pub has_f64: bool,
}

impl AdapterInfo {
    fn from_adapter(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        AdapterInfo {
            name: info.name,
            driver: info.driver,
            device_type: info.device_type,
            backend: info.backend,
            has_f64: adapter.features().contains(wgpu::Features::SHADER_F64),
        }
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = if self.has_f64 { "f64" } else { "f32 only" };
        write!(
            f,
            "{} ({:?}, {:?}, {}, {precision})",
            self.name, self.backend, self.device_type, self.driver
        )
    }
}

/// Selection rank; lower is better. `None` means unusable.
fn adapter_rank(info: &AdapterInfo) -> Option<u8> {
    if !info.has_f64 {
        return None;
    }
    Some(match info.device_type {
        wgpu::DeviceType::DiscreteGpu => 0,
        wgpu::DeviceType::IntegratedGpu => 1,
        wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other => 2,
        wgpu::DeviceType::Cpu => 3,
    })
}

/// Parse the backend override. Unknown or missing values mean all backends.
pub fn backends_from(value: Option<&str>) -> wgpu::Backends {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("vulkan") => wgpu::Backends::VULKAN,
        Some("metal") => wgpu::Backends::METAL,
        Some("dx12") => wgpu::Backends::DX12,
        _ => wgpu::Backends::all(),
    }
}

/// The GPU context: device, queue and the adapter it came from.
///
/// Expensive to create; hold one for the lifetime of the program.
///
/// # Field drop order
/// Fields drop top to bottom. `_instance` is last so the `wgpu::Instance`
/// outlives `device` and `queue`.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    max_invocations: u32,
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a device on the best f64-capable adapter.
    ///
    /// # Errors
    /// `NoSuitableAdapter` when no adapter exists at all, `MissingF64` when
    /// adapters exist but none supports f64 shaders, `DeviceRequest` when
    /// the driver refuses the device.
    pub fn new() -> Result<Self, GpuError> {
        let backends = backends_from(std::env::var(BACKEND_ENV).ok().as_deref());
        pollster::block_on(Self::init_async(backends))
    }

    async fn init_async(backends: wgpu::Backends) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(backends);
        if adapters.is_empty() {
            return Err(GpuError::NoSuitableAdapter);
        }

        let mut best: Option<(u8, wgpu::Adapter, AdapterInfo)> = None;
        let mut seen = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let info = AdapterInfo::from_adapter(&adapter);
            debug!(adapter = %info, "found adapter");
            let rank = adapter_rank(&info);
            seen.push(info.name.clone());
            if let Some(rank) = rank {
                if best.as_ref().map_or(true, |(r, _, _)| rank < *r) {
                    best = Some((rank, adapter, info));
                }
            }
        }
        let (_, adapter, adapter_info) =
            best.ok_or_else(|| GpuError::MissingF64 { adapters: seen })?;
        info!(adapter = %adapter_info, "selected GPU adapter");

        let limits = adapter.limits();
        let max_invocations = limits.max_compute_invocations_per_workgroup;

        // wgpu 22: request_device returns (Device, Queue); the tuple type
        // is spelled out for the inferencer.
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tightbind"),
                    required_features: wgpu::Features::SHADER_F64,
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        let workgroup_size = WorkgroupSize::DEFAULT;
        if workgroup_size.total() > max_invocations {
            return Err(GpuError::WorkgroupTooLarge { total: workgroup_size.total(), max: max_invocations });
        }

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            workgroup_size,
            max_invocations,
            _instance: instance,
        })
    }

    /// Override the workgroup size, validated against the adapter limit.
    ///
    /// Only affects pipelines created afterwards.
    pub fn set_workgroup_size(&mut self, x: u32, y: u32) -> Result<(), GpuError> {
        let total = x.saturating_mul(y);
        if total == 0 || total > self.max_invocations {
            return Err(GpuError::WorkgroupTooLarge { total, max: self.max_invocations });
        }
        self.workgroup_size = WorkgroupSize { x, y };
        Ok(())
    }

    /// Workgroup counts `(x, y)` covering a `width × height` grid.
    pub fn dispatch_size(&self, width: u32, height: u32) -> (u32, u32) {
        dispatch_size(self.workgroup_size, width, height)
    }
}

/// Ceiling division of a 2D extent by the workgroup size. Shaders must
/// discard invocations with `gid.x >= width || gid.y >= height`.
pub fn dispatch_size(wg: WorkgroupSize, width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(wg.x), height.div_ceil(wg.y))
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, workgroup: {} }}",
            self.adapter_info, self.workgroup_size
        )
    }
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU setup and kernel execution.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no GPU adapter found")]
    NoSuitableAdapter,
    /// Adapters exist but none exposes `SHADER_F64`.
    #[error("no adapter supports f64 shaders (found: {})", adapters.join(", "))]
    MissingF64 { adapters: Vec<String> },
    #[error("device request failed: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),
    #[error("workgroup size {total} exceeds adapter limit of {max} invocations")]
    WorkgroupTooLarge { total: u32, max: u32 },
    /// A grid dimension does not fit the u32 shader parameters.
    #[error("dimension {0} exceeds the u32 range of the shader")]
    DimensionOverflow(usize),
    #[error("buffer readback failed: {0}")]
    Readback(#[source] wgpu::BufferAsyncError),
    #[error("buffer readback callback never fired")]
    ReadbackLost,
    /// The read-back buffer does not hold `rows * cols` values.
    #[error("readback has the wrong shape: {0}")]
    ReadbackShape(#[source] crate::matrix::MatrixError),
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn info(device_type: wgpu::DeviceType, has_f64: bool) -> AdapterInfo {
        AdapterInfo {
            name: "test".into(),
            driver: "test".into(),
            device_type,
            backend: wgpu::Backend::Vulkan,
            has_f64,
        }
    }

    #[test]
    fn test_workgroup_default() {
        let ws = WorkgroupSize::default();
        assert_eq!(ws.total(), 128);
        let subs = ws.substitutions();
        assert_eq!(subs["{{WG_X}}"], "16");
        assert_eq!(subs["{{WG_Y}}"], "8");
    }

    #[test]
    fn test_dispatch_size_exact() {
        assert_eq!(dispatch_size(WorkgroupSize { x: 16, y: 8 }, 64, 32), (4, 4));
    }

    #[test]
    fn test_dispatch_size_ceiling() {
        assert_eq!(dispatch_size(WorkgroupSize { x: 16, y: 8 }, 100, 100), (7, 13));
        assert_eq!(dispatch_size(WorkgroupSize { x: 16, y: 8 }, 1, 1), (1, 1));
    }

    #[test]
    fn test_rank_requires_f64() {
        assert_eq!(adapter_rank(&info(wgpu::DeviceType::DiscreteGpu, false)), None);
        assert_eq!(adapter_rank(&info(wgpu::DeviceType::DiscreteGpu, true)), Some(0));
    }

    #[test]
    fn test_rank_prefers_hardware() {
        let discrete = adapter_rank(&info(wgpu::DeviceType::DiscreteGpu, true));
        let integrated = adapter_rank(&info(wgpu::DeviceType::IntegratedGpu, true));
        let cpu = adapter_rank(&info(wgpu::DeviceType::Cpu, true));
        assert!(discrete < integrated);
        assert!(integrated < cpu);
    }

    #[test]
    fn test_backend_override() {
        assert_eq!(backends_from(Some("vulkan")), wgpu::Backends::VULKAN);
        assert_eq!(backends_from(Some(" Metal ")), wgpu::Backends::METAL);
        assert_eq!(backends_from(Some("dx12")), wgpu::Backends::DX12);
        assert_eq!(backends_from(Some("opengl")), wgpu::Backends::all());
        assert_eq!(backends_from(None), wgpu::Backends::all());
    }

    #[test]
    fn test_error_lists_adapters() {
        let err = GpuError::MissingF64 { adapters: vec!["a".into(), "b".into()] };
        assert_eq!(err.to_string(), "no adapter supports f64 shaders (found: a, b)");
    }

    // Tests below need a real f64-capable GPU; run with
    //   cargo test -- --include-ignored

    #[test]
    #[ignore]
    fn test_gpu_device_init() {
        let gpu = GpuDevice::new().expect("GPU init failed");
        assert!(gpu.adapter_info.has_f64);
    }

    #[test]
    #[ignore]
    fn test_set_workgroup_size_validation() {
        let mut gpu = GpuDevice::new().expect("GPU init failed");
        assert!(gpu.set_workgroup_size(8, 8).is_ok());
        assert_eq!(gpu.workgroup_size, WorkgroupSize { x: 8, y: 8 });
        assert!(matches!(
            gpu.set_workgroup_size(4096, 4096),
            Err(GpuError::WorkgroupTooLarge { .. })
        ));
    }
}
