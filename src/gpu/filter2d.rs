// gpu/filter2d.rs — GPU valid-region 2D convolution.
//
// Mirrors `convolution::convolve2d` on the GPU in f64. The CPU function is
// the reference; this kernel must agree with it to round-off (the GPU is
// free to fuse multiply-adds, so results are not guaranteed bit-identical).
//
// PER-CALL FLOW
// ─────────────
//   1. Validate shapes with `convolution::interior` (same errors as CPU).
//   2. Upload image and filter as read-only f64 storage buffers, plus a
//      16-byte `Params` uniform.
//   3. One dispatch, one invocation per output cell (border cells write 0).
//   4. Copy the output buffer into a MAP_READ staging buffer, map it, and
//      collect the bytes into a Vec<f64>.
//
// The pipeline (shader compilation) is built once in `GpuFilter2d::new`;
// buffers are per call. The first `apply` after construction still pays
// driver-side warm-up, which is what the cold/warm timing captures.
//
// BUFFERS VS TEXTURES
// ───────────────────
// Storage textures have no f64 format, so everything lives in plain
// `array<f64>` storage buffers indexed row-major, matching `Matrix`.

use wgpu::util::DeviceExt;

use crate::convolution::interior;
use crate::filter::{Filter2d, FilterError};
use crate::gpu::device::{GpuDevice, GpuError};
use crate::matrix::Matrix;

const SHADER_TEMPLATE: &str = include_str!("../shaders/filter2d.wgsl");

/// Shader parameters uploaded as a uniform buffer.
///
/// Layout must match `Params` in `filter2d.wgsl`: four u32, 16 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    rows: u32,
    cols: u32,
    frows: u32,
    fcols: u32,
}

impl Params {
    fn new(image: &Matrix, filt: &Matrix) -> Result<Self, GpuError> {
        let cells = image.rows().checked_mul(image.cols()).unwrap_or(usize::MAX);
        // Flat indices are computed in u32 inside the shader.
        to_u32(cells)?;
        Ok(Params {
            rows: to_u32(image.rows())?,
            cols: to_u32(image.cols())?,
            frows: to_u32(filt.rows())?,
            fcols: to_u32(filt.cols())?,
        })
    }
}

fn to_u32(v: usize) -> Result<u32, GpuError> {
    u32::try_from(v).map_err(|_| GpuError::DimensionOverflow(v))
}

/// Fill the workgroup placeholders in the shader template.
fn shader_source(gpu: &GpuDevice) -> String {
    gpu.workgroup_size
        .substitutions()
        .iter()
        .fold(SHADER_TEMPLATE.to_string(), |src, (token, value)| src.replace(token, value))
}

/// Compiled f64 convolution pipeline plus the device it runs on.
pub struct GpuFilter2d {
    gpu: GpuDevice,
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl GpuFilter2d {
    /// Compile the shader and create the compute pipeline on `gpu`.
    pub fn new(gpu: GpuDevice) -> Self {
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("filter2d.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_source(&gpu).into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        // Mirrors the @group(0) bindings in filter2d.wgsl.
        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("GpuFilter2d BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, true),
                storage(3, false),
            ],
        });

        let layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GpuFilter2d pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("filter2d"),
            layout: Some(&layout),
            module: &shader,
            entry_point: "filter2d",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        GpuFilter2d { gpu, pipeline, bgl }
    }

    /// Open the default f64 device and build the pipeline on it.
    pub fn with_default_device() -> Result<Self, GpuError> {
        Ok(Self::new(GpuDevice::new()?))
    }

    /// The device this pipeline runs on.
    pub fn device(&self) -> &GpuDevice {
        &self.gpu
    }

    /// Run the kernel. Shapes must already be validated.
    fn run(&self, image: &Matrix, filt: &Matrix) -> Result<Matrix, GpuError> {
        let params = Params::new(image, filt)?;
        let device = &self.gpu.device;
        let out_bytes = (image.as_slice().len() * std::mem::size_of::<f64>()) as u64;

        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("filter2d params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let image_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("filter2d image"),
            contents: bytemuck::cast_slice(image.as_slice()),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let filt_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("filter2d taps"),
            contents: bytemuck::cast_slice(filt.as_slice()),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let out_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter2d output"),
            size: out_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter2d readback"),
            size: out_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter2d bind group"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: image_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: filt_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: out_buf.as_entire_binding() },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("GpuFilter2d::run"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("filter2d"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (dx, dy) = self.gpu.dispatch_size(params.cols, params.rows);
            pass.dispatch_workgroups(dx, dy, 1);
        }
        encoder.copy_buffer_to_buffer(&out_buf, 0, &readback_buf, 0, out_bytes);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let data = read_f64(device, &readback_buf)?;
        Matrix::from_vec(image.rows(), image.cols(), data).map_err(GpuError::ReadbackShape)
    }
}

/// Map a MAP_READ buffer and copy its contents out as f64.
///
/// Synchronous: blocks until the GPU has finished all submitted work.
fn read_f64(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<f64>, GpuError> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        // The receiver outlives the poll below; a failed send only means
        // the caller already gave up.
        let _ = tx.send(r);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| GpuError::ReadbackLost)?
        .map_err(GpuError::Readback)?;

    let data = decode_f64(&slice.get_mapped_range());
    buffer.unmap();
    Ok(data)
}

/// Copy mapped bytes out as f64. Mapped ranges are at least 8-byte
/// aligned, which `cast_slice` requires.
fn decode_f64(bytes: &[u8]) -> Vec<f64> {
    bytemuck::cast_slice::<u8, f64>(bytes).to_vec()
}

impl Filter2d for GpuFilter2d {
    fn name(&self) -> &str {
        "gpu"
    }

    fn apply(&self, image: &Matrix, filt: &Matrix) -> Result<Matrix, FilterError> {
        interior(image, filt)?;
        Ok(self.run(image, filt)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
