//! Accelerator force pass on wgpu compute.
//!
//! Positions are uploaded as `vec4<f32>`, one invocation per particle walks every other
//! particle, and the forces are read back and widened to `f64`. The shader evaluates the
//! same coefficient, cutoff, cap and pair-distance floor as the CPU pass, in single
//! precision.

use super::{ForceEngine, ForceField, ForceParams, MIN_PAIR_DISTANCE_SQ};
use crate::ensemble::ParticleState;
use crate::error::{Result, SimError};
use abp_common::PairPotential;
use bytemuck::{Pod, Zeroable};
use log::{debug, info};
use wgpu::util::DeviceExt;

const WORKGROUP_SIZE: u32 = 64;
const VEC4_BYTES: u64 = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GpuParams {
    n: u32,
    potential: u32,
    cutoff_sq: f32,
    prefactor: f32,
    force_cap: f32,
    min_r2: f32,
    _pad: [f32; 2],
}

struct PassBuffers {
    capacity: usize,
    positions: wgpu::Buffer,
    forces: wgpu::Buffer,
    staging: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuForces {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    buffers: Option<PassBuffers>,
}

impl WgpuForces {
    /// Acquires an adapter and compiles the pair-force pipeline.
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| SimError::Backend("no compatible adapter found".to_string()))?;

        let info = adapter.get_info();
        info!("Accelerator adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("abp force device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| SimError::Backend(format!("device request failed: {e}")))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pair forces"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/pair_forces.wgsl").into()),
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("pair forces pipeline"),
            layout: None,
            module: &shader,
            entry_point: "main",
        });

        Ok(Self { device, queue, pipeline, buffers: None })
    }

    fn ensure_buffers(&mut self, num_particles: usize) {
        let stale = self.buffers.as_ref().map_or(true, |b| b.capacity != num_particles);
        if stale {
            debug!("Allocating accelerator buffers for {} particles", num_particles);
            let bytes = num_particles as u64 * VEC4_BYTES;
            let positions = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("positions"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let forces = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("forces"),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("forces staging"),
                size: bytes,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let params = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("force params"),
                contents: bytemuck::bytes_of(&GpuParams::zeroed()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

            let layout = self.pipeline.get_bind_group_layout(0);
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("pair forces bind group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: positions.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: forces.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: params.as_entire_binding() },
                ],
            });

            self.buffers = Some(PassBuffers { capacity: num_particles, positions, forces, staging, params, bind_group });
        }
    }

    fn read_forces(&self, staging: &wgpu::Buffer, out: &mut ForceField) -> Result<()> {
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            tx.send(r).ok();
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| SimError::Backend(format!("map recv: {e}")))?
            .map_err(|e| SimError::Backend(format!("map: {e}")))?;

        {
            let data = slice.get_mapped_range();
            let values: &[f32] = bytemuck::cast_slice(&data);
            for (k, chunk) in values.chunks_exact(4).enumerate() {
                out.fx[k] = chunk[0] as f64;
                out.fy[k] = chunk[1] as f64;
                out.fz[k] = chunk[2] as f64;
            }
        }
        staging.unmap();
        Ok(())
    }
}

impl ForceEngine for WgpuForces {
    fn compute_forces(&mut self, state: &ParticleState, params: &ForceParams, out: &mut ForceField) -> Result<()> {
        let num_particles = state.len();
        state.check_consistent()?;
        out.check_len(num_particles)?;

        if params.is_inert() || num_particles == 0 {
            out.clear();
            return Ok(());
        }

        let packed: Vec<f32> = (0..num_particles)
            .flat_map(|k| [state.x[k] as f32, state.y[k] as f32, state.z[k] as f32, 0.0])
            .collect();
        let uniform = GpuParams {
            n: num_particles as u32,
            potential: match params.potential {
                PairPotential::LennardJones => 0,
                PairPotential::Repulsive => 1,
            },
            cutoff_sq: (params.cutoff * params.cutoff) as f32,
            prefactor: params.prefactor as f32,
            force_cap: params.force_cap as f32,
            min_r2: MIN_PAIR_DISTANCE_SQ as f32,
            _pad: [0.0; 2],
        };

        self.ensure_buffers(num_particles);
        let Some(buffers) = self.buffers.as_ref() else {
            return Err(SimError::Backend("accelerator buffers missing".to_string()));
        };

        self.queue.write_buffer(&buffers.positions, 0, bytemuck::cast_slice(&packed));
        self.queue.write_buffer(&buffers.params, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("pair forces") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("pair forces pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            pass.dispatch_workgroups((num_particles as u32).div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        let bytes = num_particles as u64 * VEC4_BYTES;
        encoder.copy_buffer_to_buffer(&buffers.forces, 0, &buffers.staging, 0, bytes);
        self.queue.submit(Some(encoder.finish()));

        self.read_forces(&buffers.staging, out)
    }

    fn name(&self) -> &'static str {
        "wgpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::Placement;
    use crate::forces::ParallelCpuForces;
    use rand::prelude::*;
    use rand::rngs::StdRng;

    #[test]
    #[ignore = "requires a compute adapter"]
    fn accelerator_matches_cpu_pass() {
        let mut gpu = WgpuForces::new().unwrap();
        let placement = Placement::new(6.0, 6.0).unwrap();
        let mut rng = StdRng::seed_from_u64(17);
        let state = ParticleState::random(300, &placement, &mut rng);
        let params = ForceParams { potential: PairPotential::LennardJones, prefactor: 48.0, cutoff: 5.0, force_cap: 1.0 };

        let mut expected = ForceField::zeros(300);
        ParallelCpuForces::new().compute_forces(&state, &params, &mut expected).unwrap();
        let mut actual = ForceField::zeros(300);
        gpu.compute_forces(&state, &params, &mut actual).unwrap();

        for k in 0..300 {
            for (a, e) in [(actual.fx[k], expected.fx[k]), (actual.fy[k], expected.fy[k]), (actual.fz[k], expected.fz[k])] {
                assert!((a - e).abs() < 1e-3 * (1.0 + e.abs()), "particle {k}: {a} vs {e}");
            }
        }
    }

    #[test]
    #[ignore = "requires a compute adapter"]
    fn buffers_follow_particle_count() {
        let mut gpu = WgpuForces::new().unwrap();
        let params = ForceParams { potential: PairPotential::Repulsive, prefactor: 24.0, cutoff: 5.0, force_cap: 1.0 };
        for n in [2usize, 70, 5] {
            let state = ParticleState::from_vectors(
                &(0..n).map(|k| [k as f64 * 0.9, 0.0, 0.0]).collect::<Vec<_>>(),
                &vec![[0.0, 0.0, 1.0]; n],
            )
            .unwrap();
            let mut out = ForceField::zeros(n);
            gpu.compute_forces(&state, &params, &mut out).unwrap();
            assert!(out.fx[0] < 0.0);
        }
    }
}
