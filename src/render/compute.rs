//! Particle simulation on a compute queue.
//!
//! Every frame in flight owns one storage buffer. A dispatch reads the previous frame's buffer
//! and writes the current one, which is then drawn as a point list.

use std::{f32::consts::TAU, sync::Arc};

use glam::Vec2;
use rand::Rng;
use vulkano::{
  buffer::{
    Buffer,
    BufferCreateInfo,
    BufferUsage,
    Subbuffer,
    allocator::SubbufferAllocator,
  },
  command_buffer::AutoCommandBufferBuilder,
  descriptor_set::{DescriptorSet, WriteDescriptorSet, allocator::StandardDescriptorSetAllocator},
  device::Device,
  memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
  pipeline::{
    ComputePipeline,
    Pipeline,
    PipelineBindPoint,
    PipelineLayout,
    PipelineShaderStageCreateInfo,
    compute::ComputePipelineCreateInfo,
    layout::PipelineDescriptorSetLayoutCreateInfo,
  },
};

use crate::{
  error::{EngineError, Result},
  render::{frame::FrameRing, pipeline::main_entry_point, vertex::Particle},
  shaders::{PARTICLE_WORKGROUP_SIZE, particle_cs},
};

const SPAWN_RADIUS: f32 = 0.25;
const SPEED: f32 = 0.00025;

/// Scatters `count` particles uniformly over a disc and sends them flying outwards.
///
/// The disc is squeezed horizontally by `aspect_ratio` so it looks round on screen.
pub fn initial_particles(count: u32, aspect_ratio: f32, rng: &mut impl Rng) -> Vec<Particle> {
  (0..count)
    .map(|_| {
      let r = SPAWN_RADIUS * rng.gen_range(0.0f32..1.0).sqrt();
      let theta = rng.gen_range(0.0f32..1.0) * TAU;
      let position = Vec2::new(r * theta.cos() / aspect_ratio, r * theta.sin());
      let velocity = position.normalize_or_zero() * SPEED;

      Particle {
        position: position.to_array(),
        velocity: velocity.to_array(),
        color:    [
          rng.gen_range(0.0..1.0),
          rng.gen_range(0.0..1.0),
          rng.gen_range(0.0..1.0),
          1.0,
        ],
      }
    })
    .collect()
}

pub fn workgroup_count(particles: u32) -> u32 {
  particles.div_ceil(PARTICLE_WORKGROUP_SIZE)
}

pub struct ParticleSystem {
  pipeline: Arc<ComputePipeline>,
  buffers:  FrameRing<Subbuffer<[Particle]>>,
  count:    u32,
}

impl ParticleSystem {
  pub fn new(
    device: &Arc<Device>,
    memory_allocator: &Arc<StandardMemoryAllocator>,
    frames_in_flight: usize,
    particles: Vec<Particle>,
  ) -> Result<Self> {
    let count = particles.len() as u32;
    let pipeline = create_compute_pipeline(device)?;

    let buffers = FrameRing::try_new(frames_in_flight, |_| {
      Buffer::from_iter(
        memory_allocator.clone(),
        BufferCreateInfo {
          usage: BufferUsage::STORAGE_BUFFER | BufferUsage::VERTEX_BUFFER,
          ..Default::default()
        },
        AllocationCreateInfo {
          memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
            | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
          ..Default::default()
        },
        particles.iter().copied(),
      )
    })?;

    log::info!("Particle system ready: {count} particles, {} buffers", buffers.len());

    Ok(Self {
      pipeline,
      buffers,
      count,
    })
  }

  pub fn count(&self) -> u32 {
    self.count
  }

  /// Buffer written by the most recent dispatch, in vertex-buffer form.
  pub fn current(&self) -> &Subbuffer<[Particle]> {
    self.buffers.current()
  }

  pub fn advance(&mut self) {
    self.buffers.advance();
  }

  /// Records one simulation step of `delta_ms` milliseconds into `builder`.
  pub fn record_update<L>(
    &self,
    builder: &mut AutoCommandBufferBuilder<L>,
    descriptor_set_allocator: &Arc<StandardDescriptorSetAllocator>,
    uniform_allocator: &SubbufferAllocator,
    delta_ms: f32,
  ) -> Result<()> {
    let parameters = uniform_allocator.allocate_sized::<particle_cs::ParameterUBO>()?;
    *parameters.write()? = particle_cs::ParameterUBO {
      delta_time: delta_ms,
    };

    let layout = self.pipeline.layout().set_layouts()[0].clone();
    let descriptor_set = DescriptorSet::new(
      descriptor_set_allocator.clone(),
      layout,
      [
        WriteDescriptorSet::buffer(0, parameters),
        WriteDescriptorSet::buffer(1, self.buffers.previous().clone()),
        WriteDescriptorSet::buffer(2, self.buffers.current().clone()),
      ],
      [],
    )?;

    builder
      .bind_pipeline_compute(self.pipeline.clone())?
      .bind_descriptor_sets(
        PipelineBindPoint::Compute,
        self.pipeline.layout().clone(),
        0,
        descriptor_set,
      )?;

    unsafe { builder.dispatch([workgroup_count(self.count), 1, 1]) }?;

    Ok(())
  }
}

fn create_compute_pipeline(device: &Arc<Device>) -> Result<Arc<ComputePipeline>> {
  let entry_point = main_entry_point(particle_cs::load(device.clone())?, "particle_cs")?;
  let stage = PipelineShaderStageCreateInfo::new(entry_point);

  let layout = PipelineLayout::new(
    device.clone(),
    PipelineDescriptorSetLayoutCreateInfo::from_stages([&stage])
      .into_pipeline_layout_create_info(device.clone())
      .map_err(|e| EngineError::PipelineLayout(format!("{e:?}")))?,
  )?;

  Ok(ComputePipeline::new(
    device.clone(),
    None,
    ComputePipelineCreateInfo::stage_layout(stage, layout),
  )?)
}

#[cfg(test)]
mod tests {
  use rand::{SeedableRng, rngs::StdRng};

  use super::*;

  #[test]
  fn particles_start_inside_the_spawn_disc() {
    let mut rng = StdRng::seed_from_u64(7);
    let aspect = 800.0 / 600.0;
    let particles = initial_particles(500, aspect, &mut rng);
    assert_eq!(particles.len(), 500);

    for p in &particles {
      let unsquashed = Vec2::new(p.position[0] * aspect, p.position[1]);
      assert!(unsquashed.length() <= SPAWN_RADIUS + 1e-6);
      assert_eq!(p.color[3], 1.0);
      assert!(p.color[..3].iter().all(|c| (0.0..1.0).contains(c)));
    }
  }

  #[test]
  fn particles_move_outwards_at_constant_speed() {
    let mut rng = StdRng::seed_from_u64(42);
    for p in initial_particles(100, 1.0, &mut rng) {
      let position = Vec2::from(p.position);
      let velocity = Vec2::from(p.velocity);
      if position == Vec2::ZERO {
        continue;
      }
      assert!((velocity.length() - SPEED).abs() < 1e-9);
      assert!(position.dot(velocity) > 0.0);
    }
  }

  #[test]
  fn same_seed_same_particles() {
    let a = initial_particles(16, 1.5, &mut StdRng::seed_from_u64(1));
    let b = initial_particles(16, 1.5, &mut StdRng::seed_from_u64(1));
    assert_eq!(a, b);
  }

  #[test]
  fn workgroups_cover_every_particle() {
    assert_eq!(workgroup_count(0), 0);
    assert_eq!(workgroup_count(1), 1);
    assert_eq!(workgroup_count(256), 1);
    assert_eq!(workgroup_count(257), 2);
    assert_eq!(workgroup_count(8192), 32);
  }
}
