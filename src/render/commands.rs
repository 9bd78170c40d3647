use std::sync::Arc;

use egui_winit_vulkano::Gui;
use vulkano::{
  buffer::allocator::SubbufferAllocator,
  command_buffer::{
    AutoCommandBufferBuilder,
    RenderPassBeginInfo,
    SubpassBeginInfo,
    SubpassContents,
    SubpassEndInfo,
  },
  descriptor_set::{DescriptorSet, allocator::StandardDescriptorSetAllocator},
  format::ClearValue,
  pipeline::{Pipeline, PipelineBindPoint},
};

use crate::{
  error::Result,
  render::{
    compute::ParticleSystem,
    model::ModelBuffers,
    pipeline::{RenderContext, is_multisampled},
  },
};

/// Advances the particle simulation before the render pass starts.
pub struct SimulationStep<'a> {
  pub descriptor_set_allocator: &'a Arc<StandardDescriptorSetAllocator>,
  pub uniform_allocator:        &'a SubbufferAllocator,
  pub delta_ms:                 f32,
}

pub struct FrameInputs<'a> {
  pub image_index:    u32,
  pub descriptor_set: &'a Arc<DescriptorSet>,
  pub model:          &'a ModelBuffers,
  pub particles:      &'a ParticleSystem,
  pub simulate:       Option<SimulationStep<'a>>,
  pub show_particles: bool,
}

pub(crate) trait FrameCommandsExt<L> {
  fn record_frame(
    &mut self,
    rcx: &RenderContext,
    inputs: FrameInputs,
    gui: &mut Option<Gui>,
  ) -> Result<()>;
}

impl<L> FrameCommandsExt<L> for AutoCommandBufferBuilder<L> {
  fn record_frame(
    &mut self,
    rcx: &RenderContext,
    inputs: FrameInputs,
    gui: &mut Option<Gui>,
  ) -> Result<()> {
    if let Some(step) = &inputs.simulate {
      inputs.particles.record_update(
        self,
        step.descriptor_set_allocator,
        step.uniform_allocator,
        step.delta_ms,
      )?;
    }

    let black: ClearValue = [0.0, 0.0, 0.0, 1.0].into();
    let clear_values = if is_multisampled(&rcx.render_pass) {
      // The resolve target is fully overwritten, so it is never cleared.
      vec![Some(black), None, Some(1.0.into())]
    } else {
      vec![Some(black), Some(1.0.into())]
    };

    self.begin_render_pass(
      RenderPassBeginInfo {
        clear_values,
        ..RenderPassBeginInfo::framebuffer(rcx.framebuffers[inputs.image_index as usize].clone())
      },
      SubpassBeginInfo {
        contents: SubpassContents::Inline,
        ..Default::default()
      },
    )?;

    self
      .bind_pipeline_graphics(rcx.model_pipeline.clone())?
      .bind_descriptor_sets(
        PipelineBindPoint::Graphics,
        rcx.model_pipeline.layout().clone(),
        0,
        inputs.descriptor_set.clone(),
      )?
      .bind_vertex_buffers(0, inputs.model.vertices.clone())?
      .bind_index_buffer(inputs.model.indices.clone())?;

    unsafe { self.draw_indexed(inputs.model.index_count(), 1, 0, 0, 0) }?;

    if inputs.show_particles {
      self
        .bind_pipeline_graphics(rcx.particle_pipeline.clone())?
        .bind_vertex_buffers(0, inputs.particles.current().clone())?;

      unsafe { self.draw(inputs.particles.count(), 1, 0, 0) }?;
    }

    self.next_subpass(
      SubpassEndInfo::default(),
      SubpassBeginInfo {
        contents: SubpassContents::SecondaryCommandBuffers,
        ..Default::default()
      },
    )?;

    if let Some(gui) = gui {
      let cb = gui.draw_on_subpass_image(rcx.swapchain.image_extent());
      self.execute_commands(cb)?;
    }

    self.end_render_pass(SubpassEndInfo::default())?;

    Ok(())
  }
}
