//! Window lifecycle and the per-frame loop.
//!
//! Vulkan objects that do not depend on a window are created up front in [`App::new`]. The
//! window, surface, swapchain and everything sized after it are created in `resumed` and
//! rebuilt whenever the swapchain goes out of date.
//!
//! # Frame Loop
//! 1. Rebuild the swapchain and size-dependent state if needed
//! 2. Update the overlay and the uniform buffer
//! 3. Acquire the next swapchain image
//! 4. Record the particle dispatch, the scene and the overlay into one command buffer
//! 5. Submit after the previous frame, present, and signal a fence

use std::{sync::Arc, time::Instant};

use egui_winit_vulkano::{Gui, GuiConfig};
use vulkano::{
  Validated,
  VulkanError,
  buffer::allocator::SubbufferAllocator,
  command_buffer::{
    AutoCommandBufferBuilder,
    CommandBufferUsage,
    allocator::StandardCommandBufferAllocator,
  },
  descriptor_set::{DescriptorSet, WriteDescriptorSet, allocator::StandardDescriptorSetAllocator},
  device::{Device, Queue},
  format::Format,
  image::{SampleCount, sampler::Sampler, view::ImageView},
  instance::{Instance, debug::DebugUtilsMessenger},
  memory::allocator::StandardMemoryAllocator,
  pipeline::Pipeline,
  render_pass::Subpass,
  swapchain::{Surface, SwapchainPresentInfo, acquire_next_image},
  sync::{self, GpuFuture},
};
use winit::{
  application::ApplicationHandler,
  dpi::LogicalSize,
  event::WindowEvent,
  event_loop::{ActiveEventLoop, EventLoop},
  window::{Window, WindowId},
};

use crate::{
  config::AppConfig,
  core::{
    device::{QueueFamilyIndices, sample_count_value},
    init::initialize_vulkan,
  },
  error::{EngineError, Result},
  gui::{GuiState, RendererInfo, draw_gui},
  render::{
    commands::{FrameCommandsExt, FrameInputs, SimulationStep},
    compute::ParticleSystem,
    model::ModelBuffers,
    pipeline::{
      RenderContext,
      Shaders,
      WindowSizeSetupConfig,
      create_render_pass,
      window_size_dependent_setup,
    },
    swapchain::{create_swapchain, recreate_swapchain},
    uniform::UniformMatrices,
  },
};

/// Longest step, in seconds, fed to the rotation and the particle simulation after the event
/// loop stalls.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Seconds between `previous` and `now`, capped at [`MAX_FRAME_DELTA`].
pub fn frame_delta(previous: Instant, now: Instant) -> f32 {
  now
    .saturating_duration_since(previous)
    .as_secs_f32()
    .min(MAX_FRAME_DELTA)
}

/// Owns every Vulkan object and drives the frame loop from winit's callbacks.
///
/// Errors raised inside the event loop stop it and are kept for [`App::take_error`].
pub struct App {
  /// Settings the app was started with
  config: AppConfig,

  // Vulkan resources
  instance:                 Arc<Instance>,
  _debug_messenger:         Option<DebugUtilsMessenger>,
  device:                   Arc<Device>,
  graphics_queue:           Arc<Queue>,
  present_queue:            Arc<Queue>,
  queue_families:           QueueFamilyIndices,
  memory_allocator:         Arc<StandardMemoryAllocator>,
  descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
  command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
  uniform_buffer_allocator: SubbufferAllocator,
  model_buffers:            ModelBuffers,
  texture:                  Arc<ImageView>,
  sampler:                  Arc<Sampler>,
  samples:                  SampleCount,
  depth_format:             Format,
  particles:                ParticleSystem,

  // Rendering context and UI
  /// Window-bound state, `None` until the first `resumed`
  rcx:       Option<RenderContext>,
  /// Overlay drawn on the second subpass
  gui:       Option<Gui>,
  gui_state: GuiState,

  // Frame timing
  /// Start of the previous frame, also reset while minimized
  last_frame_time: Instant,
  /// Seconds of model rotation, frozen while paused
  rotation_secs:   f32,

  // Rendering settings
  rotation_paused:    bool,
  simulate_particles: bool,
  show_particles:     bool,

  /// First error raised inside the event loop
  error: Option<EngineError>,
}

impl App {
  /// Initializes everything that does not need a window. The window itself is created once
  /// the event loop resumes.
  pub fn new(event_loop: &EventLoop<()>, config: AppConfig) -> Result<Self> {
    let initialized = initialize_vulkan(event_loop, &config)?;

    let info = RendererInfo {
      device_name:    initialized
        .device
        .physical_device()
        .properties()
        .device_name
        .clone(),
      present_mode:   None,
      msaa_samples:   sample_count_value(initialized.samples),
      particle_count: initialized.particles.count(),
      model:          initialized.model_stats,
    };
    let gui_state = GuiState::new(info);

    Ok(App {
      config,
      instance: initialized.instance,
      _debug_messenger: initialized.debug_messenger,
      device: initialized.device,
      graphics_queue: initialized.graphics_queue,
      present_queue: initialized.present_queue,
      queue_families: initialized.queue_families,
      memory_allocator: initialized.memory_allocator,
      descriptor_set_allocator: initialized.descriptor_set_allocator,
      command_buffer_allocator: initialized.command_buffer_allocator,
      uniform_buffer_allocator: initialized.uniform_buffer_allocator,
      model_buffers: initialized.model_buffers,
      texture: initialized.texture,
      sampler: initialized.sampler,
      samples: initialized.samples,
      depth_format: initialized.depth_format,
      particles: initialized.particles,
      rcx: None,
      gui: None,
      rotation_paused: gui_state.pause_rotation,
      simulate_particles: gui_state.simulate_particles,
      show_particles: gui_state.show_particles,
      gui_state,
      last_frame_time: Instant::now(),
      rotation_secs: 0.0,
      error: None,
    })
  }

  /// The error that stopped the event loop, if any.
  pub fn take_error(&mut self) -> Option<EngineError> {
    self.error.take()
  }

  fn fail(&mut self, event_loop: &ActiveEventLoop, error: EngineError) {
    log::error!("{error}");
    self.error = Some(error);
    event_loop.exit();
  }

  fn create_render_context(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
    let window_config = &self.config.window;
    let window_attrs = Window::default_attributes()
      .with_title(window_config.title.clone())
      .with_inner_size(LogicalSize::new(window_config.width, window_config.height))
      .with_resizable(window_config.resizable);

    let window = Arc::new(event_loop.create_window(window_attrs)?);
    let surface = Surface::from_window(self.instance.clone(), window.clone())
      .map_err(|e| EngineError::Surface(format!("{e:?}")))?;

    let (swapchain, images) = create_swapchain(
      &self.device,
      &surface,
      &window,
      &self.queue_families,
      self.config.render.present_mode.into(),
    )?;

    let render_pass = create_render_pass(
      &self.device,
      swapchain.image_format(),
      self.depth_format,
      self.samples,
    )?;
    let shaders = Shaders::load(&self.device)?;

    let setup = window_size_dependent_setup(WindowSizeSetupConfig {
      images: &images,
      render_pass: &render_pass,
      memory_allocator: &self.memory_allocator,
      shaders: &shaders,
      depth_format: self.depth_format,
      samples: self.samples,
    })?;

    let overlay_subpass =
      Subpass::from(render_pass.clone(), 1).ok_or(EngineError::MissingSubpass(1))?;
    self.gui = Some(Gui::new_with_subpass(
      event_loop,
      surface,
      self.graphics_queue.clone(),
      overlay_subpass,
      swapchain.image_format(),
      GuiConfig {
        allow_srgb_render_target: true,
        ..Default::default()
      },
    ));
    self.gui_state.info.present_mode = Some(swapchain.create_info().present_mode);

    self.rcx = Some(RenderContext {
      window,
      swapchain,
      render_pass,
      shaders,
      framebuffers: setup.framebuffers,
      model_pipeline: setup.model_pipeline,
      particle_pipeline: setup.particle_pipeline,
      recreate_swapchain: false,
      previous_frame_end: Some(sync::now(self.device.clone()).boxed()),
    });
    self.last_frame_time = Instant::now();

    Ok(())
  }

  fn draw_frame(&mut self) -> Result<()> {
    let Some(rcx) = self.rcx.as_mut() else {
      return Ok(());
    };
    let window_size = rcx.window.inner_size();

    // Minimized windows have nothing to present to.
    if window_size.width == 0 || window_size.height == 0 {
      self.last_frame_time = Instant::now();
      return Ok(());
    }

    if let Some(previous_frame_end) = rcx.previous_frame_end.as_mut() {
      previous_frame_end.cleanup_finished();
    }

    if rcx.recreate_swapchain {
      let (swapchain, images) = recreate_swapchain(&rcx.swapchain, window_size.into())?;
      rcx.swapchain = swapchain;

      let setup = window_size_dependent_setup(WindowSizeSetupConfig {
          images: &images,
        render_pass: &rcx.render_pass,
        memory_allocator: &self.memory_allocator,
        shaders: &rcx.shaders,
        depth_format: self.depth_format,
        samples: self.samples,
      })?;
      rcx.framebuffers = setup.framebuffers;
      rcx.model_pipeline = setup.model_pipeline;
      rcx.particle_pipeline = setup.particle_pipeline;
      rcx.recreate_swapchain = false;
    }

    let now = Instant::now();
    let delta = frame_delta(self.last_frame_time, now);
    self.last_frame_time = now;

    if let Some(gui) = &mut self.gui {
      let changes = draw_gui(gui, &mut self.gui_state);

      if let Some(paused) = changes.pause_rotation {
        self.rotation_paused = paused;
      }
      if let Some(simulate) = changes.simulate_particles {
        self.simulate_particles = simulate;
      }
      if let Some(show) = changes.show_particles {
        self.show_particles = show;
      }
    }

    if !self.rotation_paused {
      self.rotation_secs += delta;
    }

    let uniform_buffer = self.uniform_buffer_allocator.allocate_sized()?;
    *uniform_buffer.write()? = UniformMatrices::at(self.rotation_secs, rcx.aspect_ratio()).to_shader();

    let layout = &rcx.model_pipeline.layout().set_layouts()[0];
    let descriptor_set = DescriptorSet::new(
      self.descriptor_set_allocator.clone(),
      layout.clone(),
      [
        WriteDescriptorSet::buffer(0, uniform_buffer),
        WriteDescriptorSet::image_view_sampler(1, self.texture.clone(), self.sampler.clone()),
      ],
      [],
    )?;

    let (image_index, suboptimal, acquire_future) =
      match acquire_next_image(rcx.swapchain.clone(), None).map_err(Validated::unwrap) {
        Ok(r) => r,
        Err(VulkanError::OutOfDate) => {
          rcx.recreate_swapchain = true;
          return Ok(());
        }
        Err(e) => return Err(e.into()),
      };

    if suboptimal {
      rcx.recreate_swapchain = true;
    }

    let mut builder = AutoCommandBufferBuilder::primary(
      self.command_buffer_allocator.clone(),
      self.graphics_queue.queue_family_index(),
      CommandBufferUsage::OneTimeSubmit,
    )?;

    let simulate = self.simulate_particles.then(|| SimulationStep {
      descriptor_set_allocator: &self.descriptor_set_allocator,
      uniform_allocator:        &self.uniform_buffer_allocator,
      delta_ms:                 delta * 1000.0,
    });

    builder.record_frame(
      rcx,
      FrameInputs {
        image_index,
        descriptor_set: &descriptor_set,
        model: &self.model_buffers,
        particles: &self.particles,
        simulate,
        show_particles: self.show_particles,
      },
      &mut self.gui,
    )?;

    let command_buffer = builder.build()?;

    let previous_frame_end = rcx
      .previous_frame_end
      .take()
      .unwrap_or_else(|| sync::now(self.device.clone()).boxed());

    let future = previous_frame_end
      .join(acquire_future)
      .then_execute(self.graphics_queue.clone(), command_buffer)?
      .then_swapchain_present(
        self.present_queue.clone(),
        SwapchainPresentInfo::swapchain_image_index(rcx.swapchain.clone(), image_index),
      )
      .then_signal_fence_and_flush();

    match future.map_err(Validated::unwrap) {
      Ok(future) => {
        rcx.previous_frame_end = Some(future.boxed());
      }
      Err(VulkanError::OutOfDate) => {
        rcx.recreate_swapchain = true;
        rcx.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
      }
      Err(e) => {
        rcx.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
        return Err(e.into());
      }
    }

    // The buffer just written becomes next frame's input.
    if self.simulate_particles {
      self.particles.advance();
    }

    Ok(())
  }
}

impl ApplicationHandler for App {
  fn resumed(&mut self, event_loop: &ActiveEventLoop) {
    if self.rcx.is_some() {
      return;
    }
    if let Err(e) = self.create_render_context(event_loop) {
      self.fail(event_loop, e);
    }
  }

  fn window_event(
    &mut self,
    event_loop: &ActiveEventLoop,
    _window_id: WindowId,
    event: WindowEvent,
  ) {
    if let Some(gui) = &mut self.gui {
      gui.update(&event);
    }

    match event {
      WindowEvent::CloseRequested => {
        event_loop.exit();
      }
      WindowEvent::Resized(_) => {
        if let Some(rcx) = self.rcx.as_mut() {
          rcx.recreate_swapchain = true;
        }
      }
      WindowEvent::RedrawRequested => {
        if let Err(e) = self.draw_frame() {
          self.fail(event_loop, e);
        }
      }
      _ => {}
    }
  }

  fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
    if let Some(rcx) = self.rcx.as_ref() {
      rcx.window.request_redraw();
    }
  }
}
