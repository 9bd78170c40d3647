use std::{path::PathBuf, sync::Arc};

use vulkano::{
  VulkanLibrary,
  buffer::{
    BufferUsage,
    allocator::{SubbufferAllocator, SubbufferAllocatorCreateInfo},
  },
  command_buffer::allocator::StandardCommandBufferAllocator,
  descriptor_set::allocator::StandardDescriptorSetAllocator,
  device::{Device, Queue},
  format::Format,
  image::{SampleCount, sampler::Sampler, view::ImageView},
  instance::{Instance, InstanceCreateFlags, InstanceCreateInfo, debug::DebugUtilsMessenger},
  memory::allocator::{MemoryTypeFilter, StandardMemoryAllocator},
  swapchain::Surface,
};
use winit::event_loop::EventLoop;

use crate::{
  config::AppConfig,
  core::{
    debug::{
      VALIDATION_LAYER,
      check_validation_layer_support,
      messenger_create_info,
      setup_debug_messenger,
    },
    device::{
      QueueFamilyIndices,
      clamp_sample_count,
      create_logical_device,
      max_usable_sample_count,
      pick_physical_device,
    },
  },
  error::{EngineError, Result},
  loader::{Model, load_model},
  render::{
    compute::{ParticleSystem, initial_particles},
    model::{Geometry, ModelBuffers},
    pipeline::find_depth_format,
    texture::{TexturePixels, create_sampler, upload_texture},
  },
};

/// Counts shown in the overlay.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelStats {
  pub path:      PathBuf,
  pub meshes:    usize,
  pub materials: usize,
  pub vertices:  usize,
  pub triangles: usize,
}

impl ModelStats {
  fn new(path: PathBuf, model: &Model) -> Self {
    Self {
      path,
      meshes: model.meshes.len(),
      materials: model.materials.len(),
      vertices: model.vertex_count(),
      triangles: model.triangle_count(),
    }
  }
}

pub struct InitializedVulkan {
  pub instance:                 Arc<Instance>,
  pub debug_messenger:          Option<DebugUtilsMessenger>,
  pub device:                   Arc<Device>,
  pub graphics_queue:           Arc<Queue>,
  pub present_queue:            Arc<Queue>,
  pub queue_families:           QueueFamilyIndices,
  pub memory_allocator:         Arc<StandardMemoryAllocator>,
  pub descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
  pub command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
  pub uniform_buffer_allocator: SubbufferAllocator,
  pub model_buffers:            ModelBuffers,
  pub model_stats:              ModelStats,
  pub texture:                  Arc<ImageView>,
  pub sampler:                  Arc<Sampler>,
  pub samples:                  SampleCount,
  pub depth_format:             Format,
  pub particles:                ParticleSystem,
}

/// Texture to sample: the configured override, else the model's own diffuse map resolved
/// against the model's directory.
fn texture_path(config: &AppConfig, model: &Model) -> Option<PathBuf> {
  config.assets.texture.clone().or_else(|| {
    let relative = model.primary_texture()?;
    let base = config.assets.model.parent().unwrap_or_else(|| "".as_ref());
    Some(base.join(relative))
  })
}

fn create_instance(
  library: Arc<VulkanLibrary>,
  event_loop: &EventLoop<()>,
  config: &AppConfig,
) -> Result<Arc<Instance>> {
  let mut enabled_extensions = Surface::required_extensions(event_loop)?;
  let mut enabled_layers = Vec::new();
  let mut debug_utils_messengers = Vec::new();

  if config.render.validation {
    if !check_validation_layer_support(&library)? {
      return Err(EngineError::ValidationLayersUnavailable);
    }
    enabled_extensions.ext_debug_utils = true;
    enabled_layers.push(VALIDATION_LAYER.to_owned());
    // Covers messages emitted while the instance itself is created and destroyed.
    debug_utils_messengers.push(messenger_create_info());
  }

  log::debug!("Instance extensions: {enabled_extensions:?}");

  Ok(Instance::new(
    library,
    InstanceCreateInfo {
      application_name: Some(config.window.title.clone()),
      flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
      enabled_layers,
      enabled_extensions,
      debug_utils_messengers,
      ..Default::default()
    },
  )?)
}

pub fn initialize_vulkan(event_loop: &EventLoop<()>, config: &AppConfig) -> Result<InitializedVulkan> {
  let library = VulkanLibrary::new()?;
  let instance = create_instance(library, event_loop, config)?;
  let debug_messenger = if config.render.validation {
    Some(setup_debug_messenger(&instance)?)
  } else {
    None
  };

  let selected = pick_physical_device(&instance, event_loop)?;
  let logical = create_logical_device(&selected)?;
  let device = logical.device;
  let properties = device.physical_device().properties();

  let max_samples = max_usable_sample_count(
    properties.framebuffer_color_sample_counts,
    properties.framebuffer_depth_sample_counts,
  );
  let samples = clamp_sample_count(config.render.msaa_samples, max_samples);
  let depth_format = find_depth_format(device.physical_device())?;
  log::info!("MSAA: {samples:?} (device max {max_samples:?}), depth format: {depth_format:?}");

  let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
  let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
    device.clone(),
    Default::default(),
  ));
  let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
    device.clone(),
    Default::default(),
  ));

  let uniform_buffer_allocator = SubbufferAllocator::new(
    memory_allocator.clone(),
    SubbufferAllocatorCreateInfo {
      buffer_usage: BufferUsage::UNIFORM_BUFFER,
      memory_type_filter: MemoryTypeFilter::PREFER_DEVICE | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
      ..Default::default()
    },
  );

  let model = load_model(&config.assets.model)?;
  let model_stats = ModelStats::new(config.assets.model.clone(), &model);
  let pixels = TexturePixels::load(texture_path(config, &model).as_deref())?;
  let model_buffers = ModelBuffers::upload(
    &memory_allocator,
    Geometry::from_model(&model),
    &config.assets.model,
  )?;

  let texture = upload_texture(
    &memory_allocator,
    &command_buffer_allocator,
    &logical.graphics_queue,
    pixels,
  )?;
  let sampler = create_sampler(&device, texture.mip_levels)?;

  let aspect_ratio = config.window.width as f32 / config.window.height as f32;
  let particles = ParticleSystem::new(
    &device,
    &memory_allocator,
    config.render.max_frames_in_flight,
    initial_particles(
      config.render.particle_count,
      aspect_ratio,
      &mut rand::thread_rng(),
    ),
  )?;

  Ok(InitializedVulkan {
    instance,
    debug_messenger,
    device,
    graphics_queue: logical.graphics_queue,
    present_queue: logical.present_queue,
    queue_families: selected.queues,
    memory_allocator,
    descriptor_set_allocator,
    command_buffer_allocator,
    uniform_buffer_allocator,
    model_buffers,
    model_stats,
    texture: texture.view,
    sampler,
    samples,
    depth_format,
    particles,
  })
}

#[cfg(test)]
mod tests {
  use std::{collections::HashMap, path::Path};

  use super::*;
  use crate::loader::{Material, TextureType};

  fn model_with_diffuse(path: &str) -> Model {
    Model {
      materials: vec![Material {
        material_textures: HashMap::from([(TextureType::Diffuse, path.to_owned())]),
        ..Default::default()
      }],
      ..Default::default()
    }
  }

  #[test]
  fn configured_texture_overrides_the_model() {
    let config = AppConfig::default();
    let model = model_with_diffuse("room.png");
    assert_eq!(
      texture_path(&config, &model).as_deref(),
      Some(Path::new("textures/viking_room.png"))
    );
  }

  #[test]
  fn model_texture_is_resolved_next_to_the_model() {
    let mut config = AppConfig::default();
    config.assets.texture = None;
    config.assets.model = PathBuf::from("assets/house/house.obj");
    let model = model_with_diffuse("tex/wall.png");
    assert_eq!(
      texture_path(&config, &model).as_deref(),
      Some(Path::new("assets/house/tex/wall.png"))
    );
  }

  #[test]
  fn no_texture_anywhere() {
    let mut config = AppConfig::default();
    config.assets.texture = None;
    assert_eq!(texture_path(&config, &Model::default()), None);
  }
}
