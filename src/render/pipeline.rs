//! Render pass, framebuffers and graphics pipelines.
//!
//! Subpass 0 draws the model and the particles into a multisampled color attachment that is
//! resolved into the swapchain image. Subpass 1 draws the overlay straight onto the resolved
//! image. With a single sample the resolve step disappears and subpass 0 renders to the
//! swapchain image directly.
//!
//! Framebuffers and pipelines depend on the window size, so they are rebuilt together by
//! [`window_size_dependent_setup`] whenever the swapchain is recreated.

use std::sync::Arc;

use vulkano::{
  device::{Device, DeviceOwned, physical::PhysicalDevice},
  format::{Format, FormatFeatures},
  image::{Image, ImageCreateInfo, ImageType, ImageUsage, SampleCount, view::ImageView},
  memory::allocator::{AllocationCreateInfo, StandardMemoryAllocator},
  pipeline::{
    GraphicsPipeline,
    PipelineLayout,
    PipelineShaderStageCreateInfo,
    graphics::{
      GraphicsPipelineCreateInfo,
      color_blend::{AttachmentBlend, ColorBlendAttachmentState, ColorBlendState},
      depth_stencil::{DepthState, DepthStencilState},
      input_assembly::{InputAssemblyState, PrimitiveTopology},
      multisample::MultisampleState,
      rasterization::{CullMode, FrontFace, RasterizationState},
      vertex_input::{Vertex, VertexDefinition},
      viewport::{Viewport, ViewportState},
    },
    layout::PipelineDescriptorSetLayoutCreateInfo,
  },
  render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass, Subpass},
  shader::{EntryPoint, ShaderModule},
  swapchain::Swapchain,
  sync::GpuFuture,
};
use winit::window::Window;

use crate::{
  core::device::sample_count_value,
  error::{EngineError, Result},
  render::vertex::{ModelVertex, Particle},
  shaders::{model_fs, model_vs, particle_fs, particle_vs},
};

const DEPTH_CANDIDATES: [Format; 3] = [
  Format::D32_SFLOAT,
  Format::D32_SFLOAT_S8_UINT,
  Format::D24_UNORM_S8_UINT,
];

/// First depth format usable as an optimally tiled depth attachment.
pub fn find_depth_format(physical: &PhysicalDevice) -> Result<Format> {
  for format in DEPTH_CANDIDATES {
    if physical
      .format_properties(format)?
      .optimal_tiling_features
      .intersects(FormatFeatures::DEPTH_STENCIL_ATTACHMENT)
    {
      return Ok(format);
    }
  }
  Err(EngineError::NoDepthFormat)
}

pub fn create_render_pass(
  device: &Arc<Device>,
  color_format: Format,
  depth_format: Format,
  samples: SampleCount,
) -> Result<Arc<RenderPass>> {
  let sample_count = sample_count_value(samples);

  let render_pass = if sample_count > 1 {
    vulkano::ordered_passes_renderpass!(
      device.clone(),
      attachments: {
        msaa_color: {
          format: color_format,
          samples: sample_count,
          load_op: Clear,
          store_op: DontCare,
        },
        final_color: {
          format: color_format,
          samples: 1,
          load_op: DontCare,
          store_op: Store,
        },
        depth: {
          format: depth_format,
          samples: sample_count,
          load_op: Clear,
          store_op: DontCare,
        }
      },
      passes: [
        {
          color: [msaa_color],
          color_resolve: [final_color],
          depth_stencil: {depth},
          input: []
        },
        {
          color: [final_color],
          depth_stencil: {},
          input: []
        }
      ]
    )?
  } else {
    vulkano::ordered_passes_renderpass!(
      device.clone(),
      attachments: {
        final_color: {
          format: color_format,
          samples: 1,
          load_op: Clear,
          store_op: Store,
        },
        depth: {
          format: depth_format,
          samples: 1,
          load_op: Clear,
          store_op: DontCare,
        }
      },
      passes: [
        {
          color: [final_color],
          depth_stencil: {depth},
          input: []
        },
        {
          color: [final_color],
          depth_stencil: {},
          input: []
        }
      ]
    )?
  };

  Ok(render_pass)
}

/// Whether `render_pass` renders through a multisampled attachment that gets resolved.
pub fn is_multisampled(render_pass: &RenderPass) -> bool {
  render_pass.attachments().len() > 2
}

pub(crate) fn main_entry_point(module: Arc<ShaderModule>, name: &'static str) -> Result<EntryPoint> {
  module
    .entry_point("main")
    .ok_or(EngineError::MissingEntryPoint(name))
}

/// Entry points for both graphics pipelines.
pub struct Shaders {
  pub model_vs:    EntryPoint,
  pub model_fs:    EntryPoint,
  pub particle_vs: EntryPoint,
  pub particle_fs: EntryPoint,
}

impl Shaders {
  pub fn load(device: &Arc<Device>) -> Result<Self> {
    Ok(Self {
      model_vs:    main_entry_point(model_vs::load(device.clone())?, "model_vs")?,
      model_fs:    main_entry_point(model_fs::load(device.clone())?, "model_fs")?,
      particle_vs: main_entry_point(particle_vs::load(device.clone())?, "particle_vs")?,
      particle_fs: main_entry_point(particle_fs::load(device.clone())?, "particle_fs")?,
    })
  }
}

/// Window-bound rendering state, created once the event loop resumes.
///
/// Everything sized after the swapchain (framebuffers, attachments, pipelines with baked
/// viewports) is rebuilt together through [`window_size_dependent_setup`].
pub struct RenderContext {
  /// The window being rendered to
  pub window:             Arc<Window>,
  /// Swapchain presenting to the window's surface
  pub swapchain:          Arc<Swapchain>,
  /// Scene subpass followed by the overlay subpass
  pub render_pass:        Arc<RenderPass>,
  /// Entry points reused when pipelines are rebuilt
  pub shaders:            Shaders,
  /// One framebuffer per swapchain image
  pub framebuffers:       Vec<Arc<Framebuffer>>,
  /// Textured, depth-tested model pipeline
  pub model_pipeline:     Arc<GraphicsPipeline>,
  /// Alpha-blended point pipeline for the particles
  pub particle_pipeline:  Arc<GraphicsPipeline>,
  /// Set when the swapchain is out of date or the window was resized
  pub recreate_swapchain: bool,
  /// Completion of the last submitted frame
  pub previous_frame_end: Option<Box<dyn GpuFuture>>,
}

impl RenderContext {
  pub fn aspect_ratio(&self) -> f32 {
    let [width, height] = self.swapchain.image_extent();
    width as f32 / height.max(1) as f32
  }
}

/// Inputs for [`window_size_dependent_setup`].
///
/// The swapchain images decide the attachment and viewport extent.
#[derive(Clone)]
pub struct WindowSizeSetupConfig<'a> {
  /// Swapchain images
  pub images:           &'a [Arc<Image>],
  /// Render pass to create framebuffers for
  pub render_pass:      &'a Arc<RenderPass>,
  /// Allocator for the depth and multisampled color attachments
  pub memory_allocator: &'a Arc<StandardMemoryAllocator>,
  /// Shaders for both pipelines
  pub shaders:          &'a Shaders,
  /// Format of the depth attachment
  pub depth_format:     Format,
  /// Rasterization samples, matching the render pass
  pub samples:          SampleCount,
}

/// Everything [`window_size_dependent_setup`] rebuilds.
pub struct SizeDependent {
  pub framebuffers:      Vec<Arc<Framebuffer>>,
  pub model_pipeline:    Arc<GraphicsPipeline>,
  pub particle_pipeline: Arc<GraphicsPipeline>,
}

fn transient_attachment(
  memory_allocator: &Arc<StandardMemoryAllocator>,
  format: Format,
  extent: [u32; 3],
  usage: ImageUsage,
  samples: SampleCount,
) -> Result<Arc<ImageView>> {
  let image = Image::new(
    memory_allocator.clone(),
    ImageCreateInfo {
      image_type: ImageType::Dim2d,
      format,
      extent,
      usage: usage | ImageUsage::TRANSIENT_ATTACHMENT,
      samples,
      ..Default::default()
    },
    AllocationCreateInfo::default(),
  )?;
  Ok(ImageView::new_default(image)?)
}

/// Called once during initialization, then again whenever the window is resized.
pub fn window_size_dependent_setup(config: WindowSizeSetupConfig) -> Result<SizeDependent> {
  let device = config.render_pass.device().clone();
  let first_image = config.images.first().ok_or(EngineError::SwapchainUnsupported)?;
  let extent = first_image.extent();

  let depth_buffer = transient_attachment(
    config.memory_allocator,
    config.depth_format,
    extent,
    ImageUsage::DEPTH_STENCIL_ATTACHMENT,
    config.samples,
  )?;

  let msaa_color = if is_multisampled(config.render_pass) {
    Some(transient_attachment(
      config.memory_allocator,
      first_image.format(),
      extent,
      ImageUsage::COLOR_ATTACHMENT,
      config.samples,
    )?)
  } else {
    None
  };

  let framebuffers = config
    .images
    .iter()
    .map(|image| -> Result<Arc<Framebuffer>> {
      let view = ImageView::new_default(image.clone())?;
      let attachments = match &msaa_color {
        Some(msaa_color) => vec![msaa_color.clone(), view, depth_buffer.clone()],
        None => vec![view, depth_buffer.clone()],
      };

      Ok(Framebuffer::new(
        config.render_pass.clone(),
        FramebufferCreateInfo {
          attachments,
          ..Default::default()
        },
      )?)
    })
    .collect::<Result<Vec<_>>>()?;

  let subpass =
    Subpass::from(config.render_pass.clone(), 0).ok_or(EngineError::MissingSubpass(0))?;

  let viewport_state = ViewportState {
    viewports: [Viewport {
      offset:      [0.0, 0.0],
      extent:      [extent[0] as f32, extent[1] as f32],
      depth_range: 0.0..=1.0,
    }]
    .into_iter()
    .collect(),
    ..Default::default()
  };
  let multisample_state = MultisampleState {
    rasterization_samples: config.samples,
    ..Default::default()
  };

  let model_pipeline = {
    let vertex_input_state = ModelVertex::per_vertex().definition(&config.shaders.model_vs)?;
    let stages = [
      PipelineShaderStageCreateInfo::new(config.shaders.model_vs.clone()),
      PipelineShaderStageCreateInfo::new(config.shaders.model_fs.clone()),
    ];
    let layout = pipeline_layout(&device, &stages)?;

    GraphicsPipeline::new(
      device.clone(),
      None,
      GraphicsPipelineCreateInfo {
        stages: stages.into_iter().collect(),
        vertex_input_state: Some(vertex_input_state),
        input_assembly_state: Some(InputAssemblyState::default()),
        viewport_state: Some(viewport_state.clone()),
        rasterization_state: Some(RasterizationState {
          cull_mode: CullMode::Back,
          front_face: FrontFace::CounterClockwise,
          ..Default::default()
        }),
        depth_stencil_state: Some(DepthStencilState {
          depth: Some(DepthState::simple()),
          ..Default::default()
        }),
        multisample_state: Some(multisample_state.clone()),
        color_blend_state: Some(ColorBlendState::with_attachment_states(
          subpass.num_color_attachments(),
          ColorBlendAttachmentState::default(),
        )),
        subpass: Some(subpass.clone().into()),
        ..GraphicsPipelineCreateInfo::layout(layout)
      },
    )?
  };

  let particle_pipeline = {
    let vertex_input_state = Particle::per_vertex().definition(&config.shaders.particle_vs)?;
    let stages = [
      PipelineShaderStageCreateInfo::new(config.shaders.particle_vs.clone()),
      PipelineShaderStageCreateInfo::new(config.shaders.particle_fs.clone()),
    ];
    let layout = pipeline_layout(&device, &stages)?;

    GraphicsPipeline::new(
      device.clone(),
      None,
      GraphicsPipelineCreateInfo {
        stages: stages.into_iter().collect(),
        vertex_input_state: Some(vertex_input_state),
        input_assembly_state: Some(InputAssemblyState {
          topology: PrimitiveTopology::PointList,
          ..Default::default()
        }),
        viewport_state: Some(viewport_state),
        rasterization_state: Some(RasterizationState::default()),
        // Drawn over the model, so the depth test stays off.
        depth_stencil_state: Some(DepthStencilState::default()),
        multisample_state: Some(multisample_state),
        color_blend_state: Some(ColorBlendState::with_attachment_states(
          subpass.num_color_attachments(),
          ColorBlendAttachmentState {
            blend: Some(AttachmentBlend::alpha()),
            ..Default::default()
          },
        )),
        subpass: Some(subpass.into()),
        ..GraphicsPipelineCreateInfo::layout(layout)
      },
    )?
  };

  Ok(SizeDependent {
    framebuffers,
    model_pipeline,
    particle_pipeline,
  })
}

fn pipeline_layout(
  device: &Arc<Device>,
  stages: &[PipelineShaderStageCreateInfo],
) -> Result<Arc<PipelineLayout>> {
  Ok(PipelineLayout::new(
    device.clone(),
    PipelineDescriptorSetLayoutCreateInfo::from_stages(stages)
      .into_pipeline_layout_create_info(device.clone())
      .map_err(|e| EngineError::PipelineLayout(format!("{e:?}")))?,
  )?)
}
