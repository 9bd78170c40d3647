//! Error types for the application.

use std::path::PathBuf;

use thiserror::Error;
use vulkano::{
  LoadingError,
  Validated,
  ValidationError,
  VulkanError,
  buffer::AllocateBufferError,
  command_buffer::CommandBufferExecError,
  format::Format,
  image::AllocateImageError,
  memory::allocator::MemoryAllocatorError,
  sync::HostAccessError,
};

/// Everything that can go wrong while setting up or driving the renderer.
#[derive(Error, Debug)]
pub enum EngineError {
  #[error("failed to load the Vulkan library: {0}")]
  Loading(#[from] LoadingError),

  #[error("Vulkan error: {0}")]
  Vulkan(#[from] VulkanError),

  #[error("Vulkan error: {0}")]
  ValidatedVulkan(#[from] Validated<VulkanError>),

  #[error("invalid Vulkan usage: {0}")]
  Validation(#[from] Box<ValidationError>),

  #[error("buffer allocation failed: {0}")]
  AllocateBuffer(#[from] Validated<AllocateBufferError>),

  #[error("image allocation failed: {0}")]
  AllocateImage(#[from] Validated<AllocateImageError>),

  #[error("memory allocation failed: {0}")]
  MemoryAllocator(#[from] MemoryAllocatorError),

  #[error("command buffer execution failed: {0}")]
  CommandBufferExec(#[from] CommandBufferExecError),

  #[error("buffer host access failed: {0}")]
  HostAccess(#[from] HostAccessError),

  #[error("window handle unavailable: {0}")]
  WindowHandle(#[from] raw_window_handle::HandleError),

  #[error("failed to create a surface: {0}")]
  Surface(String),

  #[error("event loop error: {0}")]
  EventLoop(#[from] winit::error::EventLoopError),

  #[error("failed to create a window: {0}")]
  Window(#[from] winit::error::OsError),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("failed to decode image: {0}")]
  Image(#[from] image::ImageError),

  #[error("failed to load OBJ model: {0}")]
  Obj(#[from] tobj::LoadError),

  #[error("failed to load glTF model: {0}")]
  Gltf(#[from] gltf::Error),

  #[error("failed to parse config: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("validation layers requested, but not available")]
  ValidationLayersUnavailable,

  #[error("failed to find a suitable GPU")]
  NoSuitableDevice,

  #[error("device did not expose a {0} queue")]
  NoQueue(&'static str),

  #[error("surface reports no formats or present modes")]
  SwapchainUnsupported,

  #[error("failed to find a supported depth format")]
  NoDepthFormat,

  #[error("texture image format {0:?} does not support linear blitting")]
  LinearBlitUnsupported(Format),

  #[error("shader entry point `{0}` not found")]
  MissingEntryPoint(&'static str),

  #[error("render pass has no subpass {0}")]
  MissingSubpass(u32),

  #[error("failed to derive pipeline layout: {0}")]
  PipelineLayout(String),

  #[error("invalid config: {0}")]
  InvalidConfig(String),

  #[error("unsupported or empty model: {0}")]
  UnsupportedModel(PathBuf),
}

/// Convenience type alias for results carrying an [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
