//! Surface format, present mode and extent selection, plus swapchain (re)creation.

use std::sync::Arc;

use vulkano::{
  device::{Device, DeviceOwned},
  format::Format,
  image::{Image, ImageUsage},
  swapchain::{
    ColorSpace,
    PresentMode,
    Surface,
    SurfaceCapabilities,
    SurfaceInfo,
    Swapchain,
    SwapchainCreateInfo,
  },
  sync::Sharing,
};
use winit::window::Window;

use crate::{
  core::device::QueueFamilyIndices,
  error::{EngineError, Result},
};

/// Prefers 8-bit BGRA sRGB, falling back to whatever the surface lists first.
pub fn choose_surface_format(formats: &[(Format, ColorSpace)]) -> Option<(Format, ColorSpace)> {
  formats
    .iter()
    .copied()
    .find(|&(format, color_space)| {
      format == Format::B8G8R8A8_SRGB && color_space == ColorSpace::SrgbNonLinear
    })
    .or_else(|| formats.first().copied())
}

/// FIFO is the only mode every implementation has to support.
pub fn choose_present_mode(available: &[PresentMode], preferred: PresentMode) -> PresentMode {
  if available.contains(&preferred) {
    preferred
  } else {
    PresentMode::Fifo
  }
}

pub fn choose_extent(
  current: Option<[u32; 2]>,
  window: [u32; 2],
  min: [u32; 2],
  max: [u32; 2],
) -> [u32; 2] {
  current.unwrap_or([
    window[0].clamp(min[0], max[0]),
    window[1].clamp(min[1], max[1]),
  ])
}

/// One more than the minimum so the driver never makes us wait on it, capped by the maximum.
pub fn choose_image_count(min: u32, max: Option<u32>) -> u32 {
  let count = min + 1;
  match max {
    Some(max) if max > 0 => count.min(max),
    _ => count,
  }
}

pub fn create_swapchain(
  device: &Arc<Device>,
  surface: &Arc<Surface>,
  window: &Window,
  queues: &QueueFamilyIndices,
  preferred_present_mode: PresentMode,
) -> Result<(Arc<Swapchain>, Vec<Arc<Image>>)> {
  let physical = device.physical_device();
  let capabilities = physical.surface_capabilities(surface, SurfaceInfo::default())?;
  let formats = physical.surface_formats(surface, SurfaceInfo::default())?;
  let present_modes: Vec<PresentMode> = physical
    .surface_present_modes(surface, SurfaceInfo::default())?
    .into_iter()
    .collect();

  let (image_format, image_color_space) =
    choose_surface_format(&formats).ok_or(EngineError::SwapchainUnsupported)?;
  if present_modes.is_empty() {
    return Err(EngineError::SwapchainUnsupported);
  }
  let present_mode = choose_present_mode(&present_modes, preferred_present_mode);

  let window_size = window.inner_size();
  let image_extent = surface_extent(&capabilities, [window_size.width, window_size.height]);

  let families = queues.unique();
  let image_sharing = if families.len() > 1 {
    Sharing::Concurrent(families.into_iter().collect())
  } else {
    Sharing::Exclusive
  };

  let composite_alpha = capabilities
    .supported_composite_alpha
    .into_iter()
    .next()
    .ok_or(EngineError::SwapchainUnsupported)?;

  log::info!(
    "Creating swapchain: {:?} {:?}, {:?}, {}x{}",
    image_format,
    image_color_space,
    present_mode,
    image_extent[0],
    image_extent[1],
  );

  let (swapchain, images) = Swapchain::new(
    device.clone(),
    surface.clone(),
    SwapchainCreateInfo {
      min_image_count: choose_image_count(
        capabilities.min_image_count,
        capabilities.max_image_count,
      ),
      image_format,
      image_color_space,
      image_extent,
      image_usage: ImageUsage::COLOR_ATTACHMENT,
      image_sharing,
      pre_transform: capabilities.current_transform,
      composite_alpha,
      present_mode,
      clipped: true,
      ..Default::default()
    },
  )?;

  Ok((swapchain, images))
}

fn surface_extent(capabilities: &SurfaceCapabilities, window_size: [u32; 2]) -> [u32; 2] {
  choose_extent(
    capabilities.current_extent,
    window_size,
    capabilities.min_image_extent,
    capabilities.max_image_extent,
  )
}

/// Rebuilds `swapchain` for the current surface, honouring the same extent limits as
/// [`create_swapchain`].
pub fn recreate_swapchain(
  swapchain: &Arc<Swapchain>,
  window_size: [u32; 2],
) -> Result<(Arc<Swapchain>, Vec<Arc<Image>>)> {
  let capabilities = swapchain
    .device()
    .physical_device()
    .surface_capabilities(swapchain.surface(), SurfaceInfo::default())?;
  let image_extent = surface_extent(&capabilities, window_size);
  log::debug!("Recreating swapchain at {}x{}", image_extent[0], image_extent[1]);

  Ok(swapchain.recreate(SwapchainCreateInfo {
    image_extent,
    ..swapchain.create_info()
  })?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefers_srgb_bgra() {
    let formats = [
      (Format::R8G8B8A8_UNORM, ColorSpace::SrgbNonLinear),
      (Format::B8G8R8A8_SRGB, ColorSpace::SrgbNonLinear),
    ];
    assert_eq!(
      choose_surface_format(&formats),
      Some((Format::B8G8R8A8_SRGB, ColorSpace::SrgbNonLinear))
    );
  }

  #[test]
  fn falls_back_to_first_format() {
    let formats = [
      (Format::R8G8B8A8_UNORM, ColorSpace::SrgbNonLinear),
      (Format::B8G8R8A8_UNORM, ColorSpace::SrgbNonLinear),
    ];
    assert_eq!(choose_surface_format(&formats), Some(formats[0]));
    assert_eq!(choose_surface_format(&[]), None);
  }

  #[test]
  fn present_mode_falls_back_to_fifo() {
    let available = [PresentMode::Fifo, PresentMode::Immediate];
    assert_eq!(
      choose_present_mode(&available, PresentMode::Immediate),
      PresentMode::Immediate
    );
    assert_eq!(
      choose_present_mode(&available, PresentMode::Mailbox),
      PresentMode::Fifo
    );
  }

  #[test]
  fn fixed_surface_extent_wins() {
    assert_eq!(
      choose_extent(Some([640, 480]), [800, 600], [1, 1], [4096, 4096]),
      [640, 480]
    );
  }

  #[test]
  fn window_extent_is_clamped() {
    assert_eq!(
      choose_extent(None, [8000, 0], [1, 1], [4096, 4096]),
      [4096, 1]
    );
    assert_eq!(
      choose_extent(None, [800, 600], [1, 1], [4096, 4096]),
      [800, 600]
    );
  }

  #[test]
  fn resized_window_stays_within_surface_limits() {
    let (min, max) = ([64, 64], [1920, 1080]);
    assert_eq!(choose_extent(None, [2560, 1440], min, max), [1920, 1080]);
    assert_eq!(choose_extent(None, [10, 700], min, max), [64, 700]);
    assert_eq!(choose_extent(Some([1280, 720]), [2560, 1440], min, max), [1280, 720]);
  }

  #[test]
  fn image_count_is_one_above_minimum() {
    assert_eq!(choose_image_count(2, None), 3);
    assert_eq!(choose_image_count(2, Some(8)), 3);
    assert_eq!(choose_image_count(3, Some(3)), 3);
  }
}
