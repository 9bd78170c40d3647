//! Texture upload with a generated mip chain, and the matching sampler.

use std::{path::Path, sync::Arc};

use vulkano::{
  buffer::{Buffer, BufferCreateInfo, BufferUsage},
  command_buffer::{
    AutoCommandBufferBuilder,
    BlitImageInfo,
    CommandBufferUsage,
    CopyBufferToImageInfo,
    ImageBlit,
    PrimaryCommandBufferAbstract,
    allocator::StandardCommandBufferAllocator,
  },
  device::{Device, DeviceOwned, Queue},
  format::{Format, FormatFeatures},
  image::{
    Image,
    ImageAspects,
    ImageCreateInfo,
    ImageSubresourceLayers,
    ImageType,
    ImageUsage,
    sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo, SamplerMipmapMode},
    view::ImageView,
  },
  memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
  sync::GpuFuture,
};

use crate::error::{EngineError, Result};

pub const TEXTURE_FORMAT: Format = Format::R8G8B8A8_SRGB;

pub fn mip_levels(width: u32, height: u32) -> u32 {
  width.max(height).max(1).ilog2() + 1
}

pub fn mip_extent(base: [u32; 2], level: u32) -> [u32; 2] {
  [(base[0] >> level).max(1), (base[1] >> level).max(1)]
}

/// Decoded RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TexturePixels {
  pub width:  u32,
  pub height: u32,
  pub rgba:   Vec<u8>,
}

impl TexturePixels {
  pub fn white() -> Self {
    Self {
      width:  1,
      height: 1,
      rgba:   vec![255; 4],
    }
  }

  /// Decodes `path`, or returns a single white texel when there is nothing to load.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let Some(path) = path else {
      log::info!("No texture configured, using a white texel");
      return Ok(Self::white());
    };
    if !path.exists() {
      log::warn!("Texture {} not found, using a white texel", path.display());
      return Ok(Self::white());
    }

    let decoded = image::open(path)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    log::info!("Loaded texture {} ({width}x{height})", path.display());

    Ok(Self {
      width,
      height,
      rgba: decoded.into_raw(),
    })
  }
}

/// A sampled image and how many mip levels it carries.
pub struct Texture {
  pub view:       Arc<ImageView>,
  pub mip_levels: u32,
}

/// Copies `pixels` to a device-local image and fills the rest of its mip chain by repeated
/// linear blits. Blocks until the upload has finished.
pub fn upload_texture(
  memory_allocator: &Arc<StandardMemoryAllocator>,
  command_buffer_allocator: &Arc<StandardCommandBufferAllocator>,
  queue: &Arc<Queue>,
  pixels: TexturePixels,
) -> Result<Texture> {
  let physical = queue.device().physical_device();
  if !physical
    .format_properties(TEXTURE_FORMAT)?
    .optimal_tiling_features
    .intersects(FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR)
  {
    return Err(EngineError::LinearBlitUnsupported(TEXTURE_FORMAT));
  }

  let base = [pixels.width, pixels.height];
  let levels = mip_levels(pixels.width, pixels.height);

  let image = Image::new(
    memory_allocator.clone(),
    ImageCreateInfo {
      image_type: ImageType::Dim2d,
      format: TEXTURE_FORMAT,
      extent: [base[0], base[1], 1],
      mip_levels: levels,
      usage: ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
      ..Default::default()
    },
    AllocationCreateInfo {
      memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
      ..Default::default()
    },
  )?;

  let staging_buffer = Buffer::from_iter(
    memory_allocator.clone(),
    BufferCreateInfo {
      usage: BufferUsage::TRANSFER_SRC,
      ..Default::default()
    },
    AllocationCreateInfo {
      memory_type_filter: MemoryTypeFilter::PREFER_HOST | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
      ..Default::default()
    },
    pixels.rgba,
  )?;

  let mut upload = AutoCommandBufferBuilder::primary(
    command_buffer_allocator.clone(),
    queue.queue_family_index(),
    CommandBufferUsage::OneTimeSubmit,
  )?;

  upload.copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(
    staging_buffer,
    image.clone(),
  ))?;

  for level in 1..levels {
    let src = mip_extent(base, level - 1);
    let dst = mip_extent(base, level);

    upload.blit_image(BlitImageInfo {
      regions: [ImageBlit {
        src_subresource: ImageSubresourceLayers {
          aspects:      ImageAspects::COLOR,
          mip_level:    level - 1,
          array_layers: 0..1,
        },
        src_offsets: [[0, 0, 0], [src[0], src[1], 1]],
        dst_subresource: ImageSubresourceLayers {
          aspects:      ImageAspects::COLOR,
          mip_level:    level,
          array_layers: 0..1,
        },
        dst_offsets: [[0, 0, 0], [dst[0], dst[1], 1]],
        ..Default::default()
      }]
      .into(),
      filter: Filter::Linear,
      ..BlitImageInfo::images(image.clone(), image.clone())
    })?;
  }

  upload
    .build()?
    .execute(queue.clone())?
    .then_signal_fence_and_flush()?
    .wait(None)?;

  log::debug!("Uploaded {}x{} texture with {levels} mip levels", base[0], base[1]);

  Ok(Texture {
    view:       ImageView::new_default(image)?,
    mip_levels: levels,
  })
}

pub fn create_sampler(device: &Arc<Device>, mip_levels: u32) -> Result<Arc<Sampler>> {
  let anisotropy = device
    .enabled_features()
    .sampler_anisotropy
    .then(|| device.physical_device().properties().max_sampler_anisotropy);

  Ok(Sampler::new(
    device.clone(),
    SamplerCreateInfo {
      mag_filter: Filter::Linear,
      min_filter: Filter::Linear,
      mipmap_mode: SamplerMipmapMode::Linear,
      address_mode: [SamplerAddressMode::Repeat; 3],
      anisotropy,
      lod: 0.0..=mip_levels as f32,
      ..Default::default()
    },
  )?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mip_chain_length() {
    assert_eq!(mip_levels(1, 1), 1);
    assert_eq!(mip_levels(1024, 1024), 11);
    assert_eq!(mip_levels(1024, 512), 11);
    assert_eq!(mip_levels(1000, 3), 10);
  }

  #[test]
  fn mip_extent_never_reaches_zero() {
    assert_eq!(mip_extent([1024, 256], 0), [1024, 256]);
    assert_eq!(mip_extent([1024, 256], 3), [128, 32]);
    assert_eq!(mip_extent([1024, 256], 10), [1, 1]);
  }

  #[test]
  fn missing_texture_falls_back_to_white() {
    let pixels = TexturePixels::load(None).unwrap();
    assert_eq!(pixels, TexturePixels::white());

    let pixels = TexturePixels::load(Some(Path::new("does/not/exist.png"))).unwrap();
    assert_eq!((pixels.width, pixels.height), (1, 1));
    assert_eq!(pixels.rgba, [255, 255, 255, 255]);
  }
}
