//! Physical device selection and logical device creation.

use std::sync::Arc;

use vulkano::{
  device::{
    Device,
    DeviceCreateInfo,
    DeviceExtensions,
    DeviceFeatures,
    Queue,
    QueueCreateInfo,
    QueueFlags,
    physical::{PhysicalDevice, PhysicalDeviceType},
  },
  image::{SampleCount, SampleCounts},
  instance::Instance,
};
use winit::event_loop::EventLoop;

use crate::error::{EngineError, Result};

pub fn required_device_extensions() -> DeviceExtensions {
  DeviceExtensions {
    khr_swapchain: true,
    ..DeviceExtensions::empty()
  }
}

/// Queue families used by the renderer. Graphics and compute work share one family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
  pub graphics_and_compute: Option<u32>,
  pub present:              Option<u32>,
}

impl QueueFamilyIndices {
  /// Scans queue families in order. A family that can draw, compute and present is taken
  /// as soon as it is seen; otherwise the first matches for each role are kept.
  pub fn find(flags: &[QueueFlags], mut present_support: impl FnMut(u32) -> bool) -> Self {
    let mut indices = Self::default();

    for (i, queue_flags) in flags.iter().enumerate() {
      let i = i as u32;
      let graphics = queue_flags.contains(QueueFlags::GRAPHICS | QueueFlags::COMPUTE);
      let present = present_support(i);

      if graphics && present {
        return Self {
          graphics_and_compute: Some(i),
          present:              Some(i),
        };
      }
      if graphics && indices.graphics_and_compute.is_none() {
        indices.graphics_and_compute = Some(i);
      }
      if present && indices.present.is_none() {
        indices.present = Some(i);
      }
    }

    indices
  }

  pub fn is_complete(&self) -> bool {
    self.graphics_and_compute.is_some() && self.present.is_some()
  }

  /// Distinct family indices, one queue gets created per entry.
  pub fn unique(&self) -> Vec<u32> {
    let mut families: Vec<u32> = [self.graphics_and_compute, self.present]
      .into_iter()
      .flatten()
      .collect();
    families.dedup();
    families
  }
}

pub fn device_type_rank(device_type: PhysicalDeviceType) -> u32 {
  match device_type {
    PhysicalDeviceType::DiscreteGpu => 0,
    PhysicalDeviceType::IntegratedGpu => 1,
    PhysicalDeviceType::VirtualGpu => 2,
    PhysicalDeviceType::Cpu => 3,
    PhysicalDeviceType::Other => 4,
    _ => 5,
  }
}

const SAMPLE_COUNTS: [(SampleCounts, SampleCount); 7] = [
  (SampleCounts::SAMPLE_64, SampleCount::Sample64),
  (SampleCounts::SAMPLE_32, SampleCount::Sample32),
  (SampleCounts::SAMPLE_16, SampleCount::Sample16),
  (SampleCounts::SAMPLE_8, SampleCount::Sample8),
  (SampleCounts::SAMPLE_4, SampleCount::Sample4),
  (SampleCounts::SAMPLE_2, SampleCount::Sample2),
  (SampleCounts::SAMPLE_1, SampleCount::Sample1),
];

pub fn sample_count_value(samples: SampleCount) -> u32 {
  match samples {
    SampleCount::Sample1 => 1,
    SampleCount::Sample2 => 2,
    SampleCount::Sample4 => 4,
    SampleCount::Sample8 => 8,
    SampleCount::Sample16 => 16,
    SampleCount::Sample32 => 32,
    SampleCount::Sample64 => 64,
    #[allow(unreachable_patterns)]
    _ => 1,
  }
}

/// Highest sample count usable for both color and depth attachments.
pub fn max_usable_sample_count(color: SampleCounts, depth: SampleCounts) -> SampleCount {
  SAMPLE_COUNTS
    .iter()
    .find(|(flag, _)| color.intersects(*flag) && depth.intersects(*flag))
    .map(|(_, count)| *count)
    .unwrap_or(SampleCount::Sample1)
}

pub fn clamp_sample_count(requested: u32, max: SampleCount) -> SampleCount {
  SAMPLE_COUNTS
    .iter()
    .map(|(_, count)| *count)
    .find(|count| {
      let value = sample_count_value(*count);
      value <= requested && value <= sample_count_value(max)
    })
    .unwrap_or(SampleCount::Sample1)
}

pub struct SelectedDevice {
  pub physical: Arc<PhysicalDevice>,
  pub queues:   QueueFamilyIndices,
}

pub fn pick_physical_device(
  instance: &Arc<Instance>,
  event_loop: &EventLoop<()>,
) -> Result<SelectedDevice> {
  let device_extensions = required_device_extensions();

  let (physical, queues) = instance
    .enumerate_physical_devices()?
    .inspect(|p| {
      log::debug!(
        "Found device: {} ({:?})",
        p.properties().device_name,
        p.properties().device_type
      )
    })
    .filter(|p| p.supported_extensions().contains(&device_extensions))
    .filter_map(|p| {
      let flags: Vec<QueueFlags> = p
        .queue_family_properties()
        .iter()
        .map(|q| q.queue_flags)
        .collect();
      let indices = QueueFamilyIndices::find(&flags, |i| {
        p.presentation_support(i, event_loop).unwrap_or(false)
      });
      indices.is_complete().then_some((p, indices))
    })
    .min_by_key(|(p, _)| {
      (
        !p.supported_features().sampler_anisotropy,
        device_type_rank(p.properties().device_type),
      )
    })
    .ok_or(EngineError::NoSuitableDevice)?;

  log::info!(
    "Using device: {} (type: {:?})",
    physical.properties().device_name,
    physical.properties().device_type,
  );

  Ok(SelectedDevice { physical, queues })
}

pub struct LogicalDevice {
  pub device:         Arc<Device>,
  pub graphics_queue: Arc<Queue>,
  pub present_queue:  Arc<Queue>,
}

pub fn create_logical_device(selected: &SelectedDevice) -> Result<LogicalDevice> {
  let physical = &selected.physical;
  let supported = physical.supported_features();

  let (device, queues) = Device::new(
    physical.clone(),
    DeviceCreateInfo {
      enabled_extensions: required_device_extensions(),
      enabled_features: DeviceFeatures {
        sampler_anisotropy: supported.sampler_anisotropy,
        large_points: supported.large_points,
        ..DeviceFeatures::empty()
      },
      queue_create_infos: selected
        .queues
        .unique()
        .into_iter()
        .map(|queue_family_index| QueueCreateInfo {
          queue_family_index,
          ..Default::default()
        })
        .collect(),
      ..Default::default()
    },
  )?;

  let queues: Vec<Arc<Queue>> = queues.collect();
  let find_queue = |family: Option<u32>, role: &'static str| {
    queues
      .iter()
      .find(|q| Some(q.queue_family_index()) == family)
      .cloned()
      .ok_or(EngineError::NoQueue(role))
  };

  let graphics_queue = find_queue(selected.queues.graphics_and_compute, "graphics")?;
  let present_queue = find_queue(selected.queues.present, "present")?;

  Ok(LogicalDevice {
    device,
    graphics_queue,
    present_queue,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefers_a_family_that_does_everything() {
    let flags = [
      QueueFlags::TRANSFER,
      QueueFlags::GRAPHICS | QueueFlags::COMPUTE,
      QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER,
    ];
    let indices = QueueFamilyIndices::find(&flags, |i| i == 2);
    assert_eq!(indices.graphics_and_compute, Some(2));
    assert_eq!(indices.present, Some(2));
    assert_eq!(indices.unique(), vec![2]);
  }

  #[test]
  fn splits_graphics_and_present_when_needed() {
    let flags = [QueueFlags::GRAPHICS | QueueFlags::COMPUTE, QueueFlags::TRANSFER];
    let indices = QueueFamilyIndices::find(&flags, |i| i == 1);
    assert!(indices.is_complete());
    assert_eq!(indices.graphics_and_compute, Some(0));
    assert_eq!(indices.present, Some(1));
    assert_eq!(indices.unique(), vec![0, 1]);
  }

  #[test]
  fn graphics_without_compute_does_not_qualify() {
    let flags = [QueueFlags::GRAPHICS, QueueFlags::COMPUTE];
    let indices = QueueFamilyIndices::find(&flags, |_| true);
    assert_eq!(indices.graphics_and_compute, None);
    assert_eq!(indices.present, Some(0));
    assert!(!indices.is_complete());
  }

  #[test]
  fn stops_scanning_once_complete() {
    let flags = [QueueFlags::GRAPHICS | QueueFlags::COMPUTE; 4];
    let mut queried = Vec::new();
    QueueFamilyIndices::find(&flags, |i| {
      queried.push(i);
      true
    });
    assert_eq!(queried, vec![0]);
  }

  #[test]
  fn discrete_gpus_rank_first() {
    assert!(
      device_type_rank(PhysicalDeviceType::DiscreteGpu)
        < device_type_rank(PhysicalDeviceType::IntegratedGpu)
    );
    assert!(
      device_type_rank(PhysicalDeviceType::IntegratedGpu)
        < device_type_rank(PhysicalDeviceType::Cpu)
    );
  }

  #[test]
  fn usable_samples_must_suit_color_and_depth() {
    let color = SampleCounts::SAMPLE_1 | SampleCounts::SAMPLE_4 | SampleCounts::SAMPLE_8;
    let depth = SampleCounts::SAMPLE_1 | SampleCounts::SAMPLE_4;
    assert_eq!(max_usable_sample_count(color, depth), SampleCount::Sample4);
    assert_eq!(
      max_usable_sample_count(SampleCounts::SAMPLE_1, depth),
      SampleCount::Sample1
    );
  }

  #[test]
  fn requested_samples_are_clamped() {
    assert_eq!(clamp_sample_count(4, SampleCount::Sample8), SampleCount::Sample4);
    assert_eq!(clamp_sample_count(16, SampleCount::Sample8), SampleCount::Sample8);
    assert_eq!(clamp_sample_count(1, SampleCount::Sample8), SampleCount::Sample1);
  }
}
