//! Validation layer discovery and the debug messenger that forwards layer output into `log`.

use std::sync::Arc;

use log::Level;
use vulkano::{
  VulkanLibrary,
  instance::{
    Instance,
    debug::{
      DebugUtilsMessageSeverity,
      DebugUtilsMessageType,
      DebugUtilsMessenger,
      DebugUtilsMessengerCallback,
      DebugUtilsMessengerCreateInfo,
    },
  },
};

use crate::error::Result;

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

pub fn check_validation_layer_support(library: &VulkanLibrary) -> Result<bool> {
  let available = library
    .layer_properties()?
    .any(|layer| layer.name() == VALIDATION_LAYER);
  Ok(available)
}

/// Maps a message severity onto the `log` level it is reported at.
pub fn log_level(severity: DebugUtilsMessageSeverity) -> Level {
  if severity.intersects(DebugUtilsMessageSeverity::ERROR) {
    Level::Error
  } else if severity.intersects(DebugUtilsMessageSeverity::WARNING) {
    Level::Warn
  } else if severity.intersects(DebugUtilsMessageSeverity::INFO) {
    Level::Info
  } else {
    Level::Trace
  }
}

fn message_kind(ty: DebugUtilsMessageType) -> &'static str {
  if ty.intersects(DebugUtilsMessageType::VALIDATION) {
    "validation"
  } else if ty.intersects(DebugUtilsMessageType::PERFORMANCE) {
    "performance"
  } else {
    "general"
  }
}

pub fn messenger_create_info() -> DebugUtilsMessengerCreateInfo {
  // SAFETY: the callback only formats the message and hands it to the logger; it never
  // calls back into Vulkan.
  let callback = unsafe {
    DebugUtilsMessengerCallback::new(|severity, ty, data| {
      log::log!(
        target: "vulkan",
        log_level(severity),
        "{} [{}]: {}",
        message_kind(ty),
        data.message_id_name.unwrap_or("unknown"),
        data.message
      );
    })
  };

  DebugUtilsMessengerCreateInfo {
    message_severity: DebugUtilsMessageSeverity::ERROR
      | DebugUtilsMessageSeverity::WARNING
      | DebugUtilsMessageSeverity::INFO
      | DebugUtilsMessageSeverity::VERBOSE,
    message_type: DebugUtilsMessageType::GENERAL
      | DebugUtilsMessageType::VALIDATION
      | DebugUtilsMessageType::PERFORMANCE,
    ..DebugUtilsMessengerCreateInfo::user_callback(callback)
  }
}

pub fn setup_debug_messenger(instance: &Arc<Instance>) -> Result<DebugUtilsMessenger> {
  Ok(DebugUtilsMessenger::new(
    instance.clone(),
    messenger_create_info(),
  )?)
}
