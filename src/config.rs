//! Application configuration.
//!
//! Settings are read from a TOML file (by default `engine.toml` in the working directory).
//! Any missing table or key falls back to the defaults below, and a missing file means
//! "all defaults".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vulkano::swapchain::PresentMode;

use crate::error::{EngineError, Result};

/// Default location of the config file.
pub const CONFIG_PATH: &str = "engine.toml";

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
  pub window: WindowConfig,
  pub render: RenderConfig,
  pub assets: AssetConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
  pub title:     String,
  pub width:     u32,
  pub height:    u32,
  pub resizable: bool,
}

impl Default for WindowConfig {
  fn default() -> Self {
    Self {
      title:     "Vulkan".to_owned(),
      width:     800,
      height:    600,
      resizable: true,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderConfig {
  /// Enables `VK_LAYER_KHRONOS_validation` and the debug messenger.
  pub validation:           bool,
  pub max_frames_in_flight: usize,
  /// Requested MSAA sample count, clamped to what the device supports.
  pub msaa_samples:         u32,
  pub present_mode:         PresentModePreference,
  pub particle_count:       u32,
}

impl Default for RenderConfig {
  fn default() -> Self {
    Self {
      validation:           cfg!(debug_assertions),
      max_frames_in_flight: 2,
      msaa_samples:         4,
      present_mode:         PresentModePreference::Mailbox,
      particle_count:       8192,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentModePreference {
  Immediate,
  Mailbox,
  Fifo,
}

impl From<PresentModePreference> for PresentMode {
  fn from(pref: PresentModePreference) -> Self {
    match pref {
      PresentModePreference::Immediate => PresentMode::Immediate,
      PresentModePreference::Mailbox => PresentMode::Mailbox,
      PresentModePreference::Fifo => PresentMode::Fifo,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
  pub model:   PathBuf,
  /// Overrides the texture referenced by the model's materials.
  pub texture: Option<PathBuf>,
}

impl Default for AssetConfig {
  fn default() -> Self {
    Self {
      model:   PathBuf::from("models/viking_room.obj"),
      texture: Some(PathBuf::from("textures/viking_room.png")),
    }
  }
}

impl AppConfig {
  /// Reads the config at `path`, or returns the defaults when the file does not exist.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.exists() {
      log::info!("No config at {}, using defaults", path.display());
      return Ok(Self::default());
    }

    let config = Self::from_toml(&std::fs::read_to_string(path)?)?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
  }

  pub fn from_toml(source: &str) -> Result<Self> {
    let config: Self = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.window.width == 0 || self.window.height == 0 {
      return Err(EngineError::InvalidConfig(format!(
        "window size must be non-zero, got {}x{}",
        self.window.width, self.window.height
      )));
    }
    if self.render.max_frames_in_flight == 0 {
      return Err(EngineError::InvalidConfig(
        "max_frames_in_flight must be at least 1".to_owned(),
      ));
    }
    let samples = self.render.msaa_samples;
    if !samples.is_power_of_two() || samples > 64 {
      return Err(EngineError::InvalidConfig(format!(
        "msaa_samples must be a power of two between 1 and 64, got {samples}"
      )));
    }
    if self.render.particle_count == 0 {
      return Err(EngineError::InvalidConfig(
        "particle_count must be at least 1".to_owned(),
      ));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_yields_defaults() {
    let config = AppConfig::from_toml("").unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.window.width, 800);
    assert_eq!(config.window.height, 600);
    assert_eq!(config.render.max_frames_in_flight, 2);
  }

  #[test]
  fn partial_tables_keep_other_defaults() {
    let config = AppConfig::from_toml(
      r#"
        [window]
        title = "Viking Room"

        [render]
        msaa_samples = 8
        present_mode = "fifo"
      "#,
    )
    .unwrap();

    assert_eq!(config.window.title, "Viking Room");
    assert_eq!(config.window.width, 800);
    assert_eq!(config.render.msaa_samples, 8);
    assert_eq!(config.render.present_mode, PresentModePreference::Fifo);
    assert_eq!(config.render.particle_count, 8192);
    assert_eq!(config.assets, AssetConfig::default());
  }

  #[test]
  fn rejects_invalid_values() {
    assert!(matches!(
      AppConfig::from_toml("[window]\nwidth = 0"),
      Err(EngineError::InvalidConfig(_))
    ));
    assert!(matches!(
      AppConfig::from_toml("[render]\nmsaa_samples = 3"),
      Err(EngineError::InvalidConfig(_))
    ));
    assert!(matches!(
      AppConfig::from_toml("[render]\nmax_frames_in_flight = 0"),
      Err(EngineError::InvalidConfig(_))
    ));
    assert!(matches!(
      AppConfig::from_toml("[render]\nparticle_count = 0"),
      Err(EngineError::InvalidConfig(_))
    ));
  }

  #[test]
  fn malformed_toml_is_an_error() {
    assert!(matches!(
      AppConfig::from_toml("[window"),
      Err(EngineError::Toml(_))
    ));
  }

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let config = AppConfig::load("definitely/not/here/engine.toml").unwrap();
    assert_eq!(config, AppConfig::default());
  }

  #[test]
  fn present_mode_maps_onto_vulkano() {
    assert_eq!(PresentMode::from(PresentModePreference::Mailbox), PresentMode::Mailbox);
    assert_eq!(PresentMode::from(PresentModePreference::Fifo), PresentMode::Fifo);
  }
}
