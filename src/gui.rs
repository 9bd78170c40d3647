//! Stats and controls overlay drawn with egui.

use std::time::{Duration, Instant};

use egui_winit_vulkano::Gui;
use vulkano::swapchain::PresentMode;

use crate::core::init::ModelStats;

/// Read-only facts about the running renderer.
#[derive(Clone, Debug, Default)]
pub struct RendererInfo {
  /// Name reported by the physical device
  pub device_name:    String,
  /// Known once the swapchain exists
  pub present_mode:   Option<PresentMode>,
  /// Samples per pixel after clamping to the device
  pub msaa_samples:   u32,
  pub particle_count: u32,
  pub model:          ModelStats,
}

/// Stores the overlay's performance metrics, renderer facts and toggles
pub struct GuiState {
  /// Current frames per second
  pub fps:                    f32,
  /// Frames per second averaged over the last second
  pub avg_fps:                f32,
  /// Frames since the average was last refreshed
  pub frame_count:            u32,
  /// Accumulated frame times for averaging
  pub frame_time_accumulator: f32,
  /// Timestamp of the last frame
  pub last_frame_time:        Instant,
  /// Timestamp of the last average refresh
  pub last_avg_update:        Instant,

  /// Device, swapchain and model details
  pub info: RendererInfo,

  /// Freezes the model's spin
  pub pause_rotation:     bool,
  /// Runs the compute pass each frame
  pub simulate_particles: bool,
  /// Draws the particle points
  pub show_particles:     bool,
}

impl GuiState {
  pub fn new(info: RendererInfo) -> Self {
    let now = Instant::now();
    Self {
      fps: 0.0,
      avg_fps: 0.0,
      frame_count: 0,
      frame_time_accumulator: 0.0,
      last_frame_time: now,
      last_avg_update: now,
      info,
      pause_rotation: false,
      simulate_particles: true,
      show_particles: true,
    }
  }

  /// Records a frame finished at `now` and returns its duration in seconds.
  ///
  /// The average is refreshed once a second.
  pub fn tick(&mut self, now: Instant) -> f32 {
    let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
    if frame_time > 0.0 {
      self.fps = 1.0 / frame_time;
    }
    self.frame_time_accumulator += frame_time;
    self.frame_count += 1;

    if now.duration_since(self.last_avg_update) >= Duration::from_secs(1)
      && self.frame_time_accumulator > 0.0
    {
      self.avg_fps = self.frame_count as f32 / self.frame_time_accumulator;
      self.frame_count = 0;
      self.frame_time_accumulator = 0.0;
      self.last_avg_update = now;
    }

    self.last_frame_time = now;
    frame_time
  }
}

/// Toggles flipped by the user this frame.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GuiStateChanges {
  /// New rotation pause state
  pub pause_rotation:     Option<bool>,
  /// New simulation state
  pub simulate_particles: Option<bool>,
  /// New particle visibility
  pub show_particles:     Option<bool>,
}

/// Draws the overlay window and collects the toggles the user flipped
///
/// # Arguments
/// * `gui` - The egui integration drawing on the overlay subpass
/// * `state` - Overlay state, ticked once per call
///
/// # Returns
/// A `GuiStateChanges` with `Some` for every toggle changed this frame
pub fn draw_gui(gui: &mut Gui, state: &mut GuiState) -> GuiStateChanges {
  let mut changes = GuiStateChanges::default();
  let frame_time = state.tick(Instant::now());

  gui.immediate_ui(|gui| {
    egui::Window::new("Stats & Controls")
      .default_pos([10.0, 10.0])
      .show(&gui.context(), |ui| {
        ui.heading("Performance");
        ui.label(format!("FPS: {:.1}", state.fps));
        ui.label(format!("Avg FPS: {:.1}", state.avg_fps));
        ui.label(format!("Frame Time: {:.2}ms", frame_time * 1000.0));

        ui.separator();

        let info = &state.info;
        ui.heading("Renderer");
        ui.label(format!("Device: {}", info.device_name));
        if let Some(present_mode) = info.present_mode {
          ui.label(format!("Present mode: {present_mode:?}"));
        }
        ui.label(format!("MSAA: {}x", info.msaa_samples));

        ui.separator();

        ui.heading("Model");
        ui.label(info.model.path.display().to_string());
        ui.label(format!(
          "{} meshes, {} materials",
          info.model.meshes, info.model.materials
        ));
        ui.label(format!(
          "{} vertices, {} triangles",
          info.model.vertices, info.model.triangles
        ));
        if ui
          .checkbox(&mut state.pause_rotation, "Pause rotation")
          .changed()
        {
          changes.pause_rotation = Some(state.pause_rotation);
        }

        ui.separator();

        ui.heading(format!("Particles ({})", info.particle_count));
        if ui
          .checkbox(&mut state.simulate_particles, "Simulate")
          .changed()
        {
          changes.simulate_particles = Some(state.simulate_particles);
        }
        if ui.checkbox(&mut state.show_particles, "Show").changed() {
          changes.show_particles = Some(state.show_particles);
        }
      });
  });

  changes
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fps_follows_the_last_frame() {
    let mut state = GuiState::new(RendererInfo::default());
    let start = state.last_frame_time;
    let frame_time = state.tick(start + Duration::from_millis(20));
    assert!((frame_time - 0.02).abs() < 1e-6);
    assert!((state.fps - 50.0).abs() < 1e-3);
    assert_eq!(state.avg_fps, 0.0);
  }

  #[test]
  fn average_refreshes_once_a_second() {
    let mut state = GuiState::new(RendererInfo::default());
    let start = state.last_frame_time;
    for i in 1..=40 {
      state.tick(start + Duration::from_millis(25 * i));
    }
    assert!((state.avg_fps - 40.0).abs() < 1e-2);
    assert_eq!(state.frame_count, 0);
  }

  #[test]
  fn particles_start_enabled() {
    let state = GuiState::new(RendererInfo::default());
    assert!(state.simulate_particles && state.show_particles);
    assert!(!state.pause_rotation);
  }
}
