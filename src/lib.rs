pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod gui;
pub mod loader;
pub mod logging;
pub mod render;
pub mod shaders;

// Re-export commonly used items
pub use app::App;
pub use config::AppConfig;
pub use error::{EngineError, Result};
pub use loader::{Model, load_model};
