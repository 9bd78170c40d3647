//! Everything between a logical device and a presented frame.

pub mod commands;
pub mod compute;
pub mod frame;
pub mod model;
pub mod pipeline;
pub mod swapchain;
pub mod texture;
pub mod uniform;
pub mod vertex;
