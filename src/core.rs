//! Instance, validation and device setup.

pub mod debug;
pub mod device;
pub mod init;
