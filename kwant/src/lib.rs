pub mod bootstrap;
pub mod concurrency;
pub mod core;
pub mod device;
pub mod driver;
pub mod error;
pub mod pipelines;
pub mod shader;
pub mod util;
pub mod wsi;

pub use error::{KwantError, Result};

// Re-exports
#[cfg(feature = "winit")]
pub use winit;
pub use {ash, ash_window, raw_window_handle};
