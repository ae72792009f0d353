/// Window system seam and swapchain construction
pub mod swapchain;
pub mod traits;
#[cfg(feature = "winit")]
pub mod winit_window;

pub use swapchain::SwapchainDescriptor;
pub use traits::*;
#[cfg(feature = "winit")]
pub use winit_window::WinitWindowSystem;
