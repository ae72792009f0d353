use ash::vk;
use glam::UVec2;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::bootstrap::WindowSettings;
use crate::driver::Driver;

/// Describes a window system we can present through
pub trait WindowSystem {
    /// Instance extensions needed to create a surface for this window system
    fn required_instance_extensions(&self) -> crate::Result<Vec<String>>;

    fn create_window(&mut self, settings: &WindowSettings) -> crate::Result<()>;

    /// Handles of the window made by [`create_window`](WindowSystem::create_window)
    fn raw_handles(&self) -> crate::Result<(RawDisplayHandle, RawWindowHandle)>;

    fn create_surface(
        &self,
        driver: &dyn Driver,
        instance: vk::Instance,
    ) -> crate::Result<vk::SurfaceKHR> {
        let (display, window) = self.raw_handles()?;
        driver.create_surface(instance, display, window)
    }

    /// Size of the drawable area in pixels
    fn framebuffer_size(&self) -> UVec2;

    fn poll_events(&mut self) -> crate::Result<()>;

    fn should_close(&self) -> bool;

    fn destroy_window(&mut self);
}
