use ash::vk;
use glam::UVec2;

use crate::bootstrap::GraphicsSettings;
use crate::driver::SurfaceDetails;
use crate::KwantError;

pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// What the swapchain will be created with
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPlan {
    pub image_count: u32,
    pub extent: vk::Extent2D,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Fits the presentation preferences into what a surface supports
#[derive(Debug, Clone, Copy)]
pub struct SwapchainNegotiator {
    buffering: u32,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl SwapchainNegotiator {
    pub fn new(buffering: u32, present_mode: vk::PresentModeKHR, extent: UVec2) -> Self {
        Self {
            buffering,
            present_mode,
            extent: vk::Extent2D {
                width: extent.x,
                height: extent.y,
            },
        }
    }

    /// Uses the configured resolution, or `framebuffer` when there is none
    pub fn from_settings(settings: &GraphicsSettings, framebuffer: UVec2) -> Self {
        Self::new(
            settings.buffering,
            settings.present_mode,
            settings.resolution.unwrap_or(framebuffer),
        )
    }

    /// Clamps `desired` into `[min_image_extent, max_image_extent]` per axis
    pub fn clamp_extent(
        capabilities: &vk::SurfaceCapabilitiesKHR,
        desired: vk::Extent2D,
    ) -> vk::Extent2D {
        let min = capabilities.min_image_extent;
        let max = capabilities.max_image_extent;
        vk::Extent2D {
            width: desired.width.max(min.width).min(max.width),
            height: desired.height.max(min.height).min(max.height),
        }
    }

    /// A `max_image_count` of 0 means unbounded, in which case at least one image more than
    /// the minimum is used
    pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR, desired: u32) -> u32 {
        if capabilities.max_image_count == 0 {
            desired.max(capabilities.min_image_count + 1)
        } else {
            desired
                .max(capabilities.min_image_count)
                .min(capabilities.max_image_count)
        }
    }

    /// [`PREFERRED_FORMAT`] if offered, otherwise whatever the surface lists first
    pub fn pick_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
        formats
            .iter()
            .find(|format| {
                format.format == PREFERRED_FORMAT.format
                    && format.color_space == PREFERRED_FORMAT.color_space
            })
            .or_else(|| formats.first())
            .copied()
    }

    /// FIFO is always supported
    pub fn pick_present_mode(&self, present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
        if present_modes.contains(&self.present_mode) {
            self.present_mode
        } else {
            tracing::warn!(
                "Present mode {:?} is not supported, falling back to FIFO",
                self.present_mode
            );
            vk::PresentModeKHR::FIFO
        }
    }

    fn pick_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
        [
            vk::CompositeAlphaFlagsKHR::OPAQUE,
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
            vk::CompositeAlphaFlagsKHR::INHERIT,
        ]
        .into_iter()
        .find(|alpha| supported.contains(*alpha))
        .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
    }

    pub fn negotiate(&self, surface: &SurfaceDetails) -> crate::Result<SwapchainPlan> {
        let capabilities = &surface.capabilities;
        let surface_format =
            Self::pick_format(&surface.formats).ok_or(KwantError::NoSurfaceFormat)?;
        Ok(SwapchainPlan {
            image_count: Self::image_count(capabilities, self.buffering),
            extent: Self::clamp_extent(capabilities, self.extent),
            surface_format,
            present_mode: self.pick_present_mode(&surface.present_modes),
            composite_alpha: Self::pick_composite_alpha(capabilities.supported_composite_alpha),
            pre_transform: capabilities.current_transform,
        })
    }
}
