use ash::vk;
use derivative::Derivative;

use crate::bootstrap::SwapchainPlan;
use crate::device::{LogicalDevice, Queue};
use crate::driver::SwapchainCreateDescriptor;
use crate::error::TeardownFailure;
use crate::util::DeletionStack;

/// A created swapchain with its images and one view per image.
///
/// `images[i]` and `image_views[i]` always refer to the same image.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct SwapchainDescriptor {
    handle: vk::SwapchainKHR,
    extent: vk::Extent2D,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    #[derivative(Debug = "ignore")]
    images: Vec<vk::Image>,
    #[derivative(Debug = "ignore")]
    image_views: Vec<vk::ImageView>,
    present_queue: Queue,
}

impl SwapchainDescriptor {
    /// Creates the swapchain, fetches its images and makes a view for each.
    ///
    /// Anything created before a failure is destroyed again before returning.
    pub fn new(
        device: &LogicalDevice,
        surface: vk::SurfaceKHR,
        plan: &SwapchainPlan,
        present_queue: Queue,
    ) -> crate::Result<Self> {
        let handle = device.driver().create_swapchain(
            device.handle(),
            &SwapchainCreateDescriptor {
                surface,
                min_image_count: plan.image_count,
                image_format: plan.surface_format.format,
                image_color_space: plan.surface_format.color_space,
                image_extent: plan.extent,
                image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
                pre_transform: plan.pre_transform,
                composite_alpha: plan.composite_alpha,
                present_mode: plan.present_mode,
                clipped: true,
            },
        )?;
        #[cfg(feature = "log-lifetimes")]
        tracing::trace!("Creating VkSwapchainKHR {:?}", handle);

        let mut swapchain = Self {
            handle,
            extent: plan.extent,
            surface_format: plan.surface_format,
            present_mode: plan.present_mode,
            images: Vec::new(),
            image_views: Vec::new(),
            present_queue,
        };
        if let Err(error) = swapchain.create_views(device) {
            for failure in swapchain.destroy(device) {
                tracing::error!("{failure}");
            }
            return Err(error);
        }
        Ok(swapchain)
    }

    fn create_views(&mut self, device: &LogicalDevice) -> crate::Result<()> {
        let driver = device.driver();
        self.images = driver.swapchain_images(device.handle(), self.handle)?;
        for image in self.images.iter() {
            let view =
                driver.create_image_view(device.handle(), *image, self.surface_format.format)?;
            self.image_views.push(view);
        }
        Ok(())
    }

    /// Destroys the image views, then the swapchain
    pub fn destroy(&self, device: &LogicalDevice) -> Vec<TeardownFailure> {
        let mut deletion_stack = DeletionStack::new();
        let handle = self.handle;
        let driver = device.driver().clone();
        let device_handle = device.handle();
        deletion_stack.push("VkSwapchainKHR", move || {
            driver.destroy_swapchain(device_handle, handle)
        });
        for view in self.image_views.iter().copied() {
            let driver = device.driver().clone();
            deletion_stack.push("VkImageView", move || {
                driver.destroy_image_view(device_handle, view)
            });
        }
        deletion_stack.flush()
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Queue presentation is submitted on
    pub fn present_queue(&self) -> &Queue {
        &self.present_queue
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bootstrap::swapchain::PREFERRED_FORMAT;
    use crate::device::{QueueInfo, QueueRole};
    use crate::util::tests::{mock_logical_device, MockDriver};
    use ash::vk::Handle;
    use std::sync::Arc;

    fn plan(image_count: u32) -> SwapchainPlan {
        SwapchainPlan {
            image_count,
            extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            surface_format: PREFERRED_FORMAT,
            present_mode: vk::PresentModeKHR::FIFO,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
        }
    }

    fn queue() -> Queue {
        Queue::new(
            vk::Queue::from_raw(7),
            QueueInfo {
                family_index: 0,
                index: 0,
                role: QueueRole::Graphics,
                priority: 1.0,
            },
        )
    }

    #[test]
    fn one_view_per_image() {
        let driver = Arc::new(MockDriver::default());
        let device = mock_logical_device(driver.clone());
        let swapchain =
            SwapchainDescriptor::new(&device, vk::SurfaceKHR::from_raw(3), &plan(3), queue())
                .unwrap();
        assert_eq!(swapchain.image_count(), 3);
        assert_eq!(swapchain.images().len(), swapchain.image_views().len());
        assert_eq!(driver.count_calls("vkCreateImageView"), 3);
        let created = driver.last_swapchain_descriptor().unwrap();
        assert_eq!(created.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);
        assert!(created.clipped);

        assert!(swapchain.destroy(&device).is_empty());
        let calls = driver.calls();
        let tail: Vec<&str> = calls.iter().rev().take(4).rev().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "vkDestroyImageView",
                "vkDestroyImageView",
                "vkDestroyImageView",
                "vkDestroySwapchainKHR",
            ]
        );
    }

    #[test]
    fn failed_view_cleans_up() {
        let driver = Arc::new(MockDriver::default());
        driver.fail_on("vkCreateImageView", vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        let device = mock_logical_device(driver.clone());
        let err = SwapchainDescriptor::new(&device, vk::SurfaceKHR::from_raw(3), &plan(2), queue())
            .unwrap_err();
        assert_eq!(
            err,
            crate::KwantError::native("vkCreateImageView", vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        );
        assert_eq!(driver.count_calls("vkDestroySwapchainKHR"), 1);
    }
}
