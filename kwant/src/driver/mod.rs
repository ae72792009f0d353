//! The native graphics API as seen by the rest of the crate.
//!
//! Every call that can fail returns a [`crate::Result`], native failures come back as
//! [`KwantError::NativeCallFailed`](crate::KwantError::NativeCallFailed).
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::device::DeviceProperties;
use crate::pipelines::{PipelineInputAssemblyStateCreateInfo, VertexInputLayout};
use crate::shader::SpecializationInfo;

pub mod ash_driver;
pub mod debug_utils;

pub use ash_driver::AshDriver;

/// Everything needed to create a [`vk::Instance`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceDescriptor {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    pub api_version: u32,
    pub layers: Vec<String>,
    pub extensions: Vec<String>,
    /// Whether to route validation messages into `tracing`
    pub debug_messenger: bool,
}

/// Queues to create from a single family, one priority per queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueCreateDescriptor {
    pub family_index: u32,
    pub priorities: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct DeviceDescriptor {
    pub queues: Vec<QueueCreateDescriptor>,
    pub extensions: Vec<String>,
    pub features: vk::PhysicalDeviceFeatures,
    /// Chains the Vulkan 1.3 dynamic rendering feature
    pub dynamic_rendering: bool,
}

/// Surface data the swapchain is negotiated against
#[derive(Debug, Clone, Default)]
pub struct SurfaceDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

#[derive(Debug, Clone, Copy)]
pub struct SwapchainCreateDescriptor {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub image_format: vk::Format,
    pub image_color_space: vk::ColorSpaceKHR,
    pub image_extent: vk::Extent2D,
    pub image_usage: vk::ImageUsageFlags,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub clipped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ShaderModuleDescriptor {
    /// SPIR-V words
    pub code: Vec<u32>,
    pub flags: vk::ShaderModuleCreateFlags,
}

#[derive(Debug, Clone)]
pub struct ShaderStageDescriptor {
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
    pub entry_point: String,
    pub flags: vk::PipelineShaderStageCreateFlags,
    pub specialization: Option<SpecializationInfo>,
}

#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor {
    pub flags: vk::PipelineCreateFlags,
    pub stages: Vec<ShaderStageDescriptor>,
    pub vertex_input: VertexInputLayout,
    pub input_assembly: PipelineInputAssemblyStateCreateInfo,
    pub patch_control_points: Option<u32>,
    /// Formats used with dynamic rendering
    pub color_attachment_formats: Vec<vk::Format>,
}

/// Native graphics API collaborator
pub trait Driver: Send + Sync {
    fn available_instance_extensions(&self) -> crate::Result<Vec<String>>;

    fn available_layers(&self) -> crate::Result<Vec<String>>;

    fn create_instance(&self, descriptor: &InstanceDescriptor) -> crate::Result<vk::Instance>;

    fn destroy_instance(&self, instance: vk::Instance) -> crate::Result<()>;

    /// Physical devices in driver order
    fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
    ) -> crate::Result<Vec<vk::PhysicalDevice>>;

    fn device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<DeviceProperties>;

    fn device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<vk::PhysicalDeviceFeatures>;

    /// Queue families in index order
    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<Vec<vk::QueueFamilyProperties>>;

    fn device_extensions(&self, physical_device: vk::PhysicalDevice)
        -> crate::Result<Vec<String>>;

    fn create_surface(
        &self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> crate::Result<vk::SurfaceKHR>;

    fn destroy_surface(&self, instance: vk::Instance, surface: vk::SurfaceKHR)
        -> crate::Result<()>;

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> crate::Result<bool>;

    fn surface_details(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> crate::Result<SurfaceDetails>;

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        descriptor: &DeviceDescriptor,
    ) -> crate::Result<vk::Device>;

    fn destroy_device(&self, device: vk::Device) -> crate::Result<()>;

    fn device_queue(
        &self,
        device: vk::Device,
        family_index: u32,
        index: u32,
    ) -> crate::Result<vk::Queue>;

    fn create_swapchain(
        &self,
        device: vk::Device,
        descriptor: &SwapchainCreateDescriptor,
    ) -> crate::Result<vk::SwapchainKHR>;

    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> crate::Result<Vec<vk::Image>>;

    fn destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR)
        -> crate::Result<()>;

    /// Creates a 2D color view covering the whole image
    fn create_image_view(
        &self,
        device: vk::Device,
        image: vk::Image,
        format: vk::Format,
    ) -> crate::Result<vk::ImageView>;

    fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView) -> crate::Result<()>;

    fn create_shader_module(
        &self,
        device: vk::Device,
        descriptor: &ShaderModuleDescriptor,
    ) -> crate::Result<vk::ShaderModule>;

    fn destroy_shader_module(&self, device: vk::Device, module: vk::ShaderModule)
        -> crate::Result<()>;

    fn create_graphics_pipeline(
        &self,
        device: vk::Device,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> crate::Result<vk::Pipeline>;

    fn destroy_pipeline(&self, device: vk::Device, pipeline: vk::Pipeline) -> crate::Result<()>;
}
