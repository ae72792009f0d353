//! Test doubles for driving the crate without a GPU or a display
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ash::vk;
use ash::vk::Handle;
use glam::UVec2;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, WebDisplayHandle, WebWindowHandle};

use crate::bootstrap::swapchain::{PREFERRED_FORMAT, SWAPCHAIN_EXTENSION};
use crate::bootstrap::{
    DedicatedFirstPlanner, QueueFamilyPlanner, SelectedDevice, WindowSettings,
};
use crate::device::{DeviceCandidate, DeviceProperties, LogicalDevice};
use crate::driver::{
    DeviceDescriptor, Driver, GraphicsPipelineDescriptor, InstanceDescriptor,
    ShaderModuleDescriptor, SurfaceDetails, SwapchainCreateDescriptor,
};
use crate::wsi::WindowSystem;
use crate::KwantError;

/// Smallest byte stream `ash::util::read_spv` accepts: a SPIR-V header and nothing else
pub const SPIRV_STUB: &[u8] = &[
    0x03, 0x02, 0x23, 0x07, // magic
    0x00, 0x00, 0x01, 0x00, // version 1.0
    0x00, 0x00, 0x00, 0x00, // generator
    0x01, 0x00, 0x00, 0x00, // bound
    0x00, 0x00, 0x00, 0x00, // schema
];

/// Shared, ordered log of every call made against the mocks
pub type CallLog = Arc<Mutex<Vec<String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hardware description handed out by [`MockDriver`]
#[derive(Debug, Clone)]
pub struct MockPhysicalDevice {
    pub properties: DeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub families: Vec<vk::QueueFamilyProperties>,
    pub extensions: Vec<String>,
    /// Families reporting surface support
    pub present_families: Vec<u32>,
    pub surface: SurfaceDetails,
}

impl MockPhysicalDevice {
    fn new(name: &str, device_type: vk::PhysicalDeviceType) -> Self {
        Self {
            properties: DeviceProperties {
                name: name.to_string(),
                device_type,
                api_version: vk::API_VERSION_1_3,
                max_image_dimension_2d: 16384,
            },
            features: vk::PhysicalDeviceFeatures {
                geometry_shader: vk::TRUE,
                ..Default::default()
            },
            families: Vec::new(),
            extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            present_families: vec![0],
            surface: SurfaceDetails {
                capabilities: vk::SurfaceCapabilitiesKHR {
                    min_image_count: 2,
                    max_image_count: 0,
                    current_extent: vk::Extent2D {
                        width: 800,
                        height: 600,
                    },
                    min_image_extent: vk::Extent2D {
                        width: 1,
                        height: 1,
                    },
                    max_image_extent: vk::Extent2D {
                        width: 4096,
                        height: 4096,
                    },
                    max_image_array_layers: 1,
                    supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                    current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                    supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                    supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
                },
                formats: vec![PREFERRED_FORMAT],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            },
        }
        .with_families(vec![(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            4,
        )])
    }

    pub fn discrete(name: &str) -> Self {
        Self::new(name, vk::PhysicalDeviceType::DISCRETE_GPU)
    }

    pub fn integrated(name: &str) -> Self {
        Self::new(name, vk::PhysicalDeviceType::INTEGRATED_GPU)
    }

    pub fn with_families(mut self, families: Vec<(vk::QueueFlags, u32)>) -> Self {
        self.families = families
            .into_iter()
            .map(|(queue_flags, queue_count)| vk::QueueFamilyProperties {
                queue_flags,
                queue_count,
                ..Default::default()
            })
            .collect();
        self
    }

    pub fn with_present_families(mut self, families: Vec<u32>) -> Self {
        self.present_families = families;
        self
    }

    /// Replaces the device extension list
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_surface(mut self, surface: SurfaceDetails) -> Self {
        self.surface = surface;
        self
    }
}

#[derive(Debug)]
struct MockDevice {
    descriptor: DeviceDescriptor,
}

#[derive(Debug, Default)]
struct MockState {
    instances: HashSet<vk::Instance>,
    surfaces: HashSet<vk::SurfaceKHR>,
    devices: HashMap<vk::Device, MockDevice>,
    queues: HashMap<(vk::Device, u32, u32), vk::Queue>,
    queue_origins: HashMap<vk::Queue, (u32, u32)>,
    swapchain_images: HashMap<vk::SwapchainKHR, Vec<vk::Image>>,
    last_instance: Option<InstanceDescriptor>,
    last_device: Option<DeviceDescriptor>,
    last_swapchain: Option<SwapchainCreateDescriptor>,
    last_pipeline: Option<GraphicsPipelineDescriptor>,
}

/// [`Driver`] over programmable fake hardware.
///
/// Handles are minted from a counter so they are unique and never null. Every call is
/// appended to the call log under its Vulkan entry point name, and any entry point can be
/// made to fail with [`fail_on`](MockDriver::fail_on).
#[derive(Debug)]
pub struct MockDriver {
    physical_devices: Vec<MockPhysicalDevice>,
    instance_extensions: Vec<String>,
    layers: Vec<String>,
    calls: CallLog,
    failures: Mutex<HashMap<String, vk::Result>>,
    state: Mutex<MockState>,
    next_handle: AtomicU64,
}

impl Default for MockDriver {
    /// A single discrete GPU with one do-everything family
    fn default() -> Self {
        Self::new(vec![MockPhysicalDevice::discrete("Mock GPU")])
    }
}

impl MockDriver {
    pub fn new(physical_devices: Vec<MockPhysicalDevice>) -> Self {
        Self {
            physical_devices,
            instance_extensions: vec![
                "VK_KHR_surface".to_string(),
                crate::bootstrap::instance::DEBUG_UTILS_EXTENSION.to_string(),
            ],
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: Mutex::new(HashMap::new()),
            state: Mutex::new(MockState::default()),
            next_handle: AtomicU64::new(0x1000),
        }
    }

    pub fn with_instance_extensions(mut self, extensions: &[&str]) -> Self {
        self.instance_extensions = extensions.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_layers(mut self, layers: &[&str]) -> Self {
        self.layers = layers.iter().map(|name| name.to_string()).collect();
        self
    }

    /// Makes every later call to `operation` fail with `code`
    pub fn fail_on(&self, operation: &str, code: vk::Result) {
        lock(&self.failures).insert(operation.to_string(), code);
    }

    pub fn call_log(&self) -> CallLog {
        self.calls.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn count_calls(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    /// (family, index) a queue handle was fetched from
    pub fn queue_origin(&self, queue: vk::Queue) -> Option<(u32, u32)> {
        lock(&self.state).queue_origins.get(&queue).copied()
    }

    pub fn live_devices(&self) -> usize {
        lock(&self.state).devices.len()
    }

    pub fn last_instance_descriptor(&self) -> Option<InstanceDescriptor> {
        lock(&self.state).last_instance.clone()
    }

    pub fn last_device_descriptor(&self) -> Option<DeviceDescriptor> {
        lock(&self.state).last_device.clone()
    }

    pub fn last_swapchain_descriptor(&self) -> Option<SwapchainCreateDescriptor> {
        lock(&self.state).last_swapchain
    }

    pub fn last_pipeline_descriptor(&self) -> Option<GraphicsPipelineDescriptor> {
        lock(&self.state).last_pipeline.clone()
    }

    fn record(&self, operation: &str) -> crate::Result<()> {
        lock(&self.calls).push(operation.to_string());
        match lock(&self.failures).get(operation) {
            Some(code) => Err(KwantError::native(operation, *code)),
            None => Ok(()),
        }
    }

    fn mint<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn physical(&self, handle: vk::PhysicalDevice) -> crate::Result<&MockPhysicalDevice> {
        (handle.as_raw() as usize)
            .checked_sub(1)
            .and_then(|index| self.physical_devices.get(index))
            .ok_or(KwantError::InvalidHandle("VkPhysicalDevice"))
    }

    fn check_instance(&self, instance: vk::Instance) -> crate::Result<()> {
        if lock(&self.state).instances.contains(&instance) {
            Ok(())
        } else {
            Err(KwantError::InvalidHandle("VkInstance"))
        }
    }

    fn check_device(&self, device: vk::Device) -> crate::Result<()> {
        if lock(&self.state).devices.contains_key(&device) {
            Ok(())
        } else {
            Err(KwantError::InvalidHandle("VkDevice"))
        }
    }
}

impl Driver for MockDriver {
    fn available_instance_extensions(&self) -> crate::Result<Vec<String>> {
        self.record("vkEnumerateInstanceExtensionProperties")?;
        Ok(self.instance_extensions.clone())
    }

    fn available_layers(&self) -> crate::Result<Vec<String>> {
        self.record("vkEnumerateInstanceLayerProperties")?;
        Ok(self.layers.clone())
    }

    fn create_instance(&self, descriptor: &InstanceDescriptor) -> crate::Result<vk::Instance> {
        self.record("vkCreateInstance")?;
        let instance = self.mint();
        let mut state = lock(&self.state);
        state.instances.insert(instance);
        state.last_instance = Some(descriptor.clone());
        Ok(instance)
    }

    fn destroy_instance(&self, instance: vk::Instance) -> crate::Result<()> {
        self.record("vkDestroyInstance")?;
        if lock(&self.state).instances.remove(&instance) {
            Ok(())
        } else {
            Err(KwantError::InvalidHandle("VkInstance"))
        }
    }

    fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
    ) -> crate::Result<Vec<vk::PhysicalDevice>> {
        self.record("vkEnumeratePhysicalDevices")?;
        self.check_instance(instance)?;
        Ok((1..=self.physical_devices.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    fn device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<DeviceProperties> {
        self.record("vkGetPhysicalDeviceProperties")?;
        Ok(self.physical(physical_device)?.properties.clone())
    }

    fn device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<vk::PhysicalDeviceFeatures> {
        self.record("vkGetPhysicalDeviceFeatures")?;
        Ok(self.physical(physical_device)?.features)
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<Vec<vk::QueueFamilyProperties>> {
        self.record("vkGetPhysicalDeviceQueueFamilyProperties")?;
        Ok(self.physical(physical_device)?.families.clone())
    }

    fn device_extensions(&self, physical_device: vk::PhysicalDevice) -> crate::Result<Vec<String>> {
        self.record("vkEnumerateDeviceExtensionProperties")?;
        Ok(self.physical(physical_device)?.extensions.clone())
    }

    fn create_surface(
        &self,
        instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> crate::Result<vk::SurfaceKHR> {
        self.record("vkCreateSurfaceKHR")?;
        self.check_instance(instance)?;
        let surface = self.mint();
        lock(&self.state).surfaces.insert(surface);
        Ok(surface)
    }

    fn destroy_surface(
        &self,
        instance: vk::Instance,
        surface: vk::SurfaceKHR,
    ) -> crate::Result<()> {
        self.record("vkDestroySurfaceKHR")?;
        self.check_instance(instance)?;
        if lock(&self.state).surfaces.remove(&surface) {
            Ok(())
        } else {
            Err(KwantError::InvalidHandle("VkSurfaceKHR"))
        }
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> crate::Result<bool> {
        self.record("vkGetPhysicalDeviceSurfaceSupportKHR")?;
        Ok(self
            .physical(physical_device)?
            .present_families
            .contains(&family_index))
    }

    fn surface_details(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> crate::Result<SurfaceDetails> {
        self.record("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        Ok(self.physical(physical_device)?.surface.clone())
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        descriptor: &DeviceDescriptor,
    ) -> crate::Result<vk::Device> {
        self.record("vkCreateDevice")?;
        let physical = self.physical(physical_device)?;
        if descriptor
            .extensions
            .iter()
            .any(|name| !physical.extensions.contains(name))
        {
            return Err(KwantError::native(
                "vkCreateDevice",
                vk::Result::ERROR_EXTENSION_NOT_PRESENT,
            ));
        }
        let fits = descriptor.queues.iter().all(|queue| {
            physical
                .families
                .get(queue.family_index as usize)
                .is_some_and(|family| queue.priorities.len() as u32 <= family.queue_count)
        });
        if !fits {
            return Err(KwantError::native(
                "vkCreateDevice",
                vk::Result::ERROR_INITIALIZATION_FAILED,
            ));
        }
        let device = self.mint();
        let mut state = lock(&self.state);
        state.devices.insert(
            device,
            MockDevice {
                descriptor: descriptor.clone(),
            },
        );
        state.last_device = Some(descriptor.clone());
        Ok(device)
    }

    fn destroy_device(&self, device: vk::Device) -> crate::Result<()> {
        self.record("vkDestroyDevice")?;
        match lock(&self.state).devices.remove(&device) {
            Some(_) => Ok(()),
            None => Err(KwantError::InvalidHandle("VkDevice")),
        }
    }

    fn device_queue(
        &self,
        device: vk::Device,
        family_index: u32,
        index: u32,
    ) -> crate::Result<vk::Queue> {
        self.record("vkGetDeviceQueue")?;
        let mut state = lock(&self.state);
        let created = state
            .devices
            .get(&device)
            .ok_or(KwantError::InvalidHandle("VkDevice"))?
            .descriptor
            .queues
            .iter()
            .any(|queue| {
                queue.family_index == family_index && (index as usize) < queue.priorities.len()
            });
        if !created {
            return Err(KwantError::InvalidHandle("VkQueue"));
        }
        if let Some(queue) = state.queues.get(&(device, family_index, index)) {
            return Ok(*queue);
        }
        let queue = self.mint();
        state.queues.insert((device, family_index, index), queue);
        state.queue_origins.insert(queue, (family_index, index));
        Ok(queue)
    }

    fn create_swapchain(
        &self,
        device: vk::Device,
        descriptor: &SwapchainCreateDescriptor,
    ) -> crate::Result<vk::SwapchainKHR> {
        self.record("vkCreateSwapchainKHR")?;
        self.check_device(device)?;
        let swapchain = self.mint();
        let images = (0..descriptor.min_image_count).map(|_| self.mint()).collect();
        let mut state = lock(&self.state);
        state.swapchain_images.insert(swapchain, images);
        state.last_swapchain = Some(*descriptor);
        Ok(swapchain)
    }

    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> crate::Result<Vec<vk::Image>> {
        self.record("vkGetSwapchainImagesKHR")?;
        self.check_device(device)?;
        lock(&self.state)
            .swapchain_images
            .get(&swapchain)
            .cloned()
            .ok_or(KwantError::InvalidHandle("VkSwapchainKHR"))
    }

    fn destroy_swapchain(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> crate::Result<()> {
        self.record("vkDestroySwapchainKHR")?;
        self.check_device(device)?;
        match lock(&self.state).swapchain_images.remove(&swapchain) {
            Some(_) => Ok(()),
            None => Err(KwantError::InvalidHandle("VkSwapchainKHR")),
        }
    }

    fn create_image_view(
        &self,
        device: vk::Device,
        _image: vk::Image,
        _format: vk::Format,
    ) -> crate::Result<vk::ImageView> {
        self.record("vkCreateImageView")?;
        self.check_device(device)?;
        Ok(self.mint())
    }

    fn destroy_image_view(&self, device: vk::Device, _view: vk::ImageView) -> crate::Result<()> {
        self.record("vkDestroyImageView")?;
        self.check_device(device)
    }

    fn create_shader_module(
        &self,
        device: vk::Device,
        _descriptor: &ShaderModuleDescriptor,
    ) -> crate::Result<vk::ShaderModule> {
        self.record("vkCreateShaderModule")?;
        self.check_device(device)?;
        Ok(self.mint())
    }

    fn destroy_shader_module(
        &self,
        device: vk::Device,
        _module: vk::ShaderModule,
    ) -> crate::Result<()> {
        self.record("vkDestroyShaderModule")?;
        self.check_device(device)
    }

    fn create_graphics_pipeline(
        &self,
        device: vk::Device,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> crate::Result<vk::Pipeline> {
        self.record("vkCreateGraphicsPipelines")?;
        self.check_device(device)?;
        lock(&self.state).last_pipeline = Some(descriptor.clone());
        Ok(self.mint())
    }

    fn destroy_pipeline(&self, device: vk::Device, _pipeline: vk::Pipeline) -> crate::Result<()> {
        self.record("vkDestroyPipeline")?;
        self.check_device(device)
    }
}

pub fn mock_display_handle() -> RawDisplayHandle {
    RawDisplayHandle::Web(WebDisplayHandle::new())
}

pub fn mock_window_handle() -> RawWindowHandle {
    RawWindowHandle::Web(WebWindowHandle::new(1))
}

/// Creates an instance and a device on the driver's first physical device, no queues
pub fn mock_logical_device(driver: Arc<MockDriver>) -> LogicalDevice {
    let instance = driver
        .create_instance(&InstanceDescriptor::default())
        .expect("mock instance");
    let physical_device = driver.enumerate_physical_devices(instance).expect("enumerate")[0];
    let candidate = DeviceCandidate::query(driver.as_ref(), physical_device).expect("query");
    let plan = DedicatedFirstPlanner.plan(&candidate.queue_families);
    let handle = driver
        .create_device(physical_device, &DeviceDescriptor::default())
        .expect("mock device");
    LogicalDevice::new(handle, SelectedDevice::new(candidate, plan, 0), driver)
}

/// [`WindowSystem`] which never opens anything and asks to close after a set number of polls
#[derive(Debug)]
pub struct MockWindowSystem {
    calls: CallLog,
    size: UVec2,
    close_after: usize,
    polls: usize,
    window: Option<WindowSettings>,
}

impl MockWindowSystem {
    /// Logs into `calls`, usually [`MockDriver::call_log`], so teardown order can be checked
    /// across both
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            size: UVec2::new(800, 600),
            close_after: 1,
            polls: 0,
            window: None,
        }
    }

    pub fn with_size(mut self, size: UVec2) -> Self {
        self.size = size;
        self
    }

    pub fn close_after(mut self, polls: usize) -> Self {
        self.close_after = polls;
        self
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    pub fn window(&self) -> Option<&WindowSettings> {
        self.window.as_ref()
    }

    fn record(&self, call: &str) {
        lock(&self.calls).push(call.to_string());
    }
}

impl WindowSystem for MockWindowSystem {
    fn required_instance_extensions(&self) -> crate::Result<Vec<String>> {
        Ok(vec!["VK_KHR_surface".to_string()])
    }

    fn create_window(&mut self, settings: &WindowSettings) -> crate::Result<()> {
        self.record("createWindow");
        self.window = Some(settings.clone());
        Ok(())
    }

    fn raw_handles(&self) -> crate::Result<(RawDisplayHandle, RawWindowHandle)> {
        match self.window {
            Some(_) => Ok((mock_display_handle(), mock_window_handle())),
            None => Err(KwantError::Window("no window has been created".to_string())),
        }
    }

    fn framebuffer_size(&self) -> UVec2 {
        self.size
    }

    fn poll_events(&mut self) -> crate::Result<()> {
        self.record("pollEvents");
        self.polls += 1;
        Ok(())
    }

    fn should_close(&self) -> bool {
        self.polls >= self.close_after
    }

    fn destroy_window(&mut self) {
        self.record("destroyWindow");
        self.window = None;
    }
}
