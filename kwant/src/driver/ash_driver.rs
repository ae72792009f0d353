use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::sync::{Mutex, RwLock};

use ash::vk;
use derivative::Derivative;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
#[allow(unused_imports)]
use tracing::trace;

use super::debug_utils::DebugMessenger;
use super::{
    DeviceDescriptor, Driver, GraphicsPipelineDescriptor, InstanceDescriptor,
    ShaderModuleDescriptor, SurfaceDetails, SwapchainCreateDescriptor,
};
use crate::device::DeviceProperties;
use crate::error::{KwantError, VkResultExt};
use crate::util::{to_c_strings, wrap_c_str};

#[derive(Derivative)]
#[derivative(Debug)]
struct InstanceState {
    #[derivative(Debug = "ignore")]
    instance: ash::Instance,
    #[derivative(Debug = "ignore")]
    surface: ash::khr::surface::Instance,
    debug_messenger: Option<DebugMessenger>,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct DeviceState {
    #[derivative(Debug = "ignore")]
    device: ash::Device,
    #[derivative(Debug = "ignore")]
    swapchain: ash::khr::swapchain::Device,
    /// Every pipeline gets an empty layout which lives exactly as long as it does
    layouts: Mutex<HashMap<vk::Pipeline, vk::PipelineLayout>>,
}

/// [`Driver`] backed by the system Vulkan loader through `ash`.
///
/// Holds at most one live instance at a time, logical devices are tracked by handle so the
/// function tables can be looked up again.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AshDriver {
    #[derivative(Debug = "ignore")]
    entry: ash::Entry,
    instance: RwLock<Option<InstanceState>>,
    devices: RwLock<HashMap<vk::Device, DeviceState>>,
}

fn name_pointers(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

impl AshDriver {
    /// Loads the Vulkan loader
    pub fn new() -> crate::Result<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|error| {
            tracing::error!("Failed to load Vulkan: {error}");
            KwantError::native("vkGetInstanceProcAddr", vk::Result::ERROR_INITIALIZATION_FAILED)
        })?;
        Ok(Self {
            entry,
            instance: RwLock::new(None),
            devices: RwLock::new(HashMap::new()),
        })
    }

    fn with_instance<R>(
        &self,
        func: impl FnOnce(&InstanceState) -> crate::Result<R>,
    ) -> crate::Result<R> {
        let guard = self.instance.read()?;
        match guard.as_ref() {
            Some(state) => func(state),
            None => Err(KwantError::InvalidHandle("VkInstance")),
        }
    }

    fn with_device<R>(
        &self,
        device: vk::Device,
        func: impl FnOnce(&DeviceState) -> crate::Result<R>,
    ) -> crate::Result<R> {
        let guard = self.devices.read()?;
        match guard.get(&device) {
            Some(state) => func(state),
            None => Err(KwantError::InvalidHandle("VkDevice")),
        }
    }
}

impl Driver for AshDriver {
    fn available_instance_extensions(&self) -> crate::Result<Vec<String>> {
        let extensions = unsafe { self.entry.enumerate_instance_extension_properties(None) }
            .native("vkEnumerateInstanceExtensionProperties")?;
        Ok(extensions
            .iter()
            .map(|ext| wrap_c_str(ext.extension_name.as_ptr()))
            .collect())
    }

    fn available_layers(&self) -> crate::Result<Vec<String>> {
        let layers = unsafe { self.entry.enumerate_instance_layer_properties() }
            .native("vkEnumerateInstanceLayerProperties")?;
        Ok(layers
            .iter()
            .map(|layer| wrap_c_str(layer.layer_name.as_ptr()))
            .collect())
    }

    fn create_instance(&self, descriptor: &InstanceDescriptor) -> crate::Result<vk::Instance> {
        let mut slot = self.instance.write()?;
        if slot.is_some() {
            return Err(KwantError::DoubleAssignment);
        }

        let application_name = CString::new(descriptor.application_name.as_str())?;
        let engine_name = CString::new(descriptor.engine_name.as_str())?;
        let app_info = vk::ApplicationInfo::default()
            .application_name(&application_name)
            .application_version(descriptor.application_version)
            .engine_name(&engine_name)
            .engine_version(descriptor.engine_version)
            .api_version(descriptor.api_version);
        let layers = to_c_strings(&descriptor.layers)?;
        let layer_ptrs = name_pointers(&layers);
        let extensions = to_c_strings(&descriptor.extensions)?;
        let extension_ptrs = name_pointers(&extensions);
        let instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);

        let instance = unsafe { self.entry.create_instance(&instance_ci, None) }
            .native("vkCreateInstance")?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkInstance {:?}", instance.handle());

        let debug_messenger = if descriptor.debug_messenger {
            match DebugMessenger::new(&self.entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(error) => {
                    tracing::warn!("Validation messages will not be logged: {error}");
                    None
                }
            }
        } else {
            None
        };
        let surface = ash::khr::surface::Instance::new(&self.entry, &instance);
        let handle = instance.handle();
        *slot = Some(InstanceState {
            instance,
            surface,
            debug_messenger,
        });
        Ok(handle)
    }

    fn destroy_instance(&self, instance: vk::Instance) -> crate::Result<()> {
        let mut slot = self.instance.write()?;
        match slot.take() {
            Some(state) if state.instance.handle() == instance => {
                #[cfg(feature = "log-lifetimes")]
                trace!("Destroying VkInstance {:?}", instance);

                if let Some(messenger) = state.debug_messenger.as_ref() {
                    messenger.destroy();
                }
                unsafe { state.instance.destroy_instance(None) };
                Ok(())
            }
            other => {
                *slot = other;
                Err(KwantError::InvalidHandle("VkInstance"))
            }
        }
    }

    fn enumerate_physical_devices(
        &self,
        _instance: vk::Instance,
    ) -> crate::Result<Vec<vk::PhysicalDevice>> {
        self.with_instance(|state| {
            unsafe { state.instance.enumerate_physical_devices() }
                .native("vkEnumeratePhysicalDevices")
        })
    }

    fn device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<DeviceProperties> {
        self.with_instance(|state| {
            let properties =
                unsafe { state.instance.get_physical_device_properties(physical_device) };
            Ok(DeviceProperties {
                name: wrap_c_str(properties.device_name.as_ptr()),
                device_type: properties.device_type,
                api_version: properties.api_version,
                max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            })
        })
    }

    fn device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<vk::PhysicalDeviceFeatures> {
        self.with_instance(|state| {
            Ok(unsafe { state.instance.get_physical_device_features(physical_device) })
        })
    }

    fn queue_families(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<Vec<vk::QueueFamilyProperties>> {
        self.with_instance(|state| {
            Ok(unsafe {
                state
                    .instance
                    .get_physical_device_queue_family_properties(physical_device)
            })
        })
    }

    fn device_extensions(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> crate::Result<Vec<String>> {
        self.with_instance(|state| {
            let extensions = unsafe {
                state
                    .instance
                    .enumerate_device_extension_properties(physical_device)
            }
            .native("vkEnumerateDeviceExtensionProperties")?;
            Ok(extensions
                .iter()
                .map(|ext| wrap_c_str(ext.extension_name.as_ptr()))
                .collect())
        })
    }

    fn create_surface(
        &self,
        _instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> crate::Result<vk::SurfaceKHR> {
        self.with_instance(|state| {
            let surface = unsafe {
                ash_window::create_surface(&self.entry, &state.instance, display, window, None)
            }
            .native("vkCreateSurfaceKHR")?;

            #[cfg(feature = "log-lifetimes")]
            trace!("Creating VkSurfaceKHR {:?}", surface);

            Ok(surface)
        })
    }

    fn destroy_surface(
        &self,
        _instance: vk::Instance,
        surface: vk::SurfaceKHR,
    ) -> crate::Result<()> {
        self.with_instance(|state| {
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkSurfaceKHR {:?}", surface);

            unsafe { state.surface.destroy_surface(surface, None) };
            Ok(())
        })
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> crate::Result<bool> {
        self.with_instance(|state| {
            unsafe {
                state.surface.get_physical_device_surface_support(
                    physical_device,
                    family_index,
                    surface,
                )
            }
            .native("vkGetPhysicalDeviceSurfaceSupportKHR")
        })
    }

    fn surface_details(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> crate::Result<SurfaceDetails> {
        self.with_instance(|state| unsafe {
            let capabilities = state
                .surface
                .get_physical_device_surface_capabilities(physical_device, surface)
                .native("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
            let formats = state
                .surface
                .get_physical_device_surface_formats(physical_device, surface)
                .native("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
            let present_modes = state
                .surface
                .get_physical_device_surface_present_modes(physical_device, surface)
                .native("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
            Ok(SurfaceDetails {
                capabilities,
                formats,
                present_modes,
            })
        })
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        descriptor: &DeviceDescriptor,
    ) -> crate::Result<vk::Device> {
        let device = self.with_instance(|state| {
            let queue_cis: Vec<vk::DeviceQueueCreateInfo> = descriptor
                .queues
                .iter()
                .map(|queue| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(queue.family_index)
                        .queue_priorities(&queue.priorities)
                })
                .collect();
            let extensions = to_c_strings(&descriptor.extensions)?;
            let extension_ptrs = name_pointers(&extensions);
            let mut vulkan_13_features =
                vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);
            let mut device_ci = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_cis)
                .enabled_extension_names(&extension_ptrs)
                .enabled_features(&descriptor.features);
            if descriptor.dynamic_rendering {
                device_ci = device_ci.push_next(&mut vulkan_13_features);
            }
            let device = unsafe {
                state
                    .instance
                    .create_device(physical_device, &device_ci, None)
            }
            .native("vkCreateDevice")?;
            let swapchain = ash::khr::swapchain::Device::new(&state.instance, &device);
            Ok(DeviceState {
                device,
                swapchain,
                layouts: Mutex::new(HashMap::new()),
            })
        })?;
        let handle = device.device.handle();

        #[cfg(feature = "log-lifetimes")]
        trace!("Creating VkDevice {:?}", handle);

        self.devices.write()?.insert(handle, device);
        Ok(handle)
    }

    fn destroy_device(&self, device: vk::Device) -> crate::Result<()> {
        let state = self
            .devices
            .write()?
            .remove(&device)
            .ok_or(KwantError::InvalidHandle("VkDevice"))?;

        #[cfg(feature = "log-lifetimes")]
        trace!("Destroying VkDevice {:?}", device);

        unsafe {
            for (_, layout) in state.layouts.lock()?.drain() {
                state.device.destroy_pipeline_layout(layout, None);
            }
            state.device.destroy_device(None);
        }
        Ok(())
    }

    fn device_queue(
        &self,
        device: vk::Device,
        family_index: u32,
        index: u32,
    ) -> crate::Result<vk::Queue> {
        self.with_device(device, |state| unsafe {
            Ok(state.device.get_device_queue(family_index, index))
        })
    }

    fn create_swapchain(
        &self,
        device: vk::Device,
        descriptor: &SwapchainCreateDescriptor,
    ) -> crate::Result<vk::SwapchainKHR> {
        self.with_device(device, |state| {
            let swapchain_ci = vk::SwapchainCreateInfoKHR::default()
                .surface(descriptor.surface)
                .min_image_count(descriptor.min_image_count)
                .image_format(descriptor.image_format)
                .image_color_space(descriptor.image_color_space)
                .image_extent(descriptor.image_extent)
                .image_array_layers(1)
                .image_usage(descriptor.image_usage)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(descriptor.pre_transform)
                .composite_alpha(descriptor.composite_alpha)
                .present_mode(descriptor.present_mode)
                .clipped(descriptor.clipped);
            let handle = unsafe { state.swapchain.create_swapchain(&swapchain_ci, None) }
                .native("vkCreateSwapchainKHR")?;

            #[cfg(feature = "log-lifetimes")]
            trace!("Creating VkSwapchainKHR {:?}", handle);

            Ok(handle)
        })
    }

    fn swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> crate::Result<Vec<vk::Image>> {
        self.with_device(device, |state| {
            unsafe { state.swapchain.get_swapchain_images(swapchain) }
                .native("vkGetSwapchainImagesKHR")
        })
    }

    fn destroy_swapchain(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> crate::Result<()> {
        self.with_device(device, |state| {
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkSwapchainKHR {:?}", swapchain);

            unsafe { state.swapchain.destroy_swapchain(swapchain, None) };
            Ok(())
        })
    }

    fn create_image_view(
        &self,
        device: vk::Device,
        image: vk::Image,
        format: vk::Format,
    ) -> crate::Result<vk::ImageView> {
        self.with_device(device, |state| {
            let image_view_ci = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping::default())
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            unsafe { state.device.create_image_view(&image_view_ci, None) }
                .native("vkCreateImageView")
        })
    }

    fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView) -> crate::Result<()> {
        self.with_device(device, |state| {
            unsafe { state.device.destroy_image_view(view, None) };
            Ok(())
        })
    }

    fn create_shader_module(
        &self,
        device: vk::Device,
        descriptor: &ShaderModuleDescriptor,
    ) -> crate::Result<vk::ShaderModule> {
        self.with_device(device, |state| {
            let shader_ci = vk::ShaderModuleCreateInfo::default()
                .flags(descriptor.flags)
                .code(&descriptor.code);
            let handle = unsafe { state.device.create_shader_module(&shader_ci, None) }
                .native("vkCreateShaderModule")?;

            #[cfg(feature = "log-lifetimes")]
            trace!("Creating VkShaderModule {:?}", handle);

            Ok(handle)
        })
    }

    fn destroy_shader_module(
        &self,
        device: vk::Device,
        module: vk::ShaderModule,
    ) -> crate::Result<()> {
        self.with_device(device, |state| {
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkShaderModule {:?}", module);

            unsafe { state.device.destroy_shader_module(module, None) };
            Ok(())
        })
    }

    fn create_graphics_pipeline(
        &self,
        device: vk::Device,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> crate::Result<vk::Pipeline> {
        self.with_device(device, |state| {
            let entry_points = descriptor
                .stages
                .iter()
                .map(|stage| CString::new(stage.entry_point.as_str()))
                .collect::<Result<Vec<CString>, _>>()?;
            let specializations: Vec<Option<vk::SpecializationInfo>> = descriptor
                .stages
                .iter()
                .map(|stage| {
                    stage.specialization.as_ref().map(|specialization| {
                        vk::SpecializationInfo::default()
                            .map_entries(&specialization.entries)
                            .data(&specialization.data)
                    })
                })
                .collect();
            let stages: Vec<vk::PipelineShaderStageCreateInfo> = descriptor
                .stages
                .iter()
                .zip(entry_points.iter())
                .zip(specializations.iter())
                .map(|((stage, name), specialization)| {
                    let info = vk::PipelineShaderStageCreateInfo::default()
                        .flags(stage.flags)
                        .stage(stage.stage)
                        .module(stage.module)
                        .name(name.as_c_str());
                    match specialization {
                        Some(specialization) => info.specialization_info(specialization),
                        None => info,
                    }
                })
                .collect();

            let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
                .flags(descriptor.vertex_input.flags)
                .vertex_binding_descriptions(&descriptor.vertex_input.bindings)
                .vertex_attribute_descriptions(&descriptor.vertex_input.attributes);
            let input_assembly: vk::PipelineInputAssemblyStateCreateInfo =
                descriptor.input_assembly.into();
            let tessellation = descriptor.patch_control_points.map(|points| {
                vk::PipelineTessellationStateCreateInfo::default().patch_control_points(points)
            });
            let viewport_state = vk::PipelineViewportStateCreateInfo::default()
                .viewport_count(1)
                .scissor_count(1);
            let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
                .polygon_mode(vk::PolygonMode::FILL)
                .cull_mode(vk::CullModeFlags::NONE)
                .front_face(vk::FrontFace::CLOCKWISE)
                .line_width(1.0);
            let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
                .rasterization_samples(vk::SampleCountFlags::TYPE_1)
                .min_sample_shading(1.0);
            let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default();
            let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = descriptor
                .color_attachment_formats
                .iter()
                .map(|_| {
                    vk::PipelineColorBlendAttachmentState::default()
                        .color_write_mask(
                            vk::ColorComponentFlags::R
                                | vk::ColorComponentFlags::G
                                | vk::ColorComponentFlags::B
                                | vk::ColorComponentFlags::A,
                        )
                })
                .collect();
            let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op(vk::LogicOp::COPY)
                .attachments(&blend_attachments);
            let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
            let dynamic_info =
                vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);
            let mut render_info = vk::PipelineRenderingCreateInfo::default()
                .color_attachment_formats(&descriptor.color_attachment_formats);

            let layout = unsafe {
                state
                    .device
                    .create_pipeline_layout(&vk::PipelineLayoutCreateInfo::default(), None)
            }
            .native("vkCreatePipelineLayout")?;

            let mut pipeline_ci = vk::GraphicsPipelineCreateInfo::default()
                .flags(descriptor.flags)
                .stages(&stages)
                .vertex_input_state(&vertex_input)
                .input_assembly_state(&input_assembly)
                .viewport_state(&viewport_state)
                .rasterization_state(&rasterizer)
                .multisample_state(&multisampling)
                .depth_stencil_state(&depth_stencil)
                .color_blend_state(&color_blending)
                .dynamic_state(&dynamic_info)
                .layout(layout)
                .push_next(&mut render_info);
            if let Some(tessellation) = tessellation.as_ref() {
                pipeline_ci = pipeline_ci.tessellation_state(tessellation);
            }

            let created = unsafe {
                state.device.create_graphics_pipelines(
                    vk::PipelineCache::null(),
                    std::slice::from_ref(&pipeline_ci),
                    None,
                )
            };
            let pipeline = match created {
                Ok(pipelines) => pipelines.into_iter().next(),
                Err((_, code)) => {
                    unsafe { state.device.destroy_pipeline_layout(layout, None) };
                    return Err(KwantError::native("vkCreateGraphicsPipelines", code));
                }
            };
            let Some(pipeline) = pipeline else {
                unsafe { state.device.destroy_pipeline_layout(layout, None) };
                return Err(KwantError::native(
                    "vkCreateGraphicsPipelines",
                    vk::Result::ERROR_UNKNOWN,
                ));
            };

            #[cfg(feature = "log-lifetimes")]
            trace!("Creating VkPipeline {:?}", pipeline);

            state.layouts.lock()?.insert(pipeline, layout);
            Ok(pipeline)
        })
    }

    fn destroy_pipeline(&self, device: vk::Device, pipeline: vk::Pipeline) -> crate::Result<()> {
        self.with_device(device, |state| {
            #[cfg(feature = "log-lifetimes")]
            trace!("Destroying VkPipeline {:?}", pipeline);

            let layout = state.layouts.lock()?.remove(&pipeline);
            unsafe {
                state.device.destroy_pipeline(pipeline, None);
                if let Some(layout) = layout {
                    state.device.destroy_pipeline_layout(layout, None);
                }
            }
            Ok(())
        })
    }
}
