use std::sync::{Arc, Mutex, PoisonError};

use ash::vk;

use crate::concurrency::{Slot, WeakSlot};
use crate::device::LogicalDevice;
use crate::driver::GraphicsPipelineDescriptor;
use crate::pipelines::{PipelineInputAssemblyStateCreateInfo, VertexInputLayout};
use crate::shader::Shader;
use crate::util::merge_flags;
use crate::KwantError;

#[derive(Debug, Clone)]
pub struct GraphicsPipeline {
    handle: vk::Pipeline,
    stages: Vec<vk::ShaderStageFlags>,
}

impl GraphicsPipeline {
    /// Stages the pipeline was built from, in the order they were added
    pub fn stages(&self) -> &[vk::ShaderStageFlags] {
        &self.stages
    }
}

impl super::Pipeline for GraphicsPipeline {
    fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    fn bind_point(&self) -> vk::PipelineBindPoint {
        vk::PipelineBindPoint::GRAPHICS
    }
}

/// Fixed function state, everything except the shaders
#[derive(Debug, Clone, Default)]
struct PipelineConfig {
    flags: vk::PipelineCreateFlags,
    vertex_input: VertexInputLayout,
    input_assembly: PipelineInputAssemblyStateCreateInfo,
    patch_control_points: Option<u32>,
    color_attachment_formats: Vec<vk::Format>,
}

/// Builds a [`GraphicsPipeline`] from shaders which may not exist yet.
///
/// The pipeline is created once the device and every shader slot have been filled, in
/// whatever order that happens. A shader which failed to build fails the pipeline.
#[derive(Debug)]
pub struct GraphicsPipelineBuilder {
    device: WeakSlot<LogicalDevice>,
    shaders: Vec<Slot<crate::Result<Shader>>>,
    config: PipelineConfig,
}

impl GraphicsPipelineBuilder {
    pub fn new(device: WeakSlot<LogicalDevice>) -> Self {
        Self {
            device,
            shaders: Vec::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn flags(mut self, flags: vk::PipelineCreateFlags) -> Self {
        self.config.flags = merge_flags(self.config.flags, flags);
        self
    }

    pub fn shader(mut self, shader: &Slot<crate::Result<Shader>>) -> Self {
        self.shaders.push(shader.clone());
        self
    }

    pub fn vertex_input(mut self, layout: VertexInputLayout) -> Self {
        self.config.vertex_input = layout;
        self
    }

    pub fn topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.config.input_assembly.topology = topology;
        self
    }

    pub fn primitive_restart(mut self, enable: bool) -> Self {
        self.config.input_assembly.primitive_restart_enable = enable;
        self
    }

    pub fn input_assembly_flags(
        mut self,
        flags: vk::PipelineInputAssemblyStateCreateFlags,
    ) -> Self {
        self.config.input_assembly.flags = merge_flags(self.config.input_assembly.flags, flags);
        self
    }

    /// Enables tessellation with `points` control points per patch
    pub fn tessellation(mut self, points: u32) -> Self {
        self.config.patch_control_points = Some(points);
        self
    }

    pub fn color_attachment(mut self, format: vk::Format) -> Self {
        self.config.color_attachment_formats.push(format);
        self
    }

    /// Returns a slot filled with the pipeline, or the first error, once every dependency
    /// is ready.
    ///
    /// Never resolves if the engine goes away before the device exists.
    pub fn build(self) -> Slot<crate::Result<GraphicsPipeline>> {
        let result = Slot::new();
        let gather = Arc::new(Gather {
            state: Mutex::new(GatherState {
                device: None,
                shaders: vec![None; self.shaders.len()],
                remaining: self.shaders.len() + 1,
                finished: false,
            }),
            config: self.config,
            result: result.clone(),
        });

        for (index, shader) in self.shaders.iter().enumerate() {
            let gather = gather.clone();
            shader.subscribe(move |shader: &crate::Result<Shader>| match shader {
                Ok(shader) => gather.shader_ready(index, shader.clone()),
                Err(error) => gather.fail(error.clone()),
            });
        }
        let device_gather = gather.clone();
        let registered = self
            .device
            .subscribe(move |device: &LogicalDevice| device_gather.device_ready(device.clone()));
        if !registered {
            tracing::warn!("Graphics pipeline was built after the engine went away");
        }
        result
    }
}

#[derive(Debug)]
struct GatherState {
    device: Option<LogicalDevice>,
    shaders: Vec<Option<Shader>>,
    /// Device plus shaders not yet arrived
    remaining: usize,
    finished: bool,
}

/// Collects the dependencies of one pipeline build
#[derive(Debug)]
struct Gather {
    state: Mutex<GatherState>,
    config: PipelineConfig,
    result: Slot<crate::Result<GraphicsPipeline>>,
}

impl Gather {
    fn lock(&self) -> std::sync::MutexGuard<'_, GatherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn device_ready(&self, device: LogicalDevice) {
        let ready = {
            let mut state = self.lock();
            if state.finished {
                return;
            }
            state.device = Some(device);
            state.remaining -= 1;
            Self::take_if_ready(&mut state)
        };
        if let Some((device, shaders)) = ready {
            self.create(&device, shaders);
        }
    }

    fn shader_ready(&self, index: usize, shader: Shader) {
        let ready = {
            let mut state = self.lock();
            if state.finished {
                return;
            }
            state.shaders[index] = Some(shader);
            state.remaining -= 1;
            Self::take_if_ready(&mut state)
        };
        if let Some((device, shaders)) = ready {
            self.create(&device, shaders);
        }
    }

    fn take_if_ready(state: &mut GatherState) -> Option<(LogicalDevice, Vec<Shader>)> {
        if state.remaining > 0 {
            return None;
        }
        state.finished = true;
        let device = state.device.take()?;
        let shaders = state.shaders.drain(..).flatten().collect();
        Some((device, shaders))
    }

    fn fail(&self, error: KwantError) {
        {
            let mut state = self.lock();
            if state.finished {
                return;
            }
            state.finished = true;
        }
        tracing::error!("Graphics pipeline dependency failed: {error}");
        self.publish(Err(error));
    }

    fn create(&self, device: &LogicalDevice, shaders: Vec<Shader>) {
        let descriptor = GraphicsPipelineDescriptor {
            flags: self.config.flags,
            stages: shaders.iter().map(Shader::stage_descriptor).collect(),
            vertex_input: self.config.vertex_input.clone(),
            input_assembly: self.config.input_assembly,
            patch_control_points: self.config.patch_control_points,
            color_attachment_formats: self.config.color_attachment_formats.clone(),
        };
        let outcome = device
            .driver()
            .create_graphics_pipeline(device.handle(), &descriptor)
            .map(|handle| {
                device.defer_destroy("VkPipeline", move |driver, device| {
                    driver.destroy_pipeline(device, handle)
                });
                tracing::debug!("Created graphics pipeline with {} stage(s)", shaders.len());
                GraphicsPipeline {
                    handle,
                    stages: shaders.iter().map(Shader::stage).collect(),
                }
            });
        if let Err(error) = outcome.as_ref() {
            tracing::error!("Failed to create graphics pipeline: {error}");
        }
        self.publish(outcome);
    }

    fn publish(&self, outcome: crate::Result<GraphicsPipeline>) {
        if let Err(error) = self.result.fill(outcome) {
            panic!("Graphics pipeline was resolved twice: {error}");
        }
    }
}
