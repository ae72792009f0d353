use ash::vk;
pub use graphics::{GraphicsPipeline, GraphicsPipelineBuilder};
use std::ptr;
pub use traits::*;

pub mod traits;

pub mod graphics;

#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub struct PipelineInputAssemblyStateCreateInfo {
    pub flags: vk::PipelineInputAssemblyStateCreateFlags,
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart_enable: bool,
}

impl Default for PipelineInputAssemblyStateCreateInfo {
    fn default() -> Self {
        Self {
            flags: vk::PipelineInputAssemblyStateCreateFlags::empty(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart_enable: false,
        }
    }
}

impl<'a> From<PipelineInputAssemblyStateCreateInfo>
    for vk::PipelineInputAssemblyStateCreateInfo<'a>
{
    fn from(value: PipelineInputAssemblyStateCreateInfo) -> Self {
        vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            p_next: ptr::null(),
            flags: value.flags,
            topology: value.topology,
            primitive_restart_enable: value.primitive_restart_enable as u32,
            _marker: Default::default(),
        }
    }
}

/// Vertex buffer bindings and the attributes read from them
#[derive(Debug, Clone, Default)]
pub struct VertexInputLayout {
    pub flags: vk::PipelineVertexInputStateCreateFlags,
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexInputLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding advanced once per vertex
    pub fn vertex(self, binding: u32, stride: u32) -> Self {
        self.binding(binding, stride, vk::VertexInputRate::VERTEX)
    }

    /// Binding advanced once per instance
    pub fn instance(self, binding: u32, stride: u32) -> Self {
        self.binding(binding, stride, vk::VertexInputRate::INSTANCE)
    }

    fn binding(mut self, binding: u32, stride: u32, input_rate: vk::VertexInputRate) -> Self {
        self.bindings.push(vk::VertexInputBindingDescription {
            binding,
            stride,
            input_rate,
        });
        self
    }

    pub fn attribute(
        mut self,
        location: u32,
        binding: u32,
        format: vk::Format,
        offset: u32,
    ) -> Self {
        self.attributes.push(vk::VertexInputAttributeDescription {
            location,
            binding,
            format,
            offset,
        });
        self
    }

    pub fn flags(mut self, flags: vk::PipelineVertexInputStateCreateFlags) -> Self {
        self.flags = crate::util::merge_flags(self.flags, flags);
        self
    }
}
