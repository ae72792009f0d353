use std::path::{Path, PathBuf};

use ash::vk;

use crate::concurrency::{Slot, WeakSlot};
use crate::device::LogicalDevice;
use crate::driver::{ShaderModuleDescriptor, ShaderStageDescriptor};
use crate::shader::ShaderLoader;
use crate::util::merge_flags;
use crate::KwantError;

/// Specialization constants handed to a shader stage
#[derive(Debug, Clone, Default)]
pub struct SpecializationInfo {
    pub entries: Vec<vk::SpecializationMapEntry>,
    pub data: Vec<u8>,
}

impl SpecializationInfo {
    /// Appends a constant, laid out right after the previous one
    pub fn constant(mut self, constant_id: u32, bytes: &[u8]) -> Self {
        self.entries.push(vk::SpecializationMapEntry {
            constant_id,
            offset: self.data.len() as u32,
            size: bytes.len(),
        });
        self.data.extend_from_slice(bytes);
        self
    }
}

/// A created shader module together with how it is bound into a pipeline
#[derive(Debug, Clone)]
pub struct Shader {
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
    entry_point: String,
    flags: vk::PipelineShaderStageCreateFlags,
    specialization: Option<SpecializationInfo>,
}

impl Shader {
    /// Wraps a module created elsewhere, using the `main` entry point
    pub fn from_raw(module: vk::ShaderModule, stage: vk::ShaderStageFlags) -> Self {
        Self {
            module,
            stage,
            entry_point: "main".to_string(),
            flags: vk::PipelineShaderStageCreateFlags::empty(),
            specialization: None,
        }
    }

    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn stage_descriptor(&self) -> ShaderStageDescriptor {
        ShaderStageDescriptor {
            module: self.module,
            stage: self.stage,
            entry_point: self.entry_point.clone(),
            flags: self.flags,
            specialization: self.specialization.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct ShaderConfig {
    /// Where the bytecode came from, for logging
    source: PathBuf,
    code: Vec<u32>,
    stage: vk::ShaderStageFlags,
    entry_point: String,
    module_flags: vk::ShaderModuleCreateFlags,
    stage_flags: vk::PipelineShaderStageCreateFlags,
    specialization: Option<SpecializationInfo>,
}

/// Builds a [`Shader`] once the logical device exists.
///
/// The bytecode is read when the builder is made, so missing files surface right away. Nothing
/// is created on the device until [`build`](ShaderBuilder::build) and the device being ready
/// have both happened.
#[derive(Debug)]
pub struct ShaderBuilder {
    device: WeakSlot<LogicalDevice>,
    config: ShaderConfig,
}

impl ShaderBuilder {
    /// Loads SPIR-V through `loader`
    pub fn load(
        device: WeakSlot<LogicalDevice>,
        loader: &dyn ShaderLoader,
        path: impl AsRef<Path>,
    ) -> crate::Result<Self> {
        let path = path.as_ref();
        let bytes = loader.read_all(path)?;
        Self::from_bytes(device, path, &bytes)
    }

    pub fn from_bytes(
        device: WeakSlot<LogicalDevice>,
        source: impl Into<PathBuf>,
        bytes: &[u8],
    ) -> crate::Result<Self> {
        let source = source.into();
        let code = ash::util::read_spv(&mut std::io::Cursor::new(bytes)).map_err(|error| {
            KwantError::IoFailure {
                path: source.clone(),
                message: error.to_string(),
            }
        })?;
        Ok(Self {
            device,
            config: ShaderConfig {
                source,
                code,
                stage: vk::ShaderStageFlags::VERTEX,
                entry_point: "main".to_string(),
                module_flags: vk::ShaderModuleCreateFlags::empty(),
                stage_flags: vk::PipelineShaderStageCreateFlags::empty(),
                specialization: None,
            },
        })
    }

    pub fn stage(mut self, stage: vk::ShaderStageFlags) -> Self {
        self.config.stage = stage;
        self
    }

    pub fn entry_point(mut self, name: impl Into<String>) -> Self {
        self.config.entry_point = name.into();
        self
    }

    pub fn module_flags(mut self, flags: vk::ShaderModuleCreateFlags) -> Self {
        self.config.module_flags = merge_flags(self.config.module_flags, flags);
        self
    }

    pub fn stage_flags(mut self, flags: vk::PipelineShaderStageCreateFlags) -> Self {
        self.config.stage_flags = merge_flags(self.config.stage_flags, flags);
        self
    }

    pub fn specialization(mut self, specialization: SpecializationInfo) -> Self {
        self.config.specialization = Some(specialization);
        self
    }

    /// Returns a slot filled with the shader, or the error, once the device is ready.
    ///
    /// If the engine goes away first the slot never resolves.
    pub fn build(self) -> Slot<crate::Result<Shader>> {
        let result = Slot::new();
        let sink = result.clone();
        let config = self.config;
        let source = config.source.clone();
        let registered = self.device.subscribe(move |device: &LogicalDevice| {
            let outcome = config.create(device);
            if let Err(error) = outcome.as_ref() {
                tracing::error!("Failed to create shader {:?}: {error}", config.source);
            }
            if let Err(error) = sink.fill(outcome) {
                panic!("Shader {:?} was resolved twice: {error}", config.source);
            }
        });
        if !registered {
            tracing::warn!("Shader {source:?} was built after the engine went away");
        }
        result
    }
}

impl ShaderConfig {
    fn create(&self, device: &LogicalDevice) -> crate::Result<Shader> {
        let module = device.driver().create_shader_module(
            device.handle(),
            &ShaderModuleDescriptor {
                code: self.code.clone(),
                flags: self.module_flags,
            },
        )?;
        device.defer_destroy("VkShaderModule", move |driver, device| {
            driver.destroy_shader_module(device, module)
        });
        tracing::debug!("Created {:?} shader from {:?}", self.stage, self.source);
        Ok(Shader {
            module,
            stage: self.stage,
            entry_point: self.entry_point.clone(),
            flags: self.stage_flags,
            specialization: self.specialization.clone(),
        })
    }
}
