use ash::vk;

use crate::bootstrap::app_info::{EngineSettings, ENGINE_NAME, ENGINE_VERSION};
use crate::driver::{Driver, InstanceDescriptor};
use crate::KwantError;

pub const DEBUG_UTILS_EXTENSION: &str = "VK_EXT_debug_utils";

/// Works out which layers and extensions the instance gets
#[derive(Debug, Clone)]
pub struct InstanceBuilder<'a> {
    settings: &'a EngineSettings,
    /// Extensions the window system needs to create surfaces
    window_extensions: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

impl<'a> InstanceBuilder<'a> {
    pub fn new(settings: &'a EngineSettings) -> Self {
        Self {
            settings,
            window_extensions: Vec::new(),
        }
    }

    pub fn window_extensions(mut self, extensions: Vec<String>) -> Self {
        self.window_extensions = extensions;
        self
    }

    /// Every available layer when validation is on without named layers, otherwise the named
    /// layers the loader actually has
    pub fn resolve_layers(&self, available: &[String]) -> Vec<String> {
        if !self.settings.validation_requested() {
            return Vec::new();
        }
        if self.settings.validation_layers.is_empty() {
            return available.to_vec();
        }
        let mut layers = Vec::new();
        for layer in self.settings.validation_layers.iter() {
            if available.contains(layer) {
                push_unique(&mut layers, layer);
            } else {
                tracing::warn!("Validation layer {layer} is not available, skipping");
            }
        }
        layers
    }

    /// Produces the instance description from what the loader reports
    pub fn resolve(
        &self,
        available_layers: &[String],
        available_extensions: &[String],
    ) -> crate::Result<InstanceDescriptor> {
        let layers = self.resolve_layers(available_layers);

        let mut extensions = Vec::new();
        for extension in self
            .window_extensions
            .iter()
            .chain(self.settings.instance_extensions.iter())
        {
            if !available_extensions.contains(extension) {
                return Err(KwantError::MissingExtension(extension.clone()));
            }
            push_unique(&mut extensions, extension);
        }

        let debug_messenger = !layers.is_empty()
            && available_extensions
                .iter()
                .any(|extension| extension == DEBUG_UTILS_EXTENSION);
        if debug_messenger {
            push_unique(&mut extensions, DEBUG_UTILS_EXTENSION);
        }

        tracing::debug!("Instance layers: {layers:?}, extensions: {extensions:?}");
        Ok(InstanceDescriptor {
            application_name: self.settings.game_info.name.clone(),
            application_version: self.settings.game_info.version,
            engine_name: ENGINE_NAME.to_string(),
            engine_version: ENGINE_VERSION,
            api_version: vk::API_VERSION_1_3,
            layers,
            extensions,
            debug_messenger,
        })
    }

    /// Queries the loader, then [`resolve`](Self::resolve)s
    pub fn build(self, driver: &dyn Driver) -> crate::Result<InstanceDescriptor> {
        let available_layers = if self.settings.validation_requested() {
            driver.available_layers()?
        } else {
            Vec::new()
        };
        let available_extensions = driver.available_instance_extensions()?;
        self.resolve(&available_layers, &available_extensions)
    }
}
