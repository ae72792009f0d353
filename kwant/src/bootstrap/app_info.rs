use ash::vk;
use glam::UVec2;

pub const ENGINE_NAME: &str = "Kwant Engine";
pub const ENGINE_VERSION: u32 = 1;

/// Name and version reported to the driver for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub name: String,
    pub version: u32,
}

impl Default for GameInfo {
    fn default() -> Self {
        Self {
            name: "Kwanta game".to_string(),
            version: 1,
        }
    }
}

impl GameInfo {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MonitorSelection {
    #[default]
    Primary,
    /// Monitor at this position in the window system's monitor list
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowMode {
    #[default]
    Normal,
    /// Exclusive fullscreen using the monitor's video mode
    TrueFullscreen,
    BorderlessFullscreen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSettings {
    pub monitor: MonitorSelection,
    pub size: UVec2,
    pub mode: WindowMode,
    pub resizable: bool,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self::normal(UVec2::new(1280, 720), true, "Kwant")
    }
}

impl WindowSettings {
    /// A regular decorated window on the primary monitor
    pub fn normal(size: UVec2, resizable: bool, title: impl Into<String>) -> Self {
        Self {
            monitor: MonitorSelection::Primary,
            size,
            mode: WindowMode::Normal,
            resizable,
            title: title.into(),
        }
    }

    pub fn fullscreen(monitor: MonitorSelection, size: UVec2, title: impl Into<String>) -> Self {
        Self {
            monitor,
            size,
            mode: WindowMode::TrueFullscreen,
            resizable: false,
            title: title.into(),
        }
    }

    pub fn borderless(monitor: MonitorSelection, size: UVec2, title: impl Into<String>) -> Self {
        Self {
            monitor,
            size,
            mode: WindowMode::BorderlessFullscreen,
            resizable: false,
            title: title.into(),
        }
    }
}

/// Presentation preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsSettings {
    /// Desired number of swapchain images
    pub buffering: u32,
    /// Swapchain extent. [`None`] uses the window's framebuffer size
    pub resolution: Option<UVec2>,
    pub present_mode: vk::PresentModeKHR,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self::triple_buffering(None)
    }
}

impl GraphicsSettings {
    pub fn triple_buffering(resolution: Option<UVec2>) -> Self {
        Self {
            buffering: 3,
            resolution,
            present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }

    pub fn simple(resolution: Option<UVec2>) -> Self {
        Self {
            buffering: 1,
            resolution,
            present_mode: vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// Everything the engine needs to know before [`start`](crate::core::Engine::start)
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub game_info: GameInfo,
    /// Turns validation on even when no layer is named, using every available layer
    pub enable_validation: bool,
    /// Layers to enable, a non-empty list also turns validation on
    pub validation_layers: Vec<String>,
    /// Instance extensions which must be present, on top of what the window system needs
    pub instance_extensions: Vec<String>,
    /// Device extensions which must be present, on top of the swapchain extension
    pub device_extensions: Vec<String>,
    pub device_features: vk::PhysicalDeviceFeatures,
    pub dynamic_rendering: bool,
    pub window: WindowSettings,
    pub graphics: GraphicsSettings,
    /// Use family 0 for presenting when no family reports surface support, instead of failing
    pub present_fallback: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            game_info: GameInfo::default(),
            enable_validation: false,
            validation_layers: Vec::new(),
            instance_extensions: Vec::new(),
            device_extensions: Vec::new(),
            device_features: vk::PhysicalDeviceFeatures::default(),
            dynamic_rendering: true,
            window: WindowSettings::default(),
            graphics: GraphicsSettings::default(),
            present_fallback: false,
        }
    }
}

impl EngineSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game_info(mut self, game_info: GameInfo) -> Self {
        self.game_info = game_info;
        self
    }

    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    pub fn with_validation_layer(mut self, layer: impl Into<String>) -> Self {
        self.validation_layers.push(layer.into());
        self
    }

    pub fn with_instance_extension(mut self, extension: impl Into<String>) -> Self {
        self.instance_extensions.push(extension.into());
        self
    }

    pub fn with_device_extension(mut self, extension: impl Into<String>) -> Self {
        self.device_extensions.push(extension.into());
        self
    }

    pub fn with_device_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.device_features = features;
        self
    }

    pub fn with_dynamic_rendering(mut self, enable: bool) -> Self {
        self.dynamic_rendering = enable;
        self
    }

    pub fn with_window(mut self, window: WindowSettings) -> Self {
        self.window = window;
        self
    }

    pub fn with_graphics(mut self, graphics: GraphicsSettings) -> Self {
        self.graphics = graphics;
        self
    }

    pub fn with_present_fallback(mut self, fallback: bool) -> Self {
        self.present_fallback = fallback;
        self
    }

    /// Whether validation layers should be looked up at all
    pub fn validation_requested(&self) -> bool {
        self.enable_validation || !self.validation_layers.is_empty()
    }
}
