/// Set of utilities structs and methods which streamline the Vulkan initialization process
pub mod app_info;
pub mod instance;
pub mod ledger;
pub mod physical_device;
pub mod queue;
pub mod swapchain;

pub use app_info::{
    EngineSettings, GameInfo, GraphicsSettings, MonitorSelection, WindowMode, WindowSettings,
};
pub use instance::InstanceBuilder;
pub use ledger::{CompactedRequests, QueueRequest, QueueRequestBuilder, ResourceRequestLedger};
pub use physical_device::{
    DefaultScorer, DeviceScorer, PhysicalDeviceSelector, SelectedDevice, DISQUALIFIED,
};
pub use queue::{find_present_family, DedicatedFirstPlanner, QueueFamilyPlan, QueueFamilyPlanner};
pub use swapchain::{SwapchainNegotiator, SwapchainPlan, SWAPCHAIN_EXTENSION};
