pub mod logical_device;
pub mod physical_device;
pub mod queue;

pub use logical_device::LogicalDevice;
pub use physical_device::{DeviceCandidate, DeviceProperties, QueueFamilyDescriptor};
pub use queue::{Queue, QueueInfo, QueueRole};
