use std::sync::{Arc, Mutex};

use ash::vk;
use derivative::Derivative;

use crate::bootstrap::SelectedDevice;
use crate::driver::Driver;
use crate::error::TeardownFailure;
use crate::util::DeletionStack;

#[derive(Derivative)]
#[derivative(Debug)]
struct LogicalDeviceInner {
    handle: vk::Device,
    physical: SelectedDevice,
    #[derivative(Debug = "ignore")]
    driver: Arc<dyn Driver>,
    /// Objects created from this device, destroyed newest first before the device itself
    children: Mutex<DeletionStack>,
}

/// A created [`vk::Device`] as published to builders and subscribers.
///
/// Cloning is cheap, every clone refers to the same device.
#[derive(Clone, Debug)]
pub struct LogicalDevice {
    inner: Arc<LogicalDeviceInner>,
}

impl PartialEq for LogicalDevice {
    fn eq(&self, other: &Self) -> bool {
        self.inner.handle == other.inner.handle
    }
}

impl Eq for LogicalDevice {}

impl LogicalDevice {
    pub fn new(handle: vk::Device, physical: SelectedDevice, driver: Arc<dyn Driver>) -> Self {
        Self {
            inner: Arc::new(LogicalDeviceInner {
                handle,
                physical,
                driver,
                children: Mutex::new(DeletionStack::new()),
            }),
        }
    }

    pub fn handle(&self) -> vk::Device {
        self.inner.handle
    }

    /// The physical device this device was created from
    pub fn physical(&self) -> &SelectedDevice {
        &self.inner.physical
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.inner.driver
    }

    /// Registers the destruction of an object created from this device
    pub fn defer_destroy<F>(&self, label: impl Into<String>, func: F)
    where
        F: FnOnce(&dyn Driver, vk::Device) -> crate::Result<()> + Send + 'static,
    {
        let driver = self.inner.driver.clone();
        let handle = self.inner.handle;
        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        children.push(label, move || func(driver.as_ref(), handle));
    }

    /// Number of child objects still alive
    pub fn child_count(&self) -> usize {
        self.inner
            .children
            .lock()
            .map(|children| children.len())
            .unwrap_or(0)
    }

    /// Destroys every child object, newest first
    pub fn destroy_children(&self) -> Vec<TeardownFailure> {
        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        children.flush()
    }
}
