use std::collections::HashSet;

use ash::vk;
use derivative::Derivative;

use crate::device::QueueRole;
use crate::driver::Driver;

/// The subset of [`vk::PhysicalDeviceProperties`] the selector looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    /// `maxImageDimension2D` limit
    pub max_image_dimension_2d: u32,
}

/// One hardware queue family, in driver order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueFamilyDescriptor {
    pub index: u32,
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
}

impl QueueFamilyDescriptor {
    pub fn supports(&self, role: QueueRole) -> bool {
        self.flags.contains(role.flag())
    }

    /// Number of roles the family can serve at once
    pub fn specialization(&self) -> usize {
        QueueRole::ALL
            .iter()
            .filter(|role| self.supports(**role))
            .count()
    }
}

/// Everything known about a physical device while it is being considered for selection
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct DeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub properties: DeviceProperties,
    #[derivative(Debug = "ignore")]
    pub features: vk::PhysicalDeviceFeatures,
    pub queue_families: Vec<QueueFamilyDescriptor>,
    pub extensions: HashSet<String>,
}

impl DeviceCandidate {
    /// Gathers the capabilities of `handle`. Does not create anything.
    pub fn query(driver: &dyn Driver, handle: vk::PhysicalDevice) -> crate::Result<Self> {
        let properties = driver.device_properties(handle)?;
        let features = driver.device_features(handle)?;
        let queue_families = driver
            .queue_families(handle)?
            .into_iter()
            .enumerate()
            .map(|(index, family)| QueueFamilyDescriptor {
                index: index as u32,
                flags: family.queue_flags,
                queue_count: family.queue_count,
            })
            .collect();
        let extensions = driver.device_extensions(handle)?.into_iter().collect();
        Ok(Self {
            handle,
            properties,
            features,
            queue_families,
            extensions,
        })
    }

    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    pub fn has_family_for(&self, role: QueueRole) -> bool {
        self.queue_families.iter().any(|family| family.supports(role))
    }
}
