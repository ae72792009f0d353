use ash::vk;

use crate::device::{QueueFamilyDescriptor, QueueRole};
use crate::driver::Driver;

/// Ideal family per role, [`None`] when no family can serve the role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueueFamilyPlan {
    pub graphics: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
}

impl QueueFamilyPlan {
    pub fn family_for(&self, role: QueueRole) -> Option<u32> {
        match role {
            QueueRole::Graphics => self.graphics,
            QueueRole::Compute => self.compute,
            QueueRole::Transfer => self.transfer,
        }
    }

    pub fn set(&mut self, role: QueueRole, family: Option<u32>) {
        match role {
            QueueRole::Graphics => self.graphics = family,
            QueueRole::Compute => self.compute = family,
            QueueRole::Transfer => self.transfer = family,
        }
    }
}

/// Maps roles onto queue families
pub trait QueueFamilyPlanner: Send + Sync {
    fn family_for(&self, role: QueueRole, families: &[QueueFamilyDescriptor]) -> Option<u32>;

    fn plan(&self, families: &[QueueFamilyDescriptor]) -> QueueFamilyPlan {
        let mut plan = QueueFamilyPlan::default();
        for role in QueueRole::ALL {
            plan.set(role, self.family_for(role, families));
        }
        plan
    }
}

/// Picks the family serving the fewest roles, so a dedicated family wins when one exists.
/// Ties go to the lowest index.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedicatedFirstPlanner;

impl QueueFamilyPlanner for DedicatedFirstPlanner {
    fn family_for(&self, role: QueueRole, families: &[QueueFamilyDescriptor]) -> Option<u32> {
        // min_by_key keeps the first of equal keys
        families
            .iter()
            .filter(|family| family.queue_count > 0 && family.supports(role))
            .min_by_key(|family| family.specialization())
            .map(|family| family.index)
    }
}

/// First family, in index order, which can present to `surface`
pub fn find_present_family(
    driver: &dyn Driver,
    physical_device: vk::PhysicalDevice,
    families: &[QueueFamilyDescriptor],
    surface: vk::SurfaceKHR,
) -> crate::Result<Option<u32>> {
    for family in families.iter() {
        if driver.surface_support(physical_device, family.index, surface)? {
            return Ok(Some(family.index));
        }
    }
    Ok(None)
}
