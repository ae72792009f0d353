use std::collections::HashSet;

use ash::vk;
use derivative::Derivative;

use crate::bootstrap::queue::QueueFamilyPlan;
use crate::bootstrap::swapchain::SWAPCHAIN_EXTENSION;
use crate::device::{DeviceCandidate, QueueFamilyDescriptor, QueueRole};
use crate::KwantError;

/// Score of a device which must never be picked
pub const DISQUALIFIED: i64 = i64::MIN;

/// Rates a device, higher is better.
///
/// Returning [`DISQUALIFIED`] removes the device from consideration.
pub trait DeviceScorer: Send + Sync {
    fn score(&self, candidate: &DeviceCandidate) -> i64;
}

impl<F> DeviceScorer for F
where
    F: Fn(&DeviceCandidate) -> i64 + Send + Sync,
{
    fn score(&self, candidate: &DeviceCandidate) -> i64 {
        self(candidate)
    }
}

/// Prefers discrete hardware, then larger image limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultScorer {
    /// Disqualify devices without `VK_KHR_swapchain`
    pub require_swapchain: bool,
}

impl Default for DefaultScorer {
    fn default() -> Self {
        Self {
            require_swapchain: true,
        }
    }
}

impl DefaultScorer {
    pub fn base_score(device_type: vk::PhysicalDeviceType) -> i64 {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 500,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 300,
            vk::PhysicalDeviceType::CPU => 100,
            _ => 0,
        }
    }
}

impl DeviceScorer for DefaultScorer {
    fn score(&self, candidate: &DeviceCandidate) -> i64 {
        if candidate.features.geometry_shader == vk::FALSE
            || !candidate.has_family_for(QueueRole::Graphics)
            || (self.require_swapchain && !candidate.supports_extension(SWAPCHAIN_EXTENSION))
        {
            return DISQUALIFIED;
        }
        Self::base_score(candidate.properties.device_type)
            + candidate.properties.max_image_dimension_2d as i64
    }
}

/// Picks the best scoring device
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PhysicalDeviceSelector {
    #[derivative(Debug = "ignore")]
    scorer: Box<dyn DeviceScorer>,
}

impl Default for PhysicalDeviceSelector {
    fn default() -> Self {
        Self::new(DefaultScorer::default())
    }
}

impl PhysicalDeviceSelector {
    pub fn new<S: DeviceScorer + 'static>(scorer: S) -> Self {
        Self {
            scorer: Box::new(scorer),
        }
    }

    pub fn score(&self, candidate: &DeviceCandidate) -> i64 {
        self.scorer.score(candidate)
    }

    /// Keeps the strictly greatest score in enumeration order, so ties go to the device the
    /// driver listed first
    pub fn pick(&self, mut candidates: Vec<DeviceCandidate>) -> crate::Result<DeviceCandidate> {
        let mut best: Option<(usize, i64)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let score = self.scorer.score(candidate);
            if score == DISQUALIFIED {
                tracing::debug!("{} is not suitable", candidate.properties.name);
                continue;
            }
            tracing::debug!("{} scored {score}", candidate.properties.name);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        match best {
            Some((index, _)) => Ok(candidates.swap_remove(index)),
            None => Err(KwantError::NoSuitableDevice),
        }
    }
}

/// The physical device everything after selection works with
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedDevice {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    /// Ideal family for every role
    pub plan: QueueFamilyPlan,
    /// Family used for presenting to the surface
    pub present_family: u32,
    pub queue_families: Vec<QueueFamilyDescriptor>,
    pub extensions: HashSet<String>,
}

impl SelectedDevice {
    pub fn new(candidate: DeviceCandidate, plan: QueueFamilyPlan, present_family: u32) -> Self {
        Self {
            handle: candidate.handle,
            name: candidate.properties.name,
            plan,
            present_family,
            queue_families: candidate.queue_families,
            extensions: candidate.extensions,
        }
    }

    pub fn family(&self, index: u32) -> Option<&QueueFamilyDescriptor> {
        self.queue_families.iter().find(|family| family.index == index)
    }

    pub fn ideal_family(&self, role: QueueRole) -> Option<u32> {
        self.plan.family_for(role)
    }
}
