use std::hash::{Hash, Hasher};

use ash::vk;

/// Abstract job a queue is requested for.
///
/// Presenting is not a role, whether a family can present is probed against a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueRole {
    Graphics,
    Compute,
    Transfer,
}

impl QueueRole {
    pub const ALL: [QueueRole; 3] = [QueueRole::Graphics, QueueRole::Compute, QueueRole::Transfer];

    /// Capability bit a family must expose to serve this role
    pub fn flag(self) -> vk::QueueFlags {
        match self {
            QueueRole::Graphics => vk::QueueFlags::GRAPHICS,
            QueueRole::Compute => vk::QueueFlags::COMPUTE,
            QueueRole::Transfer => vk::QueueFlags::TRANSFER,
        }
    }
}

/// Information about queues
#[derive(Debug, Clone, PartialEq)]
pub struct QueueInfo {
    /// Index to the family queue
    pub family_index: u32,
    /// Queue's index in the family
    pub index: u32,
    /// Role the queue was requested for
    pub role: QueueRole,
    pub priority: f32,
}

/// Represents a [`vk::Queue`] and it's indices
///
/// # Hashing
/// When hashing, the hasher will only hash the index and family index
#[derive(Debug, Clone)]
pub struct Queue {
    handle: vk::Queue,
    info: QueueInfo,
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        self.info.family_index == other.info.family_index && self.info.index == other.info.index
    }
}
impl Eq for Queue {}
impl Hash for Queue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.family_index.hash(state);
        self.info.index.hash(state);
    }
}

impl Queue {
    pub fn new(handle: vk::Queue, info: QueueInfo) -> Self {
        Self { handle, info }
    }

    pub fn handle(&self) -> vk::Queue {
        self.handle
    }

    pub fn get_index(&self) -> u32 {
        self.info.index
    }

    pub fn get_family_index(&self) -> u32 {
        self.info.family_index
    }

    pub fn get_role(&self) -> QueueRole {
        self.info.role
    }

    pub fn get_priority(&self) -> f32 {
        self.info.priority
    }

    pub fn info(&self) -> &QueueInfo {
        &self.info
    }
}
