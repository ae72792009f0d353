use std::ffi::NulError;
use std::fmt;
use std::path::PathBuf;
use std::sync::PoisonError;

use ash::vk;
/// Possible errors
use thiserror::Error;

use crate::device::QueueRole;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KwantError {
    #[error("No suitable physical device has been found")]
    NoSuitableDevice,

    #[error("No queue family supports {0:?} and no family override was given")]
    UnsupportedQueueRole(QueueRole),

    #[error("Required extension {0} is not available")]
    MissingExtension(String),

    #[error("{operation} failed with {code}")]
    NativeCallFailed { operation: String, code: vk::Result },

    #[error("Slot has already been filled")]
    DoubleAssignment,

    #[error("File {0:?} does not exist")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path:?}: {message}")]
    IoFailure { path: PathBuf, message: String },

    #[error("Queue family {family_index} has {available} queues, {requested} requested")]
    ImpossibleQueue {
        family_index: u32,
        requested: u32,
        available: u32,
    },

    #[error("Queue family {0} does not exist on the selected device")]
    InvalidQueueFamily(u32),

    #[error("No queue family can present to the surface")]
    NoPresentQueue,

    #[error("Surface reports no formats")]
    NoSurfaceFormat,

    #[error("Expected engine to be {expected:?}, found {found:?}")]
    InvalidState {
        expected: crate::core::LifecycleState,
        found: crate::core::LifecycleState,
    },

    #[error("Engine cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::core::LifecycleState,
        to: crate::core::LifecycleState,
    },

    #[error("Unknown {0} handle")]
    InvalidHandle(&'static str),

    #[error("Window system error: {0}")]
    Window(String),

    #[error("Poisoned mutex")]
    PoisonError,

    #[error("String contains null byte")]
    StringContainsNull,

    #[error("Teardown finished with {} failure(s)", .0.len())]
    Teardown(Vec<TeardownFailure>),
}

/// A destroy call which failed during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// What was being destroyed
    pub object: String,
    pub error: KwantError,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.object, self.error)
    }
}

impl<T> From<PoisonError<T>> for KwantError {
    fn from(_: PoisonError<T>) -> Self {
        KwantError::PoisonError
    }
}

impl From<NulError> for KwantError {
    fn from(_: NulError) -> Self {
        KwantError::StringContainsNull
    }
}

impl KwantError {
    pub fn native(operation: impl Into<String>, code: vk::Result) -> Self {
        KwantError::NativeCallFailed {
            operation: operation.into(),
            code,
        }
    }
}

pub type Result<T> = std::result::Result<T, KwantError>;

/// Attaches the name of the native entry point to a [`vk::Result`] failure
pub trait VkResultExt<T> {
    fn native(self, operation: &str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    fn native(self, operation: &str) -> Result<T> {
        self.map_err(|code| KwantError::native(operation, code))
    }
}
