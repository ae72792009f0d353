use std::fmt;

/// Where an [`Engine`](crate::core::Engine) is in its lifetime.
///
/// States only ever move forward, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleState {
    Unstarted,
    InstanceCreated,
    DeviceSelected,
    LogicalDeviceReady,
    SwapchainReady,
    Running,
    TornDown,
}

impl LifecycleState {
    /// State reached from this one by the next forward transition
    pub fn next(self) -> Option<Self> {
        use LifecycleState::*;
        match self {
            Unstarted => Some(InstanceCreated),
            InstanceCreated => Some(DeviceSelected),
            DeviceSelected => Some(LogicalDeviceReady),
            LogicalDeviceReady => Some(SwapchainReady),
            SwapchainReady => Some(Running),
            Running => Some(TornDown),
            TornDown => None,
        }
    }

    /// Only the next state may follow, except teardown which can end any earlier state
    pub fn can_advance_to(self, to: Self) -> bool {
        self.next() == Some(to) || (to == LifecycleState::TornDown && self != to)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
