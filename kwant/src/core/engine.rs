use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::bootstrap::{
    find_present_family, DedicatedFirstPlanner, DeviceScorer, EngineSettings, InstanceBuilder,
    PhysicalDeviceSelector, QueueFamilyPlanner, QueueRequest, QueueRequestBuilder,
    ResourceRequestLedger, SelectedDevice, SwapchainNegotiator, SWAPCHAIN_EXTENSION,
};
use crate::concurrency::Slot;
use crate::core::LifecycleState;
use crate::device::{DeviceCandidate, LogicalDevice, Queue, QueueRole};
use crate::driver::{DeviceDescriptor, Driver};
use crate::error::TeardownFailure;
use crate::pipelines::GraphicsPipelineBuilder;
use crate::shader::{FsShaderLoader, ShaderBuilder, ShaderLoader};
use crate::wsi::{SwapchainDescriptor, WindowSystem};
use crate::KwantError;

/// Owns the instance, device, surface and swapchain, creates them in order and tears them
/// down in reverse.
///
/// Each creation step publishes its result through a [`Slot`], deferred builders made from
/// [`shader`](Engine::shader) and [`pipeline`](Engine::pipeline) resolve once the logical
/// device slot is filled.
pub struct Engine<W: WindowSystem> {
    settings: EngineSettings,
    driver: Arc<dyn Driver>,
    window: W,
    selector: PhysicalDeviceSelector,
    planner: Box<dyn QueueFamilyPlanner>,
    shader_loader: Box<dyn ShaderLoader>,
    ledger: ResourceRequestLedger,
    state: LifecycleState,

    /// Set while `start` may have left a window behind
    window_created: bool,
    surface: Option<vk::SurfaceKHR>,
    /// Kept even when `start` fails after device creation, so `cleanup` can destroy it
    logical_device: Option<LogicalDevice>,
    swapchain: Option<SwapchainDescriptor>,

    instance_ready: Slot<vk::Instance>,
    physical_device_ready: Slot<SelectedDevice>,
    device_ready: Slot<LogicalDevice>,
    swapchain_ready: Slot<SwapchainDescriptor>,
    on_cleanup: Slot<vk::Instance>,
}

impl<W: WindowSystem> std::fmt::Debug for Engine<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("selector", &self.selector)
            .field("ledger", &self.ledger)
            .field("logical_device", &self.logical_device)
            .field("swapchain", &self.swapchain)
            .finish()
    }
}

impl<W: WindowSystem> Engine<W> {
    pub fn new(settings: EngineSettings, driver: Arc<dyn Driver>, window: W) -> Self {
        Self {
            settings,
            driver,
            window,
            selector: PhysicalDeviceSelector::default(),
            planner: Box::new(DedicatedFirstPlanner),
            shader_loader: Box::new(FsShaderLoader::new()),
            ledger: ResourceRequestLedger::new(),
            state: LifecycleState::Unstarted,
            window_created: false,
            surface: None,
            logical_device: None,
            swapchain: None,
            instance_ready: Slot::new(),
            physical_device_ready: Slot::new(),
            device_ready: Slot::new(),
            swapchain_ready: Slot::new(),
            on_cleanup: Slot::new(),
        }
    }

    pub fn with_scorer<S: DeviceScorer + 'static>(mut self, scorer: S) -> Self {
        self.selector = PhysicalDeviceSelector::new(scorer);
        self
    }

    pub fn with_planner<P: QueueFamilyPlanner + 'static>(mut self, planner: P) -> Self {
        self.planner = Box::new(planner);
        self
    }

    pub fn with_shader_loader<L: ShaderLoader + 'static>(mut self, loader: L) -> Self {
        self.shader_loader = Box::new(loader);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn instance_ready(&self) -> Slot<vk::Instance> {
        self.instance_ready.clone()
    }

    pub fn physical_device_ready(&self) -> Slot<SelectedDevice> {
        self.physical_device_ready.clone()
    }

    pub fn device_ready(&self) -> Slot<LogicalDevice> {
        self.device_ready.clone()
    }

    pub fn swapchain_ready(&self) -> Slot<SwapchainDescriptor> {
        self.swapchain_ready.clone()
    }

    /// Filled with the instance when [`cleanup`](Engine::cleanup) begins, before anything
    /// is destroyed
    pub fn on_cleanup(&self) -> Slot<vk::Instance> {
        self.on_cleanup.clone()
    }

    /// Requests a queue, which is created together with the logical device
    pub fn queue(&mut self, role: QueueRole) -> QueueRequestBuilder<'_> {
        QueueRequestBuilder::new(&mut self.ledger, role)
    }

    /// Reads the SPIR-V at `path` through the configured loader
    pub fn shader(&self, path: impl AsRef<Path>) -> crate::Result<ShaderBuilder> {
        ShaderBuilder::load(
            self.device_ready.downgrade(),
            self.shader_loader.as_ref(),
            path,
        )
    }

    pub fn pipeline(&self) -> GraphicsPipelineBuilder {
        GraphicsPipelineBuilder::new(self.device_ready.downgrade())
    }

    fn expect_state(&self, expected: LifecycleState) -> crate::Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(KwantError::InvalidState {
                expected,
                found: self.state,
            })
        }
    }

    fn advance(&mut self, to: LifecycleState) -> crate::Result<()> {
        if !self.state.can_advance_to(to) {
            return Err(KwantError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::info!("Engine {} -> {}", self.state, to);
        self.state = to;
        Ok(())
    }

    /// Creates everything up to and including the swapchain.
    ///
    /// On failure the engine stays in the last state it reached, whatever was created so far
    /// is destroyed by [`cleanup`](Engine::cleanup).
    pub fn start(&mut self) -> crate::Result<()> {
        self.expect_state(LifecycleState::Unstarted)?;
        let instance = self.create_instance()?;
        let selected = self.select_device(instance)?;
        let present_queue = self.create_device(&selected)?;
        self.create_swapchain(&selected, present_queue)?;
        Ok(())
    }

    fn create_instance(&mut self) -> crate::Result<vk::Instance> {
        let window_extensions = self.window.required_instance_extensions()?;
        let descriptor = InstanceBuilder::new(&self.settings)
            .window_extensions(window_extensions)
            .build(self.driver.as_ref())?;
        let instance = self.driver.create_instance(&descriptor)?;
        #[cfg(feature = "log-lifetimes")]
        tracing::trace!("Creating VkInstance {:?}", instance);
        self.advance(LifecycleState::InstanceCreated)?;
        self.instance_ready.fill(instance)?;
        Ok(instance)
    }

    fn select_device(&mut self, instance: vk::Instance) -> crate::Result<SelectedDevice> {
        self.window.create_window(&self.settings.window)?;
        self.window_created = true;
        let surface = self.window.create_surface(self.driver.as_ref(), instance)?;
        self.surface = Some(surface);

        let candidates = self
            .driver
            .enumerate_physical_devices(instance)?
            .into_iter()
            .map(|handle| DeviceCandidate::query(self.driver.as_ref(), handle))
            .collect::<crate::Result<Vec<DeviceCandidate>>>()?;
        let candidate = self.selector.pick(candidates)?;
        let plan = self.planner.plan(&candidate.queue_families);
        tracing::debug!("Queue family plan for {}: {plan:?}", candidate.properties.name);

        let present_family = match find_present_family(
            self.driver.as_ref(),
            candidate.handle,
            &candidate.queue_families,
            surface,
        )? {
            Some(family) => family,
            None if self.settings.present_fallback => {
                tracing::warn!("No queue family reports surface support, presenting from family 0");
                0
            }
            None => return Err(KwantError::NoPresentQueue),
        };
        let selected = SelectedDevice::new(candidate, plan, present_family);
        tracing::info!("Selected physical device {}", selected.name);
        self.advance(LifecycleState::DeviceSelected)?;
        self.physical_device_ready.fill(selected.clone())?;
        Ok(selected)
    }

    fn device_extensions(&self, selected: &SelectedDevice) -> crate::Result<Vec<String>> {
        let mut extensions: Vec<String> = Vec::new();
        for name in self.settings.device_extensions.iter() {
            if !selected.extensions.contains(name) {
                return Err(KwantError::MissingExtension(name.clone()));
            }
            if !extensions.contains(name) {
                extensions.push(name.clone());
            }
        }
        if !extensions.iter().any(|name| name == SWAPCHAIN_EXTENSION) {
            extensions.push(SWAPCHAIN_EXTENSION.to_string());
        }
        Ok(extensions)
    }

    /// Returns the present queue
    fn create_device(&mut self, selected: &SelectedDevice) -> crate::Result<Queue> {
        let extensions = self.device_extensions(selected)?;
        // Presenting shares a queue already placed in the present family
        let present_slot = match self.ledger.first_in_family(selected, selected.present_family) {
            Some(slot) => slot,
            None => self
                .ledger
                .submit(QueueRequest::new(QueueRole::Graphics).family(selected.present_family)),
        };
        let compacted = self.ledger.compact(selected)?;

        let handle = self.driver.create_device(
            selected.handle,
            &DeviceDescriptor {
                queues: compacted.queue_create_descriptors(),
                extensions,
                features: self.settings.device_features,
                dynamic_rendering: self.settings.dynamic_rendering,
            },
        )?;
        #[cfg(feature = "log-lifetimes")]
        tracing::trace!("Creating VkDevice {:?}", handle);
        let device = LogicalDevice::new(handle, selected.clone(), self.driver.clone());
        self.logical_device = Some(device.clone());

        let driver = self.driver.clone();
        let queues = compacted.resolve(|family_index, index| {
            driver.device_queue(handle, family_index, index)
        })?;
        tracing::debug!("Created {} queue(s)", queues.len());
        let present_queue = present_slot.get_blocking().as_ref().clone();

        self.advance(LifecycleState::LogicalDeviceReady)?;
        self.device_ready.fill(device)?;
        Ok(present_queue)
    }

    fn create_swapchain(
        &mut self,
        selected: &SelectedDevice,
        present_queue: Queue,
    ) -> crate::Result<()> {
        let surface = self
            .surface
            .ok_or(KwantError::InvalidHandle("VkSurfaceKHR"))?;
        let device = self
            .logical_device
            .clone()
            .ok_or(KwantError::InvalidHandle("VkDevice"))?;
        let details = self.driver.surface_details(selected.handle, surface)?;
        let plan = SwapchainNegotiator::from_settings(
            &self.settings.graphics,
            self.window.framebuffer_size(),
        )
        .negotiate(&details)?;
        tracing::debug!("Swapchain plan: {plan:?}");
        let swapchain = SwapchainDescriptor::new(&device, surface, &plan, present_queue)?;
        self.swapchain = Some(swapchain.clone());
        self.advance(LifecycleState::SwapchainReady)?;
        self.swapchain_ready.fill(swapchain)?;
        Ok(())
    }

    /// Pumps window events until the window asks to close
    pub fn run(&mut self) -> crate::Result<()> {
        self.expect_state(LifecycleState::SwapchainReady)?;
        self.advance(LifecycleState::Running)?;
        loop {
            self.window.poll_events()?;
            if self.window.should_close() {
                tracing::info!("Window requested close");
                return Ok(());
            }
        }
    }

    /// Destroys everything that was created, newest first.
    ///
    /// Every destroy is attempted even if an earlier one failed, the failures are returned
    /// together as [`KwantError::Teardown`]. Calling this again after it ran does nothing.
    pub fn cleanup(&mut self) -> crate::Result<()> {
        if self.state == LifecycleState::TornDown {
            return Ok(());
        }
        let instance = self.instance_ready.get().map(|instance| *instance);
        if let Some(instance) = instance {
            if !self.on_cleanup.is_filled() {
                self.on_cleanup.fill(instance)?;
            }
        }

        let mut failures: Vec<TeardownFailure> = Vec::new();
        if let Some(device) = self.logical_device.take() {
            if let Some(swapchain) = self.swapchain.take() {
                failures.extend(swapchain.destroy(&device));
            }
            failures.extend(device.destroy_children());
            #[cfg(feature = "log-lifetimes")]
            tracing::trace!("Destroying VkDevice {:?}", device.handle());
            record(&mut failures, "VkDevice", self.driver.destroy_device(device.handle()));
        }
        if let (Some(surface), Some(instance)) = (self.surface.take(), instance) {
            record(
                &mut failures,
                "VkSurfaceKHR",
                self.driver.destroy_surface(instance, surface),
            );
        }
        if self.window_created {
            self.window.destroy_window();
            self.window_created = false;
        }
        if let Some(instance) = instance {
            #[cfg(feature = "log-lifetimes")]
            tracing::trace!("Destroying VkInstance {:?}", instance);
            record(&mut failures, "VkInstance", self.driver.destroy_instance(instance));
        }

        self.advance(LifecycleState::TornDown)?;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(KwantError::Teardown(failures))
        }
    }
}

fn record(failures: &mut Vec<TeardownFailure>, object: &str, result: crate::Result<()>) {
    if let Err(error) = result {
        tracing::error!("Failed to destroy {object}: {error}");
        failures.push(TeardownFailure {
            object: object.to_string(),
            error,
        });
    }
}

impl<W: WindowSystem> Drop for Engine<W> {
    fn drop(&mut self) {
        if self.state == LifecycleState::TornDown {
            return;
        }
        if let Err(error) = self.cleanup() {
            tracing::error!("Cleanup on drop failed: {error}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bootstrap::EngineSettings;
    use crate::util::tests::{MockDriver, MockWindowSystem};

    fn mock_engine(driver: Arc<MockDriver>) -> Engine<MockWindowSystem> {
        let window = MockWindowSystem::new(driver.call_log());
        Engine::new(EngineSettings::default(), driver, window)
    }

    #[test]
    fn start_publishes_every_stage() {
        let driver = Arc::new(MockDriver::default());
        let mut engine = mock_engine(driver.clone());
        let instance = engine.instance_ready();
        let physical = engine.physical_device_ready();
        let device = engine.device_ready();
        let swapchain = engine.swapchain_ready();
        engine.start().unwrap();
        assert_eq!(engine.state(), LifecycleState::SwapchainReady);
        assert!(instance.is_filled() && physical.is_filled() && device.is_filled());
        let swapchain = swapchain.get().unwrap();
        assert_eq!(swapchain.images().len(), swapchain.image_views().len());
        assert_eq!(swapchain.present_queue().get_role(), QueueRole::Graphics);
        engine.cleanup().unwrap();
        assert_eq!(driver.live_devices(), 0);
    }

    #[test]
    fn run_requires_start() {
        let driver = Arc::new(MockDriver::default());
        let mut engine = mock_engine(driver);
        assert_eq!(
            engine.run().unwrap_err(),
            KwantError::InvalidState {
                expected: LifecycleState::SwapchainReady,
                found: LifecycleState::Unstarted,
            }
        );
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(KwantError::InvalidState { .. })));
        engine.run().unwrap();
        assert_eq!(engine.state(), LifecycleState::Running);
        assert_eq!(engine.window().polls(), 1);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let driver = Arc::new(MockDriver::default());
        let mut engine = mock_engine(driver.clone());
        engine.start().unwrap();
        engine.cleanup().unwrap();
        engine.cleanup().unwrap();
        assert_eq!(driver.count_calls("vkDestroyInstance"), 1);
        assert_eq!(engine.state(), LifecycleState::TornDown);
    }

    #[test]
    fn drop_cleans_up() {
        let driver = Arc::new(MockDriver::default());
        {
            let mut engine = mock_engine(driver.clone());
            engine.start().unwrap();
        }
        assert_eq!(driver.count_calls("vkDestroyDevice"), 1);
        assert_eq!(driver.count_calls("vkDestroyInstance"), 1);
    }

    #[test]
    fn advance_rejects_skipped_states() {
        let driver = Arc::new(MockDriver::default());
        let mut engine = mock_engine(driver);
        assert_eq!(
            engine.advance(LifecycleState::Running).unwrap_err(),
            KwantError::InvalidTransition {
                from: LifecycleState::Unstarted,
                to: LifecycleState::Running,
            }
        );
        assert_eq!(engine.state(), LifecycleState::Unstarted);
        engine.advance(LifecycleState::InstanceCreated).unwrap();
        engine.advance(LifecycleState::TornDown).unwrap();
        assert!(engine.advance(LifecycleState::TornDown).is_err());
    }

    #[test]
    fn cleanup_of_unstarted_engine_touches_nothing() {
        let driver = Arc::new(MockDriver::default());
        let mut engine = mock_engine(driver.clone());
        engine.cleanup().unwrap();
        assert!(driver.calls().is_empty());
    }
}
