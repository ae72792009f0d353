use std::time::Duration;

use glam::UVec2;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::monitor::MonitorHandle;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowId};

use crate::bootstrap::{MonitorSelection, WindowMode, WindowSettings};
use crate::util::wrap_c_str;
use crate::wsi::WindowSystem;
use crate::KwantError;

/// Number of pumps to wait for the platform to hand out the window
const CREATE_ATTEMPTS: usize = 64;
/// How long a poll may wait for events, keeps the run loop from spinning
const POLL_TIMEOUT: Duration = Duration::from_millis(4);

fn window_error(error: impl std::fmt::Display) -> KwantError {
    KwantError::Window(error.to_string())
}

#[derive(Default)]
struct WinitState {
    pending: Option<WindowSettings>,
    window: Option<Window>,
    close_requested: bool,
    error: Option<String>,
}

impl WinitState {
    fn monitor(event_loop: &ActiveEventLoop, selection: MonitorSelection) -> Option<MonitorHandle> {
        match selection {
            MonitorSelection::Primary => event_loop
                .primary_monitor()
                .or_else(|| event_loop.available_monitors().next()),
            MonitorSelection::Index(index) => event_loop.available_monitors().nth(index),
        }
    }

    fn fullscreen(event_loop: &ActiveEventLoop, settings: &WindowSettings) -> Option<Fullscreen> {
        match settings.mode {
            WindowMode::Normal => None,
            WindowMode::BorderlessFullscreen => {
                Some(Fullscreen::Borderless(Self::monitor(event_loop, settings.monitor)))
            }
            WindowMode::TrueFullscreen => {
                let monitor = Self::monitor(event_loop, settings.monitor)?;
                // Largest mode, highest refresh rate among equals
                let mode = monitor.video_modes().max_by_key(|mode| {
                    let size = mode.size();
                    (size.width as u64 * size.height as u64, mode.refresh_rate_millihertz())
                });
                match mode {
                    Some(mode) => Some(Fullscreen::Exclusive(mode)),
                    None => {
                        tracing::warn!("Monitor has no video modes, using borderless");
                        Some(Fullscreen::Borderless(Some(monitor)))
                    }
                }
            }
        }
    }
}

impl ApplicationHandler for WinitState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(settings) = self.pending.take() else {
            return;
        };
        let attributes = Window::default_attributes()
            .with_title(settings.title.clone())
            .with_inner_size(PhysicalSize::new(settings.size.x, settings.size.y))
            .with_resizable(settings.resizable)
            .with_fullscreen(Self::fullscreen(event_loop, &settings));
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(window),
            Err(error) => self.error = Some(error.to_string()),
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::Resized(size) => {
                tracing::debug!("Window resized to {}x{}", size.width, size.height);
            }
            _ => {}
        }
    }
}

/// [`WindowSystem`] backed by a winit event loop which is pumped instead of run
pub struct WinitWindowSystem {
    event_loop: EventLoop<()>,
    state: WinitState,
}

impl std::fmt::Debug for WinitWindowSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WinitWindowSystem")
            .field("window", &self.state.window.as_ref().map(Window::id))
            .field("close_requested", &self.state.close_requested)
            .finish()
    }
}

impl WinitWindowSystem {
    /// Must be called on the main thread
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            event_loop: EventLoop::new().map_err(window_error)?,
            state: WinitState::default(),
        })
    }

    pub fn window(&self) -> Option<&Window> {
        self.state.window.as_ref()
    }

    fn pump(&mut self, timeout: Duration) -> crate::Result<()> {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.state)
        {
            tracing::debug!("Event loop exited with {code}");
            self.state.close_requested = true;
        }
        match self.state.error.take() {
            Some(error) => Err(KwantError::Window(error)),
            None => Ok(()),
        }
    }
}

impl WindowSystem for WinitWindowSystem {
    fn required_instance_extensions(&self) -> crate::Result<Vec<String>> {
        let display = self.event_loop.display_handle().map_err(window_error)?;
        let extensions = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(|code| KwantError::native("vkEnumerateInstanceExtensionProperties", code))?;
        Ok(extensions.iter().map(|name| wrap_c_str(*name)).collect())
    }

    fn create_window(&mut self, settings: &WindowSettings) -> crate::Result<()> {
        self.state.pending = Some(settings.clone());
        for _ in 0..CREATE_ATTEMPTS {
            self.pump(Duration::ZERO)?;
            if self.state.window.is_some() {
                tracing::info!("Created window \"{}\"", settings.title);
                return Ok(());
            }
        }
        self.state.pending = None;
        Err(KwantError::Window("the platform never resumed the application".to_string()))
    }

    fn raw_handles(&self) -> crate::Result<(RawDisplayHandle, RawWindowHandle)> {
        let window = self
            .state
            .window
            .as_ref()
            .ok_or_else(|| KwantError::Window("no window has been created".to_string()))?;
        Ok((
            window.display_handle().map_err(window_error)?.as_raw(),
            window.window_handle().map_err(window_error)?.as_raw(),
        ))
    }

    fn framebuffer_size(&self) -> UVec2 {
        self.state
            .window
            .as_ref()
            .map(|window| {
                let size = window.inner_size();
                UVec2::new(size.width, size.height)
            })
            .unwrap_or(UVec2::ZERO)
    }

    fn poll_events(&mut self) -> crate::Result<()> {
        self.pump(POLL_TIMEOUT)
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn destroy_window(&mut self) {
        if self.state.window.take().is_some() {
            tracing::debug!("Destroyed window");
        }
    }
}
