// =============================================================================
// HELLO TRIANGLE - Vulkan bring-up
// =============================================================================
//
// Opens a window and brings Vulkan up to the point where a graphics pipeline
// could be built:
//
//   window -> instance (+ validation) -> surface -> physical device
//          -> logical device + queues -> swapchain -> image views
//
// No frames are rendered. The event loop only waits for the window to close,
// then everything is torn down in reverse order.
//
// =============================================================================

mod backend;
mod config;

use anyhow::Result;
use backend::instance::VALIDATION_TARGET;
use backend::{BringUpError, VulkanContext};
use config::Config;
use log::LevelFilter;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml; reported once the logger is up
    let (config, source) = Config::load();

    init_logging(&config);
    source.report();
    log::debug!("Config: {:?}", config);
    log::info!("Starting {}", config.window.title);
    log::info!(
        "Window: {}x{} (validation {})",
        config.window.width,
        config.window.height,
        if config.validation_enabled() { "on" } else { "off" }
    );

    let event_loop = EventLoop::new()?;
    // Block until the next event; there is no frame loop
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // A failed bring-up ends the loop early; report it as the exit status
    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initialize logging. env_logger writes to stderr.
fn init_logging(config: &Config) {
    let mut builder = logger_builder(config);
    // RUST_LOG still wins where it is set
    builder.parse_default_env();
    builder.init();

    if config.log_level().is_none() {
        log::warn!("Unknown log level '{}', using info", config.debug.log_level);
    }
}

/// Filters from the config alone, before RUST_LOG is applied
fn logger_builder(config: &Config) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.log_level().unwrap_or(LevelFilter::Info));
    // Validation layer output goes to stderr whatever its severity
    builder.filter_module(VALIDATION_TARGET, LevelFilter::Trace);
    builder
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Top-level application object.
///
/// IMPORTANT: Field order matters for Drop! The Vulkan context holds a
/// surface bound to the window, so it must go first.
struct App {
    config: Config,
    vulkan: Option<VulkanContext>,
    window: Option<Window>,
    /// Why the event loop stopped early, if it did
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            vulkan: None,
            window: None,
            failure: None,
        }
    }

    fn init_vulkan(&mut self, window: &Window) -> Result<(), BringUpError> {
        let vulkan = VulkanContext::new(&self.config, window)?;

        log::info!(
            "Swapchain ready: {} images, {}x{}, {:?}, {:?}",
            vulkan.swapchain.images.len(),
            vulkan.swapchain.extent.width,
            vulkan.swapchain.extent.height,
            vulkan.swapchain.format,
            vulkan.swapchain.present_mode,
        );
        log::debug!(
            "Queues: graphics {:?} (family {}), present {:?} (family {}); debug messenger {}",
            vulkan.device.graphics_queue,
            vulkan.queue_families.graphics,
            vulkan.device.present_queue,
            vulkan.queue_families.present,
            if vulkan.debug_messenger.is_some() { "installed" } else { "absent" }
        );
        log::debug!(
            "Handles: instance {:?}, physical device {:?}, surface {:?}, swapchain {:?} ({} views)",
            vulkan.instance.handle(),
            vulkan.physical_device,
            vulkan.surface.surface,
            vulkan.swapchain.swapchain,
            vulkan.swapchain.image_views.len(),
        );

        self.vulkan = Some(vulkan);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.failure = Some(error);
        event_loop.exit();
    }

    /// Tear down in reverse order: Vulkan first, then the window
    fn shutdown(&mut self) {
        self.vulkan = None;
        self.window = None;
    }
}

/// Logged once by `App::fail`, then returned from `main`
fn bring_up_failure(error: BringUpError) -> anyhow::Error {
    let kind = error.kind();
    anyhow::Error::new(error).context(format!("Failed to initialize Vulkan ({:?})", kind))
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                self.fail(event_loop, anyhow::anyhow!("Failed to create window: {}", e));
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            self.fail(event_loop, bring_up_failure(e));
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if let WindowEvent::CloseRequested = event {
            log::info!("Close requested, shutting down...");
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
