// Vulkan context - the bring-up driver
//
// Runs every stage in dependency order:
//   instance -> debug messenger -> surface -> physical device
//   -> logical device + queues -> swapchain -> image views
//
// Each stage registers its destructor on one ReleaseStack. If a stage fails,
// the stack is dropped with the error and tears down what already exists;
// on normal shutdown the context drops it after the device goes idle.

use ash::{vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use winit::window::Window;

use super::device::LogicalDevice;
use super::error::BringUpError;
use super::instance;
use super::release::ReleaseStack;
use super::selection::{self, DeviceRequirements, QueueFamilies};
use super::surface::{Surface, SurfaceProbe};
use super::swapchain::{Swapchain, SwapchainPlan};
use crate::config::Config;

/// Owns every GPU-facing handle of the application
pub struct VulkanContext {
    // Its destructors call into the library held by `_entry`
    releases: ReleaseStack,

    pub swapchain: Swapchain,
    pub device: LogicalDevice,
    pub queue_families: QueueFamilies,
    pub physical_device: vk::PhysicalDevice,
    pub surface: Surface,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    pub instance: ash::Instance,
    _entry: Entry,
}

impl VulkanContext {
    pub fn new(config: &Config, window: &Window) -> Result<Self, BringUpError> {
        log::info!("Initializing Vulkan...");

        let enable_validation = config.validation_enabled();

        // Loaded before the stack exists so an early return drops the stack first
        let entry = unsafe { Entry::load() }?;
        let mut releases = ReleaseStack::new();

        // STEP 1: Instance (validation layers checked first)
        let extensions =
            instance::required_instance_extensions(window.raw_display_handle(), enable_validation)?;
        let instance =
            instance::create_instance(&entry, config, &extensions, enable_validation, &mut releases)?;

        // STEP 2: Debug messenger
        let debug_messenger = if enable_validation {
            Some(instance::setup_debug_messenger(&entry, &instance, &mut releases)?)
        } else {
            None
        };

        // STEP 3: Surface
        let surface = Surface::new(
            &entry,
            &instance,
            window.raw_display_handle(),
            window.raw_window_handle(),
            &mut releases,
        )?;

        // STEP 4: Physical device
        let requirements = DeviceRequirements {
            extensions: config.device.extensions.clone(),
            require_discrete_gpu: config.device.require_discrete_gpu,
        };
        let probe = SurfaceProbe {
            instance: &instance,
            surface: &surface,
        };
        let candidates = probe.enumerate()?;
        let selected = selection::pick_physical_device(&probe, &candidates, &requirements)?;
        log_selected_device(&probe, selected.device);

        // STEP 5: Logical device + queues
        let device = LogicalDevice::new(
            &instance,
            selected.device,
            selected.queue_families,
            &requirements.extensions,
            &mut releases,
        )?;

        // STEP 6: Swapchain + image views
        let size = window.inner_size();
        let support = surface.swapchain_support(selected.device)?;
        let plan = SwapchainPlan::negotiate(
            &support,
            (size.width, size.height),
            selected.queue_families,
            config.preferred_present_mode(),
        )
        .ok_or(BringUpError::NoSuitableDevice)?;
        let swapchain = Swapchain::new(
            &instance,
            &device.device,
            surface.surface,
            &plan,
            &mut releases,
        )?;

        // The graphics pipeline is not built yet

        log::info!("Vulkan initialized successfully! ({} objects)", releases.len());
        log::debug!("Release stages, oldest first: {:?}", releases.stages());

        Ok(Self {
            releases,
            swapchain,
            device,
            queue_families: selected.queue_families,
            physical_device: selected.device,
            surface,
            debug_messenger,
            instance,
            _entry: entry,
        })
    }
}

fn log_selected_device(probe: &SurfaceProbe<'_>, device: vk::PhysicalDevice) {
    let properties = unsafe { probe.instance.get_physical_device_properties(device) };
    log::info!("Selected GPU: {}", probe.device_name(device));
    log::info!(
        "API Version: {}.{}.{}",
        vk::api_version_major(properties.api_version),
        vk::api_version_minor(properties.api_version),
        vk::api_version_patch(properties.api_version)
    );
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan context...");

        // Nothing is in flight, but never destroy under the GPU's feet
        if let Err(e) = self.device.wait_idle() {
            log::warn!("device_wait_idle failed during shutdown: {}", e);
        }

        // Image views -> swapchain -> device -> surface -> messenger -> instance
        self.releases.release_all();
        debug_assert!(self.releases.is_empty());

        log::info!("Cleanup complete");
    }
}
