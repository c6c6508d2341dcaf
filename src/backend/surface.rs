// Window surface
//
// The surface ties the instance to our window. Device selection and swapchain
// negotiation both ask questions about it, so the driver-backed DeviceProbe
// lives here too.

use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::CStr;

use super::error::{BringUpError, Stage};
use super::instance::fixed_name;
use super::release::ReleaseStack;
use super::selection::{DeviceProbe, SwapchainSupport};

pub struct Surface {
    pub surface: vk::SurfaceKHR,
    pub loader: ash::extensions::khr::Surface,
}

impl Surface {
    pub fn new(
        entry: &Entry,
        instance: &ash::Instance,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        releases: &mut ReleaseStack,
    ) -> Result<Self, BringUpError> {
        let surface = unsafe {
            ash_window::create_surface(entry, instance, display_handle, window_handle, None)
        }
        .map_err(BringUpError::creation(Stage::Surface))?;

        let loader = ash::extensions::khr::Surface::new(entry, instance);

        let owner = loader.clone();
        releases.push(Stage::Surface, move || unsafe {
            owner.destroy_surface(surface, None);
        });

        Ok(Self { surface, loader })
    }

    /// Fresh capability snapshot; each list is sized by its own query
    pub fn swapchain_support(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<SwapchainSupport, BringUpError> {
        unsafe {
            Ok(SwapchainSupport {
                capabilities: self
                    .loader
                    .get_physical_device_surface_capabilities(physical_device, self.surface)
                    .map_err(BringUpError::query("surface capabilities"))?,
                formats: self
                    .loader
                    .get_physical_device_surface_formats(physical_device, self.surface)
                    .map_err(BringUpError::query("surface formats"))?,
                present_modes: self
                    .loader
                    .get_physical_device_surface_present_modes(physical_device, self.surface)
                    .map_err(BringUpError::query("surface present modes"))?,
            })
        }
    }
}

/// DeviceProbe backed by the driver, asking about one surface
pub struct SurfaceProbe<'a> {
    pub instance: &'a ash::Instance,
    pub surface: &'a Surface,
}

impl SurfaceProbe<'_> {
    pub fn enumerate(&self) -> Result<Vec<vk::PhysicalDevice>, BringUpError> {
        unsafe { self.instance.enumerate_physical_devices() }
            .map_err(BringUpError::query("physical devices"))
    }

    pub fn device_name(&self, device: vk::PhysicalDevice) -> String {
        let properties = unsafe { self.instance.get_physical_device_properties(device) };
        unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

impl DeviceProbe for SurfaceProbe<'_> {
    type Device = vk::PhysicalDevice;

    fn device_type(&self, device: vk::PhysicalDevice) -> vk::PhysicalDeviceType {
        unsafe { self.instance.get_physical_device_properties(device) }.device_type
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .get_physical_device_queue_family_properties(device)
        }
    }

    fn supports_present(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
    ) -> Result<bool, BringUpError> {
        unsafe {
            self.surface.loader.get_physical_device_surface_support(
                device,
                family,
                self.surface.surface,
            )
        }
        .map_err(BringUpError::query("surface support"))
    }

    fn extensions(&self, device: vk::PhysicalDevice) -> Result<Vec<String>, BringUpError> {
        let extensions = unsafe { self.instance.enumerate_device_extension_properties(device) }
            .map_err(BringUpError::query("device extensions"))?;

        Ok(extensions
            .iter()
            .map(|extension| fixed_name(&extension.extension_name))
            .collect())
    }

    fn swapchain_support(
        &self,
        device: vk::PhysicalDevice,
    ) -> Result<SwapchainSupport, BringUpError> {
        self.surface.swapchain_support(device)
    }
}
