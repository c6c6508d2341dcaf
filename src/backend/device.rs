// Logical device - command submission endpoints
//
// One queue per distinct family we need (graphics, present), all at the
// same priority. When both roles share a family they share the queue.

use ash::vk;
use std::ffi::{c_char, CString};

use super::error::{BringUpError, Stage};
use super::release::ReleaseStack;
use super::selection::QueueFamilies;

const QUEUE_PRIORITIES: [f32; 1] = [1.0];

pub struct LogicalDevice {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

/// One create-info per distinct family
pub fn queue_create_infos(families: QueueFamilies) -> Vec<vk::DeviceQueueCreateInfo> {
    families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

impl LogicalDevice {
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        families: QueueFamilies,
        extensions: &[String],
        releases: &mut ReleaseStack,
    ) -> Result<Self, BringUpError> {
        let queue_infos = queue_create_infos(families);

        // Selection already matched these names against the driver's list
        let extension_names: Vec<CString> = extensions
            .iter()
            .filter_map(|name| CString::new(name.as_str()).ok())
            .collect();
        let extension_ptrs: Vec<*const c_char> =
            extension_names.iter().map(|n| n.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(BringUpError::creation(Stage::LogicalDevice))?;

        let owner = device.clone();
        releases.push(Stage::LogicalDevice, move || unsafe {
            owner.destroy_device(None);
        });

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };

        log::info!(
            "Created logical device with {} queue(s): graphics family {}, present family {}",
            queue_infos.len(),
            families.graphics,
            families.present
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
        })
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<(), vk::Result> {
        unsafe { self.device.device_wait_idle() }
    }
}
