// Physical device selection
//
// First-match policy: walk the candidates in enumeration order and take the
// first one that can draw, can present to our surface, has every required
// extension and reports at least one surface format and present mode.
// The queries go through DeviceProbe so the policy does not care whether it
// is talking to a real driver.

use ash::vk;
use std::collections::BTreeSet;

use super::error::BringUpError;

/// Queue family indices found while scanning a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Both roles resolved to a family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct families, ascending. One entry when both roles coincide.
    pub fn unique(&self) -> Vec<u32> {
        BTreeSet::from([self.graphics, self.present]).into_iter().collect()
    }
}

/// Snapshot of what a device/surface pair can present
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// What a device must offer to be picked
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    pub extensions: Vec<String>,
    pub require_discrete_gpu: bool,
}

/// Capability queries against one surface
pub trait DeviceProbe {
    type Device: Copy;

    fn device_type(&self, device: Self::Device) -> vk::PhysicalDeviceType;

    fn queue_families(&self, device: Self::Device) -> Vec<vk::QueueFamilyProperties>;

    fn supports_present(&self, device: Self::Device, family: u32) -> Result<bool, BringUpError>;

    fn extensions(&self, device: Self::Device) -> Result<Vec<String>, BringUpError>;

    fn swapchain_support(&self, device: Self::Device) -> Result<SwapchainSupport, BringUpError>;
}

/// The chosen device and the families it will use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedDevice<D> {
    pub device: D,
    pub queue_families: QueueFamilies,
}

/// Scan queue families until both roles are filled.
///
/// A later family that can do both overrides an earlier partial match, so a
/// single family serving graphics and present is preferred when it comes
/// before the scan completes.
pub fn find_queue_families<P: DeviceProbe>(
    probe: &P,
    device: P::Device,
) -> Result<QueueFamilyIndices, BringUpError> {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in probe.queue_families(device).iter().enumerate() {
        let index = index as u32;

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }

        if probe.supports_present(device, index)? {
            indices.present = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Required extensions the device does not report
pub fn missing_extensions<'a>(available: &[String], required: &'a [String]) -> Vec<&'a str> {
    let available: BTreeSet<&str> = available.iter().map(String::as_str).collect();
    required
        .iter()
        .map(String::as_str)
        .filter(|name| !available.contains(name))
        .collect()
}

/// Returns the device's queue families if it passes every check
pub fn check_device<P: DeviceProbe>(
    probe: &P,
    device: P::Device,
    requirements: &DeviceRequirements,
) -> Result<Option<QueueFamilies>, BringUpError> {
    if requirements.require_discrete_gpu
        && probe.device_type(device) != vk::PhysicalDeviceType::DISCRETE_GPU
    {
        log::debug!("Skipping device: not a discrete GPU");
        return Ok(None);
    }

    let Some(families) = find_queue_families(probe, device)?.resolve() else {
        log::debug!("Skipping device: no graphics + present queue families");
        return Ok(None);
    };

    let available = probe.extensions(device)?;
    let missing = missing_extensions(&available, &requirements.extensions);
    if !missing.is_empty() {
        log::debug!("Skipping device: missing extensions {:?}", missing);
        return Ok(None);
    }

    // Only meaningful once the swapchain extension is known to exist
    if !probe.swapchain_support(device)?.is_adequate() {
        log::debug!("Skipping device: no surface formats or present modes");
        return Ok(None);
    }

    Ok(Some(families))
}

/// Pick the first suitable device
pub fn pick_physical_device<P: DeviceProbe>(
    probe: &P,
    candidates: &[P::Device],
    requirements: &DeviceRequirements,
) -> Result<SelectedDevice<P::Device>, BringUpError> {
    if candidates.is_empty() {
        return Err(BringUpError::NoDevices);
    }

    log::info!("Found {} GPU(s)", candidates.len());

    for &device in candidates {
        if let Some(queue_families) = check_device(probe, device, requirements)? {
            return Ok(SelectedDevice {
                device,
                queue_families,
            });
        }
    }

    Err(BringUpError::NoSuitableDevice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::error::ErrorKind;

    /// In-memory device description
    #[derive(Clone)]
    struct FakeDevice {
        device_type: vk::PhysicalDeviceType,
        queue_flags: Vec<vk::QueueFlags>,
        present_families: Vec<u32>,
        extensions: Vec<String>,
        formats: Vec<vk::SurfaceFormatKHR>,
        present_modes: Vec<vk::PresentModeKHR>,
    }

    impl FakeDevice {
        fn suitable() -> Self {
            Self {
                device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
                queue_flags: vec![vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE],
                present_families: vec![0],
                extensions: vec!["VK_KHR_swapchain".to_string()],
                formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            }
        }
    }

    struct FakeProbe {
        devices: Vec<FakeDevice>,
    }

    impl FakeProbe {
        fn handles(&self) -> Vec<usize> {
            (0..self.devices.len()).collect()
        }
    }

    impl DeviceProbe for FakeProbe {
        type Device = usize;

        fn device_type(&self, device: usize) -> vk::PhysicalDeviceType {
            self.devices[device].device_type
        }

        fn queue_families(&self, device: usize) -> Vec<vk::QueueFamilyProperties> {
            self.devices[device]
                .queue_flags
                .iter()
                .map(|&queue_flags| vk::QueueFamilyProperties {
                    queue_flags,
                    queue_count: 1,
                    ..Default::default()
                })
                .collect()
        }

        fn supports_present(&self, device: usize, family: u32) -> Result<bool, BringUpError> {
            Ok(self.devices[device].present_families.contains(&family))
        }

        fn extensions(&self, device: usize) -> Result<Vec<String>, BringUpError> {
            Ok(self.devices[device].extensions.clone())
        }

        fn swapchain_support(&self, device: usize) -> Result<SwapchainSupport, BringUpError> {
            let d = &self.devices[device];
            Ok(SwapchainSupport {
                capabilities: vk::SurfaceCapabilitiesKHR::default(),
                formats: d.formats.clone(),
                present_modes: d.present_modes.clone(),
            })
        }
    }

    fn requirements() -> DeviceRequirements {
        DeviceRequirements {
            extensions: vec!["VK_KHR_swapchain".to_string()],
            require_discrete_gpu: false,
        }
    }

    fn broken_variants() -> Vec<FakeDevice> {
        let mut no_graphics = FakeDevice::suitable();
        no_graphics.queue_flags = vec![vk::QueueFlags::COMPUTE];

        let mut no_present = FakeDevice::suitable();
        no_present.present_families.clear();

        let mut no_extension = FakeDevice::suitable();
        no_extension.extensions = vec!["VK_KHR_maintenance1".to_string()];

        let mut no_formats = FakeDevice::suitable();
        no_formats.formats.clear();

        let mut no_modes = FakeDevice::suitable();
        no_modes.present_modes.clear();

        vec![no_graphics, no_present, no_extension, no_formats, no_modes]
    }

    #[test]
    fn single_suitable_device_found_at_any_position() {
        let broken = broken_variants();
        for position in 0..=broken.len() {
            let mut devices = broken.clone();
            devices.insert(position, FakeDevice::suitable());
            let probe = FakeProbe { devices };

            let selected = pick_physical_device(&probe, &probe.handles(), &requirements()).unwrap();
            assert_eq!(selected.device, position);
            assert_eq!(selected.queue_families, QueueFamilies { graphics: 0, present: 0 });
        }
    }

    #[test]
    fn no_suitable_device_is_selection_failure() {
        let probe = FakeProbe {
            devices: broken_variants(),
        };

        let err = pick_physical_device(&probe, &probe.handles(), &requirements()).unwrap_err();
        assert!(matches!(err, BringUpError::NoSuitableDevice));
        assert_eq!(err.kind(), ErrorKind::SelectionFailure);
    }

    #[test]
    fn empty_enumeration_is_its_own_error() {
        let probe = FakeProbe { devices: vec![] };

        let err = pick_physical_device(&probe, &[], &requirements()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EnumerationEmpty);
    }

    #[test]
    fn first_match_wins_over_discrete() {
        let mut discrete = FakeDevice::suitable();
        discrete.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        let probe = FakeProbe {
            devices: vec![FakeDevice::suitable(), discrete],
        };

        let selected = pick_physical_device(&probe, &probe.handles(), &requirements()).unwrap();
        assert_eq!(selected.device, 0);
    }

    #[test]
    fn discrete_filter_skips_integrated() {
        let mut discrete = FakeDevice::suitable();
        discrete.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        let probe = FakeProbe {
            devices: vec![FakeDevice::suitable(), discrete],
        };
        let mut reqs = requirements();
        reqs.require_discrete_gpu = true;

        let selected = pick_physical_device(&probe, &probe.handles(), &reqs).unwrap();
        assert_eq!(selected.device, 1);
    }

    #[test]
    fn separate_graphics_and_present_families() {
        let mut device = FakeDevice::suitable();
        device.queue_flags = vec![vk::QueueFlags::GRAPHICS, vk::QueueFlags::TRANSFER];
        device.present_families = vec![1];
        let probe = FakeProbe { devices: vec![device] };

        let indices = find_queue_families(&probe, 0).unwrap();
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));

        let families = indices.resolve().unwrap();
        assert_eq!(families.unique(), vec![0, 1]);
    }

    #[test]
    fn family_serving_both_roles_wins_before_completion() {
        let mut device = FakeDevice::suitable();
        device.queue_flags = vec![
            vk::QueueFlags::GRAPHICS,
            vk::QueueFlags::GRAPHICS,
            vk::QueueFlags::GRAPHICS,
        ];
        device.present_families = vec![1, 2];
        let probe = FakeProbe { devices: vec![device] };

        let indices = find_queue_families(&probe, 0).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: Some(1), present: Some(1) });
        assert_eq!(indices.resolve().unwrap().unique(), vec![1]);
    }

    #[test]
    fn index_zero_is_a_real_index() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: None,
        };
        assert!(!indices.is_complete());
        assert!(indices.resolve().is_none());
    }

    #[test]
    fn extension_check_is_subset_match() {
        let available = vec!["VK_KHR_swapchain".to_string(), "VK_KHR_maintenance1".to_string()];
        let required = vec!["VK_KHR_swapchain".to_string()];
        assert!(missing_extensions(&available, &required).is_empty());

        let required = vec!["VK_KHR_swapchain".to_string(), "VK_KHR_ray_query".to_string()];
        assert_eq!(missing_extensions(&available, &required), ["VK_KHR_ray_query"]);

        assert_eq!(missing_extensions(&[], &required).len(), 2);
    }
}
