// Vulkan instance and validation
//
// Responsibilities:
// - Required instance extension list (window system + debug utils)
// - Layer / extension presence checks before creating anything
// - Instance creation with the debug messenger chained in
// - Debug messenger routing validation output through `log`

use ash::{vk, Entry};
use std::ffi::{c_char, CStr, CString};

use super::error::{BringUpError, Stage};
use super::release::ReleaseStack;
use crate::config::Config;

/// Instance extensions the window system needs, plus debug utils when validating
pub fn required_instance_extensions(
    display_handle: raw_window_handle::RawDisplayHandle,
    enable_validation: bool,
) -> Result<Vec<String>, BringUpError> {
    let window_extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(BringUpError::query("window system instance extensions"))?;

    let mut extensions: Vec<String> = window_extensions
        .iter()
        .map(|&name| unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
        .collect();

    if enable_validation {
        extensions.push(
            ash::extensions::ext::DebugUtils::name()
                .to_string_lossy()
                .into_owned(),
        );
    }

    Ok(extensions)
}

/// First requested name that is not available, if any
pub fn first_missing<'a>(available: &[String], requested: &'a [String]) -> Option<&'a String> {
    requested.iter().find(|&name| !available.contains(name))
}

pub fn available_layers(entry: &Entry) -> Result<Vec<String>, BringUpError> {
    let layers = entry
        .enumerate_instance_layer_properties()
        .map_err(BringUpError::query("instance layers"))?;

    Ok(layers
        .iter()
        .map(|layer| fixed_name(&layer.layer_name))
        .collect())
}

pub fn available_instance_extensions(entry: &Entry) -> Result<Vec<String>, BringUpError> {
    let extensions = entry
        .enumerate_instance_extension_properties(None)
        .map_err(BringUpError::query("instance extensions"))?;

    Ok(extensions
        .iter()
        .map(|extension| fixed_name(&extension.extension_name))
        .collect())
}

/// Decode a NUL-terminated name from a fixed-size Vulkan char array
pub fn fixed_name(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn to_cstrings(names: &[String]) -> Result<Vec<CString>, std::ffi::NulError> {
    names.iter().map(|name| CString::new(name.as_str())).collect()
}

/// Check requirements, then create the instance. Its destruction is
/// registered on `releases`.
pub fn create_instance(
    entry: &Entry,
    config: &Config,
    extensions: &[String],
    enable_validation: bool,
    releases: &mut ReleaseStack,
) -> Result<ash::Instance, BringUpError> {
    let layers: &[String] = if enable_validation {
        let available = available_layers(entry)?;
        log::debug!("Available layers: {:?}", available);
        if let Some(missing) = first_missing(&available, &config.debug.validation_layers) {
            return Err(BringUpError::MissingLayer(missing.clone()));
        }
        &config.debug.validation_layers
    } else {
        &[]
    };

    log::info!("Required extensions:");
    for extension in extensions {
        log::info!("\t{}", extension);
    }

    let available = available_instance_extensions(entry)?;
    if let Some(missing) = first_missing(&available, extensions) {
        return Err(BringUpError::MissingInstanceExtension(missing.clone()));
    }

    // Names come from config or the loader; an interior NUL can't be a real layer/extension
    let layer_names = to_cstrings(layers)
        .map_err(|_| BringUpError::MissingLayer(layers.join(", ")))?;
    let extension_names = to_cstrings(extensions)
        .map_err(|_| BringUpError::MissingInstanceExtension(extensions.join(", ")))?;
    let app_name = CString::new(config.instance.application_name.as_str())
        .unwrap_or_else(|_| CString::from(c"HelloTriangle"));
    let engine_name = CString::new(config.instance.engine_name.as_str())
        .unwrap_or_else(|_| CString::from(c"Test"));

    let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|n| n.as_ptr()).collect();
    let extension_ptrs: Vec<*const c_char> =
        extension_names.iter().map(|n| n.as_ptr()).collect();

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .application_version(vk::API_VERSION_1_0)
        .engine_name(&engine_name)
        .engine_version(vk::API_VERSION_1_0)
        .api_version(vk::API_VERSION_1_0);

    // Chained so instance creation and destruction are validated too
    let mut debug_info = debug_messenger_info().build();

    let mut create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extension_ptrs)
        .enabled_layer_names(&layer_ptrs);

    if enable_validation {
        create_info = create_info.push_next(&mut debug_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(BringUpError::creation(Stage::Instance))?;

    let owner = instance.clone();
    releases.push(Stage::Instance, move || unsafe {
        owner.destroy_instance(None);
    });

    Ok(instance)
}

fn debug_messenger_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXTBuilder<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Install the debug messenger. It must go before the instance, which the
/// release stack guarantees since it is pushed later.
pub fn setup_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
    releases: &mut ReleaseStack,
) -> Result<vk::DebugUtilsMessengerEXT, BringUpError> {
    let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

    let messenger =
        unsafe { debug_utils.create_debug_utils_messenger(&debug_messenger_info(), None) }
            .map_err(BringUpError::creation(Stage::DebugMessenger))?;

    releases.push(Stage::DebugMessenger, move || unsafe {
        debug_utils.destroy_debug_utils_messenger(messenger, None);
    });

    Ok(messenger)
}

/// Log target of validation layer output. Logging enables it at every level
/// so verbose messages reach stderr under the default filter.
pub const VALIDATION_TARGET: &str = "validation_layer";

pub fn validation_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Info,
        _ => log::Level::Debug,
    }
}

// Debug callback for validation layers. Never asks the driver to abort the call.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }

    let message = CStr::from_ptr((*p_callback_data).p_message);
    log::log!(
        target: VALIDATION_TARGET,
        validation_level(message_severity),
        "Validation layer: {}",
        message.to_string_lossy()
    );

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_layer_is_reported_by_name() {
        let available = names(&["VK_LAYER_MESA_device_select", "VK_LAYER_LUNARG_api_dump"]);
        let requested = names(&["VK_LAYER_KHRONOS_validation"]);

        assert_eq!(
            first_missing(&available, &requested).map(String::as_str),
            Some("VK_LAYER_KHRONOS_validation")
        );
    }

    #[test]
    fn everything_present_passes() {
        let available = names(&["VK_KHR_surface", "VK_KHR_xcb_surface", "VK_EXT_debug_utils"]);
        let requested = names(&["VK_KHR_surface", "VK_EXT_debug_utils"]);

        assert!(first_missing(&available, &requested).is_none());
        assert!(first_missing(&available, &[]).is_none());
    }

    #[test]
    fn fixed_name_stops_at_nul() {
        let mut raw = [0 as c_char; 16];
        for (slot, byte) in raw.iter_mut().zip(b"VK_KHR_surface") {
            *slot = *byte as c_char;
        }
        assert_eq!(fixed_name(&raw), "VK_KHR_surface");
        assert_eq!(fixed_name(&[0 as c_char; 4]), "");
    }

    #[test]
    fn severities_map_to_log_levels() {
        use ash::vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert_eq!(validation_level(Severity::ERROR), log::Level::Error);
        assert_eq!(validation_level(Severity::WARNING), log::Level::Warn);
        assert_eq!(validation_level(Severity::INFO), log::Level::Info);
        assert_eq!(validation_level(Severity::VERBOSE), log::Level::Debug);
    }

    #[test]
    fn callback_never_aborts() {
        let message = CString::new("vkCreateDevice: something odd").unwrap();
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: message.as_ptr(),
            ..Default::default()
        };

        for severity in [
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        ] {
            let result = unsafe {
                debug_callback(
                    severity,
                    vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                    &data,
                    std::ptr::null_mut(),
                )
            };
            assert_eq!(result, vk::FALSE);
        }

        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }
}
