// Swapchain - Window presentation
//
// Negotiates format, present mode, extent and image count from what the
// surface reports, then creates the chain of presentable images and one view
// per image. Nothing here renders yet; the views are ready for a render pass.

use ash::vk;

use super::error::{BringUpError, Stage};
use super::release::ReleaseStack;
use super::selection::{QueueFamilies, SwapchainSupport};

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Prefer sRGB BGRA, otherwise whatever the surface lists first
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
}

/// Preferred mode if offered, else FIFO (the only mode every driver must support)
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    available
        .iter()
        .copied()
        .find(|&mode| mode == preferred)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// A current extent of u32::MAX means the surface lets us pick
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer;
    let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
    // `clamp` panics when a driver reports min > max
    vk::Extent2D {
        width: width.max(min.width).min(max.width),
        height: height.max(min.height).min(max.height),
    }
}

/// One more than the minimum so we never wait on the driver; zero max means no limit
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

/// How swapchain images are shared between queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    Exclusive,
    Concurrent([u32; 2]),
}

impl ImageSharing {
    pub fn for_families(families: QueueFamilies) -> Self {
        if families.graphics == families.present {
            ImageSharing::Exclusive
        } else {
            ImageSharing::Concurrent([families.graphics, families.present])
        }
    }

    pub fn mode(&self) -> vk::SharingMode {
        match self {
            ImageSharing::Exclusive => vk::SharingMode::EXCLUSIVE,
            ImageSharing::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            ImageSharing::Exclusive => &[],
            ImageSharing::Concurrent(families) => families,
        }
    }
}

/// Everything decided before the swapchain is created
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub sharing: ImageSharing,
}

impl SwapchainPlan {
    /// Returns None only if the surface reports no formats, which device
    /// selection already rules out
    pub fn negotiate(
        support: &SwapchainSupport,
        framebuffer: (u32, u32),
        families: QueueFamilies,
        preferred_present_mode: vk::PresentModeKHR,
    ) -> Option<Self> {
        Some(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes, preferred_present_mode),
            extent: choose_extent(&support.capabilities, framebuffer),
            image_count: choose_image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
            sharing: ImageSharing::for_families(families),
        })
    }
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create the chain and its views. Both are registered on `releases`,
    /// views after the chain so they are destroyed first.
    pub fn new(
        instance: &ash::Instance,
        device: &ash::Device,
        surface: vk::SurfaceKHR,
        plan: &SwapchainPlan,
        releases: &mut ReleaseStack,
    ) -> Result<Self, BringUpError> {
        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}, {:?}",
            plan.extent.width,
            plan.extent.height,
            plan.image_count,
            plan.surface_format.format,
            plan.present_mode,
        );

        let swapchain_loader = ash::extensions::khr::Swapchain::new(instance, device);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(plan.sharing.mode())
            .queue_family_indices(plan.sharing.queue_family_indices())
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(BringUpError::creation(Stage::Swapchain))?;

        let loader = swapchain_loader.clone();
        releases.push(Stage::Swapchain, move || unsafe {
            loader.destroy_swapchain(swapchain, None);
        });

        let images = unsafe { swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(BringUpError::query("swap chain images"))?;

        log::info!("Created swapchain with {} images", images.len());

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view = create_image_view(device, image, plan.surface_format.format)?;
            let owner = device.clone();
            releases.push(Stage::ImageView, move || unsafe {
                owner.destroy_image_view(view, None);
            });
            image_views.push(view);
        }

        Ok(Self {
            swapchain,
            images,
            image_views,
            format: plan.surface_format.format,
            extent: plan.extent,
            present_mode: plan.present_mode,
        })
    }
}

fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView, BringUpError> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }
        .map_err(BringUpError::creation(Stage::ImageView))
}
