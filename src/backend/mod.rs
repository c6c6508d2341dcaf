// Backend module - Vulkan bring-up
//
// Design: Thin wrapper around ash. The decision logic (device selection,
// swapchain negotiation) is plain functions over plain data; the rest is
// create calls with their destructors recorded in a ReleaseStack.

pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod release;
pub mod selection;
pub mod surface;
pub mod swapchain;

pub use context::VulkanContext;
pub use error::BringUpError;
