// Bring-up errors
//
// Every stage returns a BringUpError. All of them are fatal: the caller
// reports the message and exits, nothing is retried.

use ash::vk;
use std::fmt;

/// A bring-up stage that creates a Vulkan object. Variants are declared in
/// creation order; teardown runs them backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Instance,
    DebugMessenger,
    Surface,
    LogicalDevice,
    Swapchain,
    ImageView,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Instance => "instance",
            Stage::DebugMessenger => "debug messenger",
            Stage::Surface => "surface",
            Stage::LogicalDevice => "logical device",
            Stage::Swapchain => "swap chain",
            Stage::ImageView => "image view",
        };
        f.write_str(name)
    }
}

/// Coarse classification of bring-up failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A layer or extension we need is not installed
    CapabilityMissing,
    /// The driver reports no GPUs at all
    EnumerationEmpty,
    /// GPUs exist but none passes the suitability checks
    SelectionFailure,
    /// An object-creation call (or capability query) returned non-success
    CreationFailure,
}

#[derive(thiserror::Error, Debug)]
pub enum BringUpError {
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Validation layer {0} requested, but not available")]
    MissingLayer(String),

    #[error("Required instance extension {0} is not supported")]
    MissingInstanceExtension(String),

    #[error("Failed to find GPUs with Vulkan support")]
    NoDevices,

    #[error("Failed to find a suitable GPU")]
    NoSuitableDevice,

    #[error("Failed to create the {stage}: {source}")]
    Creation { stage: Stage, source: vk::Result },

    #[error("Failed to query {what}: {source}")]
    Query {
        what: &'static str,
        source: vk::Result,
    },
}

impl BringUpError {
    pub fn creation(stage: Stage) -> impl FnOnce(vk::Result) -> Self {
        move |source| BringUpError::Creation { stage, source }
    }

    pub fn query(what: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |source| BringUpError::Query { what, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BringUpError::MissingLayer(_)
            | BringUpError::MissingInstanceExtension(_) => ErrorKind::CapabilityMissing,
            BringUpError::NoDevices => ErrorKind::EnumerationEmpty,
            BringUpError::NoSuitableDevice => ErrorKind::SelectionFailure,
            BringUpError::Loading(_)
            | BringUpError::Creation { .. }
            | BringUpError::Query { .. } => ErrorKind::CreationFailure,
        }
    }
}
