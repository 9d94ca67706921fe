//! Vulkan device and surface negotiation.
//!
//! Walks the strict creation chain needed before any rendering can happen:
//! physical-device selection, queue-family resolution, logical-device
//! creation, surface negotiation, and swapchain/image-view construction.
//! [`Context`] drives the whole chain in order and tears it down in reverse.

mod context;
mod debug_utils;
mod device;
mod instance;
mod physical_device;
mod surface;
mod swapchain;

pub use context::*;
pub use device::*;
pub use instance::*;
pub use physical_device::*;
pub use surface::*;
pub use swapchain::*;

pub use ash;

use ash::vk;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to load the Vulkan library: {0}")]
    LoadingFailed(String),

    #[error("Failed to create instance: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("Failed to create debug messenger: {0}")]
    DebugMessengerCreationFailed(vk::Result),

    #[error("Failed to create window surface: {0}")]
    SurfaceCreationFailed(vk::Result),

    #[error("Failed to enumerate physical devices: {0}")]
    EnumerationFailed(vk::Result),

    #[error("No Vulkan physical devices found")]
    NoDevicesFound,

    #[error("No suitable Vulkan physical device found")]
    NoSuitableDevice,

    #[error("Device exposes no graphics-capable queue family")]
    NoGraphicsQueueFamily,

    #[error("Device exposes no present-capable queue family")]
    NoPresentQueueFamily,

    #[error("Failed to create logical device: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("Surface reports no supported formats")]
    NoSurfaceFormats,

    #[error("Surface reports no supported present modes")]
    NoPresentModes,

    #[error("Failed to query surface capabilities: {0}")]
    CapabilityQueryFailed(vk::Result),

    #[error("Failed to create swapchain: {0}")]
    ChainCreationFailed(vk::Result),

    #[error("Failed to create swapchain image view: {0}")]
    ImageViewCreationFailed(vk::Result),

    #[error("Host allocation failed")]
    AllocationFailed,
}

pub type Result<T> = std::result::Result<T, Error>;
