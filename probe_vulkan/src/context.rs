use crate::device::Device;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDevice, PhysicalDeviceInfo, QueueFamilyIndices};
use crate::surface::Surface;
use crate::swapchain::{SurfaceNegotiation, SurfaceSupport, Swapchain};
use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

/// Caller-supplied constants for the negotiation: application name, the
/// validation layers to request (unavailable ones are skipped), and the
/// device-level extensions every candidate must support.
pub struct ContextSettings<'a> {
    pub app_name: &'a str,
    pub validation_layers: &'a [&'a str],
    pub device_extensions: &'a [&'a CStr],
}

/// The whole negotiated graphics state, built in strict dependency order:
/// instance, surface, physical device, queue families, logical device,
/// surface negotiation, swapchain.
///
/// Teardown is the reverse of construction and needs no explicit call:
/// fields drop in declaration order, so the swapchain goes first and the
/// instance last. A constructor failure unwinds whatever was already built
/// through the same drops, so partially constructed state is released
/// correctly too.
pub struct Context {
    swapchain: Swapchain,
    device: Arc<Device>,
    negotiation: SurfaceNegotiation,
    physical_device: PhysicalDevice,
    queue_family_indices: QueueFamilyIndices,
    surface: Surface,
    instance: Instance,
}

impl Context {
    /// Runs the five negotiation stages against `window`. Any stage error
    /// aborts the remaining stages and is returned unchanged.
    ///
    /// `framebuffer_extent` is the window's current framebuffer size in
    /// pixels, used only when the surface reports an undefined extent.
    pub fn new<
        W: raw_window_handle::HasRawWindowHandle + raw_window_handle::HasRawDisplayHandle,
    >(
        window: &W,
        framebuffer_extent: vk::Extent2D,
        settings: &ContextSettings,
    ) -> crate::Result<Self> {
        let instance = Instance::new(window, settings.app_name, settings.validation_layers)?;
        let surface = instance.create_surface(window)?;

        let physical_device =
            PhysicalDevice::select(&instance, &surface, settings.device_extensions)?;
        let queue_family_indices =
            QueueFamilyIndices::resolve(&instance, &physical_device, &surface)?;

        let device = Arc::new(Device::new(
            &instance,
            &physical_device,
            queue_family_indices,
            settings.device_extensions,
        )?);

        let negotiation = SurfaceSupport::query(&instance, &physical_device, &surface)?
            .negotiate(framebuffer_extent)?;

        let swapchain = Swapchain::new(device.clone(), &surface, &negotiation)?;

        Ok(Self {
            swapchain,
            device,
            negotiation,
            physical_device,
            queue_family_indices,
            surface,
            instance,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn negotiation(&self) -> &SurfaceNegotiation {
        &self.negotiation
    }

    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.physical_device
    }

    pub fn physical_device_info(&self) -> &PhysicalDeviceInfo {
        &self.physical_device.info
    }

    pub fn queue_family_indices(&self) -> QueueFamilyIndices {
        self.queue_family_indices
    }
}
