use crate::instance::Instance;
use crate::physical_device::{PhysicalDevice, QueueFamilyIndices};
use crate::Error;
use ash::extensions::khr;
use ash::vk;
use log::{info, trace};
use std::ffi::CStr;
use std::os::raw::c_char;

/// Distinct family indices in `graphics, present` order. The runtime rejects
/// duplicate queue-create entries, so a shared family is listed once.
pub(crate) fn unique_queue_families(graphics_family: u32, present_family: u32) -> Vec<u32> {
    if graphics_family == present_family {
        vec![graphics_family]
    } else {
        vec![graphics_family, present_family]
    }
}

/// Logical device plus the queue handles retrieved from it. The two queue
/// handles are identical when one family fills both roles.
pub struct Device {
    pub(crate) core: ash::Device,
    pub(crate) swapchain_ext: khr::Swapchain,

    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family_index: u32,
    pub present_family_index: u32,
}

impl Device {
    /// Creates the logical device with one queue (priority 1.0) per distinct
    /// family, no optional features, and `extensions` enabled. Creation
    /// failure is fatal; there is no retry.
    pub fn new(
        instance: &Instance,
        physical_device: &PhysicalDevice,
        indices: QueueFamilyIndices,
        extensions: &[&CStr],
    ) -> crate::Result<Self> {
        let graphics_family_index = indices.graphics_family.ok_or(Error::NoGraphicsQueueFamily)?;
        let present_family_index = indices.present_family.ok_or(Error::NoPresentQueueFamily)?;

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> =
            unique_queue_families(graphics_family_index, present_family_index)
                .iter()
                .map(|&family_index| {
                    vk::DeviceQueueCreateInfo::builder()
                        .queue_family_index(family_index)
                        .queue_priorities(&[1.0])
                        .build()
                })
                .collect();

        let extension_names_raw: Vec<*const c_char> =
            extensions.iter().map(|name| name.as_ptr()).collect();

        // Feature negotiation is not done here: request nothing optional.
        let features = vk::PhysicalDeviceFeatures::default();

        let core = unsafe {
            instance.core.create_device(
                physical_device.handle,
                &vk::DeviceCreateInfo::builder()
                    .queue_create_infos(&queue_create_infos)
                    .enabled_extension_names(&extension_names_raw)
                    .enabled_features(&features),
                None,
            )
        }
        .map_err(Error::DeviceCreationFailed)?;

        let swapchain_ext = khr::Swapchain::new(&instance.core, &core);

        let graphics_queue = unsafe { core.get_device_queue(graphics_family_index, 0) };
        let present_queue = if present_family_index == graphics_family_index {
            graphics_queue
        } else {
            unsafe { core.get_device_queue(present_family_index, 0) }
        };

        info!(
            "Created logical device (graphics family {}, present family {})",
            graphics_family_index, present_family_index
        );

        Ok(Self {
            core,
            swapchain_ext,
            graphics_queue,
            present_queue,
            graphics_family_index,
            present_family_index,
        })
    }

    pub fn handle(&self) -> &ash::Device {
        &self.core
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            self.core.destroy_device(None);
        }
        trace!("Drop Device");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_family_yields_one_queue_request() {
        assert_eq!(unique_queue_families(0, 0), vec![0]);
    }

    #[test]
    fn distinct_families_yield_two_queue_requests() {
        assert_eq!(unique_queue_families(0, 2), vec![0, 2]);
    }
}
