use crate::instance::Instance;
use crate::{Error, Surface};
use ash::extensions::khr;
use ash::vk;
use log::{debug, error, info};
use std::ffi::CStr;
use std::os::raw::c_char;

pub(crate) fn c_str_to_string(c_str: &[c_char]) -> String {
    unsafe {
        CStr::from_ptr(c_str.as_ptr())
            .to_string_lossy()
            .into_owned()
    }
}

pub(crate) fn supports_extension(extension_list: &[vk::ExtensionProperties], name: &CStr) -> bool {
    extension_list.iter().any(|extension_properties| {
        name == unsafe { CStr::from_ptr(extension_properties.extension_name.as_ptr()) }
    })
}

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq)]
pub enum PhysicalDeviceType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl PhysicalDeviceType {
    pub(crate) fn from_vulkan(device_type: vk::PhysicalDeviceType) -> Self {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            vk::PhysicalDeviceType::VIRTUAL_GPU => Self::Virtual,
            vk::PhysicalDeviceType::CPU => Self::Cpu,
            _ => Self::Other,
        }
    }

    /// Large enough to dominate `max_image_dimension_2d`, so the device class
    /// always wins and the image dimension only breaks ties within a class.
    fn weight(self) -> u32 {
        match self {
            Self::Discrete => 4_000_000,
            Self::Integrated => 3_000_000,
            Self::Virtual => 2_000_000,
            Self::Cpu => 1_000_000,
            Self::Other => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub name: String,
    pub device_type: PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
}

impl PhysicalDeviceInfo {
    fn new(properties: &vk::PhysicalDeviceProperties) -> Self {
        Self {
            name: c_str_to_string(&properties.device_name),
            device_type: PhysicalDeviceType::from_vulkan(properties.device_type),
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
        }
    }

    pub fn score(&self) -> u32 {
        self.device_type.weight() + self.max_image_dimension_2d
    }
}

/// Queue family indices for the two roles a presenting device needs. One
/// family may fill both roles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Scans the family list in index order, recording the first
    /// graphics-capable family and, independently, the first family that can
    /// present to `surface`. A per-family support query that errors is
    /// treated as unsupported.
    pub(crate) fn find(
        instance: &ash::Instance,
        surface_ext: &khr::Surface,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Self {
        let queue_family_properties =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        let mut indices = Self::default();
        for (index, queue_family) in queue_family_properties.iter().enumerate() {
            let index = index as u32;

            if indices.graphics_family.is_none()
                && queue_family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics_family = Some(index);
            }

            if indices.present_family.is_none() {
                let present_support = unsafe {
                    surface_ext.get_physical_device_surface_support(physical_device, index, surface)
                }
                .unwrap_or_else(|e| {
                    error!("vkGetPhysicalDeviceSurfaceSupportKHR failed: {}", e);
                    false
                });
                if present_support {
                    indices.present_family = Some(index);
                }
            }
        }
        indices
    }

    /// Stage entry point: like [`find`](Self::find), but a missing family is
    /// an error. The graphics check is reported first when both are missing.
    pub fn resolve(
        instance: &Instance,
        physical_device: &PhysicalDevice,
        surface: &Surface,
    ) -> crate::Result<Self> {
        let indices = Self::find(
            &instance.core,
            &instance.surface_ext,
            physical_device.handle,
            surface.handle(),
        );
        if indices.graphics_family.is_none() {
            return Err(Error::NoGraphicsQueueFamily);
        }
        if indices.present_family.is_none() {
            return Err(Error::NoPresentQueueFamily);
        }
        Ok(indices)
    }
}

/// Strictly-greater fold keeps the earliest candidate on score ties.
fn best_index(scored: &[(usize, u32)]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for &(index, score) in scored {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _score)| index)
}

pub struct PhysicalDevice {
    pub(crate) handle: vk::PhysicalDevice,
    pub info: PhysicalDeviceInfo,
}

impl PhysicalDevice {
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    /// Enumerates all physical devices, filters out the unsuitable ones, and
    /// returns the highest-scoring survivor.
    ///
    /// Suitable means: a graphics-capable queue family, a present-capable
    /// queue family for `surface`, every entry of `required_extensions`
    /// supported, and at least one surface format and present mode.
    pub fn select(
        instance: &Instance,
        surface: &Surface,
        required_extensions: &[&CStr],
    ) -> crate::Result<Self> {
        let physical_devices =
            unsafe { instance.core.enumerate_physical_devices() }.map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::AllocationFailed,
                e => Error::EnumerationFailed(e),
            })?;
        if physical_devices.is_empty() {
            return Err(Error::NoDevicesFound);
        }

        let mut scored: Vec<(usize, u32)> = Vec::with_capacity(physical_devices.len());
        let mut infos: Vec<PhysicalDeviceInfo> = Vec::with_capacity(physical_devices.len());
        for (index, &physical_device) in physical_devices.iter().enumerate() {
            let properties =
                unsafe { instance.core.get_physical_device_properties(physical_device) };
            let info = PhysicalDeviceInfo::new(&properties);

            if Self::is_suitable(instance, physical_device, surface, required_extensions) {
                debug!("Candidate device {} scores {}", info.name, info.score());
                scored.push((index, info.score()));
            } else {
                debug!("Candidate device {} is not suitable", info.name);
            }
            infos.push(info);
        }

        match best_index(&scored) {
            Some(index) => {
                let info = infos.swap_remove(index);
                info!(
                    "Selected device {} ({:?})",
                    info.name, info.device_type
                );
                Ok(Self {
                    handle: physical_devices[index],
                    info,
                })
            }
            None => Err(Error::NoSuitableDevice),
        }
    }

    fn is_suitable(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
        required_extensions: &[&CStr],
    ) -> bool {
        let indices = QueueFamilyIndices::find(
            &instance.core,
            &instance.surface_ext,
            physical_device,
            surface.handle(),
        );
        if !indices.is_complete() {
            return false;
        }

        let extension_list = unsafe {
            instance
                .core
                .enumerate_device_extension_properties(physical_device)
        }
        .unwrap_or_default();
        if !required_extensions
            .iter()
            .all(|&name| supports_extension(&extension_list, name))
        {
            return false;
        }

        match crate::swapchain::SurfaceSupport::query_raw(
            &instance.surface_ext,
            physical_device,
            surface.handle(),
        ) {
            Ok(support) => !support.formats.is_empty() && !support.present_modes.is_empty(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(device_type: PhysicalDeviceType, max_image_dimension_2d: u32) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            name: String::from("test"),
            device_type,
            max_image_dimension_2d,
        }
    }

    fn extension_properties(name: &CStr) -> vk::ExtensionProperties {
        let mut properties = vk::ExtensionProperties::default();
        for (dst, &src) in properties
            .extension_name
            .iter_mut()
            .zip(name.to_bytes_with_nul())
        {
            *dst = src as c_char;
        }
        properties
    }

    #[test]
    fn discrete_beats_integrated_regardless_of_image_dimension() {
        let discrete = info(PhysicalDeviceType::Discrete, 4096);
        let integrated = info(PhysicalDeviceType::Integrated, 32768);
        assert!(discrete.score() > integrated.score());
    }

    #[test]
    fn image_dimension_breaks_ties_within_a_class() {
        let small = info(PhysicalDeviceType::Discrete, 8192);
        let large = info(PhysicalDeviceType::Discrete, 16384);
        assert!(large.score() > small.score());
    }

    #[test]
    fn class_weights_descend() {
        let classes = [
            PhysicalDeviceType::Discrete,
            PhysicalDeviceType::Integrated,
            PhysicalDeviceType::Virtual,
            PhysicalDeviceType::Cpu,
            PhysicalDeviceType::Other,
        ];
        for pair in classes.windows(2) {
            assert!(info(pair[0], 0).score() > info(pair[1], 0).score());
        }
    }

    #[test]
    fn best_index_prefers_highest_score() {
        assert_eq!(best_index(&[(0, 10), (1, 30), (2, 20)]), Some(1));
    }

    #[test]
    fn best_index_keeps_first_on_tie() {
        assert_eq!(best_index(&[(0, 30), (1, 30), (2, 30)]), Some(0));
    }

    #[test]
    fn best_index_empty_is_none() {
        assert_eq!(best_index(&[]), None);
    }

    #[test]
    fn indices_complete_requires_both_families() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());
        indices.graphics_family = Some(0);
        assert!(!indices.is_complete());
        indices.present_family = Some(0);
        assert!(indices.is_complete());
    }

    #[test]
    fn extension_membership_is_exact_string_match() {
        let list = vec![
            extension_properties(ash::extensions::khr::Swapchain::name()),
            extension_properties(CStr::from_bytes_with_nul(b"VK_EXT_other\0").unwrap()),
        ];
        assert!(supports_extension(
            &list,
            ash::extensions::khr::Swapchain::name()
        ));
        assert!(!supports_extension(
            &list,
            CStr::from_bytes_with_nul(b"VK_KHR_swap\0").unwrap()
        ));
    }
}
