use crate::device::Device;
use crate::instance::Instance;
use crate::physical_device::PhysicalDevice;
use crate::{Error, Surface};
use ash::extensions::khr;
use ash::vk;
use log::{info, trace};
use std::sync::Arc;

/// Read-only snapshot of what `surface` supports on one physical device.
/// Valid only for the negotiation that queried it; never re-queried.
#[derive(Debug)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn query(
        instance: &Instance,
        physical_device: &PhysicalDevice,
        surface: &Surface,
    ) -> crate::Result<Self> {
        Self::query_raw(
            &instance.surface_ext,
            physical_device.handle,
            surface.handle(),
        )
    }

    pub(crate) fn query_raw(
        surface_ext: &khr::Surface,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> crate::Result<Self> {
        unsafe {
            let capabilities = surface_ext
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(Error::CapabilityQueryFailed)?;
            let formats = surface_ext
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(Error::CapabilityQueryFailed)?;
            let present_modes = surface_ext
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(Error::CapabilityQueryFailed)?;

            Ok(Self {
                capabilities,
                formats,
                present_modes,
            })
        }
    }

    /// Picks concrete swapchain parameters from the snapshot.
    /// `framebuffer_extent` is consulted only when the surface leaves the
    /// extent undefined.
    pub fn negotiate(
        &self,
        framebuffer_extent: vk::Extent2D,
    ) -> crate::Result<SurfaceNegotiation> {
        let format = choose_surface_format(&self.formats).ok_or(Error::NoSurfaceFormats)?;
        let present_mode = choose_present_mode(&self.present_modes).ok_or(Error::NoPresentModes)?;
        let extent = choose_extent(&self.capabilities, framebuffer_extent);

        info!(
            "Negotiated surface: format {:?}/{:?}, present mode {:?}, extent {}x{}",
            format.format, format.color_space, present_mode, extent.width, extent.height
        );

        Ok(SurfaceNegotiation {
            format,
            present_mode,
            extent,
            capabilities: self.capabilities,
        })
    }
}

/// Prefers 8-bit BGRA with the sRGB nonlinear color space; otherwise falls
/// back to the first entry in the order the driver returned them.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|surface_format| {
            surface_format.format == vk::Format::B8G8R8A8_SRGB
                && surface_format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Prefers mailbox (latest-frame-wins, no tearing); falls back to FIFO,
/// which every conforming driver must support.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> Option<vk::PresentModeKHR> {
    if present_modes.is_empty() {
        return None;
    }
    Some(
        present_modes
            .iter()
            .copied()
            .find(|&present_mode| present_mode == vk::PresentModeKHR::MAILBOX)
            .unwrap_or(vk::PresentModeKHR::FIFO),
    )
}

/// A current extent of `u32::MAX` means the window system has not fixed the
/// size; derive it from the framebuffer, clamped per axis into the
/// supported range. Otherwise the current extent is authoritative.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: framebuffer_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One above the minimum so acquisition never stalls on the driver, capped
/// by `max_image_count` unless that is 0 (unbounded).
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        image_count = capabilities.max_image_count;
    }
    image_count
}

fn image_sharing(graphics_family: u32, present_family: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![graphics_family, present_family],
        )
    }
}

/// Everything the swapchain builder needs, fixed at negotiation time.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceNegotiation {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
}

impl SurfaceNegotiation {
    pub fn image_count(&self) -> u32 {
        choose_image_count(&self.capabilities)
    }
}

/// Swapchain plus its images and one owned view per image. Images belong to
/// the swapchain and are never destroyed individually; views are.
pub struct Swapchain {
    device: Arc<Device>,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates the swapchain from the negotiated parameters. Images are
    /// exclusively owned when one family does both roles, concurrently
    /// shared between the two families otherwise. Either every image gets a
    /// view or the whole construction fails.
    pub fn new(
        device: Arc<Device>,
        surface: &Surface,
        negotiation: &SurfaceNegotiation,
    ) -> crate::Result<Self> {
        let (sharing_mode, family_indices) = image_sharing(
            device.graphics_family_index,
            device.present_family_index,
        );

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(negotiation.image_count())
            .image_format(negotiation.format.format)
            .image_color_space(negotiation.format.color_space)
            .image_extent(negotiation.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .pre_transform(negotiation.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(negotiation.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());
        if sharing_mode == vk::SharingMode::CONCURRENT {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        let handle = unsafe { device.swapchain_ext.create_swapchain(&create_info, None) }
            .map_err(Error::ChainCreationFailed)?;

        let images = match unsafe { device.swapchain_ext.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { device.swapchain_ext.destroy_swapchain(handle, None) };
                return Err(Error::ChainCreationFailed(e));
            }
        };

        let mut views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_result = unsafe {
                device.core.create_image_view(
                    &vk::ImageViewCreateInfo::builder()
                        .image(image)
                        .view_type(vk::ImageViewType::TYPE_2D)
                        .format(negotiation.format.format)
                        .components(vk::ComponentMapping::default())
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            base_mip_level: 0,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        }),
                    None,
                )
            };
            match view_result {
                Ok(view) => views.push(view),
                Err(e) => {
                    // No partial view list survives a failure.
                    for view in views.drain(..) {
                        unsafe { device.core.destroy_image_view(view, None) };
                    }
                    unsafe { device.swapchain_ext.destroy_swapchain(handle, None) };
                    return Err(Error::ImageViewCreationFailed(e));
                }
            }
        }

        info!("Created swapchain with {} images", images.len());

        Ok(Self {
            device,
            handle,
            images,
            views,
            format: negotiation.format,
            extent: negotiation.extent,
        })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.views {
                self.device.core.destroy_image_view(view, None);
            }
            self.device.swapchain_ext.destroy_swapchain(self.handle, None);
        }
        trace!("Drop Swapchain");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn capabilities(
        min_image_count: u32,
        max_image_count: u32,
        current_extent: vk::Extent2D,
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count,
            max_image_count,
            current_extent,
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    const UNDEFINED_EXTENT: vk::Extent2D = vk::Extent2D {
        width: u32::MAX,
        height: u32::MAX,
    };

    #[test]
    fn preferred_format_wins_when_present() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_falls_back_to_first_entry() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn format_selection_is_deterministic() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let first = choose_surface_format(&formats).unwrap();
        let second = choose_surface_format(&formats).unwrap();
        assert_eq!(first.format, second.format);
        assert_eq!(first.color_space, second.color_space);
    }

    #[test]
    fn empty_format_list_is_rejected() {
        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn mailbox_preferred_over_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), Some(vk::PresentModeKHR::MAILBOX));
    }

    #[test]
    fn fifo_is_the_fallback() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), Some(vk::PresentModeKHR::FIFO));
        assert_eq!(choose_present_mode(&[]), None);
    }

    #[test]
    fn defined_current_extent_is_used_verbatim() {
        let caps = capabilities(
            2,
            0,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 1024,
                height: 768,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn undefined_extent_uses_framebuffer_size() {
        let caps = capabilities(2, 0, UNDEFINED_EXTENT);
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn undefined_extent_clamps_per_axis() {
        let caps = capabilities(2, 0, UNDEFINED_EXTENT);
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 10000,
                height: 600,
            },
        );
        assert_eq!((extent.width, extent.height), (4096, 600));
    }

    #[test]
    fn image_count_is_min_plus_one_when_unbounded() {
        let caps = capabilities(2, 0, UNDEFINED_EXTENT);
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn image_count_clamps_to_max() {
        let caps = capabilities(3, 3, UNDEFINED_EXTENT);
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn shared_family_uses_exclusive_sharing() {
        let (mode, indices) = image_sharing(0, 0);
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());
    }

    #[test]
    fn distinct_families_use_concurrent_sharing() {
        let (mode, indices) = image_sharing(0, 2);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![0, 2]);
    }
}
