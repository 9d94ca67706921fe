use ash::extensions::khr;
use ash::vk;
use std::sync::Arc;

/// Presentation surface tied to one window. Must outlive the swapchain
/// created against it and die before the instance.
pub struct Surface {
    handle: vk::SurfaceKHR,
    surface_ext: Arc<khr::Surface>,
}

impl Surface {
    pub(crate) fn new<
        W: raw_window_handle::HasRawWindowHandle + raw_window_handle::HasRawDisplayHandle,
    >(
        entry: &ash::Entry,
        instance: &ash::Instance,
        surface_ext: Arc<khr::Surface>,
        window: &W,
    ) -> crate::Result<Self> {
        match unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        } {
            Ok(handle) => Ok(Self {
                handle,
                surface_ext,
            }),
            Err(e) => Err(crate::Error::SurfaceCreationFailed(e)),
        }
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.surface_ext.destroy_surface(self.handle, None);
        }
    }
}
