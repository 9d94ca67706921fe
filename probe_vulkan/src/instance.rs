use crate::debug_utils::DebugUtils;
use crate::physical_device::c_str_to_string;
use crate::{Error, Surface};
use ash::extensions::khr;
use ash::vk;
use log::{debug, trace, warn};
use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::Arc;

fn layer_supported(layer_list: &[vk::LayerProperties], name: &str) -> bool {
    layer_list
        .iter()
        .any(|layer_properties| c_str_to_string(&layer_properties.layer_name) == name)
}

/// Owns the `ash` entry point, the instance, and the optional validation
/// messenger. Every later stage borrows this.
pub struct Instance {
    pub(crate) entry: ash::Entry,
    pub(crate) core: ash::Instance,
    pub(crate) surface_ext: Arc<khr::Surface>,
    debug_utils: Option<DebugUtils>,
}

impl Instance {
    /// Creates the Vulkan instance with the window-system surface extensions
    /// and whichever of the requested validation layers are actually
    /// available. Missing layers are skipped with a warning, never an error.
    pub fn new<W: raw_window_handle::HasRawDisplayHandle>(
        window: &W,
        app_name: &str,
        validation_layers: &[&str],
    ) -> crate::Result<Self> {
        let entry =
            unsafe { ash::Entry::load() }.map_err(|e| Error::LoadingFailed(e.to_string()))?;

        let mut extension_names_raw =
            ash_window::enumerate_required_extensions(window.raw_display_handle())
                .map_err(Error::InstanceCreationFailed)?
                .to_vec();

        let available_layers = entry
            .enumerate_instance_layer_properties()
            .unwrap_or_default();
        let layer_names: Vec<CString> = validation_layers
            .iter()
            .filter(|&&name| {
                let supported = layer_supported(&available_layers, name);
                if !supported {
                    warn!("Validation layer {} is not available, skipping", name);
                }
                supported
            })
            .map(|&name| CString::new(name).unwrap())
            .collect();
        let layer_names_raw: Vec<*const c_char> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let with_validation = !layer_names.is_empty();
        if with_validation {
            extension_names_raw.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        // MoltenVK only enumerates devices when portability is opted into.
        #[cfg(target_os = "macos")]
        extension_names_raw.push(vk::KhrPortabilityEnumerationFn::name().as_ptr());

        let flags = if cfg!(target_os = "macos") {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let app_name = CString::new(app_name).unwrap();
        let engine_name = CString::new("No Engine").unwrap();
        let app_info = vk::ApplicationInfo::builder()
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name.as_c_str())
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let create_info = vk::InstanceCreateInfo::builder()
            .flags(flags)
            .application_info(&app_info)
            .enabled_layer_names(&layer_names_raw)
            .enabled_extension_names(&extension_names_raw);

        let core = unsafe { entry.create_instance(&create_info, None) }
            .map_err(Error::InstanceCreationFailed)?;

        if let Ok(extension_list) = entry.enumerate_instance_extension_properties(None) {
            for extension_properties in &extension_list {
                debug!(
                    "Available instance extension: {}",
                    c_str_to_string(&extension_properties.extension_name)
                );
            }
        }

        let debug_utils = if with_validation {
            Some(DebugUtils::new(&entry, &core).map_err(Error::DebugMessengerCreationFailed)?)
        } else {
            None
        };

        let surface_ext = Arc::new(khr::Surface::new(&entry, &core));

        Ok(Self {
            entry,
            core,
            surface_ext,
            debug_utils,
        })
    }

    pub fn create_surface<
        W: raw_window_handle::HasRawWindowHandle + raw_window_handle::HasRawDisplayHandle,
    >(
        &self,
        window: &W,
    ) -> crate::Result<Surface> {
        Surface::new(&self.entry, &self.core, self.surface_ext.clone(), window)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // The messenger must go before the instance it was created from.
        self.debug_utils.take();
        unsafe {
            self.core.destroy_instance(None);
        }
        trace!("Drop Instance");
    }
}
