use anyhow::Context as _;
use ash::vk;
use log::info;
use probe_vulkan::{Context, ContextSettings};
use winit::event::{Event, WindowEvent};
use winit::event_loop::ControlFlow;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;
const TITLE: &str = "Vulkan Probe";

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let event_loop = winit::event_loop::EventLoop::new()?;
    let window = winit::window::WindowBuilder::new()
        .with_title(TITLE)
        .with_inner_size(winit::dpi::PhysicalSize::new(WIDTH, HEIGHT))
        .with_resizable(false)
        .build(&event_loop)?;

    let validation_layers: &[&str] = if cfg!(debug_assertions) {
        &["VK_LAYER_KHRONOS_validation"]
    } else {
        &[]
    };
    let settings = ContextSettings {
        app_name: TITLE,
        validation_layers,
        device_extensions: &[ash::extensions::khr::Swapchain::name()],
    };

    let framebuffer = window.inner_size();
    let context = Context::new(
        &window,
        vk::Extent2D {
            width: framebuffer.width,
            height: framebuffer.height,
        },
        &settings,
    )
    .context("Vulkan negotiation failed")?;

    info!(
        "Presenting on {} with {} swapchain images",
        context.physical_device_info().name,
        context.swapchain().images().len()
    );

    event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        if let Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } = event
        {
            info!("Close requested; shutting down");
            elwt.exit();
        }
    })?;

    drop(context);
    drop(window);
    Ok(())
}
