use std::ffi::CString;
use std::num::NonZeroU32;

use glutin::config::{Config, ConfigTemplateBuilder};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, PossiblyCurrentContext, Version,
};
use glutin::display::{Display, GetGlDisplay};
use glutin::prelude::*;
use glutin::surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;
use log::{debug, info};
use raw_window_handle::HasRawWindowHandle;
use winit::dpi::{PhysicalSize, Size};
use winit::event::{ElementState, Event, VirtualKeyCode, WindowEvent};
use winit::event_loop::EventLoop;
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::{Window, WindowBuilder};

use gl_wrapper::api::{LoadError, NativeGl};
use gl_wrapper::frame_loop::{LoopContext, Platform};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub vsync: bool,
    /// 0 for no depth buffer
    pub depth_bits: u8,
}

/// Window, surface and a current OpenGL 3.3 core context, plus the event loop
/// that feeds them.
pub struct GlPlatform {
    // drop order: context, surface, window, event loop
    gl_context: PossiblyCurrentContext,
    gl_window: GlWindow,
    gl_display: Display,
    event_loop: EventLoop<()>,
}

impl GlPlatform {
    pub fn new(settings: &WindowSettings) -> Result<Self, AppError> {
        let event_loop = EventLoop::new();
        let window_builder = WindowBuilder::new()
            .with_inner_size(Size::Physical(PhysicalSize::new(
                settings.width,
                settings.height,
            )))
            .with_resizable(false)
            .with_title(&settings.title);
        let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));
        let template = ConfigTemplateBuilder::new().with_depth_size(settings.depth_bits);

        let (window, gl_config) = display_builder
            .build(&event_loop, template, |mut configs| {
                // glutin reports an error before calling the picker if nothing matched
                configs.next().expect("no matching GL config")
            })
            .map_err(|e| AppError::WindowCreation(e.to_string()))?;

        let window = window.ok_or_else(|| {
            AppError::WindowCreation("display builder returned no window".to_string())
        })?;

        let gl_display = gl_config.display();

        let context_attr = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(window.raw_window_handle()));

        let gl_window = GlWindow::new(window, &gl_config)?;

        let gl_context = unsafe { gl_display.create_context(&gl_config, &context_attr)? }
            .make_current(&gl_window.surface)?;

        if settings.vsync {
            gl_window
                .surface
                .set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))?;
        }

        debug!(
            "Created {}x{} window with a {}-bit depth buffer",
            settings.width, settings.height, settings.depth_bits
        );

        Ok(Self {
            gl_context,
            gl_window,
            gl_display,
            event_loop,
        })
    }

    /// Loads OpenGL function pointers through the display.
    pub fn load_gl(&self) -> Result<NativeGl, LoadError> {
        let gl = NativeGl::load_with(|s| match CString::new(s) {
            Ok(symbol) => self.gl_display.get_proc_address(symbol.as_c_str()),
            Err(_) => std::ptr::null(),
        })?;

        info!("OpenGL version {}", gl.version());

        Ok(gl)
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.gl_window.window.inner_size().into()
    }
}

impl Platform for GlPlatform {
    type Error = AppError;

    fn poll_events(&mut self, ctx: &mut LoopContext) {
        self.event_loop
            .run_return(|event, _window_target, control_flow| {
                control_flow.set_poll();
                match event {
                    Event::WindowEvent { event, .. } => handle_window_event(&event, ctx),
                    Event::MainEventsCleared => control_flow.set_exit(),
                    _ => (),
                }
            });
    }

    fn present(&mut self) -> Result<(), AppError> {
        self.gl_window
            .surface
            .swap_buffers(&self.gl_context)
            .map_err(AppError::Present)
    }
}

/// Window close and a pressed Escape both request the loop to stop.
pub fn handle_window_event(event: &WindowEvent<'_>, ctx: &mut LoopContext) {
    match event {
        WindowEvent::CloseRequested => ctx.request_close(),
        WindowEvent::KeyboardInput { input, .. } => {
            if input.virtual_keycode == Some(VirtualKeyCode::Escape)
                && input.state == ElementState::Pressed
            {
                ctx.request_close();
            }
        }
        _ => (),
    }
}

pub struct GlWindow {
    // XXX the surface must be dropped before the window.
    pub surface: Surface<WindowSurface>,

    pub window: Window,
}

impl GlWindow {
    pub fn new(window: Window, config: &Config) -> Result<Self, AppError> {
        let (width, height): (u32, u32) = window.inner_size().into();
        let raw_window_handle = window.raw_window_handle();

        let (width, height) = match (NonZeroU32::new(width), NonZeroU32::new(height)) {
            (Some(w), Some(h)) => (w, h),
            _ => return Err(AppError::WindowCreation("window has zero size".to_string())),
        };

        let attrs =
            SurfaceAttributesBuilder::<WindowSurface>::new().build(raw_window_handle, width, height);

        let surface = unsafe { config.display().create_window_surface(config, &attrs)? };

        Ok(Self { window, surface })
    }
}
