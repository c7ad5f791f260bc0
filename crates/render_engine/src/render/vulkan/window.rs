//! Window management using GLFW
//!
//! Cross-platform window creation and event handling for Vulkan. The window
//! tracks framebuffer resizes so the frame loop can flag the swapchain stale.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW failed to initialize
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("window creation failed")]
    CreationFailed,

    /// Any other GLFW-reported error
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    resized: bool,
}

impl Window {
    /// Create a window configured for Vulkan rendering (no client API).
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self, WindowError> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            resized: false,
        })
    }

    /// Whether the user has requested the window to close.
    #[must_use]
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close.
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll pending events, updating the resize flag and handling ESC.
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        let mut close = false;
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(_, _) => self.resized = true,
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    close = true;
                }
                glfw::WindowEvent::Close => close = true,
                _ => {}
            }
        }
        if close {
            self.window.set_should_close(true);
        }
    }

    /// Block until an event arrives. Used while the window is minimized.
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    /// Consume and return the resize flag.
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    /// Current framebuffer size in pixels.
    #[must_use]
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// Required Vulkan instance extensions reported by GLFW.
    pub fn required_instance_extensions(&self) -> Result<Vec<String>, WindowError> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface for this window.
    pub fn create_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> Result<ash::vk::SurfaceKHR, WindowError> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "failed to create Vulkan surface: {result:?}"
            )))
        }
    }
}
