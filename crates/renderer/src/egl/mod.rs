//! EGL rendering-context management.
//!
//! `EglApi` is the narrow platform surface (one method per EGL entry point
//! the backend uses). `EglBackend` drives it through the ordered
//! display → config → context → surface → current sequence and tears it
//! down in reverse. `select_config` is the nearest-fit chooser shared by
//! both API generations.

mod backend;
mod config;
#[cfg(feature = "egl")]
mod khronos;

use std::fmt;

use thiserror::Error;

pub use backend::{
    select_backend, ApiGeneration, BackendOptions, ContextError, ContextInfo, ContextState,
    ContextStep, EglBackend, Handle, ReadyNotifier, RenderingBackend,
};
pub use config::{select_config, Attribute, ConfigRequest, DONT_CARE, MAX_CONFIGS};
#[cfg(feature = "egl")]
pub use khronos::KhronosEgl;

pub const NONE: i32 = 0x3038;
pub const CONTEXT_CLIENT_VERSION: i32 = 0x3098;
pub const OPENGL_ES2_BIT: i32 = 0x0004;
pub const OPENGL_BIT: i32 = 0x0008;

/// Client API bound before the display is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientApi {
    OpenGlEs,
    OpenGl,
}

/// An EGL error code as reported by `eglGetError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("EGL error 0x{code:04x}")]
pub struct PlatformError {
    pub code: i32,
}

impl PlatformError {
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SwapError {
    #[error("buffer swap failed: {0}")]
    Driver(PlatformError),
    #[error("surface lost during buffer swap")]
    SurfaceLost,
}

/// Entry points the context manager needs from an EGL implementation.
///
/// Handles are plain copyable values; the implementation owns the native
/// window the surface is created for.
pub trait EglApi {
    type Display: Copy + PartialEq + fmt::Debug;
    type Config: Copy + PartialEq + fmt::Debug;
    type Context: Copy + PartialEq + fmt::Debug;
    type Surface: Copy + PartialEq + fmt::Debug;

    fn bind_api(&self, api: ClientApi) -> bool;
    fn get_display(&self) -> Option<Self::Display>;
    fn initialize(&self, display: Self::Display) -> Result<(i32, i32), PlatformError>;
    /// At most `max` configs matching the `NONE`-terminated attribute list.
    fn choose_configs(
        &self,
        display: Self::Display,
        attribs: &[i32],
        max: usize,
    ) -> Result<Vec<Self::Config>, PlatformError>;
    fn config_attrib(&self, display: Self::Display, config: Self::Config, attribute: i32)
        -> Option<i32>;
    fn create_context(
        &self,
        display: Self::Display,
        config: Self::Config,
        attribs: &[i32],
    ) -> Result<Self::Context, PlatformError>;
    fn create_window_surface(
        &self,
        display: Self::Display,
        config: Self::Config,
    ) -> Result<Self::Surface, PlatformError>;
    fn current_context(&self) -> Option<Self::Context>;
    /// `None` releases whatever is current on this thread.
    fn make_current(
        &self,
        display: Self::Display,
        binding: Option<(Self::Surface, Self::Context)>,
    ) -> Result<(), PlatformError>;
    fn swap_interval(&self, display: Self::Display, interval: i32) -> Result<(), PlatformError>;
    fn swap_buffers(&self, display: Self::Display, surface: Self::Surface)
        -> Result<(), SwapError>;
    fn destroy_surface(&self, display: Self::Display, surface: Self::Surface)
        -> Result<(), PlatformError>;
    fn destroy_context(&self, display: Self::Display, context: Self::Context)
        -> Result<(), PlatformError>;
    fn terminate(&self, display: Self::Display) -> Result<(), PlatformError>;

    /// Stamps the next swap with a presentation time `offset_nanos` from
    /// now. Returns false when the platform lacks the extension.
    fn stamp_presentation(
        &self,
        _display: Self::Display,
        _surface: Self::Surface,
        _offset_nanos: i64,
    ) -> bool {
        false
    }

    /// Driver GL version, queried once the context is current.
    fn gl_version(&self) -> Option<String> {
        None
    }
}
