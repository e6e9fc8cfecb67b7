//! Rendering subsystem for the gamesurface video output.
//!
//! Frames produced outside the render thread reach the window through an
//! EGL-managed context and a chain of post-processing shader passes:
//!
//! ```text
//!   producer ──▶ ExternalTexture ──▶ ShaderPass 0 ──▶ FBO ──▶ … ──▶ last pass
//!                                                                   │
//!   RenderThread ── RenderCommand ──▶ ShaderPipeline::on_draw_frame ┘
//!        │                                                          ▼
//!        └──────────────▶ RenderingBackend::flip_buffers ──▶ window surface
//! ```
//!
//! `egl` owns context lifetime (display, config, context, surface) and config
//! selection. `shader` owns the GL objects of each pass. Both speak to the
//! platform through narrow traits (`EglApi`, `Gl`) whose real bindings sit
//! behind the `egl` and `glow` features.

mod capture;
pub mod egl;
pub mod gl;
#[cfg(feature = "glow")]
mod glow_gl;
mod runtime;
pub mod shader;
#[cfg(test)]
mod testing;
mod types;

pub use capture::save_png;
pub use egl::{
    select_backend, select_config, ApiGeneration, BackendOptions, ConfigRequest, ContextError,
    ContextInfo, ContextState, ContextStep, EglApi, EglBackend, Handle, PlatformError,
    ReadyNotifier, RenderingBackend, SwapError,
};
#[cfg(feature = "egl")]
pub use egl::KhronosEgl;
pub use gl::Gl;
#[cfg(feature = "glow")]
pub use glow_gl::GlowGl;
pub use runtime::{FrameNotifier, RenderCommand, RenderHost, RenderThread, RenderThreadConfig};
pub use shader::{
    cpu_frame_channel, CpuFrameSource, ExternalTexture, FrameProducer, ShaderError, ShaderPass,
    ShaderPipeline, SourceError,
};
pub use types::{PauseFlag, Size};
