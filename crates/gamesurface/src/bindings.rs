use presets::ShaderCatalog;
use renderer::egl::Attribute;
use renderer::{BackendOptions, ConfigRequest, PauseFlag, RenderThreadConfig};
use videoconfig::{FramebufferSettings, VideoConfig};

/// Omitted sizes stay out of the request so EGL treats them as "don't care".
pub fn config_request(settings: &FramebufferSettings) -> ConfigRequest {
    [
        (Attribute::RedSize, settings.red),
        (Attribute::GreenSize, settings.green),
        (Attribute::BlueSize, settings.blue),
        (Attribute::AlphaSize, settings.alpha),
        (Attribute::DepthSize, settings.depth),
        (Attribute::StencilSize, settings.stencil),
    ]
    .into_iter()
    .filter_map(|(attribute, value)| value.map(|value| (attribute, value)))
    .fold(ConfigRequest::new(), |request, (attribute, value)| {
        request.with(attribute, value)
    })
}

#[cfg_attr(not(feature = "egl"), allow(dead_code))]
pub fn backend_options(config: &VideoConfig, pause: PauseFlag) -> BackendOptions {
    BackendOptions {
        try_full_gl: config.context.try_full_gl,
        swap_interval: Some(config.effective_swap_interval()),
        pause,
    }
}

#[cfg_attr(not(feature = "egl"), allow(dead_code))]
pub fn thread_config(config: &VideoConfig, catalog: ShaderCatalog) -> RenderThreadConfig {
    RenderThreadConfig {
        gl_major: config.context.gl_major,
        gl_minor: config.context.gl_minor,
        request: config_request(&config.context.framebuffer),
        catalog,
        chain: config.chain(),
        ready_timeout: config.render.ready_timeout,
        ..RenderThreadConfig::default()
    }
}
