use std::ffi::c_void;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use khronos_egl as egl;
use tracing::debug;

use super::{ClientApi, EglApi, PlatformError, SwapError};

type Instance = egl::DynamicInstance<egl::EGL1_4>;

/// `EglApi` over the system `libEGL`, loaded at runtime.
///
/// Native handles are kept as integers so the value can cross to the render
/// thread; they must outlive every surface created from them.
#[derive(Clone)]
pub struct KhronosEgl {
    instance: Arc<Instance>,
    native_display: usize,
    native_window: usize,
}

impl std::fmt::Debug for KhronosEgl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KhronosEgl")
            .field("native_display", &self.native_display)
            .field("native_window", &self.native_window)
            .finish_non_exhaustive()
    }
}

impl KhronosEgl {
    /// Loads `libEGL` for a window on `native_display` (0 selects the
    /// default display).
    pub fn load(native_display: usize, native_window: usize) -> Result<Self> {
        // SAFETY: libEGL is only entered through the returned instance.
        let instance = unsafe { Instance::load_required() }
            .map_err(|err| anyhow!("failed to load libEGL: {err}"))?;
        debug!(native_display, native_window, "loaded libEGL");
        Ok(Self {
            instance: Arc::new(instance),
            native_display,
            native_window,
        })
    }

    pub fn set_native_window(&mut self, native_window: usize) {
        self.native_window = native_window;
    }

    /// GL entry point lookup for `glow::Context::from_loader_function`.
    pub fn proc_address(&self, name: &str) -> *const c_void {
        self.instance
            .get_proc_address(name)
            .map_or(std::ptr::null(), |function| function as *const c_void)
    }
}

fn platform_error(err: egl::Error) -> PlatformError {
    PlatformError::new(err.native())
}

impl EglApi for KhronosEgl {
    type Display = egl::Display;
    type Config = egl::Config;
    type Context = egl::Context;
    type Surface = egl::Surface;

    fn bind_api(&self, api: ClientApi) -> bool {
        let api = match api {
            ClientApi::OpenGlEs => egl::OPENGL_ES_API,
            ClientApi::OpenGl => egl::OPENGL_API,
        };
        self.instance.bind_api(api).is_ok()
    }

    fn get_display(&self) -> Option<egl::Display> {
        let native = if self.native_display == 0 {
            egl::DEFAULT_DISPLAY
        } else {
            self.native_display as egl::NativeDisplayType
        };
        // SAFETY: the native display outlives this platform value.
        unsafe { self.instance.get_display(native) }
    }

    fn initialize(&self, display: egl::Display) -> Result<(i32, i32), PlatformError> {
        self.instance.initialize(display).map_err(platform_error)
    }

    fn choose_configs(
        &self,
        display: egl::Display,
        attribs: &[i32],
        max: usize,
    ) -> Result<Vec<egl::Config>, PlatformError> {
        let mut configs = Vec::with_capacity(max);
        self.instance
            .choose_config(display, attribs, &mut configs)
            .map_err(platform_error)?;
        Ok(configs)
    }

    fn config_attrib(
        &self,
        display: egl::Display,
        config: egl::Config,
        attribute: i32,
    ) -> Option<i32> {
        self.instance
            .get_config_attrib(display, config, attribute)
            .ok()
    }

    fn create_context(
        &self,
        display: egl::Display,
        config: egl::Config,
        attribs: &[i32],
    ) -> Result<egl::Context, PlatformError> {
        self.instance
            .create_context(display, config, None, attribs)
            .map_err(platform_error)
    }

    fn create_window_surface(
        &self,
        display: egl::Display,
        config: egl::Config,
    ) -> Result<egl::Surface, PlatformError> {
        // SAFETY: the native window outlives the surface; the backend
        // destroys surfaces before the host drops its window.
        unsafe {
            self.instance.create_window_surface(
                display,
                config,
                self.native_window as egl::NativeWindowType,
                None,
            )
        }
        .map_err(platform_error)
    }

    fn current_context(&self) -> Option<egl::Context> {
        self.instance.get_current_context()
    }

    fn make_current(
        &self,
        display: egl::Display,
        binding: Option<(egl::Surface, egl::Context)>,
    ) -> Result<(), PlatformError> {
        let (surface, context) = match binding {
            Some((surface, context)) => (Some(surface), Some(context)),
            None => (None, None),
        };
        self.instance
            .make_current(display, surface, surface, context)
            .map_err(platform_error)
    }

    fn swap_interval(&self, display: egl::Display, interval: i32) -> Result<(), PlatformError> {
        self.instance
            .swap_interval(display, interval)
            .map_err(platform_error)
    }

    fn swap_buffers(&self, display: egl::Display, surface: egl::Surface) -> Result<(), SwapError> {
        self.instance
            .swap_buffers(display, surface)
            .map_err(|err| match err {
                egl::Error::BadSurface | egl::Error::BadNativeWindow => SwapError::SurfaceLost,
                other => SwapError::Driver(platform_error(other)),
            })
    }

    fn destroy_surface(
        &self,
        display: egl::Display,
        surface: egl::Surface,
    ) -> Result<(), PlatformError> {
        self.instance
            .destroy_surface(display, surface)
            .map_err(platform_error)
    }

    fn destroy_context(
        &self,
        display: egl::Display,
        context: egl::Context,
    ) -> Result<(), PlatformError> {
        self.instance
            .destroy_context(display, context)
            .map_err(platform_error)
    }

    fn terminate(&self, display: egl::Display) -> Result<(), PlatformError> {
        self.instance.terminate(display).map_err(platform_error)
    }
}
