use std::fmt;

use crossbeam_channel::Sender;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

use super::{
    select_config, ClientApi, ConfigRequest, EglApi, PlatformError, CONTEXT_CLIENT_VERSION,
    MAX_CONFIGS, NONE, OPENGL_BIT,
};
use crate::types::PauseFlag;

/// Presentation time offset applied before each swap on the modern path.
const PRESENTATION_OFFSET_NANOS: i64 = -4_000;

/// A native EGL handle that may never have been requested, may have been
/// requested and refused, or may be live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle<T> {
    /// Never requested, or released.
    Uninitialized,
    Valid(T),
    /// The platform refused the last request.
    Failed,
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Handle::Uninitialized
    }
}

impl<T: Copy> Handle<T> {
    /// The live handle, if any.
    pub fn valid(&self) -> Option<T> {
        match self {
            Handle::Valid(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Handle::Valid(_))
    }

    /// True only for `Uninitialized`; a `Failed` handle is not.
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Handle::Uninitialized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextStep {
    Display,
    Initialize,
    ChooseConfig,
    CreateContext,
    CreateSurface,
    MakeCurrent,
    Unbind,
    DestroySurface,
    DestroyContext,
    Terminate,
}

impl fmt::Display for ContextStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContextStep::Display => "get display",
            ContextStep::Initialize => "initialize display",
            ContextStep::ChooseConfig => "choose config",
            ContextStep::CreateContext => "create context",
            ContextStep::CreateSurface => "create window surface",
            ContextStep::MakeCurrent => "make current",
            ContextStep::Unbind => "unbind",
            ContextStep::DestroySurface => "destroy surface",
            ContextStep::DestroyContext => "destroy context",
            ContextStep::Terminate => "terminate display",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("no EGL config matches the requested attributes")]
    ConfigurationUnavailable,

    #[error("EGL {step} failed")]
    ResourceCreation {
        step: ContextStep,
        #[source]
        cause: Option<PlatformError>,
    },

    #[error("context and surface must both be valid to bind")]
    NotBindable,

    #[error("EGL teardown incomplete; failed steps: {failed:?}")]
    Teardown { failed: Vec<ContextStep> },
}

impl ContextError {
    pub fn step(&self) -> Option<ContextStep> {
        match self {
            ContextError::ConfigurationUnavailable => Some(ContextStep::ChooseConfig),
            ContextError::ResourceCreation { step, .. } => Some(*step),
            ContextError::NotBindable => Some(ContextStep::MakeCurrent),
            ContextError::Teardown { failed } => failed.first().copied(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    Ready,
    NotReady,
}

/// The two EGL API generations the backend can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiGeneration {
    /// EGL 1.0 entry points: GLES only.
    Legacy,
    /// EGL 1.4 entry points: optional desktop GL and presentation timestamps.
    Modern,
}

impl ApiGeneration {
    /// First platform API level with the EGL 1.4 bindings.
    pub const MODERN_API_LEVEL: u32 = 17;

    pub fn for_api_level(api_level: u32) -> Self {
        if api_level >= Self::MODERN_API_LEVEL {
            ApiGeneration::Modern
        } else {
            ApiGeneration::Legacy
        }
    }

    pub fn supports_full_gl(self) -> bool {
        matches!(self, ApiGeneration::Modern)
    }

    pub fn stamps_presentation_time(self) -> bool {
        matches!(self, ApiGeneration::Modern)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Ask for desktop OpenGL instead of GLES where the generation allows it.
    pub try_full_gl: bool,
    /// Applied after every successful bind; `None` keeps the driver default.
    pub swap_interval: Option<i32>,
    pub pause: PauseFlag,
}

/// What the host learns once a context is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub generation: ApiGeneration,
    pub full_gl: bool,
    pub gl_major: i32,
    pub gl_version: Option<String>,
}

type ReadyCallback = Box<dyn FnMut(&ContextInfo) + Send>;

/// Fired once per successful `create_context`.
pub struct ReadyNotifier(Option<ReadyCallback>);

impl ReadyNotifier {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn callback(callback: impl FnMut(&ContextInfo) + Send + 'static) -> Self {
        Self(Some(Box::new(callback)))
    }

    /// Forwards to a channel without blocking the render thread.
    pub fn channel(sender: Sender<ContextInfo>) -> Self {
        Self::callback(move |info| {
            if sender.try_send(info.clone()).is_err() {
                trace!("context ready notification dropped");
            }
        })
    }

    fn notify(&mut self, info: &ContextInfo) {
        if let Some(callback) = self.0.as_mut() {
            callback(info);
        }
    }
}

impl fmt::Debug for ReadyNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadyNotifier")
            .field(&self.0.as_ref().map(|_| "callback"))
            .finish()
    }
}

/// Lifecycle of one rendering context bound to one window surface.
pub trait RenderingBackend {
    /// Brings the context to `Ready`, reusing whatever is still valid unless
    /// `force_recreate` is set. A failure unwinds everything and terminates
    /// the display; callers retry from a clean state.
    fn create_context(
        &mut self,
        gl_major: i32,
        gl_minor: i32,
        request: &ConfigRequest,
        force_recreate: bool,
    ) -> Result<(), ContextError>;

    /// Best-effort teardown. Every step runs; all handles end uninitialized.
    fn destroy_context(&mut self) -> Result<(), ContextError>;

    /// Makes context and surface current on this thread. Both must be valid.
    fn bind(&mut self) -> Result<(), ContextError>;

    /// Releases the current context from this thread.
    fn unbind(&mut self) -> Result<(), ContextError>;

    fn is_context_ready(&self) -> bool;

    /// Marks the context stale without touching any handle, e.g. when the
    /// native window goes away underneath it.
    fn set_context_not_ready(&mut self);

    /// Presents the back buffer. Swap failures are logged and dropped.
    fn flip_buffers(&mut self);

    /// Platform generation chosen at construction.
    fn generation(&self) -> ApiGeneration;

    fn state(&self) -> ContextState;
}

/// The one `RenderingBackend`. Generation differences (desktop GL binding,
/// presentation stamps) are data on the struct, not separate types.
pub struct EglBackend<P: EglApi> {
    platform: P,
    generation: ApiGeneration,
    options: BackendOptions,
    notifier: ReadyNotifier,
    display: Handle<P::Display>,
    display_initialized: bool,
    config: Handle<P::Config>,
    context: Handle<P::Context>,
    surface: Handle<P::Surface>,
    full_gl: bool,
    state: ContextState,
}

/// Picks the generation for `api_level` and boxes the backend.
pub fn select_backend<P>(
    api_level: u32,
    platform: P,
    options: BackendOptions,
    notifier: ReadyNotifier,
) -> Box<dyn RenderingBackend>
where
    P: EglApi + 'static,
{
    let generation = ApiGeneration::for_api_level(api_level);
    debug!(api_level, ?generation, "selected EGL backend");
    Box::new(EglBackend::new(platform, generation, options, notifier))
}

impl<P: EglApi> EglBackend<P> {
    pub fn new(
        platform: P,
        generation: ApiGeneration,
        options: BackendOptions,
        notifier: ReadyNotifier,
    ) -> Self {
        Self {
            platform,
            generation,
            options,
            notifier,
            display: Handle::Uninitialized,
            display_initialized: false,
            config: Handle::Uninitialized,
            context: Handle::Uninitialized,
            surface: Handle::Uninitialized,
            full_gl: false,
            state: ContextState::Uninitialized,
        }
    }

    /// Platform bindings the backend drives.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    // Handle accessors, mainly for tests and diagnostics.

    pub fn display(&self) -> Handle<P::Display> {
        self.display
    }

    pub fn config(&self) -> Handle<P::Config> {
        self.config
    }

    pub fn context(&self) -> Handle<P::Context> {
        self.context
    }

    pub fn surface(&self) -> Handle<P::Surface> {
        self.surface
    }

    /// True when the desktop OpenGL API was bound for the current context.
    pub fn is_full_gl(&self) -> bool {
        self.full_gl
    }

    fn acquire(
        &mut self,
        gl_major: i32,
        request: &ConfigRequest,
        force_recreate: bool,
    ) -> Result<ContextInfo, ContextError> {
        if self.surface.is_valid() {
            debug!("releasing window surface before recreation");
            self.unbind_current().map_err(|step| creation_failed(step, None))?;
            self.release_surface()
                .map_err(|step| creation_failed(step, None))?;
        }

        let display = self.acquire_display()?;
        let config = self.acquire_config(display, request, force_recreate)?;
        let context = self.acquire_context(display, config, gl_major, force_recreate)?;
        let surface = self.acquire_surface(display, config)?;
        self.make_current(display, surface, context)?;

        if let Some(interval) = self.options.swap_interval {
            match self.platform.swap_interval(display, interval) {
                Ok(()) => debug!(interval, "applied swap interval"),
                Err(err) => warn!(interval, error = %err, "failed to apply swap interval"),
            }
        }

        let gl_version = self.platform.gl_version();
        if let Some(version) = &gl_version {
            info!(version = %version, "GL driver version");
        }

        Ok(ContextInfo {
            generation: self.generation,
            full_gl: self.full_gl,
            gl_major,
            gl_version,
        })
    }

    fn acquire_display(&mut self) -> Result<P::Display, ContextError> {
        let display = match self.display {
            Handle::Valid(display) if self.display_initialized => {
                debug!("re-used EGL display");
                return Ok(display);
            }
            Handle::Valid(display) => display,
            Handle::Uninitialized | Handle::Failed => {
                self.full_gl = self.generation.supports_full_gl()
                    && self.options.try_full_gl
                    && self.platform.bind_api(ClientApi::OpenGl);
                if self.options.try_full_gl && !self.full_gl {
                    warn!(generation = ?self.generation, "desktop OpenGL unavailable; using GLES");
                }

                match self.platform.get_display() {
                    Some(display) => {
                        let egl_display = display;
                        debug!(display = ?egl_display, "acquired EGL display");
                        self.display = Handle::Valid(display);
                        display
                    }
                    None => {
                        self.display = Handle::Failed;
                        return Err(creation_failed(ContextStep::Display, None));
                    }
                }
            }
        };

        match self.platform.initialize(display) {
            Ok((major, minor)) => {
                self.display_initialized = true;
                debug!(major, minor, "initialised EGL display");
                Ok(display)
            }
            Err(err) => Err(creation_failed(ContextStep::Initialize, Some(err))),
        }
    }

    fn acquire_config(
        &mut self,
        display: P::Display,
        request: &ConfigRequest,
        force_recreate: bool,
    ) -> Result<P::Config, ContextError> {
        if let (Handle::Valid(config), true, false) =
            (self.config, self.context.is_valid(), force_recreate)
        {
            debug!("re-used EGL config");
            return Ok(config);
        }

        let request = if self.full_gl {
            request.clone().with_renderable_type(OPENGL_BIT)
        } else {
            request.clone()
        };

        let candidates = match self
            .platform
            .choose_configs(display, &request.to_attrib_list(), MAX_CONFIGS)
        {
            Ok(candidates) => candidates,
            Err(err) => {
                self.config = Handle::Failed;
                return Err(creation_failed(ContextStep::ChooseConfig, Some(err)));
            }
        };

        let platform = &self.platform;
        let chosen = select_config(&candidates, &request, |config, attribute| {
            platform.config_attrib(display, *config, attribute.code())
        });
        match chosen {
            Ok(config) => {
                self.config = Handle::Valid(config);
                Ok(config)
            }
            Err(err) => {
                self.config = Handle::Failed;
                error!(step = ?ContextStep::ChooseConfig, error = %err, "EGL context creation failed");
                Err(err)
            }
        }
    }

    fn acquire_context(
        &mut self,
        display: P::Display,
        config: P::Config,
        gl_major: i32,
        force_recreate: bool,
    ) -> Result<P::Context, ContextError> {
        if let Handle::Valid(context) = self.context {
            if !force_recreate {
                debug!("re-used EGL context");
                return Ok(context);
            }
            self.release_context()
                .map_err(|step| creation_failed(step, None))?;
        }

        let attribs = if self.full_gl {
            vec![NONE]
        } else {
            vec![CONTEXT_CLIENT_VERSION, gl_major, NONE]
        };
        match self.platform.create_context(display, config, &attribs) {
            Ok(context) => {
                debug!(?context, gl_major, full_gl = self.full_gl, "created EGL context");
                self.context = Handle::Valid(context);
                Ok(context)
            }
            Err(err) => {
                self.context = Handle::Failed;
                Err(creation_failed(ContextStep::CreateContext, Some(err)))
            }
        }
    }

    fn acquire_surface(
        &mut self,
        display: P::Display,
        config: P::Config,
    ) -> Result<P::Surface, ContextError> {
        if let Handle::Valid(surface) = self.surface {
            debug!("re-used EGL window surface");
            return Ok(surface);
        }

        match self.platform.create_window_surface(display, config) {
            Ok(surface) => {
                debug!(?surface, "created EGL window surface");
                self.surface = Handle::Valid(surface);
                Ok(surface)
            }
            Err(err) => {
                self.surface = Handle::Failed;
                Err(creation_failed(ContextStep::CreateSurface, Some(err)))
            }
        }
    }

    fn make_current(
        &mut self,
        display: P::Display,
        surface: P::Surface,
        context: P::Context,
    ) -> Result<(), ContextError> {
        if self.platform.current_context() == Some(context) {
            debug!("EGL context already current");
            return Ok(());
        }
        self.platform
            .make_current(display, Some((surface, context)))
            .map_err(|err| creation_failed(ContextStep::MakeCurrent, Some(err)))?;
        debug!("bound EGL context");
        Ok(())
    }

    fn unbind_current(&mut self) -> Result<(), ContextStep> {
        let Handle::Valid(display) = self.display else {
            return Ok(());
        };
        if !self.context.is_valid() && !self.surface.is_valid() {
            return Ok(());
        }
        self.platform.make_current(display, None).map_err(|err| {
            error!(step = ?ContextStep::Unbind, error = %err, "failed to release EGL context");
            ContextStep::Unbind
        })
    }

    fn release_surface(&mut self) -> Result<(), ContextStep> {
        let Handle::Valid(surface) = self.surface else {
            return Ok(());
        };
        self.surface = Handle::Uninitialized;
        let Handle::Valid(display) = self.display else {
            return Ok(());
        };
        self.platform
            .destroy_surface(display, surface)
            .map(|()| debug!(?surface, "destroyed EGL window surface"))
            .map_err(|err| {
                error!(step = ?ContextStep::DestroySurface, error = %err, "failed to destroy EGL surface");
                ContextStep::DestroySurface
            })
    }

    fn release_context(&mut self) -> Result<(), ContextStep> {
        let Handle::Valid(context) = self.context else {
            return Ok(());
        };
        self.context = Handle::Uninitialized;
        let Handle::Valid(display) = self.display else {
            return Ok(());
        };
        self.platform
            .destroy_context(display, context)
            .map(|()| debug!(?context, "destroyed EGL context"))
            .map_err(|err| {
                error!(step = ?ContextStep::DestroyContext, error = %err, "failed to destroy EGL context");
                ContextStep::DestroyContext
            })
    }

    fn release_display(&mut self) -> Result<(), ContextStep> {
        // Configs belong to the display connection.
        if self.config.is_valid() {
            self.config = Handle::Uninitialized;
        }
        self.display_initialized = false;
        let Handle::Valid(display) = self.display else {
            return Ok(());
        };
        self.display = Handle::Uninitialized;
        self.platform
            .terminate(display)
            .map(|()| {
                let egl_display = display;
                debug!(display = ?egl_display, "terminated EGL display")
            })
            .map_err(|err| {
                error!(step = ?ContextStep::Terminate, error = %err, "failed to terminate EGL display");
                ContextStep::Terminate
            })
    }

    /// Releases every live handle in reverse creation order, attempting
    /// each step regardless of earlier failures.
    fn teardown(&mut self) -> Vec<ContextStep> {
        let mut failed = Vec::new();
        if let Err(step) = self.unbind_current() {
            failed.push(step);
        }
        if let Err(step) = self.release_surface() {
            failed.push(step);
        }
        if let Err(step) = self.release_context() {
            failed.push(step);
        }
        if let Err(step) = self.release_display() {
            failed.push(step);
        }
        failed
    }
}

fn creation_failed(step: ContextStep, cause: Option<PlatformError>) -> ContextError {
    match cause {
        Some(err) => error!(step = ?step, error = %err, "EGL context creation failed"),
        None => error!(step = ?step, "EGL context creation failed"),
    }
    ContextError::ResourceCreation { step, cause }
}

impl<P: EglApi> RenderingBackend for EglBackend<P> {
    fn create_context(
        &mut self,
        gl_major: i32,
        gl_minor: i32,
        request: &ConfigRequest,
        force_recreate: bool,
    ) -> Result<(), ContextError> {
        if !force_recreate
            && self.state == ContextState::Ready
            && self.context.is_valid()
            && self.surface.is_valid()
        {
            debug!("re-used ready EGL context");
            return Ok(());
        }

        info!(
            generation = ?self.generation,
            gl_major,
            gl_minor,
            force_recreate,
            "creating EGL context"
        );
        match self.acquire(gl_major, request, force_recreate) {
            Ok(info) => {
                self.state = ContextState::Ready;
                info!(full_gl = info.full_gl, "EGL context ready");
                self.notifier.notify(&info);
                Ok(())
            }
            Err(err) => {
                let leftovers = self.teardown();
                if !leftovers.is_empty() {
                    warn!(failed = ?leftovers, "unwinding partial EGL context left resources behind");
                }
                self.state = ContextState::NotReady;
                Err(err)
            }
        }
    }

    fn destroy_context(&mut self) -> Result<(), ContextError> {
        let failed = self.teardown();
        self.display = Handle::Uninitialized;
        self.config = Handle::Uninitialized;
        self.context = Handle::Uninitialized;
        self.surface = Handle::Uninitialized;
        self.display_initialized = false;
        self.full_gl = false;
        self.state = ContextState::NotReady;

        if failed.is_empty() {
            debug!("EGL context destroyed");
            Ok(())
        } else {
            Err(ContextError::Teardown { failed })
        }
    }

    fn bind(&mut self) -> Result<(), ContextError> {
        let (Handle::Valid(display), Handle::Valid(surface), Handle::Valid(context)) =
            (self.display, self.surface, self.context)
        else {
            return Err(ContextError::NotBindable);
        };
        self.make_current(display, surface, context)
    }

    fn unbind(&mut self) -> Result<(), ContextError> {
        self.unbind_current()
            .map_err(|step| ContextError::Teardown { failed: vec![step] })
    }

    fn is_context_ready(&self) -> bool {
        self.state == ContextState::Ready
    }

    fn set_context_not_ready(&mut self) {
        if self.state == ContextState::Ready {
            debug!("EGL context marked not ready");
            self.state = ContextState::NotReady;
        }
    }

    fn flip_buffers(&mut self) {
        if self.options.pause.is_paused() {
            trace!("emulation paused; skipping buffer swap");
            return;
        }
        let (Handle::Valid(display), Handle::Valid(surface)) = (self.display, self.surface) else {
            trace!(generation = ?self.generation, "no window surface; skipping buffer swap");
            return;
        };
        if self.generation.stamps_presentation_time() {
            self.platform
                .stamp_presentation(display, surface, PRESENTATION_OFFSET_NANOS);
        }
        if let Err(err) = self.platform.swap_buffers(display, surface) {
            error!(error = %err, "buffer swap failed; continuing with next frame");
        }
    }

    fn generation(&self) -> ApiGeneration {
        self.generation
    }

    fn state(&self) -> ContextState {
        self.state
    }
}
