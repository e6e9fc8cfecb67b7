//! Dedicated render thread.
//!
//! The thread owns the rendering backend and the shader pipeline for its
//! whole life: both are built there, every GL call happens there, and both
//! are torn down there. The host talks to it only through `RenderCommand`s.

use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use image::RgbaImage;
use presets::{Preset, ShaderCatalog};
use tracing::{debug, error, info, trace, warn};

use crate::egl::{ConfigRequest, RenderingBackend};
use crate::gl::Gl;
use crate::shader::{ExternalTexture, ShaderPipeline};

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the platform objects on the render thread.
pub trait RenderHost: Send + 'static {
    fn create_backend(&mut self) -> Result<Box<dyn RenderingBackend>>;

    /// Called once the context is current on the render thread.
    fn create_gl(&mut self) -> Result<Rc<dyn Gl>>;
}

#[derive(Debug, Clone)]
pub struct RenderThreadConfig {
    pub name: String,
    pub gl_major: i32,
    pub gl_minor: i32,
    pub request: ConfigRequest,
    pub catalog: ShaderCatalog,
    pub chain: Vec<Preset>,
    pub ready_timeout: Duration,
}

impl Default for RenderThreadConfig {
    fn default() -> Self {
        Self {
            name: "gamesurface-render".into(),
            gl_major: 2,
            gl_minor: 0,
            request: ConfigRequest::rgba8888(),
            catalog: ShaderCatalog::new(),
            chain: Vec::new(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

pub enum RenderCommand {
    SourceAvailable {
        source: Box<dyn ExternalTexture + Send>,
        width: u32,
        height: u32,
    },
    SourceDestroyed,
    /// The native window was resized; the surface and context are rebuilt.
    SurfaceChanged {
        width: u32,
        height: u32,
    },
    FrameAvailable,
    Screenshot {
        reply: Sender<Option<RgbaImage>>,
    },
    Shutdown,
}

/// Producer-side handle that signals a new frame. Signals sent after the
/// render thread has stopped are dropped.
#[derive(Debug, Clone)]
pub struct FrameNotifier {
    commands: Sender<RenderCommand>,
}

impl FrameNotifier {
    /// Returns false once the render thread is gone.
    pub fn notify(&self) -> bool {
        let delivered = self.commands.send(RenderCommand::FrameAvailable).is_ok();
        if !delivered {
            trace!("render thread stopped; frame notification dropped");
        }
        delivered
    }
}

impl std::fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderCommand::SourceAvailable { width, height, .. } => f
                .debug_struct("SourceAvailable")
                .field("width", width)
                .field("height", height)
                .finish_non_exhaustive(),
            RenderCommand::SourceDestroyed => f.write_str("SourceDestroyed"),
            RenderCommand::SurfaceChanged { width, height } => f
                .debug_struct("SurfaceChanged")
                .field("width", width)
                .field("height", height)
                .finish(),
            RenderCommand::FrameAvailable => f.write_str("FrameAvailable"),
            RenderCommand::Screenshot { .. } => f.write_str("Screenshot"),
            RenderCommand::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub struct RenderThread {
    commands: Sender<RenderCommand>,
    pass_count: usize,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl RenderThread {
    /// Starts the thread and blocks until its context is ready, it fails,
    /// or `ready_timeout` elapses.
    pub fn spawn<H: RenderHost>(host: H, config: RenderThreadConfig) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded(1);
        let (command_tx, command_rx) = unbounded();
        let timeout = config.ready_timeout;
        let handle = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || run_render_thread(host, config, ready_tx, command_rx))
            .map_err(|err| anyhow!("failed to spawn render thread: {err}"))?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(pass_count)) => Ok(Self {
                commands: command_tx,
                pass_count,
                join_handle: Some(handle),
            }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err.context("render thread failed to initialise"))
            }
            Err(RecvTimeoutError::Timeout) => {
                // Dropping the sender lets a late thread exit on its own.
                drop(command_tx);
                Err(anyhow!("render thread not ready after {timeout:?}"))
            }
            Err(RecvTimeoutError::Disconnected) => match handle.join() {
                Ok(Err(err)) => Err(err.context("render thread failed to initialise")),
                Ok(Ok(())) => Err(anyhow!("render thread exited before signalling readiness")),
                Err(err) => Err(anyhow!("render thread panicked: {err:?}")),
            },
        }
    }

    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    pub fn frame_notifier(&self) -> FrameNotifier {
        FrameNotifier {
            commands: self.commands.clone(),
        }
    }

    pub fn source_available(
        &self,
        source: Box<dyn ExternalTexture + Send>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.send(RenderCommand::SourceAvailable {
            source,
            width,
            height,
        })
    }

    pub fn source_destroyed(&self) -> Result<()> {
        self.send(RenderCommand::SourceDestroyed)
    }

    /// Recreates the window surface and context at the new size and moves
    /// an attached source onto passes sized for it.
    pub fn surface_changed(&self, width: u32, height: u32) -> Result<()> {
        self.send(RenderCommand::SurfaceChanged { width, height })
    }

    pub fn frame_available(&self) -> bool {
        self.frame_notifier().notify()
    }

    /// Renders one frame and returns it; `None` until a source has arrived.
    pub fn screenshot(&self) -> Result<Option<RgbaImage>> {
        let (reply, response) = bounded(1);
        self.send(RenderCommand::Screenshot { reply })?;
        response
            .recv()
            .map_err(|_| anyhow!("render thread stopped before answering screenshot"))
    }

    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn send(&self, command: RenderCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|err| anyhow!("render thread is not running: {:?}", err.into_inner()))
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.commands.send(RenderCommand::Shutdown);
            handle
                .join()
                .map_err(|err| anyhow!("render thread panicked: {err:?}"))??;
        }
        Ok(())
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "render thread did not shut down cleanly");
        }
    }
}

fn run_render_thread<H: RenderHost>(
    mut host: H,
    config: RenderThreadConfig,
    ready_tx: Sender<Result<usize>>,
    commands: Receiver<RenderCommand>,
) -> Result<()> {
    let mut backend = match host.create_backend() {
        Ok(backend) => backend,
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to create rendering backend: {err:#}")));
            return Err(err);
        }
    };

    if let Err(err) =
        backend.create_context(config.gl_major, config.gl_minor, &config.request, false)
    {
        let _ = ready_tx.send(Err(anyhow!(err.clone())));
        if let Err(teardown) = backend.destroy_context() {
            warn!(error = %teardown, "teardown after failed context creation was incomplete");
        }
        return Err(err.into());
    }

    let gl = match host.create_gl() {
        Ok(gl) => gl,
        Err(err) => {
            let _ = ready_tx.send(Err(anyhow!("failed to load GL entry points: {err:#}")));
            if let Err(teardown) = backend.destroy_context() {
                warn!(error = %teardown, "teardown after GL load failure was incomplete");
            }
            return Err(err);
        }
    };
    info!(version = %gl.version_string(), "render thread context ready");

    let pipeline = ShaderPipeline::new(Rc::clone(&gl), &config.catalog, &config.chain);
    let _ = ready_tx.send(Ok(pipeline.pass_count()));

    let mut session = RenderSession {
        backend,
        gl,
        pipeline,
        gl_major: config.gl_major,
        gl_minor: config.gl_minor,
        request: config.request,
        parked: None,
    };
    for command in commands.iter() {
        trace!(?command, "render command");
        if !session.handle(command) {
            break;
        }
    }
    session.finish()
}

struct RenderSession {
    backend: Box<dyn RenderingBackend>,
    gl: Rc<dyn Gl>,
    pipeline: ShaderPipeline,
    gl_major: i32,
    gl_minor: i32,
    request: ConfigRequest,
    /// Source held back while a resized surface could not be recreated.
    parked: Option<Box<dyn ExternalTexture>>,
}

impl RenderSession {
    /// Returns false on shutdown.
    fn handle(&mut self, command: RenderCommand) -> bool {
        match command {
            RenderCommand::SourceAvailable {
                source,
                width,
                height,
            } => {
                self.parked = None;
                if self.pipeline.is_initialized() {
                    self.replace_pipeline();
                }
                self.pipeline.on_source_available(source, width, height);
                // Present right away so a paused producer is not left on a
                // black window.
                self.render();
            }
            RenderCommand::SourceDestroyed => {
                self.parked = None;
                self.pipeline.on_source_destroyed();
            }
            RenderCommand::SurfaceChanged { width, height } => self.surface_changed(width, height),
            RenderCommand::FrameAvailable => self.render(),
            RenderCommand::Screenshot { reply } => {
                let image = if self.backend.is_context_ready() {
                    self.pipeline.on_draw_frame();
                    let image = self.pipeline.capture();
                    self.backend.flip_buffers();
                    image
                } else {
                    None
                };
                if reply.send(image).is_err() {
                    debug!("screenshot requester went away");
                }
            }
            RenderCommand::Shutdown => return false,
        }
        true
    }

    /// A pipeline attaches at most once, so a replacement source gets a
    /// fresh pipeline over the same resolved passes.
    fn replace_pipeline(&mut self) {
        self.pipeline.on_source_destroyed();
        let descriptors = self.pipeline.descriptors().to_vec();
        let fresh = ShaderPipeline::from_descriptors(Rc::clone(&self.gl), descriptors);
        // Old GL objects go before the new pipeline allocates any.
        drop(std::mem::replace(&mut self.pipeline, fresh));
        debug!(passes = self.pipeline.pass_count(), "rebuilt shader pipeline for new source");
    }

    fn surface_changed(&mut self, width: u32, height: u32) {
        let source = self.pipeline.take_source().or_else(|| self.parked.take());
        // Release GL objects while the old context is still current.
        self.replace_pipeline();
        if let Err(err) =
            self.backend
                .create_context(self.gl_major, self.gl_minor, &self.request, true)
        {
            error!(error = %err, width, height, "failed to recreate context for resized surface");
            self.parked = source;
            return;
        }
        match source {
            Some(source) => {
                self.pipeline.on_source_available(source, width, height);
                self.render();
            }
            None => debug!(width, height, "surface recreated without a frame source"),
        }
    }

    fn render(&mut self) {
        if !self.backend.is_context_ready() {
            trace!("context not ready; frame skipped");
            return;
        }
        self.pipeline.on_draw_frame();
        self.backend.flip_buffers();
    }

    fn finish(self) -> Result<()> {
        let RenderSession {
            mut backend,
            gl,
            mut pipeline,
            parked,
            ..
        } = self;
        pipeline.on_source_destroyed();
        // GL objects go while the context is still current.
        drop(pipeline);
        drop(parked);
        drop(gl);
        match backend.destroy_context() {
            Ok(()) => {
                debug!("render thread stopped");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "render thread teardown incomplete");
                Err(err).context("failed to destroy rendering context")
            }
        }
    }
}
