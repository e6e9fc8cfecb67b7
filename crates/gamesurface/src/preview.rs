use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use renderer::{
    cpu_frame_channel, save_png, select_backend, BackendOptions, FrameNotifier, FrameProducer,
    Gl, GlowGl, KhronosEgl, PauseFlag, ReadyNotifier, RenderHost, RenderThread,
    RenderingBackend, Size,
};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::bindings::{backend_options, thread_config};
use crate::cli::PreviewArgs;
use crate::run::{load_catalog, load_config};

const FEED_SIZE: Size = Size::new(320, 240);
const FEED_INTERVAL: Duration = Duration::from_millis(16);

pub fn run_preview(args: &PreviewArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let catalog = load_catalog(&config);

    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = args.size;
    let window = WindowBuilder::new()
        .with_title("gamesurface preview")
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;

    let (native_display, native_window) = native_handles(&window)?;
    let pause = PauseFlag::new();
    let host = PreviewHost {
        native_display,
        native_window,
        api_level: config.context.api_level,
        options: backend_options(&config, pause.clone()),
        egl: None,
    };
    let thread = RenderThread::spawn(host, thread_config(&config, catalog))
        .context("failed to start render thread")?;
    tracing::info!(passes = thread.pass_count(), width, height, "preview running");

    let (producer, source) = cpu_frame_channel(FEED_SIZE);
    thread.source_available(Box::new(source), width, height)?;
    let stop = Arc::new(AtomicBool::new(false));
    let feed = spawn_feed(producer, thread.frame_notifier(), Arc::clone(&stop))?;

    let mut session = Some(PreviewSession {
        thread,
        feed,
        stop,
    });
    let screenshot = args.screenshot.clone();
    let mut surface_size = (width, height);

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            let Event::WindowEvent { event, window_id } = event else {
                return;
            };
            if window_id != window.id() {
                return;
            }
            match event {
                WindowEvent::CloseRequested => {
                    if let Some(session) = session.take() {
                        if let Err(err) = session.finish(screenshot.as_deref()) {
                            tracing::error!(error = %err, "preview shutdown failed");
                        }
                    }
                    elwt.exit();
                }
                WindowEvent::Resized(size)
                    if size.width > 0
                        && size.height > 0
                        && (size.width, size.height) != surface_size =>
                {
                    if let Some(session) = session.as_ref() {
                        let (width, height) = (size.width, size.height);
                        surface_size = (width, height);
                        tracing::debug!(width, height, "window resized");
                        if let Err(err) = session.thread.surface_changed(width, height) {
                            tracing::error!(error = %err, "failed to forward resize");
                        }
                    }
                }
                WindowEvent::KeyboardInput { event, .. }
                    if event.state == ElementState::Pressed
                        && event.logical_key == Key::Named(NamedKey::Space) =>
                {
                    let paused = !pause.is_paused();
                    pause.set_paused(paused);
                    tracing::info!(paused, "toggled pause");
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop failed: {err}"))
}

/// X11 native display pointer (0 for the default display) and window id.
fn native_handles(window: &Window) -> Result<(usize, usize)> {
    let display = window
        .display_handle()
        .map_err(|err| anyhow!("window has no display handle: {err}"))?;
    let native_display = match display.as_raw() {
        RawDisplayHandle::Xlib(handle) => handle
            .display
            .map_or(0, |display| display.as_ptr() as usize),
        RawDisplayHandle::Xcb(_) => 0,
        other => bail!("preview needs an X11 display, got {other:?}"),
    };

    let handle = window
        .window_handle()
        .map_err(|err| anyhow!("window has no native handle: {err}"))?;
    let native_window = match handle.as_raw() {
        RawWindowHandle::Xlib(handle) => handle.window as usize,
        RawWindowHandle::Xcb(handle) => handle.window.get() as usize,
        other => bail!("preview needs an X11 window, got {other:?}"),
    };
    Ok((native_display, native_window))
}

struct PreviewHost {
    native_display: usize,
    native_window: usize,
    api_level: u32,
    options: BackendOptions,
    egl: Option<KhronosEgl>,
}

impl RenderHost for PreviewHost {
    fn create_backend(&mut self) -> Result<Box<dyn RenderingBackend>> {
        let egl = KhronosEgl::load(self.native_display, self.native_window)?;
        self.egl = Some(egl.clone());
        let notifier = ReadyNotifier::callback(|info| {
            tracing::info!(
                generation = ?info.generation,
                full_gl = info.full_gl,
                gl_major = info.gl_major,
                "EGL context ready"
            );
        });
        Ok(select_backend(
            self.api_level,
            egl,
            self.options.clone(),
            notifier,
        ))
    }

    fn create_gl(&mut self) -> Result<Rc<dyn Gl>> {
        let egl = self
            .egl
            .as_ref()
            .ok_or_else(|| anyhow!("EGL must be loaded before GL"))?;
        // SAFETY: entry points come from the EGL instance whose context is
        // current on this thread for as long as the returned GL is used.
        let gl = unsafe { GlowGl::from_loader(|name| egl.proc_address(name)) };
        Ok(Rc::new(gl))
    }
}

struct PreviewSession {
    thread: RenderThread,
    feed: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

impl PreviewSession {
    fn finish(self, screenshot: Option<&std::path::Path>) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        if self.feed.join().is_err() {
            tracing::warn!("frame feed thread panicked");
        }
        if let Some(path) = screenshot {
            match self.thread.screenshot()? {
                Some(image) => save_png(&image, path)?,
                None => tracing::warn!("no frame to capture"),
            }
        }
        self.thread.source_destroyed()?;
        self.thread.shutdown()
    }
}

fn spawn_feed(
    producer: FrameProducer,
    notifier: FrameNotifier,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("gamesurface-feed".into())
        .spawn(move || {
            let size = producer.size();
            let mut frame = vec![[0u8; 4]; size.pixel_count()];
            let mut tick = 0u32;
            while !stop.load(Ordering::Acquire) {
                fill_test_frame(&mut frame, size, tick);
                if let Err(err) = producer.submit(&frame) {
                    tracing::warn!(error = %err, "frame feed stopped");
                    break;
                }
                if !notifier.notify() {
                    break;
                }
                tick = tick.wrapping_add(1);
                thread::sleep(FEED_INTERVAL);
            }
        })
        .map_err(|err| anyhow!("failed to spawn frame feed: {err}"))
}

/// Scrolling gradient with a checker overlay; scanline and blur passes
/// show clearly against it.
fn fill_test_frame(frame: &mut [[u8; 4]], size: Size, tick: u32) {
    let width = size.width.max(1);
    for (index, pixel) in frame.iter_mut().enumerate() {
        let x = index as u32 % width;
        let y = index as u32 / width;
        let checker = if ((x / 16) + (y / 16)) % 2 == 0 { 48 } else { 0 };
        *pixel = [
            (x.wrapping_add(tick) & 0xff) as u8,
            (y.wrapping_add(tick / 2) & 0xff) as u8,
            (((x + y) / 2 + checker) & 0xff) as u8,
            u8::MAX,
        ];
    }
}
