//! Recording fakes for the `Gl`, `EglApi` and `ExternalTexture` seams.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::egl::{ClientApi, ContextStep, EglApi, PlatformError, SwapError};
use crate::gl::{
    BufferId, Filter, FramebufferId, Gl, ProgramId, ShaderId, ShaderStage, TextureId,
    TextureTarget, UniformLocation, FRAMEBUFFER_COMPLETE,
};
use crate::shader::{ExternalTexture, SourceError};
use crate::types::Size;

const FAKE_DISPLAY: u32 = 1;
const FIRST_CONFIG: u32 = 100;
const FIRST_OBJECT: u32 = 1000;

const EGL_BAD_ACCESS: i32 = 0x3002;
const EGL_BAD_ALLOC: i32 = 0x3003;
const EGL_BAD_CONFIG: i32 = 0x3005;
const EGL_BAD_DISPLAY: i32 = 0x3008;
const EGL_BAD_NATIVE_WINDOW: i32 = 0x300B;
const EGL_BAD_SURFACE: i32 = 0x300D;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EglCall {
    BindApi(ClientApi),
    GetDisplay,
    Initialize,
    ChooseConfigs(Vec<i32>),
    ConfigAttrib(u32, i32),
    CreateContext(Vec<i32>),
    CreateWindowSurface,
    CurrentContext,
    MakeCurrent(bool),
    SwapInterval(i32),
    SwapBuffers,
    StampPresentation(i64),
    DestroySurface(u32),
    DestroyContext(u32),
    Terminate,
    GlVersion,
}

#[derive(Debug)]
struct EglState {
    /// Per candidate: red, green, blue, alpha, depth.
    configs: Vec<[i32; 5]>,
    calls: Vec<EglCall>,
    failures: HashSet<ContextStep>,
    next_object: u32,
    live: HashSet<u32>,
    current: Option<u32>,
    full_gl_supported: bool,
    swap_failure: bool,
}

/// In-memory EGL. Clones share state so a test can keep a handle to the
/// platform it moved into a backend.
#[derive(Debug, Clone)]
pub struct FakeEgl {
    state: Arc<Mutex<EglState>>,
}

impl FakeEgl {
    pub fn new(configs: Vec<[i32; 5]>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EglState {
                configs,
                calls: Vec::new(),
                failures: HashSet::new(),
                next_object: FIRST_OBJECT,
                live: HashSet::new(),
                current: None,
                full_gl_supported: true,
                swap_failure: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EglState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<EglCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn fail_at(&self, step: ContextStep) {
        self.lock().failures.insert(step);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Contexts plus surfaces not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.lock().live.len()
    }

    pub fn set_full_gl_supported(&self, supported: bool) {
        self.lock().full_gl_supported = supported;
    }

    pub fn set_swap_failure(&self, failing: bool) {
        self.lock().swap_failure = failing;
    }

    /// Records `call` and reports whether `step` is set to fail.
    fn record(&self, call: EglCall, step: Option<ContextStep>) -> bool {
        let mut state = self.lock();
        state.calls.push(call);
        step.is_some_and(|step| state.failures.contains(&step))
    }
}

fn check(failing: bool, code: i32) -> Result<(), PlatformError> {
    if failing {
        Err(PlatformError::new(code))
    } else {
        Ok(())
    }
}

impl EglApi for FakeEgl {
    type Display = u32;
    type Config = u32;
    type Context = u32;
    type Surface = u32;

    fn bind_api(&self, api: ClientApi) -> bool {
        self.record(EglCall::BindApi(api), None);
        match api {
            ClientApi::OpenGlEs => true,
            ClientApi::OpenGl => self.lock().full_gl_supported,
        }
    }

    fn get_display(&self) -> Option<u32> {
        if self.record(EglCall::GetDisplay, Some(ContextStep::Display)) {
            None
        } else {
            Some(FAKE_DISPLAY)
        }
    }

    fn initialize(&self, _display: u32) -> Result<(i32, i32), PlatformError> {
        let failing = self.record(EglCall::Initialize, Some(ContextStep::Initialize));
        check(failing, EGL_BAD_DISPLAY).map(|()| (1, 4))
    }

    fn choose_configs(
        &self,
        _display: u32,
        attribs: &[i32],
        max: usize,
    ) -> Result<Vec<u32>, PlatformError> {
        let failing = self.record(
            EglCall::ChooseConfigs(attribs.to_vec()),
            Some(ContextStep::ChooseConfig),
        );
        check(failing, EGL_BAD_CONFIG)?;
        let count = self.lock().configs.len().min(max);
        Ok((0..count as u32).map(|index| FIRST_CONFIG + index).collect())
    }

    fn config_attrib(&self, _display: u32, config: u32, attribute: i32) -> Option<i32> {
        self.record(EglCall::ConfigAttrib(config, attribute), None);
        let state = self.lock();
        let values = state
            .configs
            .get(config.checked_sub(FIRST_CONFIG)? as usize)?;
        match attribute {
            0x3024 => Some(values[0]),
            0x3023 => Some(values[1]),
            0x3022 => Some(values[2]),
            0x3021 => Some(values[3]),
            0x3025 => Some(values[4]),
            0x3026 => Some(0),
            _ => None,
        }
    }

    fn create_context(
        &self,
        _display: u32,
        _config: u32,
        attribs: &[i32],
    ) -> Result<u32, PlatformError> {
        let failing = self.record(
            EglCall::CreateContext(attribs.to_vec()),
            Some(ContextStep::CreateContext),
        );
        check(failing, EGL_BAD_ALLOC)?;
        Ok(self.allocate())
    }

    fn create_window_surface(&self, _display: u32, _config: u32) -> Result<u32, PlatformError> {
        let failing = self.record(EglCall::CreateWindowSurface, Some(ContextStep::CreateSurface));
        check(failing, EGL_BAD_NATIVE_WINDOW)?;
        Ok(self.allocate())
    }

    fn current_context(&self) -> Option<u32> {
        self.record(EglCall::CurrentContext, None);
        self.lock().current
    }

    fn make_current(
        &self,
        _display: u32,
        binding: Option<(u32, u32)>,
    ) -> Result<(), PlatformError> {
        match binding {
            Some((_, context)) => {
                let failing = self.record(EglCall::MakeCurrent(true), Some(ContextStep::MakeCurrent));
                check(failing, EGL_BAD_ACCESS)?;
                self.lock().current = Some(context);
            }
            None => {
                let failing = self.record(EglCall::MakeCurrent(false), Some(ContextStep::Unbind));
                check(failing, EGL_BAD_ACCESS)?;
                self.lock().current = None;
            }
        }
        Ok(())
    }

    fn swap_interval(&self, _display: u32, interval: i32) -> Result<(), PlatformError> {
        self.record(EglCall::SwapInterval(interval), None);
        Ok(())
    }

    fn swap_buffers(&self, _display: u32, _surface: u32) -> Result<(), SwapError> {
        self.record(EglCall::SwapBuffers, None);
        if self.lock().swap_failure {
            Err(SwapError::Driver(PlatformError::new(EGL_BAD_SURFACE)))
        } else {
            Ok(())
        }
    }

    fn destroy_surface(&self, _display: u32, surface: u32) -> Result<(), PlatformError> {
        let failing = self.record(
            EglCall::DestroySurface(surface),
            Some(ContextStep::DestroySurface),
        );
        self.lock().live.remove(&surface);
        check(failing, EGL_BAD_SURFACE)
    }

    fn destroy_context(&self, _display: u32, context: u32) -> Result<(), PlatformError> {
        let failing = self.record(
            EglCall::DestroyContext(context),
            Some(ContextStep::DestroyContext),
        );
        {
            let mut state = self.lock();
            state.live.remove(&context);
            if state.current == Some(context) {
                state.current = None;
            }
        }
        check(failing, EGL_BAD_ACCESS)
    }

    fn terminate(&self, _display: u32) -> Result<(), PlatformError> {
        let failing = self.record(EglCall::Terminate, Some(ContextStep::Terminate));
        check(failing, EGL_BAD_DISPLAY)
    }

    fn stamp_presentation(&self, _display: u32, _surface: u32, offset_nanos: i64) -> bool {
        self.record(EglCall::StampPresentation(offset_nanos), None);
        true
    }

    fn gl_version(&self) -> Option<String> {
        self.record(EglCall::GlVersion, None);
        Some("OpenGL ES 2.0 fake".to_string())
    }
}

impl FakeEgl {
    fn allocate(&self) -> u32 {
        let mut state = self.lock();
        let id = state.next_object;
        state.next_object += 1;
        state.live.insert(id);
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateTexture(TextureId),
    DeleteTexture(TextureId),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<TextureId>),
    SetSampling(TextureTarget, Filter),
    AllocateRgba8(u32, u32),
    UploadRgba8(u32, u32),
    CreateFramebuffer(FramebufferId),
    DeleteFramebuffer(FramebufferId),
    BindFramebuffer(Option<FramebufferId>),
    AttachColorTexture(TextureId),
    CreateBuffer(BufferId),
    DeleteBuffer(BufferId),
    UploadVertices(BufferId, Vec<f32>),
    BindVertexAttrib(BufferId, u32, i32),
    CreateShader(ShaderId, ShaderStage),
    CompileShader(ShaderId),
    DeleteShader(ShaderId),
    CreateProgram(ProgramId),
    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    Uniform1i(String, i32),
    Uniform2f(String, f32, f32),
    Viewport(u32, u32),
    ClearColor(f32, f32, f32, f32),
    Clear,
    DisableBlend,
    DrawTriangleStrip(i32),
    ReadPixels(u32, u32),
}

#[derive(Debug)]
struct GlState {
    calls: Vec<GlCall>,
    next_id: u32,
    live: HashSet<u32>,
    uniforms: HashMap<u32, String>,
    compile_failures: Vec<String>,
    link_fails: bool,
    framebuffer_status: u32,
}

/// GL that records every call instead of drawing. Object ids come from one
/// counter starting at 1.
#[derive(Debug, Clone)]
pub struct RecordingGl {
    state: Arc<Mutex<GlState>>,
}

impl Default for RecordingGl {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGl {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GlState {
                calls: Vec::new(),
                next_id: 1,
                live: HashSet::new(),
                uniforms: HashMap::new(),
                compile_failures: Vec::new(),
                link_fails: false,
                framebuffer_status: FRAMEBUFFER_COMPLETE,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GlState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Shaders whose source contains `needle` fail to compile.
    pub fn fail_compile_containing(&self, needle: &str) {
        self.lock().compile_failures.push(needle.to_string());
    }

    pub fn fail_link(&self) {
        self.lock().link_fails = true;
    }

    pub fn set_framebuffer_status(&self, status: u32) {
        self.lock().framebuffer_status = status;
    }

    /// Textures, framebuffers, buffers, shaders and programs not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.lock().live.len()
    }

    fn record(&self, call: GlCall) {
        self.lock().calls.push(call);
    }

    fn next_id(&self) -> u32 {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    fn allocate(&self) -> u32 {
        let id = self.next_id();
        self.lock().live.insert(id);
        id
    }

    fn release(&self, id: u32) {
        self.lock().live.remove(&id);
    }

    fn uniform_name(&self, location: UniformLocation) -> String {
        self.lock()
            .uniforms
            .get(&location.0)
            .cloned()
            .unwrap_or_else(|| format!("#{}", location.0))
    }
}

impl Gl for RecordingGl {
    fn create_texture(&self) -> Result<TextureId, String> {
        let texture = TextureId(self.allocate());
        self.record(GlCall::CreateTexture(texture));
        Ok(texture)
    }

    fn delete_texture(&self, texture: TextureId) {
        self.release(texture.0);
        self.record(GlCall::DeleteTexture(texture));
    }

    fn active_texture(&self, unit: u32) {
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&self, target: TextureTarget, texture: Option<TextureId>) {
        self.record(GlCall::BindTexture(target, texture));
    }

    fn set_sampling(&self, target: TextureTarget, filter: Filter) {
        self.record(GlCall::SetSampling(target, filter));
    }

    fn allocate_rgba8(&self, width: u32, height: u32) {
        self.record(GlCall::AllocateRgba8(width, height));
    }

    fn upload_rgba8(&self, width: u32, height: u32, _pixels: &[u8]) {
        self.record(GlCall::UploadRgba8(width, height));
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        let framebuffer = FramebufferId(self.allocate());
        self.record(GlCall::CreateFramebuffer(framebuffer));
        Ok(framebuffer)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        self.release(framebuffer.0);
        self.record(GlCall::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&self, framebuffer: Option<FramebufferId>) {
        self.record(GlCall::BindFramebuffer(framebuffer));
    }

    fn attach_color_texture(&self, texture: TextureId) {
        self.record(GlCall::AttachColorTexture(texture));
    }

    fn framebuffer_status(&self) -> u32 {
        self.lock().framebuffer_status
    }

    fn create_buffer(&self) -> Result<BufferId, String> {
        let buffer = BufferId(self.allocate());
        self.record(GlCall::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.release(buffer.0);
        self.record(GlCall::DeleteBuffer(buffer));
    }

    fn upload_vertices(&self, buffer: BufferId, data: &[f32]) {
        self.record(GlCall::UploadVertices(buffer, data.to_vec()));
    }

    fn bind_vertex_attrib(&self, buffer: BufferId, location: u32, components: i32) {
        self.record(GlCall::BindVertexAttrib(buffer, location, components));
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderId, String> {
        let shader = ShaderId(self.allocate());
        self.record(GlCall::CreateShader(shader, stage));
        Ok(shader)
    }

    fn compile_shader(&self, shader: ShaderId, source: &str) -> bool {
        self.record(GlCall::CompileShader(shader));
        !self
            .lock()
            .compile_failures
            .iter()
            .any(|needle| source.contains(needle.as_str()))
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        format!("0:1: error: shader {} rejected", shader.0)
    }

    fn delete_shader(&self, shader: ShaderId) {
        self.release(shader.0);
        self.record(GlCall::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<ProgramId, String> {
        let program = ProgramId(self.allocate());
        self.record(GlCall::CreateProgram(program));
        Ok(program)
    }

    fn link_program(&self, program: ProgramId, _shaders: &[ShaderId]) -> bool {
        self.record(GlCall::LinkProgram(program));
        !self.lock().link_fails
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        format!("program {} failed to link", program.0)
    }

    fn delete_program(&self, program: ProgramId) {
        self.release(program.0);
        self.record(GlCall::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<ProgramId>) {
        self.record(GlCall::UseProgram(program));
    }

    fn attrib_location(&self, _program: ProgramId, name: &str) -> Option<u32> {
        match name {
            "VertexCoord" => Some(0),
            "TexCoord" => Some(1),
            _ => None,
        }
    }

    fn uniform_location(&self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        let id = self.next_id();
        self.lock().uniforms.insert(id, name.to_string());
        Some(UniformLocation(id))
    }

    fn uniform_1_i32(&self, location: UniformLocation, value: i32) {
        let name = self.uniform_name(location);
        self.record(GlCall::Uniform1i(name, value));
    }

    fn uniform_2_f32(&self, location: UniformLocation, x: f32, y: f32) {
        let name = self.uniform_name(location);
        self.record(GlCall::Uniform2f(name, x, y));
    }

    fn viewport(&self, width: u32, height: u32) {
        self.record(GlCall::Viewport(width, height));
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(GlCall::ClearColor(red, green, blue, alpha));
    }

    fn clear(&self) {
        self.record(GlCall::Clear);
    }

    fn disable_blend(&self) {
        self.record(GlCall::DisableBlend);
    }

    fn draw_triangle_strip(&self, vertices: i32) {
        self.record(GlCall::DrawTriangleStrip(vertices));
    }

    /// Fills pixel `(x, row)` with `[row, x, 7, 0]`, row 0 at the bottom.
    fn read_pixels_rgba8(&self, width: u32, height: u32, out: &mut [u8]) {
        self.record(GlCall::ReadPixels(width, height));
        for row in 0..height {
            for x in 0..width {
                let offset = ((row * width + x) * 4) as usize;
                if let Some(pixel) = out.get_mut(offset..offset + 4) {
                    pixel.copy_from_slice(&[row as u8, x as u8, 7, 0]);
                }
            }
        }
    }

    fn version_string(&self) -> String {
        "OpenGL ES 2.0 recording".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Attach,
    Update,
    Detach,
}

#[derive(Debug, Default)]
struct SourceLog {
    events: Vec<SourceEvent>,
    fail_attach: bool,
}

/// Observer half of a `FakeSource`.
#[derive(Debug, Clone, Default)]
pub struct SourceEvents(Arc<Mutex<SourceLog>>);

impl SourceEvents {
    /// Drains the events recorded so far.
    pub fn take(&self) -> Vec<SourceEvent> {
        std::mem::take(&mut self.0.lock().unwrap().events)
    }

    pub fn fail_attach(&self) {
        self.0.lock().unwrap().fail_attach = true;
    }

    fn push(&self, event: SourceEvent) -> bool {
        let mut log = self.0.lock().unwrap();
        log.events.push(event);
        log.fail_attach
    }
}

#[derive(Debug)]
pub struct FakeSource {
    size: Size,
    target: TextureTarget,
    events: SourceEvents,
}

impl FakeSource {
    pub fn external(size: Size) -> (Self, SourceEvents) {
        Self::with_target(size, TextureTarget::External)
    }

    pub fn plain(size: Size) -> (Self, SourceEvents) {
        Self::with_target(size, TextureTarget::Texture2d)
    }

    fn with_target(size: Size, target: TextureTarget) -> (Self, SourceEvents) {
        let events = SourceEvents::default();
        (
            Self {
                size,
                target,
                events: events.clone(),
            },
            events,
        )
    }
}

impl ExternalTexture for FakeSource {
    fn size(&self) -> Size {
        self.size
    }

    fn target(&self) -> TextureTarget {
        self.target
    }

    fn attach(&mut self, _gl: &dyn Gl, _texture: TextureId) -> Result<(), SourceError> {
        if self.events.push(SourceEvent::Attach) {
            return Err(SourceError::Closed);
        }
        Ok(())
    }

    fn update_image(&mut self, _gl: &dyn Gl) -> Result<(), SourceError> {
        self.events.push(SourceEvent::Update);
        Ok(())
    }

    fn detach(&mut self, _gl: &dyn Gl) -> Result<(), SourceError> {
        self.events.push(SourceEvent::Detach);
        Ok(())
    }
}
