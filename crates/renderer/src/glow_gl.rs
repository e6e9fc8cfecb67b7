use std::num::NonZeroU32;

use glow::HasContext;
use tracing::warn;

use crate::gl::{
    BufferId, Filter, FramebufferId, Gl, ProgramId, ShaderId, ShaderStage, TextureId,
    TextureTarget, UniformLocation,
};

const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

/// `Gl` over a `glow` context that is current on the calling thread.
pub struct GlowGl {
    gl: glow::Context,
}

impl GlowGl {
    pub fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// # Safety
    ///
    /// The loader must return entry points for the context that will be
    /// current whenever this value is used.
    pub unsafe fn from_loader<F>(loader: F) -> Self
    where
        F: FnMut(&str) -> *const std::ffi::c_void,
    {
        Self::new(glow::Context::from_loader_function(loader))
    }
}

fn target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2d => glow::TEXTURE_2D,
        TextureTarget::External => TEXTURE_EXTERNAL_OES,
    }
}

fn texture(id: TextureId) -> Option<glow::NativeTexture> {
    NonZeroU32::new(id.0).map(glow::NativeTexture)
}

fn framebuffer(id: FramebufferId) -> Option<glow::NativeFramebuffer> {
    NonZeroU32::new(id.0).map(glow::NativeFramebuffer)
}

fn buffer(id: BufferId) -> Option<glow::NativeBuffer> {
    NonZeroU32::new(id.0).map(glow::NativeBuffer)
}

fn shader(id: ShaderId) -> Option<glow::NativeShader> {
    NonZeroU32::new(id.0).map(glow::NativeShader)
}

fn program(id: ProgramId) -> Option<glow::NativeProgram> {
    NonZeroU32::new(id.0).map(glow::NativeProgram)
}

impl Gl for GlowGl {
    fn create_texture(&self) -> Result<TextureId, String> {
        unsafe { self.gl.create_texture() }.map(|texture| TextureId(texture.0.get()))
    }

    fn delete_texture(&self, id: TextureId) {
        if let Some(texture) = texture(id) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture(&self, kind: TextureTarget, id: Option<TextureId>) {
        unsafe { self.gl.bind_texture(target(kind), id.and_then(texture)) };
    }

    fn set_sampling(&self, kind: TextureTarget, filter: Filter) {
        let filter = match filter {
            Filter::Nearest => glow::NEAREST,
            Filter::Linear => glow::LINEAR,
        } as i32;
        let kind = target(kind);
        unsafe {
            self.gl.tex_parameter_i32(kind, glow::TEXTURE_MIN_FILTER, filter);
            self.gl.tex_parameter_i32(kind, glow::TEXTURE_MAG_FILTER, filter);
            self.gl
                .tex_parameter_i32(kind, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            self.gl
                .tex_parameter_i32(kind, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        }
    }

    fn allocate_rgba8(&self, width: u32, height: u32) {
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(None),
            );
        }
    }

    fn upload_rgba8(&self, width: u32, height: u32, pixels: &[u8]) {
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        unsafe { self.gl.create_framebuffer() }.map(|fbo| FramebufferId(fbo.0.get()))
    }

    fn delete_framebuffer(&self, id: FramebufferId) {
        if let Some(fbo) = framebuffer(id) {
            unsafe { self.gl.delete_framebuffer(fbo) };
        }
    }

    fn bind_framebuffer(&self, id: Option<FramebufferId>) {
        unsafe {
            self.gl
                .bind_framebuffer(glow::FRAMEBUFFER, id.and_then(framebuffer))
        };
    }

    fn attach_color_texture(&self, id: TextureId) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                texture(id),
                0,
            );
        }
    }

    fn framebuffer_status(&self) -> u32 {
        unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) }
    }

    fn create_buffer(&self) -> Result<BufferId, String> {
        unsafe { self.gl.create_buffer() }.map(|vbo| BufferId(vbo.0.get()))
    }

    fn delete_buffer(&self, id: BufferId) {
        if let Some(vbo) = buffer(id) {
            unsafe { self.gl.delete_buffer(vbo) };
        }
    }

    fn upload_vertices(&self, id: BufferId, data: &[f32]) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, buffer(id));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(data),
                glow::STATIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn bind_vertex_attrib(&self, id: BufferId, location: u32, components: i32) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, buffer(id));
            self.gl
                .vertex_attrib_pointer_f32(location, components, glow::FLOAT, false, 0, 0);
            self.gl.enable_vertex_attrib_array(location);
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderId, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(kind) }.map(|shader| ShaderId(shader.0.get()))
    }

    fn compile_shader(&self, id: ShaderId, source: &str) -> bool {
        let Some(shader) = shader(id) else {
            return false;
        };
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            self.gl.get_shader_compile_status(shader)
        }
    }

    fn shader_info_log(&self, id: ShaderId) -> String {
        shader(id)
            .map(|shader| unsafe { self.gl.get_shader_info_log(shader) })
            .unwrap_or_default()
    }

    fn delete_shader(&self, id: ShaderId) {
        if let Some(shader) = shader(id) {
            unsafe { self.gl.delete_shader(shader) };
        }
    }

    fn create_program(&self) -> Result<ProgramId, String> {
        unsafe { self.gl.create_program() }.map(|program| ProgramId(program.0.get()))
    }

    fn link_program(&self, id: ProgramId, shaders: &[ShaderId]) -> bool {
        let Some(program) = program(id) else {
            return false;
        };
        unsafe {
            for stage in shaders.iter().copied().filter_map(shader) {
                self.gl.attach_shader(program, stage);
            }
            self.gl.link_program(program);
            let linked = self.gl.get_program_link_status(program);
            for stage in shaders.iter().copied().filter_map(shader) {
                self.gl.detach_shader(program, stage);
            }
            linked
        }
    }

    fn program_info_log(&self, id: ProgramId) -> String {
        program(id)
            .map(|program| unsafe { self.gl.get_program_info_log(program) })
            .unwrap_or_default()
    }

    fn delete_program(&self, id: ProgramId) {
        if let Some(program) = program(id) {
            unsafe { self.gl.delete_program(program) };
        }
    }

    fn use_program(&self, id: Option<ProgramId>) {
        unsafe { self.gl.use_program(id.and_then(program)) };
    }

    fn attrib_location(&self, id: ProgramId, name: &str) -> Option<u32> {
        program(id).and_then(|program| unsafe { self.gl.get_attrib_location(program, name) })
    }

    fn uniform_location(&self, id: ProgramId, name: &str) -> Option<UniformLocation> {
        let program = program(id)?;
        unsafe { self.gl.get_uniform_location(program, name) }
            .map(|location| UniformLocation(location.0))
    }

    fn uniform_1_i32(&self, location: UniformLocation, value: i32) {
        let location = glow::NativeUniformLocation(location.0);
        unsafe { self.gl.uniform_1_i32(Some(&location), value) };
    }

    fn uniform_2_f32(&self, location: UniformLocation, x: f32, y: f32) {
        let location = glow::NativeUniformLocation(location.0);
        unsafe { self.gl.uniform_2_f32(Some(&location), x, y) };
    }

    fn viewport(&self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, width as i32, height as i32) };
    }

    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        unsafe { self.gl.clear_color(red, green, blue, alpha) };
    }

    fn clear(&self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT) };
    }

    fn disable_blend(&self) {
        unsafe { self.gl.disable(glow::BLEND) };
    }

    fn draw_triangle_strip(&self, vertices: i32) {
        unsafe { self.gl.draw_arrays(glow::TRIANGLE_STRIP, 0, vertices) };
    }

    fn read_pixels_rgba8(&self, width: u32, height: u32, out: &mut [u8]) {
        let expected = width as usize * height as usize * 4;
        if out.len() < expected {
            warn!(expected, actual = out.len(), "read_pixels buffer too small");
            return;
        }
        unsafe {
            self.gl.read_pixels(
                0,
                0,
                width as i32,
                height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(Some(&mut out[..expected])),
            );
        }
    }

    fn version_string(&self) -> String {
        unsafe { self.gl.get_parameter_string(glow::VERSION) }
    }
}
