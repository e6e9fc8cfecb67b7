//! The slice of OpenGL ES 2 the shader chain needs.
//!
//! Everything above this trait speaks in small `u32` handle newtypes so the
//! pipeline can be driven by the `glow` binding on a real context or by the
//! recording fake in tests. Methods mirror GL entry points closely; a few
//! fold a bind + call sequence that always travels together.

/// `GL_FRAMEBUFFER_COMPLETE`.
pub const FRAMEBUFFER_COMPLETE: u32 = 0x8CD5;

macro_rules! gl_handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u32);
        )*
    };
}

gl_handle!(
    TextureId,
    FramebufferId,
    BufferId,
    ShaderId,
    ProgramId,
    /// Uniform locations are cached per program at link time.
    UniformLocation,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Where a sampled texture is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    Texture2d,
    /// `GL_TEXTURE_EXTERNAL_OES`, fed by a producer outside the render thread.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

pub trait Gl {
    fn create_texture(&self) -> Result<TextureId, String>;
    fn delete_texture(&self, texture: TextureId);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: TextureTarget, texture: Option<TextureId>);
    /// Filtering plus clamp-to-edge wrapping for the bound texture.
    fn set_sampling(&self, target: TextureTarget, filter: Filter);
    /// Reserves RGBA8 storage for the bound 2D texture.
    fn allocate_rgba8(&self, width: u32, height: u32);
    fn upload_rgba8(&self, width: u32, height: u32, pixels: &[u8]);

    fn create_framebuffer(&self) -> Result<FramebufferId, String>;
    fn delete_framebuffer(&self, framebuffer: FramebufferId);
    /// `None` selects the window surface.
    fn bind_framebuffer(&self, framebuffer: Option<FramebufferId>);
    fn attach_color_texture(&self, texture: TextureId);
    fn framebuffer_status(&self) -> u32;

    fn create_buffer(&self) -> Result<BufferId, String>;
    fn delete_buffer(&self, buffer: BufferId);
    fn upload_vertices(&self, buffer: BufferId, data: &[f32]);
    /// Points `location` at `buffer` with `components` floats per vertex.
    fn bind_vertex_attrib(&self, buffer: BufferId, location: u32, components: i32);

    fn create_shader(&self, stage: ShaderStage) -> Result<ShaderId, String>;
    /// Uploads the source and compiles; returns the compile status.
    fn compile_shader(&self, shader: ShaderId, source: &str) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&self, shader: ShaderId);

    fn create_program(&self) -> Result<ProgramId, String>;
    /// Attaches the shaders and links; returns the link status.
    fn link_program(&self, program: ProgramId, shaders: &[ShaderId]) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn delete_program(&self, program: ProgramId);
    fn use_program(&self, program: Option<ProgramId>);
    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn uniform_1_i32(&self, location: UniformLocation, value: i32);
    fn uniform_2_f32(&self, location: UniformLocation, x: f32, y: f32);

    fn viewport(&self, width: u32, height: u32);
    fn clear_color(&self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear(&self);
    fn disable_blend(&self);
    fn draw_triangle_strip(&self, vertices: i32);
    /// Reads the bound framebuffer as RGBA8 rows, bottom row first.
    fn read_pixels_rgba8(&self, width: u32, height: u32, out: &mut [u8]);

    fn version_string(&self) -> String;
}
