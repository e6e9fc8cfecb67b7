use std::rc::Rc;

use tracing::{debug, error, trace, warn};

use super::compile::external_sampler_source;
use super::ShaderError;
use crate::gl::{
    BufferId, Filter, FramebufferId, Gl, ProgramId, ShaderId, ShaderStage, TextureId,
    TextureTarget, UniformLocation, FRAMEBUFFER_COMPLETE,
};
use crate::types::Size;

/// Full-screen quad as a triangle strip.
pub const QUAD_POSITIONS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
/// UVs for the first pass, which samples the producer's texture.
pub const FIRST_PASS_TEX_COORDS: [f32; 8] = [0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
/// UVs for passes that sample a framebuffer texture (origin bottom-left).
pub const CHAINED_TEX_COORDS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPassDescriptor {
    pub vertex_source: String,
    pub fragment_source: String,
    pub is_first_pass: bool,
    pub is_last_pass: bool,
}

/// Offscreen colour target owned by every pass except the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBufferTarget {
    pub framebuffer: FramebufferId,
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDimensions {
    pub input: Size,
    pub texture: Size,
    pub output: Size,
}

#[derive(Debug, Clone, Copy, Default)]
struct ProgramLocations {
    vertex_coord: Option<u32>,
    tex_coord: Option<u32>,
    texture: Option<UniformLocation>,
    texture_size: Option<UniformLocation>,
    input_size: Option<UniformLocation>,
    output_size: Option<UniformLocation>,
    frame_count: Option<UniformLocation>,
}

impl ProgramLocations {
    fn query(gl: &dyn Gl, program: ProgramId) -> Self {
        Self {
            vertex_coord: gl.attrib_location(program, "VertexCoord"),
            tex_coord: gl.attrib_location(program, "TexCoord"),
            texture: gl.uniform_location(program, "Texture"),
            texture_size: gl.uniform_location(program, "TextureSize"),
            input_size: gl.uniform_location(program, "InputSize"),
            output_size: gl.uniform_location(program, "OutputSize"),
            frame_count: gl.uniform_location(program, "FrameCount"),
        }
    }
}

/// One program in the chain plus the resources it draws with.
pub struct ShaderPass {
    gl: Rc<dyn Gl>,
    index: usize,
    descriptor: ShaderPassDescriptor,
    source_target: TextureTarget,
    source_texture: Option<TextureId>,
    dimensions: Option<PassDimensions>,
    program: Option<ProgramId>,
    locations: ProgramLocations,
    positions: Option<BufferId>,
    tex_coords: Option<BufferId>,
    target: Option<FrameBufferTarget>,
    frame_count: u32,
}

impl ShaderPass {
    /// `source_target` is how this pass's input is bound. A first pass fed
    /// by an external texture gets its fragment sampler rewritten.
    pub fn new(
        gl: Rc<dyn Gl>,
        index: usize,
        mut descriptor: ShaderPassDescriptor,
        source_target: TextureTarget,
    ) -> Self {
        if descriptor.is_first_pass && source_target == TextureTarget::External {
            descriptor.fragment_source = external_sampler_source(&descriptor.fragment_source);
        }
        Self {
            gl,
            index,
            descriptor,
            source_target,
            source_texture: None,
            dimensions: None,
            program: None,
            locations: ProgramLocations::default(),
            positions: None,
            tex_coords: None,
            target: None,
            frame_count: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn descriptor(&self) -> &ShaderPassDescriptor {
        &self.descriptor
    }

    pub fn set_source_texture(&mut self, texture: TextureId) {
        self.source_texture = Some(texture);
    }

    pub fn set_dimensions(&mut self, input: Size, texture: Size, output: Size) {
        self.dimensions = Some(PassDimensions {
            input,
            texture,
            output,
        });
    }

    pub fn dimensions(&self) -> Option<PassDimensions> {
        self.dimensions
    }

    pub fn target(&self) -> Option<FrameBufferTarget> {
        self.target
    }

    /// Texture the next pass samples from.
    pub fn output_texture(&self) -> Option<TextureId> {
        self.target.map(|target| target.texture)
    }

    pub fn is_linked(&self) -> bool {
        self.program.is_some()
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Builds buffers, program and (unless last) the offscreen target.
    ///
    /// Compile and link failures are logged and leave the pass without a
    /// program; it keeps clearing its target so the chain still runs.
    /// Errors are returned only for missing dimensions or GL objects that
    /// could not be allocated.
    pub fn init_shader(&mut self) -> Result<(), ShaderError> {
        let dimensions = self.dimensions.ok_or(ShaderError::MissingDimensions)?;
        self.release();

        let tex_coords: &[f32] = if self.descriptor.is_first_pass {
            &FIRST_PASS_TEX_COORDS
        } else {
            &CHAINED_TEX_COORDS
        };
        self.positions = Some(self.vertex_buffer(&QUAD_POSITIONS)?);
        self.tex_coords = Some(self.vertex_buffer(tex_coords)?);

        match self.build_program() {
            Ok(program) => {
                self.locations = ProgramLocations::query(self.gl.as_ref(), program);
                self.program = Some(program);
                debug!(pass = self.index, "linked shader pass");
            }
            Err(ShaderError::Allocation(reason)) => {
                return Err(ShaderError::Allocation(reason));
            }
            Err(err) => {
                warn!(pass = self.index, error = %err, "shader pass will render without a program");
            }
        }

        if !self.descriptor.is_last_pass {
            self.target = Some(self.allocate_target(dimensions.output)?);
        }
        Ok(())
    }

    pub fn draw(&mut self) {
        let Some(dimensions) = self.dimensions else {
            trace!(pass = self.index, "draw before dimensions were set");
            return;
        };
        let frame = self.frame_count;
        self.frame_count = self.frame_count.wrapping_add(1);
        if !self.descriptor.is_last_pass && self.target.is_none() {
            trace!(pass = self.index, "no offscreen target; pass skipped");
            return;
        }

        let gl = self.gl.as_ref();
        gl.bind_framebuffer(self.target.map(|target| target.framebuffer));
        gl.viewport(dimensions.output.width, dimensions.output.height);
        gl.use_program(self.program);
        gl.disable_blend();
        gl.active_texture(0);
        gl.bind_texture(self.source_target, self.source_texture);

        if self.program.is_some() {
            let locations = self.locations;
            if let Some(location) = locations.texture {
                gl.uniform_1_i32(location, 0);
            }
            for (location, size) in [
                (locations.input_size, dimensions.input),
                (locations.texture_size, dimensions.texture),
                (locations.output_size, dimensions.output),
            ] {
                if let Some(location) = location {
                    let (width, height) = size.as_f32();
                    gl.uniform_2_f32(location, width, height);
                }
            }
            if let Some(location) = locations.frame_count {
                gl.uniform_1_i32(location, frame as i32);
            }
            if let (Some(buffer), Some(location)) = (self.positions, locations.vertex_coord) {
                gl.bind_vertex_attrib(buffer, location, 2);
            }
            if let (Some(buffer), Some(location)) = (self.tex_coords, locations.tex_coord) {
                gl.bind_vertex_attrib(buffer, location, 2);
            }
        }

        gl.clear();
        if self.program.is_some() {
            gl.draw_triangle_strip(4);
        }
    }

    fn vertex_buffer(&self, data: &[f32]) -> Result<BufferId, ShaderError> {
        let buffer = self.gl.create_buffer().map_err(ShaderError::Allocation)?;
        self.gl.upload_vertices(buffer, data);
        Ok(buffer)
    }

    fn build_program(&self) -> Result<ProgramId, ShaderError> {
        let vertex = self.compile(ShaderStage::Vertex, &self.descriptor.vertex_source);
        let fragment = self.compile(ShaderStage::Fragment, &self.descriptor.fragment_source);
        let (vertex, fragment) = match (vertex, fragment) {
            (Ok(vertex), Ok(fragment)) => (vertex, fragment),
            (Err(err), other) | (other, Err(err)) => {
                if let Ok(shader) = other {
                    self.gl.delete_shader(shader);
                }
                return Err(err);
            }
        };

        let program = match self.gl.create_program() {
            Ok(program) => program,
            Err(reason) => {
                self.gl.delete_shader(vertex);
                self.gl.delete_shader(fragment);
                return Err(ShaderError::Allocation(reason));
            }
        };
        let linked = self.gl.link_program(program, &[vertex, fragment]);
        self.gl.delete_shader(vertex);
        self.gl.delete_shader(fragment);
        if !linked {
            let log = self.gl.program_info_log(program);
            self.gl.delete_program(program);
            error!(pass = self.index, log = %log, "shader program failed to link");
            return Err(ShaderError::Link { log });
        }
        Ok(program)
    }

    fn compile(&self, stage: ShaderStage, source: &str) -> Result<ShaderId, ShaderError> {
        let shader = self
            .gl
            .create_shader(stage)
            .map_err(ShaderError::Allocation)?;
        if self.gl.compile_shader(shader, source) {
            return Ok(shader);
        }
        let log = self.gl.shader_info_log(shader);
        self.gl.delete_shader(shader);
        error!(pass = self.index, %stage, log = %log, "shader failed to compile");
        debug!(pass = self.index, %stage, source, "rejected shader source");
        Err(ShaderError::Compile { stage, log })
    }

    fn allocate_target(&self, size: Size) -> Result<FrameBufferTarget, ShaderError> {
        let gl = self.gl.as_ref();
        let texture = gl.create_texture().map_err(ShaderError::Allocation)?;
        let framebuffer = match gl.create_framebuffer() {
            Ok(framebuffer) => framebuffer,
            Err(reason) => {
                gl.delete_texture(texture);
                return Err(ShaderError::Allocation(reason));
            }
        };

        gl.bind_texture(TextureTarget::Texture2d, Some(texture));
        gl.set_sampling(TextureTarget::Texture2d, Filter::Linear);
        gl.allocate_rgba8(size.width, size.height);
        gl.bind_framebuffer(Some(framebuffer));
        gl.attach_color_texture(texture);
        let status = gl.framebuffer_status();
        gl.bind_framebuffer(None);
        gl.bind_texture(TextureTarget::Texture2d, None);

        if status != FRAMEBUFFER_COMPLETE {
            gl.delete_framebuffer(framebuffer);
            gl.delete_texture(texture);
            error!(pass = self.index, status, "framebuffer incomplete");
            return Err(ShaderError::IncompleteFramebuffer { status });
        }

        debug!(pass = self.index, width = size.width, height = size.height, "allocated pass framebuffer");
        Ok(FrameBufferTarget {
            framebuffer,
            texture,
            width: size.width,
            height: size.height,
        })
    }

    fn release(&mut self) {
        let gl = self.gl.as_ref();
        if let Some(program) = self.program.take() {
            gl.delete_program(program);
        }
        for buffer in [self.positions.take(), self.tex_coords.take()].into_iter().flatten() {
            gl.delete_buffer(buffer);
        }
        if let Some(target) = self.target.take() {
            gl.delete_framebuffer(target.framebuffer);
            gl.delete_texture(target.texture);
        }
        self.locations = ProgramLocations::default();
    }
}

impl Drop for ShaderPass {
    fn drop(&mut self) {
        self.release();
    }
}
