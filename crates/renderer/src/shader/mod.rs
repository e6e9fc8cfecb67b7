//! Multi-pass post-processing over `Gl`.

mod compile;
mod pass;
mod pipeline;
mod source;

use thiserror::Error;

use crate::gl::ShaderStage;

pub use compile::{
    external_sampler_source, EXTERNAL_SAMPLER_EXTENSION, PASSTHROUGH_FRAGMENT, PASSTHROUGH_VERTEX,
};
pub use pass::{
    FrameBufferTarget, PassDimensions, ShaderPass, ShaderPassDescriptor, CHAINED_TEX_COORDS,
    FIRST_PASS_TEX_COORDS, QUAD_POSITIONS,
};
pub use pipeline::ShaderPipeline;
pub use source::{cpu_frame_channel, CpuFrameSource, ExternalTexture, FrameProducer, SourceError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("shader program failed to link: {log}")]
    Link { log: String },

    #[error("framebuffer incomplete (status 0x{status:04x})")]
    IncompleteFramebuffer { status: u32 },

    #[error("failed to allocate GL object: {0}")]
    Allocation(String),

    #[error("pass dimensions must be set before init_shader")]
    MissingDimensions,
}
