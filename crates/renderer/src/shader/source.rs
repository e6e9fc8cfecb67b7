use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::trace;

use crate::gl::{Filter, Gl, TextureId, TextureTarget};
use crate::types::Size;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("frame source is already attached to a texture")]
    AlreadyAttached,
    #[error("frame source is not attached")]
    NotAttached,
    #[error("frame of {actual} bytes does not match {expected} expected")]
    FrameSize { expected: usize, actual: usize },
    #[error("frame source closed")]
    Closed,
}

/// A texture whose contents are produced outside the render thread.
///
/// The pipeline owns the texture name and is the only caller of
/// `attach`/`detach`; `update_image` latches the newest frame into it.
pub trait ExternalTexture {
    /// Native size of produced frames.
    fn size(&self) -> Size;

    fn target(&self) -> TextureTarget {
        TextureTarget::External
    }

    fn attach(&mut self, gl: &dyn Gl, texture: TextureId) -> Result<(), SourceError>;

    fn update_image(&mut self, gl: &dyn Gl) -> Result<(), SourceError>;

    fn detach(&mut self, gl: &dyn Gl) -> Result<(), SourceError>;
}

#[derive(Debug, Default)]
struct SharedFrame {
    pixels: Vec<u8>,
    generation: u64,
}

/// Producer half of a CPU frame source; cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct FrameProducer {
    shared: Arc<Mutex<SharedFrame>>,
    size: Size,
}

impl FrameProducer {
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn submit(&self, pixels: &[[u8; 4]]) -> Result<(), SourceError> {
        self.submit_bytes(bytemuck::cast_slice(pixels))
    }

    /// Publishes one tightly packed RGBA8 frame, replacing any frame the
    /// consumer has not latched yet.
    pub fn submit_bytes(&self, bytes: &[u8]) -> Result<(), SourceError> {
        let expected = self.size.pixel_count() * 4;
        if bytes.len() != expected {
            return Err(SourceError::FrameSize {
                expected,
                actual: bytes.len(),
            });
        }
        let mut frame = self.shared.lock().map_err(|_| SourceError::Closed)?;
        frame.pixels.clear();
        frame.pixels.extend_from_slice(bytes);
        frame.generation += 1;
        Ok(())
    }
}

/// Consumer half: uploads the newest CPU frame into a plain 2D texture.
#[derive(Debug)]
pub struct CpuFrameSource {
    shared: Arc<Mutex<SharedFrame>>,
    size: Size,
    texture: Option<TextureId>,
    latched: u64,
}

pub fn cpu_frame_channel(size: Size) -> (FrameProducer, CpuFrameSource) {
    let shared = Arc::new(Mutex::new(SharedFrame::default()));
    (
        FrameProducer {
            shared: Arc::clone(&shared),
            size,
        },
        CpuFrameSource {
            shared,
            size,
            texture: None,
            latched: 0,
        },
    )
}

impl ExternalTexture for CpuFrameSource {
    fn size(&self) -> Size {
        self.size
    }

    fn target(&self) -> TextureTarget {
        TextureTarget::Texture2d
    }

    fn attach(&mut self, gl: &dyn Gl, texture: TextureId) -> Result<(), SourceError> {
        if self.texture.is_some() {
            return Err(SourceError::AlreadyAttached);
        }
        gl.bind_texture(TextureTarget::Texture2d, Some(texture));
        gl.set_sampling(TextureTarget::Texture2d, Filter::Linear);
        gl.allocate_rgba8(self.size.width, self.size.height);
        self.texture = Some(texture);
        Ok(())
    }

    fn update_image(&mut self, gl: &dyn Gl) -> Result<(), SourceError> {
        let texture = self.texture.ok_or(SourceError::NotAttached)?;
        let frame = self.shared.lock().map_err(|_| SourceError::Closed)?;
        if frame.generation == self.latched {
            trace!("no new CPU frame");
            return Ok(());
        }
        gl.bind_texture(TextureTarget::Texture2d, Some(texture));
        gl.upload_rgba8(self.size.width, self.size.height, &frame.pixels);
        self.latched = frame.generation;
        Ok(())
    }

    fn detach(&mut self, _gl: &dyn Gl) -> Result<(), SourceError> {
        self.texture.take().ok_or(SourceError::NotAttached)?;
        // A later attach starts from an empty texture.
        self.latched = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GlCall, RecordingGl};

    #[test]
    fn uploads_only_new_frames() {
        let gl = RecordingGl::new();
        let (producer, mut source) = cpu_frame_channel(Size::new(2, 1));
        source.attach(&gl, TextureId(9)).expect("attach");
        gl.clear_calls();

        source.update_image(&gl).expect("no frame yet");
        assert!(gl.calls().is_empty());

        producer.submit(&[[1, 2, 3, 4], [5, 6, 7, 8]]).expect("submit");
        source.update_image(&gl).expect("upload");
        source.update_image(&gl).expect("unchanged");
        assert_eq!(
            gl.calls(),
            vec![
                GlCall::BindTexture(TextureTarget::Texture2d, Some(TextureId(9))),
                GlCall::UploadRgba8(2, 1),
            ]
        );
    }

    #[test]
    fn reattached_texture_receives_the_current_frame() {
        let gl = RecordingGl::new();
        let (producer, mut source) = cpu_frame_channel(Size::new(1, 1));
        source.attach(&gl, TextureId(3)).expect("attach");
        producer.submit(&[[9, 9, 9, 255]]).expect("submit");
        source.update_image(&gl).expect("upload");
        source.detach(&gl).expect("detach");

        source.attach(&gl, TextureId(4)).expect("reattach");
        gl.clear_calls();
        source.update_image(&gl).expect("upload again");
        assert_eq!(
            gl.calls(),
            vec![
                GlCall::BindTexture(TextureTarget::Texture2d, Some(TextureId(4))),
                GlCall::UploadRgba8(1, 1),
            ]
        );
    }

    #[test]
    fn rejects_frames_of_the_wrong_size() {
        let (producer, _source) = cpu_frame_channel(Size::new(4, 4));
        let err = producer.submit_bytes(&[0; 12]).unwrap_err();
        assert_eq!(
            err,
            SourceError::FrameSize {
                expected: 64,
                actual: 12
            }
        );
    }

    #[test]
    fn attach_and_detach_are_paired() {
        let gl = RecordingGl::new();
        let (_producer, mut source) = cpu_frame_channel(Size::new(1, 1));
        assert_eq!(source.detach(&gl), Err(SourceError::NotAttached));
        source.attach(&gl, TextureId(3)).expect("attach");
        assert_eq!(
            source.attach(&gl, TextureId(4)),
            Err(SourceError::AlreadyAttached)
        );
        source.detach(&gl).expect("detach");
        assert_eq!(source.update_image(&gl), Err(SourceError::NotAttached));
    }
}
