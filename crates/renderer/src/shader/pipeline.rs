use std::rc::Rc;

use image::imageops::flip_vertical_in_place;
use image::RgbaImage;
use presets::{Preset, ShaderCatalog, MAX_SHADER_PASSES};
use tracing::{debug, error, info, trace, warn};

use super::compile::{PASSTHROUGH_FRAGMENT, PASSTHROUGH_VERTEX};
use super::pass::{ShaderPass, ShaderPassDescriptor};
use super::source::ExternalTexture;
use crate::gl::{Filter, Gl, TextureId, TextureTarget};
use crate::types::Size;

/// Ordered shader passes fed by one external frame source.
///
/// Passes are built on the first `on_source_available`, once the source's
/// texture target and both sizes are known. The pipeline is the sole owner
/// of the attach/detach relationship with the source.
pub struct ShaderPipeline {
    gl: Rc<dyn Gl>,
    descriptors: Vec<ShaderPassDescriptor>,
    passes: Vec<ShaderPass>,
    source: Option<Box<dyn ExternalTexture>>,
    source_texture: Option<TextureId>,
    attached: bool,
    initialized: bool,
    output: Option<Size>,
}

impl ShaderPipeline {
    /// Resolves `chain` against the catalog. Presets without loaded sources
    /// are skipped; an empty or entirely unusable chain becomes a single
    /// pass-through.
    pub fn new(gl: Rc<dyn Gl>, catalog: &ShaderCatalog, chain: &[Preset]) -> Self {
        let requested: &[Preset] = if chain.is_empty() {
            &[Preset::Default]
        } else {
            chain
        };
        if requested.len() > MAX_SHADER_PASSES {
            warn!(
                requested = requested.len(),
                max = MAX_SHADER_PASSES,
                "shader chain too long; extra presets ignored"
            );
        }

        let mut sources: Vec<(String, String)> = requested
            .iter()
            .take(MAX_SHADER_PASSES)
            .filter_map(|preset| match catalog.sources(*preset) {
                Some((vertex, fragment)) => Some((vertex.to_string(), fragment.to_string())),
                None => {
                    warn!(preset = %preset, "shader preset has no usable source; skipping");
                    None
                }
            })
            .collect();
        if sources.is_empty() {
            warn!("no usable shader presets; using built-in pass-through");
            sources.push((PASSTHROUGH_VERTEX.to_string(), PASSTHROUGH_FRAGMENT.to_string()));
        }

        let count = sources.len();
        let descriptors = sources
            .into_iter()
            .enumerate()
            .map(|(index, (vertex_source, fragment_source))| ShaderPassDescriptor {
                vertex_source,
                fragment_source,
                is_first_pass: index == 0,
                is_last_pass: index + 1 == count,
            })
            .collect();
        Self::from_descriptors(gl, descriptors)
    }

    pub fn from_descriptors(gl: Rc<dyn Gl>, descriptors: Vec<ShaderPassDescriptor>) -> Self {
        debug!(passes = descriptors.len(), "configured shader pipeline");
        Self {
            gl,
            descriptors,
            passes: Vec::new(),
            source: None,
            source_texture: None,
            attached: false,
            initialized: false,
            output: None,
        }
    }

    pub fn pass_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn descriptors(&self) -> &[ShaderPassDescriptor] {
        &self.descriptors
    }

    /// Empty until the first `on_source_available`.
    pub fn passes(&self) -> &[ShaderPass] {
        &self.passes
    }

    pub fn framebuffer_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|pass| pass.target().is_some())
            .count()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// True once a source has been offered, attached or not. An initialised
    /// pipeline never attaches again.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn output_size(&self) -> Option<Size> {
        self.output
    }

    /// Builds every pass for a `width`x`height` target and attaches the
    /// source. Only the first call has any effect.
    pub fn on_source_available(
        &mut self,
        mut source: Box<dyn ExternalTexture>,
        width: u32,
        height: u32,
    ) {
        if self.initialized {
            debug!("frame source already initialised; ignoring");
            return;
        }
        self.initialized = true;

        let output = Size::new(width, height);
        let native = source.size();
        let source_target = source.target();
        info!(%native, %output, passes = self.descriptors.len(), "initialising shader pipeline");

        let gl = Rc::clone(&self.gl);
        gl.viewport(width, height);
        gl.clear_color(0.0, 0.0, 0.0, 1.0);

        let texture = match gl.create_texture() {
            Ok(texture) => texture,
            Err(reason) => {
                error!(%reason, "failed to create source texture");
                return;
            }
        };
        gl.bind_texture(source_target, Some(texture));
        gl.set_sampling(source_target, Filter::Linear);
        self.source_texture = Some(texture);

        let mut input_texture = Some(texture);
        for (index, descriptor) in self.descriptors.iter().cloned().enumerate() {
            let (target, input) = if index == 0 {
                (source_target, native)
            } else {
                (TextureTarget::Texture2d, output)
            };
            let mut pass = ShaderPass::new(Rc::clone(&gl), index, descriptor, target);
            pass.set_dimensions(input, input, output);
            match input_texture {
                Some(texture) => pass.set_source_texture(texture),
                None => warn!(pass = index, "previous pass has no output texture"),
            }
            if let Err(err) = pass.init_shader() {
                error!(pass = index, error = %err, "failed to initialise shader pass");
            }
            input_texture = pass.output_texture();
            self.passes.push(pass);
        }
        self.output = Some(output);

        match source.attach(gl.as_ref(), texture) {
            Ok(()) => {
                self.attached = true;
                debug!(texture = texture.0, "attached frame source");
                // Producers that only signal after a frame is consumed need
                // one latch up front.
                if let Err(err) = source.update_image(gl.as_ref()) {
                    warn!(error = %err, "initial frame latch failed");
                }
                self.source = Some(source);
            }
            Err(err) => error!(error = %err, "failed to attach frame source"),
        }
    }

    /// Detaches the source if, and only if, it is attached.
    pub fn on_source_destroyed(&mut self) {
        drop(self.take_source());
    }

    /// Detaches the source and hands it back so it can feed another
    /// pipeline. This pipeline stays initialised and never attaches again.
    pub fn take_source(&mut self) -> Option<Box<dyn ExternalTexture>> {
        if !self.attached {
            trace!("frame source not attached; nothing to detach");
            return None;
        }
        self.attached = false;
        let mut source = self.source.take()?;
        if let Err(err) = source.detach(self.gl.as_ref()) {
            warn!(error = %err, "failed to detach frame source");
        }
        debug!("detached frame source");
        Some(source)
    }

    pub fn on_draw_frame(&mut self) {
        if !self.attached {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            if let Err(err) = source.update_image(self.gl.as_ref()) {
                warn!(error = %err, "failed to latch frame");
            }
        }
        for pass in &mut self.passes {
            pass.draw();
        }
    }

    /// Reads back the window framebuffer the last pass drew into, top row
    /// first, with alpha forced opaque.
    pub fn capture(&self) -> Option<RgbaImage> {
        let size = self.output?;
        if size.is_empty() {
            return None;
        }
        let mut pixels = vec![0u8; size.pixel_count() * 4];
        self.gl.bind_framebuffer(None);
        self.gl.read_pixels_rgba8(size.width, size.height, &mut pixels);
        for pixel in pixels.chunks_exact_mut(4) {
            pixel[3] = u8::MAX;
        }
        let mut image = RgbaImage::from_raw(size.width, size.height, pixels)?;
        flip_vertical_in_place(&mut image);
        Some(image)
    }
}

impl Drop for ShaderPipeline {
    fn drop(&mut self) {
        self.on_source_destroyed();
        self.passes.clear();
        if let Some(texture) = self.source_texture.take() {
            self.gl.delete_texture(texture);
        }
    }
}
