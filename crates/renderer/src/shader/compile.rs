/// Extension directive that makes `samplerExternalOES` available.
pub const EXTERNAL_SAMPLER_EXTENSION: &str = "#extension GL_OES_EGL_image_external : require";

/// Rewrites a first-pass fragment shader to sample an external texture.
///
/// Every `sampler2D` declaration becomes `samplerExternalOES` and the
/// extension directive is inserted right after `#version` (or at the top
/// when the source has none). Sources that already enable the extension are
/// returned unchanged apart from the sampler rename.
pub fn external_sampler_source(fragment: &str) -> String {
    let renamed = fragment.replace("sampler2D", "samplerExternalOES");
    if renamed.contains("GL_OES_EGL_image_external") {
        return renamed;
    }

    let mut lines = renamed.lines();
    let mut out = String::with_capacity(renamed.len() + EXTERNAL_SAMPLER_EXTENSION.len() + 1);
    let first_code = renamed
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    if first_code.trim_start().starts_with("#version") {
        for line in lines.by_ref() {
            out.push_str(line);
            out.push('\n');
            if line.trim_start().starts_with("#version") {
                break;
            }
        }
    }
    out.push_str(EXTERNAL_SAMPLER_EXTENSION);
    out.push('\n');
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Built-in pass-through used when no preset source can be loaded.
pub const PASSTHROUGH_VERTEX: &str = r"#version 100
attribute vec4 VertexCoord;
attribute vec2 TexCoord;
varying vec2 TEX0;

void main()
{
    gl_Position = VertexCoord;
    TEX0 = TexCoord;
}
";

pub const PASSTHROUGH_FRAGMENT: &str = r"#version 100
precision mediump float;
uniform sampler2D Texture;
varying vec2 TEX0;

void main()
{
    gl_FragColor = texture2D(Texture, TEX0);
}
";
