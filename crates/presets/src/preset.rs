use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Longest shader chain a host may configure.
pub const MAX_SHADER_PASSES: usize = 5;

/// Post-processing presets shipped with the asset bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Default,
    Scanlines,
    Blur,
    Dither,
    Fxaa,
    CrtGeometry,
    TestPattern,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Default,
        Preset::Scanlines,
        Preset::Blur,
        Preset::Dither,
        Preset::Fxaa,
        Preset::CrtGeometry,
        Preset::TestPattern,
    ];

    /// Asset stem, also the configuration spelling.
    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Scanlines => "scanlines",
            Preset::Blur => "blur",
            Preset::Dither => "dither",
            Preset::Fxaa => "fxaa",
            Preset::CrtGeometry => "crt_geometry",
            Preset::TestPattern => "test_pattern",
        }
    }

    pub fn friendly_name_ref(self) -> &'static str {
        match self {
            Preset::Default => "shader_default",
            Preset::Scanlines => "shader_scanlines",
            Preset::Blur => "shader_blur",
            Preset::Dither => "shader_dither",
            Preset::Fxaa => "shader_fxaa",
            Preset::CrtGeometry => "shader_crt_geometry",
            Preset::TestPattern => "shader_test_pattern",
        }
    }

    pub fn description_ref(self) -> &'static str {
        match self {
            Preset::Default => "shader_default_description",
            Preset::Scanlines => "shader_scanlines_description",
            Preset::Blur => "shader_blur_description",
            Preset::Dither => "shader_dither_description",
            Preset::Fxaa => "shader_fxaa_description",
            Preset::CrtGeometry => "shader_crt_geometry_description",
            Preset::TestPattern => "shader_test_pattern_description",
        }
    }

    /// Presets whose output changes with `FrameCount` only look right when
    /// every emulated frame reaches the display.
    pub fn requires_vsync(self) -> bool {
        matches!(self, Preset::Scanlines | Preset::CrtGeometry)
    }

    pub fn vertex_asset(self) -> String {
        format!("shaders/{}_vert.glsl", self.name())
    }

    pub fn fragment_asset(self) -> String {
        format!("shaders/{}_frag.glsl", self.name())
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shader preset '{0}'")]
pub struct UnknownPreset(pub String);

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "default" | "passthrough" | "pass_through" => Ok(Preset::Default),
            "scanlines" => Ok(Preset::Scanlines),
            "blur" => Ok(Preset::Blur),
            "dither" => Ok(Preset::Dither),
            "fxaa" => Ok(Preset::Fxaa),
            "crt_geometry" => Ok(Preset::CrtGeometry),
            "test_pattern" => Ok(Preset::TestPattern),
            _ => Err(UnknownPreset(raw.to_string())),
        }
    }
}

/// True iff any preset in the chain needs frame-accurate presentation.
pub fn needs_vsync(chain: &[Preset]) -> bool {
    chain.iter().any(|preset| preset.requires_vsync())
}
