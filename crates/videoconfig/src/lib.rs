use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use presets::{needs_vsync, Preset, MAX_SHADER_PASSES};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// API level from which the platform ships the modern EGL entry points.
pub const DEFAULT_API_LEVEL: u32 = 30;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoConfig {
    pub version: u32,
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default)]
    pub shaders: ShaderSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContextSettings {
    #[serde(default = "default_gl_major")]
    pub gl_major: i32,
    #[serde(default)]
    pub gl_minor: i32,
    #[serde(default)]
    pub try_full_gl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_interval: Option<i32>,
    #[serde(default = "default_api_level")]
    pub api_level: u32,
    #[serde(default)]
    pub framebuffer: FramebufferSettings,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            gl_major: default_gl_major(),
            gl_minor: 0,
            try_full_gl: false,
            swap_interval: None,
            api_level: default_api_level(),
            framebuffer: FramebufferSettings::default(),
        }
    }
}

/// Requested framebuffer sizes; `None` means "don't care".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FramebufferSettings {
    #[serde(default = "default_channel", skip_serializing_if = "Option::is_none")]
    pub red: Option<i32>,
    #[serde(default = "default_channel", skip_serializing_if = "Option::is_none")]
    pub green: Option<i32>,
    #[serde(default = "default_channel", skip_serializing_if = "Option::is_none")]
    pub blue: Option<i32>,
    #[serde(default = "default_channel", skip_serializing_if = "Option::is_none")]
    pub alpha: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stencil: Option<i32>,
}

impl Default for FramebufferSettings {
    fn default() -> Self {
        Self {
            red: default_channel(),
            green: default_channel(),
            blue: default_channel(),
            alpha: default_channel(),
            depth: None,
            stencil: None,
        }
    }
}

impl FramebufferSettings {
    fn named(&self) -> [(&'static str, Option<i32>); 6] {
        [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
            ("depth", self.depth),
            ("stencil", self.stencil),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShaderSettings {
    #[serde(default)]
    pub chain: Vec<String>,
    #[serde(default = "default_assets")]
    pub assets: PathBuf,
}

impl Default for ShaderSettings {
    fn default() -> Self {
        Self {
            chain: Vec::new(),
            assets: default_assets(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenderSettings {
    #[serde(
        default = "default_ready_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub ready_timeout: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ready_timeout: default_ready_timeout(),
        }
    }
}

fn default_gl_major() -> i32 {
    2
}

fn default_api_level() -> u32 {
    DEFAULT_API_LEVEL
}

fn default_channel() -> Option<i32> {
    Some(8)
}

fn default_assets() -> PathBuf {
    PathBuf::from("assets")
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(5)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            version: 1,
            context: ContextSettings::default(),
            shaders: ShaderSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl VideoConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: VideoConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a file; a relative `shaders.assets` is resolved
    /// against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        if config.shaders.assets.is_relative() {
            if let Some(parent) = path.parent() {
                config.shaders.assets = parent.join(&config.shaders.assets);
            }
        }
        Ok(config)
    }

    /// The configured chain as presets. Entries are checked by `validate`,
    /// so anything unparseable here has already been rejected.
    pub fn chain(&self) -> Vec<Preset> {
        self.shaders
            .chain
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    /// Explicit interval when configured, otherwise vsync only for chains
    /// that need it.
    pub fn effective_swap_interval(&self) -> i32 {
        self.context
            .swap_interval
            .unwrap_or_else(|| i32::from(needs_vsync(&self.chain())))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if !(1..=4).contains(&self.context.gl_major) {
            return Err(ConfigError::Invalid(format!(
                "context.gl_major must be between 1 and 4, got {}",
                self.context.gl_major
            )));
        }

        if self.context.gl_minor < 0 {
            return Err(ConfigError::Invalid(
                "context.gl_minor must be >= 0".into(),
            ));
        }

        if let Some(interval) = self.context.swap_interval {
            if interval < 0 {
                return Err(ConfigError::Invalid(
                    "context.swap_interval must be >= 0".into(),
                ));
            }
        }

        for (name, value) in self.context.framebuffer.named() {
            if let Some(size) = value {
                if size < 0 {
                    return Err(ConfigError::Invalid(format!(
                        "context.framebuffer.{name} must be >= 0"
                    )));
                }
            }
        }

        if self.shaders.chain.len() > MAX_SHADER_PASSES {
            return Err(ConfigError::Invalid(format!(
                "shaders.chain may hold at most {MAX_SHADER_PASSES} presets, got {}",
                self.shaders.chain.len()
            )));
        }

        for name in &self.shaders.chain {
            if let Err(err) = name.parse::<Preset>() {
                return Err(ConfigError::Invalid(format!("shaders.chain: {err}")));
            }
        }

        if self.render.ready_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "render.ready_timeout must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[context]
gl_major = 3
gl_minor = 1
try_full_gl = true
api_level = 16

[context.framebuffer]
red = 8
green = 8
blue = 8
alpha = 8
depth = 16

[shaders]
chain = ["scanlines", "blur"]

[render]
ready_timeout = "750ms"
"#;

    #[test]
    fn parses_full_config() {
        let config = VideoConfig::from_toml_str(SAMPLE).expect("parse");
        assert_eq!(config.context.gl_major, 3);
        assert_eq!(config.context.gl_minor, 1);
        assert!(config.context.try_full_gl);
        assert_eq!(config.context.api_level, 16);
        assert_eq!(config.context.framebuffer.depth, Some(16));
        assert_eq!(config.context.framebuffer.stencil, None);
        assert_eq!(config.chain(), vec![Preset::Scanlines, Preset::Blur]);
        assert_eq!(config.render.ready_timeout, Duration::from_millis(750));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = VideoConfig::from_toml_str("version = 1").expect("parse");
        assert_eq!(config, VideoConfig::default());
        assert_eq!(config.context.gl_major, 2);
        assert_eq!(config.context.framebuffer.red, Some(8));
        assert_eq!(config.context.framebuffer.depth, None);
        assert!(config.chain().is_empty());
        assert_eq!(config.render.ready_timeout, Duration::from_secs(5));
    }

    #[test]
    fn swap_interval_follows_chain_unless_configured() {
        let mut config = VideoConfig::default();
        assert_eq!(config.effective_swap_interval(), 0);
        config.shaders.chain = vec!["crt_geometry".into()];
        assert_eq!(config.effective_swap_interval(), 1);
        config.context.swap_interval = Some(0);
        assert_eq!(config.effective_swap_interval(), 0);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = VideoConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("version")));
    }

    #[test]
    fn rejects_out_of_range_gl_major() {
        let err = VideoConfig::from_toml_str("version = 1\n[context]\ngl_major = 7").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("gl_major")));
    }

    #[test]
    fn rejects_unknown_preset() {
        let err =
            VideoConfig::from_toml_str("version = 1\n[shaders]\nchain = [\"sharpen\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("sharpen")));
    }

    #[test]
    fn rejects_overlong_chain() {
        let input = "version = 1\n[shaders]\nchain = [\"blur\", \"blur\", \"blur\", \"blur\", \"blur\", \"blur\"]";
        let err = VideoConfig::from_toml_str(input).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("at most 5")));
    }

    #[test]
    fn rejects_negative_framebuffer_size() {
        let input = "version = 1\n[context.framebuffer]\ndepth = -16";
        let err = VideoConfig::from_toml_str(input).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("depth")));
    }

    #[test]
    fn rejects_zero_ready_timeout() {
        let err =
            VideoConfig::from_toml_str("version = 1\n[render]\nready_timeout = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("ready_timeout")));
    }

    #[test]
    fn rejects_unrepresentable_float_timeouts() {
        for value in ["inf", "1e30", "-0.5", "nan"] {
            let input = format!("version = 1\n[render]\nready_timeout = {value}");
            let err = VideoConfig::from_toml_str(&input).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{value}: {err}");
        }
    }

    #[test]
    fn fractional_seconds_are_accepted() {
        let config =
            VideoConfig::from_toml_str("version = 1\n[render]\nready_timeout = 0.25").unwrap();
        assert_eq!(config.render.ready_timeout, Duration::from_millis(250));
    }

    #[test]
    fn load_resolves_assets_against_config_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("video.toml");
        fs::write(&path, "version = 1\n[shaders]\nassets = \"bundle\"").expect("write");

        let config = VideoConfig::load(&path).expect("load");
        assert_eq!(config.shaders.assets, dir.path().join("bundle"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = VideoConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = VideoConfig::from_toml_str(SAMPLE).expect("parse");
        let rendered = toml::to_string(&config).expect("serialize");
        assert!(rendered.contains("ready_timeout = \"750ms\""));
        let reparsed = VideoConfig::from_toml_str(&rendered).expect("reparse");
        assert_eq!(reparsed, config);
    }
}
