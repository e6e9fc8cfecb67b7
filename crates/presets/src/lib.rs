mod assets;
mod catalog;
mod preset;

pub use assets::{AssetDir, AssetError, AssetSource, EmbeddedAssets, BUNDLED_ASSETS_DIR};
pub use catalog::{ShaderCatalog, ShaderCatalogEntry};
pub use preset::{needs_vsync, Preset, UnknownPreset, MAX_SHADER_PASSES};
