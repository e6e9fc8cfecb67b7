use tracing::{debug, warn};

use crate::assets::{AssetError, AssetSource};
use crate::preset::Preset;

/// One preset plus whatever source text could be loaded for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCatalogEntry {
    pub preset: Preset,
    pub vertex_text: Option<String>,
    pub fragment_text: Option<String>,
}

impl ShaderCatalogEntry {
    fn unloaded(preset: Preset) -> Self {
        Self {
            preset,
            vertex_text: None,
            fragment_text: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.preset.name()
    }

    pub fn friendly_name_ref(&self) -> &'static str {
        self.preset.friendly_name_ref()
    }

    pub fn description_ref(&self) -> &'static str {
        self.preset.description_ref()
    }

    pub fn requires_vsync(&self) -> bool {
        self.preset.requires_vsync()
    }

    /// Both stages loaded.
    pub fn is_usable(&self) -> bool {
        self.vertex_text.is_some() && self.fragment_text.is_some()
    }

    pub fn sources(&self) -> Option<(&str, &str)> {
        match (&self.vertex_text, &self.fragment_text) {
            (Some(vertex), Some(fragment)) => Some((vertex.as_str(), fragment.as_str())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCatalog {
    entries: Vec<ShaderCatalogEntry>,
}

impl Default for ShaderCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderCatalog {
    /// Every preset, nothing loaded yet.
    pub fn new() -> Self {
        Self {
            entries: Preset::ALL.into_iter().map(ShaderCatalogEntry::unloaded).collect(),
        }
    }

    pub fn load(assets: &dyn AssetSource) -> Self {
        let mut catalog = Self::new();
        catalog.load_all(assets);
        catalog
    }

    /// Reads both stages of every preset. A failed read only clears that
    /// stage; the returned errors are already logged.
    pub fn load_all(&mut self, assets: &dyn AssetSource) -> Vec<AssetError> {
        let mut failures = Vec::new();
        for entry in &mut self.entries {
            entry.vertex_text = read_stage(assets, &entry.preset.vertex_asset(), &mut failures);
            entry.fragment_text =
                read_stage(assets, &entry.preset.fragment_asset(), &mut failures);
            if entry.is_usable() {
                debug!(preset = %entry.preset, "loaded shader preset");
            }
        }
        failures
    }

    pub fn entries(&self) -> &[ShaderCatalogEntry] {
        &self.entries
    }

    pub fn entry(&self, preset: Preset) -> Option<&ShaderCatalogEntry> {
        self.entries.iter().find(|entry| entry.preset == preset)
    }

    pub fn sources(&self, preset: Preset) -> Option<(&str, &str)> {
        self.entry(preset).and_then(ShaderCatalogEntry::sources)
    }

    pub fn unusable(&self) -> impl Iterator<Item = Preset> + '_ {
        self.entries
            .iter()
            .filter(|entry| !entry.is_usable())
            .map(|entry| entry.preset)
    }
}

fn read_stage(
    assets: &dyn AssetSource,
    path: &str,
    failures: &mut Vec<AssetError>,
) -> Option<String> {
    match assets.read_text(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(path, error = %err, "shader asset unavailable");
            failures.push(err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetDir, EmbeddedAssets};
    use std::fs;

    #[test]
    fn new_catalog_has_every_preset_unloaded() {
        let catalog = ShaderCatalog::new();
        assert_eq!(catalog.entries().len(), Preset::ALL.len());
        assert!(catalog.entries().iter().all(|entry| !entry.is_usable()));
    }

    #[test]
    fn embedded_bundle_loads_every_preset() {
        let mut catalog = ShaderCatalog::new();
        let failures = catalog.load_all(&EmbeddedAssets);
        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(catalog.unusable().count(), 0);
        let (vertex, fragment) = catalog.sources(Preset::Default).expect("default preset");
        assert!(vertex.contains("VertexCoord"));
        assert!(fragment.contains("sampler2D"));
    }

    #[test]
    fn missing_files_leave_only_that_preset_unusable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shaders = dir.path().join("shaders");
        fs::create_dir_all(&shaders).expect("mkdir");
        for preset in Preset::ALL {
            if preset == Preset::Blur {
                continue;
            }
            fs::write(dir.path().join(preset.vertex_asset()), "vert").expect("write vert");
            fs::write(dir.path().join(preset.fragment_asset()), "frag").expect("write frag");
        }
        fs::write(dir.path().join(Preset::Blur.vertex_asset()), "vert").expect("write vert");

        let mut catalog = ShaderCatalog::new();
        let failures = catalog.load_all(&AssetDir::new(dir.path()));

        assert_eq!(failures.len(), 1);
        assert!(failures[0].path().ends_with("blur_frag.glsl"));
        assert_eq!(catalog.unusable().collect::<Vec<_>>(), vec![Preset::Blur]);
        let blur = catalog.entry(Preset::Blur).expect("blur entry");
        assert_eq!(blur.vertex_text.as_deref(), Some("vert"));
        assert!(blur.fragment_text.is_none());
        assert_eq!(catalog.sources(Preset::Dither), Some(("vert", "frag")));
    }

    #[test]
    fn entry_exposes_preset_metadata() {
        let catalog = ShaderCatalog::new();
        let crt = catalog.entry(Preset::CrtGeometry).expect("crt entry");
        assert_eq!(crt.name(), "crt_geometry");
        assert_eq!(crt.friendly_name_ref(), "shader_crt_geometry");
        assert!(crt.requires_vsync());
    }
}
