//! Read-only asset bundles that hold the preset GLSL sources.
//!
//! `AssetDir` reads from a directory on disk (the layout produced by the
//! packaging step: `<root>/shaders/<name>_{vert,frag}.glsl`), while
//! `EmbeddedAssets` serves the sources compiled into this crate so the
//! renderer always has a usable bundle.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Directory holding the assets that ship with this crate.
pub const BUNDLED_ASSETS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets");

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {path}")]
    Missing { path: String },

    #[error("failed to read asset {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl AssetError {
    pub fn path(&self) -> &str {
        match self {
            AssetError::Missing { path } | AssetError::Unreadable { path, .. } => path,
        }
    }
}

/// Anything that can hand out text assets by bundle-relative path.
pub trait AssetSource {
    fn read_text(&self, path: &str) -> Result<String, AssetError>;
}

#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn bundled() -> Self {
        Self::new(BUNDLED_ASSETS_DIR)
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }
}

impl AssetSource for AssetDir {
    fn read_text(&self, path: &str) -> Result<String, AssetError> {
        let full_path = self.root.join(path);
        fs::read_to_string(&full_path).map_err(|source| {
            let path = full_path.display().to_string();
            if source.kind() == io::ErrorKind::NotFound {
                AssetError::Missing { path }
            } else {
                AssetError::Unreadable { path, source }
            }
        })
    }
}

macro_rules! embedded {
    ($($name:literal),* $(,)?) => {
        &[$(
            (
                concat!("shaders/", $name, "_vert.glsl"),
                include_str!(concat!("../assets/shaders/", $name, "_vert.glsl")),
            ),
            (
                concat!("shaders/", $name, "_frag.glsl"),
                include_str!(concat!("../assets/shaders/", $name, "_frag.glsl")),
            ),
        )*]
    };
}

static EMBEDDED: &[(&str, &str)] = embedded!(
    "default",
    "scanlines",
    "blur",
    "dither",
    "fxaa",
    "crt_geometry",
    "test_pattern",
);

/// The shipped shader sources, compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

impl AssetSource for EmbeddedAssets {
    fn read_text(&self, path: &str) -> Result<String, AssetError> {
        EMBEDDED
            .iter()
            .find(|(name, _)| *name == path)
            .map(|(_, text)| (*text).to_string())
            .ok_or_else(|| AssetError::Missing {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_dir_reports_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets = AssetDir::new(dir.path());
        let err = assets
            .read_text("shaders/nothing_vert.glsl")
            .expect_err("missing file");
        assert!(matches!(err, AssetError::Missing { .. }));
        assert!(err.path().ends_with("nothing_vert.glsl"));
    }

    #[test]
    fn asset_dir_reads_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("shaders")).expect("mkdir");
        fs::write(dir.path().join("shaders/blur_frag.glsl"), "void main() {}").expect("write");

        let text = AssetDir::new(dir.path())
            .read_text("shaders/blur_frag.glsl")
            .expect("read");
        assert_eq!(text, "void main() {}");
    }

    #[test]
    fn unreadable_directory_entry_is_not_reported_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("shaders/blur_frag.glsl")).expect("mkdir");

        let err = AssetDir::new(dir.path())
            .read_text("shaders/blur_frag.glsl")
            .expect_err("directory is not a text file");
        assert!(matches!(err, AssetError::Unreadable { .. }));
    }

    #[test]
    fn embedded_bundle_matches_shipped_directory() {
        let disk = AssetDir::bundled();
        for (path, text) in EMBEDDED {
            assert_eq!(disk.read_text(path).expect("bundled asset"), *text);
        }
    }
}
