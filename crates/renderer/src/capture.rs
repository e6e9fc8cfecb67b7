use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use tracing::info;

/// Writes a captured frame as PNG, creating parent directories as needed.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write screenshot to {}", path.display()))?;
    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "saved screenshot"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn writes_png_into_nested_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shots").join("frame.png");
        let image = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255]));

        save_png(&image, &path).expect("save");

        let loaded = image::open(&path).expect("reopen").to_rgba8();
        assert_eq!(loaded.dimensions(), (4, 3));
        assert_eq!(loaded.get_pixel(3, 2).0, [10, 20, 30, 255]);
    }
}
