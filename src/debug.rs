use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use log::warn;

/// Creates a path for a debug image.
pub fn debug_image_path(base: &Path, label: &str) -> PathBuf {
    let mut result = PathBuf::from(base);
    result.set_file_name(format!(
        "{}_debug_{}.png",
        base.file_stem().unwrap_or_default().to_str().unwrap_or(""),
        label
    ));
    result
}

/// Writes intermediate pipeline images next to a base path when enabled.
/// The disabled writer is free to pass around and does nothing.
pub struct ImageDebugWriter {
    base: Option<PathBuf>,
}

impl ImageDebugWriter {
    pub fn new(base: PathBuf) -> Self {
        Self { base: Some(base) }
    }

    pub fn disabled() -> Self {
        Self { base: None }
    }

    pub fn write_gray(&self, label: &str, image: &GrayImage) {
        if let Some(base) = &self.base {
            let path = debug_image_path(base, label);
            if let Err(e) = image.save(&path) {
                warn!("failed to write debug image {}: {}", path.display(), e);
            }
        }
    }

    pub fn write_rgb(&self, label: &str, image: &RgbImage) {
        if let Some(base) = &self.base {
            let path = debug_image_path(base, label);
            if let Err(e) = image.save(&path) {
                warn!("failed to write debug image {}: {}", path.display(), e);
            }
        }
    }
}
