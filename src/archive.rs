use std::fs;
use std::path::PathBuf;

use image::RgbImage;
use log::debug;

#[derive(Debug)]
pub enum ArchiveError {
    Io(std::io::Error),
    Encode(image::ImageError),
}

/// Persists annotated result images and hands back the stored path for the
/// grading record. Archival failing never blocks grading.
pub trait ImageArchiver {
    fn archive(&self, image: &RgbImage, stem: &str) -> Result<String, ArchiveError>;
}

/// Writes PNG files into a flat directory, creating it on first use.
pub struct DirectoryArchiver {
    dir: PathBuf,
}

impl DirectoryArchiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageArchiver for DirectoryArchiver {
    fn archive(&self, image: &RgbImage, stem: &str) -> Result<String, ArchiveError> {
        fs::create_dir_all(&self.dir).map_err(ArchiveError::Io)?;
        let path = self.dir.join(format!("{}.png", stem));
        image.save(&path).map_err(ArchiveError::Encode)?;
        debug!("result image archived to {}", path.display());
        Ok(path.to_string_lossy().into_owned())
    }
}
