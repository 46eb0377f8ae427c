use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::debug;

#[derive(Debug)]
pub enum CaptureError {
    SourceUnavailable(PathBuf, std::io::Error),
    FrameDecode(PathBuf, image::ImageError),
}

/// Pull-based video frame source. A camera, a network stream, and a folder of
/// still captures all look the same from the scan loop's side.
pub trait FrameSource {
    /// The next frame, or `Ok(None)` on a clean end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError>;
}

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Replays the image files of a directory in lexicographic order. Stands in
/// for a live camera when grading previously captured frames.
pub struct DirectoryFrameSource {
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path) -> Result<Self, CaptureError> {
        let entries = fs::read_dir(dir)
            .map_err(|e| CaptureError::SourceUnavailable(dir.to_path_buf(), e))?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        debug!("{} frames queued from {}", frames.len(), dir.display());
        Ok(Self { frames, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for DirectoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        let Some(path) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;

        let frame = image::open(path)
            .map_err(|e| CaptureError::FrameDecode(path.clone(), e))?
            .into_rgb8();
        debug!("frame {} read from {}", self.cursor, path.display());
        Ok(Some(frame))
    }
}

/// In-memory frame sequence for exercising the scan loop in tests.
#[cfg(test)]
pub struct MemoryFrameSource {
    frames: std::vec::IntoIter<RgbImage>,
}

#[cfg(test)]
impl MemoryFrameSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

#[cfg(test)]
impl FrameSource for MemoryFrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        Ok(self.frames.next())
    }
}
