use image::{GrayImage, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use logging_timer::time;

use crate::assignment::ScanOptions;
use crate::image_utils::threshold_inverted;

/// Derived views of one captured frame. Each downstream stage reads the view
/// it needs and never writes back.
pub struct Preprocessed {
    pub grayscale: GrayImage,
    pub blurred: GrayImage,
    pub edges: GrayImage,
    pub binary: GrayImage,
}

#[derive(Debug)]
pub struct InvalidFrame {
    pub width: u32,
    pub height: u32,
}

#[time]
pub fn preprocess(frame: &RgbImage, options: &ScanOptions) -> Result<Preprocessed, InvalidFrame> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(InvalidFrame {
            width: frame.width(),
            height: frame.height(),
        });
    }

    let grayscale = image::imageops::grayscale(frame);
    let blurred = gaussian_blur_f32(&grayscale, options.blur_sigma);

    // The edge map and the inverted binary are independent derivations of the
    // blurred image.
    let (edges, binary) = rayon::join(
        || canny(&blurred, options.canny_low, options.canny_high),
        || threshold_inverted(&blurred, otsu_level(&blurred)),
    );

    Ok(Preprocessed {
        grayscale,
        blurred,
        edges,
        binary,
    })
}
