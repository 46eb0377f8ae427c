use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use logging_timer::time;

use crate::geometry::{distance_from_point_to_point, Quadrilateral};

/// A sheet warped onto an axis-aligned rectangle. The color view is kept for
/// annotation, the grayscale view feeds bubble scoring.
pub struct RectifiedSheet {
    pub paper: RgbImage,
    pub gray: GrayImage,
}

/// The quadrilateral cannot anchor a perspective transform.
#[derive(Debug)]
pub struct InvalidGeometry;

/// Maps the sheet quadrilateral onto a rectangle sized from the longer of each
/// pair of opposite edges, so content is neither cropped nor stretched to some
/// arbitrary fixed size.
#[time]
pub fn rectify(
    frame: &RgbImage,
    grayscale: &GrayImage,
    quad: &Quadrilateral,
) -> Result<RectifiedSheet, InvalidGeometry> {
    if quad.is_degenerate() {
        return Err(InvalidGeometry);
    }

    let top = distance_from_point_to_point(&quad.top_left, &quad.top_right);
    let bottom = distance_from_point_to_point(&quad.bottom_left, &quad.bottom_right);
    let left = distance_from_point_to_point(&quad.top_left, &quad.bottom_left);
    let right = distance_from_point_to_point(&quad.top_right, &quad.bottom_right);

    let out_width = top.max(bottom).round() as u32;
    let out_height = left.max(right).round() as u32;
    if out_width == 0 || out_height == 0 {
        return Err(InvalidGeometry);
    }

    let src = [
        (quad.top_left.x, quad.top_left.y),
        (quad.top_right.x, quad.top_right.y),
        (quad.bottom_right.x, quad.bottom_right.y),
        (quad.bottom_left.x, quad.bottom_left.y),
    ];
    let dst = [
        (0.0, 0.0),
        (out_width as f32 - 1.0, 0.0),
        (out_width as f32 - 1.0, out_height as f32 - 1.0),
        (0.0, out_height as f32 - 1.0),
    ];

    let projection = Projection::from_control_points(src, dst).ok_or(InvalidGeometry)?;

    let mut paper = RgbImage::new(out_width, out_height);
    let mut gray = GrayImage::new(out_width, out_height);
    warp_into(
        frame,
        &projection,
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
        &mut paper,
    );
    warp_into(
        grayscale,
        &projection,
        Interpolation::Bilinear,
        Luma([255]),
        &mut gray,
    );

    Ok(RectifiedSheet { paper, gray })
}
