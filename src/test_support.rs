//! Synthetic sheet images for pipeline tests.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

const INK: Rgb<u8> = Rgb([20, 20, 20]);
const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const BACKDROP: Rgb<u8> = Rgb([60, 60, 60]);

const BUBBLE_RADIUS: i32 = 12;

/// An unfilled bubble is a thick printed ring; a marked one is a solid disc.
fn draw_bubble(canvas: &mut RgbImage, center: (i32, i32), marked: bool) {
    if marked {
        draw_filled_circle_mut(canvas, center, BUBBLE_RADIUS, INK);
    } else {
        for radius in 9..=BUBBLE_RADIUS {
            draw_hollow_circle_mut(canvas, center, radius, INK);
        }
    }
}

/// A straight-on shot of bare bubbles on white paper, one row per question.
/// `pattern[q]` names the marked option, `None` leaves the row blank.
pub fn grid_frame(pattern: &[Option<usize>], num_options: usize) -> RgbImage {
    let mut frame = RgbImage::from_pixel(280, 320, PAPER);
    for (row, marked) in pattern.iter().enumerate() {
        for col in 0..num_options {
            let center = (40 + col as i32 * 45, 40 + row as i32 * 55);
            draw_bubble(&mut frame, center, *marked == Some(col));
        }
    }
    frame
}

/// A camera-style frame: a white sheet on a dark desk, bubbles printed on the
/// sheet. Roughly half the frame is sheet, so the locator accepts it.
pub fn sheet_frame(pattern: &[Option<usize>], num_options: usize) -> RgbImage {
    let mut frame = RgbImage::from_pixel(480, 480, BACKDROP);
    draw_filled_rect_mut(&mut frame, Rect::at(90, 50).of_size(300, 380), PAPER);
    for (row, marked) in pattern.iter().enumerate() {
        for col in 0..num_options {
            let center = (140 + col as i32 * 50, 120 + row as i32 * 60);
            draw_bubble(&mut frame, center, *marked == Some(col));
        }
    }
    frame
}

/// A frame with no sheet in view at all.
pub fn blank_dark_frame() -> RgbImage {
    RgbImage::from_pixel(480, 480, BACKDROP)
}
