use image::{GrayImage, Luma, Rgb};
use imageproc::rect::Rect;

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Binarizes with inverted polarity: pixels at or below `level` (ink) become
/// foreground white, everything brighter becomes background black.
pub fn threshold_inverted(img: &GrayImage, level: u8) -> GrayImage {
    let mut out = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let value = if pixel.0[0] <= level { WHITE } else { BLACK };
        out.put_pixel(x, y, value);
    }
    out
}

/// Counts foreground (non-zero) pixels inside `rect`, clamped to the image.
pub fn count_foreground_in_rect(img: &GrayImage, rect: &Rect) -> u32 {
    let mut count = 0;
    for y in rect.top()..=rect.bottom() {
        for x in rect.left()..=rect.right() {
            if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
                continue;
            }
            if img.get_pixel(x as u32, y as u32).0[0] > 0 {
                count += 1;
            }
        }
    }
    count
}

/// Mean grayscale intensity inside `rect`, clamped to the image. An empty
/// intersection reads as fully bright paper.
pub fn mean_intensity(img: &GrayImage, rect: &Rect) -> f32 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in rect.top()..=rect.bottom() {
        for x in rect.left()..=rect.right() {
            if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
                continue;
            }
            sum += img.get_pixel(x as u32, y as u32).0[0] as u64;
            count += 1;
        }
    }
    if count == 0 {
        return 255.0;
    }
    sum as f32 / count as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_inverted_marks_dark_pixels_as_foreground() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([200]));
        img.put_pixel(1, 1, Luma([30]));
        img.put_pixel(2, 2, Luma([100]));

        let binary = threshold_inverted(&img, 100);
        assert_eq!(binary.get_pixel(1, 1), &WHITE);
        assert_eq!(binary.get_pixel(2, 2), &WHITE);
        assert_eq!(binary.get_pixel(0, 0), &BLACK);
        assert_eq!(binary.pixels().filter(|p| **p == WHITE).count(), 2);
    }

    #[test]
    fn counts_foreground_only_inside_rect() {
        let mut img = GrayImage::new(10, 10);
        img.put_pixel(2, 2, WHITE);
        img.put_pixel(3, 2, WHITE);
        img.put_pixel(9, 9, WHITE);

        let rect = Rect::at(0, 0).of_size(5, 5);
        assert_eq!(count_foreground_in_rect(&img, &rect), 2);
    }

    #[test]
    fn rect_outside_image_reads_as_paper() {
        let img = GrayImage::new(4, 4);
        let rect = Rect::at(100, 100).of_size(3, 3);
        assert_eq!(mean_intensity(&img, &rect), 255.0);
        assert_eq!(count_foreground_in_rect(&img, &rect), 0);
    }

    #[test]
    fn mean_intensity_averages_region() {
        let mut img = GrayImage::from_pixel(2, 1, Luma([100]));
        img.put_pixel(1, 0, Luma([200]));
        let rect = Rect::at(0, 0).of_size(2, 1);
        assert_eq!(mean_intensity(&img, &rect), 150.0);
    }
}
