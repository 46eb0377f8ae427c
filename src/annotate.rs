use std::path::Path;

use image::RgbImage;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::warn;
use rusttype::{Font, Scale};

use crate::bubbles::QuestionGroup;
use crate::grade::QuestionResult;
use crate::image_utils::{GREEN, RED};

const SCORE_TEXT_SCALE: f32 = 28.0;

/// Draws the grading outcome onto the rectified sheet: the correct answer's
/// bubble is outlined green when the student hit it and red otherwise, and
/// the score is printed in the top left corner when a font is available.
pub struct Annotator {
    font: Option<Font<'static>>,
}

impl Annotator {
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(|path| match std::fs::read(path) {
            Ok(bytes) => {
                let font = Font::try_from_vec(bytes);
                if font.is_none() {
                    warn!("{} is not a usable font; score text disabled", path.display());
                }
                font
            }
            Err(e) => {
                warn!("could not read font {}: {}; score text disabled", path.display(), e);
                None
            }
        });
        Self { font }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn annotate(
        &self,
        paper: &mut RgbImage,
        groups: &[Option<QuestionGroup>],
        details: &[QuestionResult],
        score: f32,
    ) {
        for detail in details {
            let Some(Some(group)) = groups.get(detail.question_number - 1) else {
                continue;
            };
            let Some(bubble) = group.bubbles.get(detail.correct_option.as_usize()) else {
                continue;
            };
            let color = if detail.is_correct { GREEN } else { RED };
            draw_thick_hollow_rect(paper, &bubble.bounds, color);
        }

        if let Some(font) = &self.font {
            imageproc::drawing::draw_text_mut(
                paper,
                RED,
                10,
                30,
                Scale::uniform(SCORE_TEXT_SCALE),
                font,
                &format!("{:.2}%", score),
            );
        }
    }
}

fn draw_thick_hollow_rect(canvas: &mut RgbImage, rect: &Rect, color: image::Rgb<u8>) {
    draw_hollow_rect_mut(canvas, *rect, color);
    if rect.width() > 4 && rect.height() > 4 {
        let inner = Rect::at(rect.left() + 1, rect.top() + 1).of_size(rect.width() - 2, rect.height() - 2);
        draw_hollow_rect_mut(canvas, inner, color);
        let outer = Rect::at(rect.left() - 1, rect.top() - 1).of_size(rect.width() + 2, rect.height() + 2);
        draw_hollow_rect_mut(canvas, outer, color);
    }
}

#[cfg(test)]
mod tests {
    use imageproc::point::Point;

    use super::*;
    use crate::assignment::OptionIndex;
    use crate::bubbles::BubbleCandidate;

    fn group_with_bubbles(lefts: &[i32]) -> QuestionGroup {
        QuestionGroup {
            bubbles: lefts
                .iter()
                .map(|&left| BubbleCandidate {
                    bounds: Rect::at(left, 20).of_size(10, 10),
                    contour: vec![
                        Point::new(left, 20),
                        Point::new(left + 9, 20),
                        Point::new(left + 9, 29),
                        Point::new(left, 29),
                    ],
                    area: 100.0,
                    aspect_ratio: 1.0,
                })
                .collect(),
        }
    }

    #[test]
    fn outlines_correct_answer_in_result_color() {
        let mut paper = RgbImage::from_pixel(100, 60, image::Rgb([255, 255, 255]));
        let groups = vec![Some(group_with_bubbles(&[10, 40, 70]))];
        let details = vec![QuestionResult {
            question_number: 1,
            correct_option: OptionIndex::new(1).expect("in range"),
            student_option: OptionIndex::new(1),
            is_correct: true,
        }];

        Annotator::without_font().annotate(&mut paper, &groups, &details, 100.0);

        // Border of the middle bubble turned green, the others stayed white.
        assert_eq!(paper.get_pixel(40, 20), &GREEN);
        assert_eq!(paper.get_pixel(10, 20), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn incomplete_groups_are_skipped() {
        let mut paper = RgbImage::from_pixel(100, 60, image::Rgb([255, 255, 255]));
        let groups = vec![None];
        let details = vec![QuestionResult {
            question_number: 1,
            correct_option: OptionIndex::new(0).expect("in range"),
            student_option: None,
            is_correct: false,
        }];

        // Nothing to outline and nothing to panic over.
        Annotator::without_font().annotate(&mut paper, &groups, &details, 0.0);
        assert_eq!(paper.get_pixel(10, 20), &image::Rgb([255, 255, 255]));
    }

    #[test]
    fn missing_font_file_disables_text() {
        let annotator = Annotator::new(Some(Path::new("/no/such/font.ttf")));
        assert!(annotator.font.is_none());
    }
}
