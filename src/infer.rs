use image::GrayImage;
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use logging_timer::time;

use crate::assignment::OptionIndex;
use crate::bubbles::{BubbleCandidate, QuestionGroup};
use crate::image_utils::{count_foreground_in_rect, mean_intensity, WHITE};

/// What a student marked for one question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectedAnswer {
    Marked(OptionIndex),
    /// No bubble was convincingly filled, or the question row was incomplete.
    Unmarked,
}

impl DetectedAnswer {
    pub fn option(&self) -> Option<OptionIndex> {
        match self {
            DetectedAnswer::Marked(option) => Some(*option),
            DetectedAnswer::Unmarked => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            DetectedAnswer::Marked(option) => option.letter(),
            DetectedAnswer::Unmarked => 'X',
        }
    }
}

/// One entry per question, in sheet order.
pub type DetectedAnswerSet = Vec<DetectedAnswer>;

/// Absolute confidence floor the winning bubble has to clear. Checked once,
/// on the winner only, never while candidates are still being compared.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FillFloor {
    MinForegroundPixels(u32),
    MaxMeanIntensity(f32),
}

/// How filled one bubble looks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillScore {
    pub foreground_pixels: u32,
    pub mean_intensity: f32,
}

impl FillScore {
    /// Foreground pixel count decides; mean intensity breaks exact ties with
    /// darker winning. Equal on both reads as not stronger, which keeps the
    /// first-encountered candidate.
    fn stronger_than(&self, other: &FillScore) -> bool {
        if self.foreground_pixels != other.foreground_pixels {
            return self.foreground_pixels > other.foreground_pixels;
        }
        self.mean_intensity < other.mean_intensity
    }

    fn passes(&self, floor: &FillFloor) -> bool {
        match floor {
            FillFloor::MinForegroundPixels(min) => self.foreground_pixels >= *min,
            FillFloor::MaxMeanIntensity(max) => self.mean_intensity < *max,
        }
    }
}

/// Picks the most filled bubble per question, then applies the confidence
/// floor to that winner. Questions with no group at all come out unmarked.
#[time]
pub fn infer_answers(
    groups: &[Option<QuestionGroup>],
    binary: &GrayImage,
    grayscale: &GrayImage,
    floor: &FillFloor,
) -> DetectedAnswerSet {
    groups
        .iter()
        .map(|group| match group {
            Some(group) => infer_question(group, binary, grayscale, floor),
            None => DetectedAnswer::Unmarked,
        })
        .collect()
}

fn infer_question(
    group: &QuestionGroup,
    binary: &GrayImage,
    grayscale: &GrayImage,
    floor: &FillFloor,
) -> DetectedAnswer {
    let mut best: Option<(FillScore, usize)> = None;
    for (index, bubble) in group.bubbles.iter().enumerate() {
        let score = fill_score(bubble, binary, grayscale);
        if best.map_or(true, |(best_score, _)| score.stronger_than(&best_score)) {
            best = Some((score, index));
        }
    }

    match best {
        Some((score, index)) if score.passes(floor) => OptionIndex::new(index)
            .map(DetectedAnswer::Marked)
            .unwrap_or(DetectedAnswer::Unmarked),
        _ => DetectedAnswer::Unmarked,
    }
}

pub fn fill_score(bubble: &BubbleCandidate, binary: &GrayImage, grayscale: &GrayImage) -> FillScore {
    FillScore {
        foreground_pixels: count_foreground_in_contour(binary, bubble),
        mean_intensity: mean_intensity(grayscale, &bubble.bounds),
    }
}

/// Counts binary foreground pixels under the bubble's contour mask. The mask
/// is rasterized only over the bounding box.
fn count_foreground_in_contour(binary: &GrayImage, bubble: &BubbleCandidate) -> u32 {
    let bounds = bubble.bounds;
    let mut shifted: Vec<Point<i32>> = bubble
        .contour
        .iter()
        .map(|p| Point::new(p.x - bounds.left(), p.y - bounds.top()))
        .collect();
    if shifted.len() > 1 && shifted.first() == shifted.last() {
        shifted.pop();
    }
    if shifted.len() < 3 {
        return count_foreground_in_rect(binary, &bounds);
    }

    let mut mask = GrayImage::new(bounds.width(), bounds.height());
    draw_polygon_mut(&mut mask, &shifted, WHITE);

    let mut count = 0;
    for (x, y, mask_pixel) in mask.enumerate_pixels() {
        if mask_pixel.0[0] == 0 {
            continue;
        }
        let frame_x = bounds.left() + x as i32;
        let frame_y = bounds.top() + y as i32;
        if frame_x < 0
            || frame_y < 0
            || frame_x as u32 >= binary.width()
            || frame_y as u32 >= binary.height()
        {
            continue;
        }
        if binary.get_pixel(frame_x as u32, frame_y as u32).0[0] > 0 {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use imageproc::rect::Rect;

    use super::*;

    /// A square "bubble" whose contour is its bounding box outline.
    fn square_bubble(left: i32, top: i32, side: i32) -> BubbleCandidate {
        let contour = vec![
            Point::new(left, top),
            Point::new(left + side - 1, top),
            Point::new(left + side - 1, top + side - 1),
            Point::new(left, top + side - 1),
        ];
        BubbleCandidate {
            bounds: Rect::at(left, top).of_size(side as u32, side as u32),
            contour,
            area: (side * side) as f64,
            aspect_ratio: 1.0,
        }
    }

    fn fill_square(binary: &mut GrayImage, gray: &mut GrayImage, left: u32, top: u32, side: u32) {
        for y in top..top + side {
            for x in left..left + side {
                binary.put_pixel(x, y, WHITE);
                gray.put_pixel(x, y, image::Luma([20]));
            }
        }
    }

    fn three_bubble_group() -> QuestionGroup {
        QuestionGroup {
            bubbles: vec![
                square_bubble(10, 10, 10),
                square_bubble(30, 10, 10),
                square_bubble(50, 10, 10),
            ],
        }
    }

    #[test]
    fn most_filled_bubble_wins() {
        let mut binary = GrayImage::new(80, 40);
        let mut gray = GrayImage::from_pixel(80, 40, image::Luma([240]));
        fill_square(&mut binary, &mut gray, 30, 10, 10);

        let groups = vec![Some(three_bubble_group())];
        let answers = infer_answers(&groups, &binary, &gray, &FillFloor::MinForegroundPixels(50));
        assert_eq!(answers, vec![DetectedAnswer::Marked(OptionIndex::new(1).unwrap())]);
    }

    #[test]
    fn winner_below_floor_is_unmarked() {
        let mut binary = GrayImage::new(80, 40);
        let mut gray = GrayImage::from_pixel(80, 40, image::Luma([240]));
        // A few stray pixels in the last bubble, far below the floor.
        fill_square(&mut binary, &mut gray, 52, 12, 2);

        let groups = vec![Some(three_bubble_group())];
        let answers = infer_answers(&groups, &binary, &gray, &FillFloor::MinForegroundPixels(50));
        assert_eq!(answers, vec![DetectedAnswer::Unmarked]);
    }

    #[test]
    fn blank_sheet_never_selects_an_option() {
        let binary = GrayImage::new(80, 40);
        let gray = GrayImage::from_pixel(80, 40, image::Luma([240]));

        let groups = vec![Some(three_bubble_group()), None];
        let answers = infer_answers(&groups, &binary, &gray, &FillFloor::MinForegroundPixels(1));
        assert_eq!(answers, vec![DetectedAnswer::Unmarked, DetectedAnswer::Unmarked]);
    }

    #[test]
    fn exact_pixel_tie_breaks_by_darker_mean_then_first() {
        let mut binary = GrayImage::new(80, 40);
        let mut gray = GrayImage::from_pixel(80, 40, image::Luma([240]));
        // Same foreground count in bubbles one and two, but two is darker
        // around the marks.
        fill_square(&mut binary, &mut gray, 12, 12, 4);
        fill_square(&mut binary, &mut gray, 32, 12, 4);
        for y in 10..20 {
            for x in 30..40 {
                gray.put_pixel(x, y, image::Luma([100]));
            }
        }

        let groups = vec![Some(three_bubble_group())];
        let answers = infer_answers(&groups, &binary, &gray, &FillFloor::MinForegroundPixels(1));
        assert_eq!(answers, vec![DetectedAnswer::Marked(OptionIndex::new(1).unwrap())]);
    }

    #[test]
    fn identical_scores_keep_first_encountered() {
        let mut binary = GrayImage::new(80, 40);
        let mut gray = GrayImage::from_pixel(80, 40, image::Luma([240]));
        fill_square(&mut binary, &mut gray, 12, 12, 4);
        fill_square(&mut binary, &mut gray, 32, 12, 4);

        let groups = vec![Some(three_bubble_group())];
        let answers = infer_answers(&groups, &binary, &gray, &FillFloor::MinForegroundPixels(1));
        assert_eq!(answers, vec![DetectedAnswer::Marked(OptionIndex::new(0).unwrap())]);
    }

    #[test]
    fn intensity_floor_applies_to_winner_only() {
        let mut binary = GrayImage::new(80, 40);
        let mut gray = GrayImage::from_pixel(80, 40, image::Luma([240]));
        // Clearly filled middle bubble: dark region, plenty of foreground.
        fill_square(&mut binary, &mut gray, 30, 10, 10);

        let groups = vec![Some(three_bubble_group())];
        let marked = infer_answers(&groups, &binary, &gray, &FillFloor::MaxMeanIntensity(100.0));
        assert_eq!(marked, vec![DetectedAnswer::Marked(OptionIndex::new(1).unwrap())]);

        // Same sheet with a stricter ceiling: the winner fails the floor.
        let unmarked = infer_answers(&groups, &binary, &gray, &FillFloor::MaxMeanIntensity(10.0));
        assert_eq!(unmarked, vec![DetectedAnswer::Unmarked]);
    }

    #[test]
    fn unmarked_answer_prints_as_x() {
        assert_eq!(DetectedAnswer::Unmarked.letter(), 'X');
        assert_eq!(
            DetectedAnswer::Marked(OptionIndex::new(2).unwrap()).letter(),
            'C'
        );
    }
}
