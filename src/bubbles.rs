use std::cmp::Ordering;

use image::GrayImage;
use imageproc::contours::{find_contours_with_threshold, BorderType, Contour};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::debug;
use logging_timer::time;

use crate::geometry::{contour_bounding_rect, polygon_area};

/// One plausible answer bubble pulled out of the binary image.
#[derive(Clone, Debug)]
pub struct BubbleCandidate {
    pub bounds: Rect,
    pub contour: Vec<Point<i32>>,
    pub area: f64,
    pub aspect_ratio: f32,
}

/// The option bubbles of a single question, ordered left to right to match
/// option labels.
#[derive(Clone, Debug)]
pub struct QuestionGroup {
    pub bubbles: Vec<BubbleCandidate>,
}

/// Size and shape bands a contour must fall in to count as a bubble.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BubbleFilter {
    pub min_width: u32,
    pub min_height: u32,
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

pub enum Extraction {
    /// One entry per question, in sheet order. `None` marks a question whose
    /// row came up short of option bubbles.
    Grouped(Vec<Option<QuestionGroup>>),
    /// Too few candidates to be looking at a usable mark pattern yet.
    Insufficient { found: usize, expected: usize },
}

/// Finds bubble candidates and arranges them into question rows.
///
/// Grouping is only attempted once enough of the expected bubbles are in
/// view; below that the sheet is assumed to be partially occluded or not a
/// mark pattern at all, and the caller should wait for a better frame.
#[time]
pub fn extract_bubbles(
    binary: &GrayImage,
    num_questions: usize,
    num_options: usize,
    filter: &BubbleFilter,
    row_tolerance: i32,
    candidate_tolerance: f32,
) -> Extraction {
    let candidates = find_candidates(binary, filter);
    if !candidates.is_empty() {
        let mut areas: Vec<f64> = candidates.iter().map(|c| c.area).collect();
        areas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let aspect_spread = candidates
            .iter()
            .map(|c| c.aspect_ratio)
            .fold((f32::MAX, f32::MIN), |(lo, hi), a| (lo.min(a), hi.max(a)));
        debug!(
            "{} bubble candidates, median area {:.0}, aspect {:.2}..{:.2}",
            candidates.len(),
            areas[areas.len() / 2],
            aspect_spread.0,
            aspect_spread.1
        );
    }

    let expected = num_questions * num_options;
    let required = (expected as f32 * candidate_tolerance).ceil() as usize;
    if candidates.len() < required {
        return Extraction::Insufficient {
            found: candidates.len(),
            expected,
        };
    }

    Extraction::Grouped(group_into_rows(
        candidates,
        num_questions,
        num_options,
        row_tolerance,
    ))
}

pub fn find_candidates(binary: &GrayImage, filter: &BubbleFilter) -> Vec<BubbleCandidate> {
    let contours: Vec<Contour<i32>> = find_contours_with_threshold(binary, 0);
    let mut candidates = Vec::new();

    for contour in contours {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let bounds = contour_bounding_rect(&contour.points);
        if bounds.width() < filter.min_width || bounds.height() < filter.min_height {
            continue;
        }
        let aspect_ratio = bounds.width() as f32 / bounds.height() as f32;
        if aspect_ratio < filter.min_aspect || aspect_ratio > filter.max_aspect {
            continue;
        }
        let area = polygon_area(&contour.points);
        if area < filter.min_area || area > filter.max_area {
            continue;
        }
        candidates.push(BubbleCandidate {
            bounds,
            contour: contour.points,
            area,
            aspect_ratio,
        });
    }

    candidates
}

/// Sorts candidates top to bottom, cuts them into rows wherever the vertical
/// position jumps past `row_tolerance`, and orders each row left to right.
/// A row with surplus candidates keeps the leftmost `num_options`; a short
/// row (and any missing trailing row) yields `None`.
fn group_into_rows(
    mut candidates: Vec<BubbleCandidate>,
    num_questions: usize,
    num_options: usize,
    row_tolerance: i32,
) -> Vec<Option<QuestionGroup>> {
    candidates.sort_by_key(|c| c.bounds.top());

    let mut rows: Vec<Vec<BubbleCandidate>> = Vec::new();
    for candidate in candidates {
        match rows.last_mut() {
            Some(row) if (candidate.bounds.top() - row[0].bounds.top()).abs() < row_tolerance => {
                row.push(candidate);
            }
            _ => rows.push(vec![candidate]),
        }
    }

    let mut groups: Vec<Option<QuestionGroup>> = Vec::with_capacity(num_questions);
    for (question, mut row) in rows.into_iter().enumerate().take(num_questions) {
        row.sort_by_key(|c| c.bounds.left());
        if row.len() < num_options {
            debug!(
                "question {} row has {} of {} option bubbles",
                question + 1,
                row.len(),
                num_options
            );
            groups.push(None);
        } else {
            row.truncate(num_options);
            groups.push(Some(QuestionGroup { bubbles: row }));
        }
    }
    while groups.len() < num_questions {
        groups.push(None);
    }
    groups
}
