use std::cmp::Ordering;

use image::GrayImage;
use imageproc::contours::{find_contours_with_threshold, BorderType, Contour};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use log::debug;
use logging_timer::time;

use crate::assignment::ScanOptions;
use crate::geometry::{polygon_area, Quadrilateral};

/// Searches an edge map for the sheet boundary.
///
/// External contours are tried largest-first. A candidate is accepted when its
/// polygon approximation has exactly four vertices and it covers a plausible
/// share of the frame, which rules out both sheet fragments and contours that
/// trace the whole background. `None` simply means no sheet is in view yet.
#[time]
pub fn locate_sheet(edges: &GrayImage, options: &ScanOptions) -> Option<Quadrilateral> {
    let frame_area = edges.width() as f64 * edges.height() as f64;
    if frame_area == 0.0 {
        return None;
    }

    let contours: Vec<Contour<i32>> = find_contours_with_threshold(edges, 0);
    let mut candidates: Vec<(f64, &Contour<i32>)> = contours
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| (polygon_area(&contour.points), contour))
        .collect();
    candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    for (area, contour) in candidates {
        let perimeter = arc_length(&contour.points, true);
        let approx = approximate_polygon_dp(&contour.points, 0.02 * perimeter, true);
        if approx.len() != 4 {
            continue;
        }

        let area_ratio = area / frame_area;
        if area_ratio <= options.min_sheet_area_ratio as f64
            || area_ratio >= options.max_sheet_area_ratio as f64
        {
            debug!(
                "rejecting quadrilateral candidate with area ratio {:.3}",
                area_ratio
            );
            continue;
        }

        let corners = [
            to_f32(approx[0]),
            to_f32(approx[1]),
            to_f32(approx[2]),
            to_f32(approx[3]),
        ];
        return Some(Quadrilateral::from_unordered(corners));
    }

    None
}

fn to_f32(point: Point<i32>) -> Point<f32> {
    Point::new(point.x as f32, point.y as f32)
}
