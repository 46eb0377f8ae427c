use imageproc::point::Point;
use imageproc::rect::Rect;

pub fn distance_from_point_to_point(p1: &Point<f32>, p2: &Point<f32>) -> f32 {
    ((p1.x - p2.x).powf(2.0) + (p1.y - p2.y).powf(2.0)).sqrt()
}

/// Axis-aligned bounding box of a contour.
pub fn contour_bounding_rect(points: &[Point<i32>]) -> Rect {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    if points.is_empty() {
        return Rect::at(0, 0).of_size(1, 1);
    }
    Rect::at(min_x, min_y).of_size((max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32)
}

/// Enclosed area of a closed polygon via the shoelace formula.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        doubled += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (doubled.abs() as f64) / 2.0
}

fn polygon_area_f32(points: &[Point<f32>]) -> f32 {
    let mut doubled = 0.0f32;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        doubled += p.x * q.y - q.x * p.y;
    }
    doubled.abs() / 2.0
}

/// Four sheet corners in canonical order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadrilateral {
    pub top_left: Point<f32>,
    pub top_right: Point<f32>,
    pub bottom_right: Point<f32>,
    pub bottom_left: Point<f32>,
}

impl Quadrilateral {
    /// Orders four arbitrary vertices into top-left, top-right, bottom-right,
    /// bottom-left. The top-left corner has the smallest coordinate sum and
    /// the bottom-right the largest; the remaining two are told apart by the
    /// difference `y - x`.
    pub fn from_unordered(points: [Point<f32>; 4]) -> Self {
        let sum = |p: &Point<f32>| p.x + p.y;
        let diff = |p: &Point<f32>| p.y - p.x;

        let mut by_sum = points;
        by_sum.sort_by(|a, b| sum(a).partial_cmp(&sum(b)).unwrap_or(std::cmp::Ordering::Equal));
        let top_left = by_sum[0];
        let bottom_right = by_sum[3];

        let mut by_diff = points;
        by_diff.sort_by(|a, b| diff(a).partial_cmp(&diff(b)).unwrap_or(std::cmp::Ordering::Equal));
        let top_right = by_diff[0];
        let bottom_left = by_diff[3];

        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    pub fn corners(&self) -> [Point<f32>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn area(&self) -> f32 {
        polygon_area_f32(&self.corners())
    }

    /// A quadrilateral with coincident or collinear vertices cannot anchor a
    /// perspective transform.
    pub fn is_degenerate(&self) -> bool {
        let corners = self.corners();
        for i in 0..4 {
            for j in (i + 1)..4 {
                if distance_from_point_to_point(&corners[i], &corners[j]) < 1.0 {
                    return true;
                }
            }
        }
        self.area() < 1.0
    }
}
