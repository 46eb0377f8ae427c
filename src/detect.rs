use image::{GrayImage, RgbImage};
use imageproc::contrast::otsu_level;
use log::debug;

use crate::assignment::{ScanOptions, Strategy};
use crate::bubbles::BubbleFilter;
use crate::geometry::Quadrilateral;
use crate::image_utils::threshold_inverted;
use crate::infer::FillFloor;
use crate::locate::locate_sheet;
use crate::preprocess::Preprocessed;
use crate::rectify::{rectify, InvalidGeometry};

/// Where on the frame the mark pattern is read from.
pub enum SheetRegion {
    /// A located sheet boundary that still needs rectifying.
    Quad(Quadrilateral),
    /// The whole frame, for the heuristic that never looks for a page.
    FullFrame,
}

/// A sheet ready for bubble extraction: color view for annotation, grayscale
/// for intensity scoring, inverted binary for foreground counting.
pub struct PreparedSheet {
    pub paper: RgbImage,
    pub gray: GrayImage,
    pub binary: GrayImage,
}

/// One interface over the two bubble detection heuristics, so the scan loop
/// does not care which variant an assignment is configured with.
pub trait AnswerDetector {
    fn name(&self) -> &'static str;

    /// Finds the region to read. `None` means no sheet is in view yet and the
    /// caller should try again on a later frame.
    fn locate(&self, pre: &Preprocessed, options: &ScanOptions) -> Option<SheetRegion>;

    /// Produces the prepared sheet for the located region.
    fn prepare(
        &self,
        frame: &RgbImage,
        pre: &Preprocessed,
        region: &SheetRegion,
    ) -> Result<PreparedSheet, InvalidGeometry>;

    fn bubble_filter(&self, options: &ScanOptions) -> BubbleFilter;

    fn fill_floor(&self, options: &ScanOptions) -> FillFloor;
}

pub fn detector_for(strategy: Strategy) -> &'static dyn AnswerDetector {
    match strategy {
        Strategy::Geometric => &GeometricDetector,
        Strategy::DensityGrid => &DensityGridDetector,
    }
}

/// Finds the sheet outline on the edge map, rectifies its perspective, and
/// reads bubbles from contour geometry on the rectified image.
pub struct GeometricDetector;

impl AnswerDetector for GeometricDetector {
    fn name(&self) -> &'static str {
        "geometric"
    }

    fn locate(&self, pre: &Preprocessed, options: &ScanOptions) -> Option<SheetRegion> {
        locate_sheet(&pre.edges, options).map(SheetRegion::Quad)
    }

    fn prepare(
        &self,
        frame: &RgbImage,
        pre: &Preprocessed,
        region: &SheetRegion,
    ) -> Result<PreparedSheet, InvalidGeometry> {
        match region {
            SheetRegion::Quad(quad) => {
                let sheet = rectify(frame, &pre.grayscale, quad)?;
                // The rectified view gets its own threshold level; the sheet
                // fills the image now, so the frame's background no longer
                // skews the histogram.
                let binary = threshold_inverted(&sheet.gray, otsu_level(&sheet.gray));
                Ok(PreparedSheet {
                    paper: sheet.paper,
                    gray: sheet.gray,
                    binary,
                })
            }
            SheetRegion::FullFrame => {
                debug!("geometric detector handed a full-frame region");
                Ok(pass_through(frame, pre))
            }
        }
    }

    fn bubble_filter(&self, options: &ScanOptions) -> BubbleFilter {
        BubbleFilter {
            min_width: options.min_bubble_side,
            min_height: options.min_bubble_side,
            min_area: 0.0,
            max_area: f64::INFINITY,
            min_aspect: options.rectified_aspect_band[0],
            max_aspect: options.rectified_aspect_band[1],
        }
    }

    fn fill_floor(&self, options: &ScanOptions) -> FillFloor {
        FillFloor::MinForegroundPixels(options.min_fill_pixels)
    }
}

/// Reads bubble density straight off the frame. Cheaper and tolerant of
/// sheets without a clean printed border, at the cost of assuming the camera
/// already faces the sheet roughly straight on.
pub struct DensityGridDetector;

impl AnswerDetector for DensityGridDetector {
    fn name(&self) -> &'static str {
        "density-grid"
    }

    fn locate(&self, _pre: &Preprocessed, _options: &ScanOptions) -> Option<SheetRegion> {
        Some(SheetRegion::FullFrame)
    }

    fn prepare(
        &self,
        frame: &RgbImage,
        pre: &Preprocessed,
        _region: &SheetRegion,
    ) -> Result<PreparedSheet, InvalidGeometry> {
        Ok(pass_through(frame, pre))
    }

    fn bubble_filter(&self, options: &ScanOptions) -> BubbleFilter {
        BubbleFilter {
            min_width: 1,
            min_height: 1,
            min_area: options.min_bubble_area,
            max_area: options.max_bubble_area,
            min_aspect: options.coarse_aspect_band[0],
            max_aspect: options.coarse_aspect_band[1],
        }
    }

    fn fill_floor(&self, options: &ScanOptions) -> FillFloor {
        FillFloor::MaxMeanIntensity(options.max_marked_intensity)
    }
}

fn pass_through(frame: &RgbImage, pre: &Preprocessed) -> PreparedSheet {
    PreparedSheet {
        paper: frame.clone(),
        gray: pre.grayscale.clone(),
        binary: pre.binary.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::Strategy;
    use crate::bubbles::{extract_bubbles, Extraction};
    use crate::infer::{infer_answers, DetectedAnswer};
    use crate::preprocess::preprocess;
    use crate::test_support::{blank_dark_frame, grid_frame, sheet_frame};

    fn run_pipeline(
        frame: &image::RgbImage,
        strategy: Strategy,
        num_questions: usize,
        num_options: usize,
    ) -> Option<Vec<DetectedAnswer>> {
        let options = ScanOptions::default();
        let detector = detector_for(strategy);
        let pre = preprocess(frame, &options).expect("valid frame");
        let region = detector.locate(&pre, &options)?;
        let prepared = detector
            .prepare(frame, &pre, &region)
            .expect("rectification succeeds");
        match extract_bubbles(
            &prepared.binary,
            num_questions,
            num_options,
            &detector.bubble_filter(&options),
            options.row_tolerance,
            options.candidate_tolerance,
        ) {
            Extraction::Grouped(groups) => Some(infer_answers(
                &groups,
                &prepared.binary,
                &prepared.gray,
                &detector.fill_floor(&options),
            )),
            Extraction::Insufficient { found, expected } => {
                panic!("insufficient candidates: {}/{}", found, expected)
            }
        }
    }

    fn letters(answers: &[DetectedAnswer]) -> String {
        answers.iter().map(DetectedAnswer::letter).collect()
    }

    #[test]
    fn geometric_pipeline_reads_marked_pattern() {
        let frame = sheet_frame(&[Some(0), Some(1), Some(2), Some(3), Some(0)], 5);
        let answers =
            run_pipeline(&frame, Strategy::Geometric, 5, 5).expect("sheet located");
        assert_eq!(letters(&answers), "ABCDA");
    }

    #[test]
    fn geometric_detector_waits_when_no_sheet_is_in_view() {
        let frame = blank_dark_frame();
        let options = ScanOptions::default();
        let pre = preprocess(&frame, &options).expect("valid frame");
        assert!(GeometricDetector.locate(&pre, &options).is_none());
    }

    #[test]
    fn density_grid_pipeline_reads_marked_pattern() {
        let frame = grid_frame(&[Some(1), Some(0), Some(4), Some(2), Some(3)], 5);
        let answers =
            run_pipeline(&frame, Strategy::DensityGrid, 5, 5).expect("full frame region");
        assert_eq!(letters(&answers), "BAECD");
    }

    #[test]
    fn unmarked_row_comes_out_as_sentinel() {
        let frame = grid_frame(&[Some(1), None, Some(4), Some(2), Some(3)], 5);
        let answers =
            run_pipeline(&frame, Strategy::DensityGrid, 5, 5).expect("full frame region");
        assert_eq!(letters(&answers), "BXECD");
    }
}
