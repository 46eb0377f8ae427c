use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use image::RgbImage;
use log::{debug, info, warn};

use crate::annotate::Annotator;
use crate::archive::ImageArchiver;
use crate::assignment::Assignment;
use crate::bubbles::{extract_bubbles, Extraction, QuestionGroup};
use crate::capture::{CaptureError, FrameSource};
use crate::debug::ImageDebugWriter;
use crate::detect::{detector_for, AnswerDetector, PreparedSheet, SheetRegion};
use crate::grade::{grade, GradingResult};
use crate::infer::{infer_answers, DetectedAnswer};
use crate::preprocess::{preprocess, InvalidFrame};
use crate::store::{NewSession, ResultStore, StoreError};
use crate::types::{AssignmentId, StudentId};

/// Progress of the sheet currently in front of the camera. One frame event
/// walks the machine from `AwaitingSheet` as far as the frame allows.
enum ScanPhase {
    AwaitingSheet,
    Located { region: SheetRegion },
    Rectified { prepared: PreparedSheet },
    Graded {
        paper: RgbImage,
        groups: Vec<Option<QuestionGroup>>,
        result: GradingResult,
    },
    Archived {
        result: GradingResult,
        image_path: Option<String>,
    },
}

/// What one frame amounted to.
pub enum FrameOutcome {
    /// No sheet in view; keep watching.
    NoSheet,
    /// A sheet-like region was found but too few bubbles with it.
    Insufficient { found: usize, expected: usize },
    /// The located quadrilateral could not be rectified.
    GeometryRejected,
    Graded {
        result: GradingResult,
        image_path: Option<String>,
    },
}

#[derive(Debug)]
pub enum SessionError {
    Capture(CaptureError),
    InvalidFrame(InvalidFrame),
    Store(StoreError),
}

/// Mutable scan-loop state, owned by the loop and threaded through each
/// iteration rather than kept in globals.
pub struct SessionState {
    last_graded: Option<Instant>,
    student_counter: u32,
    processed: u32,
}

impl SessionState {
    fn new() -> Self {
        Self {
            last_graded: None,
            student_counter: 1,
            processed: 0,
        }
    }

    fn in_cooldown(&self, cooldown: Duration) -> bool {
        self.last_graded
            .map_or(false, |graded_at| graded_at.elapsed() < cooldown)
    }

    /// Auto-generated identity for the next sheet in view.
    fn next_student(&mut self) -> (String, StudentId) {
        let counter = self.student_counter;
        self.student_counter += 1;
        (
            format!("Student_{:03}", counter),
            StudentId::from(format!("STU-{}-{:03}", unix_now(), counter)),
        )
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct SessionSummary {
    pub assignment_id: AssignmentId,
    pub processed: u32,
}

/// A scanning run for one assignment: pulls frames, advances the scan phase
/// machine per frame, and persists every successfully graded sheet.
pub struct ScanSession<'a> {
    assignment: &'a Assignment,
    detector: &'static dyn AnswerDetector,
    store: &'a mut dyn ResultStore,
    archiver: &'a dyn ImageArchiver,
    annotator: &'a Annotator,
    debug_dir: Option<PathBuf>,
}

impl<'a> ScanSession<'a> {
    pub fn new(
        assignment: &'a Assignment,
        store: &'a mut dyn ResultStore,
        archiver: &'a dyn ImageArchiver,
        annotator: &'a Annotator,
        debug_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            assignment,
            detector: detector_for(assignment.options.strategy),
            store,
            archiver,
            annotator,
            debug_dir,
        }
    }

    /// Runs until the source ends or `quit` is raised. The quit flag is read
    /// once per iteration, so an in-flight frame always finishes first.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        quit: &AtomicBool,
    ) -> Result<SessionSummary, SessionError> {
        let assignment_id = self
            .store
            .save_assignment(
                &self.assignment.name,
                self.assignment.num_questions,
                &self.assignment.answer_key,
            )
            .map_err(SessionError::Store)?;
        info!(
            "scanning for '{}' with the {} detector",
            self.assignment.name,
            self.detector.name()
        );

        let cooldown = Duration::from_secs_f32(self.assignment.options.cooldown_secs.max(0.0));
        let mut state = SessionState::new();
        let mut frame_index = 0u32;

        loop {
            if quit.load(Ordering::Relaxed) {
                info!("quit requested, ending scan session");
                break;
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return Err(SessionError::Capture(e)),
            };
            frame_index += 1;

            if state.in_cooldown(cooldown) {
                debug!("frame {} skipped during cooldown", frame_index);
                continue;
            }

            let debug_writer = match &self.debug_dir {
                Some(dir) => ImageDebugWriter::new(dir.join(format!("frame_{:04}.png", frame_index))),
                None => ImageDebugWriter::disabled(),
            };

            match self.process_frame(&frame, &debug_writer)? {
                FrameOutcome::NoSheet => {
                    debug!("frame {}: looking for a sheet", frame_index);
                }
                FrameOutcome::Insufficient { found, expected } => {
                    info!(
                        "frame {}: found {} of {} expected bubbles, waiting for a cleaner view",
                        frame_index, found, expected
                    );
                }
                FrameOutcome::GeometryRejected => {
                    warn!(
                        "frame {}: sheet outline could not be rectified, retrying on the next frame",
                        frame_index
                    );
                }
                FrameOutcome::Graded { result, image_path } => {
                    let (student_name, student_id) = state.next_student();
                    print_result(&student_name, &student_id, &result);

                    let saved = self.store.save_grading_result(NewSession {
                        assignment_id,
                        student_name,
                        student_id,
                        score: result.score,
                        correct_count: result.correct_count,
                        total_questions: result.total_questions,
                        image_path,
                        details: result.details,
                    });
                    match saved {
                        Ok(session_id) => info!("results saved with session id {}", session_id),
                        Err(e) => warn!("failed to save grading result: {:?}", e),
                    }

                    state.processed += 1;
                    state.last_graded = Some(Instant::now());
                }
            }
        }

        Ok(SessionSummary {
            assignment_id,
            processed: state.processed,
        })
    }

    /// Advances the phase machine as far as this frame allows.
    fn process_frame(
        &self,
        frame: &RgbImage,
        debug_writer: &ImageDebugWriter,
    ) -> Result<FrameOutcome, SessionError> {
        let pre = preprocess(frame, &self.assignment.options).map_err(SessionError::InvalidFrame)?;
        debug_writer.write_gray("blurred", &pre.blurred);
        debug_writer.write_gray("edges", &pre.edges);
        debug_writer.write_gray("binary", &pre.binary);

        let mut phase = ScanPhase::AwaitingSheet;
        loop {
            phase = match phase {
                ScanPhase::AwaitingSheet => {
                    match self.detector.locate(&pre, &self.assignment.options) {
                        Some(region) => ScanPhase::Located { region },
                        None => return Ok(FrameOutcome::NoSheet),
                    }
                }
                ScanPhase::Located { region } => {
                    match self.detector.prepare(frame, &pre, &region) {
                        Ok(prepared) => {
                            debug_writer.write_rgb("rectified", &prepared.paper);
                            ScanPhase::Rectified { prepared }
                        }
                        Err(_) => return Ok(FrameOutcome::GeometryRejected),
                    }
                }
                ScanPhase::Rectified { prepared } => {
                    let extraction = extract_bubbles(
                        &prepared.binary,
                        self.assignment.num_questions,
                        self.assignment.num_options,
                        &self.detector.bubble_filter(&self.assignment.options),
                        self.assignment.options.row_tolerance,
                        self.assignment.options.candidate_tolerance,
                    );
                    match extraction {
                        Extraction::Insufficient { found, expected } => {
                            return Ok(FrameOutcome::Insufficient { found, expected })
                        }
                        Extraction::Grouped(groups) => {
                            let answers = infer_answers(
                                &groups,
                                &prepared.binary,
                                &prepared.gray,
                                &self.detector.fill_floor(&self.assignment.options),
                            );
                            debug!(
                                "detected answers: {}",
                                answers.iter().map(DetectedAnswer::letter).collect::<String>()
                            );
                            let result = grade(&answers, &self.assignment.answer_key);
                            ScanPhase::Graded {
                                paper: prepared.paper,
                                groups,
                                result,
                            }
                        }
                    }
                }
                ScanPhase::Graded {
                    mut paper,
                    groups,
                    result,
                } => {
                    self.annotator
                        .annotate(&mut paper, &groups, &result.details, result.score);
                    debug_writer.write_rgb("annotated", &paper);

                    // Archival is best effort; a failed write never loses the
                    // grade itself.
                    let stem = format!("omr_result_{}", unix_now());
                    let image_path = match self.archiver.archive(&paper, &stem) {
                        Ok(path) => Some(path),
                        Err(e) => {
                            warn!("failed to archive result image: {:?}", e);
                            None
                        }
                    };
                    ScanPhase::Archived { result, image_path }
                }
                ScanPhase::Archived { result, image_path } => {
                    return Ok(FrameOutcome::Graded { result, image_path })
                }
            };
        }
    }
}

fn print_result(student_name: &str, student_id: &StudentId, result: &GradingResult) {
    println!("Student: {} ({})", student_name, student_id);
    println!(
        "Score: {:.2}%  ({}/{} correct)",
        result.score, result.correct_count, result.total_questions
    );
    for detail in &result.details {
        let student = detail
            .student_option
            .map(|option| option.to_string())
            .unwrap_or_else(|| "no answer".to_string());
        println!(
            "  Q{}: {} (correct: {}) {}",
            detail.question_number,
            student,
            detail.correct_option,
            if detail.is_correct { "right" } else { "wrong" }
        );
    }
}
