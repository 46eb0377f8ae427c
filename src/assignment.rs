use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Option labels run A through E.
pub const MAX_OPTIONS: usize = 5;

const OPTION_LETTERS: [char; MAX_OPTIONS] = ['A', 'B', 'C', 'D', 'E'];

/// Zero-based index of an answer option within a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OptionIndex(usize);

impl OptionIndex {
    pub fn new(index: usize) -> Option<Self> {
        if index < MAX_OPTIONS {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        OPTION_LETTERS
            .iter()
            .position(|&l| l == letter.to_ascii_uppercase())
            .map(Self)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }

    pub fn letter(&self) -> char {
        OPTION_LETTERS[self.0]
    }
}

impl Display for OptionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl Serialize for OptionIndex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.letter().to_string())
    }
}

impl<'de> Deserialize<'de> for OptionIndex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Self::from_letter(letter).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid option letter: {}", s))
            }),
            _ => Err(serde::de::Error::custom(format!(
                "invalid option letter: {}",
                s
            ))),
        }
    }
}

/// Correct option per zero-based question index. Fixed once the assignment is
/// created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(Vec<OptionIndex>);

impl AnswerKey {
    pub fn new(options: Vec<OptionIndex>) -> Self {
        Self(options)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, question: usize) -> Option<OptionIndex> {
        self.0.get(question).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = OptionIndex> + '_ {
        self.0.iter().copied()
    }
}

/// Which bubble detection heuristic to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Locate the sheet outline, rectify its perspective, then read bubbles
    /// from contour geometry on the rectified image.
    Geometric,
    /// Skip sheet location and read bubble density straight off the frame.
    DensityGrid,
}

/// Tunable detection parameters. Every field has a sensible default so an
/// assignment file only needs to override what its sheets require.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanOptions {
    pub strategy: Strategy,
    /// Seconds to wait between full processing attempts so one physical sheet
    /// is not graded repeatedly while it stays in view.
    pub cooldown_secs: f32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Accepted sheet size relative to the frame, exclusive on both ends.
    pub min_sheet_area_ratio: f32,
    pub max_sheet_area_ratio: f32,
    /// Fraction of the expected bubble count that must be present before
    /// grouping is attempted.
    pub candidate_tolerance: f32,
    /// Minimum bubble side length on a rectified sheet.
    pub min_bubble_side: u32,
    /// Contour area band for the density grid heuristic.
    pub min_bubble_area: f64,
    pub max_bubble_area: f64,
    /// Aspect ratio band on a rectified sheet.
    pub rectified_aspect_band: [f32; 2],
    /// Coarser aspect ratio band for unrectified frames.
    pub coarse_aspect_band: [f32; 2],
    /// Vertical distance within which candidates count as one question row.
    pub row_tolerance: i32,
    /// Fewest foreground pixels the winning bubble must contain.
    pub min_fill_pixels: u32,
    /// Brightest mean intensity that still counts as a marked bubble.
    pub max_marked_intensity: f32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Geometric,
            cooldown_secs: 2.0,
            blur_sigma: 1.1,
            canny_low: 75.0,
            canny_high: 200.0,
            min_sheet_area_ratio: 0.1,
            max_sheet_area_ratio: 0.9,
            candidate_tolerance: 0.8,
            min_bubble_side: 20,
            min_bubble_area: 100.0,
            max_bubble_area: 5000.0,
            rectified_aspect_band: [0.9, 1.1],
            coarse_aspect_band: [0.8, 1.2],
            row_tolerance: 30,
            min_fill_pixels: 200,
            max_marked_intensity: 100.0,
        }
    }
}

/// A graded assignment: the answer key plus the sheet layout it expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub name: String,
    pub num_questions: usize,
    #[serde(default = "default_num_options")]
    pub num_options: usize,
    pub answer_key: AnswerKey,
    #[serde(default)]
    pub options: ScanOptions,
}

fn default_num_options() -> usize {
    MAX_OPTIONS
}

#[derive(Debug)]
pub enum AssignmentError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, serde_json::Error),
    InvalidOptionCount(usize),
    KeyLengthMismatch { key: usize, questions: usize },
    KeyOptionOutOfRange { question: usize },
}

impl Assignment {
    pub fn load(path: &Path) -> Result<Self, AssignmentError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AssignmentError::Io(path.to_path_buf(), e))?;
        let assignment: Self = serde_json::from_str(&json)
            .map_err(|e| AssignmentError::Parse(path.to_path_buf(), e))?;
        assignment.validate()?;
        Ok(assignment)
    }

    pub fn validate(&self) -> Result<(), AssignmentError> {
        if self.num_options == 0 || self.num_options > MAX_OPTIONS {
            return Err(AssignmentError::InvalidOptionCount(self.num_options));
        }
        if self.answer_key.len() != self.num_questions {
            return Err(AssignmentError::KeyLengthMismatch {
                key: self.answer_key.len(),
                questions: self.num_questions,
            });
        }
        for (question, option) in self.answer_key.iter().enumerate() {
            if option.as_usize() >= self.num_options {
                return Err(AssignmentError::KeyOptionOutOfRange { question });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn key_from_letters(letters: &str) -> AnswerKey {
    AnswerKey::new(
        letters
            .chars()
            .map(|c| OptionIndex::from_letter(c).expect("valid letter"))
            .collect(),
    )
}
