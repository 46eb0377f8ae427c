use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::assignment::AnswerKey;
use crate::grade::QuestionResult;
use crate::types::{AssignmentId, SessionId, StudentId};

#[derive(Debug)]
pub enum StoreError {
    Io(PathBuf, std::io::Error),
    Serde(serde_json::Error),
    UnknownAssignment(AssignmentId),
}

/// A graded sheet about to be persisted.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub assignment_id: AssignmentId,
    pub student_name: String,
    pub student_id: StudentId,
    pub score: f32,
    pub correct_count: usize,
    pub total_questions: usize,
    pub image_path: Option<String>,
    pub details: Vec<QuestionResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Statistics {
    pub total_sessions: usize,
    pub average_score: f32,
    pub max_score: f32,
    pub min_score: f32,
    pub a_grades: usize,
    pub b_grades: usize,
    pub c_grades: usize,
    pub d_grades: usize,
    pub f_grades: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StudentResult {
    pub assignment_name: String,
    pub score: f32,
    pub correct_count: usize,
    pub total_questions: usize,
}

/// Storage collaborator for assignments and grading sessions. The scan loop
/// calls `save_grading_result` exactly once per successfully graded sheet and
/// does not care what sits behind the trait.
pub trait ResultStore {
    fn save_assignment(
        &mut self,
        name: &str,
        num_questions: usize,
        answer_key: &AnswerKey,
    ) -> Result<AssignmentId, StoreError>;

    fn save_grading_result(&mut self, session: NewSession) -> Result<SessionId, StoreError>;

    fn statistics(&self, assignment: AssignmentId) -> Result<Option<Statistics>, StoreError>;

    fn student_results(&self, student: &StudentId) -> Result<Vec<StudentResult>, StoreError>;

    /// Writes all sessions of an assignment to a CSV file and returns the row
    /// count.
    fn export_csv(&self, assignment: AssignmentId, out: &Path) -> Result<usize, StoreError>;
}

pub fn grade_bucket(score: f32) -> char {
    if score >= 90.0 {
        'A'
    } else if score >= 80.0 {
        'B'
    } else if score >= 70.0 {
        'C'
    } else if score >= 60.0 {
        'D'
    } else {
        'F'
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentRecord {
    id: AssignmentId,
    name: String,
    num_questions: usize,
    answer_key: AnswerKey,
    created_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    id: SessionId,
    assignment_id: AssignmentId,
    student_name: String,
    student_id: StudentId,
    score: f32,
    correct_count: usize,
    total_questions: usize,
    image_path: Option<String>,
    details: Vec<QuestionResult>,
    created_at: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreData {
    assignments: Vec<AssignmentRecord>,
    sessions: Vec<SessionRecord>,
}

/// Keeps everything in one JSON document, rewritten on each mutation. Plenty
/// for a single scanning station.
pub struct JsonFileStore {
    path: PathBuf,
    data: StoreData,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let json =
                fs::read_to_string(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
            serde_json::from_str(&json).map_err(StoreError::Serde)?
        } else {
            StoreData::default()
        };
        debug!(
            "store at {} holds {} assignments, {} sessions",
            path.display(),
            data.assignments.len(),
            data.sessions.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io(self.path.clone(), e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.data).map_err(StoreError::Serde)?;
        fs::write(&self.path, json).map_err(|e| StoreError::Io(self.path.clone(), e))
    }

    fn next_assignment_id(&self) -> AssignmentId {
        self.data.assignments.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }

    fn next_session_id(&self) -> SessionId {
        self.data.sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl ResultStore for JsonFileStore {
    fn save_assignment(
        &mut self,
        name: &str,
        num_questions: usize,
        answer_key: &AnswerKey,
    ) -> Result<AssignmentId, StoreError> {
        let id = self.next_assignment_id();
        self.data.assignments.push(AssignmentRecord {
            id,
            name: name.to_string(),
            num_questions,
            answer_key: answer_key.clone(),
            created_at: unix_now(),
        });
        self.persist()?;
        info!("assignment '{}' saved with id {}", name, id);
        Ok(id)
    }

    fn save_grading_result(&mut self, session: NewSession) -> Result<SessionId, StoreError> {
        if !self
            .data
            .assignments
            .iter()
            .any(|a| a.id == session.assignment_id)
        {
            return Err(StoreError::UnknownAssignment(session.assignment_id));
        }

        let id = self.next_session_id();
        self.data.sessions.push(SessionRecord {
            id,
            assignment_id: session.assignment_id,
            student_name: session.student_name,
            student_id: session.student_id,
            score: session.score,
            correct_count: session.correct_count,
            total_questions: session.total_questions,
            image_path: session.image_path,
            details: session.details,
            created_at: unix_now(),
        });
        self.persist()?;
        Ok(id)
    }

    fn statistics(&self, assignment: AssignmentId) -> Result<Option<Statistics>, StoreError> {
        let scores: Vec<f32> = self
            .data
            .sessions
            .iter()
            .filter(|s| s.assignment_id == assignment)
            .map(|s| s.score)
            .collect();
        if scores.is_empty() {
            return Ok(None);
        }

        let mut stats = Statistics {
            total_sessions: scores.len(),
            average_score: scores.iter().sum::<f32>() / scores.len() as f32,
            max_score: scores.iter().fold(f32::MIN, |a, &b| a.max(b)),
            min_score: scores.iter().fold(f32::MAX, |a, &b| a.min(b)),
            a_grades: 0,
            b_grades: 0,
            c_grades: 0,
            d_grades: 0,
            f_grades: 0,
        };
        for &score in &scores {
            match grade_bucket(score) {
                'A' => stats.a_grades += 1,
                'B' => stats.b_grades += 1,
                'C' => stats.c_grades += 1,
                'D' => stats.d_grades += 1,
                _ => stats.f_grades += 1,
            }
        }
        Ok(Some(stats))
    }

    fn student_results(&self, student: &StudentId) -> Result<Vec<StudentResult>, StoreError> {
        let results = self
            .data
            .sessions
            .iter()
            .filter(|s| &s.student_id == student)
            .map(|s| StudentResult {
                assignment_name: self
                    .data
                    .assignments
                    .iter()
                    .find(|a| a.id == s.assignment_id)
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| format!("assignment {}", s.assignment_id)),
                score: s.score,
                correct_count: s.correct_count,
                total_questions: s.total_questions,
            })
            .collect();
        Ok(results)
    }

    fn export_csv(&self, assignment: AssignmentId, out: &Path) -> Result<usize, StoreError> {
        let mut csv =
            String::from("sessionId,studentName,studentId,score,correctCount,totalQuestions,createdAt,imagePath\n");
        let mut rows = 0;
        for session in self
            .data
            .sessions
            .iter()
            .filter(|s| s.assignment_id == assignment)
        {
            csv.push_str(&format!(
                "{},{},{},{:.2},{},{},{},{}\n",
                session.id,
                csv_field(&session.student_name),
                csv_field(&session.student_id.to_string()),
                session.score,
                session.correct_count,
                session.total_questions,
                session.created_at,
                csv_field(session.image_path.as_deref().unwrap_or("")),
            ));
            rows += 1;
        }
        fs::write(out, csv).map_err(|e| StoreError::Io(out.to_path_buf(), e))?;
        info!("{} sessions exported to {}", rows, out.display());
        Ok(rows)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::key_from_letters;

    fn session(assignment_id: AssignmentId, n: u32, score: f32) -> NewSession {
        NewSession {
            assignment_id,
            student_name: format!("Student_{:03}", n),
            student_id: StudentId::from(format!("STU-1-{:03}", n)),
            score,
            correct_count: (score / 20.0) as usize,
            total_questions: 5,
            image_path: None,
            details: vec![],
        }
    }

    #[test]
    fn round_trips_records_through_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        let assignment_id = {
            let mut store = JsonFileStore::open(&path).expect("open");
            let id = store
                .save_assignment("Quiz 3", 5, &key_from_letters("ABCDA"))
                .expect("save assignment");
            store
                .save_grading_result(session(id, 1, 80.0))
                .expect("save session");
            id
        };

        // A fresh handle reads what the first one wrote.
        let store = JsonFileStore::open(&path).expect("reopen");
        let stats = store
            .statistics(assignment_id)
            .expect("query")
            .expect("has sessions");
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.average_score, 80.0);

        let results = store
            .student_results(&StudentId::from("STU-1-001".to_string()))
            .expect("query");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].assignment_name, "Quiz 3");
    }

    #[test]
    fn rejects_session_for_unknown_assignment() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonFileStore::open(&dir.path().join("store.json")).expect("open");
        assert!(matches!(
            store.save_grading_result(session(42, 1, 50.0)),
            Err(StoreError::UnknownAssignment(42))
        ));
    }

    #[test]
    fn statistics_bucket_boundaries() {
        assert_eq!(grade_bucket(100.0), 'A');
        assert_eq!(grade_bucket(90.0), 'A');
        assert_eq!(grade_bucket(89.9), 'B');
        assert_eq!(grade_bucket(80.0), 'B');
        assert_eq!(grade_bucket(70.0), 'C');
        assert_eq!(grade_bucket(60.0), 'D');
        assert_eq!(grade_bucket(59.9), 'F');
        assert_eq!(grade_bucket(0.0), 'F');
    }

    #[test]
    fn statistics_aggregate_scores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonFileStore::open(&dir.path().join("store.json")).expect("open");
        let id = store
            .save_assignment("Quiz", 5, &key_from_letters("ABCDA"))
            .expect("save");
        for (n, score) in [(1, 95.0), (2, 85.0), (3, 40.0)] {
            store.save_grading_result(session(id, n, score)).expect("save");
        }

        let stats = store.statistics(id).expect("query").expect("some");
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.max_score, 95.0);
        assert_eq!(stats.min_score, 40.0);
        assert!((stats.average_score - 73.333_336).abs() < 0.001);
        assert_eq!((stats.a_grades, stats.b_grades, stats.f_grades), (1, 1, 1));
        assert_eq!((stats.c_grades, stats.d_grades), (0, 0));
    }

    #[test]
    fn empty_assignment_has_no_statistics() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonFileStore::open(&dir.path().join("store.json")).expect("open");
        let id = store
            .save_assignment("Quiz", 5, &key_from_letters("ABCDA"))
            .expect("save");
        assert!(store.statistics(id).expect("query").is_none());
    }

    #[test]
    fn exports_csv_with_quoted_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = JsonFileStore::open(&dir.path().join("store.json")).expect("open");
        let id = store
            .save_assignment("Quiz", 5, &key_from_letters("ABCDA"))
            .expect("save");
        let mut record = session(id, 1, 60.0);
        record.student_name = "Doe, Jo".to_string();
        store.save_grading_result(record).expect("save");

        let out = dir.path().join("export.csv");
        let rows = store.export_csv(id, &out).expect("export");
        assert_eq!(rows, 1);

        let csv = fs::read_to_string(&out).expect("read");
        let mut lines = csv.lines();
        assert!(lines.next().expect("header").starts_with("sessionId,"));
        let row = lines.next().expect("row");
        assert!(row.contains("\"Doe, Jo\""));
        assert!(row.contains("60.00"));
    }
}
