use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use uuid::Uuid;

use crate::error::CompletenessError;

/// Grading period within a school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Term {
    Midyear,
    Final,
}

impl Term {
    pub fn as_str(&self) -> &'static str {
        match self {
            Term::Midyear => "MIDYEAR",
            Term::Final => "FINAL",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Term {
    type Err = CompletenessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MIDYEAR" => Ok(Term::Midyear),
            "FINAL" => Ok(Term::Final),
            other => Err(CompletenessError::InvalidParameter(format!(
                "unknown term {other:?}, expected MIDYEAR or FINAL"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchoolYear {
    pub id: Uuid,
    pub name: String,
    pub term: Term,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRef {
    pub id: Uuid,
    pub full_name: String,
}

/// An active class together with its active students at fetch time.
#[derive(Debug, Clone)]
pub struct ClassRoster {
    pub id: Uuid,
    pub name: String,
    pub students: Vec<StudentRef>,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: Uuid,
    pub class_id: Uuid,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub teacher_id: Uuid,
    pub teacher_name: String,
}

#[derive(Debug, Clone)]
pub struct GradeRecord {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub school_year_id: Uuid,
    pub term: Term,
    pub grade_scale_id: Option<Uuid>,
}

impl GradeRecord {
    pub fn is_completed(&self) -> bool {
        self.grade_scale_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRow {
    pub expected: u64,
    pub completed: u64,
    pub missing: u64,
    pub completion_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCompletion {
    pub class_id: Uuid,
    pub class_name: String,
    #[serde(flatten)]
    pub row: CompletionRow,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCompletion {
    pub subject_id: Uuid,
    pub subject_name: String,
    #[serde(flatten)]
    pub row: CompletionRow,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherCompletion {
    pub teacher_id: Uuid,
    pub teacher_name: String,
    #[serde(flatten)]
    pub row: CompletionRow,
}

/// One row per assignment; two teachers sharing a class and subject yield two rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSubjectCompletion {
    pub assignment_id: Uuid,
    pub class_id: Uuid,
    pub class_name: String,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub teacher_id: Uuid,
    pub teacher_name: String,
    #[serde(flatten)]
    pub row: CompletionRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingStudentEntry {
    pub student_id: Uuid,
    pub student_name: String,
    pub class_id: Uuid,
    pub class_name: String,
    pub missing_count: u64,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingDetailEntry {
    pub student_id: Uuid,
    pub student_name: String,
    pub class_id: Uuid,
    pub class_name: String,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub teacher_id: Uuid,
    pub teacher_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolYearRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingStudentPage {
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub items: Vec<MissingStudentEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessReport {
    pub school_year: SchoolYearRef,
    pub term: Term,
    pub summary: CompletionRow,
    pub by_class: Vec<ClassCompletion>,
    pub by_subject: Vec<SubjectCompletion>,
    pub by_teacher: Vec<TeacherCompletion>,
    pub by_class_subject: Vec<ClassSubjectCompletion>,
    pub missing_by_student: MissingStudentPage,
    pub missing_details: Vec<MissingDetailEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_parses_stored_spellings() {
        assert_eq!("MIDYEAR".parse::<Term>().unwrap(), Term::Midyear);
        assert_eq!("final".parse::<Term>().unwrap(), Term::Final);
        assert!(matches!(
            "SPRING".parse::<Term>(),
            Err(CompletenessError::InvalidParameter(_))
        ));
    }

    #[test]
    fn term_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Term::Midyear).unwrap(), "\"MIDYEAR\"");
        assert_eq!(Term::Final.to_string(), "FINAL");
    }

    #[test]
    fn completion_row_flattens_into_rollup_json() {
        let row = ClassCompletion {
            class_id: Uuid::nil(),
            class_name: "3A".to_string(),
            row: CompletionRow {
                expected: 2,
                completed: 1,
                missing: 1,
                completion_pct: 50.0,
            },
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["className"], "3A");
        assert_eq!(value["completionPct"], 50.0);
        assert_eq!(value["missing"], 1);
    }
}
