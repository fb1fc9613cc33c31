use tracing::info;
use uuid::Uuid;

use crate::completion::{aggregate, AggregateOptions};
use crate::error::Result;
use crate::loader::load_roster;
use crate::models::{CompletenessReport, SchoolYearRef, Term};
use crate::paginate::{paginate_missing_students, PageRequest, DEFAULT_PAGE_SIZE};
use crate::store::GradeStore;

#[derive(Debug, Clone)]
pub struct CompletenessQuery {
    pub school_year_id: Option<Uuid>,
    pub term: Option<Term>,
    pub include_details: bool,
    pub include_students: bool,
    pub students_page: u32,
    pub students_page_size: u32,
}

impl Default for CompletenessQuery {
    fn default() -> Self {
        Self {
            school_year_id: None,
            term: None,
            include_details: false,
            include_students: false,
            students_page: 1,
            students_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Computes expected, completed and missing grades for one school year and term.
///
/// Every call reads a fresh snapshot from `store`; nothing is cached between calls.
/// Student and detail lists stay empty unless requested, which means "not computed"
/// rather than "nothing missing".
pub async fn grade_completeness<S: GradeStore + ?Sized>(
    store: &S,
    query: &CompletenessQuery,
) -> Result<CompletenessReport> {
    let page = PageRequest::clamped(query.students_page, query.students_page_size);
    let snapshot = load_roster(store, query.school_year_id, query.term).await?;

    let rollups = aggregate(
        &snapshot,
        AggregateOptions {
            include_students: query.include_students,
            include_details: query.include_details,
        },
    )
    .finalize();

    info!(
        school_year = %snapshot.school_year.name,
        term = %snapshot.term,
        expected = rollups.summary.expected,
        completed = rollups.summary.completed,
        "grade completeness computed"
    );

    Ok(CompletenessReport {
        school_year: SchoolYearRef {
            id: snapshot.school_year.id,
            name: snapshot.school_year.name,
        },
        term: snapshot.term,
        summary: rollups.summary,
        by_class: rollups.by_class,
        by_subject: rollups.by_subject,
        by_teacher: rollups.by_teacher,
        by_class_subject: rollups.by_class_subject,
        missing_by_student: paginate_missing_students(rollups.missing_students, page),
        missing_details: rollups.missing_details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletenessError;
    use crate::models::SchoolYear;
    use crate::store::memory::{assignment, grade, roster, MemoryStore};

    fn school() -> (MemoryStore, Uuid) {
        let year = SchoolYear {
            id: Uuid::new_v4(),
            name: "2025/2026".to_string(),
            term: Term::Final,
        };
        let year_id = year.id;
        (MemoryStore::with_year(year), year_id)
    }

    #[tokio::test]
    async fn class_with_one_graded_student() {
        let (mut store, year_id) = school();
        let class = roster("3A", &["Ana", "Ben"]);
        let math = assignment(&class, "Math", "T1");
        store
            .grades
            .push(grade(class.students[0].id, math.subject_id, year_id, Term::Final));
        store.add_class(year_id, class);
        store.add_assignment(year_id, math);

        let query = CompletenessQuery {
            include_students: true,
            ..CompletenessQuery::default()
        };
        let report = grade_completeness(&store, &query).await.unwrap();

        assert_eq!(report.school_year.name, "2025/2026");
        assert_eq!(report.term, Term::Final);
        assert_eq!(report.summary.expected, 2);
        assert_eq!(report.summary.completed, 1);
        assert_eq!(report.summary.missing, 1);
        assert_eq!(report.summary.completion_pct, 50.0);
        assert_eq!(report.missing_by_student.total, 1);
        let ben = &report.missing_by_student.items[0];
        assert_eq!(ben.student_name, "Ben");
        assert_eq!(ben.missing_count, 1);
        assert_eq!(ben.subjects, vec!["Math".to_string()]);
        assert!(report.missing_details.is_empty());
    }

    #[tokio::test]
    async fn year_without_classes_is_complete_and_empty() {
        let (store, _) = school();
        let report = grade_completeness(&store, &CompletenessQuery::default())
            .await
            .unwrap();
        assert_eq!(report.summary.expected, 0);
        assert_eq!(report.summary.completion_pct, 100.0);
        assert!(report.by_class.is_empty());
        assert!(report.by_subject.is_empty());
        assert!(report.by_teacher.is_empty());
        assert!(report.by_class_subject.is_empty());
        assert_eq!(report.missing_by_student.total, 0);
    }

    #[tokio::test]
    async fn unknown_year_propagates_not_found() {
        let (store, _) = school();
        let query = CompletenessQuery {
            school_year_id: Some(Uuid::new_v4()),
            ..CompletenessQuery::default()
        };
        let err = grade_completeness(&store, &query).await.unwrap_err();
        assert!(matches!(err, CompletenessError::NotFound(_)));
    }

    #[tokio::test]
    async fn term_override_selects_other_grades() {
        let (mut store, year_id) = school();
        let class = roster("3A", &["Ana"]);
        let math = assignment(&class, "Math", "T1");
        store
            .grades
            .push(grade(class.students[0].id, math.subject_id, year_id, Term::Midyear));
        store.add_class(year_id, class);
        store.add_assignment(year_id, math);

        let default_term = grade_completeness(&store, &CompletenessQuery::default())
            .await
            .unwrap();
        assert_eq!(default_term.summary.completed, 0);

        let midyear = CompletenessQuery {
            term: Some(Term::Midyear),
            ..CompletenessQuery::default()
        };
        let report = grade_completeness(&store, &midyear).await.unwrap();
        assert_eq!(report.term, Term::Midyear);
        assert_eq!(report.summary.completion_pct, 100.0);
    }

    #[tokio::test]
    async fn student_pages_are_clamped_and_totalled() {
        let (mut store, year_id) = school();
        let names: Vec<String> = (0..25).map(|i| format!("Student {i:02}")).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let class = roster("5C", &name_refs);
        store.add_assignment(year_id, assignment(&class, "Math", "T1"));
        store.add_class(year_id, class);

        let query = CompletenessQuery {
            include_students: true,
            students_page: 0,
            students_page_size: 1,
            ..CompletenessQuery::default()
        };
        let first = grade_completeness(&store, &query).await.unwrap();
        assert_eq!(first.missing_by_student.page, 1);
        assert_eq!(first.missing_by_student.page_size, 10);
        assert_eq!(first.missing_by_student.total, 25);
        assert_eq!(first.missing_by_student.items.len(), 10);
        assert_eq!(first.missing_by_student.items[0].student_name, "Student 00");

        let third = CompletenessQuery {
            students_page: 3,
            ..query
        };
        let report = grade_completeness(&store, &third).await.unwrap();
        assert_eq!(report.missing_by_student.items.len(), 5);
        assert_eq!(report.missing_by_student.total, 25);
    }

    #[tokio::test]
    async fn details_list_every_missing_pair() {
        let (mut store, year_id) = school();
        let class = roster("3A", &["Ana", "Ben"]);
        let math = assignment(&class, "Math", "T1");
        let art = assignment(&class, "Art", "T2");
        store
            .grades
            .push(grade(class.students[1].id, art.subject_id, year_id, Term::Final));
        store.add_class(year_id, class);
        store.add_assignment(year_id, math);
        store.add_assignment(year_id, art);

        let query = CompletenessQuery {
            include_details: true,
            ..CompletenessQuery::default()
        };
        let report = grade_completeness(&store, &query).await.unwrap();
        assert!(report.missing_by_student.items.is_empty());
        let pairs: Vec<(&str, &str, &str)> = report
            .missing_details
            .iter()
            .map(|d| (d.student_name.as_str(), d.subject_name.as_str(), d.teacher_name.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("Ana", "Math", "T1"), ("Ben", "Math", "T1"), ("Ana", "Art", "T2")]
        );
        assert_eq!(report.by_class_subject[0].subject_name, "Math");
        assert_eq!(report.by_class_subject[1].row.completion_pct, 50.0);
    }
}
