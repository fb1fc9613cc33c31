use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{CompletenessReport, CompletionRow};

fn row_cells(row: &CompletionRow) -> String {
    format!(
        "{} | {} | {} | {:.1}%",
        row.expected, row.completed, row.missing, row.completion_pct
    )
}

fn write_rollup<'a, I>(output: &mut String, heading: &str, label: &str, rows: I)
where
    I: IntoIterator<Item = (String, &'a CompletionRow)>,
{
    let mut rows = rows.into_iter().peekable();
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");
    if rows.peek().is_none() {
        let _ = writeln!(output, "No assignments for this term.");
        return;
    }
    let _ = writeln!(output, "| {label} | Expected | Completed | Missing | Complete |");
    let _ = writeln!(output, "|---|---:|---:|---:|---:|");
    for (name, row) in rows {
        let _ = writeln!(output, "| {name} | {} |", row_cells(row));
    }
}

/// Which optional drill-downs were computed for the report.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sections {
    pub students: bool,
    pub details: bool,
}

pub fn build_report(
    report: &CompletenessReport,
    sections: Sections,
    generated_at: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grade Completeness Report");
    let _ = writeln!(
        output,
        "{} ({}), generated {}",
        report.school_year.name,
        report.term,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let summary = &report.summary;
    let _ = writeln!(
        output,
        "{} of {} expected grades recorded, {} missing ({:.1}% complete).",
        summary.completed, summary.expected, summary.missing, summary.completion_pct
    );

    write_rollup(
        &mut output,
        "By Class",
        "Class",
        report.by_class.iter().map(|r| (r.class_name.clone(), &r.row)),
    );
    write_rollup(
        &mut output,
        "By Subject",
        "Subject",
        report
            .by_subject
            .iter()
            .map(|r| (r.subject_name.clone(), &r.row)),
    );
    write_rollup(
        &mut output,
        "By Teacher",
        "Teacher",
        report
            .by_teacher
            .iter()
            .map(|r| (r.teacher_name.clone(), &r.row)),
    );
    write_rollup(
        &mut output,
        "By Class and Subject",
        "Class / Subject / Teacher",
        report.by_class_subject.iter().map(|r| {
            (
                format!("{} / {} / {}", r.class_name, r.subject_name, r.teacher_name),
                &r.row,
            )
        }),
    );

    let students = &report.missing_by_student;
    if sections.students {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "## Students With Missing Grades (page {}, {} per page, {} total)",
            students.page, students.page_size, students.total
        );
        if students.total == 0 {
            let _ = writeln!(output, "No students with missing grades.");
        } else if students.items.is_empty() {
            let _ = writeln!(output, "No students on this page.");
        }
        for entry in &students.items {
            let _ = writeln!(
                output,
                "- {} ({}): {} missing, {}",
                entry.student_name,
                entry.class_name,
                entry.missing_count,
                entry.subjects.join(", ")
            );
        }
    }

    if sections.details {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Missing Grade Details");
        if report.missing_details.is_empty() {
            let _ = writeln!(output, "No missing grades.");
        }
        for detail in &report.missing_details {
            let _ = writeln!(
                output,
                "- {} ({}): {} with {}",
                detail.student_name, detail.class_name, detail.subject_name, detail.teacher_name
            );
        }
    }

    output
}

pub fn build_json(report: &CompletenessReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClassCompletion, MissingStudentEntry, MissingStudentPage, SchoolYearRef, Term,
    };
    use chrono::TimeZone;
    use uuid::Uuid;

    fn sample() -> CompletenessReport {
        let row = CompletionRow::from_counts(3, 1);
        CompletenessReport {
            school_year: SchoolYearRef {
                id: Uuid::nil(),
                name: "2025/2026".to_string(),
            },
            term: Term::Final,
            summary: row,
            by_class: vec![ClassCompletion {
                class_id: Uuid::nil(),
                class_name: "3A".to_string(),
                row,
            }],
            by_subject: Vec::new(),
            by_teacher: Vec::new(),
            by_class_subject: Vec::new(),
            missing_by_student: MissingStudentPage {
                total: 1,
                page: 1,
                page_size: 50,
                items: vec![MissingStudentEntry {
                    student_id: Uuid::nil(),
                    student_name: "Ben Ortiz".to_string(),
                    class_id: Uuid::nil(),
                    class_name: "3A".to_string(),
                    missing_count: 2,
                    subjects: vec!["Art".to_string(), "Math".to_string()],
                }],
            },
            missing_details: Vec::new(),
        }
    }

    #[test]
    fn markdown_lists_rollups_and_students() {
        let generated = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();
        let sections = Sections {
            students: true,
            details: false,
        };
        let markdown = build_report(&sample(), sections, generated);
        assert!(markdown.contains("2025/2026 (FINAL), generated 2026-03-02 09:30 UTC"));
        assert!(markdown.contains("1 of 3 expected grades recorded, 2 missing (33.3% complete)."));
        assert!(markdown.contains("| 3A | 3 | 1 | 2 | 33.3% |"));
        assert!(markdown.contains("## By Subject\nNo assignments for this term."));
        assert!(markdown.contains("- Ben Ortiz (3A): 2 missing, Art, Math"));
        assert!(!markdown.contains("## Missing Grade Details"));
    }

    #[test]
    fn requested_sections_render_even_when_nothing_is_missing() {
        let mut report = sample();
        report.missing_by_student.total = 0;
        report.missing_by_student.items.clear();
        let generated = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();

        let requested = build_report(
            &report,
            Sections {
                students: true,
                details: true,
            },
            generated,
        );
        assert!(requested.contains("total)\nNo students with missing grades."));
        assert!(requested.contains("## Missing Grade Details\nNo missing grades."));

        let skipped = build_report(&report, Sections::default(), generated);
        assert!(!skipped.contains("## Students With Missing Grades"));
        assert!(!skipped.contains("## Missing Grade Details"));
    }

    #[test]
    fn json_uses_camel_case_payload() {
        let value: serde_json::Value =
            serde_json::from_str(&build_json(&sample()).unwrap()).unwrap();
        assert_eq!(value["schoolYear"]["name"], "2025/2026");
        assert_eq!(value["term"], "FINAL");
        assert_eq!(value["summary"]["completionPct"], 33.3);
        assert_eq!(value["missingByStudent"]["pageSize"], 50);
        assert_eq!(value["missingByStudent"]["items"][0]["missingCount"], 2);
        assert_eq!(value["byClass"][0]["className"], "3A");
    }
}
