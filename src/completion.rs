use std::collections::HashMap;

use uuid::Uuid;

use crate::loader::RosterSnapshot;
use crate::models::{
    Assignment, ClassCompletion, ClassRoster, ClassSubjectCompletion, CompletionRow,
    MissingDetailEntry, MissingStudentEntry, SubjectCompletion, TeacherCompletion,
};

/// Percentage of expected grades that are completed, to one decimal place.
///
/// Nothing expected counts as fully complete.
pub fn completion_pct(expected: u64, completed: u64) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    ((completed as f64 / expected as f64) * 1000.0).round() / 10.0
}

impl CompletionRow {
    pub fn from_counts(expected: u64, completed: u64) -> Self {
        Self {
            expected,
            completed,
            missing: expected.saturating_sub(completed),
            completion_pct: completion_pct(expected, completed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    expected: u64,
    completed: u64,
}

impl Tally {
    fn add(&mut self, other: Tally) {
        self.expected += other.expected;
        self.completed += other.completed;
    }

    fn row(&self) -> CompletionRow {
        CompletionRow::from_counts(self.expected, self.completed)
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    name: String,
    tally: Tally,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    pub include_students: bool,
    pub include_details: bool,
}

/// Accumulators filled by a single pass over the assignments.
#[derive(Debug, Default)]
pub struct Aggregation {
    summary: Tally,
    by_class: HashMap<Uuid, Bucket>,
    by_subject: HashMap<Uuid, Bucket>,
    by_teacher: HashMap<Uuid, Bucket>,
    by_class_subject: Vec<ClassSubjectCompletion>,
    missing_students: HashMap<Uuid, MissingStudentEntry>,
    missing_details: Vec<MissingDetailEntry>,
}

/// Finalized output rows of an aggregation.
#[derive(Debug, Clone)]
pub struct Rollups {
    pub summary: CompletionRow,
    pub by_class: Vec<ClassCompletion>,
    pub by_subject: Vec<SubjectCompletion>,
    pub by_teacher: Vec<TeacherCompletion>,
    pub by_class_subject: Vec<ClassSubjectCompletion>,
    pub missing_students: Vec<MissingStudentEntry>,
    pub missing_details: Vec<MissingDetailEntry>,
}

fn touch(buckets: &mut HashMap<Uuid, Bucket>, id: Uuid, name: &str, tally: Tally) {
    buckets
        .entry(id)
        .or_insert_with(|| Bucket {
            name: name.to_string(),
            tally: Tally::default(),
        })
        .tally
        .add(tally);
}

pub fn aggregate(snapshot: &RosterSnapshot, options: AggregateOptions) -> Aggregation {
    let mut graded: HashMap<(Uuid, Uuid), u64> = HashMap::new();
    for grade in snapshot.grades.iter().filter(|grade| {
        grade.is_completed()
            && grade.school_year_id == snapshot.school_year.id
            && grade.term == snapshot.term
    }) {
        *graded.entry((grade.student_id, grade.subject_id)).or_default() += 1;
    }

    let mut aggregation = Aggregation::default();
    for assignment in &snapshot.assignments {
        let Some(class) = snapshot.classes.get(&assignment.class_id) else {
            continue;
        };
        aggregation.add_assignment(assignment, class, &graded, options);
    }
    aggregation
}

impl Aggregation {
    fn add_assignment(
        &mut self,
        assignment: &Assignment,
        class: &ClassRoster,
        graded: &HashMap<(Uuid, Uuid), u64>,
        options: AggregateOptions,
    ) {
        let expected = class.students.len() as u64;
        // Every matching record counts, so duplicate records can exceed the roster.
        let completed: u64 = class
            .students
            .iter()
            .filter_map(|student| graded.get(&(student.id, assignment.subject_id)))
            .sum();
        let tally = Tally {
            expected,
            completed,
        };

        touch(&mut self.by_class, class.id, &class.name, tally);
        touch(
            &mut self.by_subject,
            assignment.subject_id,
            &assignment.subject_name,
            tally,
        );
        touch(
            &mut self.by_teacher,
            assignment.teacher_id,
            &assignment.teacher_name,
            tally,
        );
        self.by_class_subject.push(ClassSubjectCompletion {
            assignment_id: assignment.id,
            class_id: class.id,
            class_name: class.name.clone(),
            subject_id: assignment.subject_id,
            subject_name: assignment.subject_name.clone(),
            teacher_id: assignment.teacher_id,
            teacher_name: assignment.teacher_name.clone(),
            row: tally.row(),
        });
        self.summary.add(tally);

        if !options.include_students && !options.include_details {
            return;
        }

        for student in &class.students {
            if graded.contains_key(&(student.id, assignment.subject_id)) {
                continue;
            }
            if options.include_students {
                let entry = self
                    .missing_students
                    .entry(student.id)
                    .or_insert_with(|| MissingStudentEntry {
                        student_id: student.id,
                        student_name: student.full_name.clone(),
                        class_id: class.id,
                        class_name: class.name.clone(),
                        missing_count: 0,
                        subjects: Vec::new(),
                    });
                entry.missing_count += 1;
                entry.subjects.push(assignment.subject_name.clone());
            }
            if options.include_details {
                self.missing_details.push(MissingDetailEntry {
                    student_id: student.id,
                    student_name: student.full_name.clone(),
                    class_id: class.id,
                    class_name: class.name.clone(),
                    subject_id: assignment.subject_id,
                    subject_name: assignment.subject_name.clone(),
                    teacher_id: assignment.teacher_id,
                    teacher_name: assignment.teacher_name.clone(),
                });
            }
        }
    }

    pub fn finalize(self) -> Rollups {
        let mut by_class: Vec<ClassCompletion> = self
            .by_class
            .into_iter()
            .map(|(class_id, bucket)| ClassCompletion {
                class_id,
                class_name: bucket.name,
                row: bucket.tally.row(),
            })
            .collect();
        by_class.sort_by(|a, b| a.class_name.cmp(&b.class_name));

        let mut by_subject: Vec<SubjectCompletion> = self
            .by_subject
            .into_iter()
            .map(|(subject_id, bucket)| SubjectCompletion {
                subject_id,
                subject_name: bucket.name,
                row: bucket.tally.row(),
            })
            .collect();
        by_subject.sort_by(|a, b| a.subject_name.cmp(&b.subject_name));

        let mut by_teacher: Vec<TeacherCompletion> = self
            .by_teacher
            .into_iter()
            .map(|(teacher_id, bucket)| TeacherCompletion {
                teacher_id,
                teacher_name: bucket.name,
                row: bucket.tally.row(),
            })
            .collect();
        by_teacher.sort_by(|a, b| a.teacher_name.cmp(&b.teacher_name));

        let missing_students = self
            .missing_students
            .into_values()
            .map(|mut entry| {
                entry.subjects.sort();
                entry
            })
            .collect();

        Rollups {
            summary: self.summary.row(),
            by_class,
            by_subject,
            by_teacher,
            by_class_subject: self.by_class_subject,
            missing_students,
            missing_details: self.missing_details,
        }
    }
}
