use std::collections::{BTreeSet, HashMap};

use tracing::debug;
use uuid::Uuid;

use crate::error::{CompletenessError, Result};
use crate::models::{Assignment, ClassRoster, GradeRecord, SchoolYear, Term};
use crate::store::GradeStore;

/// Everything the aggregator needs for one (school year, term) pair.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    pub school_year: SchoolYear,
    pub term: Term,
    pub classes: HashMap<Uuid, ClassRoster>,
    pub assignments: Vec<Assignment>,
    pub grades: Vec<GradeRecord>,
}

impl RosterSnapshot {
    fn empty(school_year: SchoolYear, term: Term) -> Self {
        Self {
            school_year,
            term,
            classes: HashMap::new(),
            assignments: Vec::new(),
            grades: Vec::new(),
        }
    }
}

pub async fn load_roster<S: GradeStore + ?Sized>(
    store: &S,
    school_year_id: Option<Uuid>,
    term: Option<Term>,
) -> Result<RosterSnapshot> {
    let school_year = store
        .resolve_school_year(school_year_id)
        .await?
        .ok_or_else(|| match school_year_id {
            Some(id) => CompletenessError::NotFound(format!("school year {id} does not exist")),
            None => CompletenessError::NotFound("no active school year".to_string()),
        })?;
    let term = term.unwrap_or(school_year.term);

    let (classes, assignments) = tokio::try_join!(
        store.list_active_classes(school_year.id),
        store.list_active_assignments(school_year.id),
    )?;

    if classes.is_empty() {
        debug!(school_year = %school_year.id, "no active classes in school year");
        return Ok(RosterSnapshot::empty(school_year, term));
    }

    let classes: HashMap<Uuid, ClassRoster> = classes
        .into_iter()
        .map(|roster| (roster.id, roster))
        .collect();

    let mut assignments_in_scope = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        if classes.contains_key(&assignment.class_id) {
            assignments_in_scope.push(assignment);
        } else {
            debug!(
                assignment = %assignment.id,
                class = %assignment.class_id,
                "skipping assignment for inactive class"
            );
        }
    }

    let mut student_ids = BTreeSet::new();
    let mut subject_ids = BTreeSet::new();
    for assignment in &assignments_in_scope {
        subject_ids.insert(assignment.subject_id);
        if let Some(roster) = classes.get(&assignment.class_id) {
            student_ids.extend(roster.students.iter().map(|student| student.id));
        }
    }

    let grades = if student_ids.is_empty() || subject_ids.is_empty() {
        Vec::new()
    } else {
        let student_ids: Vec<Uuid> = student_ids.into_iter().collect();
        let subject_ids: Vec<Uuid> = subject_ids.into_iter().collect();
        store
            .find_grades(school_year.id, term, &student_ids, &subject_ids)
            .await?
    };

    debug!(
        classes = classes.len(),
        assignments = assignments_in_scope.len(),
        grades = grades.len(),
        "roster loaded"
    );

    Ok(RosterSnapshot {
        school_year,
        term,
        classes,
        assignments: assignments_in_scope,
        grades,
    })
}
