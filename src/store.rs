use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Assignment, ClassRoster, GradeRecord, SchoolYear, Term};

/// Read-only access to the school records the completeness engine consumes.
#[async_trait]
pub trait GradeStore: Send + Sync {
    /// Returns the requested year, or the active year when `id` is `None`.
    async fn resolve_school_year(&self, id: Option<Uuid>) -> Result<Option<SchoolYear>>;

    /// Active classes of the year, each holding only its active students.
    async fn list_active_classes(&self, school_year_id: Uuid) -> Result<Vec<ClassRoster>>;

    /// Active assignments of the year whose subject is active, in creation order.
    async fn list_active_assignments(&self, school_year_id: Uuid) -> Result<Vec<Assignment>>;

    async fn find_grades(
        &self,
        school_year_id: Uuid,
        term: Term,
        student_ids: &[Uuid],
        subject_ids: &[Uuid],
    ) -> Result<Vec<GradeRecord>>;
}
