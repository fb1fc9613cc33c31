use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Assignment, ClassRoster, GradeRecord, SchoolYear, StudentRef, Term};
use crate::store::GradeStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed [`GradeStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GradeStore for PgStore {
    async fn resolve_school_year(&self, id: Option<Uuid>) -> Result<Option<SchoolYear>> {
        let row = match id {
            Some(id) => {
                sqlx::query(
                    "SELECT id, name, term FROM grade_completeness.school_years WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, name, term FROM grade_completeness.school_years \
                     WHERE is_active ORDER BY name DESC LIMIT 1",
                )
                .fetch_optional(&self.pool)
                .await?
            }
        };

        let Some(row) = row else {
            return Ok(None);
        };
        let term: String = row.get("term");
        Ok(Some(SchoolYear {
            id: row.get("id"),
            name: row.get("name"),
            term: term.parse()?,
        }))
    }

    async fn list_active_classes(&self, school_year_id: Uuid) -> Result<Vec<ClassRoster>> {
        let classes_query = sqlx::query(
            r#"
            SELECT id, name
            FROM grade_completeness.classes
            WHERE school_year_id = $1 AND is_active
            ORDER BY name
            "#,
        )
        .bind(school_year_id)
        .fetch_all(&self.pool);
        let students_query = sqlx::query(
            r#"
            SELECT st.id, st.class_id, st.full_name
            FROM grade_completeness.students st
            JOIN grade_completeness.classes c ON c.id = st.class_id
            WHERE c.school_year_id = $1 AND c.is_active AND st.is_active
            ORDER BY st.full_name
            "#,
        )
        .bind(school_year_id)
        .fetch_all(&self.pool);

        let (class_rows, student_rows) = tokio::try_join!(classes_query, students_query)?;

        let mut students_by_class: HashMap<Uuid, Vec<StudentRef>> = HashMap::new();
        for row in student_rows {
            students_by_class
                .entry(row.get("class_id"))
                .or_default()
                .push(StudentRef {
                    id: row.get("id"),
                    full_name: row.get("full_name"),
                });
        }

        let mut rosters = Vec::with_capacity(class_rows.len());
        for row in class_rows {
            let id: Uuid = row.get("id");
            rosters.push(ClassRoster {
                id,
                name: row.get("name"),
                students: students_by_class.remove(&id).unwrap_or_default(),
            });
        }

        Ok(rosters)
    }

    async fn list_active_assignments(&self, school_year_id: Uuid) -> Result<Vec<Assignment>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.class_id, a.subject_id, s.name AS subject_name,
                   a.teacher_id, t.full_name AS teacher_name
            FROM grade_completeness.assignments a
            JOIN grade_completeness.subjects s ON s.id = a.subject_id
            JOIN grade_completeness.teachers t ON t.id = a.teacher_id
            WHERE a.school_year_id = $1 AND a.is_active AND s.is_active
            ORDER BY a.created_at, a.id
            "#,
        )
        .bind(school_year_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Assignment {
                id: row.get("id"),
                class_id: row.get("class_id"),
                subject_id: row.get("subject_id"),
                subject_name: row.get("subject_name"),
                teacher_id: row.get("teacher_id"),
                teacher_name: row.get("teacher_name"),
            })
            .collect())
    }

    async fn find_grades(
        &self,
        school_year_id: Uuid,
        term: Term,
        student_ids: &[Uuid],
        subject_ids: &[Uuid],
    ) -> Result<Vec<GradeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, subject_id, grade_scale_id
            FROM grade_completeness.grades
            WHERE school_year_id = $1
              AND term = $2
              AND grade_scale_id IS NOT NULL
              AND student_id = ANY($3)
              AND subject_id = ANY($4)
            "#,
        )
        .bind(school_year_id)
        .bind(term.as_str())
        .bind(student_ids)
        .bind(subject_ids)
        .fetch_all(&self.pool)
        .await?;

        debug!(rows = rows.len(), %term, "grades fetched");

        Ok(rows
            .into_iter()
            .map(|row| GradeRecord {
                student_id: row.get("student_id"),
                subject_id: row.get("subject_id"),
                school_year_id,
                term,
                grade_scale_id: row.get("grade_scale_id"),
            })
            .collect())
    }
}

async fn upsert_named(pool: &PgPool, sql: &str, name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(sql)
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(pool)
        .await?
        .get("id");
    Ok(id)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let year_id: Uuid = sqlx::query(
        r#"
        INSERT INTO grade_completeness.school_years (id, name, term, is_active)
        VALUES ($1, $2, $3, TRUE)
        ON CONFLICT (name) DO UPDATE SET term = EXCLUDED.term
        RETURNING id
        "#,
    )
    .bind(Uuid::parse_str("6a1f3f0e-8d4b-4c9a-9f1e-2b7c5d3e4a10")?)
    .bind("2025/2026")
    .bind(Term::Midyear.as_str())
    .fetch_one(pool)
    .await?
    .get("id");

    let mut subjects = HashMap::new();
    for name in ["Mathematics", "Science", "History", "English"] {
        let id = upsert_named(
            pool,
            "INSERT INTO grade_completeness.subjects (id, name) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET is_active = TRUE RETURNING id",
            name,
        )
        .await?;
        subjects.insert(name, id);
    }

    let mut scales = Vec::new();
    for label in ["A", "B", "C", "D", "E"] {
        scales.push(
            upsert_named(
                pool,
                "INSERT INTO grade_completeness.grade_scales (id, label) VALUES ($1, $2) \
                 ON CONFLICT (label) DO UPDATE SET label = EXCLUDED.label RETURNING id",
                label,
            )
            .await?,
        );
    }

    let teachers = [
        ("Maya Okafor", "maya.okafor@school.example"),
        ("Daniel Reyes", "daniel.reyes@school.example"),
        ("Priya Nair", "priya.nair@school.example"),
    ];
    let mut teacher_ids = HashMap::new();
    for (name, email) in teachers {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO grade_completeness.teachers (id, full_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET full_name = EXCLUDED.full_name
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .fetch_one(pool)
        .await?
        .get("id");
        teacher_ids.insert(name, id);
    }

    let classes = [
        ("3A", vec!["Avery Lee", "Jules Moreno", "Kiara Patel", "Noah Brandt"]),
        ("3B", vec!["Lena Fischer", "Omar Haddad", "Sofia Rossi"]),
        ("4A", vec![]),
    ];
    let assignments = [
        ("3A", "Mathematics", "Maya Okafor"),
        ("3A", "Science", "Daniel Reyes"),
        ("3A", "History", "Priya Nair"),
        ("3B", "Mathematics", "Maya Okafor"),
        ("3B", "English", "Priya Nair"),
        ("3B", "English", "Daniel Reyes"),
        ("4A", "Science", "Daniel Reyes"),
    ];

    let mut class_ids = HashMap::new();
    let mut students = Vec::new();
    for (class_name, roster) in classes {
        let class_id: Uuid = sqlx::query(
            r#"
            INSERT INTO grade_completeness.classes (id, school_year_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (school_year_id, name) DO UPDATE SET is_active = TRUE
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(year_id)
        .bind(class_name)
        .fetch_one(pool)
        .await?
        .get("id");
        class_ids.insert(class_name, class_id);

        for full_name in roster {
            let student_id: Uuid = sqlx::query(
                r#"
                INSERT INTO grade_completeness.students (id, class_id, full_name)
                VALUES ($1, $2, $3)
                ON CONFLICT (class_id, full_name) DO UPDATE SET is_active = TRUE
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(class_id)
            .bind(full_name)
            .fetch_one(pool)
            .await?
            .get("id");
            students.push((class_name, student_id));
        }
    }

    for (index, (class_name, subject, teacher)) in assignments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO grade_completeness.assignments
            (id, school_year_id, class_id, subject_id, teacher_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (class_id, subject_id, teacher_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(year_id)
        .bind(class_ids[class_name])
        .bind(subjects[subject])
        .bind(teacher_ids[teacher])
        .bind(Utc::now() - Duration::days(90) + Duration::minutes(index as i64))
        .execute(pool)
        .await?;
    }

    let mut graded = 0usize;
    for (position, (class_name, student_id)) in students.iter().enumerate() {
        for (index, (assigned_class, subject, _)) in assignments.iter().enumerate() {
            if assigned_class != class_name || (position + index) % 3 == 0 {
                continue;
            }
            let result = sqlx::query(
                r#"
                INSERT INTO grade_completeness.grades
                (id, student_id, subject_id, school_year_id, term, grade_scale_id, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (student_id, subject_id, school_year_id, term) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(*student_id)
            .bind(subjects[subject])
            .bind(year_id)
            .bind(Term::Midyear.as_str())
            .bind(scales[(position + index) % scales.len()])
            .bind(Utc::now() - Duration::days((position + index) as i64))
            .execute(pool)
            .await?;
            graded += result.rows_affected() as usize;
        }
    }

    info!(graded, "seed grades inserted");
    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: Uuid,
        subject_id: Uuid,
        school_year_id: Uuid,
        term: String,
        grade_scale_id: Option<Uuid>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut imported = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid grade row {}", line + 1))?;
        let term: Term = row
            .term
            .parse()
            .with_context(|| format!("invalid term on grade row {}", line + 1))?;

        let result = sqlx::query(
            r#"
            INSERT INTO grade_completeness.grades
            (id, student_id, subject_id, school_year_id, term, grade_scale_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_id, subject_id, school_year_id, term) DO UPDATE
            SET grade_scale_id = EXCLUDED.grade_scale_id, recorded_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(row.student_id)
        .bind(row.subject_id)
        .bind(row.school_year_id)
        .bind(term.as_str())
        .bind(row.grade_scale_id)
        .execute(pool)
        .await?;

        imported += result.rows_affected() as usize;
    }

    Ok(imported)
}
