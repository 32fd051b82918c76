use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::env;
use uuid::Uuid;

use crate::models::{Assignment, Course, CourseDetail, LeaderboardEntry, Material, Quiz, Role, User};
use crate::store::{ProgressRow, Store, StoreError};

pub type Db = Pool<Postgres>;

pub async fn connect() -> Result<Db> {
    let url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    Ok(Pool::<Postgres>::connect(&url).await?)
}

#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, role, eco_points, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn credit_points(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, StoreError> {
        // Single update expression: concurrent credits for the same user
        // serialize at the row, never losing an increment.
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET eco_points = eco_points + $2 WHERE id = $1 RETURNING eco_points",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;
        Ok(balance)
    }

    async fn top_students(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT name, eco_points FROM users
            WHERE role = $1
            ORDER BY eco_points DESC, created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(Role::Student)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        let rows = sqlx::query_as::<_, Course>(
            "SELECT id, title, description, created_at FROM courses ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_course_detail(&self, course_id: Uuid) -> Result<Option<CourseDetail>, StoreError> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, title, description, created_at FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(course) = course else {
            return Ok(None);
        };

        let materials = sqlx::query_as::<_, Material>(
            r#"
            SELECT id, course_id, ordinal, kind, title, description
            FROM materials WHERE course_id = $1 ORDER BY ordinal
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let quizzes = sqlx::query_as::<_, Quiz>(
            "SELECT id, course_id, title, question_count FROM quizzes WHERE course_id = $1 ORDER BY title",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        let assignments = sqlx::query_as::<_, Assignment>(
            "SELECT id, course_id, title, due_at FROM assignments WHERE course_id = $1 ORDER BY due_at NULLS LAST, title",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(CourseDetail {
            course,
            materials,
            quizzes,
            assignments,
        }))
    }

    async fn course_exists(&self, course_id: Uuid) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)")
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn material_in_course(
        &self,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM materials WHERE id = $1 AND course_id = $2)",
        )
        .bind(material_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO progress (user_id, course_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn progress_row(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<ProgressRow>, StoreError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT p.course_id, p.enrolled_at,
                   coalesce(
                       array_agg(pc.material_id ORDER BY pc.completed_at, pc.material_id)
                           FILTER (WHERE pc.material_id IS NOT NULL),
                       ARRAY[]::uuid[]
                   ) AS completed_material_ids,
                   (SELECT count(*) FROM materials m WHERE m.course_id = p.course_id) AS total_materials
            FROM progress p
            LEFT JOIN progress_completions pc
                   ON pc.user_id = p.user_id AND pc.course_id = p.course_id
            WHERE p.user_id = $1 AND p.course_id = $2
            GROUP BY p.course_id, p.enrolled_at
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn progress_rows_for_user(&self, user_id: Uuid) -> Result<Vec<ProgressRow>, StoreError> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT p.course_id, p.enrolled_at,
                   coalesce(
                       array_agg(pc.material_id ORDER BY pc.completed_at, pc.material_id)
                           FILTER (WHERE pc.material_id IS NOT NULL),
                       ARRAY[]::uuid[]
                   ) AS completed_material_ids,
                   (SELECT count(*) FROM materials m WHERE m.course_id = p.course_id) AS total_materials
            FROM progress p
            LEFT JOIN progress_completions pc
                   ON pc.user_id = p.user_id AND pc.course_id = p.course_id
            WHERE p.user_id = $1
            GROUP BY p.course_id, p.enrolled_at
            ORDER BY p.enrolled_at, p.course_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_completion(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO progress_completions (user_id, course_id, material_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, course_id, material_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(material_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn claim_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE progress_completions SET points_awarded = TRUE
            WHERE user_id = $1 AND course_id = $2 AND material_id = $3
              AND points_awarded = FALSE
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(material_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn release_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE progress_completions SET points_awarded = FALSE
            WHERE user_id = $1 AND course_id = $2 AND material_id = $3
              AND points_awarded = TRUE
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(material_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
