use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Course, CourseDetail, LeaderboardEntry, User};

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Transient failure (connection, timeout). Safe for the caller to
    /// retry idempotent operations.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The database rejected the write (constraint violation).
    #[error("storage constraint violated: {0}")]
    Constraint(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.constraint().is_some() => {
                StoreError::Constraint(db.message().to_string())
            }
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

/// Raw progress state for one (user, course) pair as persisted; the
/// service layer derives the percentage from it.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct ProgressRow {
    pub course_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    pub completed_material_ids: Vec<Uuid>,
    pub total_materials: i64,
}

/// Everything the services persist or read. Mutating operations carry the
/// atomicity contract: `credit_points` is a single update expression (no
/// read-modify-write), `insert_completion` is conflict-free (at most one
/// concurrent caller observes `true`), and `claim_award` flips the award
/// flag atomically so exactly one caller can win a pending award.
#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
    /// Atomically add `amount` to the user's balance, returning the
    /// post-increment value, or `None` if the user does not exist.
    async fn credit_points(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, StoreError>;
    /// Students ranked by balance, ties broken by account creation order.
    async fn top_students(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError>;

    // course catalogue (read-only here)
    async fn list_courses(&self) -> Result<Vec<Course>, StoreError>;
    async fn get_course_detail(&self, course_id: Uuid) -> Result<Option<CourseDetail>, StoreError>;
    async fn course_exists(&self, course_id: Uuid) -> Result<bool, StoreError>;
    async fn material_in_course(
        &self,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError>;

    // progress
    /// Create the progress row if absent (idempotent).
    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<(), StoreError>;
    async fn progress_row(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<ProgressRow>, StoreError>;
    async fn progress_rows_for_user(&self, user_id: Uuid) -> Result<Vec<ProgressRow>, StoreError>;
    /// Insert into the completed set; `true` iff the row was newly created.
    async fn insert_completion(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError>;
    /// Flip the completion's award flag false -> true; `true` iff this
    /// caller won the flip.
    async fn claim_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError>;
    /// Undo a won claim after a failed credit so a retry can claim again.
    async fn release_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<(), StoreError>;
}
