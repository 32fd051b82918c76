use std::sync::Arc;
use uuid::Uuid;

use crate::error::ProgressError;
use crate::models::{CompletionRecord, ProgressSnapshot};
use crate::store::{ProgressRow, Store};

/// Records completions and derives progress. The completed-materials set
/// owned here is the sole gate for award eligibility: `claim_award` flips
/// a completion's award flag atomically, so the coordinator never credits
/// the same material twice.
#[derive(Clone)]
pub struct ProgressService {
    store: Arc<dyn Store>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create the caller's progress row for a course (idempotent) and
    /// return the snapshot.
    pub async fn enroll(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<ProgressSnapshot, ProgressError> {
        if !self.store.course_exists(course_id).await? {
            return Err(ProgressError::CourseNotFound(course_id));
        }
        self.store.enroll(user_id, course_id).await?;
        self.snapshot(user_id, course_id).await
    }

    /// Mark a material complete. Idempotent per material: a repeat call
    /// returns the unchanged snapshot with `newly_completed = false` and
    /// has no side effect. A transient storage failure is retried once
    /// internally; the conflict-free insert makes the retry safe.
    pub async fn record_completion(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<CompletionRecord, ProgressError> {
        match self
            .record_completion_inner(user_id, course_id, material_id)
            .await
        {
            Err(ProgressError::Storage(err)) => {
                tracing::warn!(
                    %user_id, %course_id, %material_id, error = %err,
                    "transient storage failure recording completion, retrying once"
                );
                self.record_completion_inner(user_id, course_id, material_id)
                    .await
            }
            other => other,
        }
    }

    async fn record_completion_inner(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<CompletionRecord, ProgressError> {
        let row = self
            .store
            .progress_row(user_id, course_id)
            .await?
            .ok_or(ProgressError::NotEnrolled { user_id, course_id })?;
        if !self.store.material_in_course(course_id, material_id).await? {
            return Err(ProgressError::UnknownMaterial {
                material_id,
                course_id,
            });
        }

        if row.completed_material_ids.contains(&material_id) {
            return Ok(CompletionRecord {
                snapshot: snapshot_from(user_id, row),
                newly_completed: false,
            });
        }

        // Concurrent duplicates race here; the conflict-free insert lets
        // exactly one of them observe `newly_completed = true`.
        let inserted = self
            .store
            .insert_completion(user_id, course_id, material_id)
            .await?;
        let row = self
            .store
            .progress_row(user_id, course_id)
            .await?
            .ok_or(ProgressError::NotEnrolled { user_id, course_id })?;
        tracing::info!(%user_id, %course_id, %material_id, inserted, "material completion recorded");
        Ok(CompletionRecord {
            snapshot: snapshot_from(user_id, row),
            newly_completed: inserted,
        })
    }

    pub async fn snapshot(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<ProgressSnapshot, ProgressError> {
        let row = self
            .store
            .progress_row(user_id, course_id)
            .await?
            .ok_or(ProgressError::NotEnrolled { user_id, course_id })?;
        Ok(snapshot_from(user_id, row))
    }

    pub async fn snapshots_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ProgressSnapshot>, ProgressError> {
        let rows = self.store.progress_rows_for_user(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| snapshot_from(user_id, row))
            .collect())
    }

    /// Atomically claim the award for a completed material. `true` iff
    /// this caller won the claim (award not yet delivered).
    pub async fn claim_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, ProgressError> {
        Ok(self
            .store
            .claim_award(user_id, course_id, material_id)
            .await?)
    }

    /// Give a claim back after a failed credit so a retry can win it again.
    pub async fn release_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<(), ProgressError> {
        Ok(self
            .store
            .release_award(user_id, course_id, material_id)
            .await?)
    }
}

fn snapshot_from(user_id: Uuid, row: ProgressRow) -> ProgressSnapshot {
    let percent = percent_complete(
        row.completed_material_ids.len(),
        row.total_materials.max(0) as usize,
    );
    ProgressSnapshot {
        user_id,
        course_id: row.course_id,
        completed_material_ids: row.completed_material_ids,
        progress_percent: percent,
        enrolled_at: row.enrolled_at,
    }
}

/// Share of materials completed, rounded to the nearest integer. A course
/// with no materials reports 0 (nothing completable).
pub fn percent_complete(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as i32
}
