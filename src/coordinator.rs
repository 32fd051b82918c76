use uuid::Uuid;

use crate::error::CompletionError;
use crate::models::CompletionOutcome;
use crate::points::PointsService;
use crate::progress::ProgressService;

/// Orchestrates a material completion and its points award as a saga:
/// one idempotent step (the completion insert) followed by one
/// at-least-once-safe step (the credit, gated by an atomic claim). The two
/// steps share no transaction; if the credit fails after the completion
/// held, the caller sees `PartialAward` and retries the same call — the
/// completion insert is a no-op on retry and only the award is redelivered.
#[derive(Clone)]
pub struct CompletionCoordinator {
    progress: ProgressService,
    points: PointsService,
}

impl CompletionCoordinator {
    pub fn new(progress: ProgressService, points: PointsService) -> Self {
        Self { progress, points }
    }

    pub async fn complete_material(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
        points: Option<i64>,
    ) -> Result<CompletionOutcome, CompletionError> {
        // Validate the amount before any state changes; an invalid request
        // must not mark the material complete.
        let amount = points.unwrap_or(self.points.policy().default_award);
        self.points
            .check_amount(amount)
            .map_err(CompletionError::Points)?;

        let record = self
            .progress
            .record_completion(user_id, course_id, material_id)
            .await?;

        // Award eligibility is the atomic claim on the completion row:
        // exactly one concurrent caller wins it, and a claim left pending
        // by an earlier partial failure can be won again.
        if !self
            .progress
            .claim_award(user_id, course_id, material_id)
            .await?
        {
            let total = self
                .points
                .balance_of(user_id)
                .await
                .map_err(CompletionError::Points)?;
            return Ok(CompletionOutcome {
                progress: record.snapshot,
                awarded: 0,
                total_points: total,
            });
        }

        match self.points.award_points(user_id, amount).await {
            Ok(balance) => Ok(CompletionOutcome {
                progress: record.snapshot,
                awarded: amount,
                total_points: balance,
            }),
            Err(err) => {
                if let Err(release_err) = self
                    .progress
                    .release_award(user_id, course_id, material_id)
                    .await
                {
                    // Claim stays held: the award is dropped rather than
                    // risking a double credit on a later retry.
                    tracing::error!(
                        %user_id, %course_id, %material_id, error = %release_err,
                        "failed to release award claim after failed credit"
                    );
                }
                tracing::warn!(
                    %user_id, %course_id, %material_id, error = %err,
                    "completion saved but points credit failed"
                );
                Err(CompletionError::PartialAward {
                    progress: record.snapshot,
                    reason: err.to_string(),
                })
            }
        }
    }
}
