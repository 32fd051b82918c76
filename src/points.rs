use std::env;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PointsError;
use crate::store::Store;

/// Default and maximum points creditable per award call. The cap blocks a
/// client from inflating its own balance through the caller-supplied
/// points value.
#[derive(Debug, Clone, Copy)]
pub struct AwardPolicy {
    pub default_award: i64,
    pub max_award: i64,
}

impl Default for AwardPolicy {
    fn default() -> Self {
        Self {
            default_award: 10,
            max_award: 100,
        }
    }
}

impl AwardPolicy {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_award: env::var("DEFAULT_AWARD_POINTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_award),
            max_award: env::var("MAX_AWARD_POINTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_award),
        }
    }
}

/// Credits eco-points. The increment happens as a single update expression
/// at the storage layer, so concurrent awards for the same user never lose
/// an update.
#[derive(Clone)]
pub struct PointsService {
    store: Arc<dyn Store>,
    policy: AwardPolicy,
}

impl PointsService {
    pub fn new(store: Arc<dyn Store>, policy: AwardPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> AwardPolicy {
        self.policy
    }

    /// Validate an award amount without touching any state, so callers can
    /// reject a bad request before mutating anything else.
    pub fn check_amount(&self, amount: i64) -> Result<(), PointsError> {
        if amount < 1 || amount > self.policy.max_award {
            return Err(PointsError::InvalidAmount {
                amount,
                max: self.policy.max_award,
            });
        }
        Ok(())
    }

    pub async fn award_points(&self, user_id: Uuid, amount: i64) -> Result<i64, PointsError> {
        self.check_amount(amount)?;
        match self.store.credit_points(user_id, amount).await? {
            Some(balance) => {
                tracing::info!(%user_id, amount, balance, "eco-points awarded");
                Ok(balance)
            }
            None => Err(PointsError::UserNotFound(user_id)),
        }
    }

    pub async fn balance_of(&self, user_id: Uuid) -> Result<i64, PointsError> {
        self.store
            .get_user(user_id)
            .await?
            .map(|u| u.eco_points)
            .ok_or(PointsError::UserNotFound(user_id))
    }
}
