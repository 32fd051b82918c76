use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub eco_points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    pub course_id: Uuid,
    pub ordinal: i32,
    pub kind: String, // "video", "pdf", "article", ...
    pub title: String,
    pub description: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub question_count: i32,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
}

/// Full payload for the course page: catalogue data plus the read-only
/// quiz and assignment lists.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub materials: Vec<Material>,
    pub quizzes: Vec<Quiz>,
    pub assignments: Vec<Assignment>,
}

/// A user's progress in one course. `progress_percent` is always derived
/// from the completed set and the course's material count, never stored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub completed_material_ids: Vec<Uuid>,
    pub progress_percent: i32,
    pub enrolled_at: DateTime<Utc>,
}

/// Result of `ProgressService::record_completion`. `newly_completed` is
/// false when the material was already in the completed set and the call
/// was a no-op.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub snapshot: ProgressSnapshot,
    pub newly_completed: bool,
}

/// Result of a coordinated completion: the updated snapshot, the points
/// credited by this call (0 when the award was already delivered), and the
/// user's balance after the call.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub progress: ProgressSnapshot,
    pub awarded: i64,
    #[serde(rename = "totalEcoPoints")]
    pub total_points: i64,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub eco_points: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMaterialReq {
    pub material_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CompleteContentReq {
    pub course_id: Uuid,
    pub material_id: Uuid,
    pub points: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_the_client_wire_names() {
        let snap = ProgressSnapshot {
            user_id: Uuid::nil(),
            course_id: Uuid::nil(),
            completed_material_ids: vec![],
            progress_percent: 50,
            enrolled_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let v = serde_json::to_value(&snap).unwrap();
        assert!(v.get("progressPercent").is_some());
        assert!(v.get("completedMaterialIds").is_some());
    }

    #[test]
    fn outcome_reports_total_as_eco_points() {
        let out = CompletionOutcome {
            progress: ProgressSnapshot {
                user_id: Uuid::nil(),
                course_id: Uuid::nil(),
                completed_material_ids: vec![],
                progress_percent: 0,
                enrolled_at: DateTime::<Utc>::UNIX_EPOCH,
            },
            awarded: 10,
            total_points: 30,
        };
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["totalEcoPoints"], 30);
        assert_eq!(v["awarded"], 10);
    }
}
