//! In-memory `Store` with the same atomicity semantics as the Postgres
//! backend, used by the service test-suite.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::models::{
    Assignment, Course, CourseDetail, LeaderboardEntry, Material, Quiz, Role, User,
};
use crate::store::{ProgressRow, Store, StoreError};

#[derive(Debug, Clone)]
struct CompletionEntry {
    user_id: Uuid,
    course_id: Uuid,
    material_id: Uuid,
    points_awarded: bool,
}

#[derive(Debug, Default)]
struct Inner {
    // insertion order doubles as the leaderboard tie-breaker
    users: Vec<User>,
    courses: Vec<Course>,
    materials: Vec<Material>,
    quizzes: Vec<Quiz>,
    assignments: Vec<Assignment>,
    progress: HashMap<(Uuid, Uuid), chrono::DateTime<Utc>>,
    completions: Vec<CompletionEntry>,
}

#[derive(Debug, Default, Clone)]
pub struct MemStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, name: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().users.push(User {
            id,
            name: name.to_string(),
            role,
            eco_points: 0,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_course(&self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().courses.push(Course {
            id,
            title: title.to_string(),
            description: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_material(&self, course_id: Uuid, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap();
        let ordinal = inner
            .materials
            .iter()
            .filter(|m| m.course_id == course_id)
            .count() as i32;
        inner.materials.push(Material {
            id,
            course_id,
            ordinal,
            kind: "video".to_string(),
            title: title.to_string(),
            description: None,
        });
        id
    }

    pub fn add_quiz(&self, course_id: Uuid, title: &str, question_count: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().quizzes.push(Quiz {
            id,
            course_id,
            title: title.to_string(),
            question_count,
        });
        id
    }

    pub fn add_assignment(&self, course_id: Uuid, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().assignments.push(Assignment {
            id,
            course_id,
            title: title.to_string(),
            due_at: None,
        });
        id
    }

    fn row_for(inner: &Inner, user_id: Uuid, course_id: Uuid) -> Option<ProgressRow> {
        let enrolled_at = *inner.progress.get(&(user_id, course_id))?;
        let completed: Vec<Uuid> = inner
            .completions
            .iter()
            .filter(|c| c.user_id == user_id && c.course_id == course_id)
            .map(|c| c.material_id)
            .collect();
        let total = inner
            .materials
            .iter()
            .filter(|m| m.course_id == course_id)
            .count() as i64;
        Some(ProgressRow {
            course_id,
            enrolled_at,
            completed_material_ids: completed,
            total_materials: total,
        })
    }
}

#[async_trait]
impl Store for MemStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn credit_points(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.eco_points += amount;
                Ok(Some(user.eco_points))
            }
            None => Ok(None),
        }
    }

    async fn top_students(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut students: Vec<&User> = inner
            .users
            .iter()
            .filter(|u| u.role == Role::Student)
            .collect();
        // stable sort keeps insertion order among equal balances
        students.sort_by(|a, b| b.eco_points.cmp(&a.eco_points));
        Ok(students
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|u| LeaderboardEntry {
                name: u.name.clone(),
                eco_points: u.eco_points,
            })
            .collect())
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.inner.lock().unwrap().courses.clone())
    }

    async fn get_course_detail(&self, course_id: Uuid) -> Result<Option<CourseDetail>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(course) = inner.courses.iter().find(|c| c.id == course_id).cloned() else {
            return Ok(None);
        };
        let mut materials: Vec<Material> = inner
            .materials
            .iter()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        materials.sort_by_key(|m| m.ordinal);
        Ok(Some(CourseDetail {
            course,
            materials,
            quizzes: inner
                .quizzes
                .iter()
                .filter(|q| q.course_id == course_id)
                .cloned()
                .collect(),
            assignments: inner
                .assignments
                .iter()
                .filter(|a| a.course_id == course_id)
                .cloned()
                .collect(),
        }))
    }

    async fn course_exists(&self, course_id: Uuid) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.courses.iter().any(|c| c.id == course_id))
    }

    async fn material_in_course(
        &self,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .materials
            .iter()
            .any(|m| m.id == material_id && m.course_id == course_id))
    }

    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .progress
            .entry((user_id, course_id))
            .or_insert_with(Utc::now);
        Ok(())
    }

    async fn progress_row(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<ProgressRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(Self::row_for(&inner, user_id, course_id))
    }

    async fn progress_rows_for_user(&self, user_id: Uuid) -> Result<Vec<ProgressRow>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut keys: Vec<(Uuid, Uuid)> = inner
            .progress
            .keys()
            .filter(|(u, _)| *u == user_id)
            .copied()
            .collect();
        keys.sort_by_key(|&(_, course_id)| {
            (inner.progress[&(user_id, course_id)], course_id)
        });
        Ok(keys
            .into_iter()
            .filter_map(|(u, c)| Self::row_for(&inner, u, c))
            .collect())
    }

    async fn insert_completion(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let already = inner.completions.iter().any(|c| {
            c.user_id == user_id && c.course_id == course_id && c.material_id == material_id
        });
        if already {
            return Ok(false);
        }
        inner.completions.push(CompletionEntry {
            user_id,
            course_id,
            material_id,
            points_awarded: false,
        });
        Ok(true)
    }

    async fn claim_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.completions.iter_mut().find(|c| {
            c.user_id == user_id && c.course_id == course_id && c.material_id == material_id
        }) {
            Some(entry) if !entry.points_awarded => {
                entry.points_awarded = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(entry) = inner.completions.iter_mut().find(|c| {
            c.user_id == user_id && c.course_id == course_id && c.material_id == material_id
        }) {
            entry.points_awarded = false;
        }
        Ok(())
    }
}
