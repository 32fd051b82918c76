use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use ecolearn_api::coordinator::CompletionCoordinator;
use ecolearn_api::error::{CompletionError, PointsError, ProgressError};
use ecolearn_api::mem::MemStore;
use ecolearn_api::models::{Course, CourseDetail, LeaderboardEntry, Role, User};
use ecolearn_api::points::{AwardPolicy, PointsService};
use ecolearn_api::progress::ProgressService;
use ecolearn_api::store::{ProgressRow, Store, StoreError};

struct Fixture {
    store: Arc<dyn Store>,
    mem: MemStore,
    progress: ProgressService,
    points: PointsService,
    coordinator: CompletionCoordinator,
    user: Uuid,
    course: Uuid,
    m1: Uuid,
    m2: Uuid,
}

fn fixture_over(store: Arc<dyn Store>, mem: MemStore) -> Fixture {
    let user = mem.add_user("Ada", Role::Student);
    let course = mem.add_course("Recycling Basics");
    let m1 = mem.add_material(course, "Why sorting matters");
    let m2 = mem.add_material(course, "Local recycling guide");

    let progress = ProgressService::new(store.clone());
    let points = PointsService::new(store.clone(), AwardPolicy::default());
    let coordinator = CompletionCoordinator::new(progress.clone(), points.clone());
    Fixture {
        store,
        mem,
        progress,
        points,
        coordinator,
        user,
        course,
        m1,
        m2,
    }
}

fn fixture() -> Fixture {
    let mem = MemStore::new();
    fixture_over(Arc::new(mem.clone()), mem)
}

#[tokio::test]
async fn completing_both_materials_awards_once_each() {
    // two materials; complete m1, repeat m1, then m2 (scenario from the
    // course page's checkbox flow)
    let fx = fixture();
    fx.progress.enroll(fx.user, fx.course).await.unwrap();

    let first = fx
        .coordinator
        .complete_material(fx.user, fx.course, fx.m1, None)
        .await
        .unwrap();
    assert_eq!(first.progress.progress_percent, 50);
    assert_eq!(first.awarded, 10);
    assert_eq!(first.total_points, 10);

    let repeat = fx
        .coordinator
        .complete_material(fx.user, fx.course, fx.m1, None)
        .await
        .unwrap();
    assert_eq!(repeat.progress.progress_percent, 50);
    assert_eq!(repeat.awarded, 0);
    assert_eq!(repeat.total_points, 10);

    let second = fx
        .coordinator
        .complete_material(fx.user, fx.course, fx.m2, None)
        .await
        .unwrap();
    assert_eq!(second.progress.progress_percent, 100);
    assert_eq!(second.awarded, 10);
    assert_eq!(second.total_points, 20);
}

#[tokio::test]
async fn concurrent_duplicates_converge_to_one_award() {
    let fx = fixture();
    fx.progress.enroll(fx.user, fx.course).await.unwrap();

    let (a, b) = tokio::join!(
        fx.coordinator
            .complete_material(fx.user, fx.course, fx.m1, None),
        fx.coordinator
            .complete_material(fx.user, fx.course, fx.m1, None),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.awarded + b.awarded, 10);

    let balance = fx.points.balance_of(fx.user).await.unwrap();
    assert_eq!(balance, 10);
    let snap = fx.progress.snapshot(fx.user, fx.course).await.unwrap();
    assert_eq!(snap.completed_material_ids.len(), 1);
}

#[tokio::test]
async fn completing_without_enrollment_fails_and_changes_nothing() {
    let fx = fixture();
    let outsider = fx.mem.add_user("Ben", Role::Student);

    let err = fx
        .coordinator
        .complete_material(outsider, fx.course, fx.m1, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CompletionError::Progress(ProgressError::NotEnrolled { .. })
    ));

    assert_eq!(fx.points.balance_of(outsider).await.unwrap(), 0);
    assert!(fx
        .store
        .progress_row(outsider, fx.course)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn completing_a_foreign_material_fails() {
    let fx = fixture();
    fx.progress.enroll(fx.user, fx.course).await.unwrap();
    let other_course = fx.mem.add_course("Home Energy Efficiency");
    let foreign = fx.mem.add_material(other_course, "Reading your meter");

    let err = fx
        .progress
        .record_completion(fx.user, fx.course, foreign)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::UnknownMaterial { .. }));

    let snap = fx.progress.snapshot(fx.user, fx.course).await.unwrap();
    assert!(snap.completed_material_ids.is_empty());
}

#[tokio::test]
async fn percent_is_monotonic_and_bounded() {
    let mem = MemStore::new();
    let fx = fixture_over(Arc::new(mem.clone()), mem);
    let m3 = fx.mem.add_material(fx.course, "Appliance checklist");
    fx.progress.enroll(fx.user, fx.course).await.unwrap();

    let mut last = fx
        .progress
        .snapshot(fx.user, fx.course)
        .await
        .unwrap()
        .progress_percent;
    assert_eq!(last, 0);

    for material in [fx.m1, fx.m1, fx.m2, m3] {
        let record = fx
            .progress
            .record_completion(fx.user, fx.course, material)
            .await
            .unwrap();
        let percent = record.snapshot.progress_percent;
        assert!(percent >= last);
        assert!((0..=100).contains(&percent));
        last = percent;
    }
    // 100 exactly when every material is in the completed set
    assert_eq!(last, 100);
}

#[tokio::test]
async fn invalid_amount_is_rejected_before_any_mutation() {
    let fx = fixture();
    fx.progress.enroll(fx.user, fx.course).await.unwrap();

    for bad in [0, -5, 101] {
        let err = fx
            .coordinator
            .complete_material(fx.user, fx.course, fx.m1, Some(bad))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Points(PointsError::InvalidAmount { .. })
        ));
    }

    let snap = fx.progress.snapshot(fx.user, fx.course).await.unwrap();
    assert!(snap.completed_material_ids.is_empty());
    assert_eq!(fx.points.balance_of(fx.user).await.unwrap(), 0);
}

#[tokio::test]
async fn awarding_to_an_unknown_user_fails() {
    let fx = fixture();
    let err = fx
        .points
        .award_points(Uuid::new_v4(), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, PointsError::UserNotFound(_)));
}

#[tokio::test]
async fn enrollment_is_idempotent() {
    let fx = fixture();
    let first = fx.progress.enroll(fx.user, fx.course).await.unwrap();
    let again = fx.progress.enroll(fx.user, fx.course).await.unwrap();
    assert_eq!(first.enrolled_at, again.enrolled_at);
    assert_eq!(again.progress_percent, 0);
}

/// Delegating store whose `credit_points` fails a configured number of
/// times, to exercise the partial-award path.
struct FlakyCredits {
    inner: MemStore,
    credit_failures_left: AtomicUsize,
}

#[async_trait]
impl Store for FlakyCredits {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.inner.get_user(user_id).await
    }

    async fn credit_points(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, StoreError> {
        if self
            .credit_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::Unavailable("injected credit failure".into()));
        }
        self.inner.credit_points(user_id, amount).await
    }

    async fn top_students(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.inner.top_students(limit).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        self.inner.list_courses().await
    }

    async fn get_course_detail(&self, course_id: Uuid) -> Result<Option<CourseDetail>, StoreError> {
        self.inner.get_course_detail(course_id).await
    }

    async fn course_exists(&self, course_id: Uuid) -> Result<bool, StoreError> {
        self.inner.course_exists(course_id).await
    }

    async fn material_in_course(
        &self,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        self.inner.material_in_course(course_id, material_id).await
    }

    async fn enroll(&self, user_id: Uuid, course_id: Uuid) -> Result<(), StoreError> {
        self.inner.enroll(user_id, course_id).await
    }

    async fn progress_row(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<ProgressRow>, StoreError> {
        self.inner.progress_row(user_id, course_id).await
    }

    async fn progress_rows_for_user(&self, user_id: Uuid) -> Result<Vec<ProgressRow>, StoreError> {
        self.inner.progress_rows_for_user(user_id).await
    }

    async fn insert_completion(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        self.inner
            .insert_completion(user_id, course_id, material_id)
            .await
    }

    async fn claim_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<bool, StoreError> {
        self.inner.claim_award(user_id, course_id, material_id).await
    }

    async fn release_award(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        material_id: Uuid,
    ) -> Result<(), StoreError> {
        self.inner
            .release_award(user_id, course_id, material_id)
            .await
    }
}

#[tokio::test]
async fn failed_credit_surfaces_partial_award_and_retry_heals_it() {
    let mem = MemStore::new();
    let flaky = Arc::new(FlakyCredits {
        inner: mem.clone(),
        credit_failures_left: AtomicUsize::new(1),
    });
    let fx = fixture_over(flaky, mem);
    fx.progress.enroll(fx.user, fx.course).await.unwrap();

    let err = fx
        .coordinator
        .complete_material(fx.user, fx.course, fx.m1, None)
        .await
        .unwrap_err();
    let CompletionError::PartialAward { progress, .. } = err else {
        panic!("expected PartialAward, got {err:?}");
    };
    // step 1 held: the material is complete even though no points landed
    assert_eq!(progress.progress_percent, 50);
    assert_eq!(fx.points.balance_of(fx.user).await.unwrap(), 0);

    // same call again: the completion insert is a no-op, only the award
    // is redelivered
    let retried = fx
        .coordinator
        .complete_material(fx.user, fx.course, fx.m1, None)
        .await
        .unwrap();
    assert_eq!(retried.awarded, 10);
    assert_eq!(retried.total_points, 10);
    assert_eq!(retried.progress.progress_percent, 50);
    assert_eq!(retried.progress.completed_material_ids.len(), 1);

    // and the award still cannot be delivered twice
    let third = fx
        .coordinator
        .complete_material(fx.user, fx.course, fx.m1, None)
        .await
        .unwrap();
    assert_eq!(third.awarded, 0);
    assert_eq!(third.total_points, 10);
}
