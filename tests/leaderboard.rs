use ecolearn_api::mem::MemStore;
use ecolearn_api::models::Role;
use ecolearn_api::store::Store;

#[tokio::test]
async fn ranks_students_by_balance_descending() {
    let mem = MemStore::new();
    let ada = mem.add_user("Ada", Role::Student);
    let ben = mem.add_user("Ben", Role::Student);
    let carla = mem.add_user("Carla", Role::Student);
    mem.add_user("Dr. Ortiz", Role::Instructor);

    mem.credit_points(ada, 30).await.unwrap();
    mem.credit_points(ben, 50).await.unwrap();
    mem.credit_points(carla, 10).await.unwrap();

    let top = mem.top_students(10).await.unwrap();
    let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Ben", "Ada", "Carla"]);
    for pair in top.windows(2) {
        assert!(pair[0].eco_points >= pair[1].eco_points);
    }
}

#[tokio::test]
async fn excludes_non_students() {
    let mem = MemStore::new();
    let instructor = mem.add_user("Dr. Ortiz", Role::Instructor);
    let admin = mem.add_user("Root", Role::Admin);
    mem.credit_points(instructor, 500).await.unwrap();
    mem.credit_points(admin, 900).await.unwrap();
    mem.add_user("Ada", Role::Student);

    let top = mem.top_students(10).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].name, "Ada");
}

#[tokio::test]
async fn ties_break_by_account_creation_order() {
    let mem = MemStore::new();
    let first = mem.add_user("First", Role::Student);
    let second = mem.add_user("Second", Role::Student);
    mem.credit_points(first, 25).await.unwrap();
    mem.credit_points(second, 25).await.unwrap();

    let top = mem.top_students(10).await.unwrap();
    let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["First", "Second"]);
}

#[tokio::test]
async fn repeated_reads_are_identical() {
    let mem = MemStore::new();
    for (name, amount) in [("Ada", 30), ("Ben", 30), ("Carla", 70), ("Dan", 5)] {
        let id = mem.add_user(name, Role::Student);
        mem.credit_points(id, amount).await.unwrap();
    }

    let first = mem.top_students(10).await.unwrap();
    for _ in 0..5 {
        let again = mem.top_students(10).await.unwrap();
        let a: Vec<(&str, i64)> = first.iter().map(|e| (e.name.as_str(), e.eco_points)).collect();
        let b: Vec<(&str, i64)> = again.iter().map(|e| (e.name.as_str(), e.eco_points)).collect();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn respects_the_limit() {
    let mem = MemStore::new();
    for i in 0..15 {
        let id = mem.add_user(&format!("student-{i}"), Role::Student);
        mem.credit_points(id, i).await.unwrap();
    }

    let top = mem.top_students(10).await.unwrap();
    assert_eq!(top.len(), 10);
    assert_eq!(top[0].eco_points, 14);
}
