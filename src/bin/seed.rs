//! Seeds demo catalogue data and a few student accounts. Course authoring
//! has no API surface here, so this is how a fresh database gets content.
//! Safe to rerun: every insert is conflict-free on a fixed id.

use anyhow::Result;
use uuid::Uuid;

use ecolearn_api::db;

struct SeedMaterial {
    id: &'static str,
    ordinal: i32,
    kind: &'static str,
    title: &'static str,
}

struct SeedCourse {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    materials: &'static [SeedMaterial],
}

const COURSES: &[SeedCourse] = &[
    SeedCourse {
        id: "3f7cbd2e-9c31-4f7a-8e3a-0a1f5f1c9b01",
        title: "Recycling Basics",
        description: "Sorting, composting, and what actually gets recycled.",
        materials: &[
            SeedMaterial {
                id: "8a40b7a8-1f2d-4f6e-9c3b-2d5e7f8a9001",
                ordinal: 0,
                kind: "video",
                title: "Why sorting matters",
            },
            SeedMaterial {
                id: "8a40b7a8-1f2d-4f6e-9c3b-2d5e7f8a9002",
                ordinal: 1,
                kind: "pdf",
                title: "Local recycling guide",
            },
        ],
    },
    SeedCourse {
        id: "3f7cbd2e-9c31-4f7a-8e3a-0a1f5f1c9b02",
        title: "Home Energy Efficiency",
        description: "Cutting household energy use room by room.",
        materials: &[
            SeedMaterial {
                id: "8a40b7a8-1f2d-4f6e-9c3b-2d5e7f8a9003",
                ordinal: 0,
                kind: "video",
                title: "Reading your meter",
            },
            SeedMaterial {
                id: "8a40b7a8-1f2d-4f6e-9c3b-2d5e7f8a9004",
                ordinal: 1,
                kind: "article",
                title: "Insulation on a budget",
            },
            SeedMaterial {
                id: "8a40b7a8-1f2d-4f6e-9c3b-2d5e7f8a9005",
                ordinal: 2,
                kind: "pdf",
                title: "Appliance efficiency checklist",
            },
        ],
    },
];

const STUDENTS: &[(&str, &str)] = &[
    ("c2a1e6d4-0b3f-4c5a-9d8e-1f2a3b4c5d01", "Ada Park"),
    ("c2a1e6d4-0b3f-4c5a-9d8e-1f2a3b4c5d02", "Ben Osei"),
    ("c2a1e6d4-0b3f-4c5a-9d8e-1f2a3b4c5d03", "Carla Mendes"),
];

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let pool = db::connect().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    for (id, name) in STUDENTS {
        sqlx::query(
            "INSERT INTO users (id, name, role) VALUES ($1, $2, 'student') ON CONFLICT DO NOTHING",
        )
        .bind(Uuid::parse_str(id)?)
        .bind(name)
        .execute(&pool)
        .await?;
    }

    for course in COURSES {
        let course_id = Uuid::parse_str(course.id)?;
        sqlx::query(
            "INSERT INTO courses (id, title, description) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(course_id)
        .bind(course.title)
        .bind(course.description)
        .execute(&pool)
        .await?;

        for m in course.materials {
            sqlx::query(
                r#"
                INSERT INTO materials (id, course_id, ordinal, kind, title)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(Uuid::parse_str(m.id)?)
            .bind(course_id)
            .bind(m.ordinal)
            .bind(m.kind)
            .bind(m.title)
            .execute(&pool)
            .await?;
        }
    }

    println!(
        "seeded {} students and {} courses",
        STUDENTS.len(),
        COURSES.len()
    );
    Ok(())
}
