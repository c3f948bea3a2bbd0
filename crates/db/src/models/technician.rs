use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTechnician {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateTechnician {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub active: Option<bool>,
}

impl Technician {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Technician>(
            r#"SELECT id, name, email, phone, active, created_at, updated_at
               FROM technicians
               ORDER BY name ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Technician>(
            r#"SELECT id, name, email, phone, active, created_at, updated_at
               FROM technicians
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTechnician,
        technician_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Technician>(
            r#"INSERT INTO technicians (id, name, email, phone, active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, 1, $5, $5)
               RETURNING id, name, email, phone, active, created_at, updated_at"#,
        )
        .bind(technician_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        name: String,
        email: Option<String>,
        phone: Option<String>,
        active: bool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Technician>(
            r#"UPDATE technicians
               SET name = $2, email = $3, phone = $4, active = $5, updated_at = $6
               WHERE id = $1
               RETURNING id, name, email, phone, active, created_at, updated_at"#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(phone)
        .bind(active)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM technicians WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
