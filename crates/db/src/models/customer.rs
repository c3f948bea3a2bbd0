use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Customer {
    pub id: Uuid,
    pub company_name: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub organization_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display projection joined onto pending cases. Never persisted on the
/// case row itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CustomerSummary {
    pub company_name: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub organization_number: Option<String>,
}

impl From<Customer> for CustomerSummary {
    fn from(customer: Customer) -> Self {
        Self {
            company_name: customer.company_name,
            contact_person: customer.contact_person,
            contact_email: customer.contact_email,
            contact_phone: customer.contact_phone,
            organization_number: customer.organization_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCustomer {
    pub company_name: String,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub organization_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateCustomer {
    pub company_name: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub organization_number: Option<String>,
}

impl Customer {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"SELECT id, company_name, contact_person, contact_email, contact_phone, organization_number, created_at, updated_at
               FROM customers
               ORDER BY company_name ASC"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"SELECT id, company_name, contact_person, contact_email, contact_phone, organization_number, created_at, updated_at
               FROM customers
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateCustomer,
        customer_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Customer>(
            r#"INSERT INTO customers (id, company_name, contact_person, contact_email, contact_phone, organization_number, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
               RETURNING id, company_name, contact_person, contact_email, contact_phone, organization_number, created_at, updated_at"#,
        )
        .bind(customer_id)
        .bind(&data.company_name)
        .bind(&data.contact_person)
        .bind(&data.contact_email)
        .bind(&data.contact_phone)
        .bind(&data.organization_number)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        company_name: String,
        contact_person: Option<String>,
        contact_email: Option<String>,
        contact_phone: Option<String>,
        organization_number: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"UPDATE customers
               SET company_name = $2, contact_person = $3, contact_email = $4, contact_phone = $5, organization_number = $6, updated_at = $7
               WHERE id = $1
               RETURNING id, company_name, contact_person, contact_email, contact_phone, organization_number, created_at, updated_at"#,
        )
        .bind(id)
        .bind(company_name)
        .bind(contact_person)
        .bind(contact_email)
        .bind(contact_phone)
        .bind(organization_number)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
