use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::customer::CustomerSummary;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "case_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaseStatus {
    /// Awaiting scheduling; the pending set is exactly the cases in this status.
    #[default]
    Requested,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl CaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Completed | CaseStatus::Cancelled)
    }
}

#[derive(
    Debug,
    Clone,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "case_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CasePriority {
    #[default]
    Normal,
    Urgent,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Case {
    pub id: Uuid,
    pub customer_id: Uuid, // Foreign key to Customer
    pub technician_id: Option<Uuid>, // Foreign key to Technician, set once scheduled
    pub title: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub pest_type: Option<String>,
    pub status: CaseStatus,
    pub priority: CasePriority,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending case joined with its customer's display fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PendingCaseView {
    #[serde(flatten)]
    #[ts(flatten)]
    pub case: Case,
    pub customer: CustomerSummary,
}

impl std::ops::Deref for PendingCaseView {
    type Target = Case;
    fn deref(&self) -> &Self::Target {
        &self.case
    }
}

impl std::ops::DerefMut for PendingCaseView {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.case
    }
}

#[derive(Debug, FromRow)]
struct PendingCaseRow {
    id: Uuid,
    customer_id: Uuid,
    technician_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    address: Option<String>,
    pest_type: Option<String>,
    status: CaseStatus,
    priority: CasePriority,
    scheduled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    company_name: String,
    contact_person: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    organization_number: Option<String>,
}

impl From<PendingCaseRow> for PendingCaseView {
    fn from(row: PendingCaseRow) -> Self {
        Self {
            case: Case {
                id: row.id,
                customer_id: row.customer_id,
                technician_id: row.technician_id,
                title: row.title,
                description: row.description,
                address: row.address,
                pest_type: row.pest_type,
                status: row.status,
                priority: row.priority,
                scheduled_at: row.scheduled_at,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            customer: CustomerSummary {
                company_name: row.company_name,
                contact_person: row.contact_person,
                contact_email: row.contact_email,
                contact_phone: row.contact_phone,
                organization_number: row.organization_number,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCase {
    pub customer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub pest_type: Option<String>,
    pub priority: Option<CasePriority>,
}

impl CreateCase {
    pub fn from_title(customer_id: Uuid, title: String) -> Self {
        Self {
            customer_id,
            title,
            description: None,
            address: None,
            pest_type: None,
            priority: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateCase {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub pest_type: Option<String>,
    pub priority: Option<CasePriority>,
}

impl Case {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Case>(
            r#"SELECT id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at
               FROM cases
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(
        pool: &SqlitePool,
        status: Option<CaseStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        match status {
            Some(status) => {
                sqlx::query_as::<_, Case>(
                    r#"SELECT id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at
                       FROM cases
                       WHERE status = $1
                       ORDER BY created_at DESC"#,
                )
                .bind(status)
                .fetch_all(pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Case>(
                    r#"SELECT id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at
                       FROM cases
                       ORDER BY created_at DESC"#,
                )
                .fetch_all(pool)
                .await
            }
        }
    }

    /// All requested cases joined with their customers, urgent first and
    /// oldest first within a priority.
    pub async fn find_pending_with_customers(
        pool: &SqlitePool,
    ) -> Result<Vec<PendingCaseView>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PendingCaseRow>(
            r#"SELECT
                 c.id, c.customer_id, c.technician_id, c.title, c.description, c.address,
                 c.pest_type, c.status, c.priority, c.scheduled_at, c.created_at, c.updated_at,
                 cu.company_name, cu.contact_person, cu.contact_email, cu.contact_phone,
                 cu.organization_number
               FROM cases c
               JOIN customers cu ON cu.id = c.customer_id
               WHERE c.status = $1
               ORDER BY c.priority DESC, c.created_at ASC"#,
        )
        .bind(CaseStatus::Requested)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(PendingCaseView::from).collect())
    }

    pub async fn count_for_customer(
        pool: &SqlitePool,
        customer_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cases WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn count_for_technician(
        pool: &SqlitePool,
        technician_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cases WHERE technician_id = $1")
            .bind(technician_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateCase,
        case_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let priority = data.priority.clone().unwrap_or_default();
        let now = Utc::now();
        sqlx::query_as::<_, Case>(
            r#"INSERT INTO cases (id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at)
               VALUES ($1, $2, NULL, $3, $4, $5, $6, $7, $8, NULL, $9, $9)
               RETURNING id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at"#,
        )
        .bind(case_id)
        .bind(data.customer_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.address)
        .bind(&data.pest_type)
        .bind(CaseStatus::Requested)
        .bind(priority)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update_details(
        pool: &SqlitePool,
        id: Uuid,
        title: String,
        description: Option<String>,
        address: Option<String>,
        pest_type: Option<String>,
        priority: CasePriority,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Case>(
            r#"UPDATE cases
               SET title = $2, description = $3, address = $4, pest_type = $5, priority = $6, updated_at = $7
               WHERE id = $1
               RETURNING id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(address)
        .bind(pest_type)
        .bind(priority)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    /// Move a case to a new status together with its technician assignment.
    /// Scheduling sets both; reopening clears them.
    pub async fn set_assignment(
        pool: &SqlitePool,
        id: Uuid,
        status: CaseStatus,
        technician_id: Option<Uuid>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Case>(
            r#"UPDATE cases
               SET status = $2, technician_id = $3, scheduled_at = $4, updated_at = $5
               WHERE id = $1
               RETURNING id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(status)
        .bind(technician_id)
        .bind(scheduled_at)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: CaseStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Case>(
            r#"UPDATE cases
               SET status = $2, updated_at = $3
               WHERE id = $1
               RETURNING id, customer_id, technician_id, title, description, address, pest_type, status, priority, scheduled_at, created_at, updated_at"#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cases WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
