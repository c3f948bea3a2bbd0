//! Case lifecycle operations. Every successful write publishes a change
//! feed event carrying the before/after row images.

use chrono::{DateTime, Utc};
use db::models::{
    case::{Case, CaseStatus, CreateCase, UpdateCase},
    customer::Customer,
    technician::Technician,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::events::{CaseEvent, CaseEvents};

#[derive(Debug, Error)]
pub enum CaseServiceError {
    #[error("case {0} not found")]
    CaseNotFound(Uuid),
    #[error("customer {0} not found")]
    CustomerNotFound(Uuid),
    #[error("technician {0} not found")]
    TechnicianNotFound(Uuid),
    #[error("technician {0} is not active")]
    TechnicianInactive(Uuid),
    #[error("case {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: CaseStatus,
        to: CaseStatus,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct CaseService;

impl CaseService {
    pub async fn create(
        pool: &SqlitePool,
        events: &CaseEvents,
        data: CreateCase,
    ) -> Result<Case, CaseServiceError> {
        if Customer::find_by_id(pool, data.customer_id).await?.is_none() {
            return Err(CaseServiceError::CustomerNotFound(data.customer_id));
        }

        let case = Case::create(pool, &data, Uuid::new_v4()).await?;
        info!(case_id = %case.id, customer_id = %case.customer_id, "created case");
        events.publish(CaseEvent::inserted(case.clone()));
        Ok(case)
    }

    /// Assign a technician and move the case to scheduled. Rescheduling an
    /// already scheduled case is allowed.
    pub async fn schedule(
        pool: &SqlitePool,
        events: &CaseEvents,
        id: Uuid,
        technician_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Case, CaseServiceError> {
        let before = Self::require(pool, id).await?;
        if !matches!(
            before.status,
            CaseStatus::Requested | CaseStatus::Scheduled
        ) {
            return Err(CaseServiceError::InvalidTransition {
                id,
                from: before.status,
                to: CaseStatus::Scheduled,
            });
        }

        let technician = Technician::find_by_id(pool, technician_id)
            .await?
            .ok_or(CaseServiceError::TechnicianNotFound(technician_id))?;
        if !technician.active {
            return Err(CaseServiceError::TechnicianInactive(technician_id));
        }

        let after = Case::set_assignment(
            pool,
            id,
            CaseStatus::Scheduled,
            Some(technician_id),
            Some(scheduled_at),
        )
        .await?;
        info!(case_id = %id, technician_id = %technician_id, "scheduled case");
        events.publish(CaseEvent::updated(before, after.clone()));
        Ok(after)
    }

    pub async fn start(
        pool: &SqlitePool,
        events: &CaseEvents,
        id: Uuid,
    ) -> Result<Case, CaseServiceError> {
        let before = Self::require(pool, id).await?;
        if before.status != CaseStatus::Scheduled {
            return Err(CaseServiceError::InvalidTransition {
                id,
                from: before.status,
                to: CaseStatus::InProgress,
            });
        }

        let after = Case::update_status(pool, id, CaseStatus::InProgress).await?;
        info!(case_id = %id, "started case");
        events.publish(CaseEvent::updated(before, after.clone()));
        Ok(after)
    }

    pub async fn complete(
        pool: &SqlitePool,
        events: &CaseEvents,
        id: Uuid,
    ) -> Result<Case, CaseServiceError> {
        let before = Self::require(pool, id).await?;
        if before.status != CaseStatus::InProgress {
            return Err(CaseServiceError::InvalidTransition {
                id,
                from: before.status,
                to: CaseStatus::Completed,
            });
        }

        let after = Case::update_status(pool, id, CaseStatus::Completed).await?;
        info!(case_id = %id, "completed case");
        events.publish(CaseEvent::updated(before, after.clone()));
        Ok(after)
    }

    pub async fn cancel(
        pool: &SqlitePool,
        events: &CaseEvents,
        id: Uuid,
    ) -> Result<Case, CaseServiceError> {
        let before = Self::require(pool, id).await?;
        if before.status.is_terminal() {
            return Err(CaseServiceError::InvalidTransition {
                id,
                from: before.status,
                to: CaseStatus::Cancelled,
            });
        }

        let after = Case::update_status(pool, id, CaseStatus::Cancelled).await?;
        info!(case_id = %id, "cancelled case");
        events.publish(CaseEvent::updated(before, after.clone()));
        Ok(after)
    }

    /// Put a scheduled or cancelled case back into the pending queue,
    /// clearing any technician assignment.
    pub async fn reopen(
        pool: &SqlitePool,
        events: &CaseEvents,
        id: Uuid,
    ) -> Result<Case, CaseServiceError> {
        let before = Self::require(pool, id).await?;
        if !matches!(
            before.status,
            CaseStatus::Scheduled | CaseStatus::Cancelled
        ) {
            return Err(CaseServiceError::InvalidTransition {
                id,
                from: before.status,
                to: CaseStatus::Requested,
            });
        }

        let after = Case::set_assignment(pool, id, CaseStatus::Requested, None, None).await?;
        info!(case_id = %id, "reopened case");
        events.publish(CaseEvent::updated(before, after.clone()));
        Ok(after)
    }

    /// Update case details; fields left unset keep their current value.
    pub async fn update(
        pool: &SqlitePool,
        events: &CaseEvents,
        id: Uuid,
        data: UpdateCase,
    ) -> Result<Case, CaseServiceError> {
        let before = Self::require(pool, id).await?;
        let title = data.title.unwrap_or_else(|| before.title.clone());
        let description = data.description.or_else(|| before.description.clone());
        let address = data.address.or_else(|| before.address.clone());
        let pest_type = data.pest_type.or_else(|| before.pest_type.clone());
        let priority = data.priority.unwrap_or_else(|| before.priority.clone());

        let after =
            Case::update_details(pool, id, title, description, address, pest_type, priority)
                .await?;
        events.publish(CaseEvent::updated(before, after.clone()));
        Ok(after)
    }

    pub async fn delete(
        pool: &SqlitePool,
        events: &CaseEvents,
        id: Uuid,
    ) -> Result<(), CaseServiceError> {
        let before = Self::require(pool, id).await?;
        Case::delete(pool, id).await?;
        info!(case_id = %id, "deleted case");
        events.publish(CaseEvent::deleted(before));
        Ok(())
    }

    async fn require(pool: &SqlitePool, id: Uuid) -> Result<Case, CaseServiceError> {
        Case::find_by_id(pool, id)
            .await?
            .ok_or(CaseServiceError::CaseNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use db::{
        DBService,
        models::{case::CasePriority, customer::CreateCustomer, technician::CreateTechnician},
    };

    use super::*;
    use crate::services::events::CaseOp;

    async fn setup() -> (SqlitePool, CaseEvents) {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        (pool, CaseEvents::new(16))
    }

    async fn seed_customer(pool: &SqlitePool) -> Uuid {
        let data = CreateCustomer {
            company_name: "Harbor Hotels AS".to_string(),
            contact_person: None,
            contact_email: None,
            contact_phone: None,
            organization_number: None,
        };
        Customer::create(pool, &data, Uuid::new_v4())
            .await
            .unwrap()
            .id
    }

    async fn seed_technician(pool: &SqlitePool, active: bool) -> Uuid {
        let data = CreateTechnician {
            name: "Kari Olsen".to_string(),
            email: None,
            phone: None,
        };
        let technician = Technician::create(pool, &data, Uuid::new_v4())
            .await
            .unwrap();
        if !active {
            Technician::update(pool, technician.id, technician.name, None, None, false)
                .await
                .unwrap();
        }
        technician.id
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_customer() {
        let (pool, events) = setup().await;
        let result = CaseService::create(
            &pool,
            &events,
            CreateCase::from_title(Uuid::new_v4(), "Ants".to_string()),
        )
        .await;
        assert!(matches!(
            result,
            Err(CaseServiceError::CustomerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_publishes_insert_event() {
        let (pool, events) = setup().await;
        let customer_id = seed_customer(&pool).await;
        let mut rx = events.subscribe();

        let case = CaseService::create(
            &pool,
            &events,
            CreateCase::from_title(customer_id, "Ants".to_string()),
        )
        .await
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, CaseOp::Insert);
        assert_eq!(event.after.unwrap().id, case.id);
    }

    #[tokio::test]
    async fn test_schedule_assigns_technician() {
        let (pool, events) = setup().await;
        let customer_id = seed_customer(&pool).await;
        let technician_id = seed_technician(&pool, true).await;
        let case = CaseService::create(
            &pool,
            &events,
            CreateCase::from_title(customer_id, "Wasps".to_string()),
        )
        .await
        .unwrap();
        let mut rx = events.subscribe();

        let when = Utc::now() + Duration::days(2);
        let scheduled = CaseService::schedule(&pool, &events, case.id, technician_id, when)
            .await
            .unwrap();

        assert_eq!(scheduled.status, CaseStatus::Scheduled);
        assert_eq!(scheduled.technician_id, Some(technician_id));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, CaseOp::Update);
        assert_eq!(event.before.unwrap().status, CaseStatus::Requested);
        assert_eq!(event.after.unwrap().status, CaseStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_schedule_rejects_inactive_technician() {
        let (pool, events) = setup().await;
        let customer_id = seed_customer(&pool).await;
        let technician_id = seed_technician(&pool, false).await;
        let case = CaseService::create(
            &pool,
            &events,
            CreateCase::from_title(customer_id, "Wasps".to_string()),
        )
        .await
        .unwrap();

        let result =
            CaseService::schedule(&pool, &events, case.id, technician_id, Utc::now()).await;
        assert!(matches!(
            result,
            Err(CaseServiceError::TechnicianInactive(_))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_transitions_enforced() {
        let (pool, events) = setup().await;
        let customer_id = seed_customer(&pool).await;
        let technician_id = seed_technician(&pool, true).await;
        let case = CaseService::create(
            &pool,
            &events,
            CreateCase::from_title(customer_id, "Mice".to_string()),
        )
        .await
        .unwrap();

        // Cannot start a case that was never scheduled.
        let result = CaseService::start(&pool, &events, case.id).await;
        assert!(matches!(
            result,
            Err(CaseServiceError::InvalidTransition { .. })
        ));

        CaseService::schedule(&pool, &events, case.id, technician_id, Utc::now())
            .await
            .unwrap();
        CaseService::start(&pool, &events, case.id).await.unwrap();
        let completed = CaseService::complete(&pool, &events, case.id)
            .await
            .unwrap();
        assert_eq!(completed.status, CaseStatus::Completed);

        // Completed is terminal.
        let result = CaseService::cancel(&pool, &events, case.id).await;
        assert!(matches!(
            result,
            Err(CaseServiceError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_reopen_clears_assignment() {
        let (pool, events) = setup().await;
        let customer_id = seed_customer(&pool).await;
        let technician_id = seed_technician(&pool, true).await;
        let case = CaseService::create(
            &pool,
            &events,
            CreateCase::from_title(customer_id, "Mice".to_string()),
        )
        .await
        .unwrap();
        CaseService::schedule(&pool, &events, case.id, technician_id, Utc::now())
            .await
            .unwrap();

        let reopened = CaseService::reopen(&pool, &events, case.id).await.unwrap();
        assert_eq!(reopened.status, CaseStatus::Requested);
        assert!(reopened.technician_id.is_none());
        assert!(reopened.scheduled_at.is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let (pool, events) = setup().await;
        let customer_id = seed_customer(&pool).await;
        let mut data = CreateCase::from_title(customer_id, "Mice".to_string());
        data.description = Some("Droppings near the loading dock".to_string());
        let case = CaseService::create(&pool, &events, data).await.unwrap();

        let updated = CaseService::update(
            &pool,
            &events,
            case.id,
            UpdateCase {
                title: Some("Mice in basement".to_string()),
                description: None,
                address: None,
                pest_type: None,
                priority: Some(CasePriority::Urgent),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Mice in basement");
        assert_eq!(
            updated.description.as_deref(),
            Some("Droppings near the loading dock")
        );
        assert_eq!(updated.priority, CasePriority::Urgent);
    }

    #[tokio::test]
    async fn test_delete_publishes_before_image() {
        let (pool, events) = setup().await;
        let customer_id = seed_customer(&pool).await;
        let case = CaseService::create(
            &pool,
            &events,
            CreateCase::from_title(customer_id, "Moths".to_string()),
        )
        .await
        .unwrap();
        let mut rx = events.subscribe();

        CaseService::delete(&pool, &events, case.id).await.unwrap();
        assert!(Case::find_by_id(&pool, case.id).await.unwrap().is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, CaseOp::Delete);
        assert_eq!(event.before.unwrap().id, case.id);
        assert!(event.after.is_none());
    }
}
