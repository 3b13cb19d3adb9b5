//! Registration repository implementation
//!
//! All contended writes happen inside one transaction that first locks the
//! parent event row, so capacity counts and duplicate checks for an event
//! are serialized. Stock moves only through a conditional decrement.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::models::registration::{
    AttendanceMark, AttendanceOverride, FormAnswers, InsertGuard, NewRegistration, OrderDecision,
    PaymentStatus, Registration,
};
use crate::utils::errors::FelicityError;

const REGISTRATION_COLUMNS: &str = "id, event_id, participant_id, ticket_id, form_answers, \
    variant_id, quantity, payment_status, payment_proof_url, attended, attended_at, \
    manual_override, override_reason, override_by, overridden_at, created_at, updated_at";

const PAIR_CONSTRAINT: &str = "registrations_event_participant_key";

#[derive(FromRow)]
struct RegistrationRow {
    id: i64,
    event_id: i64,
    participant_id: i64,
    ticket_id: Option<String>,
    form_answers: Json<FormAnswers>,
    variant_id: Option<Uuid>,
    quantity: Option<i32>,
    payment_status: PaymentStatus,
    payment_proof_url: Option<String>,
    attended: bool,
    attended_at: Option<DateTime<Utc>>,
    manual_override: bool,
    override_reason: Option<String>,
    override_by: Option<i64>,
    overridden_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        let attendance_override = row.manual_override.then(|| AttendanceOverride {
            reason: row.override_reason.unwrap_or_default(),
            actor_id: row.override_by.unwrap_or_default(),
            overridden_at: row.overridden_at.unwrap_or(row.updated_at),
        });
        Registration {
            id: row.id,
            event_id: row.event_id,
            participant_id: row.participant_id,
            ticket_id: row.ticket_id,
            form_answers: row.form_answers.0,
            variant_id: row.variant_id,
            quantity: row.quantity,
            payment_status: row.payment_status,
            payment_proof_url: row.payment_proof_url,
            attended: row.attended,
            attended_at: row.attended_at,
            attendance_override,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a registration or order under its storage guard
    pub async fn insert(&self, registration: NewRegistration, guard: InsertGuard) -> Result<Registration, FelicityError> {
        let event_id = registration.event_id;
        let participant_id = registration.participant_id;
        let mut tx = self.pool.begin().await?;

        let limit: Option<Option<i32>> =
            sqlx::query_scalar("SELECT registration_limit FROM events WHERE id = $1 FOR UPDATE")
                .bind(event_id)
                .fetch_optional(&mut *tx)
                .await?;
        let limit = limit.ok_or(FelicityError::EventNotFound { event_id })?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM registrations WHERE event_id = $1 AND participant_id = $2)",
        )
        .bind(event_id)
        .bind(participant_id)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            return Err(FelicityError::DuplicateRegistration { event_id, participant_id });
        }

        match guard {
            InsertGuard::Capacity => {
                if let Some(limit) = limit {
                    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = $1")
                        .bind(event_id)
                        .fetch_one(&mut *tx)
                        .await?;
                    if taken >= i64::from(limit) {
                        return Err(FelicityError::CapacityExceeded { limit });
                    }
                }
            }
            InsertGuard::DecrementStock => {
                let line = registration
                    .order
                    .ok_or_else(|| FelicityError::InvalidInput("Order line missing".to_string()))?;
                decrement_stock(&mut tx, event_id, line.variant_id, line.quantity).await?;
            }
            InsertGuard::Deferred => {}
        }

        let now = Utc::now();
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            r#"
            INSERT INTO registrations (event_id, participant_id, ticket_id, form_answers,
                variant_id, quantity, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(event_id)
        .bind(participant_id)
        .bind(&registration.ticket_id)
        .bind(Json(&registration.form_answers))
        .bind(registration.order.map(|line| line.variant_id))
        .bind(registration.order.map(|line| line.quantity))
        .bind(registration.payment_status)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_pair_violation(e, event_id, participant_id))?;

        if guard == InsertGuard::Capacity {
            sqlx::query("UPDATE events SET form_locked = TRUE WHERE id = $1 AND NOT form_locked")
                .bind(event_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(row.into())
    }

    /// Find registration by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Registration>, FelicityError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Find registration by ticket identifier
    pub async fn find_by_ticket(&self, ticket_id: &str) -> Result<Option<Registration>, FelicityError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE ticket_id = $1"
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get event registrations
    pub async fn list_for_event(&self, event_id: i64) -> Result<Vec<Registration>, FelicityError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE event_id = $1 ORDER BY created_at ASC"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get registrations held by a participant
    pub async fn list_for_participant(&self, participant_id: i64) -> Result<Vec<Registration>, FelicityError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE participant_id = $1 ORDER BY created_at DESC"
        ))
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Units ordered by a participant for an event, rejected orders excluded
    pub async fn ordered_quantity(&self, event_id: i64, participant_id: i64) -> Result<i64, FelicityError> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(quantity)::BIGINT FROM registrations
            WHERE event_id = $1 AND participant_id = $2 AND payment_status <> 'rejected'
            "#,
        )
        .bind(event_id)
        .bind(participant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Attach a payment proof to a pending order
    pub async fn attach_payment_proof(&self, id: i64, proof_url: &str) -> Result<Registration, FelicityError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            r#"
            UPDATE registrations
            SET payment_proof_url = $2, updated_at = $3
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(proof_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let current = self
                    .find_by_id(id)
                    .await?
                    .ok_or(FelicityError::RegistrationNotFound { registration_id: id })?;
                Err(FelicityError::transition(current.payment_status, "proof attached"))
            }
        }
    }

    /// Approve or reject a pending order
    pub async fn decide(&self, id: i64, decision: OrderDecision) -> Result<Registration, FelicityError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(FelicityError::RegistrationNotFound { registration_id: id })?;

        let (target, ticket_id) = match decision {
            OrderDecision::Approve { ticket_id } => (PaymentStatus::Approved, Some(ticket_id)),
            OrderDecision::Reject => (PaymentStatus::Rejected, None),
        };
        if current.payment_status != PaymentStatus::Pending {
            return Err(FelicityError::transition(current.payment_status, target));
        }

        if target == PaymentStatus::Approved {
            let (variant_id, quantity) = current
                .variant_id
                .zip(current.quantity)
                .ok_or_else(|| FelicityError::InvalidInput("Registration is not an order".to_string()))?;
            decrement_stock(&mut tx, current.event_id, variant_id, quantity).await?;
        }

        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            r#"
            UPDATE registrations
            SET payment_status = $2, ticket_id = COALESCE($3, ticket_id), updated_at = $4
            WHERE id = $1
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(target)
        .bind(ticket_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Reject every pending order of an event
    pub async fn reject_pending(&self, event_id: i64) -> Result<u64, FelicityError> {
        let result = sqlx::query(
            r#"
            UPDATE registrations
            SET payment_status = 'rejected', updated_at = $2
            WHERE event_id = $1 AND payment_status = 'pending'
            "#,
        )
        .bind(event_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// First scan flips attendance; later scans return the stored record
    pub async fn mark_attended(&self, id: i64, at: DateTime<Utc>) -> Result<AttendanceMark, FelicityError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            r#"
            UPDATE registrations
            SET attended = TRUE, attended_at = $2, updated_at = $2
            WHERE id = $1 AND attended = FALSE
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(AttendanceMark::Marked(row.into())),
            None => self
                .find_by_id(id)
                .await?
                .map(AttendanceMark::AlreadyAttended)
                .ok_or(FelicityError::RegistrationNotFound { registration_id: id }),
        }
    }

    /// Audited attendance overwrite
    pub async fn override_attendance(
        &self,
        id: i64,
        attended: bool,
        audit: AttendanceOverride,
    ) -> Result<Registration, FelicityError> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            r#"
            UPDATE registrations
            SET attended = $2,
                attended_at = CASE WHEN $2 THEN $5 ELSE NULL END,
                manual_override = TRUE,
                override_reason = $3,
                override_by = $4,
                overridden_at = $5,
                updated_at = $5
            WHERE id = $1
            RETURNING {REGISTRATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(attended)
        .bind(&audit.reason)
        .bind(audit.actor_id)
        .bind(audit.overridden_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Into::into)
            .ok_or(FelicityError::RegistrationNotFound { registration_id: id })
    }
}

/// "Decrement by N only if stock >= N"
async fn decrement_stock(
    conn: &mut PgConnection,
    event_id: i64,
    variant_id: Uuid,
    quantity: i32,
) -> Result<(), FelicityError> {
    let result = sqlx::query(
        "UPDATE event_variants SET stock = stock - $3 WHERE event_id = $1 AND id = $2 AND stock >= $3",
    )
    .bind(event_id)
    .bind(variant_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM event_variants WHERE event_id = $1 AND id = $2)")
        .bind(event_id)
        .bind(variant_id)
        .fetch_one(&mut *conn)
        .await?;
    Err(if exists {
        FelicityError::InsufficientStock { variant_id, requested: quantity }
    } else {
        FelicityError::VariantNotFound { variant_id }
    })
}

fn map_pair_violation(err: sqlx::Error, event_id: i64, participant_id: i64) -> FelicityError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() && db.constraint() == Some(PAIR_CONSTRAINT) {
            return FelicityError::DuplicateRegistration { event_id, participant_id };
        }
    }
    err.into()
}
