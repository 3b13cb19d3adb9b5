//! Event repository implementation

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::event::{Eligibility, Event, EventKind, EventStatus, FormField, NewEvent, Variant};
use crate::utils::errors::FelicityError;

const EVENT_COLUMNS: &str = "id, organizer_id, name, description, kind, eligibility, tags, \
    registration_deadline, start_time, end_time, registration_limit, status_override, \
    registration_fee, form_fields, form_locked, purchase_limit, requires_payment_approval, \
    version, created_at, updated_at";

#[derive(FromRow)]
struct EventRow {
    id: i64,
    organizer_id: i64,
    name: String,
    description: Option<String>,
    kind: EventKind,
    eligibility: Eligibility,
    tags: Vec<String>,
    registration_deadline: DateTime<Utc>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    registration_limit: Option<i32>,
    status_override: EventStatus,
    registration_fee: i64,
    form_fields: Json<Vec<FormField>>,
    form_locked: bool,
    purchase_limit: Option<i32>,
    requires_payment_approval: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self, variants: Vec<Variant>) -> Event {
        Event {
            id: self.id,
            organizer_id: self.organizer_id,
            name: self.name,
            description: self.description,
            kind: self.kind,
            eligibility: self.eligibility,
            tags: self.tags,
            registration_deadline: self.registration_deadline,
            start_time: self.start_time,
            end_time: self.end_time,
            registration_limit: self.registration_limit,
            status_override: self.status_override,
            registration_fee: self.registration_fee,
            form_fields: self.form_fields.0,
            form_locked: self.form_locked,
            variants,
            purchase_limit: self.purchase_limit,
            requires_payment_approval: self.requires_payment_approval,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct VariantRow {
    event_id: i64,
    id: Uuid,
    size: String,
    color: String,
    stock: i32,
    price: i64,
}

#[derive(Clone, Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new draft event together with its variants
    pub async fn create(&self, event: NewEvent) -> Result<Event, FelicityError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO events (organizer_id, name, description, kind, eligibility, tags,
                registration_deadline, start_time, end_time, registration_limit, status_override,
                registration_fee, form_fields, purchase_limit, requires_payment_approval,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'draft', $11, $12, $13, $14, $15, $15)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.organizer_id)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.kind)
        .bind(event.eligibility)
        .bind(&event.tags)
        .bind(event.registration_deadline)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.registration_limit)
        .bind(event.registration_fee)
        .bind(Json(&event.form_fields))
        .bind(event.purchase_limit)
        .bind(event.requires_payment_approval)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        insert_variants(&mut *tx, row.id, &event.variants).await?;
        tx.commit().await?;

        Ok(row.into_event(event.variants))
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, FelicityError> {
        let row = sqlx::query_as::<_, EventRow>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut variants = load_variants(&self.pool, &[row.id]).await?;
                let own = variants.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_event(own)))
            }
            None => Ok(None),
        }
    }

    /// Version-checked update; `form_locked` is owned by the ledger and never written here
    pub async fn update(&self, event: &Event, replace_variants: bool) -> Result<Event, FelicityError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            UPDATE events
            SET name = $3,
                description = $4,
                kind = $5,
                eligibility = $6,
                tags = $7,
                registration_deadline = $8,
                start_time = $9,
                end_time = $10,
                registration_limit = $11,
                status_override = $12,
                registration_fee = $13,
                form_fields = $14,
                purchase_limit = $15,
                requires_payment_approval = $16,
                version = version + 1,
                updated_at = $17
            WHERE id = $1 AND version = $2
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.id)
        .bind(event.version)
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.kind)
        .bind(event.eligibility)
        .bind(&event.tags)
        .bind(event.registration_deadline)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.registration_limit)
        .bind(event.status_override)
        .bind(event.registration_fee)
        .bind(Json(&event.form_fields))
        .bind(event.purchase_limit)
        .bind(event.requires_payment_approval)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
                .bind(event.id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                FelicityError::StaleEvent { event_id: event.id }
            } else {
                FelicityError::EventNotFound { event_id: event.id }
            });
        };

        if replace_variants {
            sqlx::query("DELETE FROM event_variants WHERE event_id = $1")
                .bind(event.id)
                .execute(&mut *tx)
                .await?;
            insert_variants(&mut *tx, event.id, &event.variants).await?;
        }
        let mut variants = load_variants(&mut *tx, &[event.id]).await?;
        tx.commit().await?;

        Ok(row.into_event(variants.remove(&event.id).unwrap_or_default()))
    }

    /// Delete a draft event, cascading to its registrations
    pub async fn delete_draft(&self, id: i64) -> Result<(), FelicityError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<EventStatus> =
            sqlx::query_scalar("SELECT status_override FROM events WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        match status {
            None => return Err(FelicityError::EventNotFound { event_id: id }),
            Some(EventStatus::Draft) => {}
            Some(status) => return Err(FelicityError::InvalidPhase { status, operation: "delete event" }),
        }

        sqlx::query("DELETE FROM registrations WHERE event_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Get events created by an organizer
    pub async fn list_by_organizer(&self, organizer_id: i64) -> Result<Vec<Event>, FelicityError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE organizer_id = $1 ORDER BY start_time ASC"
        ))
        .bind(organizer_id)
        .fetch_all(&self.pool)
        .await?;

        self.with_variants(rows).await
    }

    /// Get every event that has left draft
    pub async fn list_visible(&self) -> Result<Vec<Event>, FelicityError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE status_override <> 'draft' ORDER BY start_time ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.with_variants(rows).await
    }

    /// Get events that still hold pending orders
    pub async fn list_with_pending_orders(&self) -> Result<Vec<Event>, FelicityError> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events e
            WHERE EXISTS (
                SELECT 1 FROM registrations r
                WHERE r.event_id = e.id AND r.payment_status = 'pending'
            )
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        self.with_variants(rows).await
    }

    async fn with_variants(&self, rows: Vec<EventRow>) -> Result<Vec<Event>, FelicityError> {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut variants = load_variants(&self.pool, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let own = variants.remove(&row.id).unwrap_or_default();
                row.into_event(own)
            })
            .collect())
    }
}

async fn insert_variants(conn: &mut PgConnection, event_id: i64, variants: &[Variant]) -> Result<(), FelicityError> {
    for (position, variant) in variants.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO event_variants (event_id, id, position, size, color, stock, price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event_id)
        .bind(variant.id)
        .bind(position as i32)
        .bind(&variant.size)
        .bind(&variant.color)
        .bind(variant.stock)
        .bind(variant.price)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_variants<'e>(
    executor: impl PgExecutor<'e>,
    event_ids: &[i64],
) -> Result<HashMap<i64, Vec<Variant>>, FelicityError> {
    let rows = sqlx::query_as::<_, VariantRow>(
        "SELECT event_id, id, size, color, stock, price FROM event_variants WHERE event_id = ANY($1) ORDER BY event_id, position",
    )
    .bind(event_ids.to_vec())
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<i64, Vec<Variant>> = HashMap::new();
    for row in rows {
        grouped.entry(row.event_id).or_default().push(Variant {
            id: row.id,
            size: row.size,
            color: row.color,
            stock: row.stock,
            price: row.price,
        });
    }
    Ok(grouped)
}
