//! User repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::user::{CreateUserRequest, Role, User};
use crate::utils::errors::FelicityError;

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, category, webhook_url, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, request: CreateUserRequest) -> Result<User, FelicityError> {
        let now = Utc::now();
        let email = request.email.clone();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, first_name, last_name, role, category, webhook_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(request.email)
        .bind(request.first_name)
        .bind(request.last_name)
        .bind(request.role)
        .bind(request.category)
        .bind(request.webhook_url)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_email_violation(e, &email))?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, FelicityError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Delete an organizer and everything hanging off their events
    pub async fn delete_organizer(&self, organizer_id: i64) -> Result<(), FelicityError> {
        let mut tx = self.pool.begin().await?;

        let role: Option<Role> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
            .bind(organizer_id)
            .fetch_optional(&mut *tx)
            .await?;
        if role != Some(Role::Organizer) {
            return Err(FelicityError::UserNotFound { user_id: organizer_id });
        }

        sqlx::query("DELETE FROM registrations WHERE event_id IN (SELECT id FROM events WHERE organizer_id = $1)")
            .bind(organizer_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM forum_messages WHERE author_id = $1 OR event_id IN (SELECT id FROM events WHERE organizer_id = $1)",
        )
        .bind(organizer_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM events WHERE organizer_id = $1")
            .bind(organizer_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(organizer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn map_email_violation(err: sqlx::Error, email: &str) -> FelicityError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return FelicityError::InvalidInput(format!("Email {} is already in use", email));
        }
    }
    err.into()
}
