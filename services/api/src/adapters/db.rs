//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ValentineStore` port from the core crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use valentine_core::domain::{Code, NewValentine, RecipientName, Reply, SenderName, ValentineRecord};
use valentine_core::ports::{PortError, PortResult, ValentineStore};

/// Postgres error code for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

const SELECT_COLUMNS: &str = "id, code, sender_name, recipient_name, reply, created_at, replied_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ValentineStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Brings the `valentines` table up to date. Run once at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ValentineRow {
    id: Uuid,
    code: String,
    sender_name: String,
    recipient_name: Option<String>,
    reply: Option<String>,
    created_at: DateTime<Utc>,
    replied_at: Option<DateTime<Utc>>,
}

impl ValentineRow {
    fn to_domain(self) -> PortResult<ValentineRecord> {
        let id = self.id;
        let corrupt = |field: &str| PortError::Unexpected(format!("Row {} has an invalid {}", id, field));
        let code = Code::parse(&self.code).ok_or_else(|| corrupt("code"))?;
        let sender_name = SenderName::parse(&self.sender_name).map_err(|_| corrupt("sender_name"))?;
        let recipient_name = RecipientName::parse_optional(self.recipient_name.as_deref())
            .map_err(|_| corrupt("recipient_name"))?;
        let reply = self
            .reply
            .as_deref()
            .map(str::parse::<Reply>)
            .transpose()
            .map_err(|_| corrupt("reply"))?;

        Ok(ValentineRecord {
            id: self.id,
            code,
            sender_name,
            recipient_name,
            reply,
            created_at: self.created_at,
            replied_at: self.replied_at,
        })
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `ValentineStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ValentineStore for DbAdapter {
    async fn find_by_code(&self, code: &Code) -> PortResult<Option<ValentineRecord>> {
        let query = format!("SELECT {} FROM valentines WHERE code = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, ValentineRow>(&query)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        row.map(ValentineRow::to_domain).transpose()
    }

    async fn insert(&self, valentine: NewValentine) -> PortResult<ValentineRecord> {
        let query = format!(
            "INSERT INTO valentines (id, code, sender_name, recipient_name) VALUES ($1, $2, $3, $4) RETURNING {}",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, ValentineRow>(&query)
            .bind(Uuid::new_v4())
            .bind(valentine.code.as_str())
            .bind(valentine.sender_name.as_str())
            .bind(valentine.recipient_name.as_ref().map(|r| r.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                let duplicate = matches!(
                    &e,
                    sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
                );
                if duplicate {
                    PortError::Conflict(format!("Code {} is already in use", valentine.code))
                } else {
                    unexpected(e)
                }
            })?;
        row.to_domain()
    }

    async fn record_reply(&self, code: &Code, reply: Reply) -> PortResult<ValentineRecord> {
        // The `reply IS NULL` guard makes the first reply win, even across racing writers.
        let query = format!(
            "UPDATE valentines SET reply = $1, replied_at = now() WHERE code = $2 AND reply IS NULL RETURNING {}",
            SELECT_COLUMNS
        );
        let updated = sqlx::query_as::<_, ValentineRow>(&query)
            .bind(reply.as_str())
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        match updated {
            Some(row) => row.to_domain(),
            None => match self.find_by_code(code).await? {
                Some(_) => Err(PortError::AlreadyAnswered(format!(
                    "Valentine {} already has a reply",
                    code
                ))),
                None => Err(PortError::NotFound(format!("Valentine {} not found", code))),
            },
        }
    }
}
