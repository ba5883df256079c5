//! PostgreSQL-backed flow session store.
//!
//! Lets several gateway replicas share in-progress logins. Consumption uses
//! `DELETE ... RETURNING`, so concurrent callbacks for one state token race
//! on a single row and at most one of them sees it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tollgate_access::{FlowSession, StateToken};
use tollgate_core::Result;

use super::flow_store::{FlowStore, FlowStoreError};

/// Row type for flow session queries.
#[derive(FromRow)]
struct FlowRow {
    state: String,
    redirect: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl FlowRow {
    fn try_into_flow(self) -> std::result::Result<FlowSession, FlowStoreError> {
        if self.expires_at < self.created_at {
            return Err(FlowStoreError::Corrupt {
                details: format!("flow '{}' expires before it was created", self.state),
            });
        }
        Ok(FlowSession::with_all_fields(
            StateToken::new(self.state),
            self.redirect,
            self.created_at,
            self.expires_at - self.created_at,
        ))
    }
}

fn unavailable(e: sqlx::Error) -> FlowStoreError {
    FlowStoreError::Unavailable {
        details: e.to_string(),
    }
}

/// Repository for flow sessions.
#[derive(Clone)]
pub struct PgFlowStore {
    pool: PgPool,
}

impl PgFlowStore {
    /// Creates a new flow store on an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlowStore for PgFlowStore {
    async fn insert(&self, flow: FlowSession) -> Result<(), FlowStoreError> {
        sqlx::query(
            r#"
            INSERT INTO flow_sessions (state, redirect, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (state) DO UPDATE
            SET redirect = EXCLUDED.redirect,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(flow.state().as_str())
        .bind(flow.redirect())
        .bind(flow.created_at())
        .bind(flow.expires_at())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }

    async fn take(&self, state: &StateToken) -> Result<Option<FlowSession>, FlowStoreError> {
        let row: Option<FlowRow> = sqlx::query_as(
            r#"
            DELETE FROM flow_sessions
            WHERE state = $1
            RETURNING state, redirect, created_at, expires_at
            "#,
        )
        .bind(state.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        match row {
            Some(r) => {
                let flow = r.try_into_flow()?;
                Ok((!flow.is_expired()).then_some(flow))
            }
            None => Ok(None),
        }
    }

    async fn purge_expired(&self) -> Result<u64, FlowStoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM flow_sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}
