//! Unified `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::event::Identity;
use crate::session::{Sensitive, Session};

/// The per-identity CRM linkage. Created on a successful login, deleted on
/// logout. The greeting recompute reads it to tell known users apart from
/// first-time visitors, and the gateway client reads it to re-obtain a
/// bearer token when one is missing or expired.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    pub identity: Identity,
    pub email: String,
    pub login_secret: Sensitive,
    pub crm_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Backend-agnostic persistence trait covering sessions and linked accounts.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Load the session for an identity, if one exists.
    async fn get_session(&self, identity: &Identity) -> Result<Option<Session>, DatabaseError>;

    /// Idempotent create-or-update keyed by identity, guarded by
    /// compare-and-swap on the session's `version`.
    ///
    /// `session.version` must equal the stored version (0 for a fresh
    /// insert). Returns the new stored version on success;
    /// `DatabaseError::VersionConflict` when a concurrent write won.
    async fn upsert_session(&self, session: &Session) -> Result<i64, DatabaseError>;

    /// Delete the session row entirely; the next inbound event bootstraps
    /// a fresh one at language selection.
    async fn reset_session(&self, identity: &Identity) -> Result<(), DatabaseError>;

    // ── Linked accounts ─────────────────────────────────────────────

    async fn get_linked_account(
        &self,
        identity: &Identity,
    ) -> Result<Option<LinkedAccount>, DatabaseError>;

    /// Create-or-replace the linkage for an identity.
    async fn upsert_linked_account(&self, account: &LinkedAccount) -> Result<(), DatabaseError>;

    /// Remove the linkage (logout).
    async fn delete_linked_account(&self, identity: &Identity) -> Result<(), DatabaseError>;
}
