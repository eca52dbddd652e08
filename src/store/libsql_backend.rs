//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases; the in-memory constructor
//! is what the tests use.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use crate::error::DatabaseError;
use crate::event::Identity;
use crate::session::{FlowData, Sensitive, Session, Step};
use crate::store::migrations;
use crate::store::traits::{Database, LinkedAccount};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_session(row: &libsql::Row) -> Result<Session, DatabaseError> {
    let identity: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("sessions.identity: {e}")))?;
    let step_str: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("sessions.step: {e}")))?;
    let language_str: Option<String> = row.get(2).ok();
    let data_str: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("sessions.data: {e}")))?;
    let version: i64 = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("sessions.version: {e}")))?;
    let created_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("sessions.created_at: {e}")))?;
    let updated_str: String = row
        .get(6)
        .map_err(|e| DatabaseError::Query(format!("sessions.updated_at: {e}")))?;

    // An unknown step id means the row predates (or outlived) the current
    // step set; surfaced as a serialization error so the dispatcher can
    // run its corrupted-session fallback.
    let step = Step::parse(&step_str).ok_or_else(|| {
        DatabaseError::Serialization(format!("unknown step id: {step_str}"))
    })?;

    let language = language_str
        .as_deref()
        .and_then(|s| serde_json::from_value(serde_json::Value::String(s.to_string())).ok());

    let data: FlowData = serde_json::from_str(&data_str)
        .map_err(|e| DatabaseError::Serialization(format!("sessions.data: {e}")))?;

    Ok(Session {
        identity: Identity::from_channel_address(&identity),
        step,
        language,
        data,
        version,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn language_to_str(session: &Session) -> Result<Option<String>, DatabaseError> {
    match &session.language {
        None => Ok(None),
        Some(lang) => match serde_json::to_value(lang)
            .map_err(|e| DatabaseError::Serialization(format!("session.language: {e}")))?
        {
            serde_json::Value::String(s) => Ok(Some(s)),
            other => Err(DatabaseError::Serialization(format!(
                "session.language serialized to non-string: {other}"
            ))),
        },
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn get_session(&self, identity: &Identity) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT identity, step, language, data, version, created_at, updated_at
                 FROM sessions WHERE identity = ?1",
                params![identity.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?
        {
            Some(row) => Ok(Some(row_to_session(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_session(&self, session: &Session) -> Result<i64, DatabaseError> {
        let data = serde_json::to_string(&session.data)
            .map_err(|e| DatabaseError::Serialization(format!("session.data: {e}")))?;
        let language = language_to_str(session)?;
        let now = Utc::now().to_rfc3339();
        let new_version = session.version + 1;

        // CAS update first: only wins if the stored version is unchanged.
        let updated = self
            .conn()
            .execute(
                "UPDATE sessions
                 SET step = ?1, language = ?2, data = ?3, version = ?4, updated_at = ?5
                 WHERE identity = ?6 AND version = ?7",
                params![
                    session.step.as_str(),
                    language.clone(),
                    data.clone(),
                    new_version,
                    now.clone(),
                    session.identity.as_str(),
                    session.version
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_session update: {e}")))?;

        if updated > 0 {
            return Ok(new_version);
        }

        // No row matched: either the row is missing (fresh insert) or a
        // concurrent write bumped the version.
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO sessions (identity, step, language, data, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(identity) DO NOTHING",
                params![
                    session.identity.as_str(),
                    session.step.as_str(),
                    language,
                    data,
                    new_version,
                    session.created_at.to_rfc3339(),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_session insert: {e}")))?;

        if inserted > 0 {
            Ok(new_version)
        } else {
            Err(DatabaseError::VersionConflict {
                identity: session.identity.to_string(),
                expected: session.version,
            })
        }
    }

    async fn reset_session(&self, identity: &Identity) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM sessions WHERE identity = ?1",
                params![identity.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("reset_session: {e}")))?;
        Ok(())
    }

    // ── Linked accounts ─────────────────────────────────────────────

    async fn get_linked_account(
        &self,
        identity: &Identity,
    ) -> Result<Option<LinkedAccount>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT identity, email, login_secret, crm_user_id, created_at, updated_at
                 FROM linked_accounts WHERE identity = ?1",
                params![identity.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_linked_account: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_linked_account: {e}")))?
        else {
            return Ok(None);
        };

        let identity_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("linked_accounts.identity: {e}")))?;
        let email: String = row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("linked_accounts.email: {e}")))?;
        let secret: String = row
            .get(2)
            .map_err(|e| DatabaseError::Query(format!("linked_accounts.login_secret: {e}")))?;
        let crm_user_id: String = row
            .get(3)
            .map_err(|e| DatabaseError::Query(format!("linked_accounts.crm_user_id: {e}")))?;
        let created_str: String = row
            .get(4)
            .map_err(|e| DatabaseError::Query(format!("linked_accounts.created_at: {e}")))?;
        let updated_str: String = row
            .get(5)
            .map_err(|e| DatabaseError::Query(format!("linked_accounts.updated_at: {e}")))?;

        Ok(Some(LinkedAccount {
            identity: Identity::from_channel_address(&identity_str),
            email,
            login_secret: Sensitive::new(secret),
            crm_user_id,
            created_at: parse_datetime(&created_str),
            updated_at: parse_datetime(&updated_str),
        }))
    }

    async fn upsert_linked_account(&self, account: &LinkedAccount) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO linked_accounts
                     (identity, email, login_secret, crm_user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(identity) DO UPDATE SET
                     email = excluded.email,
                     login_secret = excluded.login_secret,
                     crm_user_id = excluded.crm_user_id,
                     updated_at = excluded.updated_at",
                params![
                    account.identity.as_str(),
                    account.email.as_str(),
                    account.login_secret.expose(),
                    account.crm_user_id.as_str(),
                    account.created_at.to_rfc3339(),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_linked_account: {e}")))?;
        Ok(())
    }

    async fn delete_linked_account(&self, identity: &Identity) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM linked_accounts WHERE identity = ?1",
                params![identity.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_linked_account: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FlowData;

    fn identity() -> Identity {
        Identity::from_channel_address("whatsapp:+9613334444")
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.get_session(&identity()).await.unwrap().is_none());

        let mut session = Session::bootstrap(identity());
        session.step = Step::SignupEmail;
        session.signup_mut().first_name = Some("Rami".to_string());

        let v1 = db.upsert_session(&session).await.unwrap();
        assert_eq!(v1, 1);

        let loaded = db.get_session(&identity()).await.unwrap().unwrap();
        assert_eq!(loaded.step, Step::SignupEmail);
        assert_eq!(loaded.version, 1);
        match &loaded.data {
            FlowData::Signup(draft) => {
                assert_eq!(draft.first_name.as_deref(), Some("Rami"));
            }
            other => panic!("wrong flow: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let db = LibSqlBackend::new_memory().await.unwrap();

        let session = Session::bootstrap(identity());
        db.upsert_session(&session).await.unwrap();

        // First writer reloads and wins.
        let mut fresh = db.get_session(&identity()).await.unwrap().unwrap();
        fresh.step = Step::MainMenu;
        db.upsert_session(&fresh).await.unwrap();

        // Second writer still holds version 1 — must lose.
        let mut stale = Session::bootstrap(identity());
        stale.version = 1;
        let err = db.upsert_session(&stale).await.unwrap_err();
        assert!(matches!(err, DatabaseError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn reset_deletes_the_row() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        let session = Session::bootstrap(identity());
        db.upsert_session(&session).await.unwrap();

        db.reset_session(&identity()).await.unwrap();
        assert!(db.get_session(&identity()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn linked_account_roundtrip_and_delete() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        assert!(db.get_linked_account(&identity()).await.unwrap().is_none());

        let account = LinkedAccount {
            identity: identity(),
            email: "rami@example.com".to_string(),
            login_secret: Sensitive::new("Abc123!"),
            crm_user_id: "u-9".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        db.upsert_linked_account(&account).await.unwrap();

        let loaded = db.get_linked_account(&identity()).await.unwrap().unwrap();
        assert_eq!(loaded.email, "rami@example.com");
        assert_eq!(loaded.login_secret.expose(), "Abc123!");

        // Upsert is idempotent by identity.
        db.upsert_linked_account(&account).await.unwrap();

        db.delete_linked_account(&identity()).await.unwrap();
        assert!(db.get_linked_account(&identity()).await.unwrap().is_none());
    }
}
