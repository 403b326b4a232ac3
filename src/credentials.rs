// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Credential validation, duplicate detection, and storage.
//!
//! Failures never cross this boundary as errors: every fallible operation
//! returns a result value with a human-readable message, and callers branch on
//! the flag.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::api::{AccountingService, ApiError, RemoteDatabase, TokenGrant};
use crate::models::Credential;

/// Outcome of validating a token against the service's database listing.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: String,
    pub primary_database: Option<RemoteDatabase>,
    pub databases: Vec<RemoteDatabase>,
}

impl ValidationResult {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
            primary_database: None,
            databases: Vec::new(),
        }
    }
}

/// Validate a credential by listing the databases it can reach. A blank token
/// is rejected before any network call is made.
pub fn validate_token(
    service: &dyn AccountingService,
    token: &str,
    secret: Option<&str>,
) -> ValidationResult {
    if token.trim().is_empty() {
        return ValidationResult::invalid("API token must not be empty");
    }
    match service.list_databases(token, secret) {
        Ok(databases) => {
            if databases.is_empty() {
                return ValidationResult::invalid(
                    "Credential accepted but no databases are accessible with it",
                );
            }
            tracing::info!(count = databases.len(), "credential validated");
            ValidationResult {
                is_valid: true,
                message: format!("Token valid; {} database(s) accessible", databases.len()),
                primary_database: databases.first().cloned(),
                databases,
            }
        }
        Err(ApiError::Transport(e)) => {
            ValidationResult::invalid(format!("Could not reach the accounting service: {}", e))
        }
        Err(ApiError::Status(code)) => {
            ValidationResult::invalid(format!("Accounting service rejected the token (HTTP {})", code))
        }
        Err(ApiError::Malformed(e)) => {
            ValidationResult::invalid(format!("Unexpected response from the accounting service: {}", e))
        }
    }
}

/// An existing token together with the entity that holds it.
#[derive(Debug, Clone)]
pub struct TokenOwner {
    pub entity_name: String,
    pub api_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub owner_name: Option<String>,
}

/// Check a candidate token against all stored tokens. The candidate is
/// trimmed before comparison but otherwise compared byte-exact; tokens are
/// case-sensitive opaque strings. During an edit, a candidate equal to the
/// record's own unchanged token never flags.
pub fn detect_duplicate(
    candidate: &str,
    existing: &[TokenOwner],
    own_token: Option<&str>,
) -> DuplicateCheck {
    let candidate = candidate.trim();
    if let Some(own) = own_token {
        if candidate == own {
            return DuplicateCheck {
                is_duplicate: false,
                owner_name: None,
            };
        }
    }
    for owner in existing {
        if owner.api_token == candidate {
            return DuplicateCheck {
                is_duplicate: true,
                owner_name: Some(owner.entity_name.clone()),
            };
        }
    }
    DuplicateCheck {
        is_duplicate: false,
        owner_name: None,
    }
}

/// Deterministic construction of the OAuth authorize URL. No side effects.
pub fn build_authorization_url(authorize_endpoint: &str, client_id: &str, redirect_uri: &str, scope: &str) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&scope={}",
        authorize_endpoint,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeResult {
    pub success: bool,
    pub message: String,
    #[serde(skip)]
    pub grant: Option<TokenGrant>,
}

/// Run the OAuth code exchange through the trusted intermediary. Nothing is
/// persisted here; on failure there is no partial token state to roll back.
pub fn exchange_code(service: &dyn AccountingService, code: &str) -> ExchangeResult {
    match service.exchange_code(code) {
        Ok(grant) => ExchangeResult {
            success: true,
            message: "Code exchanged".to_string(),
            grant: Some(grant),
        },
        Err(e) => ExchangeResult {
            success: false,
            message: format!("Code exchange failed: {}", e),
            grant: None,
        },
    }
}

/// Explicit credential persistence with a load/save/clear lifecycle. Owned by
/// the caller and passed in; there is no ambient process-wide token state.
pub struct CredentialStore<'c> {
    conn: &'c Connection,
}

impl<'c> CredentialStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn load(&self, entity_id: i64) -> Result<Option<Credential>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, api_token, secret_key, access_token, refresh_token, expires_at
             FROM credentials WHERE entity_id=?1",
        )?;
        let cred = stmt
            .query_row(params![entity_id], |r| {
                Ok(Credential {
                    entity_id: r.get(0)?,
                    api_token: r.get(1)?,
                    secret_key: r.get(2)?,
                    access_token: r.get(3)?,
                    refresh_token: r.get(4)?,
                    expires_at: r.get(5)?,
                })
            })
            .optional()?;
        Ok(cred)
    }

    /// Upsert the entity's credential. The UNIQUE index on the token value is
    /// the backstop for the application-level duplicate check: two concurrent
    /// saves cannot both land the same token.
    pub fn save(&self, cred: &Credential) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO credentials(entity_id, api_token, secret_key, access_token, refresh_token, expires_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
                 ON CONFLICT(entity_id) DO UPDATE SET
                     api_token=excluded.api_token,
                     secret_key=excluded.secret_key,
                     access_token=excluded.access_token,
                     refresh_token=excluded.refresh_token,
                     expires_at=excluded.expires_at,
                     updated_at=datetime('now')",
                params![
                    cred.entity_id,
                    cred.api_token,
                    cred.secret_key,
                    cred.access_token,
                    cred.refresh_token,
                    cred.expires_at,
                ],
            )
            .context("Credential token is already in use by another entity")?;
        Ok(())
    }

    /// Persist an exchanged token grant onto an existing credential in one
    /// statement, so a failure leaves no partial token state.
    pub fn store_grant(&self, entity_id: i64, grant: &TokenGrant) -> Result<()> {
        let n = self.conn.execute(
            "UPDATE credentials SET access_token=?2, refresh_token=?3, expires_at=?4,
                 updated_at=datetime('now')
             WHERE entity_id=?1",
            params![entity_id, grant.access_token, grant.refresh_token, grant.expires_at],
        )?;
        if n == 0 {
            anyhow::bail!("No credential on record for entity {}", entity_id);
        }
        Ok(())
    }

    pub fn clear(&self, entity_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM credentials WHERE entity_id=?1", params![entity_id])?;
        Ok(())
    }

    /// All stored tokens with their owning entity's display name, as input to
    /// [`detect_duplicate`].
    pub fn list_tokens(&self) -> Result<Vec<TokenOwner>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.name, c.api_token FROM credentials c JOIN entities e ON c.entity_id=e.id",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(TokenOwner {
                entity_name: r.get(0)?,
                api_token: r.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// True when the entity has no usable (present and unexpired) access token.
pub fn access_token_expired(cred: &Credential, now: DateTime<Utc>) -> bool {
    cred.access_token.is_none() || cred.is_expired(now)
}
