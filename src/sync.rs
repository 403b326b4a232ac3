// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bulk and incremental synchronization of reference data from the external
//! accounting service into the local store.
//!
//! Every attempt lands exactly one append-only row in `sync_history`. When a
//! sync fails, writing that failure row is best-effort: a secondary write
//! failure is logged and swallowed so it never masks the primary error.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::api::{AccountEvent, AccountingService, RemoteAccount, RemoteCategory};
use crate::credentials::{access_token_expired, CredentialStore};
use crate::models::SyncStatus;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub synced: i64,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn ok(synced: i64) -> Self {
        Self {
            success: true,
            synced,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            synced: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySyncResult {
    pub entity_id: i64,
    pub success: bool,
    pub synced: i64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiSyncReport {
    pub results: Vec<EntitySyncResult>,
    pub total_synced: i64,
}

fn record_history(
    conn: &Connection,
    entity_id: i64,
    sync_type: &str,
    status: SyncStatus,
    records_synced: i64,
    error_message: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_history(entity_id, sync_type, status, records_synced, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![entity_id, sync_type, status.as_str(), records_synced, error_message],
    )
    .context("Append sync history")?;
    Ok(())
}

/// History write on a failure path. Swallowed on error so the caller still
/// sees the primary sync error.
fn record_failure_best_effort(conn: &Connection, entity_id: i64, sync_type: &str, error: &str) {
    if let Err(e) = record_history(conn, entity_id, sync_type, SyncStatus::Failed, 0, Some(error)) {
        tracing::warn!(entity_id, sync_type, "could not record failed sync attempt: {}", e);
    }
}

fn upsert_category(conn: &Connection, entity_id: i64, cat: &RemoteCategory) -> Result<()> {
    conn.execute(
        "INSERT INTO categories(entity_id, external_id, name)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(entity_id, external_id) DO UPDATE SET
             name=excluded.name,
             updated_at=datetime('now')",
        params![entity_id, cat.id, cat.name],
    )?;
    Ok(())
}

fn upsert_account(conn: &Connection, entity_id: i64, acc: &RemoteAccount) -> Result<()> {
    conn.execute(
        "INSERT INTO accounts(entity_id, external_id, code, name, account_type, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(entity_id, external_id) DO UPDATE SET
             code=excluded.code,
             name=excluded.name,
             account_type=excluded.account_type,
             active=excluded.active,
             updated_at=datetime('now')",
        params![entity_id, acc.id, acc.code, acc.name, acc.account_type, acc.active],
    )?;
    Ok(())
}

/// Upsert a batch of categories keyed by (entity_id, external_id).
pub fn sync_categories(
    conn: &Connection,
    entity_id: i64,
    categories: &[RemoteCategory],
) -> SyncOutcome {
    let run = || -> Result<i64> {
        for cat in categories {
            upsert_category(conn, entity_id, cat)?;
        }
        Ok(categories.len() as i64)
    };
    match run() {
        Ok(n) => {
            tracing::info!(entity_id, synced = n, "category sync complete");
            if let Err(e) = record_history(conn, entity_id, "categories", SyncStatus::Success, n, None)
            {
                return SyncOutcome {
                    success: false,
                    synced: n,
                    error: Some(format!("Categories synced but history write failed: {}", e)),
                };
            }
            SyncOutcome::ok(n)
        }
        Err(e) => {
            let msg = format!("Category sync failed: {:#}", e);
            tracing::error!(entity_id, "{}", msg);
            record_failure_best_effort(conn, entity_id, "categories", &msg);
            SyncOutcome::failed(msg)
        }
    }
}

/// Full paged resync of the chart of accounts through the bulk channel.
/// Fails fast without a present, unexpired access token.
pub fn sync_chart_of_accounts(
    conn: &Connection,
    service: &dyn AccountingService,
    entity_id: i64,
) -> SyncOutcome {
    let store = CredentialStore::new(conn);
    let cred = match store.load(entity_id) {
        Ok(Some(c)) => c,
        Ok(None) => {
            let msg = format!("No credential on record for entity {}", entity_id);
            record_failure_best_effort(conn, entity_id, "chart_of_accounts", &msg);
            return SyncOutcome::failed(msg);
        }
        Err(e) => {
            let msg = format!("Could not load credential: {:#}", e);
            record_failure_best_effort(conn, entity_id, "chart_of_accounts", &msg);
            return SyncOutcome::failed(msg);
        }
    };
    let token = match cred.access_token.clone() {
        Some(t) if !access_token_expired(&cred, Utc::now()) => t,
        _ => {
            let msg = "Access token is missing or expired; re-authorize before syncing".to_string();
            record_failure_best_effort(conn, entity_id, "chart_of_accounts", &msg);
            return SyncOutcome::failed(msg);
        }
    };

    let run = || -> Result<i64> {
        let mut synced = 0i64;
        let mut page = 1u32;
        loop {
            let batch = service
                .list_accounts(&token, page, DEFAULT_PAGE_SIZE)
                .with_context(|| format!("List accounts page {}", page))?;
            for acc in &batch.accounts {
                upsert_account(conn, entity_id, acc)?;
                synced += 1;
            }
            if page >= batch.page_count {
                break;
            }
            page += 1;
        }
        Ok(synced)
    };
    match run() {
        Ok(n) => {
            tracing::info!(entity_id, synced = n, "chart of accounts sync complete");
            if let Err(e) =
                record_history(conn, entity_id, "chart_of_accounts", SyncStatus::Success, n, None)
            {
                return SyncOutcome {
                    success: false,
                    synced: n,
                    error: Some(format!("Accounts synced but history write failed: {}", e)),
                };
            }
            SyncOutcome::ok(n)
        }
        Err(e) => {
            let msg = format!("Chart of accounts sync failed: {:#}", e);
            tracing::error!(entity_id, "{}", msg);
            record_failure_best_effort(conn, entity_id, "chart_of_accounts", &msg);
            SyncOutcome::failed(msg)
        }
    }
}

/// Near-real-time single-record update through the incremental channel.
/// Opens a scoped session first; a session failure short-circuits.
pub fn sync_single_account(
    conn: &Connection,
    service: &dyn AccountingService,
    entity_id: i64,
    account_external_id: &str,
) -> SyncOutcome {
    let run = || -> Result<()> {
        let store = CredentialStore::new(conn);
        let cred = store
            .load(entity_id)?
            .with_context(|| format!("No credential on record for entity {}", entity_id))?;
        let db_id: Option<String> = conn
            .query_row(
                "SELECT external_db_id FROM entities WHERE id=?1",
                params![entity_id],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        let db_id = db_id
            .with_context(|| format!("Entity {} has no external database id", entity_id))?;
        let session = service
            .open_session(&cred.api_token, &db_id)
            .map_err(|e| anyhow::anyhow!("failed to open session: {}", e))?;
        let event = AccountEvent {
            event: "account:update".to_string(),
            id: account_external_id.to_string(),
            entity_id: db_id,
            host: session.host,
            session: session.session,
            access_token: cred.access_token.unwrap_or_default(),
        };
        service
            .push_account_event(&event)
            .map_err(|e| anyhow::anyhow!("failed to push account event: {}", e))?;
        Ok(())
    };
    match run() {
        Ok(()) => {
            tracing::info!(entity_id, account = account_external_id, "single account sync sent");
            if let Err(e) = record_history(conn, entity_id, "account", SyncStatus::Success, 1, None)
            {
                return SyncOutcome {
                    success: false,
                    synced: 1,
                    error: Some(format!("Account synced but history write failed: {}", e)),
                };
            }
            SyncOutcome::ok(1)
        }
        Err(e) => {
            let msg = format!("Single account sync failed: {:#}", e);
            tracing::error!(entity_id, "{}", msg);
            record_failure_best_effort(conn, entity_id, "account", &msg);
            SyncOutcome::failed(msg)
        }
    }
}

/// Resync the chart of accounts for several entities, strictly one at a time.
/// Sequencing bounds how fast we consume the external service's rate budget.
/// One entity's failure is recorded in its result entry and never aborts the
/// remaining entities.
pub fn sync_multiple_entities(
    conn: &Connection,
    service: &dyn AccountingService,
    entity_ids: &[i64],
) -> MultiSyncReport {
    let mut results = Vec::with_capacity(entity_ids.len());
    let mut total_synced = 0i64;
    for &entity_id in entity_ids {
        let outcome = sync_chart_of_accounts(conn, service, entity_id);
        if outcome.success {
            total_synced += outcome.synced;
        }
        results.push(EntitySyncResult {
            entity_id,
            success: outcome.success,
            synced: outcome.synced,
            error: outcome.error,
        });
    }
    MultiSyncReport {
        results,
        total_synced,
    }
}
