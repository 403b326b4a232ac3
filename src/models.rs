// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One accounting scope (tenant/company/database) in the external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    /// Database id of this scope in the external service, chosen at onboarding.
    pub external_db_id: Option<String>,
}

/// The delegated access credential for one entity. Exactly one per entity;
/// the API token value is unique across all entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub entity_id: i64,
    pub api_token: String,
    pub secret_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// A credential with no recorded expiry is treated as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now > exp,
            None => true,
        }
    }
}

/// A general-ledger account mirrored from the external service.
/// Rows are written only by the sync engine, never by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub entity_id: i64,
    pub external_id: String,
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub active: bool,
}

/// A classification reference mirrored from the external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub entity_id: i64,
    pub external_id: String,
    pub name: String,
}

/// A named allocation plan for one entity and one period (YYYY-MM).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub entity_id: i64,
    pub name: String,
    pub period: String, // YYYY-MM
}

/// One account's allocated amount inside a budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetItem {
    pub id: i64,
    pub budget_id: i64,
    pub account_id: i64,
    pub allocated: Decimal,
    pub description: Option<String>,
    pub realized_snapshot: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }
}

/// One append-only ledger entry per sync attempt. Never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncHistoryRecord {
    pub id: i64,
    pub entity_id: i64,
    pub sync_type: String,
    pub status: SyncStatus,
    pub records_synced: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}
