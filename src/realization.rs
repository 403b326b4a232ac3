// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Budget-vs-realized reconciliation: per-account records, grouping by
//! (budget, period), and entity-wide summaries.
//!
//! The ON_TRACK/OVER_BUDGET boundary is inclusive at every level: realized
//! exactly equal to allocated is ON_TRACK. Percentages are computed against
//! the allocated amount (or the group total) and are 0 when the denominator
//! is 0.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RealizationStatus {
    #[serde(rename = "ON_TRACK")]
    OnTrack,
    #[serde(rename = "OVER_BUDGET")]
    OverBudget,
}

impl RealizationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RealizationStatus::OnTrack => "ON_TRACK",
            RealizationStatus::OverBudget => "OVER_BUDGET",
        }
    }
}

fn status_for(allocated: Decimal, realized: Decimal) -> RealizationStatus {
    if realized <= allocated {
        RealizationStatus::OnTrack
    } else {
        RealizationStatus::OverBudget
    }
}

fn pct(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator > Decimal::ZERO {
        numerator / denominator * Decimal::from(100)
    } else {
        Decimal::ZERO
    }
}

/// One account's budget-vs-realized figures. Derived on demand; never the
/// source of truth.
#[derive(Debug, Clone, Serialize)]
pub struct RealizationRecord {
    pub budget_name: String,
    pub period: String,
    pub account_code: String,
    pub account_name: String,
    pub account_type: String,
    pub allocated: Decimal,
    pub realized: Decimal,
    pub variance: Decimal,
    pub variance_percentage: Decimal,
    pub status: RealizationStatus,
}

/// Supplies the actual posted amount for an account and period.
pub trait RealizationSource {
    fn realized(&self, entity_id: i64, account_id: i64, period: &str) -> Result<Decimal>;
}

/// Realized amounts from the locally cached feed table. Accounts with no
/// cached row realize 0.
pub struct CachedRealizations<'c> {
    conn: &'c Connection,
}

impl<'c> CachedRealizations<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Ingest one feed row (upsert keyed by entity, account, period).
    pub fn record(
        &self,
        entity_id: i64,
        account_id: i64,
        period: &str,
        amount: Decimal,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO realizations(entity_id, account_id, period, amount)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(entity_id, account_id, period) DO UPDATE SET amount=excluded.amount",
            params![entity_id, account_id, period, amount.to_string()],
        )?;
        Ok(())
    }
}

impl RealizationSource for CachedRealizations<'_> {
    fn realized(&self, entity_id: i64, account_id: i64, period: &str) -> Result<Decimal> {
        let amount: Option<String> = self
            .conn
            .query_row(
                "SELECT amount FROM realizations WHERE entity_id=?1 AND account_id=?2 AND period=?3",
                params![entity_id, account_id, period],
                |r| r.get(0),
            )
            .optional()?;
        match amount {
            Some(s) => s
                .parse::<Decimal>()
                .with_context(|| format!("Invalid realized amount '{}' in cache", s)),
            None => Ok(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RealizationFilter {
    pub period: Option<String>,
    pub account_type: Option<String>,
    pub budget_name: Option<String>,
}

/// Join budget items with their accounts and the realized-amount source for
/// one entity, applying the optional filters.
pub fn compute_realization(
    conn: &Connection,
    source: &dyn RealizationSource,
    entity_id: i64,
    filter: &RealizationFilter,
) -> Result<Vec<RealizationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT b.name, b.period, a.id, a.code, a.name, a.account_type, bi.allocated
         FROM budget_items bi
         JOIN budgets b ON bi.budget_id=b.id
         JOIN accounts a ON bi.account_id=a.id
         WHERE b.entity_id=?1
           AND (?2 IS NULL OR b.period=?2)
           AND (?3 IS NULL OR a.account_type=?3)
           AND (?4 IS NULL OR b.name=?4)
         ORDER BY b.period, b.name, a.code",
    )?;
    let rows = stmt.query_map(
        params![entity_id, filter.period, filter.account_type, filter.budget_name],
        |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
            ))
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        let (budget_name, period, account_id, code, account_name, account_type, allocated_s) = row?;
        let allocated = allocated_s
            .parse::<Decimal>()
            .with_context(|| format!("Invalid allocated amount '{}' in budget items", allocated_s))?;
        let realized = source.realized(entity_id, account_id, &period)?;
        let variance = allocated - realized;
        out.push(RealizationRecord {
            budget_name,
            period,
            account_code: code,
            account_name,
            account_type,
            allocated,
            realized,
            variance,
            variance_percentage: pct(variance, allocated),
            status: status_for(allocated, realized),
        });
    }
    Ok(out)
}

/// The grouped shape handed unmodified to presentation and export consumers.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedRealization {
    pub budget_name: String,
    pub period: String,
    pub accounts: Vec<RealizationRecord>,
    pub total_budget: Decimal,
    pub total_realisasi: Decimal,
    pub total_variance: Decimal,
    pub variance_percentage: Decimal,
    pub overall_status: RealizationStatus,
}

/// Strict partition of records by (budget name, period): every record lands
/// in exactly one group, and the union of the groups' account lists is the
/// input set. Group order follows first appearance in the input.
pub fn group_by_budget_and_period(records: Vec<RealizationRecord>) -> Vec<GroupedRealization> {
    let mut groups: Vec<GroupedRealization> = Vec::new();
    for rec in records {
        let pos = groups
            .iter()
            .position(|g| g.budget_name == rec.budget_name && g.period == rec.period);
        let idx = match pos {
            Some(i) => i,
            None => {
                groups.push(GroupedRealization {
                    budget_name: rec.budget_name.clone(),
                    period: rec.period.clone(),
                    accounts: Vec::new(),
                    total_budget: Decimal::ZERO,
                    total_realisasi: Decimal::ZERO,
                    total_variance: Decimal::ZERO,
                    variance_percentage: Decimal::ZERO,
                    overall_status: RealizationStatus::OnTrack,
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[idx];
        group.total_budget += rec.allocated;
        group.total_realisasi += rec.realized;
        group.accounts.push(rec);
    }
    for g in &mut groups {
        g.total_variance = g.total_budget - g.total_realisasi;
        g.variance_percentage = pct(g.total_variance, g.total_budget);
        g.overall_status = status_for(g.total_budget, g.total_realisasi);
    }
    groups
}

/// Entity-wide totals across all filtered records.
#[derive(Debug, Clone, Serialize)]
pub struct RealizationSummary {
    pub entity_name: String,
    pub total_accounts: usize,
    pub total_budgets: usize,
    pub total_budget: Decimal,
    pub total_realisasi: Decimal,
    pub total_variance: Decimal,
    pub variance_percentage: Decimal,
    pub overall_status: RealizationStatus,
    pub on_track_count: usize,
    pub over_budget_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// None when there are no records to summarize.
pub fn compute_summary(
    records: &[RealizationRecord],
    entity_name: &str,
) -> Option<RealizationSummary> {
    if records.is_empty() {
        return None;
    }
    let mut total_budget = Decimal::ZERO;
    let mut total_realisasi = Decimal::ZERO;
    let mut on_track = 0usize;
    let mut budgets: Vec<(&str, &str)> = Vec::new();
    for rec in records {
        total_budget += rec.allocated;
        total_realisasi += rec.realized;
        if rec.status == RealizationStatus::OnTrack {
            on_track += 1;
        }
        let key = (rec.budget_name.as_str(), rec.period.as_str());
        if !budgets.contains(&key) {
            budgets.push(key);
        }
    }
    let total_variance = total_budget - total_realisasi;
    Some(RealizationSummary {
        entity_name: entity_name.to_string(),
        total_accounts: records.len(),
        total_budgets: budgets.len(),
        total_budget,
        total_realisasi,
        total_variance,
        variance_percentage: pct(total_variance, total_budget),
        overall_status: status_for(total_budget, total_realisasi),
        on_track_count: on_track,
        over_budget_count: records.len() - on_track,
        last_updated: Utc::now(),
    })
}
