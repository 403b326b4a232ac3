// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::utils::pretty_table;

pub fn handle(conn: &Connection) -> Result<()> {
    let mut rows = Vec::new();

    // 1) Entities with budgets but no credential: syncs for them will fail fast
    let mut stmt = conn.prepare(
        "SELECT DISTINCT e.name FROM entities e
         JOIN budgets b ON b.entity_id=e.id
         LEFT JOIN credentials c ON c.entity_id=e.id
         WHERE c.entity_id IS NULL",
    )?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let name: String = r.get(0)?;
        rows.push(vec!["budgeted_entity_no_credential".into(), name]);
    }

    // 2) Budget items whose account belongs to a different entity
    let mut stmt2 = conn.prepare(
        "SELECT bi.id FROM budget_items bi
         JOIN budgets b ON bi.budget_id=b.id
         JOIN accounts a ON bi.account_id=a.id
         WHERE a.entity_id != b.entity_id",
    )?;
    let mut cur2 = stmt2.query([])?;
    while let Some(r) = cur2.next()? {
        let id: i64 = r.get(0)?;
        rows.push(vec!["budget_item_cross_entity".into(), format!("item {}", id)]);
    }

    // 3) Unparseable or negative allocated amounts
    let mut stmt3 = conn.prepare("SELECT id, allocated FROM budget_items")?;
    let mut cur3 = stmt3.query([])?;
    while let Some(r) = cur3.next()? {
        let id: i64 = r.get(0)?;
        let raw: String = r.get(1)?;
        match raw.parse::<Decimal>() {
            Ok(d) if d < Decimal::ZERO => {
                rows.push(vec!["negative_allocation".into(), format!("item {}: {}", id, raw)]);
            }
            Ok(_) => {}
            Err(_) => {
                rows.push(vec!["bad_allocation".into(), format!("item {}: '{}'", id, raw)]);
            }
        }
    }

    // 4) Entities never successfully synced
    let mut stmt4 = conn.prepare(
        "SELECT name FROM entities WHERE id NOT IN
             (SELECT entity_id FROM sync_history WHERE status='success')",
    )?;
    let mut cur4 = stmt4.query([])?;
    while let Some(r) = cur4.next()? {
        let name: String = r.get(0)?;
        rows.push(vec!["never_synced".into(), name]);
    }

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
