// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::utils::{id_for_account, id_for_entity, parse_decimal, parse_month, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn set(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity = sub.get_one::<String>("entity").unwrap();
    let name = sub.get_one::<String>("name").unwrap();
    let period = parse_month(sub.get_one::<String>("period").unwrap())?;
    let account = sub.get_one::<String>("account").unwrap();
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let description = sub.get_one::<String>("description");
    if amount < Decimal::ZERO {
        anyhow::bail!("Allocated amount must not be negative");
    }

    let entity_id = id_for_entity(conn, entity)?;
    let account_id = id_for_account(conn, entity_id, account)?;
    conn.execute(
        "INSERT INTO budgets(entity_id, name, period) VALUES (?1, ?2, ?3)
         ON CONFLICT(entity_id, name, period) DO NOTHING",
        params![entity_id, name, period],
    )?;
    let budget_id: i64 = conn.query_row(
        "SELECT id FROM budgets WHERE entity_id=?1 AND name=?2 AND period=?3",
        params![entity_id, name, period],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO budget_items(budget_id, account_id, allocated, description)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(budget_id, account_id) DO UPDATE SET
             allocated=excluded.allocated,
             description=excluded.description",
        params![budget_id, account_id, amount.to_string(), description],
    )?;
    println!("Budget '{}' {} / account {} = {}", name, period, account, amount);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity = sub.get_one::<String>("entity").unwrap();
    let entity_id = id_for_entity(conn, entity)?;
    let period = sub.get_one::<String>("period");
    let mut stmt = conn.prepare(
        "SELECT b.name, b.period, a.code, a.name, bi.allocated, COALESCE(bi.description, '')
         FROM budget_items bi
         JOIN budgets b ON bi.budget_id=b.id
         JOIN accounts a ON bi.account_id=a.id
         WHERE b.entity_id=?1 AND (?2 IS NULL OR b.period=?2)
         ORDER BY b.period, b.name, a.code",
    )?;
    let rows = stmt.query_map(params![entity_id, period], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (b, p, code, acc, alloc, desc) = row?;
        data.push(vec![b, p, code, acc, alloc, desc]);
    }
    println!(
        "{}",
        pretty_table(
            &["Budget", "Period", "Code", "Account", "Allocated", "Description"],
            data
        )
    );
    Ok(())
}
