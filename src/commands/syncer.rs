// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::api::{HttpAccountingService, RemoteCategory};
use crate::sync::{
    sync_categories, sync_chart_of_accounts, sync_multiple_entities, sync_single_account,
};
use crate::utils::{http_client, id_for_entity, pretty_table, service_base_url};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("coa", sub)) => coa(conn, sub)?,
        Some(("categories", sub)) => categories(conn, sub)?,
        Some(("account", sub)) => account(conn, sub)?,
        Some(("all", sub)) => all(conn, sub)?,
        Some(("history", sub)) => history(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn coa(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity = sub.get_one::<String>("entity").unwrap();
    let entity_id = id_for_entity(conn, entity)?;
    let service = HttpAccountingService::new(http_client()?, service_base_url(conn)?);
    let outcome = sync_chart_of_accounts(conn, &service, entity_id);
    if outcome.success {
        println!("Synced {} account(s) for '{}'", outcome.synced, entity);
    } else {
        println!("{}", outcome.error.unwrap_or_default());
    }
    Ok(())
}

fn categories(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity = sub.get_one::<String>("entity").unwrap();
    let file = sub.get_one::<String>("file").unwrap();
    let entity_id = id_for_entity(conn, entity)?;
    let raw = std::fs::read_to_string(file).with_context(|| format!("Read {}", file))?;
    let cats: Vec<RemoteCategory> =
        serde_json::from_str(&raw).with_context(|| format!("Parse categories from {}", file))?;
    let outcome = sync_categories(conn, entity_id, &cats);
    if outcome.success {
        println!("Synced {} categor(ies) for '{}'", outcome.synced, entity);
    } else {
        println!("{}", outcome.error.unwrap_or_default());
    }
    Ok(())
}

fn account(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity = sub.get_one::<String>("entity").unwrap();
    let id = sub.get_one::<String>("id").unwrap();
    let entity_id = id_for_entity(conn, entity)?;
    let service = HttpAccountingService::new(http_client()?, service_base_url(conn)?);
    let outcome = sync_single_account(conn, &service, entity_id, id);
    if outcome.success {
        println!("Account '{}' pushed through the incremental channel", id);
    } else {
        println!("{}", outcome.error.unwrap_or_default());
    }
    Ok(())
}

fn all(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity_ids: Vec<i64> = match sub.get_one::<String>("entities") {
        Some(names) => {
            let mut ids = Vec::new();
            for name in names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                ids.push(id_for_entity(conn, name)?);
            }
            ids
        }
        None => {
            let mut stmt = conn.prepare("SELECT id FROM entities ORDER BY id")?;
            let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            ids
        }
    };
    let service = HttpAccountingService::new(http_client()?, service_base_url(conn)?);
    let report = sync_multiple_entities(conn, &service, &entity_ids);
    let mut data = Vec::new();
    for res in &report.results {
        data.push(vec![
            res.entity_id.to_string(),
            if res.success { "success" } else { "failed" }.to_string(),
            res.synced.to_string(),
            res.error.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", pretty_table(&["Entity", "Status", "Synced", "Error"], data));
    println!("Total synced: {}", report.total_synced);
    Ok(())
}

fn history(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut data = Vec::new();
    let push = |r: &rusqlite::Row<'_>| -> rusqlite::Result<Vec<String>> {
        Ok(vec![
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, i64>(3)?.to_string(),
            r.get::<_, Option<String>>(4)?.unwrap_or_default(),
            r.get::<_, String>(5)?,
        ])
    };
    if let Some(entity) = sub.get_one::<String>("entity") {
        let entity_id = id_for_entity(conn, entity)?;
        let mut stmt = conn.prepare(
            "SELECT e.name, h.sync_type, h.status, h.records_synced, h.error_message, h.created_at
             FROM sync_history h JOIN entities e ON h.entity_id=e.id
             WHERE h.entity_id=?1 ORDER BY h.id DESC LIMIT 50",
        )?;
        let rows = stmt.query_map(params![entity_id], push)?;
        for row in rows {
            data.push(row?);
        }
    } else {
        let mut stmt = conn.prepare(
            "SELECT e.name, h.sync_type, h.status, h.records_synced, h.error_message, h.created_at
             FROM sync_history h JOIN entities e ON h.entity_id=e.id
             ORDER BY h.id DESC LIMIT 50",
        )?;
        let rows = stmt.query_map([], push)?;
        for row in rows {
            data.push(row?);
        }
    }
    println!(
        "{}",
        pretty_table(
            &["Entity", "Type", "Status", "Records", "Error", "At"],
            data
        )
    );
    Ok(())
}
