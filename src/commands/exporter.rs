// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Export of the grouped realization shape. Works only from the fields the
//! reconciliation engine already exposes.

use anyhow::Result;
use rusqlite::Connection;

use crate::realization::{
    compute_realization, group_by_budget_and_period, CachedRealizations, RealizationFilter,
};
use crate::utils::id_for_entity;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("realization", sub)) => export_realization(conn, sub),
        _ => Ok(()),
    }
}

fn export_realization(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity = sub.get_one::<String>("entity").unwrap();
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();
    let entity_id = id_for_entity(conn, entity)?;

    let filter = RealizationFilter {
        period: sub.get_one::<String>("period").cloned(),
        ..Default::default()
    };
    let source = CachedRealizations::new(conn);
    let records = compute_realization(conn, &source, entity_id, &filter)?;
    let groups = group_by_budget_and_period(records);

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "budget_name",
                "period",
                "account_code",
                "account_name",
                "allocated",
                "realized",
                "variance",
                "variance_percentage",
                "status",
            ])?;
            for g in &groups {
                for rec in &g.accounts {
                    wtr.write_record([
                        g.budget_name.clone(),
                        g.period.clone(),
                        rec.account_code.clone(),
                        rec.account_name.clone(),
                        rec.allocated.to_string(),
                        rec.realized.to_string(),
                        rec.variance.to_string(),
                        rec.variance_percentage.to_string(),
                        rec.status.as_str().to_string(),
                    ])?;
                }
                wtr.write_record([
                    g.budget_name.clone(),
                    g.period.clone(),
                    String::new(),
                    "TOTAL".to_string(),
                    g.total_budget.to_string(),
                    g.total_realisasi.to_string(),
                    g.total_variance.to_string(),
                    g.variance_percentage.to_string(),
                    g.overall_status.as_str().to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            std::fs::write(out, serde_json::to_string_pretty(&groups)?)?;
        }
        _ => {
            eprintln!("Unknown format: {} (use csv|json)", fmt);
            return Ok(());
        }
    }
    println!("Exported realization for '{}' to {}", entity, out);
    Ok(())
}
