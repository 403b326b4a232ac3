// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use crate::realization::{
    compute_realization, compute_summary, group_by_budget_and_period, CachedRealizations,
    RealizationFilter,
};
use crate::utils::{
    id_for_account, id_for_entity, maybe_print_json, parse_decimal, parse_month, pretty_table,
};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("record", sub)) => record(conn, sub)?,
        Some(("report", sub)) => report(conn, sub)?,
        Some(("summary", sub)) => summary(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn filter_from(sub: &clap::ArgMatches) -> RealizationFilter {
    RealizationFilter {
        period: sub.get_one::<String>("period").cloned(),
        account_type: sub.get_one::<String>("type").cloned(),
        budget_name: sub.get_one::<String>("budget").cloned(),
    }
}

fn record(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let entity = sub.get_one::<String>("entity").unwrap();
    let account = sub.get_one::<String>("account").unwrap();
    let period = parse_month(sub.get_one::<String>("period").unwrap())?;
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let entity_id = id_for_entity(conn, entity)?;
    let account_id = id_for_account(conn, entity_id, account)?;
    CachedRealizations::new(conn).record(entity_id, account_id, &period, amount)?;
    println!("Recorded {} realized for {} in {}", amount, account, period);
    Ok(())
}

fn report(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let entity = sub.get_one::<String>("entity").unwrap();
    let entity_id = id_for_entity(conn, entity)?;

    let source = CachedRealizations::new(conn);
    let records = compute_realization(conn, &source, entity_id, &filter_from(sub))?;
    let groups = group_by_budget_and_period(records);
    if maybe_print_json(json_flag, jsonl_flag, &groups)? {
        return Ok(());
    }

    for g in &groups {
        println!("{} / {} [{}]", g.budget_name, g.period, g.overall_status.as_str());
        let mut data = Vec::new();
        for rec in &g.accounts {
            data.push(vec![
                rec.account_code.clone(),
                rec.account_name.clone(),
                format!("{:.2}", rec.allocated),
                format!("{:.2}", rec.realized),
                format!("{:.2}", rec.variance),
                format!("{:.2}%", rec.variance_percentage),
                rec.status.as_str().to_string(),
            ]);
        }
        data.push(vec![
            String::new(),
            "TOTAL".to_string(),
            format!("{:.2}", g.total_budget),
            format!("{:.2}", g.total_realisasi),
            format!("{:.2}", g.total_variance),
            format!("{:.2}%", g.variance_percentage),
            g.overall_status.as_str().to_string(),
        ]);
        println!(
            "{}",
            pretty_table(
                &["Code", "Account", "Allocated", "Realized", "Variance", "Var %", "Status"],
                data
            )
        );
    }
    Ok(())
}

fn summary(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let entity = sub.get_one::<String>("entity").unwrap();
    let entity_id = id_for_entity(conn, entity)?;

    let source = CachedRealizations::new(conn);
    let records = compute_realization(conn, &source, entity_id, &filter_from(sub))?;
    match compute_summary(&records, entity) {
        Some(s) => {
            if maybe_print_json(json_flag, jsonl_flag, &s)? {
                return Ok(());
            }
            let data = vec![
                vec!["Accounts".to_string(), s.total_accounts.to_string()],
                vec!["Budgets".to_string(), s.total_budgets.to_string()],
                vec!["Total allocated".to_string(), format!("{:.2}", s.total_budget)],
                vec!["Total realized".to_string(), format!("{:.2}", s.total_realisasi)],
                vec!["Total variance".to_string(), format!("{:.2}", s.total_variance)],
                vec!["Variance %".to_string(), format!("{:.2}%", s.variance_percentage)],
                vec!["On track".to_string(), s.on_track_count.to_string()],
                vec!["Over budget".to_string(), s.over_budget_count.to_string()],
                vec!["Status".to_string(), s.overall_status.as_str().to_string()],
            ];
            println!("{}", pretty_table(&["Metric", "Value"], data));
        }
        None => println!("No budget items match the given filters."),
    }
    Ok(())
}
