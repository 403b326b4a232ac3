// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::{params, Connection};
use tempfile::tempdir;

use ledgerlink::{cli, commands::exporter};

fn base_conn() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    ledgerlink::db::init_schema(&mut conn).unwrap();
    conn.execute("INSERT INTO entities(name) VALUES('Alpha')", [])
        .unwrap();
    conn.execute(
        "INSERT INTO accounts(entity_id, external_id, code, name, account_type)
         VALUES (1, 'a1', '5100', 'Salaries', 'EXPENSE')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO budgets(entity_id, name, period) VALUES (1, 'Opex', '2025-01')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO budget_items(budget_id, account_id, allocated) VALUES (1, 1, '100')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO realizations(entity_id, account_id, period, amount)
         VALUES (1, 1, '2025-01', '80')",
        params![],
    )
    .unwrap();
    conn
}

#[test]
fn export_realization_writes_grouped_json() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("realization.json");
    let out_str = out_path.to_string_lossy().to_string();

    let cli = cli::build_cli();
    let matches = cli.get_matches_from([
        "ledgerlink",
        "export",
        "realization",
        "--entity",
        "Alpha",
        "--format",
        "json",
        "--out",
        &out_str,
    ]);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(&conn, export_m).unwrap();
    } else {
        panic!("no export subcommand");
    }

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let group = &parsed[0];
    assert_eq!(group["budget_name"], "Opex");
    assert_eq!(group["period"], "2025-01");
    assert_eq!(group["total_budget"], "100");
    assert_eq!(group["total_realisasi"], "80");
    assert_eq!(group["total_variance"], "20");
    assert_eq!(group["overall_status"], "ON_TRACK");
    assert_eq!(group["accounts"][0]["account_code"], "5100");
}

#[test]
fn export_realization_writes_csv_rows_and_totals() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("realization.csv");
    let out_str = out_path.to_string_lossy().to_string();

    let cli = cli::build_cli();
    let matches = cli.get_matches_from([
        "ledgerlink",
        "export",
        "realization",
        "--entity",
        "Alpha",
        "--out",
        &out_str,
    ]);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(&conn, export_m).unwrap();
    } else {
        panic!("no export subcommand");
    }

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next().unwrap(),
        "budget_name,period,account_code,account_name,allocated,realized,variance,variance_percentage,status"
    );
    // Percentage comes out of the decimal division with one fractional digit.
    assert_eq!(lines.next().unwrap(), "Opex,2025-01,5100,Salaries,100,80,20,20.0,ON_TRACK");
    assert_eq!(lines.next().unwrap(), "Opex,2025-01,,TOTAL,100,80,20,20.0,ON_TRACK");
}

#[test]
fn export_realization_skips_unknown_format() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("realization.xml");
    let out_str = out_path.to_string_lossy().to_string();

    let cli = cli::build_cli();
    let matches = cli.get_matches_from([
        "ledgerlink",
        "export",
        "realization",
        "--entity",
        "Alpha",
        "--format",
        "xml",
        "--out",
        &out_str,
    ]);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(&conn, export_m).unwrap();
    } else {
        panic!("no export subcommand");
    }
    assert!(!out_path.exists());
}
