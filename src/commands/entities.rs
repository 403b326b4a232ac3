// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::api::HttpAccountingService;
use crate::credentials::{detect_duplicate, validate_token, CredentialStore};
use crate::models::Credential;
use crate::utils::{http_client, pretty_table, service_base_url};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", _)) => list(conn)?,
        Some(("set-token", sub)) => set_token(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = sub.get_one::<String>("name").unwrap();
    let token = sub.get_one::<String>("token").unwrap();
    let secret = sub.get_one::<String>("secret");

    let store = CredentialStore::new(conn);
    let dup = detect_duplicate(token, &store.list_tokens()?, None);
    if dup.is_duplicate {
        println!(
            "Token already in use by '{}'",
            dup.owner_name.unwrap_or_default()
        );
        return Ok(());
    }

    let service = HttpAccountingService::new(http_client()?, service_base_url(conn)?);
    let check = validate_token(&service, token, secret.map(String::as_str));
    if !check.is_valid {
        println!("Credential rejected: {}", check.message);
        return Ok(());
    }

    let primary = check.primary_database.as_ref();
    conn.execute(
        "INSERT INTO entities(name, external_db_id) VALUES (?1, ?2)",
        params![name, primary.map(|d| d.id.clone())],
    )?;
    let entity_id = conn.last_insert_rowid();
    store.save(&Credential {
        entity_id,
        api_token: token.trim().to_string(),
        secret_key: secret.cloned(),
        access_token: None,
        refresh_token: None,
        expires_at: None,
    })?;
    println!(
        "Added entity '{}' ({} database(s) accessible, primary: {})",
        name,
        check.databases.len(),
        primary.map(|d| d.name.as_str()).unwrap_or("-"),
    );
    Ok(())
}

fn list(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT e.name, COALESCE(e.external_db_id, '-'),
                CASE WHEN c.entity_id IS NULL THEN 'none' ELSE 'stored' END,
                e.created_at
         FROM entities e LEFT JOIN credentials c ON c.entity_id=e.id
         ORDER BY e.name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (n, db, cred, cr) = row?;
        data.push(vec![n, db, cred, cr]);
    }
    println!(
        "{}",
        pretty_table(&["Name", "External DB", "Credential", "Created"], data)
    );
    Ok(())
}

fn set_token(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = sub.get_one::<String>("name").unwrap();
    let token = sub.get_one::<String>("token").unwrap();
    let secret = sub.get_one::<String>("secret");

    let entity_id = crate::utils::id_for_entity(conn, name)?;
    let store = CredentialStore::new(conn);
    let own = store.load(entity_id)?.map(|c| c.api_token);
    let dup = detect_duplicate(token, &store.list_tokens()?, own.as_deref());
    if dup.is_duplicate {
        println!(
            "Token already in use by '{}'",
            dup.owner_name.unwrap_or_default()
        );
        return Ok(());
    }

    let service = HttpAccountingService::new(http_client()?, service_base_url(conn)?);
    let check = validate_token(&service, token, secret.map(String::as_str));
    if !check.is_valid {
        println!("Credential rejected: {}", check.message);
        return Ok(());
    }

    store.save(&Credential {
        entity_id,
        api_token: token.trim().to_string(),
        secret_key: secret.cloned(),
        access_token: None,
        refresh_token: None,
        expires_at: None,
    })?;
    println!("Credential updated for '{}'", name);
    Ok(())
}
