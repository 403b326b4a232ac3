// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use crate::api::HttpAccountingService;
use crate::credentials::{build_authorization_url, exchange_code, CredentialStore};
use crate::utils::{get_setting, http_client, id_for_entity, service_base_url};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("url", sub)) => {
            let endpoint = get_setting(conn, "oauth_authorize_endpoint")?
                .unwrap_or_else(|| "https://account.example.com/oauth/authorize".to_string());
            let url = build_authorization_url(
                &endpoint,
                sub.get_one::<String>("client-id").unwrap(),
                sub.get_one::<String>("redirect-uri").unwrap(),
                sub.get_one::<String>("scope").unwrap(),
            );
            println!("{}", url);
        }
        Some(("exchange", sub)) => {
            let entity = sub.get_one::<String>("entity").unwrap();
            let code = sub.get_one::<String>("code").unwrap();
            let entity_id = id_for_entity(conn, entity)?;

            let service = HttpAccountingService::new(http_client()?, service_base_url(conn)?);
            let res = exchange_code(&service, code);
            match res.grant {
                Some(grant) => {
                    CredentialStore::new(conn).store_grant(entity_id, &grant)?;
                    println!("Tokens stored for '{}' (expires {})", entity, grant.expires_at);
                }
                None => println!("{}", res.message),
            }
        }
        _ => {}
    }
    Ok(())
}
