// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use rusqlite::Connection;

use crate::api::HttpAccountingService;
use crate::notify::{ChangeNotifier, TableScope};
use crate::sync::sync_chart_of_accounts;
use crate::utils::{http_client, id_for_entity, service_base_url};

/// Subscribe to account-table changes, run a resync on this connection, and
/// report how many change signals fired. Signals carry no diff; a consumer
/// reacting to one re-fetches from the store.
pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let entity = m.get_one::<String>("entity").unwrap();
    let entity_id = id_for_entity(conn, entity)?;

    let notifier = ChangeNotifier::install(conn);
    let signals = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&signals);
    let handle = notifier.subscribe(entity_id, TableScope::Accounts, move |event| {
        counter.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(table = %event.table, op = ?event.op, "change signal");
    })?;

    let service = HttpAccountingService::new(http_client()?, service_base_url(conn)?);
    let outcome = sync_chart_of_accounts(conn, &service, entity_id);

    notifier.unsubscribe(&handle);
    ChangeNotifier::uninstall(conn);

    if outcome.success {
        println!(
            "Synced {} account(s); {} change signal(s) observed",
            outcome.synced,
            signals.load(Ordering::SeqCst)
        );
    } else {
        println!("{}", outcome.error.unwrap_or_default());
    }
    Ok(())
}
