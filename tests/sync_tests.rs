// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::cell::RefCell;

use chrono::{Duration, Utc};
use rusqlite::Connection;

use ledgerlink::api::{
    AccountEvent, AccountPage, AccountingService, ApiError, RemoteAccount, RemoteCategory,
    RemoteDatabase, SessionInfo, TokenGrant,
};
use ledgerlink::credentials::CredentialStore;
use ledgerlink::models::Credential;
use ledgerlink::sync::{
    sync_categories, sync_chart_of_accounts, sync_multiple_entities, sync_single_account,
};

#[derive(Default)]
struct FakeService {
    pages: Vec<Vec<RemoteAccount>>,
    fail_accounts: bool,
    fail_open_session: bool,
    account_calls: RefCell<u32>,
    pushed: RefCell<Vec<AccountEvent>>,
}

impl AccountingService for FakeService {
    fn list_databases(
        &self,
        _token: &str,
        _secret: Option<&str>,
    ) -> Result<Vec<RemoteDatabase>, ApiError> {
        unimplemented!("not used in sync tests")
    }

    fn open_session(&self, _token: &str, db_id: &str) -> Result<SessionInfo, ApiError> {
        if self.fail_open_session {
            return Err(ApiError::Transport("connection refused".into()));
        }
        Ok(SessionInfo {
            session: format!("sess-{}", db_id),
            host: "https://data1.example.com".into(),
        })
    }

    fn list_accounts(
        &self,
        _token: &str,
        page: u32,
        _page_size: u32,
    ) -> Result<AccountPage, ApiError> {
        *self.account_calls.borrow_mut() += 1;
        if self.fail_accounts {
            return Err(ApiError::Status(503));
        }
        let accounts = self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(AccountPage {
            accounts,
            page_count: self.pages.len().max(1) as u32,
            page,
        })
    }

    fn push_account_event(&self, event: &AccountEvent) -> Result<(), ApiError> {
        self.pushed.borrow_mut().push(event.clone());
        Ok(())
    }

    fn exchange_code(&self, _code: &str) -> Result<TokenGrant, ApiError> {
        unimplemented!("not used in sync tests")
    }
}

fn account(id: u32) -> RemoteAccount {
    RemoteAccount {
        id: format!("acc-{}", id),
        code: format!("{}", 1000 + id),
        name: format!("Account {}", id),
        account_type: "EXPENSE".into(),
        active: true,
    }
}

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    ledgerlink::db::init_schema(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO entities(name, external_db_id) VALUES('Alpha','101')",
        [],
    )
    .unwrap();
    conn
}

fn grant_credential(conn: &Connection, entity_id: i64, token: &str) {
    CredentialStore::new(conn)
        .save(&Credential {
            entity_id,
            api_token: token.to_string(),
            secret_key: None,
            access_token: Some(format!("at-{}", token)),
            refresh_token: Some(format!("rt-{}", token)),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        })
        .unwrap();
}

fn history_rows(conn: &Connection, entity_id: i64) -> Vec<(String, String, i64)> {
    let mut stmt = conn
        .prepare(
            "SELECT sync_type, status, records_synced FROM sync_history
             WHERE entity_id=?1 ORDER BY id",
        )
        .unwrap();
    let rows = stmt
        .query_map([entity_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
            ))
        })
        .unwrap();
    rows.map(|r| r.unwrap()).collect()
}

#[test]
fn coa_sync_walks_all_pages() {
    let conn = setup();
    grant_credential(&conn, 1, "T1");
    let service = FakeService {
        pages: vec![
            (0..100).map(account).collect(),
            (100..150).map(account).collect(),
        ],
        ..Default::default()
    };

    let outcome = sync_chart_of_accounts(&conn, &service, 1);
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.synced, 150);
    assert_eq!(*service.account_calls.borrow(), 2);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts WHERE entity_id=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 150);
    assert_eq!(history_rows(&conn, 1), vec![("chart_of_accounts".to_string(), "success".to_string(), 150)]);
}

#[test]
fn coa_resync_is_idempotent() {
    let conn = setup();
    grant_credential(&conn, 1, "T1");
    let service = FakeService {
        pages: vec![(0..10).map(account).collect()],
        ..Default::default()
    };
    assert!(sync_chart_of_accounts(&conn, &service, 1).success);
    assert!(sync_chart_of_accounts(&conn, &service, 1).success);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts WHERE entity_id=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(rows, 10);
    // One ledger entry per attempt.
    assert_eq!(history_rows(&conn, 1).len(), 2);
}

#[test]
fn coa_fails_fast_without_credential() {
    let conn = setup();
    let service = FakeService::default();

    let outcome = sync_chart_of_accounts(&conn, &service, 1);
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("No credential"));
    assert_eq!(*service.account_calls.borrow(), 0);
    assert_eq!(history_rows(&conn, 1), vec![("chart_of_accounts".to_string(), "failed".to_string(), 0)]);
}

#[test]
fn coa_fails_fast_with_expired_token() {
    let conn = setup();
    CredentialStore::new(&conn)
        .save(&Credential {
            entity_id: 1,
            api_token: "T1".into(),
            secret_key: None,
            access_token: Some("at".into()),
            refresh_token: None,
            expires_at: Some(Utc::now() - Duration::hours(1)),
        })
        .unwrap();
    let service = FakeService::default();

    let outcome = sync_chart_of_accounts(&conn, &service, 1);
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("expired"));
    assert_eq!(*service.account_calls.borrow(), 0);
}

#[test]
fn coa_transport_failure_lands_failed_history_row() {
    let conn = setup();
    grant_credential(&conn, 1, "T1");
    let service = FakeService {
        fail_accounts: true,
        ..Default::default()
    };

    let outcome = sync_chart_of_accounts(&conn, &service, 1);
    assert!(!outcome.success);
    assert!(!outcome.error.unwrap().is_empty());
    assert_eq!(history_rows(&conn, 1), vec![("chart_of_accounts".to_string(), "failed".to_string(), 0)]);
}

fn cats() -> Vec<RemoteCategory> {
    vec![
        RemoteCategory {
            id: "c1".into(),
            name: "Operations".into(),
        },
        RemoteCategory {
            id: "c2".into(),
            name: "Marketing".into(),
        },
    ]
}

#[test]
fn category_sync_twice_with_same_input_is_idempotent() {
    let conn = setup();

    let first = sync_categories(&conn, 1, &cats());
    assert!(first.success);
    assert_eq!(first.synced, 2);
    let second = sync_categories(&conn, 1, &cats());
    assert!(second.success);
    assert_eq!(second.synced, 2);

    let mut stmt = conn
        .prepare("SELECT external_id, name FROM categories WHERE entity_id=1 ORDER BY external_id")
        .unwrap();
    let rows: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(rows, vec![("c1".to_string(), "Operations".to_string()), ("c2".to_string(), "Marketing".to_string())]);

    // Exactly two ledger entries, both success.
    assert_eq!(
        history_rows(&conn, 1),
        vec![
            ("categories".to_string(), "success".to_string(), 2),
            ("categories".to_string(), "success".to_string(), 2),
        ]
    );
}

#[test]
fn category_sync_failure_is_reported_and_logged() {
    let conn = setup();
    conn.execute_batch("DROP TABLE categories").unwrap();

    let outcome = sync_categories(&conn, 1, &cats());
    assert!(!outcome.success);
    assert!(!outcome.error.as_deref().unwrap().is_empty());
    assert_eq!(history_rows(&conn, 1), vec![("categories".to_string(), "failed".to_string(), 0)]);
}

#[test]
fn history_write_failure_never_masks_the_primary_error() {
    let conn = setup();
    conn.execute_batch("DROP TABLE categories; DROP TABLE sync_history;")
        .unwrap();

    let outcome = sync_categories(&conn, 1, &cats());
    assert!(!outcome.success);
    // The message is about the category upsert, not the history write.
    assert!(outcome.error.unwrap().contains("Category sync failed"));
}

#[test]
fn single_account_sync_pushes_session_scoped_event() {
    let conn = setup();
    grant_credential(&conn, 1, "T1");
    let service = FakeService::default();

    let outcome = sync_single_account(&conn, &service, 1, "acc-7");
    assert!(outcome.success, "{:?}", outcome.error);

    let pushed = service.pushed.borrow();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].id, "acc-7");
    assert_eq!(pushed[0].entity_id, "101");
    assert_eq!(pushed[0].session, "sess-101");
    assert_eq!(pushed[0].host, "https://data1.example.com");
    assert_eq!(history_rows(&conn, 1), vec![("account".to_string(), "success".to_string(), 1)]);
}

#[test]
fn single_account_sync_short_circuits_on_session_failure() {
    let conn = setup();
    grant_credential(&conn, 1, "T1");
    let service = FakeService {
        fail_open_session: true,
        ..Default::default()
    };

    let outcome = sync_single_account(&conn, &service, 1, "acc-7");
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("failed to open session"));
    assert!(service.pushed.borrow().is_empty());
}

#[test]
fn multi_entity_sync_records_partial_failure_without_aborting() {
    let conn = setup();
    conn.execute("INSERT INTO entities(name) VALUES('Beta')", [])
        .unwrap();
    grant_credential(&conn, 1, "T1"); // Beta (entity 2) has no credential
    let service = FakeService {
        pages: vec![(0..10).map(account).collect()],
        ..Default::default()
    };

    let report = sync_multiple_entities(&conn, &service, &[1, 2]);
    assert_eq!(report.total_synced, 10);
    assert_eq!(report.results.len(), 2);
    assert!(report.results[0].success);
    assert_eq!(report.results[0].synced, 10);
    assert!(!report.results[1].success);
    assert!(!report.results[1].error.as_deref().unwrap().is_empty());
}
