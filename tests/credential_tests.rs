// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::cell::RefCell;

use chrono::{Duration, Utc};
use rusqlite::Connection;

use ledgerlink::api::{
    AccountEvent, AccountPage, AccountingService, ApiError, RemoteDatabase, SessionInfo, TokenGrant,
};
use ledgerlink::credentials::{
    build_authorization_url, detect_duplicate, validate_token, CredentialStore, TokenOwner,
};
use ledgerlink::models::Credential;

enum DbListBehavior {
    Ok(Vec<RemoteDatabase>),
    Transport,
    Status(u16),
    Malformed,
}

struct FakeService {
    db_list: DbListBehavior,
    calls: RefCell<u32>,
}

impl FakeService {
    fn new(db_list: DbListBehavior) -> Self {
        Self {
            db_list,
            calls: RefCell::new(0),
        }
    }
}

impl AccountingService for FakeService {
    fn list_databases(
        &self,
        _token: &str,
        _secret: Option<&str>,
    ) -> Result<Vec<RemoteDatabase>, ApiError> {
        *self.calls.borrow_mut() += 1;
        match &self.db_list {
            DbListBehavior::Ok(dbs) => Ok(dbs.clone()),
            DbListBehavior::Transport => Err(ApiError::Transport("connection refused".into())),
            DbListBehavior::Status(code) => Err(ApiError::Status(*code)),
            DbListBehavior::Malformed => {
                Err(ApiError::Malformed("db-list response is missing the 'd' field".into()))
            }
        }
    }

    fn open_session(&self, _token: &str, _db_id: &str) -> Result<SessionInfo, ApiError> {
        unimplemented!("not used in credential tests")
    }

    fn list_accounts(
        &self,
        _token: &str,
        _page: u32,
        _page_size: u32,
    ) -> Result<AccountPage, ApiError> {
        unimplemented!("not used in credential tests")
    }

    fn push_account_event(&self, _event: &AccountEvent) -> Result<(), ApiError> {
        unimplemented!("not used in credential tests")
    }

    fn exchange_code(&self, _code: &str) -> Result<TokenGrant, ApiError> {
        Ok(TokenGrant {
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

fn dbs() -> Vec<RemoteDatabase> {
    vec![
        RemoteDatabase {
            id: "101".into(),
            name: "Main Co".into(),
            code: "MAIN".into(),
        },
        RemoteDatabase {
            id: "102".into(),
            name: "Side Co".into(),
            code: "SIDE".into(),
        },
    ]
}

#[test]
fn valid_token_returns_first_database_as_primary() {
    let service = FakeService::new(DbListBehavior::Ok(dbs()));
    let res = validate_token(&service, "tok-1", None);
    assert!(res.is_valid);
    assert_eq!(res.databases.len(), 2);
    assert_eq!(res.primary_database.unwrap(), res.databases[0]);
    assert!(!res.message.is_empty());
}

#[test]
fn blank_token_rejected_before_any_network_call() {
    let service = FakeService::new(DbListBehavior::Ok(dbs()));
    let res = validate_token(&service, "   ", None);
    assert!(!res.is_valid);
    assert!(!res.message.is_empty());
    assert_eq!(*service.calls.borrow(), 0);
}

#[test]
fn transport_failure_is_invalid_with_message() {
    let service = FakeService::new(DbListBehavior::Transport);
    let res = validate_token(&service, "tok-1", None);
    assert!(!res.is_valid);
    assert!(res.message.contains("Could not reach"));
}

#[test]
fn non_2xx_status_is_invalid_with_message() {
    let service = FakeService::new(DbListBehavior::Status(401));
    let res = validate_token(&service, "tok-1", None);
    assert!(!res.is_valid);
    assert!(res.message.contains("401"));
}

#[test]
fn malformed_payload_is_invalid_with_message() {
    let service = FakeService::new(DbListBehavior::Malformed);
    let res = validate_token(&service, "tok-1", None);
    assert!(!res.is_valid);
    assert!(res.message.contains("Unexpected response"));
}

#[test]
fn empty_database_list_is_invalid() {
    let service = FakeService::new(DbListBehavior::Ok(vec![]));
    let res = validate_token(&service, "tok-1", None);
    assert!(!res.is_valid);
    assert!(res.primary_database.is_none());
}

fn owners() -> Vec<TokenOwner> {
    vec![
        TokenOwner {
            entity_name: "Alpha".into(),
            api_token: "T1".into(),
        },
        TokenOwner {
            entity_name: "Beta".into(),
            api_token: "T2".into(),
        },
    ]
}

#[test]
fn duplicate_token_flags_with_owner_name() {
    // Editing the entity that holds T2; candidate T1 belongs to Alpha.
    let res = detect_duplicate("T1", &owners(), Some("T2"));
    assert!(res.is_duplicate);
    assert_eq!(res.owner_name.as_deref(), Some("Alpha"));
}

#[test]
fn own_unchanged_token_never_flags() {
    let res = detect_duplicate("T2", &owners(), Some("T2"));
    assert!(!res.is_duplicate);
    assert!(res.owner_name.is_none());
}

#[test]
fn candidate_is_trimmed_before_comparison() {
    let res = detect_duplicate("  T1  ", &owners(), None);
    assert!(res.is_duplicate);
    assert_eq!(res.owner_name.as_deref(), Some("Alpha"));
}

#[test]
fn token_comparison_is_case_sensitive() {
    let res = detect_duplicate("t1", &owners(), None);
    assert!(!res.is_duplicate);
}

#[test]
fn authorization_url_is_deterministic_and_encoded() {
    let url = build_authorization_url(
        "https://account.example.com/oauth/authorize",
        "client 1",
        "https://app.example.com/callback",
        "read write",
    );
    assert_eq!(
        url,
        "https://account.example.com/oauth/authorize?client_id=client%201&response_type=code&redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback&scope=read%20write"
    );
    assert_eq!(
        url,
        build_authorization_url(
            "https://account.example.com/oauth/authorize",
            "client 1",
            "https://app.example.com/callback",
            "read write",
        )
    );
}

#[test]
fn credential_without_expiry_is_expired() {
    let cred = Credential {
        entity_id: 1,
        api_token: "T1".into(),
        secret_key: None,
        access_token: Some("at".into()),
        refresh_token: None,
        expires_at: None,
    };
    assert!(cred.is_expired(Utc::now()));
}

#[test]
fn credential_expiry_boundary() {
    let now = Utc::now();
    let mut cred = Credential {
        entity_id: 1,
        api_token: "T1".into(),
        secret_key: None,
        access_token: Some("at".into()),
        refresh_token: None,
        expires_at: Some(now),
    };
    assert!(!cred.is_expired(now));
    cred.expires_at = Some(now - Duration::seconds(1));
    assert!(cred.is_expired(now));
}

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    ledgerlink::db::init_schema(&mut conn).unwrap();
    conn.execute("INSERT INTO entities(name) VALUES('Alpha'),('Beta')", [])
        .unwrap();
    conn
}

#[test]
fn store_roundtrips_credentials() {
    let conn = setup();
    let store = CredentialStore::new(&conn);
    let cred = Credential {
        entity_id: 1,
        api_token: "T1".into(),
        secret_key: Some("S1".into()),
        access_token: Some("at".into()),
        refresh_token: Some("rt".into()),
        expires_at: Some(Utc::now() + Duration::days(1)),
    };
    store.save(&cred).unwrap();
    let loaded = store.load(1).unwrap().unwrap();
    assert_eq!(loaded.api_token, "T1");
    assert_eq!(loaded.secret_key.as_deref(), Some("S1"));
    assert!(!loaded.is_expired(Utc::now()));

    store.clear(1).unwrap();
    assert!(store.load(1).unwrap().is_none());
}

#[test]
fn store_rejects_token_held_by_another_entity() {
    let conn = setup();
    let store = CredentialStore::new(&conn);
    let cred = |entity_id: i64| Credential {
        entity_id,
        api_token: "T1".into(),
        secret_key: None,
        access_token: None,
        refresh_token: None,
        expires_at: None,
    };
    store.save(&cred(1)).unwrap();
    // The UNIQUE index is the backstop behind the application-level check.
    assert!(store.save(&cred(2)).is_err());
}

#[test]
fn exchange_result_carries_grant() {
    let service = FakeService::new(DbListBehavior::Ok(dbs()));
    let res = ledgerlink::credentials::exchange_code(&service, "code-1");
    assert!(res.success);
    let grant = res.grant.unwrap();
    assert_eq!(grant.access_token, "at");
    assert_eq!(grant.refresh_token, "rt");
}
