// Copyright (c) 2025 Ledgerlink Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Client for the external accounting service.
//!
//! Every response is validated at this boundary: the service wraps payloads in
//! an `{s, d, sp?}` envelope, and anything that does not match the expected
//! shape is rejected as [`ApiError::Malformed`] instead of being trusted deeper
//! in the sync or reconciliation code.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network failure: {0}")]
    Transport(String),
    #[error("service returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

/// One database (accounting scope) visible to a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDatabase {
    pub id: String,
    pub name: String,
    pub code: String,
}

/// Scoped session against one database, returned by `open-session`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub session: String,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccount {
    pub id: String,
    pub code: String,
    pub name: String,
    pub account_type: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page_count: u32,
    pub page: u32,
}

/// One page of the bulk account listing.
#[derive(Debug)]
pub struct AccountPage {
    pub accounts: Vec<RemoteAccount>,
    pub page_count: u32,
    pub page: u32,
}

/// Payload for the incremental/webhook-style single-record channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEvent {
    pub event: String,
    pub id: String,
    pub entity_id: String,
    pub host: String,
    pub session: String,
    pub access_token: String,
}

/// Token triple returned by the OAuth code exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// The slice of the external service this system depends on.
pub trait AccountingService {
    /// List the databases the credential can reach. An empty list is returned
    /// as-is; deciding whether that is an error belongs to the caller.
    fn list_databases(&self, token: &str, secret: Option<&str>)
        -> Result<Vec<RemoteDatabase>, ApiError>;

    fn open_session(&self, token: &str, db_id: &str) -> Result<SessionInfo, ApiError>;

    /// One page of the full chart-of-accounts listing (bulk channel).
    fn list_accounts(&self, token: &str, page: u32, page_size: u32)
        -> Result<AccountPage, ApiError>;

    /// Trigger a single-record update through the incremental channel.
    fn push_account_event(&self, event: &AccountEvent) -> Result<(), ApiError>;

    /// Exchange an authorization code for tokens via the trusted intermediary.
    fn exchange_code(&self, code: &str) -> Result<TokenGrant, ApiError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    s: Option<bool>,
    d: Option<T>,
    sp: Option<PageMeta>,
}

fn unwrap_envelope<T>(env: Envelope<T>, what: &str) -> Result<(T, Option<PageMeta>), ApiError> {
    match env.s {
        Some(true) => {}
        Some(false) => {
            return Err(ApiError::Malformed(format!(
                "{} response flagged unsuccessful by the service",
                what
            )))
        }
        None => {
            return Err(ApiError::Malformed(format!(
                "{} response is missing the 's' field",
                what
            )))
        }
    }
    let d = env.d.ok_or_else(|| {
        ApiError::Malformed(format!("{} response is missing the 'd' field", what))
    })?;
    Ok((d, env.sp))
}

/// Hex HMAC-SHA256 of the request timestamp, keyed by the secret.
pub fn sign_timestamp(secret: &str, timestamp: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(timestamp.as_bytes());
    let out = mac.finalize().into_bytes();
    out.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct HttpAccountingService {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpAccountingService {
    pub fn new(client: reqwest::blocking::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn authed(
        &self,
        req: reqwest::blocking::RequestBuilder,
        token: &str,
        secret: Option<&str>,
    ) -> reqwest::blocking::RequestBuilder {
        let req = req.bearer_auth(token);
        match secret {
            Some(secret) => {
                let ts = Utc::now().to_rfc3339();
                let sig = sign_timestamp(secret, &ts);
                req.header("X-Api-Timestamp", ts).header("X-Api-Signature", sig)
            }
            None => req,
        }
    }
}

fn check_status(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(ApiError::Status(status.as_u16()));
    }
    Ok(resp)
}

impl AccountingService for HttpAccountingService {
    fn list_databases(
        &self,
        token: &str,
        secret: Option<&str>,
    ) -> Result<Vec<RemoteDatabase>, ApiError> {
        let url = format!("{}/db-list", self.base_url);
        let resp = self.authed(self.client.get(url), token, secret).send()?;
        let resp = check_status(resp)?;
        let env: Envelope<Vec<RemoteDatabase>> = resp
            .json()
            .map_err(|e| ApiError::Malformed(format!("db-list: {}", e)))?;
        let (d, _) = unwrap_envelope(env, "db-list")?;
        Ok(d)
    }

    fn open_session(&self, token: &str, db_id: &str) -> Result<SessionInfo, ApiError> {
        let url = format!("{}/open-session", self.base_url);
        let resp = self
            .authed(self.client.post(url), token, None)
            .json(&serde_json::json!({ "dbId": db_id }))
            .send()?;
        let resp = check_status(resp)?;
        let env: Envelope<SessionInfo> = resp
            .json()
            .map_err(|e| ApiError::Malformed(format!("open-session: {}", e)))?;
        let (d, _) = unwrap_envelope(env, "open-session")?;
        Ok(d)
    }

    fn list_accounts(
        &self,
        token: &str,
        page: u32,
        page_size: u32,
    ) -> Result<AccountPage, ApiError> {
        let url = format!("{}/accounts", self.base_url);
        let resp = self
            .authed(self.client.get(url), token, None)
            .query(&[("page", page.to_string()), ("pageSize", page_size.to_string())])
            .send()?;
        let resp = check_status(resp)?;
        let env: Envelope<Vec<RemoteAccount>> = resp
            .json()
            .map_err(|e| ApiError::Malformed(format!("accounts: {}", e)))?;
        let (accounts, sp) = unwrap_envelope(env, "accounts")?;
        // A single-page listing may omit the paging block entirely.
        let sp = sp.unwrap_or(PageMeta { page_count: 1, page });
        Ok(AccountPage {
            accounts,
            page_count: sp.page_count,
            page: sp.page,
        })
    }

    fn push_account_event(&self, event: &AccountEvent) -> Result<(), ApiError> {
        let url = format!("{}/account-event", self.base_url);
        let resp = self.client.post(url).json(event).send()?;
        check_status(resp)?;
        Ok(())
    }

    fn exchange_code(&self, code: &str) -> Result<TokenGrant, ApiError> {
        let url = format!("{}/oauth/exchange", self.base_url);
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({ "code": code }))
            .send()?;
        let resp = check_status(resp)?;
        let env: Envelope<TokenGrant> = resp
            .json()
            .map_err(|e| ApiError::Malformed(format!("oauth exchange: {}", e)))?;
        let (grant, _) = unwrap_envelope(env, "oauth exchange")?;
        Ok(grant)
    }
}
