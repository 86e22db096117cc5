//! The recommendations datastore client.
//!
//! Grounded on `enforcer/dal/supabase_dal.py`: a REST/JSON store reached
//! over `reqwest`, authenticated with email+password exchanged for a
//! bearer token, with automatic re-authentication and a single retry when
//! the token has expired (the original detects this via a Postgrest
//! `PGRST301` code or an "expired" substring in the error body).

use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::DatastoreError;
use crate::recommendation::ScanRow;

const SCANS_META_TABLE: &str = "ScansMeta";
const SCANS_RESULTS_TABLE: &str = "ScansResults";

#[async_trait]
pub trait RecommendationsDatastore: Send + Sync {
    /// Fetches the latest scan's rows if it is newer than `current_scan_id`
    /// and not older than the staleness threshold. Returns `(None, None)`
    /// equivalent (`Ok(None)`) when there is nothing new to load.
    async fn get_latest_scan(
        &self,
        current_scan_id: Option<&str>,
    ) -> Result<Option<(String, Vec<ScanRow>)>, DatastoreError>;
}

#[derive(Debug, Clone)]
pub struct DatastoreConfig {
    pub store_url: String,
    pub api_key: String,
    pub account_id: String,
    pub cluster_name: String,
    pub email: String,
    pub password: String,
    pub scan_age_hours_threshold: u64,
}

#[derive(Debug, Deserialize)]
struct ScanMetaRow {
    scan_id: String,
    scan_start: String,
}

struct Session {
    access_token: String,
}

pub struct HttpRecommendationsDatastore {
    client: reqwest::Client,
    config: DatastoreConfig,
    session: RwLock<Option<Session>>,
}

impl HttpRecommendationsDatastore {
    pub fn new(config: DatastoreConfig) -> Self {
        HttpRecommendationsDatastore {
            client: reqwest::Client::new(),
            config,
            session: RwLock::new(None),
        }
    }

    async fn sign_in(&self) -> Result<String, DatastoreError> {
        #[derive(Deserialize)]
        struct AuthResponse {
            access_token: String,
        }

        let resp = self
            .client
            .post(format!("{}/auth/v1/token?grant_type=password", self.config.store_url))
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "email": self.config.email,
                "password": self.config.password,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(DatastoreError::Response { status, body });
        }

        let auth: AuthResponse = resp.json().await?;
        *self.session.write().unwrap() = Some(Session {
            access_token: auth.access_token.clone(),
        });
        Ok(auth.access_token)
    }

    async fn token(&self) -> Result<String, DatastoreError> {
        if let Some(session) = self.session.read().unwrap().as_ref() {
            return Ok(session.access_token.clone());
        }
        self.sign_in().await
    }

    fn is_auth_expired(status: u16, body: &str) -> bool {
        status == 401 || body.contains("PGRST301") || body.to_lowercase().contains("expired")
    }

    async fn request_with_retry<T: serde::de::DeserializeOwned>(
        &self,
        build: impl Fn(&str) -> reqwest::RequestBuilder,
    ) -> Result<T, DatastoreError> {
        let token = self.token().await?;
        let resp = build(&token).send().await?;

        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();

        if Self::is_auth_expired(status, &body) {
            warn!("datastore token expired, re-authenticating and retrying once");
            *self.session.write().unwrap() = None;
            let token = self.sign_in().await?;
            let resp = build(&token).send().await?;
            if resp.status().is_success() {
                return Ok(resp.json().await?);
            }
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            if Self::is_auth_expired(status, &body) {
                return Err(DatastoreError::AuthExpired);
            }
            return Err(DatastoreError::Response { status, body });
        }

        Err(DatastoreError::Response { status, body })
    }
}

#[async_trait]
impl RecommendationsDatastore for HttpRecommendationsDatastore {
    async fn get_latest_scan(
        &self,
        current_scan_id: Option<&str>,
    ) -> Result<Option<(String, Vec<ScanRow>)>, DatastoreError> {
        let url = format!(
            "{}/rest/v1/{}?account_id=eq.{}&cluster_id=eq.{}&latest=eq.true",
            self.config.store_url, SCANS_META_TABLE, self.config.account_id, self.config.cluster_name
        );

        let meta: Vec<ScanMetaRow> = self
            .request_with_retry(|token| {
                self.client
                    .get(&url)
                    .header("apikey", &self.config.api_key)
                    .bearer_auth(token)
            })
            .await?;

        if meta.is_empty() {
            warn!("no latest scan found in datastore");
            return Ok(None);
        }

        let mut sorted = meta;
        if sorted.len() > 1 {
            warn!(count = sorted.len(), "multiple latest scans found, using the most recent");
            sorted.sort_by(|a, b| b.scan_start.cmp(&a.scan_start));
        }
        let latest = &sorted[0];

        if Some(latest.scan_id.as_str()) == current_scan_id {
            return Ok(None);
        }

        if let Ok(scan_start) = chrono::DateTime::parse_from_rfc3339(&latest.scan_start) {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64;
            let age_hours = (now - scan_start.timestamp()) / 3600;
            if age_hours > self.config.scan_age_hours_threshold as i64 {
                warn!(age_hours, "latest scan is too old, ignoring");
                return Ok(None);
            }
        }

        let results_url = format!(
            "{}/rest/v1/{}?account_id=eq.{}&cluster_id=eq.{}&scan_id=eq.{}",
            self.config.store_url,
            SCANS_RESULTS_TABLE,
            self.config.account_id,
            self.config.cluster_name,
            latest.scan_id
        );

        let rows: Vec<ScanRow> = self
            .request_with_retry(|token| {
                self.client
                    .get(&results_url)
                    .header("apikey", &self.config.api_key)
                    .bearer_auth(token)
            })
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        info!(scan_id = %latest.scan_id, rows = rows.len(), "loaded new scan from datastore");
        Ok(Some((latest.scan_id.clone(), rows)))
    }
}

/// A datastore with no backing configuration, matching the original's
/// `enabled = False` fallback when mandatory env vars are missing: every
/// call reports there is nothing new rather than erroring, so the
/// recommendation store simply runs empty.
pub struct DisabledDatastore;

#[async_trait]
impl RecommendationsDatastore for DisabledDatastore {
    async fn get_latest_scan(
        &self,
        _current_scan_id: Option<&str>,
    ) -> Result<Option<(String, Vec<ScanRow>)>, DatastoreError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_datastore_reports_nothing_new_without_erroring() {
        let datastore = DisabledDatastore;
        let result = datastore.get_latest_scan(None).await;
        assert!(matches!(result, Ok(None)));
    }
}
