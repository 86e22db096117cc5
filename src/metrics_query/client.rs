//! Thin Prometheus HTTP API client: issues `/api/v1/query` and
//! `/api/v1/query_range` requests and parses the standard vector/matrix
//! response envelope into [`Sample`]s.
//!
//! Grounded on `core/integrations/prometheus/prometheus_client.py` and the
//! `_query_prometheus_sync`/`query_prometheus` methods of
//! `prometheus/metrics/base.py`, with vendor base-URL/auth handling pulled
//! from [`super::vendors`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use super::families::{filter_prom_jobs_results, Series};
use super::vendors::{Signer, VendorDialect};

#[derive(Debug, thiserror::Error)]
pub enum PrometheusQueryError {
    #[error("prometheus request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("prometheus returned status {status}: {body}")]
    Response { status: u16, body: String },
    #[error("prometheus query reported an error: {0}")]
    QueryError(String),
}

/// A single labeled instant-query sample.
#[derive(Debug, Clone)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

#[derive(Deserialize)]
struct PromResponse {
    status: String,
    error: Option<String>,
    data: Option<PromData>,
}

#[derive(Deserialize)]
struct PromData {
    result: Vec<PromResult>,
}

#[derive(Deserialize)]
struct PromResult {
    metric: BTreeMap<String, String>,
    /// Present for instant queries: `[timestamp, "value"]`.
    #[serde(default)]
    value: Option<(f64, String)>,
    /// Present for range queries: `[[timestamp, "value"], ...]`.
    #[serde(default)]
    values: Option<Vec<(f64, String)>>,
}

pub struct PrometheusClient {
    http: reqwest::Client,
    base_url: String,
    dialect: VendorDialect,
    bearer_token: Option<String>,
    signer: Option<Arc<dyn Signer>>,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>, dialect: VendorDialect, bearer_token: Option<String>) -> Self {
        PrometheusClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            dialect,
            bearer_token,
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    fn query_url(&self, path_suffix: &str) -> String {
        let config = self.dialect.config();
        format!("{}{}{}", self.base_url.trim_end_matches('/'), config.query_path, path_suffix)
    }

    fn authed_request(&self, url: &str, body: &[(&str, String)]) -> reqwest::RequestBuilder {
        let config = self.dialect.config();
        let mut req = self.http.post(url).form(body);
        if let Some(header) = config.auth_header {
            if let Some(token) = &self.bearer_token {
                req = req.header(header, token);
            }
        } else if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }
        if config.requires_sigv4 {
            if let Some(signer) = &self.signer {
                let encoded = serde_urlencoded::to_string(body).unwrap_or_default();
                for (name, value) in signer.sign("POST", url, &encoded) {
                    req = req.header(name, value);
                }
            }
        }
        req
    }

    async fn execute(&self, response: reqwest::Response) -> Result<PromData, PrometheusQueryError> {
        let status = response.status();
        let body_text = response.text().await?;
        if !status.is_success() {
            return Err(PrometheusQueryError::Response {
                status: status.as_u16(),
                body: body_text,
            });
        }
        let parsed: PromResponse = serde_json::from_str(&body_text).map_err(|e| PrometheusQueryError::QueryError(e.to_string()))?;
        if parsed.status != "success" {
            return Err(PrometheusQueryError::QueryError(parsed.error.unwrap_or_else(|| "unknown error".to_string())));
        }
        parsed
            .data
            .ok_or_else(|| PrometheusQueryError::QueryError("missing data field".to_string()))
    }

    /// Runs an instant query and returns one [`Sample`] per returned series,
    /// deduplicated by job via [`filter_prom_jobs_results`].
    pub async fn instant_query(&self, query: &str) -> Result<Vec<Sample>, PrometheusQueryError> {
        let url = self.query_url("");
        let body = [("query", query.to_string())];
        let response = self.authed_request(&url, &body).send().await?;
        let data = self.execute(response).await?;

        let series_list: Vec<Series> = data
            .result
            .iter()
            .filter_map(|r| {
                let (_, value_str) = r.value.as_ref()?;
                let value: f64 = value_str.parse().ok()?;
                Some(Series {
                    labels: r.metric.clone(),
                    values: vec![(0.0, value)],
                })
            })
            .collect();

        Ok(filter_prom_jobs_results(series_list)
            .into_values()
            .map(|series| Sample {
                labels: series.labels,
                value: series.values.first().map(|(_, v)| *v).unwrap_or(0.0),
            })
            .collect())
    }

    /// Runs a range query and returns one [`Series`] per returned series
    /// (not collapsed to a single value), deduplicated by job.
    pub async fn range_query(
        &self,
        query: &str,
        start: f64,
        end: f64,
        step_seconds: i64,
    ) -> Result<Vec<Series>, PrometheusQueryError> {
        let url = self.query_url("_range");
        let step = super::families::step_to_string(step_seconds);
        let body = [
            ("query", query.to_string()),
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("step", step),
        ];
        let response = self.authed_request(&url, &body).send().await?;
        let data = self.execute(response).await?;

        let series_list: Vec<Series> = data
            .result
            .iter()
            .map(|r| {
                let values = r
                    .values
                    .as_ref()
                    .map(|vs| {
                        vs.iter()
                            .filter_map(|(ts, v)| v.parse::<f64>().ok().map(|v| (*ts, v)))
                            .collect()
                    })
                    .unwrap_or_default();
                Series {
                    labels: r.metric.clone(),
                    values,
                }
            })
            .collect();

        Ok(filter_prom_jobs_results(series_list).into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_url_uses_dialect_path() {
        let client = PrometheusClient::new("https://prom.internal", VendorDialect::Standard, None);
        assert_eq!(client.query_url(""), "https://prom.internal/api/v1/query");
    }

    #[test]
    fn query_url_strips_trailing_slash_on_base() {
        let client = PrometheusClient::new("https://prom.internal/", VendorDialect::Standard, None);
        assert_eq!(client.query_url(""), "https://prom.internal/api/v1/query");
    }

    #[test]
    fn range_query_url_appends_range_suffix() {
        let client = PrometheusClient::new("https://prom.internal", VendorDialect::Standard, None);
        assert_eq!(client.query_url("_range"), "https://prom.internal/api/v1/query_range");
    }

    #[test]
    fn parses_success_envelope() {
        let raw = r#"{"status":"success","data":{"result":[{"metric":{"pod":"web-1","job":"kubelet"},"value":[1000.0,"1.5"]}]}}"#;
        let parsed: PromResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.status, "success");
        assert_eq!(parsed.data.unwrap().result.len(), 1);
    }
}
