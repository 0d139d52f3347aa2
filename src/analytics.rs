//! GA4 readback: JWT-bearer token exchange plus the realtime and
//! historical report calls behind `GET /api/analytics`.

use anyhow::{anyhow, Context};
use serde_json::json;

use crate::{conf::ConfAnalytics, jwt};

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    conf: ConfAnalytics,
}

/// Dashboard metrics as surfaced to the front end. GA4 returns metric
/// values as strings, so the totals are passed through verbatim.
#[derive(Debug, PartialEq)]
pub struct Snapshot {
    pub active_users: u64,
    pub total_views: String,
    pub total_users: String,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(serde::Deserialize, Debug, Default)]
struct Report {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(serde::Deserialize, Debug)]
struct Row {
    #[serde(rename = "metricValues", default)]
    metric_values: Vec<MetricValue>,
}

#[derive(serde::Deserialize, Debug)]
struct MetricValue {
    #[serde(default)]
    value: String,
}

impl Client {
    pub fn new(conf: ConfAnalytics) -> Self {
        Self {
            http: reqwest::Client::new(),
            conf,
        }
    }

    /// Signs a fresh assertion and exchanges it for a bearer token.
    /// A token endpoint response without an `access_token` field is an
    /// error, never an empty token.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        let claims = jwt::Claims::new(
            &self.conf.client_email,
            &self.conf.token_uri,
            jwt::ASSERTION_TTL,
        )?;
        let assertion = claims
            .sign(&self.conf.private_key_pem)
            .context("Failed to sign service-account assertion")?;

        let response = self
            .http
            .post(&self.conf.token_uri)
            .form(&[
                (
                    "grant_type",
                    "urn:ietf:params:oauth:grant-type:jwt-bearer",
                ),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("Token endpoint unreachable")?;

        let body: serde_json::Value = response.json().await?;
        token_from_response(body)
    }

    /// One dashboard snapshot: realtime active users plus all-time
    /// views and users.
    pub async fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let access_token = self.access_token().await?;

        let realtime = self
            .run_report(&access_token, "runRealtimeReport", json!({
                "metrics": [{ "name": "activeUsers" }],
                "dimensions": [{ "name": "country" }],
            }))
            .await
            .context("runRealtimeReport failed")?;

        let report = self
            .run_report(&access_token, "runReport", json!({
                "dateRanges": [
                    { "startDate": REPORT_START_DATE, "endDate": "today" },
                ],
                "metrics": [
                    { "name": "screenPageViews" },
                    { "name": "totalUsers" },
                ],
            }))
            .await
            .context("runReport failed")?;

        Ok(Snapshot {
            active_users: sum_metric_values(&realtime),
            total_views: first_row_metric(&report, 0),
            total_users: first_row_metric(&report, 1),
        })
    }

    async fn run_report(
        &self,
        access_token: &str,
        method: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<Report> {
        let url = format!(
            "{}/v1beta/properties/{}:{method}",
            self.conf.api_base, self.conf.property_id
        );
        tracing::debug!(%url, "Fetching analytics report.");
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let report = response.json().await?;
        Ok(report)
    }
}

/// Views are counted from the site launch; GA4 caps lookback anyway.
const REPORT_START_DATE: &str = "2023-01-01";

fn token_from_response(
    body: serde_json::Value,
) -> anyhow::Result<String> {
    let parsed: TokenResponse = serde_json::from_value(body.clone())?;
    parsed.access_token.ok_or_else(|| {
        anyhow!("Token endpoint returned no access token: {body}")
    })
}

/// Realtime active users arrive bucketed by dimension, one row per
/// country. Unparseable values count as zero rather than failing the
/// whole snapshot.
fn sum_metric_values(report: &Report) -> u64 {
    report
        .rows
        .iter()
        .filter_map(|row| row.metric_values.first())
        .filter_map(|metric| metric.value.parse::<u64>().ok())
        .sum()
}

fn first_row_metric(report: &Report, index: usize) -> String {
    report
        .rows
        .first()
        .and_then(|row| row.metric_values.get(index))
        .map_or_else(|| "0".to_string(), |metric| metric.value.clone())
}
