use crate::adapters::{check_status, http_client};
use crate::app::routines::OPENAIRE_SOURCE;
use crate::domain::model::YearRange;
use crate::domain::ports::{PublicationSource, YearCount};
use crate::utils::error::{RadarError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.openaire.eu/search/publications";

/// Yearly publication counts from the OpenAIRE search API. Only the result
/// total is read; every request asks for a single record.
pub struct OpenAireClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl OpenAireClient {
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub async fn count_for_year(&self, term: &str, year: i32) -> Result<u64> {
        let from = format!("{}-01-01", year);
        let to = format!("{}-12-31", year);
        let mut request = self.client.get(&self.endpoint).query(&[
            ("keywords", term),
            ("fromDateAccepted", from.as_str()),
            ("toDateAccepted", to.as_str()),
            ("format", "json"),
            ("size", "1"),
        ]);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let response = check_status(OPENAIRE_SOURCE, request.send().await?, started)?;
        let body: Value = response.json().await?;
        parse_total(&body).ok_or_else(|| {
            RadarError::external(OPENAIRE_SOURCE, "response carries no result total")
        })
    }
}

/// Reads `response.header.total.$`, which the API renders as a number or a
/// numeric string.
fn parse_total(body: &Value) -> Option<u64> {
    let total = body.pointer("/response/header/total/$")?;
    match total {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl PublicationSource for OpenAireClient {
    fn name(&self) -> &str {
        OPENAIRE_SOURCE
    }

    async fn count_by_year(&self, term: &str, range: YearRange) -> Result<Vec<YearCount>> {
        let mut rows = Vec::new();
        for year in range.years() {
            let count = self.count_for_year(term, year).await?;
            debug!("openaire {} {} -> {}", term, year, count);
            if count > 0 {
                rows.push(YearCount { year, count });
            }
        }
        Ok(rows)
    }
}
