use crate::adapters::{check_status, http_client};
use crate::app::routines::CITATION_SOURCE;
use crate::domain::model::YearRange;
use crate::domain::ports::{CitationSource, Paper};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.semanticscholar.org/graph/v1/paper/search";
pub const PAGE_SIZE: usize = 100;
const FIELDS: &str = "title,year,citationCount,influentialCitationCount,venue,authors,publicationTypes";

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    next: Option<u64>,
    #[serde(default)]
    data: Vec<PaperRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    citation_count: Option<u64>,
    #[serde(default)]
    influential_citation_count: Option<u64>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    authors: Option<Vec<AuthorRecord>>,
    #[serde(default)]
    publication_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AuthorRecord {
    #[serde(default)]
    name: Option<String>,
}

impl From<PaperRecord> for Paper {
    fn from(record: PaperRecord) -> Self {
        Paper {
            title: record.title.unwrap_or_default(),
            year: record.year,
            citation_count: record.citation_count.unwrap_or(0),
            influential_citation_count: record.influential_citation_count.unwrap_or(0),
            venue: record.venue.unwrap_or_default(),
            authors: record
                .authors
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| a.name)
                .collect(),
            publication_types: record.publication_types.unwrap_or_default(),
        }
    }
}

/// Relevance-ranked paper search against the Semantic Scholar graph API.
pub struct SemanticScholarClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    async fn fetch_page(&self, term: &str, years: &str, offset: usize, limit: usize) -> Result<SearchPage> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        let mut request = self.client.get(&self.endpoint).query(&[
            ("query", term),
            ("year", years),
            ("fields", FIELDS),
            ("offset", offset.as_str()),
            ("limit", limit.as_str()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let started = Instant::now();
        let response = check_status(CITATION_SOURCE, request.send().await?, started)?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CitationSource for SemanticScholarClient {
    fn name(&self) -> &str {
        CITATION_SOURCE
    }

    async fn search(&self, term: &str, range: YearRange, limit: usize) -> Result<Vec<Paper>> {
        let years = range.label();
        let mut papers: Vec<Paper> = Vec::new();
        while papers.len() < limit {
            let page_size = (limit - papers.len()).min(PAGE_SIZE);
            let page = self.fetch_page(term, &years, papers.len(), page_size).await?;
            let received = page.data.len();
            papers.extend(page.data.into_iter().map(Paper::from));
            debug!("semantic scholar page: {} papers (total {})", received, papers.len());
            if received == 0 || page.next.is_none() {
                break;
            }
        }
        papers.truncate(limit);
        Ok(papers)
    }
}
