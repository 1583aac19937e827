use crate::adapters::{check_status, http_client};
use crate::app::routines::ENTITY_SOURCE;
use crate::domain::model::LegalEntity;
use crate::domain::ports::EntityResolver;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.gleif.org/api/v1/lei-records";
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 90;

#[derive(Debug, Deserialize)]
struct LeiResponse {
    #[serde(default)]
    data: Vec<LeiRecord>,
}

#[derive(Debug, Deserialize)]
struct LeiRecord {
    attributes: LeiAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeiAttributes {
    lei: String,
    entity: LeiEntity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeiEntity {
    legal_name: LeiName,
    #[serde(default)]
    legal_address: Option<LeiAddress>,
    #[serde(default)]
    headquarters_address: Option<LeiAddress>,
}

#[derive(Debug, Deserialize)]
struct LeiName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LeiAddress {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl From<LeiRecord> for LegalEntity {
    fn from(record: LeiRecord) -> Self {
        let entity = record.attributes.entity;
        let address = entity.headquarters_address.or(entity.legal_address);
        let (city, country) = match address {
            Some(a) => (a.city.unwrap_or_default(), a.country.unwrap_or_default()),
            None => (String::new(), String::new()),
        };
        LegalEntity {
            lei: record.attributes.lei,
            legal_name: entity.legal_name.name,
            country,
            city,
        }
    }
}

/// Cached lookup result. `entity: None` records a confirmed miss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub entity: Option<LegalEntity>,
    pub cached_at: DateTime<Utc>,
}

/// Legal-entity resolution against the GLEIF registry. Calls are serialized
/// and spaced by `min_interval`; hits and misses are cached per upper-cased
/// name for `cache_ttl`.
pub struct GleifClient {
    client: Client,
    endpoint: String,
    min_interval: Duration,
    cache_ttl: chrono::Duration,
    cache_path: Option<PathBuf>,
    cache: RwLock<BTreeMap<String, CacheEntry>>,
    last_call: Mutex<Option<Instant>>,
}

impl GleifClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, min_interval: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
            min_interval,
            cache_ttl: chrono::Duration::days(DEFAULT_CACHE_TTL_DAYS),
            cache_path: None,
            cache: RwLock::new(BTreeMap::new()),
            last_call: Mutex::new(None),
        })
    }

    pub fn with_cache_ttl(mut self, ttl_days: i64) -> Self {
        self.cache_ttl = chrono::Duration::days(ttl_days);
        self
    }

    /// Persists the cache as JSON at `path`, loading any existing entries.
    /// An unreadable file starts an empty cache.
    pub async fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, CacheEntry>>(&content) {
                Ok(entries) => {
                    debug!("Loaded {} cached GLEIF entries from {}", entries.len(), path.display());
                    self.cache = RwLock::new(entries);
                }
                Err(e) => warn!("⚠️ Ignoring unreadable GLEIF cache {}: {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("⚠️ Could not read GLEIF cache {}: {}", path.display(), e),
        }
        self.cache_path = Some(path);
        self
    }

    pub fn cache_key(name: &str) -> String {
        name.trim().to_uppercase()
    }

    /// Fresh cache entry for `name`, if any.
    pub fn cached(&self, name: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let cache = self.cache.read().ok()?;
        cache
            .get(&Self::cache_key(name))
            .filter(|entry| now - entry.cached_at < self.cache_ttl)
            .cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Inserts an entry and returns a copy of the cache when it is persisted.
    fn insert(&self, name: &str, entity: Option<LegalEntity>) -> Option<BTreeMap<String, CacheEntry>> {
        let mut cache = self.cache.write().ok()?;
        cache.insert(
            Self::cache_key(name),
            CacheEntry {
                entity,
                cached_at: Utc::now(),
            },
        );
        self.cache_path.as_ref().map(|_| cache.clone())
    }

    async fn store(&self, name: &str, entity: Option<LegalEntity>) {
        let snapshot = self.insert(name, entity);
        if let (Some(path), Some(entries)) = (&self.cache_path, snapshot) {
            let written = match serde_json::to_string_pretty(&entries) {
                Ok(json) => tokio::fs::write(path, json).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = written {
                warn!("⚠️ Could not persist GLEIF cache {}: {}", path.display(), e);
            }
        }
    }

    async fn lookup(&self, name: &str) -> Result<Option<LegalEntity>> {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let since = previous.elapsed();
            if since < self.min_interval {
                tokio::time::sleep(self.min_interval - since).await;
            }
        }

        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("filter[entity.legalName]", name), ("page[size]", "1")]);
        let started = Instant::now();
        let sent = request.send().await;
        *last_call = Some(Instant::now());
        let response = check_status(ENTITY_SOURCE, sent?, started)?;
        let body: LeiResponse = response.json().await?;
        Ok(body.data.into_iter().next().map(LegalEntity::from))
    }
}

#[async_trait]
impl EntityResolver for GleifClient {
    fn name(&self) -> &str {
        ENTITY_SOURCE
    }

    async fn resolve(&self, organization: &str) -> Result<Option<LegalEntity>> {
        if organization.trim().is_empty() {
            return Ok(None);
        }
        if let Some(entry) = self.cached(organization, Utc::now()) {
            debug!("GLEIF cache hit for {}", organization);
            return Ok(entry.entity);
        }
        let entity = self.lookup(organization).await?;
        self.store(organization, entity.clone()).await;
        Ok(entity)
    }
}
