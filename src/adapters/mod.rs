pub mod gleif;
pub mod openaire;
pub mod semantic_scholar;
pub mod snapshot;

use crate::utils::error::{RadarError, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::debug;

pub use gleif::GleifClient;
pub use openaire::OpenAireClient;
pub use semantic_scholar::SemanticScholarClient;
pub use snapshot::SnapshotDataset;

const USER_AGENT: &str = concat!("tech-radar/", env!("CARGO_PKG_VERSION"));

/// Client shared by one reference-data service, with its per-call timeout.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Maps a response status onto the error taxonomy: 429 is a rate limit,
/// any other non-success status an external-service failure.
pub fn check_status(service: &str, response: Response, started: Instant) -> Result<Response> {
    let status = response.status();
    debug!(
        service,
        status = status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "reference-data call finished"
    );
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RadarError::RateLimited {
            service: service.to_string(),
        });
    }
    if !status.is_success() {
        return Err(RadarError::external(service, format!("HTTP {}", status.as_u16())));
    }
    Ok(response)
}
