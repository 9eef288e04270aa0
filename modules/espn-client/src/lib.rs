pub mod error;
pub mod identity;
pub mod retry;
pub mod throttle;
pub mod transport;
pub mod types;

#[cfg(feature = "test-support")]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use error::{EspnError, Result};
pub use retry::{retry, RetryPolicy};
pub use throttle::RateLimiter;
pub use transport::{HttpResponse, ReqwestTransport, Transport, TransportError};
pub use types::{SearchContent, SearchResponse, SourceHandle};

use throttle::Pacer;

pub const DEFAULT_SEARCH_URL: &str = "https://site.web.api.espn.com/apis/search/v2";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub search_url: String,
    pub requests_per_minute: u32,
    /// Minimum gap between two requests issued by the same worker.
    pub worker_spacing: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            requests_per_minute: 25,
            worker_spacing: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// ESPN client shared by all workers of a run. Owns the request budget; each
/// worker gets its own pacing through [`EspnClient::worker`].
pub struct EspnClient {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    config: ClientConfig,
}

impl EspnClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        info!(
            requests_per_minute = config.requests_per_minute,
            worker_spacing_ms = config.worker_spacing.as_millis() as u64,
            max_attempts = config.retry.max_attempts,
            "EspnClient initialized"
        );
        Self {
            transport,
            limiter: RateLimiter::per_minute(config.requests_per_minute),
            config,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn worker(&self) -> EspnWorker<'_> {
        EspnWorker {
            client: self,
            pacer: Pacer::new(self.config.worker_spacing),
        }
    }
}

/// One worker's view of the client.
pub struct EspnWorker<'a> {
    client: &'a EspnClient,
    pacer: Pacer,
}

impl EspnWorker<'_> {
    /// Look a fighter up through the search API.
    pub async fn resolve(&self, name: &str) -> Result<SourceHandle> {
        let url = url::Url::parse_with_params(
            &self.client.config.search_url,
            &[
                ("region", "us"),
                ("lang", "en"),
                ("limit", "10"),
                ("page", "1"),
                ("query", name.trim()),
            ],
        )
        .map_err(|e| EspnError::Setup(format!("invalid search url: {e}")))?;

        let body = self.get(url.as_str()).await?;
        let response: SearchResponse = serde_json::from_str(&body)?;
        let handle = select_candidate(name, &response)?;
        info!(entity = name, stats_url = %handle.stats_url, "Resolved fighter");
        Ok(handle)
    }

    /// Download the stats document for a resolved fighter.
    pub async fn fetch(&self, handle: &SourceHandle) -> Result<String> {
        let body = self.get(&handle.stats_url).await?;
        info!(entity = %handle.entity, bytes = body.len(), "Fetched stats page");
        Ok(body)
    }

    async fn get(&self, url: &str) -> Result<String> {
        retry(&self.client.config.retry, EspnError::is_retryable, |attempt| {
            self.attempt(url, attempt)
        })
        .await
    }

    async fn attempt(&self, url: &str, attempt: u32) -> Result<String> {
        self.pacer.ready().await;
        self.client.limiter.acquire().await;
        self.pacer.mark();

        let user_agent = identity::random_user_agent();
        debug!(url, attempt, "Dispatching request");

        match self.client.transport.get(url, user_agent).await {
            Ok(resp) => classify_response(url, resp),
            Err(e) => {
                warn!(url, attempt, error = %e, "Request failed");
                Err(EspnError::Transient {
                    status: None,
                    message: e.to_string(),
                })
            }
        }
    }
}

fn classify_response(url: &str, resp: HttpResponse) -> Result<String> {
    match resp.status {
        200..=299 => Ok(resp.body),
        429 | 500..=599 => Err(EspnError::Transient {
            status: Some(resp.status),
            message: format!("{url} returned {}", resp.status),
        }),
        404 => Err(EspnError::NotFound(url.to_string())),
        status => Err(EspnError::NotFound(format!("{url} (status {status})"))),
    }
}

/// Pick the fighter for `query` out of a search response.
///
/// Only `player` results with `sport == "mma"` and a web link qualify. An
/// exact display-name match wins, otherwise the first qualifying result.
/// Player results without a sport tag cannot be told apart and make the
/// lookup ambiguous; results tagged with another sport mean not found.
pub fn select_candidate(query: &str, response: &SearchResponse) -> Result<SourceHandle> {
    let query = query.trim();
    let players: Vec<&SearchContent> = response
        .results
        .iter()
        .filter(|r| r.kind == "player")
        .flat_map(|r| r.contents.iter())
        .collect();

    let mma: Vec<(&SearchContent, &str)> = players
        .iter()
        .filter(|c| c.sport.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("mma")))
        .filter_map(|c| {
            c.link
                .as_ref()
                .and_then(|l| l.web.as_deref())
                .map(|web| (*c, web))
        })
        .collect();

    let chosen = mma
        .iter()
        .find(|(c, _)| {
            c.display_name
                .as_deref()
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(query))
        })
        .or_else(|| mma.first());

    if let Some((content, web)) = chosen {
        let stats_url = stats_url(web).ok_or_else(|| {
            EspnError::Parse(format!("unexpected profile link for {query}: {web}"))
        })?;
        return Ok(SourceHandle {
            entity: query.to_string(),
            display_name: content
                .display_name
                .clone()
                .unwrap_or_else(|| query.to_string()),
            profile_url: web.to_string(),
            stats_url,
        });
    }

    let unscoped = players.iter().filter(|c| c.sport.is_none()).count();
    if unscoped > 0 {
        return Err(EspnError::Ambiguous {
            query: query.to_string(),
            candidates: players.len(),
        });
    }
    Err(EspnError::NotFound(format!("no mma fighter matches {query:?}")))
}

/// `.../mma/fighter/_/id/3955778/name` -> `.../mma/fighter/stats/_/id/3955778/name`
pub fn stats_url(profile_url: &str) -> Option<String> {
    if profile_url.contains("/stats/_/id/") {
        return Some(profile_url.to_string());
    }
    profile_url
        .contains("/_/id/")
        .then(|| profile_url.replacen("/_/id/", "/stats/_/id/", 1))
}
