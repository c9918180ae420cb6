//! Sessionize schedule client.
//!
//! Fetches the conference's "view/All" payload from the Sessionize read-only
//! API, keeps a TTL-cached snapshot (24 hours by default), and exposes it
//! through the core [`ContentSource`] trait. Staleness is fine for the
//! consumers: assignment invariants are re-validated against the event
//! ledger at commit time, not against schedule data.

use chrono::{DateTime, NaiveDateTime, Utc};
use s2s_core::content::{ContentError, ContentSource, Session};
use s2s_core::ids::{SessionId, SpeakerId};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default snapshot lifetime: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Client configuration.
#[derive(Clone, Debug)]
pub struct SessionizeConfig {
    /// Full URL of the Sessionize "view/All" endpoint, e.g.
    /// `https://sessionize.com/api/v2/<event-id>/view/All`.
    pub url: String,
    /// How long a fetched snapshot stays fresh.
    pub ttl: Duration,
}

impl SessionizeConfig {
    /// Configuration for the given endpoint with the default TTL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Read configuration from `SESSIONIZE_URL` (required) and
    /// `SESSIONIZE_TTL_SECS` (optional, default 24h).
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Unavailable`] when `SESSIONIZE_URL` is unset.
    pub fn from_env() -> Result<Self, ContentError> {
        let url = std::env::var("SESSIONIZE_URL")
            .map_err(|_| ContentError::Unavailable("SESSIONIZE_URL is not set".to_string()))?;
        let ttl = std::env::var("SESSIONIZE_TTL_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map_or(DEFAULT_TTL, Duration::from_secs);
        Ok(Self { url, ttl })
    }
}

#[derive(Deserialize)]
struct Payload {
    sessions: Vec<WireSession>,
}

/// The subset of the Sessionize session record the ledgers care about.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSession {
    id: String,
    title: String,
    starts_at: Option<String>,
    speakers: Vec<String>,
}

/// Sessionize emits local times without an offset; treat them as UTC and
/// accept full RFC 3339 too. Only equality between slots matters downstream.
fn parse_starts_at(raw: &str) -> Result<DateTime<Utc>, ContentError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| ContentError::Malformed(format!("bad startsAt {raw:?}: {e}")))
}

/// Parse a "view/All" payload into core sessions.
///
/// # Errors
///
/// Returns [`ContentError::Malformed`] when the JSON does not match the
/// expected schema or a start time does not parse.
pub fn parse_payload(body: &str) -> Result<Vec<Session>, ContentError> {
    let payload: Payload =
        serde_json::from_str(body).map_err(|e| ContentError::Malformed(e.to_string()))?;

    payload
        .sessions
        .into_iter()
        .map(|wire| {
            let starts_at = wire
                .starts_at
                .as_deref()
                .map(parse_starts_at)
                .transpose()?;
            Ok(Session {
                id: SessionId::new(wire.id),
                title: wire.title,
                starts_at,
                speakers: wire.speakers.into_iter().map(SpeakerId::new).collect(),
            })
        })
        .collect()
}

struct Snapshot {
    fetched_at: Instant,
    sessions: Vec<Session>,
}

/// TTL-cached [`ContentSource`] over the Sessionize API.
pub struct SessionizeClient {
    http: reqwest::Client,
    config: SessionizeConfig,
    cache: RwLock<Option<Snapshot>>,
}

impl SessionizeClient {
    /// A client with a fresh connection pool and an empty cache.
    #[must_use]
    pub fn new(config: SessionizeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            cache: RwLock::new(None),
        }
    }

    /// A client configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Unavailable`] when `SESSIONIZE_URL` is unset.
    pub fn from_env() -> Result<Self, ContentError> {
        Ok(Self::new(SessionizeConfig::from_env()?))
    }

    async fn fetch(&self) -> Result<Vec<Session>, ContentError> {
        info!(url = %self.config.url, "fetching sessionize schedule");
        let body = self
            .http
            .get(&self.config.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ContentError::Unavailable(e.to_string()))?
            .text()
            .await
            .map_err(|e| ContentError::Unavailable(e.to_string()))?;
        parse_payload(&body)
    }

    async fn cached_sessions(&self) -> Result<Vec<Session>, ContentError> {
        {
            let cache = self.cache.read().await;
            if let Some(snapshot) = cache.as_ref() {
                if snapshot.fetched_at.elapsed() < self.config.ttl {
                    debug!("serving sessionize snapshot from cache");
                    return Ok(snapshot.sessions.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(snapshot) = cache.as_ref() {
            if snapshot.fetched_at.elapsed() < self.config.ttl {
                return Ok(snapshot.sessions.clone());
            }
        }

        let sessions = self.fetch().await?;
        *cache = Some(Snapshot {
            fetched_at: Instant::now(),
            sessions: sessions.clone(),
        });
        Ok(sessions)
    }
}

impl ContentSource for SessionizeClient {
    fn sessions(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Session>, ContentError>> + Send + '_>> {
        Box::pin(self.cached_sessions())
    }
}
