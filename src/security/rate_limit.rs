//! Sliding-window rate limiting with per-route classes.
//!
//! Each client gets one window per class: a queue of the instants at which
//! its admitted requests arrived. A request is admitted while fewer than
//! `max_requests` instants remain inside the trailing window.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{RateLimitConfig, WindowConfig};
use crate::error::Rejection;
use crate::http::request::ClientIdentity;
use crate::observability::metrics;

/// Route class a limit applies to. Classes never share state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Every route.
    General,
    /// Credential submission and similar abuse-prone routes.
    Sensitive,
}

impl RouteClass {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteClass::General => "general",
            RouteClass::Sensitive => "sensitive",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window length and ceiling of one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl WindowPolicy {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

impl From<WindowConfig> for WindowPolicy {
    fn from(config: WindowConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_requests)
    }
}

/// Result of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admitted {
        limit: u32,
        remaining: u32,
        /// Time until the oldest counted request leaves the window.
        reset_after: Duration,
    },
    Rejected {
        limit: u32,
        retry_after: Duration,
    },
}

impl RateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateDecision::Admitted { .. })
    }
}

/// Admitted-request instants of one client, oldest first.
#[derive(Debug, Default)]
struct RateWindow {
    hits: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.hits.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: Instant) {
        // Keep the queue non-decreasing even if a caller hands us a stale instant.
        let at = match self.hits.back() {
            Some(&last) if last > now => last,
            _ => now,
        };
        self.hits.push_back(at);
    }

    /// Time until the oldest entry expires.
    fn reset_after(&self, now: Instant, window: Duration) -> Duration {
        self.hits
            .front()
            .map(|&oldest| window.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(window)
    }
}

/// Per-client window storage for one route class.
///
/// Backed by a `DashMap`: the prune/append step for a client holds that
/// key's shard lock, so concurrent requests from the same client are
/// serialized while different clients proceed in parallel.
#[derive(Debug, Default)]
pub struct RateWindowStore {
    windows: DashMap<ClientIdentity, RateWindow>,
}

impl RateWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prune the client's window, then admit and record, or reject.
    pub fn hit(&self, client: &ClientIdentity, policy: WindowPolicy, now: Instant) -> RateDecision {
        let mut entry = self.windows.entry(client.clone()).or_default();
        let window = entry.value_mut();
        window.prune(now, policy.window);

        let count = window.hits.len();
        let limit = policy.max_requests;
        if count >= limit as usize {
            return RateDecision::Rejected {
                limit,
                retry_after: window.reset_after(now, policy.window),
            };
        }

        window.record(now);
        RateDecision::Admitted {
            limit,
            remaining: limit - count as u32 - 1,
            reset_after: window.reset_after(now, policy.window),
        }
    }

    /// Drop every client whose window is empty once pruned.
    ///
    /// Returns the number of clients removed.
    pub fn sweep(&self, now: Instant, window: Duration) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| {
            w.prune(now, window);
            !w.hits.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Requests currently counted against `client` (without pruning).
    pub fn count(&self, client: &ClientIdentity) -> usize {
        self.windows.get(client).map(|w| w.hits.len()).unwrap_or(0)
    }
}

/// Admit/reject decisions for one route class.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    class: RouteClass,
    policy: WindowPolicy,
    store: Arc<RateWindowStore>,
}

impl RateLimiter {
    pub fn new(class: RouteClass, policy: WindowPolicy, store: Arc<RateWindowStore>) -> Self {
        Self {
            class,
            policy,
            store,
        }
    }

    pub fn class(&self) -> RouteClass {
        self.class
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<RateWindowStore> {
        &self.store
    }

    pub fn check(&self, client: &ClientIdentity, now: Instant) -> RateDecision {
        self.store.hit(client, self.policy, now)
    }

    pub fn sweep(&self, now: Instant) -> usize {
        self.store.sweep(now, self.policy.window)
    }
}

/// The general limiter on every route plus the sensitive limiter on
/// configured path prefixes.
#[derive(Debug)]
pub struct TieredRateLimiter {
    enabled: bool,
    general: RateLimiter,
    sensitive: RateLimiter,
    sensitive_paths: Vec<String>,
}

impl TieredRateLimiter {
    pub fn new(general: RateLimiter, sensitive: RateLimiter, sensitive_paths: Vec<String>) -> Self {
        Self {
            enabled: true,
            general,
            sensitive,
            sensitive_paths,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let general = RateLimiter::new(
            RouteClass::General,
            config.general.into(),
            Arc::new(RateWindowStore::new()),
        );
        let sensitive = RateLimiter::new(
            RouteClass::Sensitive,
            config.sensitive.into(),
            Arc::new(RateWindowStore::new()),
        );
        Self {
            enabled: config.enabled,
            ..Self::new(general, sensitive, config.sensitive_paths.clone())
        }
    }

    pub fn general(&self) -> &RateLimiter {
        &self.general
    }

    pub fn sensitive(&self) -> &RateLimiter {
        &self.sensitive
    }

    pub fn is_sensitive(&self, path: &str) -> bool {
        self.sensitive_paths
            .iter()
            .any(|prefix| path_has_prefix(path, prefix))
    }

    /// Check every class that applies to `path`.
    ///
    /// Returns the decision of the most specific class on success so its
    /// quota can be advertised, or `None` when limiting is disabled.
    pub fn check(
        &self,
        client: &ClientIdentity,
        path: &str,
        now: Instant,
    ) -> Result<Option<RateDecision>, Rejection> {
        if !self.enabled {
            return Ok(None);
        }

        let mut decision = self.admit(&self.general, client, now)?;
        if self.is_sensitive(path) {
            decision = self.admit(&self.sensitive, client, now)?;
        }
        Ok(Some(decision))
    }

    fn admit(
        &self,
        limiter: &RateLimiter,
        client: &ClientIdentity,
        now: Instant,
    ) -> Result<RateDecision, Rejection> {
        match limiter.check(client, now) {
            RateDecision::Rejected { limit, retry_after } => {
                tracing::warn!(
                    client = %client,
                    class = %limiter.class(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Rate limit exceeded"
                );
                Err(Rejection::RateLimited {
                    class: limiter.class(),
                    limit,
                    retry_after,
                })
            }
            admitted => Ok(admitted),
        }
    }

    /// Sweep both classes, returning the number of clients dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let removed = self.general.sweep(now) + self.sensitive.sweep(now);
        metrics::record_tracked_clients(RouteClass::General, self.general.store().len());
        metrics::record_tracked_clients(RouteClass::Sensitive, self.sensitive.store().len());
        removed
    }
}

/// Prefix match on whole path segments: `/api/auth/login` matches
/// `/api/auth/login` and `/api/auth/login/otp`, not `/api/auth/loginx`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Periodically drop idle clients until shutdown is signalled.
pub fn spawn_sweeper(
    limiter: Arc<TieredRateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.sweep(Instant::now());
                    if removed > 0 {
                        tracing::debug!(removed, "Swept idle rate-limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate-limit sweeper stopping");
                    break;
                }
            }
        }
    })
}
