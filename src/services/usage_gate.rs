//! Usage gate: decides whether the account has quota left for new runs.
//!
//! Results are cached for a bounded TTL. A forced refresh bypasses the cache
//! but is itself rate-limited; past the limit the cached value is served.
//! Any failure to obtain usage refuses admission.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::models::{UsageConfig, UsageReport};
use crate::domain::ports::{UsageRequest, UsageSource};

/// Usage settings resolved for one check.
#[derive(Debug, Clone, PartialEq)]
pub struct UsagePolicy {
    pub enabled: bool,
    pub request: UsageRequest,
    pub max_five_hour_percent: f64,
    pub max_weekly_percent: f64,
}

struct CachedReport {
    report: UsageReport,
    fetched_at: Instant,
    request: UsageRequest,
}

pub struct UsageGate {
    source: Arc<dyn UsageSource>,
    ttl: Duration,
    cache: Mutex<Option<CachedReport>>,
    forced_refreshes: DefaultDirectRateLimiter,
}

impl UsageGate {
    pub fn new(source: Arc<dyn UsageSource>, ttl: Duration, forced_refresh_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(forced_refresh_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
            forced_refreshes: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }

    pub fn from_config(source: Arc<dyn UsageSource>, config: &UsageConfig) -> Self {
        Self::new(source, Duration::from_secs(config.cache_ttl_secs), config.forced_refresh_per_minute)
    }

    /// Report whether new executions are allowed under `policy`.
    pub async fn check_allowed(&self, policy: &UsagePolicy, force: bool) -> UsageReport {
        if !policy.enabled {
            return UsageReport::unchecked();
        }

        let mut cache = self.cache.lock().await;
        let stale = match cache.as_ref() {
            None => true,
            Some(cached) => cached.request != policy.request || cached.fetched_at.elapsed() >= self.ttl,
        };
        let forced = force && !stale && self.forced_refreshes.check().is_ok();
        if force && !stale && !forced {
            tracing::debug!("forced usage refresh rate-limited; serving cached result");
        }

        if stale || forced {
            let report = match self.source.fetch(&policy.request).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!(error = %e, "usage check failed; refusing admission");
                    UsageReport::denied(e.to_string())
                }
            };
            *cache = Some(CachedReport { report, fetched_at: Instant::now(), request: policy.request.clone() });
        }

        cache
            .as_ref()
            .map(|cached| cached.report.clone())
            .unwrap_or_else(|| UsageReport::denied("usage unavailable"))
            .apply_limits(policy.max_five_hour_percent, policy.max_weekly_percent)
    }

    /// Drop the cached report so the next check refetches.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::usage::FixedUsageSource;
    use std::path::PathBuf;

    fn policy() -> UsagePolicy {
        UsagePolicy {
            enabled: true,
            request: UsageRequest { auth_file: PathBuf::from("/tmp/auth.json"), proxy: None },
            max_five_hour_percent: 100.0,
            max_weekly_percent: 100.0,
        }
    }

    fn report(five_hour: f64) -> UsageReport {
        UsageReport { five_hour_used_percent: Some(five_hour), weekly_used_percent: Some(1.0), ..UsageReport::unchecked() }
    }

    #[tokio::test]
    async fn test_disabled_check_skips_source() {
        let source = Arc::new(FixedUsageSource::failing("boom"));
        let gate = UsageGate::new(source.clone(), Duration::from_secs(60), 6);
        let mut p = policy();
        p.enabled = false;

        assert!(gate.check_allowed(&p, true).await.allowed);
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_fails_closed() {
        let gate = UsageGate::new(Arc::new(FixedUsageSource::failing("network down")), Duration::from_secs(60), 6);
        let report = gate.check_allowed(&policy(), false).await;
        assert!(!report.allowed);
        assert!(report.error.unwrap().contains("network down"));
    }

    #[tokio::test]
    async fn test_cache_serves_until_ttl_or_invalidate() {
        let source = Arc::new(FixedUsageSource::with_report(report(10.0)));
        let gate = UsageGate::new(source.clone(), Duration::from_secs(60), 6);

        gate.check_allowed(&policy(), false).await;
        gate.check_allowed(&policy(), false).await;
        assert_eq!(source.fetch_count(), 1);

        gate.invalidate().await;
        gate.check_allowed(&policy(), false).await;
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_changed_request_refetches() {
        let source = Arc::new(FixedUsageSource::with_report(report(10.0)));
        let gate = UsageGate::new(source.clone(), Duration::from_secs(60), 6);

        gate.check_allowed(&policy(), false).await;
        let mut p = policy();
        p.request.proxy = Some("http://proxy:8080".into());
        gate.check_allowed(&p, false).await;
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_forced_refresh_is_rate_limited() {
        let source = Arc::new(FixedUsageSource::with_report(report(10.0)));
        let gate = UsageGate::new(source.clone(), Duration::from_secs(60), 1);

        gate.check_allowed(&policy(), false).await;
        gate.check_allowed(&policy(), true).await;
        gate.check_allowed(&policy(), true).await;
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_limits_apply_to_cached_report() {
        let gate = UsageGate::new(Arc::new(FixedUsageSource::with_report(report(85.0))), Duration::from_secs(60), 6);

        assert!(gate.check_allowed(&policy(), false).await.allowed);
        let mut p = policy();
        p.max_five_hour_percent = 80.0;
        let report = gate.check_allowed(&p, false).await;
        assert!(!report.allowed);
        assert!(report.error.unwrap().contains("five-hour"));
    }
}
