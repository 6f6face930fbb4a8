//! Usage source returning a preset report, for tests and offline runs.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::UsageReport;
use crate::domain::ports::{UsageRequest, UsageSource};

pub struct FixedUsageSource {
    report: RwLock<Result<UsageReport, String>>,
    fetches: AtomicUsize,
}

impl FixedUsageSource {
    /// Always allows, with low usage.
    pub fn allowing() -> Self {
        Self::with_report(UsageReport {
            five_hour_used_percent: Some(5.0),
            weekly_used_percent: Some(1.0),
            ..UsageReport::unchecked()
        })
    }

    /// Backend verdict is "limit reached".
    pub fn denying(reason: impl Into<String>) -> Self {
        Self::with_report(UsageReport::denied(reason))
    }

    /// Every fetch fails with this error.
    pub fn failing(error: impl Into<String>) -> Self {
        Self { report: RwLock::new(Err(error.into())), fetches: AtomicUsize::new(0) }
    }

    pub fn with_report(report: UsageReport) -> Self {
        Self { report: RwLock::new(Ok(report)), fetches: AtomicUsize::new(0) }
    }

    pub async fn set_report(&self, report: UsageReport) {
        *self.report.write().await = Ok(report);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageSource for FixedUsageSource {
    async fn fetch(&self, _request: &UsageRequest) -> DomainResult<UsageReport> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &*self.report.read().await {
            Ok(report) => Ok(UsageReport { checked_at: Utc::now(), ..report.clone() }),
            Err(error) => Err(DomainError::UsageCheckFailed(error.clone())),
        }
    }
}
