use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::errors::DomainResult;
use crate::domain::models::UsageReport;

/// Parameters of one usage lookup, resolved from settings at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRequest {
    pub auth_file: PathBuf,
    pub proxy: Option<String>,
}

/// Port for querying the agent backend's account usage.
///
/// Implementations report the backend's own verdict; configured ceilings are
/// applied by the usage gate.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn fetch(&self, request: &UsageRequest) -> DomainResult<UsageReport>;
}
