use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Storage for explicit setting overrides. Environment and default tiers are
/// resolved by the settings service.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_override(&self, key: &str) -> DomainResult<Option<String>>;

    /// All stored overrides as `(key, value)` pairs.
    async fn list_overrides(&self) -> DomainResult<Vec<(String, String)>>;

    async fn set_override(&self, key: &str, value: &str) -> DomainResult<()>;

    /// Returns false when no override was stored.
    async fn clear_override(&self, key: &str) -> DomainResult<bool>;
}
