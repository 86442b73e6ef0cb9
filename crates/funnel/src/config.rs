//! Gate configuration.
//!
//! [`FunnelConfig`] holds the settings that can be expressed as plain data and
//! therefore loaded from a file. The promise constructor and spawner are code,
//! not data, and live on [`FunnelOptions`](crate::FunnelOptions) instead.

use serde::{Deserialize, Serialize};

use crate::FunnelError;

/// What a release does after a queued call faults during the drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Stop draining, requeue the uninvoked remainder at the front of the
    /// queue, hold the gate again and report
    /// [`FunnelError::DrainHalted`] from the release.
    #[default]
    Halt,

    /// Log the fault and keep draining. The release succeeds.
    Continue,
}

/// Data-only settings for a [`Funnel`](crate::Funnel).
///
/// ```
/// use funnel::{DrainPolicy, FunnelConfig};
///
/// let config = FunnelConfig::from_json(r#"{ "drain_policy": "continue" }"#).unwrap();
/// assert_eq!(config.drain_policy, DrainPolicy::Continue);
/// assert_eq!(config.label, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunnelConfig {
    /// Behaviour when a queued call faults mid-drain.
    pub drain_policy: DrainPolicy,

    /// Human-readable name recorded on every span the funnel opens.
    pub label: Option<String>,
}

impl FunnelConfig {
    /// Parses a configuration from a JSON document.
    ///
    /// Missing fields take their defaults; unknown fields are rejected.
    pub fn from_json(document: &str) -> Result<Self, FunnelError> {
        serde_json::from_str(document).map_err(|err| FunnelError::Configuration {
            message: err.to_string(),
        })
    }

    /// Sets the drain policy.
    #[must_use]
    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    /// Sets the span label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_halt() {
        assert_eq!(FunnelConfig::default().drain_policy, DrainPolicy::Halt);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = FunnelConfig::from_json("{}").unwrap();
        assert_eq!(config, FunnelConfig::default());
    }

    #[test]
    fn test_full_document_parses() {
        let config =
            FunnelConfig::from_json(r#"{ "drain_policy": "halt", "label": "ledger-writes" }"#)
                .unwrap();
        assert_eq!(config.drain_policy, DrainPolicy::Halt);
        assert_eq!(config.label.as_deref(), Some("ledger-writes"));
    }

    #[test]
    fn test_unknown_field_is_a_configuration_error() {
        let err = FunnelConfig::from_json(r#"{ "max_queue": 10 }"#).unwrap_err();
        assert!(matches!(err, FunnelError::Configuration { .. }));
        assert!(err.to_string().contains("max_queue"));
    }

    #[test]
    fn test_unknown_policy_is_a_configuration_error() {
        let err = FunnelConfig::from_json(r#"{ "drain_policy": "retry" }"#).unwrap_err();
        assert!(matches!(err, FunnelError::Configuration { .. }));
    }

    #[test]
    fn test_builders_set_fields() {
        let config = FunnelConfig::default()
            .with_drain_policy(DrainPolicy::Continue)
            .with_label("audit");
        assert_eq!(config.drain_policy, DrainPolicy::Continue);
        assert_eq!(config.label.as_deref(), Some("audit"));
    }
}
