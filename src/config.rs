//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::casemap::CaseMapping;

/// Configuration for one session engine.
///
/// Deserializable so applications can load it from their own config
/// files; every field has a sensible default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Nickname to register with.
    pub nickname: String,
    /// Username/ident sent in USER.
    pub username: String,
    /// Realname sent in USER.
    pub realname: String,
    /// Initial case mapping, replaced by ISUPPORT once advertised.
    pub case_mapping: CaseMapping,
    /// Automatically request list-mode contents after joining a channel.
    pub auto_list_modes: bool,
    /// When true, parts/kicks/quits emit their event before the state
    /// mutation instead of after it.
    pub remove_after_callback: bool,
    /// Channels to join once registered, with optional `name key` pairs.
    pub auto_join: Vec<String>,
    /// Capabilities to request during negotiation.
    pub requested_caps: Vec<String>,
    /// Outbound rate limiting.
    pub rate_limit: RateLimitConfig,
    /// Ignore-list patterns, matched against `nick!user@host`.
    pub ignore: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nickname: "irctide".to_string(),
            username: "irctide".to_string(),
            realname: "irctide".to_string(),
            case_mapping: CaseMapping::Rfc1459,
            auto_list_modes: true,
            remove_after_callback: false,
            auto_join: Vec::new(),
            requested_caps: vec![
                "multi-prefix".to_string(),
                "extended-join".to_string(),
                "account-notify".to_string(),
                "away-notify".to_string(),
                "chghost".to_string(),
            ],
            rate_limit: RateLimitConfig::default(),
            ignore: Vec::new(),
        }
    }
}

/// Outbound rate limiting parameters.
///
/// When more than `threshold` lines leave within `window_ms`, each
/// subsequent line is delayed by `delay_ms` until the queue drains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Master switch.
    pub enabled: bool,
    /// Lines allowed per window before limiting kicks in.
    pub threshold: usize,
    /// Rolling window, in milliseconds.
    pub window_ms: u64,
    /// Delay applied per line while limiting, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 5,
            window_ms: 10_000,
            delay_ms: 2_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.case_mapping, CaseMapping::Rfc1459);
        assert!(config.auto_list_modes);
        assert!(!config.remove_after_callback);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.threshold, 5);
    }

    #[test]
    fn deserializes_partial() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"nickname": "tester", "rate_limit": {"threshold": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.nickname, "tester");
        assert_eq!(config.rate_limit.threshold, 3);
        assert_eq!(config.rate_limit.window_ms, 10_000);
    }
}
