// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as endpoint schemes, non-zero intervals, and ordered delay bounds.

use crate::diagnostic::ConfigError;
use crate::model::ChatlineConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of failing fast.
pub fn validate_config(config: &ChatlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.client.log_level.as_str()) {
        fail(format!(
            "client.log_level `{}` must be one of {}",
            config.client.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let conn = &config.connection;
    let endpoint = conn.endpoint.trim();
    if endpoint.is_empty() {
        fail("connection.endpoint must not be empty".to_string());
    } else if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
        fail(format!(
            "connection.endpoint `{endpoint}` must use the ws:// or wss:// scheme"
        ));
    }

    if conn.base_delay_ms == 0 {
        fail("connection.base_delay_ms must be greater than 0".to_string());
    }
    if conn.max_delay_ms < conn.base_delay_ms {
        fail(format!(
            "connection.max_delay_ms ({}) must be at least base_delay_ms ({})",
            conn.max_delay_ms, conn.base_delay_ms
        ));
    }
    if !(0.0..=1.0).contains(&conn.jitter_ratio) {
        fail(format!(
            "connection.jitter_ratio must be between 0.0 and 1.0, got {}",
            conn.jitter_ratio
        ));
    }
    if conn.connect_timeout_ms == 0 {
        fail("connection.connect_timeout_ms must be greater than 0".to_string());
    }

    let streaming = &config.streaming;
    if streaming.flush_interval_ms == 0 {
        fail("streaming.flush_interval_ms must be greater than 0".to_string());
    }
    if streaming.max_buffer_bytes == 0 {
        fail("streaming.max_buffer_bytes must be greater than 0".to_string());
    }
    if streaming.chars_per_token == 0 {
        fail("streaming.chars_per_token must be greater than 0".to_string());
    }

    let sync = &config.sync;
    if sync.max_attempts == 0 {
        fail("sync.max_attempts must be at least 1".to_string());
    }
    if sync.replay_concurrency == 0 {
        fail("sync.replay_concurrency must be at least 1".to_string());
    }
    if sync.replay_max_delay_ms < sync.replay_base_delay_ms {
        fail(format!(
            "sync.replay_max_delay_ms ({}) must be at least replay_base_delay_ms ({})",
            sync.replay_max_delay_ms, sync.replay_base_delay_ms
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = ChatlineConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = ChatlineConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn http_endpoint_is_rejected() {
        let mut config = ChatlineConfig::default();
        config.connection.endpoint = "https://chat.example.com".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "ws:// or wss://"));
    }

    #[test]
    fn inverted_delay_bounds_fail() {
        let mut config = ChatlineConfig::default();
        config.connection.base_delay_ms = 5_000;
        config.connection.max_delay_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "max_delay_ms"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = ChatlineConfig::default();
        config.streaming.flush_interval_ms = 0;
        config.sync.max_attempts = 0;
        config.connection.jitter_ratio = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_message(&errors, "flush_interval_ms"));
        assert!(has_message(&errors, "max_attempts"));
        assert!(has_message(&errors, "jitter_ratio"));
    }
}
