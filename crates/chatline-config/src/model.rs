// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Chatline streaming pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Chatline configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatlineConfig {
    /// Client identity and logging.
    #[serde(default)]
    pub client: ClientConfig,

    /// Connection coordinator settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Streaming assembler settings.
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Offline sync manager settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Client identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Name reported in logs.
    #[serde(default = "default_client_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_client_name() -> String {
    "chatline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Connection lifecycle and reconnect backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the chat service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Delay before the first reconnect attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for the reconnect delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter applied to each delay, as a fraction (0.2 = +/-20%).
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,

    /// How long a link must stay open before the attempt counter resets.
    #[serde(default = "default_stability_window_ms")]
    pub stability_window_ms: u64,

    /// Upper bound for a single connect attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
            stability_window_ms: default_stability_window_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_endpoint() -> String {
    "wss://localhost:8443/stream".to_string()
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ratio() -> f64 {
    0.2
}

fn default_stability_window_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// Streaming assembler flush policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    /// Cadence of coalesced update emission.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Unflushed bytes that force an immediate flush.
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,

    /// Characters per estimated token for throughput metadata.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    /// How many finalized ids are remembered to drop late chunks.
    #[serde(default = "default_finalized_capacity")]
    pub finalized_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
            max_buffer_bytes: default_max_buffer_bytes(),
            chars_per_token: default_chars_per_token(),
            finalized_capacity: default_finalized_capacity(),
        }
    }
}

impl StreamingConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_flush_interval_ms() -> u64 {
    100
}

fn default_max_buffer_bytes() -> usize {
    8 * 1024
}

fn default_chars_per_token() -> usize {
    4
}

fn default_finalized_capacity() -> usize {
    256
}

/// Offline queue replay policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Failed replays before an action is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the sweep following a failed one.
    #[serde(default = "default_replay_base_delay_ms")]
    pub replay_base_delay_ms: u64,

    /// Ceiling for the delay between failing sweeps.
    #[serde(default = "default_replay_max_delay_ms")]
    pub replay_max_delay_ms: u64,

    /// Distinct message ids replayed at the same time.
    #[serde(default = "default_replay_concurrency")]
    pub replay_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            replay_base_delay_ms: default_replay_base_delay_ms(),
            replay_max_delay_ms: default_replay_max_delay_ms(),
            replay_concurrency: default_replay_concurrency(),
        }
    }
}

impl SyncConfig {
    pub fn replay_base_delay(&self) -> Duration {
        Duration::from_millis(self.replay_base_delay_ms)
    }

    pub fn replay_max_delay(&self) -> Duration {
        Duration::from_millis(self.replay_max_delay_ms)
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_replay_base_delay_ms() -> u64 {
    500
}

fn default_replay_max_delay_ms() -> u64 {
    30_000
}

fn default_replay_concurrency() -> usize {
    4
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chatline").join("chatline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
