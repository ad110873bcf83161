// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Hierarchy: `./chatline.toml` > `~/.config/chatline/chatline.toml` >
//! `/etc/chatline/chatline.toml`, with `CHATLINE_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChatlineConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/chatline/chatline.toml";
pub(crate) const LOCAL_CONFIG: &str = "chatline.toml";

/// Sections addressable from the environment, e.g. `CHATLINE_SYNC_MAX_ATTEMPTS`.
const ENV_SECTIONS: &[&str] = &["client", "connection", "streaming", "sync", "storage"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chatline").join(LOCAL_CONFIG))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatline/chatline.toml`
/// 3. `~/.config/chatline/chatline.toml`
/// 4. `./chatline.toml`
/// 5. `CHATLINE_*` environment variables
pub fn load_config() -> Result<ChatlineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChatlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatlineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatlineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full figment before extraction, for callers that want to inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChatlineConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Maps `CHATLINE_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Keys contain underscores (`max_delay_ms`), so splitting on `_` would be
/// ambiguous; only the leading section name is rewritten.
fn env_provider() -> Env {
    Env::prefixed("CHATLINE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("sync_max_attempts"), "sync.max_attempts");
        assert_eq!(
            map_env_key("connection_stability_window_ms"),
            "connection.stability_window_ms"
        );
        assert_eq!(map_env_key("storage_database_path"), "storage.database_path");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}
