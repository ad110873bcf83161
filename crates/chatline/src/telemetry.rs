// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing subscriber setup for hosts without their own.

use chatline_core::ChatlineError;
use tracing_subscriber::EnvFilter;

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise Chatline logs at `log_level` and
/// everything else at `warn`. Fails if a global subscriber already exists.
pub fn init_tracing(log_level: &str) -> Result<(), ChatlineError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init()
        .map_err(|e| ChatlineError::Internal(format!("tracing init: {e}")))
}

fn default_directives(log_level: &str) -> String {
    format!("chatline={log_level},warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_level_to_chatline() {
        assert_eq!(default_directives("debug"), "chatline=debug,warn");
    }
}
