//! Hub tuning, loaded from environment variables with typed defaults (spec.md
//! §6 "Exit codes and configuration"), in the style of
//! `echo-app-core::config::ConfigService`: a thin typed wrapper with no
//! panics on missing or malformed input.

use std::env;

use tracing::warn;

/// Ticks between scheduled keyframes (spec.md §4.5 step 5). Clamped to a
/// minimum of 1.
const DEFAULT_KEYFRAME_INTERVAL: u32 = 30;
/// Keyframe ring size cap (spec.md §4.4/§6 "journal tuning").
const DEFAULT_KEYFRAME_CAPACITY: usize = 8;
/// Keyframe ring max age, in milliseconds.
const DEFAULT_KEYFRAME_MAX_AGE_MS: u64 = 60_000;

/// Subscriber write deadline (spec.md §5 "Cancellation and timeouts").
pub const WRITE_DEADLINE_MS: u64 = 10_000;
/// Missed heartbeats before a player is disconnected (spec.md §5).
pub const MISSED_HEARTBEAT_LIMIT: u32 = 3;
/// Additions to the pending-command queue between depth warnings (spec.md
/// §4.5 "Command enqueue").
pub const COMMAND_QUEUE_WARN_STRIDE: usize = 256;
/// Consecutive tick-budget overruns that raise the alarm (spec.md §4.5
/// step 10).
pub const OVERRUN_STREAK_ALARM: u32 = 3;
/// Overrun/budget ratio that raises the alarm even below the streak
/// threshold.
pub const OVERRUN_RATIO_ALARM: f32 = 2.0;
/// How long a client is expected to go between heartbeats. Not named
/// explicitly in spec.md beyond "three missed intervals"; chosen to match a
/// typical liveness cadence well inside the write deadline.
pub const HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Hub-wide tunables, loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HubConfig {
    /// Ticks between scheduled keyframes.
    pub keyframe_interval: u32,
    /// Keyframe ring size cap.
    pub keyframe_capacity: usize,
    /// Keyframe ring max age, in milliseconds.
    pub keyframe_max_age_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            keyframe_capacity: DEFAULT_KEYFRAME_CAPACITY,
            keyframe_max_age_ms: DEFAULT_KEYFRAME_MAX_AGE_MS,
        }
    }
}

impl HubConfig {
    /// Loads tunables from `ARENA_KEYFRAME_INTERVAL`, `ARENA_KEYFRAME_CAPACITY`,
    /// and `ARENA_KEYFRAME_MAX_AGE_MS`. A missing variable falls back to the
    /// default silently; a present-but-unparsable one falls back to the
    /// default and logs a warning. Never panics.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            keyframe_interval: read_env("ARENA_KEYFRAME_INTERVAL", defaults.keyframe_interval).max(1),
            keyframe_capacity: read_env("ARENA_KEYFRAME_CAPACITY", defaults.keyframe_capacity),
            keyframe_max_age_ms: read_env("ARENA_KEYFRAME_MAX_AGE_MS", defaults.keyframe_max_age_ms),
        }
    }
}

fn read_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Err(env::VarError::NotPresent) => default,
        Err(env::VarError::NotUnicode(_)) => {
            warn!(key, "environment variable is not valid unicode, using default");
            default
        }
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, raw, "environment variable failed to parse, using default");
            default
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = HubConfig::default();
        assert_eq!(config.keyframe_interval, 30);
        assert_eq!(config.keyframe_capacity, 8);
        assert_eq!(config.keyframe_max_age_ms, 60_000);
    }

    #[test]
    fn read_env_falls_back_on_missing_or_malformed() {
        env::remove_var("ARENA_HUB_TEST_MISSING");
        assert_eq!(read_env("ARENA_HUB_TEST_MISSING", 7u32), 7);

        env::set_var("ARENA_HUB_TEST_BAD", "not-a-number");
        assert_eq!(read_env("ARENA_HUB_TEST_BAD", 7u32), 7);
        env::remove_var("ARENA_HUB_TEST_BAD");
    }
}
