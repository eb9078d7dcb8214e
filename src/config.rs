use std::env;
use std::time::Duration;

/// Runtime configuration, read once at startup and injected into the
/// components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Period of the matchmaking pairing sweep.
    pub sweep_period: Duration,
    /// Window after a disconnect during which reconnection aborts the
    /// automatic resignation.
    pub grace_period: Duration,
    /// Clock budget per side when a queue entry does not specify one.
    pub default_time_control_ms: i64,
    /// Command used to spawn the external move generator. `None` disables
    /// bot matches.
    pub generator_command: Option<String>,
    /// Search depth requested from the move generator.
    pub generator_depth: u32,
    /// Upper bound on a single move-generator request.
    pub generator_timeout: Duration,
    /// Period of the rating-deviation inactivity job.
    pub inactivity_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sweep_period: Duration::from_secs(5),
            grace_period: Duration::from_secs(13),
            default_time_control_ms: 300_000,
            generator_command: None,
            generator_depth: 20,
            generator_timeout: Duration::from_secs(10),
            inactivity_period: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            sweep_period: env_ms("ARBITER_SWEEP_PERIOD_MS").unwrap_or(defaults.sweep_period),
            grace_period: env_ms("ARBITER_GRACE_PERIOD_MS").unwrap_or(defaults.grace_period),
            default_time_control_ms: env::var("ARBITER_DEFAULT_TIME_CONTROL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_time_control_ms),
            generator_command: env::var("ARBITER_GENERATOR_CMD").ok(),
            generator_depth: env::var("ARBITER_GENERATOR_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.generator_depth),
            generator_timeout: env_ms("ARBITER_GENERATOR_TIMEOUT_MS")
                .unwrap_or(defaults.generator_timeout),
            inactivity_period: env_ms("ARBITER_INACTIVITY_PERIOD_MS")
                .unwrap_or(defaults.inactivity_period),
        }
    }
}

fn env_ms(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_values() {
        let config = Config::default();
        assert_eq!(config.sweep_period, Duration::from_secs(5));
        assert_eq!(config.grace_period, Duration::from_secs(13));
        assert_eq!(config.default_time_control_ms, 300_000);
    }
}
