use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Maximum number of monitor registrations in flight after a batch create.
pub const DEFAULT_MONITOR_CONCURRENCY: usize = 4;
/// Check interval (minutes) sent with every monitor registration.
pub const DEFAULT_MONITOR_CHECK_INTERVAL: u32 = 5;
/// Path appended to a site's root URL for the second monitored endpoint.
pub const CRON_PATH: &str = "/wp-cron.php";
pub const DEFAULT_LOG_FILTER: &str = "fleetwise=info,fleetwise_scheduler=info";

/// Top-level config (fleetwise.toml + FLEETWISE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetwiseConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tunables for batch execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent monitor registrations after a create batch (default: 4).
    #[serde(default = "default_monitor_concurrency")]
    pub monitor_concurrency: usize,
    /// Interval sent as `check_interval` for each monitored URL.
    #[serde(default = "default_monitor_check_interval")]
    pub monitor_check_interval: u32,
    /// Sent as `health_check_paths` with create/edit bodies.
    #[serde(default)]
    pub health_check_paths: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            monitor_concurrency: DEFAULT_MONITOR_CONCURRENCY,
            monitor_check_interval: DEFAULT_MONITOR_CHECK_INTERVAL,
            health_check_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// When false, per-site create events are dropped.
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_monitor_concurrency() -> usize {
    DEFAULT_MONITOR_CONCURRENCY
}
fn default_monitor_check_interval() -> u32 {
    DEFAULT_MONITOR_CHECK_INTERVAL
}
fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl FleetwiseConfig {
    /// Load config from a TOML file with FLEETWISE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.fleetwise/fleetwise.toml
    ///
    /// A missing file is not an error; every field has a default. Nested keys
    /// are separated by a double underscore in env vars, e.g.
    /// `FLEETWISE_SCHEDULER__MONITOR_CONCURRENCY=8`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: FleetwiseConfig =
            Figment::from(Serialized::defaults(FleetwiseConfig::default()))
                .merge(Toml::file(&path))
                .merge(Env::prefixed("FLEETWISE_").split("__"))
                .extract()
                .map_err(|e| crate::error::FleetwiseError::Config(e.to_string()))?;

        if config.scheduler.monitor_concurrency == 0 {
            return Err(crate::error::FleetwiseError::Config(
                "scheduler.monitor_concurrency must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.fleetwise/fleetwise.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config = FleetwiseConfig::load(Some("does-not-exist.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.monitor_concurrency, DEFAULT_MONITOR_CONCURRENCY);
            assert_eq!(
                config.scheduler.monitor_check_interval,
                DEFAULT_MONITOR_CHECK_INTERVAL
            );
            assert!(config.scheduler.health_check_paths.is_empty());
            assert!(config.telemetry.enabled);
            assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
            Ok(())
        });
    }

    #[test]
    fn toml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "fleetwise.toml",
                r#"
                [scheduler]
                monitor_concurrency = 2
                health_check_paths = ["/health"]

                [telemetry]
                enabled = false
                "#,
            )?;
            let config = FleetwiseConfig::load(Some("fleetwise.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.monitor_concurrency, 2);
            assert_eq!(config.scheduler.health_check_paths, vec!["/health".to_string()]);
            assert!(!config.telemetry.enabled);
            // untouched field keeps its default
            assert_eq!(
                config.scheduler.monitor_check_interval,
                DEFAULT_MONITOR_CHECK_INTERVAL
            );
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("fleetwise.toml", "[scheduler]\nmonitor_concurrency = 2\n")?;
            jail.set_env("FLEETWISE_SCHEDULER__MONITOR_CONCURRENCY", "6");
            let config = FleetwiseConfig::load(Some("fleetwise.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.monitor_concurrency, 6);
            Ok(())
        });
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("fleetwise.toml", "[scheduler]\nmonitor_concurrency = 0\n")?;
            let err = FleetwiseConfig::load(Some("fleetwise.toml")).unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
            Ok(())
        });
    }
}
