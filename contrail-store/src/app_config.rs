use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub workload: WorkloadConfig,
    pub cleanup: CleanupConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub url: String,
    /// Namespace the harness tables live in (the keyspace analogue).
    pub schema: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkloadConfig {
    pub workers: usize,
    pub iterations: usize,
    /// A scenario name from the registry, or "random".
    pub scenario: String,
    pub status_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    /// Leave residual reservations behind.
    Disabled,
    /// Cancel them inline, right after the scenario returns.
    Immediate,
    /// Cancel them from a background task after a random bounded delay.
    Delayed,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CleanupConfig {
    pub mode: CleanupMode,
    pub max_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    pub path: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file, not checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of CONTRAIL)
            // Eg. `CONTRAIL__WORKLOAD__WORKERS=4` sets the worker count
            .add_source(config::Environment::with_prefix("CONTRAIL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
